//! tandem hosts the edge request handlers of a multi-region WordPress
//! deployment in one HTTP server.
//!
//! - The **comment dual-writer** forwards comment submissions reaching
//!   `admin-ajax.php` to a primary origin, returns the primary's response,
//!   and mirrors the write to a secondary origin in the background.
//! - The **wallpaper redirect** sends each visitor to a random image from
//!   a shared object store, picking the PC or mobile set.
//! - The **view counter** keeps per-post read counts in a key-value store.
//!
//! # Architecture
//!
//! - [`cli`] -- Command-line argument parsing with clap derive macros.
//! - [`cmd`] -- Subcommand dispatch and execution (run, init, validate, health).
//! - [`config`] -- Configuration model, file loading, and validation.
//! - [`error`] -- Unified error types using `thiserror`.
//! - [`background`] -- Keep-alive queue for secondary writes, drained on shutdown.
//! - [`comments`] -- The comment dual-writer: classification, header
//!   preparation, and primary/secondary dispatch.
//! - [`wallpaper`] -- Device classification and random redirect.
//! - [`views`] -- Slug validation and view counting.
//! - [`storage`] -- `ObjectStore` / `KvStore` bindings (memory, local disk,
//!   Redis, `SQLite`).
//! - [`health`] -- `GET /health` endpoint handler returning runtime diagnostics.
//! - [`logging`] -- Structured tracing setup with JSON and pretty-print output.
//! - [`server`] -- Axum server setup, shared application state, HTTP client, and
//!   graceful shutdown.
//!
//! # Feature Flags
//!
//! | Feature | Description |
//! |---------|-------------|
//! | `yaml` | YAML config file support _(enabled by default)_ |
//! | `json` | JSON config file support |
//! | `toml` | TOML config file support |
//! | `redis` | Redis view-counter store |
//! | `sqlite` | `SQLite` view-counter store |
//! | `sentry-integration` | Sentry error tracking |
//! | `file-backends` | All file format backends |
//! | `kv-backends` | All key-value backends |
//! | `full` | All features |

// Binary crate: public functions are internal, not consumed by external users.
#![allow(clippy::missing_errors_doc)]

pub mod background;
pub mod cli;
pub mod cmd;
pub mod comments;
pub mod config;
pub mod error;
pub mod health;
pub mod logging;
pub mod server;
pub mod storage;
pub mod views;
pub mod wallpaper;

#[cfg(feature = "sentry-integration")]
pub mod sentry_integration;
