//! Serde data structures for the tandem configuration file.
//!
//! Contains [`Config`] (the root) and one section per handler:
//! [`CommentsConfig`], [`WallpaperConfig`] and [`ViewsConfig`], plus
//! the [`BackgroundConfig`] knobs for the secondary-write queue. A
//! handler is enabled by the presence of its section. All types derive
//! `Serialize` and `Deserialize` with `deny_unknown_fields` for strict
//! parsing.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

fn default_path_suffix() -> String {
    "/admin-ajax.php".to_string()
}

const fn default_comment_timeout() -> u64 {
    30_000
}

fn default_mount() -> String {
    "/wallpaper".to_string()
}

fn default_pc_prefix() -> String {
    "pc_img/".to_string()
}

fn default_mobile_prefix() -> String {
    "mobile_img/".to_string()
}

const fn default_browser_max_age() -> u64 {
    600
}

const fn default_cdn_max_age() -> u64 {
    604_800
}

fn default_views_path() -> String {
    "/views-track".to_string()
}

const fn default_max_in_flight() -> usize {
    64
}

const fn default_drain_timeout() -> u64 {
    10_000
}

fn is_default_path_suffix(v: &str) -> bool {
    v == default_path_suffix()
}

fn is_default_comment_timeout(v: &u64) -> bool {
    *v == default_comment_timeout()
}

fn is_default_policy(v: &CommentPolicy) -> bool {
    *v == CommentPolicy::default()
}

fn is_default_background(v: &BackgroundConfig) -> bool {
    v.max_in_flight == default_max_in_flight() && v.drain_timeout_ms == default_drain_timeout()
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comments: Option<CommentsConfig>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wallpaper: Option<WallpaperConfig>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub views: Option<ViewsConfig>,

    #[serde(default, skip_serializing_if = "is_default_background")]
    pub background: BackgroundConfig,
}

impl Config {
    /// Names of the handlers enabled by this config, in mount order.
    #[must_use]
    pub fn enabled_handlers(&self) -> Vec<&'static str> {
        let mut handlers = Vec::new();
        if self.views.is_some() {
            handlers.push("views");
        }
        if self.wallpaper.is_some() {
            handlers.push("wallpaper");
        }
        if self.comments.is_some() {
            handlers.push("comments");
        }
        handlers
    }
}

/// Which admin-ajax requests get duplicated to the secondary origin.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum CommentPolicy {
    /// Only form-encoded bodies carrying `comment_post_ID` and `comment`
    /// are dual-written; everything else is passed through once.
    #[default]
    ContentAware,
    /// Every request reaching the endpoint is dual-written.
    DuplicateAll,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct CommentsConfig {
    #[serde(
        default = "default_path_suffix",
        skip_serializing_if = "is_default_path_suffix"
    )]
    pub path_suffix: String,

    pub primary: String,

    pub secondary: String,

    /// Default upstream for traffic that is not a comment submission.
    /// Falls back to `primary`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub passthrough: Option<String>,

    #[serde(default, skip_serializing_if = "is_default_policy")]
    pub policy: CommentPolicy,

    #[serde(
        default = "default_comment_timeout",
        skip_serializing_if = "is_default_comment_timeout"
    )]
    pub timeout_ms: u64,
}

impl CommentsConfig {
    #[must_use]
    pub fn passthrough_origin(&self) -> &str {
        self.passthrough.as_deref().unwrap_or(&self.primary)
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct WallpaperConfig {
    #[serde(default = "default_mount")]
    pub mount: String,

    pub public_base_url: String,

    #[serde(default = "default_pc_prefix")]
    pub pc_prefix: String,

    #[serde(default = "default_mobile_prefix")]
    pub mobile_prefix: String,

    #[serde(default = "default_browser_max_age")]
    pub browser_max_age: u64,

    #[serde(default = "default_cdn_max_age")]
    pub cdn_max_age: u64,

    pub store: ObjectStoreConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ObjectStoreConfig {
    /// Fixed key list, mostly useful for demos and tests.
    Memory {
        #[serde(default)]
        keys: Vec<String>,
    },
    /// A directory on local disk; object keys are paths relative to `root`.
    Local { root: PathBuf },
}

impl ObjectStoreConfig {
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Memory { .. } => "memory",
            Self::Local { .. } => "local",
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ViewsConfig {
    #[serde(default = "default_views_path")]
    pub path: String,

    #[serde(default)]
    pub store: KvStoreConfig,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum KvStoreConfig {
    #[default]
    Memory,
    Redis {
        url: String,
    },
    Sqlite {
        path: PathBuf,
    },
}

impl KvStoreConfig {
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Memory => "memory",
            Self::Redis { .. } => "redis",
            Self::Sqlite { .. } => "sqlite",
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct BackgroundConfig {
    #[serde(default = "default_max_in_flight")]
    pub max_in_flight: usize,

    #[serde(default = "default_drain_timeout")]
    pub drain_timeout_ms: u64,
}

impl Default for BackgroundConfig {
    fn default() -> Self {
        Self {
            max_in_flight: default_max_in_flight(),
            drain_timeout_ms: default_drain_timeout(),
        }
    }
}
