//! Structured logging setup using the `tracing` ecosystem.
//!
//! Configures a `tracing-subscriber` with either JSON output (for
//! production) or pretty-printed output (for TTY / local dev). Format
//! is auto-detected from the terminal but can be forced via `--json`
//! or `--pretty`. With the `sentry-integration` feature, error events
//! are also forwarded to Sentry.

use tracing_subscriber::filter::Targets;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::cli::LogLevel;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Json,
    Pretty,
}

#[must_use]
pub fn resolve_format(pretty: bool, json: bool) -> LogFormat {
    if json {
        LogFormat::Json
    } else if pretty || std::io::IsTerminal::is_terminal(&std::io::stdout()) {
        LogFormat::Pretty
    } else {
        LogFormat::Json
    }
}

/// Filter for `level`, with the chatty connection-pool internals held
/// at `warn` unless tracing is explicitly requested.
fn filter_for(level: &LogLevel) -> Targets {
    let tracing_level = level.to_tracing_level();
    let filter = Targets::new().with_default(tracing_level);
    if matches!(level, LogLevel::Trace) {
        filter
    } else {
        filter
            .with_target("hyper_util", tracing::Level::WARN)
            .with_target("rustls", tracing::Level::WARN)
    }
}

pub fn init(level: &LogLevel, format: LogFormat) {
    let filter = filter_for(level);

    #[cfg(feature = "sentry-integration")]
    let sentry = Some(crate::sentry_integration::tracing_layer());
    #[cfg(not(feature = "sentry-integration"))]
    let sentry: Option<tracing_subscriber::layer::Identity> = None;

    match format {
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(filter)
                .with(sentry)
                .with(fmt::layer().json().with_target(false))
                .init();
        }
        LogFormat::Pretty => {
            tracing_subscriber::registry()
                .with(filter)
                .with(sentry)
                .with(fmt::layer().pretty())
                .init();
        }
    }
}
