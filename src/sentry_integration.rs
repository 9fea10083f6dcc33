//! Optional Sentry error tracking integration.
//!
//! [`init`] starts the SDK; the returned guard must outlive the server so
//! queued events are flushed on exit. [`tracing_layer`] forwards `error!`
//! events (failed primary writes, storage errors) to Sentry and keeps
//! lower levels as breadcrumbs.

use sentry_tracing::EventFilter;
use tracing::Level;

pub fn init(dsn: &str, environment: Option<&str>) -> sentry::ClientInitGuard {
    let parsed_dsn = match dsn.parse() {
        Ok(d) => Some(d),
        Err(e) => {
            tracing::warn!(error = %e, "invalid Sentry DSN, error tracking disabled");
            None
        }
    };

    let guard = sentry::init(sentry::ClientOptions {
        dsn: parsed_dsn,
        environment: environment.map(|e| e.to_string().into()),
        release: Some(concat!("tandem@", env!("CARGO_PKG_VERSION")).into()),
        ..Default::default()
    });
    if guard.is_enabled() {
        tracing::info!("sentry error tracking enabled");
    }
    guard
}

pub fn tracing_layer<S>() -> sentry_tracing::SentryLayer<S>
where
    S: tracing::Subscriber + for<'a> tracing_subscriber::registry::LookupSpan<'a>,
{
    sentry_tracing::layer().event_filter(|metadata| match *metadata.level() {
        Level::ERROR => EventFilter::Event,
        Level::WARN | Level::INFO => EventFilter::Breadcrumb,
        _ => EventFilter::Ignore,
    })
}
