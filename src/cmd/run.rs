//! `tandem run`: start the edge server.
//!
//! Loads and validates the config file, binds the storage backends the
//! enabled handlers need, serves until SIGTERM / Ctrl+C, then drains the
//! background queue so in-flight secondary writes are not dropped.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use crate::cli::RunArgs;
use crate::config::file::FileSource;
use crate::config::model::Config;
use crate::error::TandemError;
use crate::logging;
use crate::server::{self, AppState, Bindings};
use crate::storage;

pub async fn execute(args: RunArgs) -> Result<(), TandemError> {
    let log_format = logging::resolve_format(args.pretty, args.json);
    logging::init(&args.log_level, log_format);

    #[cfg(feature = "sentry-integration")]
    let _sentry_guard = args
        .sentry_dsn
        .as_ref()
        .map(|dsn| crate::sentry_integration::init(dsn, args.sentry_environment.as_deref()));

    let source = FileSource::resolve(args.config.as_deref()).await?;
    let (mut config, version) = source.load().await?;

    if let (Some(timeout), Some(comments)) = (args.timeout, config.comments.as_mut()) {
        comments.timeout_ms = timeout;
    }

    let bindings = bind_storage(&config).await?;
    let handlers = config.enabled_handlers().join(",");
    let drain_timeout = Duration::from_millis(config.background.drain_timeout_ms);

    let state = Arc::new(AppState::new(config, version, source.name(), bindings));
    let router = server::build_router(state.clone(), args.max_body);

    let addr: SocketAddr = format!("{}:{}", args.host, args.port).parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;

    tracing::info!(
        addr = %addr,
        handlers = %handlers,
        config = %source.path().display(),
        version = %state.version.short(),
        "tandem started"
    );

    axum::serve(
        listener,
        router.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(server::shutdown_signal())
    .await?;

    if !state.background.drain(drain_timeout).await {
        tracing::warn!("exiting with secondary writes still in flight");
    }

    tracing::info!("tandem stopped");
    Ok(())
}

async fn bind_storage(config: &Config) -> Result<Bindings, TandemError> {
    let mut bindings = Bindings::default();

    if let Some(ref wallpaper) = config.wallpaper {
        let bucket = storage::bind_object_store(&wallpaper.store);
        tracing::debug!(store = bucket.name(), "bound wallpaper object store");
        bindings.bucket = Some(bucket);
    }

    if let Some(ref views) = config.views {
        let kv = storage::bind_kv_store(&views.store).await?;
        tracing::debug!(store = kv.name(), "bound view counter store");
        bindings.kv = Some(kv);
    }

    Ok(bindings)
}
