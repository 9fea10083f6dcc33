//! Axum server setup, shared application state, and graceful shutdown.
//!
//! Contains [`AppState`] (the `Arc`-shared state holding config, HTTP
//! client, storage bindings, the background queue, stats, and uptime),
//! [`build_router`] for mounting the enabled handlers, [`build_http_client`]
//! for the connection-pooled hyper client, and [`shutdown_signal`] for
//! SIGTERM / Ctrl+C handling.

use std::net::SocketAddr;
use std::sync::atomic::AtomicU64;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::extract::{ConnectInfo, Request, State};
use axum::routing::{any, get};
use axum::Router;
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;
use tower::ServiceBuilder;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;

use crate::background::BackgroundTasks;
use crate::comments;
use crate::config::model::Config;
use crate::config::ConfigVersion;
use crate::health::health_handler;
use crate::storage::{KvStore, ObjectStore};
use crate::{views, wallpaper};

#[derive(Debug)]
pub struct Stats {
    pub dual_written: AtomicU64,
    pub passed_through: AtomicU64,
    pub primary_failed: AtomicU64,
    pub secondary_written: AtomicU64,
    pub secondary_failed: AtomicU64,
    pub wallpapers_served: AtomicU64,
    pub views_recorded: AtomicU64,
}

impl Default for Stats {
    fn default() -> Self {
        Self::new()
    }
}

impl Stats {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            dual_written: AtomicU64::new(0),
            passed_through: AtomicU64::new(0),
            primary_failed: AtomicU64::new(0),
            secondary_written: AtomicU64::new(0),
            secondary_failed: AtomicU64::new(0),
            wallpapers_served: AtomicU64::new(0),
            views_recorded: AtomicU64::new(0),
        }
    }
}

/// Storage handles the handlers reach through [`AppState`]. `None` when
/// the owning handler is not configured.
#[derive(Default, Clone)]
pub struct Bindings {
    pub bucket: Option<Arc<dyn ObjectStore>>,
    pub kv: Option<Arc<dyn KvStore>>,
}

pub type HttpsConnector =
    hyper_rustls::HttpsConnector<hyper_util::client::legacy::connect::HttpConnector>;
pub type HttpClient = Client<HttpsConnector, http_body_util::Full<bytes::Bytes>>;

pub struct AppState {
    pub config: Arc<Config>,
    pub version: ConfigVersion,
    pub source_name: String,
    pub http_client: HttpClient,
    pub bindings: Bindings,
    pub background: BackgroundTasks,
    pub start_time: Instant,
    pub stats: Arc<Stats>,
}

impl AppState {
    #[must_use]
    pub fn new(
        config: Config,
        version: ConfigVersion,
        source_name: impl Into<String>,
        bindings: Bindings,
    ) -> Self {
        let background = BackgroundTasks::new(config.background.max_in_flight);
        Self {
            config: Arc::new(config),
            version,
            source_name: source_name.into(),
            http_client: build_http_client(),
            bindings,
            background,
            start_time: Instant::now(),
            stats: Arc::new(Stats::new()),
        }
    }
}

#[must_use]
pub fn build_http_client() -> HttpClient {
    // When multiple rustls crypto providers are compiled in, rustls cannot
    // auto-detect which one to use. Explicitly install `ring`.
    let _ = rustls::crypto::ring::default_provider().install_default();

    let https = hyper_rustls::HttpsConnectorBuilder::new()
        .with_webpki_roots()
        .https_or_http()
        .enable_http1()
        .build();
    Client::builder(TokioExecutor::new())
        .pool_idle_timeout(Duration::from_secs(30))
        .build(https)
}

/// Mount the enabled handlers.
///
/// The body limit is a route layer, so it never runs ahead of the comment
/// fallback: that handler checks the path suffix first and only then
/// buffers the body under the same limit.
pub fn build_router(state: Arc<AppState>, max_body: usize) -> Router {
    let mut router = Router::new().route("/health", get(health_handler));

    if let Some(ref views_config) = state.config.views {
        // An explicit HEAD route, or axum answers HEAD with the GET handler.
        router = router.route(
            &views_config.path,
            get(views::get_views)
                .head(views::method_not_allowed)
                .post(views::post_views)
                .fallback(views::method_not_allowed),
        );
    }

    if let Some(ref wallpaper_config) = state.config.wallpaper {
        let mount = wallpaper_config.mount.trim_end_matches('/');
        router = router
            .route(mount, any(wallpaper::wallpaper_handler))
            .route(&format!("{mount}/"), any(wallpaper::wallpaper_handler))
            .route(&format!("{mount}/{{*path}}"), any(wallpaper::wallpaper_handler));
    }

    router = router.route_layer(RequestBodyLimitLayer::new(max_body));

    router = if state.config.comments.is_some() {
        router.fallback(
            move |state: State<Arc<AppState>>,
                  client: ConnectInfo<SocketAddr>,
                  request: Request| {
                comments::comment_handler(state, client, request, max_body)
            },
        )
    } else {
        router.fallback(comments::not_found_handler)
    };

    router
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()))
        .with_state(state)
}

pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => tracing::info!("received Ctrl+C"),
        () = terminate => tracing::info!("received SIGTERM"),
    }
}
