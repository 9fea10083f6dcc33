//! `GET /health` endpoint handler.
//!
//! Returns a [`HealthResponse`] JSON payload containing the server
//! version, uptime, config metadata, the enabled handlers with their
//! storage bindings, and cumulative request statistics.

use std::sync::atomic::Ordering;
use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::server::AppState;

#[derive(Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_seconds: u64,
    pub config: ConfigHealth,
    pub stats: StatsResponse,
}

#[derive(Serialize, Deserialize)]
pub struct ConfigHealth {
    pub source: String,
    pub version: String,
    pub handlers: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub object_store: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kv_store: Option<String>,
}

#[derive(Serialize, Deserialize)]
pub struct StatsResponse {
    pub comments_dual_written: u64,
    pub comments_passed_through: u64,
    pub primary_failures: u64,
    pub secondary_writes: u64,
    pub secondary_failures: u64,
    pub background_pending: usize,
    pub wallpapers_served: u64,
    pub views_recorded: u64,
}

pub async fn health_handler(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let stats = &state.stats;

    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: state.start_time.elapsed().as_secs(),
        config: ConfigHealth {
            source: state.source_name.clone(),
            version: state.version.short().to_string(),
            handlers: state
                .config
                .enabled_handlers()
                .into_iter()
                .map(String::from)
                .collect(),
            object_store: state.bindings.bucket.as_ref().map(|b| b.name().to_string()),
            kv_store: state.bindings.kv.as_ref().map(|k| k.name().to_string()),
        },
        stats: StatsResponse {
            comments_dual_written: stats.dual_written.load(Ordering::Relaxed),
            comments_passed_through: stats.passed_through.load(Ordering::Relaxed),
            primary_failures: stats.primary_failed.load(Ordering::Relaxed),
            secondary_writes: stats.secondary_written.load(Ordering::Relaxed),
            secondary_failures: stats.secondary_failed.load(Ordering::Relaxed),
            background_pending: state.background.pending(),
            wallpapers_served: stats.wallpapers_served.load(Ordering::Relaxed),
            views_recorded: stats.views_recorded.load(Ordering::Relaxed),
        },
    })
}
