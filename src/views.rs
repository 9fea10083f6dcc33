//! Page-view counter.
//!
//! `GET {path}?slug=...` reads the count for a slug, `POST {path}` with
//! `{"slug": "..."}` bumps it and returns the new value. Counts live in
//! the bound [`KvStore`](crate::storage::KvStore) under `views:{slug}` as
//! decimal strings. The read-then-write is not atomic, so concurrent
//! posts for one slug can undercount; the figure is a traffic estimate.

use std::collections::HashMap;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{Query, State};
use axum::http::{HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::server::AppState;
use crate::storage::{KvStore, StorageError};

const MAX_SLUG_LEN: usize = 100;

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct ViewsResponse {
    pub success: bool,
    pub views: u64,
}

/// `^[a-z0-9-]{1,100}$`
#[must_use]
pub fn is_valid_slug(slug: &str) -> bool {
    (1..=MAX_SLUG_LEN).contains(&slug.len())
        && slug
            .bytes()
            .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'-')
}

#[must_use]
pub fn storage_key(slug: &str) -> String {
    format!("views:{slug}")
}

/// Missing or unparseable values count as zero.
fn parse_count(stored: Option<&str>) -> u64 {
    stored.and_then(|v| v.trim().parse().ok()).unwrap_or(0)
}

pub async fn current_views(kv: &dyn KvStore, slug: &str) -> Result<u64, StorageError> {
    let stored = kv.get(&storage_key(slug)).await?;
    Ok(parse_count(stored.as_deref()))
}

pub async fn record_view(kv: &dyn KvStore, slug: &str) -> Result<u64, StorageError> {
    let key = storage_key(slug);
    let next = parse_count(kv.get(&key).await?.as_deref()).saturating_add(1);
    kv.put(&key, &next.to_string()).await?;
    Ok(next)
}

fn text(status: StatusCode, body: &'static str) -> Response {
    (status, body).into_response()
}

fn invalid_slug() -> Response {
    text(StatusCode::BAD_REQUEST, "Invalid slug format")
}

fn internal_error() -> Response {
    text(StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error")
}

fn json(views: u64) -> Response {
    let mut response = Json(ViewsResponse {
        success: true,
        views,
    })
    .into_response();
    response
        .headers_mut()
        .insert(hyper::header::CACHE_CONTROL, HeaderValue::from_static("no-store"));
    response
}

fn kv(state: &AppState) -> Option<&dyn KvStore> {
    let kv = state.bindings.kv.as_deref();
    if kv.is_none() {
        tracing::error!("views route reached without a bound KV store");
    }
    kv
}

pub async fn get_views(
    State(state): State<Arc<AppState>>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    let Some(slug) = params.get("slug").filter(|s| is_valid_slug(s)) else {
        return invalid_slug();
    };
    let Some(kv) = kv(&state) else {
        return internal_error();
    };

    match current_views(kv, slug).await {
        Ok(views) => json(views),
        Err(e) => {
            tracing::error!(slug = %slug, error = %e, "views lookup failed");
            internal_error()
        }
    }
}

#[derive(Deserialize)]
struct RecordRequest {
    slug: Option<serde_json::Value>,
}

/// The body is parsed by hand so that any malformed payload, not just a
/// bad slug, gets the same `400` answer.
pub async fn post_views(State(state): State<Arc<AppState>>, body: Bytes) -> Response {
    let slug = serde_json::from_slice::<RecordRequest>(&body)
        .ok()
        .and_then(|r| r.slug)
        .and_then(|v| v.as_str().map(String::from));
    let Some(slug) = slug.filter(|s| is_valid_slug(s)) else {
        return invalid_slug();
    };
    let Some(kv) = kv(&state) else {
        return internal_error();
    };

    match record_view(kv, &slug).await {
        Ok(views) => {
            state.stats.views_recorded.fetch_add(1, Ordering::Relaxed);
            tracing::debug!(slug = %slug, views, "view recorded");
            json(views)
        }
        Err(e) => {
            tracing::error!(slug = %slug, error = %e, "views update failed");
            internal_error()
        }
    }
}

pub async fn method_not_allowed() -> Response {
    text(StatusCode::METHOD_NOT_ALLOWED, "Invalid request")
}
