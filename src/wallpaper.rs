//! Random wallpaper redirect.
//!
//! Classifies the caller as PC or mobile (explicit `fallback_*.jpg` file
//! name first, then `User-Agent`), lists the matching prefix of the
//! bound [`ObjectStore`], and answers `302` to one object picked
//! uniformly at random. Every region redirects into the same bucket, so
//! all nodes draw from one pool.

use std::sync::atomic::Ordering;
use std::sync::Arc;

use axum::extract::State;
use axum::http::{HeaderMap, HeaderName, HeaderValue, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use rand::seq::IndexedRandom;
use rand::Rng;

use crate::config::model::WallpaperConfig;
use crate::server::AppState;
use crate::storage::ObjectEntry;

const CDN_CACHE_CONTROL: HeaderName = HeaderName::from_static("cdn-cache-control");

const MOBILE_TOKENS: &[&str] = &[
    "iphone",
    "ipod",
    "android",
    "blackberry",
    "iemobile",
    "opera mini",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Device {
    Pc,
    Mobile,
}

impl Device {
    #[must_use]
    pub fn prefix(self, config: &WallpaperConfig) -> &str {
        match self {
            Self::Pc => &config.pc_prefix,
            Self::Mobile => &config.mobile_prefix,
        }
    }
}

/// Explicit file name wins; otherwise sniff the user agent.
#[must_use]
pub fn classify_device(path: &str, user_agent: Option<&str>) -> Device {
    let path = path.to_ascii_lowercase();
    if path.ends_with("fallback_mobile.jpg") {
        return Device::Mobile;
    }
    if path.ends_with("fallback_pc.jpg") {
        return Device::Pc;
    }

    let ua = user_agent.unwrap_or_default().to_ascii_lowercase();
    if MOBILE_TOKENS.iter().any(|token| ua.contains(token)) {
        Device::Mobile
    } else {
        Device::Pc
    }
}

pub fn pick<'a, R: Rng + ?Sized>(entries: &'a [ObjectEntry], rng: &mut R) -> Option<&'a ObjectEntry> {
    entries.choose(rng)
}

#[must_use]
pub fn public_url(base: &str, key: &str) -> String {
    format!("{}/{}", base.trim_end_matches('/'), key.trim_start_matches('/'))
}

fn text(status: StatusCode, body: &'static str) -> Response {
    (status, body).into_response()
}

pub async fn wallpaper_handler(
    State(state): State<Arc<AppState>>,
    uri: Uri,
    headers: HeaderMap,
) -> Response {
    let (Some(config), Some(bucket)) = (state.config.wallpaper.as_ref(), state.bindings.bucket.as_ref())
    else {
        tracing::error!("wallpaper route reached without a bound bucket");
        return text(StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error");
    };

    let user_agent = headers
        .get(hyper::header::USER_AGENT)
        .and_then(|v| v.to_str().ok());
    let device = classify_device(uri.path(), user_agent);
    let prefix = device.prefix(config);

    tracing::debug!(path = %uri.path(), device = ?device, prefix = %prefix, "selecting wallpaper");

    let entries = match bucket.list(prefix).await {
        Ok(entries) => entries,
        Err(e) => {
            tracing::error!(store = bucket.name(), prefix = %prefix, error = %e, "wallpaper listing failed");
            return text(StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error");
        }
    };

    let Some(entry) = pick(&entries, &mut rand::rng()) else {
        tracing::warn!(prefix = %prefix, "no wallpapers under prefix");
        return text(StatusCode::NOT_FOUND, "No images found");
    };

    let location = public_url(&config.public_base_url, &entry.key);
    let Ok(location_value) = HeaderValue::from_str(&location) else {
        tracing::error!(key = %entry.key, "object key is not a valid header value");
        return text(StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error");
    };

    state.stats.wallpapers_served.fetch_add(1, Ordering::Relaxed);

    let mut response = StatusCode::FOUND.into_response();
    let out = response.headers_mut();
    out.insert(hyper::header::LOCATION, location_value);
    if let Ok(v) = HeaderValue::from_str(&format!("public, max-age={}", config.browser_max_age)) {
        out.insert(hyper::header::CACHE_CONTROL, v);
    }
    if let Ok(v) = HeaderValue::from_str(&format!("public, max-age={}", config.cdn_max_age)) {
        out.insert(CDN_CACHE_CONTROL, v);
    }
    if let Some(v) = entry.etag.as_deref().and_then(|e| HeaderValue::from_str(e).ok()) {
        out.insert(hyper::header::ETAG, v);
    }
    response
}
