//! Outbound header preparation and hop-by-hop stripping.
//!
//! [`build_outbound_headers`] clones the inbound headers, strips
//! hop-by-hop headers, optionally drops `Referer`, rewrites `Host` to the
//! target origin and appends the client to `X-Forwarded-For`. The same
//! inputs always produce the same map apart from `Host`, which is what
//! keeps the primary and secondary writes identical.

use std::sync::LazyLock;

use axum::http::{HeaderMap, HeaderName, HeaderValue};

pub const X_WORKER_HIT: HeaderName = HeaderName::from_static("x-worker-hit");
pub const X_CORRELATION_ID: HeaderName = HeaderName::from_static("x-correlation-id");

static HOP_BY_HOP: LazyLock<Vec<HeaderName>> = LazyLock::new(|| {
    [
        "connection",
        "keep-alive",
        "transfer-encoding",
        "te",
        "trailer",
        "upgrade",
        "proxy-authorization",
        "proxy-authenticate",
    ]
    .iter()
    .filter_map(|name| name.parse::<HeaderName>().ok())
    .collect()
});

/// Strip hop-by-hop headers and `content-length` from an upstream response.
///
/// The body has already been fully collected, so `transfer-encoding` and
/// `content-length` from the origin are no longer accurate. Axum sets the
/// correct `content-length` from the actual body bytes.
pub fn strip_response_hop_by_hop(headers: &mut HeaderMap) {
    for name in HOP_BY_HOP.iter() {
        headers.remove(name);
    }
    headers.remove(hyper::header::CONTENT_LENGTH);
}

#[derive(Debug, Clone, Copy)]
pub struct OutboundHeaderOptions<'a> {
    pub client_ip: &'a str,
    pub correlation_id: &'a str,
    /// Drop `Referer`; set for dual-writes, clear for pass-through.
    pub strip_referer: bool,
}

pub fn build_outbound_headers(
    original: &HeaderMap,
    target_url: &url::Url,
    opts: OutboundHeaderOptions<'_>,
) -> HeaderMap {
    let mut headers = original.clone();

    for header_name in HOP_BY_HOP.iter() {
        headers.remove(header_name);
    }
    // The body is re-sent in full; hyper computes the length.
    headers.remove(hyper::header::CONTENT_LENGTH);

    if opts.strip_referer {
        headers.remove(hyper::header::REFERER);
    }

    if let Some(host) = target_url.host_str() {
        let host_value = target_url
            .port()
            .map_or_else(|| host.to_string(), |port| format!("{host}:{port}"));
        if let Ok(val) = HeaderValue::from_str(&host_value) {
            headers.insert(hyper::header::HOST, val);
        }
    }

    let xff = headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .map_or_else(
            || opts.client_ip.to_string(),
            |existing| format!("{existing}, {}", opts.client_ip),
        );
    if let Ok(val) = HeaderValue::from_str(&xff) {
        headers.insert("x-forwarded-for", val);
    }

    if let Ok(val) = HeaderValue::from_str(opts.correlation_id) {
        headers.insert(X_CORRELATION_ID, val);
    }

    headers
}
