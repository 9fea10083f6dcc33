//! Comment dual-writer.
//!
//! [`comment_handler`] is the router fallback: every path not claimed by
//! another handler lands here. Requests whose path does not end with the
//! configured suffix get a `404` marked `X-Worker-Hit: no`. Comment
//! submissions are written to the primary origin, whose response is
//! returned with `X-Worker-Hit: yes`, and mirrored to the secondary
//! origin through the background queue. Everything else at the endpoint
//! goes once to the pass-through origin.
//!
//! Submodules handle classification ([`classify`]), header preparation
//! ([`headers`]) and the outbound calls ([`dispatch`]).

pub mod classify;
pub mod dispatch;
pub mod headers;

use std::net::SocketAddr;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::body::{Body, Bytes};
use axum::extract::{ConnectInfo, Request, State};
use axum::http::{HeaderMap, HeaderValue, Method, StatusCode};
use axum::response::{IntoResponse, Response};

use crate::config::model::CommentsConfig;
use crate::server::AppState;
use classify::Disposition;
pub use dispatch::UpstreamError;
use dispatch::{Outbound, UpstreamResponse};
use headers::{OutboundHeaderOptions, X_WORKER_HIT};

const HIT_YES: HeaderValue = HeaderValue::from_static("yes");
const HIT_NO: HeaderValue = HeaderValue::from_static("no");

/// `404 Not found` marked as not handled.
#[must_use]
pub fn not_found() -> Response {
    (
        StatusCode::NOT_FOUND,
        [
            (hyper::header::CONTENT_TYPE, HeaderValue::from_static("text/plain")),
            (X_WORKER_HIT, HIT_NO),
        ],
        "Not found",
    )
        .into_response()
}

/// Fallback used when the comments section is not configured.
pub async fn not_found_handler() -> Response {
    not_found()
}

/// Router fallback for the comment endpoint. The path suffix is checked
/// before the body is read, so a mismatched path always gets the `404`
/// guard whatever its body; matching requests are buffered up to
/// `max_body` bytes.
pub async fn comment_handler(
    State(state): State<Arc<AppState>>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    request: Request,
    max_body: usize,
) -> Response {
    let Some(config) = state.config.comments.as_ref() else {
        return not_found();
    };

    let (parts, body) = request.into_parts();
    let (method, uri, req_headers) = (parts.method, parts.uri, parts.headers);
    if !uri.path().ends_with(&config.path_suffix) {
        tracing::debug!(method = %method, path = %uri.path(), "path does not match comment endpoint");
        return not_found();
    }

    let body = if classify::carries_body(&method) {
        match axum::body::to_bytes(body, max_body).await {
            Ok(bytes) => Some(bytes),
            Err(e) => {
                let status = body_error_status(&e);
                tracing::warn!(method = %method, path = %uri.path(), error = %e, "cannot read comment body");
                return plain(status);
            }
        }
    } else {
        None
    };

    let disposition = classify::classify(
        config.policy,
        &config.path_suffix,
        uri.path(),
        &req_headers,
        body.as_ref(),
    );

    let correlation_id = req_headers
        .get(headers::X_CORRELATION_ID)
        .and_then(|v| v.to_str().ok())
        .map_or_else(|| uuid::Uuid::new_v4().to_string(), String::from);

    let request = InboundRequest {
        method,
        path_and_query: uri.path_and_query().map_or("/", |pq| pq.as_str()),
        headers: &req_headers,
        body: body.unwrap_or_default(),
        client_ip: addr.ip().to_string(),
        correlation_id,
    };

    match disposition {
        Disposition::DualWrite => dual_write(&state, config, request).await,
        Disposition::PassThrough => pass_through(&state, config, request).await,
        Disposition::NotFound => not_found(),
    }
}

/// `413` when the body went over the limit, `400` for any other read failure.
fn body_error_status(error: &axum::Error) -> StatusCode {
    let mut source: Option<&(dyn std::error::Error + 'static)> = Some(error);
    while let Some(e) = source {
        if e.is::<http_body_util::LengthLimitError>() {
            return StatusCode::PAYLOAD_TOO_LARGE;
        }
        source = e.source();
    }
    StatusCode::BAD_REQUEST
}

fn plain(status: StatusCode) -> Response {
    (
        status,
        [(hyper::header::CONTENT_TYPE, HeaderValue::from_static("text/plain"))],
        status.canonical_reason().unwrap_or("Error"),
    )
        .into_response()
}

struct InboundRequest<'a> {
    method: Method,
    path_and_query: &'a str,
    headers: &'a HeaderMap,
    body: Bytes,
    client_ip: String,
    correlation_id: String,
}

impl InboundRequest<'_> {
    fn outbound(&self, origin: &str, strip_referer: bool) -> Result<Outbound, UpstreamError> {
        let url = dispatch::target_url(origin, self.path_and_query)?;
        let headers = headers::build_outbound_headers(
            self.headers,
            &url,
            OutboundHeaderOptions {
                client_ip: &self.client_ip,
                correlation_id: &self.correlation_id,
                strip_referer,
            },
        );
        Ok(Outbound {
            method: self.method.clone(),
            url,
            headers,
            body: self.body.clone(),
        })
    }
}

#[allow(clippy::cast_possible_truncation)]
async fn dual_write(
    state: &Arc<AppState>,
    config: &CommentsConfig,
    request: InboundRequest<'_>,
) -> Response {
    let timeout = Duration::from_millis(config.timeout_ms);
    let (primary, secondary) = match (
        request.outbound(&config.primary, true),
        request.outbound(&config.secondary, true),
    ) {
        (Ok(p), Ok(s)) => (p, s),
        (Err(e), _) | (_, Err(e)) => {
            tracing::error!(correlation_id = %request.correlation_id, error = %e, "cannot build comment write");
            state.stats.primary_failed.fetch_add(1, Ordering::Relaxed);
            return upstream_failure(&e, Some(HIT_YES));
        }
    };

    tracing::info!(
        correlation_id = %request.correlation_id,
        method = %request.method,
        path = %request.path_and_query,
        bytes = request.body.len(),
        "comment write received"
    );

    let primary_target = primary.url.to_string();
    let start = Instant::now();
    let result = dispatch::send(&state.http_client, primary, timeout).await;
    let latency_ms = start.elapsed().as_millis() as u64;

    match result {
        Ok(response) => {
            // Mirror once the primary has answered, whatever its status.
            dispatch::spawn_secondary(
                &state.background,
                state.http_client.clone(),
                secondary,
                timeout,
                request.correlation_id.clone(),
                Arc::clone(&state.stats),
            );
            state.stats.dual_written.fetch_add(1, Ordering::Relaxed);
            tracing::info!(
                correlation_id = %request.correlation_id,
                target = %primary_target,
                status = response.status.as_u16(),
                latency_ms,
                "primary write responded"
            );
            relay(response, Some(HIT_YES), &request.correlation_id)
        }
        Err(e) => {
            state.stats.primary_failed.fetch_add(1, Ordering::Relaxed);
            tracing::error!(
                correlation_id = %request.correlation_id,
                target = %primary_target,
                error = %e,
                latency_ms,
                "primary write failed"
            );
            upstream_failure(&e, Some(HIT_YES))
        }
    }
}

#[allow(clippy::cast_possible_truncation)]
async fn pass_through(
    state: &Arc<AppState>,
    config: &CommentsConfig,
    request: InboundRequest<'_>,
) -> Response {
    let timeout = Duration::from_millis(config.timeout_ms);
    let outbound = match request.outbound(config.passthrough_origin(), false) {
        Ok(o) => o,
        Err(e) => {
            tracing::error!(correlation_id = %request.correlation_id, error = %e, "cannot build pass-through");
            state.stats.primary_failed.fetch_add(1, Ordering::Relaxed);
            return upstream_failure(&e, None);
        }
    };

    let target = outbound.url.to_string();
    let start = Instant::now();
    match dispatch::send(&state.http_client, outbound, timeout).await {
        Ok(response) => {
            state.stats.passed_through.fetch_add(1, Ordering::Relaxed);
            tracing::debug!(
                correlation_id = %request.correlation_id,
                target = %target,
                status = response.status.as_u16(),
                latency_ms = start.elapsed().as_millis() as u64,
                "pass-through responded"
            );
            relay(response, None, &request.correlation_id)
        }
        Err(e) => {
            state.stats.primary_failed.fetch_add(1, Ordering::Relaxed);
            tracing::warn!(
                correlation_id = %request.correlation_id,
                target = %target,
                error = %e,
                "pass-through failed"
            );
            upstream_failure(&e, None)
        }
    }
}

/// Replay an upstream response: status, reason phrase, headers and body
/// as received, plus `X-Worker-Hit` when given.
fn relay(upstream: UpstreamResponse, hit: Option<HeaderValue>, correlation_id: &str) -> Response {
    let UpstreamResponse {
        status,
        reason,
        mut headers,
        body,
    } = upstream;

    headers::strip_response_hop_by_hop(&mut headers);
    if let Some(hit) = hit {
        headers.insert(X_WORKER_HIT, hit);
    }

    let mut builder = Response::builder().status(status);
    if let Some(reason) = reason {
        builder = builder.extension(reason);
    }
    if let Some(h) = builder.headers_mut() {
        h.extend(headers);
    }

    builder.body(Body::from(body)).unwrap_or_else(|e| {
        tracing::error!(
            correlation_id = %correlation_id,
            error = %e,
            "failed to build response"
        );
        StatusCode::BAD_GATEWAY.into_response()
    })
}

fn upstream_failure(error: &UpstreamError, hit: Option<HeaderValue>) -> Response {
    let mut response = plain(error.status());
    if let Some(hit) = hit {
        response.headers_mut().insert(X_WORKER_HIT, hit);
    }
    response
}
