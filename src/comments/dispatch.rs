//! Outbound calls to the comment origins.
//!
//! [`send`] issues one request and buffers the whole response so it can
//! be replayed to the caller. [`spawn_secondary`] hands the mirror write
//! to the [`BackgroundTasks`] queue; its outcome is only ever logged and
//! counted, never returned.

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::http::{HeaderMap, Method, StatusCode};
use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::ext::ReasonPhrase;

use crate::background::BackgroundTasks;
use crate::server::{HttpClient, Stats};

#[derive(Debug, thiserror::Error)]
pub enum UpstreamError {
    #[error("invalid upstream URL: {0}")]
    Url(#[from] url::ParseError),

    #[error("failed to build request: {0}")]
    Build(#[from] axum::http::Error),

    #[error("request timed out after {}ms", .0.as_millis())]
    Timeout(Duration),

    #[error("{0}")]
    Request(#[from] hyper_util::client::legacy::Error),

    #[error("body read error: {0}")]
    Body(#[from] hyper::Error),
}

impl UpstreamError {
    /// Status the caller sees when the authoritative call fails.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
            _ => StatusCode::BAD_GATEWAY,
        }
    }
}

/// One fully-specified outbound request. Cloning is cheap: the body is
/// reference-counted and shared between the primary and secondary.
#[derive(Debug, Clone)]
pub struct Outbound {
    pub method: Method,
    pub url: url::Url,
    pub headers: HeaderMap,
    pub body: Bytes,
}

#[derive(Debug)]
pub struct UpstreamResponse {
    pub status: StatusCode,
    pub reason: Option<ReasonPhrase>,
    pub headers: HeaderMap,
    pub body: Bytes,
}

/// Join an origin with the inbound path and query.
///
/// `https://comment1.example.com` + `/wp-admin/admin-ajax.php?x=1`
/// gives `https://comment1.example.com/wp-admin/admin-ajax.php?x=1`; an
/// origin path such as `/blog` is kept as a prefix.
pub fn target_url(origin: &str, path_and_query: &str) -> Result<url::Url, url::ParseError> {
    url::Url::parse(&format!("{}{}", origin.trim_end_matches('/'), path_and_query))
}

/// Send `outbound` and buffer the response. Redirects are never followed.
pub async fn send(
    client: &HttpClient,
    outbound: Outbound,
    timeout: Duration,
) -> Result<UpstreamResponse, UpstreamError> {
    let mut builder = hyper::Request::builder()
        .method(outbound.method)
        .uri(outbound.url.as_str());
    if let Some(headers) = builder.headers_mut() {
        headers.extend(outbound.headers);
    }
    let req = builder.body(Full::new(outbound.body))?;

    // One deadline for the whole exchange, headers and body together.
    let exchange = async {
        let response = client.request(req).await?;
        let status = response.status();
        let reason = response.extensions().get::<ReasonPhrase>().cloned();
        let headers = response.headers().clone();
        let body = response.into_body().collect().await?.to_bytes();
        Ok::<_, UpstreamError>(UpstreamResponse {
            status,
            reason,
            headers,
            body,
        })
    };

    tokio::time::timeout(timeout, exchange)
        .await
        .map_err(|_| UpstreamError::Timeout(timeout))?
}

/// Queue the mirror write. Errors and non-2xx statuses are logged and
/// counted in `stats.secondary_failed`.
#[allow(clippy::cast_possible_truncation)]
pub fn spawn_secondary(
    background: &BackgroundTasks,
    client: HttpClient,
    outbound: Outbound,
    timeout: Duration,
    correlation_id: String,
    stats: Arc<Stats>,
) {
    background.spawn("secondary-write", async move {
        let target = outbound.url.to_string();
        let start = Instant::now();
        let result = send(&client, outbound, timeout).await;
        let latency_ms = start.elapsed().as_millis() as u64;

        match result {
            Ok(response) if response.status.is_success() => {
                stats.secondary_written.fetch_add(1, Ordering::Relaxed);
                tracing::info!(
                    correlation_id = %correlation_id,
                    target = %target,
                    status = response.status.as_u16(),
                    latency_ms,
                    "secondary write landed"
                );
            }
            Ok(response) => {
                stats.secondary_failed.fetch_add(1, Ordering::Relaxed);
                tracing::warn!(
                    correlation_id = %correlation_id,
                    target = %target,
                    status = response.status.as_u16(),
                    latency_ms,
                    "secondary write rejected"
                );
            }
            Err(e) => {
                stats.secondary_failed.fetch_add(1, Ordering::Relaxed);
                tracing::warn!(
                    correlation_id = %correlation_id,
                    target = %target,
                    error = %e,
                    latency_ms,
                    "secondary write failed"
                );
            }
        }
    });
}

#[cfg(test)]
mod tests {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    use super::*;

    /// Origin that sends its headers after 200ms and the body 200ms later.
    async fn dribbling_origin() -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = [0u8; 4096];
            let _ = socket.read(&mut buf).await;
            tokio::time::sleep(Duration::from_millis(200)).await;
            let _ = socket
                .write_all(b"HTTP/1.1 200 OK\r\nContent-Length: 2\r\n\r\n")
                .await;
            let _ = socket.flush().await;
            tokio::time::sleep(Duration::from_millis(200)).await;
            let _ = socket.write_all(b"ok").await;
        });
        format!("http://{addr}")
    }

    #[test]
    fn target_url_joins_path_and_query() {
        let url = target_url("https://comment1.example.com/", "/wp-admin/admin-ajax.php?x=1").unwrap();
        assert_eq!(url.as_str(), "https://comment1.example.com/wp-admin/admin-ajax.php?x=1");
    }

    #[test]
    fn target_url_keeps_origin_prefix() {
        let url = target_url("http://node2:8080/blog", "/wp-admin/admin-ajax.php").unwrap();
        assert_eq!(url.as_str(), "http://node2:8080/blog/wp-admin/admin-ajax.php");
    }

    #[test]
    fn timeout_maps_to_gateway_timeout() {
        assert_eq!(
            UpstreamError::Timeout(Duration::from_secs(1)).status(),
            StatusCode::GATEWAY_TIMEOUT
        );
        let parse = target_url("not a url", "/x").unwrap_err();
        assert_eq!(UpstreamError::from(parse).status(), StatusCode::BAD_GATEWAY);
    }

    #[tokio::test]
    async fn timeout_covers_headers_and_body_together() {
        let origin = dribbling_origin().await;
        let client = crate::server::build_http_client();
        let outbound = Outbound {
            method: Method::POST,
            url: target_url(&origin, "/wp-comments-post.php").unwrap(),
            headers: HeaderMap::new(),
            body: Bytes::from_static(b"comment=hi"),
        };

        // Each phase alone fits in 300ms; the two together do not.
        let result = send(&client, outbound, Duration::from_millis(300)).await;
        assert!(matches!(result, Err(UpstreamError::Timeout(_))), "{result:?}");
    }
}
