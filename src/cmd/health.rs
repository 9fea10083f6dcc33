//! `tandem health`: check the health of a running instance.
//!
//! Sends a `GET /health` request to the specified URL and displays
//! the response as formatted text or raw JSON.

use http_body_util::BodyExt;
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;

use crate::cli::HealthArgs;
use crate::error::TandemError;
use crate::health::HealthResponse;

pub async fn execute(args: HealthArgs) -> Result<(), TandemError> {
    let url = format!("{}/health", args.url.trim_end_matches('/'));
    let uri: hyper::Uri = url
        .parse()
        .map_err(|e: hyper::http::uri::InvalidUri| TandemError::UriParse {
            source: Box::new(e),
        })?;

    let connector = hyper_util::client::legacy::connect::HttpConnector::new();
    let client = Client::builder(TokioExecutor::new()).build(connector);

    let req = hyper::Request::builder()
        .uri(uri)
        .body(http_body_util::Full::new(bytes::Bytes::new()))
        .map_err(|e| TandemError::HttpRequest {
            source: Box::new(e),
        })?;

    let response = tokio::time::timeout(std::time::Duration::from_secs(10), client.request(req))
        .await
        .map_err(|_| TandemError::HttpRequest {
            source: "health check timed out after 10s".into(),
        })?
        .map_err(|e| TandemError::HttpRequest {
            source: Box::new(e),
        })?;

    let status = response.status();
    let body = response
        .into_body()
        .collect()
        .await
        .map_err(|e| TandemError::HttpRequest {
            source: Box::new(e),
        })?
        .to_bytes();

    if !status.is_success() {
        return Err(TandemError::HealthCheckFailed(status));
    }

    if args.json {
        println!("{}", String::from_utf8_lossy(&body));
        return Ok(());
    }

    match serde_json::from_slice::<HealthResponse>(&body) {
        Ok(health) => print_report(&args.url, &health),
        Err(e) => {
            eprintln!("Failed to parse health response: {e}");
            println!("{}", String::from_utf8_lossy(&body));
        }
    }

    Ok(())
}

fn print_report(url: &str, health: &HealthResponse) {
    let stats = &health.stats;
    println!("\u{2713} tandem is healthy ({url})");
    println!("  uptime:         {}", format_uptime(health.uptime_seconds));
    println!(
        "  config:         {} ({})",
        health.config.source, health.config.version
    );
    println!("  handlers:       {}", health.config.handlers.join(", "));
    if let Some(ref store) = health.config.object_store {
        println!("  object store:   {store}");
    }
    if let Some(ref store) = health.config.kv_store {
        println!("  kv store:       {store}");
    }
    println!(
        "  comments:       {} dual-written, {} passed through, {} primary failures",
        stats.comments_dual_written, stats.comments_passed_through, stats.primary_failures
    );
    println!(
        "  secondary:      {} written, {} failed, {} pending",
        stats.secondary_writes, stats.secondary_failures, stats.background_pending
    );
    println!("  wallpapers:     {} served", stats.wallpapers_served);
    println!("  views:          {} recorded", stats.views_recorded);
}

fn format_uptime(seconds: u64) -> String {
    let hours = seconds / 3600;
    let minutes = (seconds % 3600) / 60;
    let secs = seconds % 60;
    if hours > 0 {
        format!("{hours}h {minutes}m {secs}s")
    } else if minutes > 0 {
        format!("{minutes}m {secs}s")
    } else {
        format!("{secs}s")
    }
}
