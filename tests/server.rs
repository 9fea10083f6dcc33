//! Integration tests for the HTTP server: the three handlers end to end,
//! the health endpoint, and graceful shutdown.
//!
//! Comment tests run two fake origins that record every request they
//! receive; secondary writes are awaited through `BackgroundTasks::flush`.

use std::net::SocketAddr;
use std::sync::atomic::Ordering;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use axum::body::Bytes;
use axum::http::{HeaderMap, Method, StatusCode, Uri};
use axum::Router;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

use tandem::config::model::{
    BackgroundConfig, CommentPolicy, CommentsConfig, Config, KvStoreConfig, ObjectStoreConfig,
    ViewsConfig, WallpaperConfig,
};
use tandem::config::ConfigVersion;
use tandem::health::HealthResponse;
use tandem::server::{self, AppState, Bindings};
use tandem::storage::memory::{MemoryBucket, MemoryKv};
use tandem::views::ViewsResponse;

const COMMENT_FORM: &str = "comment_post_ID=42&comment=Nice+post&author=Ada&action=submit_comment";

#[derive(Debug, Clone)]
struct Recorded {
    method: Method,
    uri: String,
    headers: HeaderMap,
    body: Bytes,
}

struct Upstream {
    addr: SocketAddr,
    hits: Arc<Mutex<Vec<Recorded>>>,
}

impl Upstream {
    fn origin(&self) -> String {
        format!("http://{}", self.addr)
    }

    fn hits(&self) -> Vec<Recorded> {
        self.hits.lock().unwrap().clone()
    }
}

async fn start_upstream(status: StatusCode, reply: &'static str) -> Upstream {
    start_slow_upstream(status, reply, Duration::ZERO).await
}

/// Records each request on arrival, then waits `delay` before answering.
async fn start_slow_upstream(status: StatusCode, reply: &'static str, delay: Duration) -> Upstream {
    let hits = Arc::new(Mutex::new(Vec::new()));
    let recorder = hits.clone();

    let app = Router::new().fallback(
        move |method: Method, uri: Uri, headers: HeaderMap, body: Bytes| {
            let recorder = recorder.clone();
            async move {
                recorder.lock().unwrap().push(Recorded {
                    method,
                    uri: uri.to_string(),
                    headers,
                    body,
                });
                tokio::time::sleep(delay).await;
                (status, [("x-origin-marker", "seen")], reply)
            }
        },
    );

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    Upstream { addr, hits }
}

/// Read one HTTP/1.1 request (headers plus a `content-length` body) off a
/// raw socket.
async fn read_raw_request(socket: &mut TcpStream) -> String {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 1024];
    loop {
        let n = socket.read(&mut chunk).await.unwrap();
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);
        let text = String::from_utf8_lossy(&buf);
        if let Some(end) = text.find("\r\n\r\n") {
            let length = text[..end]
                .lines()
                .find_map(|line| {
                    let (name, value) = line.split_once(':')?;
                    name.eq_ignore_ascii_case("content-length")
                        .then(|| value.trim().parse::<usize>().ok())
                        .flatten()
                })
                .unwrap_or(0);
            if buf.len() >= end + 4 + length {
                break;
            }
        }
    }
    String::from_utf8_lossy(&buf).into_owned()
}

/// Origin that answers every request with a fixed raw response, so the
/// status line can carry a non-canonical reason phrase.
async fn start_raw_origin(response: &'static str) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        loop {
            let Ok((mut socket, _)) = listener.accept().await else {
                return;
            };
            tokio::spawn(async move {
                read_raw_request(&mut socket).await;
                let _ = socket.write_all(response.as_bytes()).await;
                let _ = socket.shutdown().await;
            });
        }
    });
    format!("http://{addr}")
}

/// An origin nobody listens on.
async fn dead_origin() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{addr}")
}

fn comments_config(primary: String, secondary: String) -> CommentsConfig {
    CommentsConfig {
        path_suffix: "/admin-ajax.php".into(),
        primary,
        secondary,
        passthrough: None,
        policy: CommentPolicy::ContentAware,
        timeout_ms: 5_000,
    }
}

fn wallpaper_config() -> WallpaperConfig {
    WallpaperConfig {
        mount: "/wallpaper".into(),
        public_base_url: "https://img.example.com".into(),
        pc_prefix: "pc_img/".into(),
        mobile_prefix: "mobile_img/".into(),
        browser_max_age: 600,
        cdn_max_age: 604_800,
        store: ObjectStoreConfig::Memory { keys: vec![] },
    }
}

fn views_config() -> ViewsConfig {
    ViewsConfig {
        path: "/views-track".into(),
        store: KvStoreConfig::Memory,
    }
}

struct TestServer {
    addr: SocketAddr,
    state: Arc<AppState>,
    shutdown: tokio::sync::oneshot::Sender<()>,
}

impl TestServer {
    fn url(&self, path: &str) -> String {
        format!("http://{}{path}", self.addr)
    }

    fn stop(self) {
        let _ = self.shutdown.send(());
    }
}

async fn start_server(config: Config, bindings: Bindings) -> TestServer {
    start_server_with_limit(config, bindings, 1_048_576).await
}

async fn start_server_with_limit(config: Config, bindings: Bindings, max_body: usize) -> TestServer {
    let state = Arc::new(AppState::new(
        config,
        ConfigVersion::Hash("test-hash".into()),
        "test",
        bindings,
    ));

    let router = server::build_router(state.clone(), max_body);

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();

    tokio::spawn(async move {
        axum::serve(
            listener,
            router.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(async {
            let _ = shutdown_rx.await;
        })
        .await
        .unwrap();
    });

    TestServer {
        addr,
        state,
        shutdown: shutdown_tx,
    }
}

async fn start_comments_server(comments: CommentsConfig) -> TestServer {
    let config = Config {
        comments: Some(comments),
        wallpaper: None,
        views: None,
        background: BackgroundConfig::default(),
    };
    start_server(config, Bindings::default()).await
}

async fn start_full_server(bucket: MemoryBucket) -> TestServer {
    let config = Config {
        comments: None,
        wallpaper: Some(wallpaper_config()),
        views: Some(views_config()),
        background: BackgroundConfig::default(),
    };
    let bindings = Bindings {
        bucket: Some(Arc::new(bucket)),
        kv: Some(Arc::new(MemoryKv::new())),
    };
    start_server(config, bindings).await
}

fn no_redirect_client() -> reqwest::Client {
    reqwest::Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .build()
        .unwrap()
}

async fn post_comment(server: &TestServer) -> reqwest::Response {
    reqwest::Client::new()
        .post(server.url("/wp-admin/admin-ajax.php?lang=en"))
        .header("content-type", "application/x-www-form-urlencoded")
        .header("referer", "https://blog.example.com/2024/hello-world/")
        .body(COMMENT_FORM)
        .send()
        .await
        .unwrap()
}

// -- comment dual-writer --

#[tokio::test]
async fn non_comment_path_returns_404_without_calling_origins() {
    let primary = start_upstream(StatusCode::OK, "primary").await;
    let secondary = start_upstream(StatusCode::OK, "secondary").await;
    let server = start_comments_server(comments_config(primary.origin(), secondary.origin())).await;

    let resp = reqwest::get(server.url("/wp-login.php")).await.unwrap();
    assert_eq!(resp.status(), 404);
    assert_eq!(resp.headers()["x-worker-hit"], "no");
    assert_eq!(resp.text().await.unwrap(), "Not found");

    server.state.background.flush().await;
    assert!(primary.hits().is_empty());
    assert!(secondary.hits().is_empty());

    server.stop();
}

#[tokio::test]
async fn oversized_body_on_other_path_still_gets_404() {
    let primary = start_upstream(StatusCode::OK, "primary").await;
    let secondary = start_upstream(StatusCode::OK, "secondary").await;
    let config = Config {
        comments: Some(comments_config(primary.origin(), secondary.origin())),
        wallpaper: None,
        views: None,
        background: BackgroundConfig::default(),
    };
    let server = start_server_with_limit(config, Bindings::default(), 32).await;

    let resp = reqwest::Client::new()
        .post(server.url("/wp-login.php"))
        .header("content-type", "application/x-www-form-urlencoded")
        .body("log=admin&pwd=".to_string() + &"x".repeat(64))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);
    assert_eq!(resp.headers()["x-worker-hit"], "no");

    let resp = reqwest::Client::new()
        .post(server.url("/wp-admin/admin-ajax.php"))
        .header("content-type", "application/x-www-form-urlencoded")
        .body(COMMENT_FORM)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 413);
    assert!(resp.headers().get("x-worker-hit").is_none());

    server.state.background.flush().await;
    assert!(primary.hits().is_empty());
    assert!(secondary.hits().is_empty());

    server.stop();
}

#[tokio::test]
async fn comment_is_written_to_both_origins() {
    let primary = start_upstream(StatusCode::OK, "{\"success\":true}").await;
    let secondary = start_upstream(StatusCode::OK, "mirror").await;
    let server = start_comments_server(comments_config(primary.origin(), secondary.origin())).await;

    let resp = post_comment(&server).await;
    assert_eq!(resp.status(), 200);
    assert_eq!(resp.headers()["x-worker-hit"], "yes");
    assert_eq!(resp.headers()["x-origin-marker"], "seen");
    assert_eq!(resp.text().await.unwrap(), "{\"success\":true}");

    server.state.background.flush().await;

    let primary_hits = primary.hits();
    let secondary_hits = secondary.hits();
    assert_eq!(primary_hits.len(), 1);
    assert_eq!(secondary_hits.len(), 1);

    let (p, s) = (&primary_hits[0], &secondary_hits[0]);
    assert_eq!(p.method, Method::POST);
    assert_eq!(s.method, Method::POST);
    assert_eq!(p.uri, "/wp-admin/admin-ajax.php?lang=en");
    assert_eq!(s.uri, p.uri);
    assert_eq!(p.body, Bytes::from_static(COMMENT_FORM.as_bytes()));
    assert_eq!(s.body, p.body);
    assert!(p.headers.get("referer").is_none());
    assert!(s.headers.get("referer").is_none());
    assert_eq!(p.headers["host"], primary.addr.to_string().as_str());
    assert_eq!(s.headers["host"], secondary.addr.to_string().as_str());
    assert_eq!(
        p.headers["x-correlation-id"],
        s.headers["x-correlation-id"]
    );

    let stats = &server.state.stats;
    assert_eq!(stats.dual_written.load(Ordering::Relaxed), 1);
    assert_eq!(stats.secondary_written.load(Ordering::Relaxed), 1);
    assert_eq!(stats.secondary_failed.load(Ordering::Relaxed), 0);

    server.stop();
}

#[tokio::test]
async fn primary_error_status_is_relayed() {
    let primary = start_upstream(StatusCode::FORBIDDEN, "Duplicate comment detected").await;
    let secondary = start_upstream(StatusCode::OK, "mirror").await;
    let server = start_comments_server(comments_config(primary.origin(), secondary.origin())).await;

    let resp = post_comment(&server).await;
    assert_eq!(resp.status(), 403);
    assert_eq!(resp.headers()["x-worker-hit"], "yes");
    assert_eq!(resp.text().await.unwrap(), "Duplicate comment detected");

    server.stop();
}

#[tokio::test]
async fn primary_redirect_is_relayed_with_its_reason_phrase() {
    let primary = start_raw_origin(
        "HTTP/1.1 302 Moved Along\r\n\
         Location: https://blog.example.com/?p=42#comment-7\r\n\
         Content-Length: 0\r\n\
         Connection: close\r\n\r\n",
    )
    .await;
    let secondary = start_upstream(StatusCode::OK, "mirror").await;
    let server = start_comments_server(comments_config(primary, secondary.origin())).await;

    let request = format!(
        "POST /wp-admin/admin-ajax.php HTTP/1.1\r\n\
         Host: {}\r\n\
         Content-Type: application/x-www-form-urlencoded\r\n\
         Content-Length: {}\r\n\
         Connection: close\r\n\r\n{COMMENT_FORM}",
        server.addr,
        COMMENT_FORM.len()
    );
    let mut socket = TcpStream::connect(server.addr).await.unwrap();
    socket.write_all(request.as_bytes()).await.unwrap();
    let mut raw = Vec::new();
    socket.read_to_end(&mut raw).await.unwrap();
    let raw = String::from_utf8_lossy(&raw).to_ascii_lowercase();

    assert!(raw.starts_with("http/1.1 302 moved along\r\n"), "{raw}");
    assert!(raw.contains("location: https://blog.example.com/?p=42#comment-7\r\n"));
    assert!(raw.contains("x-worker-hit: yes\r\n"));

    server.state.background.flush().await;
    assert_eq!(secondary.hits().len(), 1);

    server.stop();
}

#[tokio::test]
async fn primary_timeout_returns_504() {
    let primary = start_slow_upstream(StatusCode::OK, "late", Duration::from_secs(2)).await;
    let secondary = start_upstream(StatusCode::OK, "mirror").await;
    let mut config = comments_config(primary.origin(), secondary.origin());
    config.timeout_ms = 200;
    let server = start_comments_server(config).await;

    let resp = post_comment(&server).await;
    assert_eq!(resp.status(), 504);
    assert_eq!(resp.headers()["x-worker-hit"], "yes");

    server.state.background.flush().await;
    assert!(secondary.hits().is_empty());
    assert_eq!(server.state.stats.primary_failed.load(Ordering::Relaxed), 1);

    server.stop();
}

#[tokio::test]
async fn slow_secondary_does_not_delay_response() {
    let primary = start_upstream(StatusCode::OK, "stored").await;
    let secondary = start_slow_upstream(StatusCode::OK, "mirror", Duration::from_secs(2)).await;
    let server = start_comments_server(comments_config(primary.origin(), secondary.origin())).await;

    let start = Instant::now();
    let resp = post_comment(&server).await;
    assert_eq!(resp.status(), 200);
    assert_eq!(resp.text().await.unwrap(), "stored");
    assert!(start.elapsed() < Duration::from_secs(1), "took {:?}", start.elapsed());

    server.state.background.flush().await;
    assert_eq!(secondary.hits().len(), 1);
    assert_eq!(server.state.stats.secondary_written.load(Ordering::Relaxed), 1);

    server.stop();
}

#[tokio::test]
async fn secondary_failure_does_not_affect_response() {
    let primary = start_upstream(StatusCode::OK, "stored").await;
    let server = start_comments_server(comments_config(primary.origin(), dead_origin().await)).await;

    let resp = post_comment(&server).await;
    assert_eq!(resp.status(), 200);
    assert_eq!(resp.headers()["x-worker-hit"], "yes");
    assert_eq!(resp.text().await.unwrap(), "stored");

    server.state.background.flush().await;
    let stats = &server.state.stats;
    assert_eq!(stats.secondary_failed.load(Ordering::Relaxed), 1);
    assert_eq!(stats.secondary_written.load(Ordering::Relaxed), 0);

    server.stop();
}

#[tokio::test]
async fn secondary_error_status_counts_as_failure() {
    let primary = start_upstream(StatusCode::OK, "stored").await;
    let secondary = start_upstream(StatusCode::INTERNAL_SERVER_ERROR, "boom").await;
    let server = start_comments_server(comments_config(primary.origin(), secondary.origin())).await;

    let resp = post_comment(&server).await;
    assert_eq!(resp.status(), 200);

    server.state.background.flush().await;
    assert_eq!(secondary.hits().len(), 1);
    assert_eq!(server.state.stats.secondary_failed.load(Ordering::Relaxed), 1);

    server.stop();
}

#[tokio::test]
async fn unreachable_primary_returns_502_and_skips_secondary() {
    let secondary = start_upstream(StatusCode::OK, "mirror").await;
    let server = start_comments_server(comments_config(dead_origin().await, secondary.origin())).await;

    let resp = post_comment(&server).await;
    assert_eq!(resp.status(), 502);
    assert_eq!(resp.headers()["x-worker-hit"], "yes");

    server.state.background.flush().await;
    assert!(secondary.hits().is_empty());
    assert_eq!(server.state.stats.primary_failed.load(Ordering::Relaxed), 1);

    server.stop();
}

#[tokio::test]
async fn heartbeat_is_passed_through_once() {
    let primary = start_upstream(StatusCode::OK, "{\"wp-auth-check\":true}").await;
    let secondary = start_upstream(StatusCode::OK, "mirror").await;
    let server = start_comments_server(comments_config(primary.origin(), secondary.origin())).await;

    let resp = reqwest::Client::new()
        .post(server.url("/wp-admin/admin-ajax.php"))
        .header("content-type", "application/x-www-form-urlencoded")
        .header("referer", "https://blog.example.com/wp-admin/")
        .body("action=heartbeat&interval=60")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    assert!(resp.headers().get("x-worker-hit").is_none());
    assert_eq!(resp.text().await.unwrap(), "{\"wp-auth-check\":true}");

    server.state.background.flush().await;
    let hits = primary.hits();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].headers["referer"], "https://blog.example.com/wp-admin/");
    assert!(secondary.hits().is_empty());
    assert_eq!(server.state.stats.passed_through.load(Ordering::Relaxed), 1);

    server.stop();
}

#[tokio::test]
async fn passthrough_origin_receives_non_comment_traffic() {
    let primary = start_upstream(StatusCode::OK, "primary").await;
    let secondary = start_upstream(StatusCode::OK, "secondary").await;
    let passthrough = start_upstream(StatusCode::OK, "local").await;
    let mut config = comments_config(primary.origin(), secondary.origin());
    config.passthrough = Some(passthrough.origin());
    let server = start_comments_server(config).await;

    let resp = reqwest::get(server.url("/wp-admin/admin-ajax.php?action=load_more"))
        .await
        .unwrap();
    assert_eq!(resp.text().await.unwrap(), "local");

    server.state.background.flush().await;
    assert_eq!(passthrough.hits().len(), 1);
    assert_eq!(passthrough.hits()[0].method, Method::GET);
    assert!(primary.hits().is_empty());
    assert!(secondary.hits().is_empty());

    server.stop();
}

#[tokio::test]
async fn duplicate_all_policy_mirrors_every_request() {
    let primary = start_upstream(StatusCode::OK, "primary").await;
    let secondary = start_upstream(StatusCode::OK, "secondary").await;
    let mut config = comments_config(primary.origin(), secondary.origin());
    config.policy = CommentPolicy::DuplicateAll;
    let server = start_comments_server(config).await;

    let resp = reqwest::get(server.url("/blog/wp-admin/admin-ajax.php?action=heartbeat"))
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    assert_eq!(resp.headers()["x-worker-hit"], "yes");
    assert_eq!(resp.text().await.unwrap(), "primary");

    server.state.background.flush().await;
    assert_eq!(primary.hits().len(), 1);
    assert_eq!(secondary.hits().len(), 1);
    assert_eq!(secondary.hits()[0].uri, "/blog/wp-admin/admin-ajax.php?action=heartbeat");

    server.stop();
}

#[tokio::test]
async fn without_comments_section_everything_unrouted_is_404() {
    let server = start_full_server(MemoryBucket::new()).await;

    let resp = reqwest::get(server.url("/wp-admin/admin-ajax.php")).await.unwrap();
    assert_eq!(resp.status(), 404);
    assert_eq!(resp.headers()["x-worker-hit"], "no");

    server.stop();
}

// -- view counter --

#[tokio::test]
async fn views_are_counted_per_slug() {
    let server = start_full_server(MemoryBucket::new()).await;
    let client = reqwest::Client::new();

    let first: ViewsResponse = client
        .post(server.url("/views-track"))
        .json(&serde_json::json!({ "slug": "hello-world" }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert!(first.success);
    assert_eq!(first.views, 1);

    let resp = client
        .post(server.url("/views-track"))
        .json(&serde_json::json!({ "slug": "hello-world" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.headers()["cache-control"], "no-store");
    assert_eq!(resp.json::<ViewsResponse>().await.unwrap().views, 2);

    let read: ViewsResponse = client
        .get(server.url("/views-track?slug=hello-world"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(read.views, 2);

    let other: ViewsResponse = client
        .get(server.url("/views-track?slug=another-post"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(other.views, 0);

    assert_eq!(server.state.stats.views_recorded.load(Ordering::Relaxed), 2);

    server.stop();
}

#[tokio::test]
async fn invalid_slugs_are_rejected() {
    let server = start_full_server(MemoryBucket::new()).await;
    let client = reqwest::Client::new();

    let resp = client
        .get(server.url("/views-track?slug=Hello%20World%21"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
    assert_eq!(resp.text().await.unwrap(), "Invalid slug format");

    let resp = client
        .post(server.url("/views-track"))
        .json(&serde_json::json!({ "slug": "Hello World!" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);

    let resp = client.get(server.url("/views-track")).send().await.unwrap();
    assert_eq!(resp.status(), 400);

    let resp = client
        .post(server.url("/views-track"))
        .body("not json")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);

    server.stop();
}

#[tokio::test]
async fn other_methods_on_views_are_rejected() {
    let server = start_full_server(MemoryBucket::new()).await;

    let resp = reqwest::Client::new()
        .put(server.url("/views-track"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 405);
    assert_eq!(resp.text().await.unwrap(), "Invalid request");

    let resp = reqwest::Client::new()
        .head(server.url("/views-track?slug=hello"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 405);

    server.stop();
}

// -- wallpaper redirect --

fn wallpaper_bucket() -> MemoryBucket {
    MemoryBucket::from_keys(&[
        "pc_img/forest.jpg".to_string(),
        "mobile_img/dunes.jpg".to_string(),
        "readme.txt".to_string(),
    ])
}

#[tokio::test]
async fn mobile_fallback_path_overrides_desktop_agent() {
    let server = start_full_server(wallpaper_bucket()).await;

    let resp = no_redirect_client()
        .get(server.url("/wallpaper/fallback_mobile.jpg"))
        .header("user-agent", "Mozilla/5.0 (Windows NT 10.0; Win64; x64)")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 302);
    assert_eq!(
        resp.headers()["location"],
        "https://img.example.com/mobile_img/dunes.jpg"
    );
    assert_eq!(resp.headers()["cache-control"], "public, max-age=600");
    assert_eq!(resp.headers()["cdn-cache-control"], "public, max-age=604800");

    server.stop();
}

#[tokio::test]
async fn device_is_picked_from_user_agent() {
    let server = start_full_server(wallpaper_bucket()).await;
    let client = no_redirect_client();

    let resp = client
        .get(server.url("/wallpaper"))
        .header("user-agent", "Mozilla/5.0 (Linux; Android 14; Pixel 8)")
        .send()
        .await
        .unwrap();
    assert_eq!(
        resp.headers()["location"],
        "https://img.example.com/mobile_img/dunes.jpg"
    );

    let resp = client
        .get(server.url("/wallpaper/today.jpg"))
        .header("user-agent", "Mozilla/5.0 (Macintosh; Intel Mac OS X 14_0)")
        .send()
        .await
        .unwrap();
    assert_eq!(
        resp.headers()["location"],
        "https://img.example.com/pc_img/forest.jpg"
    );

    assert_eq!(server.state.stats.wallpapers_served.load(Ordering::Relaxed), 2);

    server.stop();
}

#[tokio::test]
async fn empty_prefix_returns_404() {
    let bucket = MemoryBucket::from_keys(&["pc_img/forest.jpg".to_string()]);
    let server = start_full_server(bucket).await;

    let resp = no_redirect_client()
        .get(server.url("/wallpaper/Fallback_Mobile.JPG"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);
    assert_eq!(resp.text().await.unwrap(), "No images found");

    server.stop();
}

// -- health and lifecycle --

#[tokio::test]
async fn health_endpoint_returns_healthy() {
    let server = start_full_server(MemoryBucket::new()).await;

    let resp = reqwest::get(server.url("/health")).await.unwrap();
    assert_eq!(resp.status(), 200);

    let health: HealthResponse = resp.json().await.unwrap();
    assert_eq!(health.status, "healthy");
    assert_eq!(health.version, env!("CARGO_PKG_VERSION"));
    assert_eq!(health.config.source, "test");
    assert_eq!(health.config.version, "test-has");
    assert_eq!(health.config.handlers, vec!["views", "wallpaper"]);
    assert_eq!(health.config.object_store.as_deref(), Some("memory"));
    assert_eq!(health.config.kv_store.as_deref(), Some("memory"));
    assert_eq!(health.stats.comments_dual_written, 0);
    assert_eq!(health.stats.background_pending, 0);

    server.stop();
}

#[tokio::test]
async fn graceful_shutdown_works() {
    let server = start_full_server(MemoryBucket::new()).await;

    let url = server.url("/health");
    assert!(reqwest::get(&url).await.is_ok());

    server.stop();

    tokio::time::sleep(std::time::Duration::from_millis(100)).await;

    let result = reqwest::get(&url).await;
    assert!(result.is_err());
}
