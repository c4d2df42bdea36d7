// HTTP-level tests for the like api, driven through the router without a socket

use axum::{
    Router,
    body::{Body, to_bytes},
    extract::connect_info::MockConnectInfo,
    http::{Request, StatusCode, header},
};
use serde_json::Value;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;

use like_counter::audit::AuditLog;
use like_counter::catalog::StaticCatalog;
use like_counter::clock::ManualClock;
use like_counter::handlers::router;
use like_counter::rate_limit::RateLimitPolicy;
use like_counter::service::{LikeService, ServiceParts};
use like_counter::state::AppState;
use like_counter::store::{CounterStore, JsonFileStore};
use like_counter::validate::HashAlgorithm;

const CATALOG: &str = "[应用]\nNAME=<笔记>\nID=<123>\n[应用]\nID=<42>\n";

struct TestApp {
    app: Router,
    clock: Arc<ManualClock>,
    store: Arc<JsonFileStore>,
    hash: String,
    _dir: tempfile::TempDir,
}

fn test_app(max_per_ip: u64) -> TestApp {
    let dir = tempfile::tempdir().unwrap();
    let clock = Arc::new(ManualClock::new(1_700_000_000));
    let store = Arc::new(JsonFileStore::new(dir.path().join("likes_data.json"), clock.clone()));

    let service = LikeService::new(ServiceParts {
        store: store.clone(),
        catalog: Arc::new(StaticCatalog::new(CATALOG)),
        clock: clock.clone(),
        audit: AuditLog::disabled(),
        policy: RateLimitPolicy {
            min_interval: Duration::from_secs(15),
            max_per_ip,
        },
        hash_algorithm: HashAlgorithm::Sha256,
    });

    let state = Arc::new(AppState {
        service,
        trust_proxy_headers: true,
    });
    let peer: SocketAddr = "203.0.113.7:50000".parse().unwrap();

    TestApp {
        app: router(state).layer(MockConnectInfo(peer)),
        clock,
        store,
        hash: HashAlgorithm::Sha256.hex_digest(CATALOG.as_bytes()),
        _dir: dir,
    }
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, body)
}

fn get(uri: &str) -> Request<Body> {
    Request::get(uri).body(Body::empty()).unwrap()
}

fn post_form(uri: &str, form: &str) -> Request<Body> {
    Request::post(uri)
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::from(form.to_string()))
        .unwrap()
}

fn like_form(app_id: &str, hash: &str) -> String {
    format!("app_id={}&client_hash={}&timestamp=1700000000", app_id, hash)
}

#[tokio::test]
async fn get_returns_zero_for_unliked_app() {
    let t = test_app(100);

    let (status, body) = send(&t.app, get("/like_api.php?action=get&app_id=123")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["app_id"], "123");
    assert_eq!(body["likes"], 0);
    assert!(t.store.read().await.unwrap().apps.is_empty());
}

#[tokio::test]
async fn get_rejects_bad_input() {
    let t = test_app(100);

    for uri in ["/?action=get", "/?action=get&app_id=", "/?action=get&app_id=abc"] {
        let (status, body) = send(&t.app, get(uri)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{uri}");
        assert!(body["error"].is_string());
    }

    let (status, _) = send(&t.app, get("/?action=list&app_id=1")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn like_flow_over_http() {
    let t = test_app(100);

    let (status, body) = send(&t.app, post_form("/like_api.php", &like_form("123", &t.hash))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["likes"], 1);

    let (status, body) = send(&t.app, post_form("/like_api.php?action=like", &like_form("123", &t.hash))).await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(body["success"], false);
    assert!(body["message"].as_str().unwrap().contains("too frequent"));

    t.clock.advance(15);
    let (status, body) = send(&t.app, post_form("/", &like_form("123", &t.hash))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["likes"], 2);

    let (_, body) = send(&t.app, get("/?action=get&app_id=123")).await;
    assert_eq!(body["likes"], 2);
}

#[tokio::test]
async fn like_rejections_map_to_statuses() {
    let t = test_app(100);

    let (status, body) = send(&t.app, post_form("/", &like_form("x1", &t.hash))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string());

    let (status, body) = send(&t.app, post_form("/", "app_id=123")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);

    let (status, _) = send(&t.app, post_form("/", &like_form("123", "0000"))).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = send(&t.app, post_form("/", &like_form("43", &t.hash))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(&t.app, post_form("/?action=get", &like_form("123", &t.hash))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // nothing above was committed
    assert!(t.store.read().await.unwrap().apps.is_empty());
}

#[tokio::test]
async fn query_app_id_takes_precedence() {
    let t = test_app(100);

    let (status, body) = send(&t.app, post_form("/?app_id=42", &like_form("123", &t.hash))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["app_id"], "42");
}

#[tokio::test]
async fn limit_is_per_forwarded_ip() {
    let t = test_app(1);

    let forwarded = |ip: &str| {
        Request::post("/")
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .header("x-forwarded-for", ip)
            .body(Body::from(like_form("42", &t.hash)))
            .unwrap()
    };

    assert_eq!(send(&t.app, forwarded("8.8.8.8")).await.0, StatusCode::OK);

    t.clock.advance(60);
    let (status, body) = send(&t.app, forwarded("8.8.8.8")).await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    assert!(body["message"].as_str().unwrap().contains("maximum"));

    let (status, body) = send(&t.app, forwarded("1.1.1.1")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["likes"], 2);

    let data = t.store.read().await.unwrap();
    assert!(data.ips.contains_key("8.8.8.8"));
    assert!(data.ips.contains_key("1.1.1.1"));
}

#[tokio::test]
async fn options_and_other_methods() {
    let t = test_app(100);

    let request = Request::options("/like_api.php").body(Body::empty()).unwrap();
    let (status, body) = send(&t.app, request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, Value::Null);

    let request = Request::delete("/like_api.php").body(Body::empty()).unwrap();
    let (status, body) = send(&t.app, request).await;
    assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
    assert!(body["error"].is_string());

    // HEAD must not piggyback on the GET handler
    for uri in ["/?action=get&app_id=123", "/like_api.php?action=get&app_id=123"] {
        let request = Request::head(uri).body(Body::empty()).unwrap();
        let response = t.app.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED, "{uri}");
    }
}

#[tokio::test]
async fn multipart_like_is_accepted() {
    let t = test_app(100);
    let boundary = "----likeboundary7MA4YWxk";
    let body = format!(
        "--{b}\r\nContent-Disposition: form-data; name=\"app_id\"\r\n\r\n123\r\n\
         --{b}\r\nContent-Disposition: form-data; name=\"client_hash\"\r\n\r\n{h}\r\n\
         --{b}\r\nContent-Disposition: form-data; name=\"timestamp\"\r\n\r\n1700000000\r\n\
         --{b}--\r\n",
        b = boundary,
        h = t.hash
    );
    let request = Request::post("/like_api.php")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", boundary),
        )
        .body(Body::from(body))
        .unwrap();

    let (status, body) = send(&t.app, request).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["app_id"], "123");
    assert_eq!(body["likes"], 1);
}

#[tokio::test]
async fn unsupported_body_reads_as_empty_form() {
    let t = test_app(100);

    let request = Request::post("/")
        .header(header::CONTENT_TYPE, "text/plain")
        .body(Body::from("app_id=123"))
        .unwrap();
    let (status, body) = send(&t.app, request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "invalid app id");
}

#[tokio::test]
async fn repeated_query_keys_answer_in_json() {
    let t = test_app(100);

    // last value wins
    let (status, body) = send(&t.app, get("/?action=get&app_id=1&app_id=42")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["app_id"], "42");

    let (status, body) = send(&t.app, get("/?action=list&action=get&app_id=7")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["likes"], 0);

    let (status, body) = send(&t.app, post_form("/?app_id=1&app_id=x", &like_form("123", &t.hash))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "invalid app id");
}

#[tokio::test]
async fn cors_is_open() {
    let t = test_app(100);

    let request = Request::get("/?action=get&app_id=1")
        .header(header::ORIGIN, "https://market.example")
        .body(Body::empty())
        .unwrap();
    let response = t.app.clone().oneshot(request).await.unwrap();
    assert_eq!(
        response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN],
        "*"
    );
}

#[tokio::test]
async fn health_and_metrics_respond() {
    let t = test_app(100);

    let (status, body) = send(&t.app, get("/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["service"], "like-counter");
    assert!(body["time"].is_i64());

    send(&t.app, get("/?action=get&app_id=1")).await;
    let response = t.app.clone().oneshot(get("/metrics")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let text = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert!(String::from_utf8_lossy(&text).contains("likes_requests_total"));
}
