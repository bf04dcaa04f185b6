use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use diff_proxy::handlers::{admin_router, proxy_router, AppState, AppStateInner};
use diff_proxy::models::{shared, ProxyConfig};
use diff_proxy::services::ReqwestFetcher;

const FIXTURE_NOW: &str = include_str!("fixtures/now.json");

async fn backend(route: &str, status: u16, body: &str) -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(
            ResponseTemplate::new(status).set_body_raw(body, "application/json"),
        )
        .mount(&server)
        .await;
    server
}

fn create_test_state(config: ProxyConfig) -> AppState {
    AppStateInner::new(shared(config), Arc::new(ReqwestFetcher::new()))
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().method("GET").uri(uri).body(Body::empty()).unwrap()
}

async fn body_json(response: axum::response::Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&body).unwrap()
}

async fn send(app: Router, request: Request<Body>) -> axum::response::Response {
    app.oneshot(request).await.unwrap()
}

#[tokio::test]
async fn test_health_is_not_proxied() {
    let config = ProxyConfig::new("http://127.0.0.1:1", "http://127.0.0.1:1");
    let app = proxy_router(create_test_state(config));

    let response = send(app, get("/healthdif")).await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_equal_backends_answer_ok() {
    let primary = backend("/now", 200, FIXTURE_NOW).await;
    let candidate = backend("/now", 200, FIXTURE_NOW).await;
    let state = create_test_state(ProxyConfig::new(primary.uri(), candidate.uri()));
    let app = proxy_router(state.clone());

    let response = send(app, get("/now")).await;
    assert_eq!(response.status(), StatusCode::OK);

    let entry = state.stats.find_entry("GET", "/now").await.unwrap();
    assert_eq!(entry.success, 1);
    assert_eq!(entry.errors, 0);
}

#[tokio::test]
async fn test_regression_answers_precondition_failed_and_is_counted() {
    let primary = backend("/now", 200, r#"{"version": 1}"#).await;
    let candidate = backend("/now", 200, r#"{"version": 2}"#).await;
    let state = create_test_state(ProxyConfig::new(primary.uri(), candidate.uri()));
    let app = proxy_router(state.clone());

    let response = send(app, get("/now?verbose=true")).await;
    assert_eq!(response.status(), StatusCode::PRECONDITION_FAILED);

    let entry = state.stats.find_entry("GET", "/now").await.unwrap();
    assert_eq!(entry.errors, 1);
    assert_eq!(entry.error_details[0].full_uri, "/now?verbose=true");
    assert!(entry.error_details[0].body_diff.contains("\"version\": 2 => 1"));
}

#[tokio::test]
async fn test_return_result_describes_status_difference() {
    let primary = backend("/now", 200, "{}").await;
    let candidate = backend("/now", 201, "{}").await;
    let mut config = ProxyConfig::new(primary.uri(), candidate.uri());
    config.return_result = true;
    let app = proxy_router(create_test_state(config));

    let response = send(app, get("/now")).await;
    assert_eq!(response.status(), StatusCode::PRECONDITION_FAILED);

    let result = body_json(response).await;
    assert_eq!(result["equalContent"], false);
    assert_eq!(result["diff"]["statusDiff"], "\"status\": 200 => 201");
    assert!(result["diff"].get("bodyDiff").is_none());
    assert!(result["primaryElapsedMs"].is_u64());
}

#[tokio::test]
async fn test_noise_detection_end_to_end() {
    let primary = backend("/now", 200, r#"{"now": {"epoch": 1527256500}, "name": "a"}"#).await;
    let secondary = backend("/now", 200, r#"{"now": {"epoch": 1527256501}, "name": "a"}"#).await;
    let candidate = backend("/now", 200, r#"{"now": {"epoch": 1527256502}, "name": "a"}"#).await;
    let mut config = ProxyConfig::new(primary.uri(), candidate.uri());
    config.noise_detection = true;
    config.secondary = Some(secondary.uri());
    let app = proxy_router(create_test_state(config));

    let response = send(app, get("/now")).await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_noise_validation_failure_is_bad_request() {
    let primary = backend("/now", 200, r#"{"name": "a"}"#).await;
    let secondary = backend("/now", 200, r#"{"name": "a", "extra": 1}"#).await;
    let candidate = backend("/now", 200, r#"{"name": "a"}"#).await;
    let mut config = ProxyConfig::new(primary.uri(), candidate.uri());
    config.noise_detection = true;
    config.secondary = Some(secondary.uri());
    let app = proxy_router(create_test_state(config));

    let response = send(app, get("/now")).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let error = body_json(response).await;
    assert_eq!(error["status"], 400);
    assert!(error["error"].as_str().unwrap().contains("/extra"));
}

#[tokio::test]
async fn test_unsafe_method_is_rejected() {
    let primary = MockServer::start().await;
    let candidate = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&primary)
        .await;
    let app = proxy_router(create_test_state(ProxyConfig::new(primary.uri(), candidate.uri())));

    let request = Request::builder()
        .method("POST")
        .uri("/orders")
        .body(Body::from("{}"))
        .unwrap();
    let response = send(app, request).await;
    assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
}

#[tokio::test]
async fn test_unreachable_candidate_is_service_unavailable() {
    let primary = backend("/now", 200, "{}").await;
    let app = proxy_router(create_test_state(ProxyConfig::new(primary.uri(), "http://127.0.0.1:1")));

    let response = send(app, get("/now")).await;
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    let error = body_json(response).await;
    assert!(error["error"].as_str().unwrap().contains("Candidate"));
}

#[tokio::test]
async fn test_mirroring_returns_primary_response() {
    let primary = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/orders"))
        .respond_with(
            ResponseTemplate::new(201)
                .insert_header("x-backend", "primary")
                .set_body_raw(r#"{"id": 7}"#, "application/json"),
        )
        .mount(&primary)
        .await;
    let candidate = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/orders"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&candidate)
        .await;

    let mut config = ProxyConfig::new(primary.uri(), candidate.uri());
    config.mirroring = true;
    let app = proxy_router(create_test_state(config));

    let request = Request::builder()
        .method("POST")
        .uri("/orders")
        .header("content-type", "application/json")
        .body(Body::from(r#"{"qty": 2}"#))
        .unwrap();
    let response = send(app, request).await;
    assert_eq!(response.status(), StatusCode::CREATED);
    assert_eq!(response.headers()["x-backend"], "primary");
    assert_eq!(body_json(response).await, json!({"id": 7}));
}

#[tokio::test]
async fn test_mirroring_survives_candidate_failure() {
    let primary = backend("/now", 200, r#"{"id": 1}"#).await;
    let mut config = ProxyConfig::new(primary.uri(), "http://127.0.0.1:1");
    config.mirroring = true;
    let app = proxy_router(create_test_state(config));

    let response = send(app, get("/now")).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await, json!({"id": 1}));
}

#[tokio::test]
async fn test_store_results_writes_interactions() {
    let primary = backend("/now", 200, FIXTURE_NOW).await;
    let candidate = backend("/now", 200, FIXTURE_NOW).await;
    let dir = tempfile::tempdir().unwrap();
    let results = dir.path().join("results.json");
    let mut config = ProxyConfig::new(primary.uri(), candidate.uri());
    config.store_results = Some(results.display().to_string());
    let app = proxy_router(create_test_state(config));

    let response = send(app, get("/now")).await;
    assert_eq!(response.status(), StatusCode::OK);

    let written: Value = serde_json::from_slice(&std::fs::read(&results).unwrap()).unwrap();
    assert_eq!(written["primary"]["url"], format!("{}/now", primary.uri()));
    assert_eq!(written["differenceMode"], "Strict");
    assert_eq!(written["result"], true);
}

#[tokio::test]
async fn test_admin_configuration_round_trip() {
    let state = create_test_state(ProxyConfig::new("http://primary:8080", "http://candidate:8080"));

    let response = send(admin_router(state.clone()), get("/configuration")).await;
    assert_eq!(response.status(), StatusCode::OK);
    let config = body_json(response).await;
    assert_eq!(config["serviceName"], "candidate");
    assert_eq!(config["differenceMode"], "Strict");

    let update = json!({
        "candidate": "http://candidate-v2:8080",
        "mode": "Subset",
        "noiseDetection": "false"
    });
    let request = Request::builder()
        .method("PUT")
        .uri("/configuration")
        .header("content-type", "application/json")
        .body(Body::from(update.to_string()))
        .unwrap();
    let response = send(admin_router(state.clone()), request).await;
    assert_eq!(response.status(), StatusCode::OK);

    let config = state.config.lock().await;
    assert_eq!(config.candidate, "http://candidate-v2:8080");
    assert_eq!(config.service_name, "candidate-v2");
    assert_eq!(config.difference_mode.to_string(), "Subset");
}

#[tokio::test]
async fn test_admin_rejects_unknown_mode() {
    let state = create_test_state(ProxyConfig::new("http://primary:8080", "http://candidate:8080"));

    let request = Request::builder()
        .method("PUT")
        .uri("/configuration")
        .header("content-type", "application/json")
        .body(Body::from(json!({"mode": "Fuzzy"}).to_string()))
        .unwrap();
    let response = send(admin_router(state), request).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let error = body_json(response).await;
    assert!(error["error"].as_str().unwrap().contains("Cannot find Fuzzy difference mode"));
}

#[tokio::test]
async fn test_admin_other_methods_not_allowed() {
    let state = create_test_state(ProxyConfig::new("http://primary:8080", "http://candidate:8080"));

    let request = Request::builder()
        .method("DELETE")
        .uri("/configuration")
        .body(Body::empty())
        .unwrap();
    let response = send(admin_router(state), request).await;
    assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
}

#[tokio::test]
async fn test_admin_stats_lists_endpoints() {
    let primary = backend("/now", 200, FIXTURE_NOW).await;
    let candidate = backend("/now", 200, FIXTURE_NOW).await;
    let state = create_test_state(ProxyConfig::new(primary.uri(), candidate.uri()));

    send(proxy_router(state.clone()), get("/now")).await;
    send(proxy_router(state.clone()), get("/now")).await;

    let response = send(admin_router(state), get("/stats")).await;
    assert_eq!(response.status(), StatusCode::OK);
    let stats = body_json(response).await;
    assert_eq!(stats[0]["endpoint"]["method"], "GET");
    assert_eq!(stats[0]["endpoint"]["path"], "/now");
    assert_eq!(stats[0]["success"], 2);
    assert!(stats[0]["averagePrimaryDuration"].is_number());
}

#[tokio::test]
async fn test_admin_stats_reset() {
    let primary = backend("/now", 200, FIXTURE_NOW).await;
    let candidate = backend("/now", 200, FIXTURE_NOW).await;
    let state = create_test_state(ProxyConfig::new(primary.uri(), candidate.uri()));

    send(proxy_router(state.clone()), get("/now")).await;
    assert_eq!(state.stats.entries().await.len(), 1);

    let request = Request::builder()
        .method("DELETE")
        .uri("/stats")
        .body(Body::empty())
        .unwrap();
    let response = send(admin_router(state.clone()), request).await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    assert!(state.stats.entries().await.is_empty());
}

#[tokio::test]
async fn test_force_plain_text_keeps_json_structural() {
    let primary = backend("/now", 200, r#"{"a": 1, "b": 2}"#).await;
    let candidate = backend("/now", 200, r#"{"b":2,"a":1}"#).await;
    let mut config = ProxyConfig::new(primary.uri(), candidate.uri());
    config.force_plain_text = true;
    let app = proxy_router(create_test_state(config));

    let response = send(app, get("/now")).await;
    assert_eq!(response.status(), StatusCode::OK);
}
