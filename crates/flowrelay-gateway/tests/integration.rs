use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use serde_json::{Value, json};
use tokio::sync::Notify;
use tower::ServiceExt;
use wiremock::matchers::{body_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use flowrelay_client::{FlowClient, FlowClientConfig, StreamError, StreamObserver};
use flowrelay_core::{RelayConfig, Tweaks};
use flowrelay_gateway::{AppState, build_router};

const RUN_PATH: &str = "/lf/engine-1/api/v1/run/flow-1";

fn state(engine: &MockServer) -> AppState {
    let client = FlowClient::new(&FlowClientConfig {
        base_url: engine.uri(),
        token: "app-token".into(),
        timeout: None,
    })
    .unwrap();
    AppState::new(client, RelayConfig::new("flow-1", "engine-1").unwrap())
}

fn text_response(text: &str) -> Value {
    json!({"outputs": [{"outputs": [{"outputs": {"message": {"message": {"text": text}}}}]}]})
}

/// POST a JSON body to `/run-flow` and return (status, parsed body).
async fn post_run_flow(state: AppState, body: &str) -> (StatusCode, Value) {
    let request = Request::builder()
        .method("POST")
        .uri("/run-flow")
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    let resp = build_router(state).oneshot(request).await.unwrap();
    let status = resp.status();
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

async fn mount_text_engine(engine: &MockServer, text: &str) {
    Mock::given(method("POST"))
        .and(path(RUN_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(text_response(text)))
        .mount(engine)
        .await;
}

/// Counts callbacks and wakes the test when the stream closes.
#[derive(Default)]
struct CountingObserver {
    updates: AtomicUsize,
    closes: AtomicUsize,
    errors: AtomicUsize,
    done: Notify,
}

impl StreamObserver for CountingObserver {
    fn on_update(&self, _payload: &Value) {
        self.updates.fetch_add(1, Ordering::SeqCst);
    }

    fn on_close(&self, _reason: &str) {
        self.closes.fetch_add(1, Ordering::SeqCst);
        self.done.notify_one();
    }

    fn on_error(&self, _error: &StreamError) {
        self.errors.fetch_add(1, Ordering::SeqCst);
        self.done.notify_one();
    }
}

#[tokio::test]
async fn non_stream_request_returns_engine_text() {
    let engine = MockServer::start().await;
    mount_text_engine(&engine, "hi there").await;

    let (status, body) = post_run_flow(state(&engine), r#"{"inputValue":"hello","stream":false}"#).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"success": true, "output": "hi there"}));
}

#[tokio::test]
async fn identical_requests_produce_identical_replies() {
    let engine = MockServer::start().await;
    mount_text_engine(&engine, "same answer").await;

    let first = post_run_flow(state(&engine), r#"{"inputValue":"hello"}"#).await;
    let second = post_run_flow(state(&engine), r#"{"inputValue":"hello"}"#).await;
    assert_eq!(first, second);
}

#[tokio::test]
async fn omitted_fields_default_to_chat_and_configured_tweaks() {
    let engine = MockServer::start().await;
    let tweaks: Tweaks = [("Prompt-1".to_string(), json!({"template": "t"}))]
        .into_iter()
        .collect();
    Mock::given(method("POST"))
        .and(path(RUN_PATH))
        .and(query_param("stream", "false"))
        .and(body_json(json!({
            "input_value": "hello",
            "input_type": "chat",
            "output_type": "chat",
            "tweaks": {"Prompt-1": {"template": "t"}}
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(text_response("ok")))
        .expect(1)
        .mount(&engine)
        .await;

    let mut app_state = state(&engine);
    app_state.relay = Arc::new(RelayConfig::new("flow-1", "engine-1").unwrap().with_tweaks(tweaks));
    let (status, body) = post_run_flow(app_state, r#"{"inputValue":"hello"}"#).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["output"], "ok");
}

#[tokio::test]
async fn stream_request_acknowledges_and_relays_events_to_observer() {
    let engine = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(RUN_PATH))
        .and(query_param("stream", "true"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "outputs": [{"outputs": [{"artifacts": {"stream_url": "/api/v1/stream/run-1"}}]}]
        })))
        .mount(&engine)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v1/stream/run-1"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(
            "data: {\"chunk\":\"partial\"}\n\nevent: close\ndata: done\n\n",
            "text/event-stream",
        ))
        .mount(&engine)
        .await;

    let observer = Arc::new(CountingObserver::default());
    let app_state = state(&engine).with_observer(observer.clone());
    let (status, body) = post_run_flow(app_state, r#"{"inputValue":"hello","stream":true}"#).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"success": true, "message": "Stream in progress"}));

    tokio::time::timeout(Duration::from_secs(5), observer.done.notified())
        .await
        .unwrap();
    assert_eq!(observer.updates.load(Ordering::SeqCst), 1);
    assert_eq!(observer.closes.load(Ordering::SeqCst), 1);
    assert_eq!(observer.errors.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn stream_request_without_stream_url_still_acknowledges() {
    let engine = MockServer::start().await;
    mount_text_engine(&engine, "full answer").await;

    let (status, body) = post_run_flow(state(&engine), r#"{"inputValue":"hello","stream":true}"#).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Stream in progress");
}

#[tokio::test]
async fn engine_failure_returns_500_with_detail() {
    let engine = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(502).set_body_string("upstream down"))
        .mount(&engine)
        .await;

    let (status, body) = post_run_flow(state(&engine), r#"{"inputValue":"hello"}"#).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["success"], false);
    let error = body["error"].as_str().unwrap();
    assert!(error.contains("502"), "error: {error}");
    assert!(error.contains("upstream down"), "error: {error}");
}

#[tokio::test]
async fn missing_output_text_returns_500() {
    let engine = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"outputs": []})))
        .mount(&engine)
        .await;

    let (status, body) = post_run_flow(state(&engine), r#"{"inputValue":"hello"}"#).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["success"], false);
    assert!(body["error"].as_str().unwrap().contains("outputs[0]"));
}

#[tokio::test]
async fn unreachable_engine_returns_500() {
    let client = FlowClient::new(&FlowClientConfig {
        base_url: "http://127.0.0.1:1".into(),
        token: "app-token".into(),
        timeout: None,
    })
    .unwrap();
    let app_state = AppState::new(client, RelayConfig::new("flow-1", "engine-1").unwrap());

    let (status, body) = post_run_flow(app_state, r#"{"inputValue":"hello"}"#).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(!body["error"].as_str().unwrap().is_empty());
}

#[tokio::test]
async fn missing_input_value_returns_400() {
    let engine = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(text_response("unused")))
        .expect(0)
        .mount(&engine)
        .await;

    let (status, body) = post_run_flow(state(&engine), r#"{"stream":false}"#).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn health_reports_ok() {
    let engine = MockServer::start().await;
    let request = Request::builder()
        .uri("/health")
        .body(Body::empty())
        .unwrap();
    let resp = build_router(state(&engine)).oneshot(request).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
        .await
        .unwrap();
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["status"], "ok");
}
