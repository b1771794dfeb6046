//! End-to-end tests driving the full router -- middleware, handlers, and
//! the engine line protocol -- through `tower::ServiceExt::oneshot` against
//! an in-process fake engine, per the Design Note that `EnginePipe` is
//! boxed precisely so tests don't need a real subprocess.
//!
//! The fake engine is a duplex-pipe task that parses the same
//! newline-delimited JSON commands `engine_client.py` emits and replies
//! with a canned envelope, keeping these tests grounded in the same wire
//! protocol the real engine speaks rather than mocking the HTTP layer
//! directly.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use tower::ServiceExt;

use aztec_gateway::api_auth::RateLimiter;
use aztec_gateway::config::AppConfig;
use aztec_gateway::engine::{EngineClient, EnginePipe, EngineSupervisor};
use aztec_gateway::gateway::build_router;
use aztec_gateway::gateway::state::AppState;

const API_KEY: &str = "test-key-1";

fn test_config() -> AppConfig {
    AppConfig {
        project_root: "/tmp".into(),
        engine_path: "/tmp/nonexistent-engine".into(),
        data_dir: "/tmp/aztec-test-data".into(),
        event_log_path: "/tmp/aztec-test-data/events.jsonl".into(),
        snapshot_dir: "/tmp/aztec-test-data/snapshots".into(),
        rate_limit_requests: 100,
        rate_limit_window_seconds: 60,
        host: "127.0.0.1".to_string(),
        port: 0,
    }
}

fn metrics_handle() -> metrics_exporter_prometheus::PrometheusHandle {
    use std::sync::OnceLock;
    static HANDLE: OnceLock<metrics_exporter_prometheus::PrometheusHandle> = OnceLock::new();
    HANDLE
        .get_or_init(aztec_gateway::metrics::install)
        .clone()
}

/// Spawns a background task that plays the engine side of the line
/// protocol: reads one JSON command per line, looks its `cmd` up in
/// `script`, and writes back the mapped response envelope (defaulting to
/// a generic success envelope if the command isn't scripted).
async fn attached_client_with_script(
    script: Vec<(&'static str, Value)>,
) -> Arc<EngineClient> {
    let client = Arc::new(EngineClient::new());
    let (gateway_side, engine_side) = tokio::io::duplex(64 * 1024);
    let (gateway_read, gateway_write) = tokio::io::split(gateway_side);
    client.attach(EnginePipe::new(gateway_write, gateway_read)).await;

    tokio::spawn(async move {
        use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
        let (engine_read, mut engine_write) = tokio::io::split(engine_side);
        let mut lines = BufReader::new(engine_read).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            let Ok(command): Result<Value, _> = serde_json::from_str(&line) else {
                continue;
            };
            let cmd = command.get("cmd").and_then(Value::as_str).unwrap_or("");
            let req_id = command
                .get("req_id")
                .and_then(Value::as_str)
                .unwrap_or("test-req-id")
                .to_string();
            let mut reply = script
                .iter()
                .find(|(name, _)| *name == cmd)
                .map(|(_, reply)| reply.clone())
                .unwrap_or_else(|| json!({"success": true, "data": {}}));
            if let Some(obj) = reply.as_object_mut() {
                obj.entry("req_id").or_insert_with(|| Value::String(req_id));
            }
            let line = serde_json::to_string(&reply).unwrap() + "\n";
            if engine_write.write_all(line.as_bytes()).await.is_err() {
                break;
            }
        }
    });

    client
}

fn state_with_client(config: AppConfig, engine: Arc<EngineClient>) -> Arc<AppState> {
    let config = Arc::new(config);
    let supervisor = Arc::new(EngineSupervisor::new(config.clone(), engine.clone()));
    let rate_limiter = Arc::new(RateLimiter::new(
        config.rate_limit_requests,
        config.rate_limit_window_seconds,
    ));
    Arc::new(AppState {
        config,
        engine,
        supervisor,
        rate_limiter,
        metrics_handle: metrics_handle(),
    })
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

fn signed_request(method: &str, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("X-API-Key", API_KEY)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

#[tokio::test]
async fn place_order_then_fetch_it_round_trips() {
    let order = json!({
        "id": 1,
        "account_id": "acct-1",
        "symbol": "BTC-USD",
        "side": "BUY",
        "type": "LIMIT",
        "price": 5_000_000_000_000i64,
        "quantity": 100_000_000i64,
        "remaining_qty": 100_000_000i64,
        "timestamp_ns": 0,
        "status": "NEW",
    });
    let client = attached_client_with_script(vec![
        (
            "place_order",
            json!({"success": true, "req_id": "t1", "data": {"order": order.clone(), "trades": []}}),
        ),
        (
            "get_order",
            json!({"success": true, "req_id": "t2", "data": {"order": order}}),
        ),
    ])
    .await;
    let state = state_with_client(test_config(), client);
    let app = build_router(state);

    let place_body = json!({
        "account_id": "acct-1",
        "symbol": "BTC-USD",
        "side": "BUY",
        "type": "LIMIT",
        "price": 5_000_000_000_000i64,
        "quantity": 100_000_000i64,
    });
    let request = signed_request("POST", "/api/v1/orders", place_body);
    let response = app
        .clone()
        .oneshot_with_connect_info(request)
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["order"]["id"], 1);

    let request = Request::builder()
        .method("GET")
        .uri("/api/v1/orders/1")
        .header("X-API-Key", API_KEY)
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot_with_connect_info(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["order"]["symbol"], "BTC-USD");
}

#[tokio::test]
async fn missing_api_key_is_rejected_with_422() {
    let client = attached_client_with_script(vec![]).await;
    let state = state_with_client(test_config(), client);
    let app = build_router(state);

    let request = Request::builder()
        .method("POST")
        .uri("/api/v1/orders")
        .header("content-type", "application/json")
        .body(Body::from(json!({}).to_string()))
        .unwrap();
    let response = app.oneshot_with_connect_info(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body = body_json(response).await;
    assert_eq!(body["error"]["code"], "MISSING_API_KEY");
    assert_eq!(body["success"], false);
    assert!(body["request_id"].as_str().unwrap().len() == 8);
}

#[tokio::test]
async fn invalid_api_key_is_rejected_with_401() {
    let client = attached_client_with_script(vec![]).await;
    let state = state_with_client(test_config(), client);
    let app = build_router(state);

    let request = Request::builder()
        .method("POST")
        .uri("/api/v1/orders")
        .header("X-API-Key", "not-a-real-key")
        .header("content-type", "application/json")
        .body(Body::from(json!({}).to_string()))
        .unwrap();
    let response = app.oneshot_with_connect_info(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body = body_json(response).await;
    assert_eq!(body["error"]["code"], "INVALID_API_KEY");
}

#[tokio::test]
async fn malformed_order_body_is_rejected_through_the_error_envelope() {
    let client = attached_client_with_script(vec![]).await;
    let state = state_with_client(test_config(), client);
    let app = build_router(state);

    // `side` is not one of BUY/SELL -- a schema-level failure axum's bare
    // `Json` extractor would otherwise reject before the handler runs,
    // bypassing the global `{success:false, error:{...}}` envelope.
    let bad_body = json!({
        "account_id": "acct-1",
        "symbol": "BTC-USD",
        "side": "SIDEWAYS",
        "type": "LIMIT",
        "price": 100,
        "quantity": 1,
    });
    let request = signed_request("POST", "/api/v1/orders", bad_body);
    let response = app.oneshot_with_connect_info(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body = body_json(response).await;
    assert_eq!(body["success"], false);
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
    assert!(body["request_id"].as_str().unwrap().len() == 8);
}

#[tokio::test]
async fn non_numeric_order_id_is_rejected_through_the_error_envelope() {
    let client = attached_client_with_script(vec![]).await;
    let state = state_with_client(test_config(), client);
    let app = build_router(state);

    let request = Request::builder()
        .method("GET")
        .uri("/api/v1/orders/not-a-number")
        .header("X-API-Key", API_KEY)
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot_with_connect_info(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body = body_json(response).await;
    assert_eq!(body["success"], false);
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn exceeding_the_rate_limit_returns_429_with_retry_after() {
    let mut config = test_config();
    config.rate_limit_requests = 1;
    config.rate_limit_window_seconds = 60;
    let client = attached_client_with_script(vec![(
        "cancel_order",
        json!({
            "success": false,
            "error": {"code": "NOT_FOUND", "message": "order not found"},
        }),
    )])
    .await;
    let state = state_with_client(config, client);
    let app = build_router(state);

    let delete = || {
        Request::builder()
            .method("DELETE")
            .uri("/api/v1/orders/1")
            .header("X-API-Key", API_KEY)
            .body(Body::empty())
            .unwrap()
    };

    let first = app.clone().oneshot_with_connect_info(delete()).await.unwrap();
    assert_eq!(first.status(), StatusCode::NOT_FOUND);

    let second = app.oneshot_with_connect_info(delete()).await.unwrap();
    assert_eq!(second.status(), StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(
        second.headers().get("Retry-After").unwrap().to_str().unwrap(),
        "60"
    );
    let body = body_json(second).await;
    assert_eq!(body["error"]["code"], "RATE_LIMITED");
}

#[tokio::test]
async fn book_lookup_is_public_and_normalizes_symbol_case() {
    let client = attached_client_with_script(vec![(
        "get_book",
        json!({
            "success": true,
            "data": {
                "symbol": "BTC-USD",
                "bids": [{"price": 100, "quantity": 1}],
                "asks": [],
            },
        }),
    )])
    .await;
    let state = state_with_client(test_config(), client);
    let app = build_router(state);

    let request = Request::builder()
        .method("GET")
        .uri("/api/v1/book/btc-usd")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot_with_connect_info(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["symbol"], "BTC-USD");
    assert_eq!(body["bids"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn health_reports_degraded_when_engine_is_unattached() {
    let client = Arc::new(EngineClient::new());
    let state = state_with_client(test_config(), client);
    let app = build_router(state);

    let request = Request::builder()
        .method("GET")
        .uri("/api/v1/health")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot_with_connect_info(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["status"], "degraded");
    assert_eq!(body["engine_connected"], false);
}

#[tokio::test]
async fn root_and_metrics_routes_need_no_api_key() {
    let client = attached_client_with_script(vec![]).await;
    let state = state_with_client(test_config(), client);
    let app = build_router(state);

    let response = app
        .clone()
        .oneshot_with_connect_info(Request::builder().uri("/").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["service"], "aztec-exchange");

    let response = app
        .oneshot_with_connect_info(
            Request::builder().uri("/metrics").body(Body::empty()).unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

/// `oneshot` doesn't thread a `ConnectInfo<SocketAddr>` through on its own
/// since that extension is normally inserted by `into_make_service_with_
/// connect_info` at the TCP accept layer; tests insert it directly instead.
trait OneshotWithConnectInfo {
    fn oneshot_with_connect_info(
        self,
        request: Request<Body>,
    ) -> std::pin::Pin<Box<dyn std::future::Future<Output = Result<axum::response::Response, std::convert::Infallible>> + Send>>;
}

impl OneshotWithConnectInfo for axum::Router {
    fn oneshot_with_connect_info(
        self,
        mut request: Request<Body>,
    ) -> std::pin::Pin<Box<dyn std::future::Future<Output = Result<axum::response::Response, std::convert::Infallible>> + Send>>
    {
        let addr: SocketAddr = "127.0.0.1:9999".parse().unwrap();
        request
            .extensions_mut()
            .insert(axum::extract::ConnectInfo(addr));
        Box::pin(async move { Ok(self.oneshot(request).await.unwrap()) })
    }
}
