//! Integration tests for the HTTP API, driven through the full router

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use axum::response::Response;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tower::ServiceExt;
use tradecalc::config::{Config, MonitorConfig};
use tradecalc::services::{
    FeedConfig, FileKvStore, LogNotifier, ParameterStore, PriceFeed, QuoteGateway, QuoteStore,
    TradeSession,
};
use tradecalc::sources::{QuoteSource, SourceError};
use tradecalc::types::TradeParameters;
use tradecalc::{app, AppState, MonitorState};

struct MockSource {
    calls: AtomicUsize,
    reply: Result<Value, u16>,
}

#[async_trait]
impl QuoteSource for MockSource {
    fn name(&self) -> &str {
        "mock"
    }

    async fn fetch(&self, _symbol: &str, _credential: &str) -> Result<Value, SourceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.reply.clone().map_err(SourceError::Status)
    }
}

fn test_config() -> Config {
    Config {
        host: "127.0.0.1".to_string(),
        port: 0,
        finnhub_base_url: "http://localhost:1".to_string(),
        finnhub_api_key: None,
        cache_ttl_secs: 60,
        rate_limit_window_secs: 60,
        rate_limit_max_requests: 60,
        upstream_timeout_secs: 10,
        monitor: MonitorConfig::default(),
    }
}

fn state_with(reply: Result<Value, u16>, max_requests: usize) -> (AppState, Arc<MockSource>) {
    let source = Arc::new(MockSource {
        calls: AtomicUsize::new(0),
        reply,
    });
    let store = Arc::new(QuoteStore::new(
        std::time::Duration::from_secs(60),
        std::time::Duration::from_secs(60),
        max_requests,
    ));
    let state = AppState {
        config: Arc::new(test_config()),
        gateway: Arc::new(QuoteGateway::new(source.clone(), store)),
        monitor: None,
    };
    (state, source)
}

fn default_state() -> AppState {
    state_with(Ok(json!({"c": 187.5, "pc": 185.0, "h": 188.0, "t": 1_700_000_000})), 60).0
}

fn quote_uri(params: &[(&str, &str)]) -> String {
    format!("/api/quote?{}", serde_urlencoded::to_string(params).unwrap())
}

fn get(uri: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .header("x-forwarded-for", "198.51.100.4")
        .body(Body::empty())
        .unwrap()
}

async fn body_json(response: Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn test_health() {
    let response = app(default_state()).oneshot(get("/api/health")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["status"], "ok");
    assert!(body["version"].is_string());
    assert_eq!(body["monitor"], false);
}

#[tokio::test]
async fn test_missing_symbol_is_bad_request() {
    let uri = quote_uri(&[("token", "abc")]);
    let response = app(default_state()).oneshot(get(&uri)).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let body = body_json(response).await;
    assert_eq!(body["error"], "Invalid stock symbol");
    assert_eq!(body["kind"], "validation");
    assert_eq!(body["retryable"], false);
}

#[tokio::test]
async fn test_missing_token_is_bad_request() {
    let uri = quote_uri(&[("symbol", "AAPL")]);
    let response = app(default_state()).oneshot(get(&uri)).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let body = body_json(response).await;
    assert_eq!(body["kind"], "validation");
}

#[tokio::test]
async fn test_quote_success_and_cache_headers() {
    let (state, source) = state_with(Ok(json!({"c": 187.5, "pc": 185.0, "t": 1})), 60);
    let app = app(state);
    let uri = quote_uri(&[("symbol", "aapl"), ("token", "abc")]);

    let response = app.clone().oneshot(get(&uri)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["x-cache-status"], "MISS");
    assert_eq!(response.headers()[header::CACHE_CONTROL], "public, max-age=60");

    let body = body_json(response).await;
    assert_eq!(body["c"], 187.5);
    assert_eq!(body["pc"], 185.0);
    assert_eq!(body["symbol"], "AAPL");
    assert_eq!(body["source"], "mock");
    assert_eq!(body["t"], 1);
    assert!(body["timestamp"].is_i64());

    let response = app.oneshot(get(&uri)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["x-cache-status"], "HIT");
    assert_eq!(source.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_no_data_is_not_found() {
    let (state, _) = state_with(Ok(json!({"c": 0, "pc": 0})), 60);
    let uri = quote_uri(&[("symbol", "ZZZZ"), ("token", "abc")]);

    let response = app(state).oneshot(get(&uri)).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let body = body_json(response).await;
    assert_eq!(body["symbol"], "ZZZZ");
    assert_eq!(body["retryable"], false);
}

#[tokio::test]
async fn test_upstream_outage_is_service_unavailable() {
    let (state, _) = state_with(Err(502), 60);
    let uri = quote_uri(&[("symbol", "AAPL"), ("token", "abc")]);

    let response = app(state).oneshot(get(&uri)).await.unwrap();
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

    let body = body_json(response).await;
    assert_eq!(body["retryable"], true);
}

#[tokio::test]
async fn test_upstream_auth_failure_is_internal_error() {
    let (state, _) = state_with(Err(401), 60);
    let uri = quote_uri(&[("symbol", "AAPL"), ("token", "abc")]);

    let response = app(state).oneshot(get(&uri)).await.unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

    let body = body_json(response).await;
    assert_eq!(body["kind"], "upstreamAuth");
    assert_eq!(body["retryable"], false);
}

#[tokio::test]
async fn test_other_methods_are_rejected() {
    let request = Request::builder()
        .method(Method::POST)
        .uri("/api/quote?symbol=AAPL&token=abc")
        .body(Body::empty())
        .unwrap();

    let response = app(default_state()).oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);

    let body = body_json(response).await;
    assert_eq!(body["allowedMethods"], json!(["GET", "OPTIONS"]));
}

#[tokio::test]
async fn test_options_returns_empty_ok() {
    let request = Request::builder()
        .method(Method::OPTIONS)
        .uri("/api/quote")
        .body(Body::empty())
        .unwrap();

    let response = app(default_state()).oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    assert!(bytes.is_empty());
}

#[tokio::test]
async fn test_rate_limit_response() {
    let (state, _) = state_with(Ok(json!({"c": 10.0, "pc": 9.5})), 2);
    let app = app(state);
    let uri = quote_uri(&[("symbol", "F"), ("token", "abc")]);

    for _ in 0..2 {
        let response = app.clone().oneshot(get(&uri)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    let response = app.clone().oneshot(get(&uri)).await.unwrap();
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    let retry_after: u64 = response.headers()[header::RETRY_AFTER]
        .to_str()
        .unwrap()
        .parse()
        .unwrap();
    assert!((1..=60).contains(&retry_after));

    let body = body_json(response).await;
    assert_eq!(body["retryAfter"], retry_after);
    assert_eq!(body["retryable"], true);

    // A different forwarded address is a different client.
    let request = Request::builder()
        .uri(&uri)
        .header("x-forwarded-for", "203.0.113.9")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_metrics_endpoint() {
    let request = Request::builder()
        .method(Method::POST)
        .uri("/api/metrics")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(
            json!({"params": {"shares": 100, "entryPrice": 150.0}, "price": 153.0}).to_string(),
        ))
        .unwrap();

    let response = app(default_state()).oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["currentPrice"], 153.0);
    assert_eq!(body["recommendedShares"], 39.0);
    assert!((body["stopPrice"].as_f64().unwrap() - 147.0).abs() < 1e-9);
    assert!(body["pl"].as_f64().unwrap() > 0.0);
}

#[tokio::test]
async fn test_monitor_disabled_is_not_found() {
    let response = app(default_state()).oneshot(get("/api/monitor")).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_monitor_session_endpoints() {
    let path = std::env::temp_dir().join(format!(
        "tradecalc-api-params-{}-{}.json",
        std::process::id(),
        chrono::Utc::now().timestamp_nanos_opt().unwrap_or_default()
    ));

    let feed = Arc::new(PriceFeed::new());
    let session = TradeSession::new(TradeParameters::default(), Arc::new(LogNotifier));
    session.attach(&feed);
    feed.start(FeedConfig::simulated(150.0).with_seed(9))
        .await
        .unwrap();

    let params_store = Arc::new(ParameterStore::new(FileKvStore::open(&path)));
    let mut state = default_state();
    state.monitor = Some(MonitorState {
        feed: feed.clone(),
        session,
        params: Some(params_store.clone()),
    });
    let app = app(state);

    let response = app.clone().oneshot(get("/api/monitor")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["feed"]["mode"], "simulated");
    assert_eq!(body["snapshot"]["currentPrice"], 150.0);
    assert_eq!(body["alertState"]["crossedStop"], false);
    assert_eq!(body["parameters"]["shares"], 100);

    let request = Request::builder()
        .method(Method::PUT)
        .uri("/api/monitor/params")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(json!({"entryPrice": 160.0, "shares": 10}).to_string()))
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let snapshot = body_json(response).await;
    assert!((snapshot["stopPrice"].as_f64().unwrap() - 156.8).abs() < 1e-9);
    assert_eq!(snapshot["currentPrice"], 150.0);

    // 150 is below the new 156.80 stop.
    let body = body_json(app.clone().oneshot(get("/api/monitor")).await.unwrap()).await;
    assert_eq!(body["alertState"]["crossedStop"], true);
    assert_eq!(body["recentAlerts"][0]["alert"]["kind"], "stopLoss");

    let stored = params_store.load();
    assert_eq!(stored.entry_price, 160.0);
    assert_eq!(stored.shares, 10);

    let response = app.oneshot(get("/api/monitor/history")).await.unwrap();
    let history = body_json(response).await;
    assert_eq!(history.as_array().unwrap().len(), 1);
    assert_eq!(history[0]["price"], 150.0);

    feed.stop();
    let _ = std::fs::remove_file(&path);
}
