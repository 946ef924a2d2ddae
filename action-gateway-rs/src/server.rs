//! HTTP surface
//!
//! - `POST /api/v1/dispatch`: one envelope in, `{success, result?, error?}` out
//! - `GET /api/v1/circuits`: circuit breaker snapshots
//! - `GET /health`: liveness, mode and uptime

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::body::Bytes;
use axum::extract::{ConnectInfo, DefaultBodyLimit, State};
use axum::http::{HeaderMap, HeaderName, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use provider_sdk::util::generate_request_id;
use provider_sdk::Resilience;
use serde::Serialize;
use serde_json::{json, Value};
use tokio::task::JoinHandle;
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;
use tracing::{debug, info};

use crate::dispatch::{DispatchContext, Dispatcher};
use crate::envelope::DispatchResponse;
use crate::error::GatewayError;

pub const API_KEY_HEADER: &str = "x-api-key";
pub const TIMEOUT_HEADER: &str = "x-request-timeout-ms";
pub const REQUEST_ID_HEADER: &str = "x-request-id";

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub healthy: bool,
    pub service_name: String,
    pub mode: Option<String>,
    pub uptime_seconds: u64,
    pub status: String,
}

/// Shared state behind every route
pub struct ActionGateway {
    dispatcher: Arc<Dispatcher>,
    started: Instant,
}

impl ActionGateway {
    pub fn new(dispatcher: Arc<Dispatcher>) -> Self {
        Self {
            dispatcher,
            started: Instant::now(),
        }
    }

    pub fn dispatcher(&self) -> &Arc<Dispatcher> {
        &self.dispatcher
    }

    pub fn create_router(self: Arc<Self>) -> Router {
        let max_body = self.dispatcher.config().max_body_bytes;

        Router::new()
            .route("/", get(Self::root_handler))
            .route("/health", get(Self::health_handler))
            .route("/api/v1/dispatch", post(Self::dispatch_handler))
            .route("/api/v1/circuits", get(Self::circuits_handler))
            .layer(DefaultBodyLimit::disable())
            .layer(RequestBodyLimitLayer::new(max_body))
            .layer(CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any))
            .layer(TraceLayer::new_for_http())
            .with_state(self)
    }

    /// Bind and serve until ctrl-c
    pub async fn serve(self: Arc<Self>, addr: SocketAddr) -> std::io::Result<()> {
        let purge = spawn_rate_limit_purge(
            self.dispatcher.resilience().clone(),
            self.dispatcher.config().resilience.rate_limit_window,
        );

        let listener = tokio::net::TcpListener::bind(addr).await?;
        info!(%addr, "Action gateway listening");

        let app = self.create_router();
        let served = axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
            .with_graceful_shutdown(async {
                let _ = tokio::signal::ctrl_c().await;
                info!("Shutdown signal received");
            })
            .await;

        purge.abort();
        served
    }

    async fn root_handler() -> impl IntoResponse {
        Json(json!({
            "service": "action-gateway",
            "version": env!("CARGO_PKG_VERSION"),
            "endpoints": [
                "GET /health",
                "GET /api/v1/circuits",
                "POST /api/v1/dispatch"
            ]
        }))
    }

    async fn health_handler(State(state): State<Arc<Self>>) -> impl IntoResponse {
        let mode = state.dispatcher.modes().mode();

        Json(HealthResponse {
            healthy: true,
            service_name: "action-gateway".to_string(),
            mode: mode.map(|m| m.to_string()),
            uptime_seconds: state.started.elapsed().as_secs(),
            status: if mode.is_some() { "SERVING" } else { "STARTING" }.to_string(),
        })
    }

    async fn circuits_handler(State(state): State<Arc<Self>>) -> impl IntoResponse {
        let circuits: Vec<Value> = state
            .dispatcher
            .resilience()
            .circuit_snapshots()
            .into_iter()
            .map(|(identity, snapshot)| json!({"identity": identity, "circuit": snapshot}))
            .collect();

        Json(json!({ "circuits": circuits }))
    }

    async fn dispatch_handler(
        State(state): State<Arc<Self>>,
        peer: Option<ConnectInfo<SocketAddr>>,
        headers: HeaderMap,
        body: Bytes,
    ) -> Response {
        let request_id = generate_request_id();
        let mut ctx = DispatchContext::new(client_key(&headers, peer.map(|ConnectInfo(addr)| addr)))
            .with_request_id(request_id.clone());
        if let Some(timeout) = requested_timeout(&headers) {
            ctx = ctx.with_timeout(timeout);
        }

        let raw = serde_json::from_slice::<Value>(&body).unwrap_or_else(|e| {
            debug!(error = %e, "Body is not JSON");
            Value::Null
        });

        let mut response = match state.dispatcher.dispatch_value(raw, &ctx).await {
            Ok(result) => {
                let mut response = (StatusCode::OK, Json(DispatchResponse::ok(result.payload))).into_response();
                let headers = response.headers_mut();
                insert_header(headers, "x-provider", &result.provider_identity.to_string());
                insert_header(headers, "x-attempts", &result.attempts.to_string());
                insert_header(headers, "x-latency-ms", &result.latency_ms.to_string());
                response
            }
            Err(err) => error_response(&err),
        };

        insert_header(response.headers_mut(), REQUEST_ID_HEADER, &request_id);
        response
    }
}

fn error_response(err: &GatewayError) -> Response {
    let mut response = (err.status_code(), Json(DispatchResponse::failed(err))).into_response();

    if let Some(retry_after) = err.retry_after() {
        let seconds = retry_after.as_secs() + u64::from(retry_after.subsec_nanos() > 0);
        insert_header(response.headers_mut(), "retry-after", &seconds.to_string());
    }

    response
}

fn insert_header(headers: &mut HeaderMap, name: &'static str, value: &str) {
    if let Ok(value) = HeaderValue::from_str(value) {
        headers.insert(HeaderName::from_static(name), value);
    }
}

/// `X-API-Key` when present, else the peer IP
pub fn client_key(headers: &HeaderMap, peer: Option<SocketAddr>) -> String {
    headers
        .get(API_KEY_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(|key| format!("key:{}", key))
        .or_else(|| peer.map(|addr| format!("ip:{}", addr.ip())))
        .unwrap_or_else(|| "anonymous".to_string())
}

fn requested_timeout(headers: &HeaderMap) -> Option<Duration> {
    headers
        .get(TIMEOUT_HEADER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok())
        .map(Duration::from_millis)
}

/// Drop expired rate windows once per window length
pub fn spawn_rate_limit_purge(resilience: Arc<Resilience>, every: Duration) -> JoinHandle<()> {
    let every = every.max(Duration::from_secs(1));

    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.tick().await;
        loop {
            ticker.tick().await;
            let purged = resilience.rate_limiter().purge_expired();
            if purged > 0 {
                debug!(purged, "Purged expired rate windows");
            }
        }
    })
}
