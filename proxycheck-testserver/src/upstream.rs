use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use axum::Json;
use axum::Router;
use axum::extract::State;
use axum::http::{HeaderMap, Method, StatusCode, Uri};
use serde_json::{Value, json};
use tokio::time::{Duration, sleep};

pub const HEADER_UPSTREAM_REQUEST_ID: &str = "x-onekey-request-id";
pub const ENV_SUCCESS_RATE: &str = "SUCCESS_RATE";

#[derive(Debug, Clone, PartialEq)]
pub struct UpstreamOptions {
    /// Probability that a catch-all request succeeds; the rest answer 500.
    pub success_rate: f64,
    /// Inclusive random delay range in milliseconds for catch-all requests.
    pub delay_ms: Option<(u64, u64)>,
    /// Stamp a per-request nonce into `cache-test-` bodies.
    pub volatile_bodies: bool,
}

impl Default for UpstreamOptions {
    fn default() -> Self {
        Self {
            success_rate: 1.0,
            delay_ms: Some((10, 50)),
            volatile_bodies: false,
        }
    }
}

impl UpstreamOptions {
    /// Defaults, with `success_rate` read from `SUCCESS_RATE` when set and valid.
    pub fn from_env() -> Self {
        let mut options = Self::default();
        if let Some(rate) = std::env::var(ENV_SUCCESS_RATE)
            .ok()
            .and_then(|v| v.trim().parse::<f64>().ok())
            .filter(|r| (0.0..=1.0).contains(r))
        {
            options.success_rate = rate;
        }
        options
    }

    #[must_use]
    pub fn without_delay(mut self) -> Self {
        self.delay_ms = None;
        self
    }

    #[must_use]
    pub fn with_success_rate(mut self, rate: f64) -> Self {
        self.success_rate = rate.clamp(0.0, 1.0);
        self
    }

    #[must_use]
    pub fn volatile_bodies(mut self) -> Self {
        self.volatile_bodies = true;
        self
    }
}

#[derive(Debug, Clone)]
pub struct UpstreamReply {
    pub status: StatusCode,
    pub body: Value,
}

impl UpstreamReply {
    fn new(status: StatusCode, body: Value) -> Self {
        Self { status, body }
    }
}

/// The stub upstream behind the proxy. Cheap to clone; clones share counters.
#[derive(Debug, Clone, Default)]
pub struct Upstream {
    options: Arc<UpstreamOptions>,
    requests_total: Arc<AtomicU64>,
    nonce: Arc<AtomicU64>,
}

impl Upstream {
    pub fn new(options: UpstreamOptions) -> Self {
        Self {
            options: Arc::new(options),
            ..Self::default()
        }
    }

    pub fn requests_total(&self) -> u64 {
        self.requests_total.load(Ordering::Relaxed)
    }

    pub async fn call(&self, method: &Method, path: &str, request_id: Option<&str>) -> UpstreamReply {
        self.requests_total.fetch_add(1, Ordering::Relaxed);

        match path {
            "/health" => UpstreamReply::new(StatusCode::OK, json!({ "status": "healthy" })),
            "/status/500" => UpstreamReply::new(
                StatusCode::INTERNAL_SERVER_ERROR,
                json!({ "error": "Forced 500" }),
            ),
            "/fail" => UpstreamReply::new(
                StatusCode::INTERNAL_SERVER_ERROR,
                json!({ "error": "Forced failure" }),
            ),
            "/success" => UpstreamReply::new(StatusCode::OK, json!({ "success": true })),
            _ => self.catch_all(method, path, request_id).await,
        }
    }

    async fn catch_all(&self, method: &Method, path: &str, request_id: Option<&str>) -> UpstreamReply {
        if let Some((lo, hi)) = self.options.delay_ms
            && hi > 0
        {
            let ms = rand::random_range(lo.min(hi)..=hi);
            sleep(Duration::from_millis(ms)).await;
        }

        let path = path.trim_start_matches('/');
        if path.contains("cache-test-") {
            let mut body = json!({
                "success": true,
                "path": path,
                "method": method.as_str(),
            });
            if self.options.volatile_bodies {
                body["nonce"] = json!(self.nonce.fetch_add(1, Ordering::Relaxed));
            }
            return UpstreamReply::new(StatusCode::OK, body);
        }

        if rand::random::<f64>() < self.options.success_rate {
            let timestamp = SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map(|d| d.as_secs_f64())
                .unwrap_or_default();
            UpstreamReply::new(
                StatusCode::OK,
                json!({
                    "success": true,
                    "path": path,
                    "method": method.as_str(),
                    "request_id": request_id,
                    "timestamp": timestamp,
                }),
            )
        } else {
            UpstreamReply::new(
                StatusCode::INTERNAL_SERVER_ERROR,
                json!({ "error": "Simulated upstream error" }),
            )
        }
    }
}

async fn handle_upstream(
    State(upstream): State<Upstream>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
) -> (StatusCode, Json<Value>) {
    let request_id = headers
        .get(HEADER_UPSTREAM_REQUEST_ID)
        .and_then(|v| v.to_str().ok());
    let reply = upstream.call(&method, uri.path(), request_id).await;
    (reply.status, Json(reply.body))
}

pub fn upstream_router(upstream: Upstream) -> Router {
    Router::new()
        .fallback(handle_upstream)
        .with_state(upstream)
}
