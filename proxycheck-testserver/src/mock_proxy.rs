mod breaker;

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use axum::Router;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::header::CONTENT_TYPE;
use axum::http::{HeaderMap, HeaderValue, Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use serde_json::json;

pub use breaker::{BreakerOptions, BreakerSnapshot, CircuitState};
use breaker::Breaker;

use crate::upstream::{Upstream, UpstreamOptions};
use crate::{ServerHandle, spawn_server};

pub const PATH_HEALTH: &str = "/health";
pub const PATH_METRICS: &str = "/metrics";
pub const PATH_BREAKER_STATS: &str = "/circuit-breaker-stats";

pub const HEADER_REQUEST_ID: &str = "x-proxy-request-id";
pub const HEADER_PROVIDER: &str = "x-provider";
pub const HEADER_DEGRADED: &str = "x-degraded";

#[derive(Debug, Clone, PartialEq)]
pub struct RateLimitOptions {
    /// Proxied requests admitted per fixed window.
    pub max_requests: u64,
    pub window: Duration,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MockProxyOptions {
    /// Routable components; anything else answers 404.
    pub targets: Vec<String>,
    pub rate_limit: Option<RateLimitOptions>,
    pub breaker: BreakerOptions,
    /// Cache 200 GET responses and serve them while the breaker is closed or open.
    pub cache: bool,
    pub request_id_header: bool,
    pub upstream: UpstreamOptions,
}

impl Default for MockProxyOptions {
    fn default() -> Self {
        Self {
            targets: vec![
                "zerion".to_string(),
                "coingecko".to_string(),
                "alchemy".to_string(),
            ],
            rate_limit: None,
            breaker: BreakerOptions::default(),
            cache: true,
            request_id_header: true,
            upstream: UpstreamOptions::default(),
        }
    }
}

impl MockProxyOptions {
    #[must_use]
    pub fn with_rate_limit(mut self, max_requests: u64, window: Duration) -> Self {
        self.rate_limit = Some(RateLimitOptions {
            max_requests,
            window,
        });
        self
    }

    #[must_use]
    pub fn with_breaker(
        mut self,
        failure_threshold: u32,
        success_threshold: u32,
        open_timeout: Duration,
    ) -> Self {
        self.breaker = BreakerOptions {
            failure_threshold,
            success_threshold,
            open_timeout,
        };
        self
    }

    #[must_use]
    pub fn without_cache(mut self) -> Self {
        self.cache = false;
        self
    }

    #[must_use]
    pub fn without_request_id(mut self) -> Self {
        self.request_id_header = false;
        self
    }

    #[must_use]
    pub fn with_upstream(mut self, upstream: UpstreamOptions) -> Self {
        self.upstream = upstream;
        self
    }
}

#[derive(Debug, Clone, Default)]
pub struct MockProxyStats {
    requests_total: Arc<AtomicU64>,
    rate_limited: Arc<AtomicU64>,
    cache_hits: Arc<AtomicU64>,
    degraded: Arc<AtomicU64>,
    upstream_latency_micros: Arc<AtomicU64>,
    upstream_calls: Arc<AtomicU64>,
}

impl MockProxyStats {
    fn inc(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    fn record_upstream(&self, latency: Duration) {
        Self::inc(&self.upstream_calls);
        let micros = u64::try_from(latency.as_micros()).unwrap_or(u64::MAX);
        self.upstream_latency_micros
            .fetch_add(micros, Ordering::Relaxed);
    }

    /// Proxied requests, excluding the health, metrics and stats endpoints.
    pub fn requests_total(&self) -> u64 {
        self.requests_total.load(Ordering::Relaxed)
    }

    pub fn rate_limited(&self) -> u64 {
        self.rate_limited.load(Ordering::Relaxed)
    }

    pub fn cache_hits(&self) -> u64 {
        self.cache_hits.load(Ordering::Relaxed)
    }

    pub fn degraded(&self) -> u64 {
        self.degraded.load(Ordering::Relaxed)
    }

    pub fn upstream_calls(&self) -> u64 {
        self.upstream_calls.load(Ordering::Relaxed)
    }

    fn latency_avg_ms(&self) -> f64 {
        let calls = self.upstream_calls();
        if calls == 0 {
            return 0.0;
        }
        self.upstream_latency_micros.load(Ordering::Relaxed) as f64 / calls as f64 / 1000.0
    }
}

#[derive(Debug)]
struct RateWindow {
    started: Instant,
    admitted: u64,
}

impl RateWindow {
    fn admit(&mut self, opts: &RateLimitOptions) -> bool {
        if self.started.elapsed() >= opts.window {
            self.started = Instant::now();
            self.admitted = 0;
        }
        if self.admitted >= opts.max_requests {
            return false;
        }
        self.admitted += 1;
        true
    }
}

#[derive(Debug)]
struct ProxyState {
    options: MockProxyOptions,
    upstream: Upstream,
    stats: MockProxyStats,
    breakers: Mutex<BTreeMap<String, Breaker>>,
    cache: Mutex<HashMap<String, Bytes>>,
    window: Mutex<RateWindow>,
    next_request_id: AtomicU64,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl ProxyState {
    fn new(options: MockProxyOptions) -> Self {
        let breakers = options
            .targets
            .iter()
            .map(|t| (t.clone(), Breaker::default()))
            .collect();
        Self {
            upstream: Upstream::new(options.upstream.clone()),
            options,
            stats: MockProxyStats::default(),
            breakers: Mutex::new(breakers),
            cache: Mutex::new(HashMap::new()),
            window: Mutex::new(RateWindow {
                started: Instant::now(),
                admitted: 0,
            }),
            next_request_id: AtomicU64::new(1),
        }
    }

    fn admit_rate(&self) -> bool {
        match &self.options.rate_limit {
            Some(opts) => lock(&self.window).admit(opts),
            None => true,
        }
    }

    fn admit_breaker(&self, target: &str) -> Option<CircuitState> {
        let mut breakers = lock(&self.breakers);
        breakers
            .entry(target.to_string())
            .or_default()
            .admit(&self.options.breaker)
    }

    fn record_breaker(&self, target: &str, success: bool) {
        let mut breakers = lock(&self.breakers);
        breakers
            .entry(target.to_string())
            .or_default()
            .record(success, &self.options.breaker);
    }

    fn cached(&self, key: Option<&str>) -> Option<Bytes> {
        if !self.options.cache {
            return None;
        }
        lock(&self.cache).get(key?).cloned()
    }

    fn store(&self, key: Option<&str>, body: &Bytes) {
        if let (true, Some(key)) = (self.options.cache, key) {
            lock(&self.cache).insert(key.to_string(), body.clone());
        }
    }

    fn reply(&self, status: StatusCode, target: &str, request_id: u64, body: Bytes) -> Response {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        if self.options.request_id_header {
            headers.insert(HEADER_REQUEST_ID, HeaderValue::from(request_id));
        }
        if let Ok(v) = HeaderValue::from_str(target) {
            headers.insert(HEADER_PROVIDER, v);
        }
        (status, headers, body).into_response()
    }
}

fn error_body(msg: &str) -> Bytes {
    Bytes::from(json!({ "error": msg }).to_string())
}

/// `/zerion/status/500` -> (`zerion`, `/status/500`).
fn split_target(path: &str) -> Option<(&str, String)> {
    let trimmed = path.strip_prefix('/')?;
    let (target, rest) = match trimmed.split_once('/') {
        Some((t, r)) => (t, format!("/{r}")),
        None => (trimmed, "/".to_string()),
    };
    (!target.is_empty()).then_some((target, rest))
}

async fn handle_health() -> &'static str {
    "OK"
}

async fn handle_metrics(State(state): State<Arc<ProxyState>>) -> String {
    let s = &state.stats;
    format!(
        "# TYPE api_proxy_requests_total counter\n\
         api_proxy_requests_total {}\n\
         # TYPE api_proxy_rate_limited_total counter\n\
         api_proxy_rate_limited_total {}\n\
         # TYPE api_proxy_latency_avg_ms gauge\n\
         api_proxy_latency_avg_ms {:.3}\n",
        s.requests_total(),
        s.rate_limited(),
        s.latency_avg_ms()
    )
}

async fn handle_breaker_stats(State(state): State<Arc<ProxyState>>) -> axum::Json<serde_json::Value> {
    let breakers = lock(&state.breakers);
    let map: serde_json::Map<String, serde_json::Value> = breakers
        .iter()
        .map(|(target, b)| {
            (
                target.clone(),
                serde_json::to_value(b.snapshot()).unwrap_or_default(),
            )
        })
        .collect();
    axum::Json(serde_json::Value::Object(map))
}

async fn handle_proxy(State(state): State<Arc<ProxyState>>, method: Method, uri: Uri) -> Response {
    let request_id = state.next_request_id.fetch_add(1, Ordering::Relaxed);
    let Some((target, rest)) = split_target(uri.path()) else {
        return (StatusCode::NOT_FOUND, error_body("no provider in path")).into_response();
    };
    if !state.options.targets.iter().any(|t| t == target) {
        return state.reply(
            StatusCode::NOT_FOUND,
            target,
            request_id,
            error_body("unknown provider"),
        );
    }

    MockProxyStats::inc(&state.stats.requests_total);
    if !state.admit_rate() {
        MockProxyStats::inc(&state.stats.rate_limited);
        return state.reply(
            StatusCode::TOO_MANY_REQUESTS,
            target,
            request_id,
            error_body("rate limit exceeded"),
        );
    }

    let cache_key = (method == Method::GET).then(|| uri.path().to_string());

    let Some(admitted_as) = state.admit_breaker(target) else {
        return match state.cached(cache_key.as_deref()) {
            Some(body) => {
                MockProxyStats::inc(&state.stats.degraded);
                let mut res = state.reply(StatusCode::OK, target, request_id, body);
                res.headers_mut()
                    .insert(HEADER_DEGRADED, HeaderValue::from_static("cache"));
                res
            }
            None => state.reply(
                StatusCode::SERVICE_UNAVAILABLE,
                target,
                request_id,
                error_body("circuit open"),
            ),
        };
    };

    // Half-open probes must reach the upstream to move the breaker.
    if admitted_as == CircuitState::Closed
        && let Some(body) = state.cached(cache_key.as_deref())
    {
        MockProxyStats::inc(&state.stats.cache_hits);
        return state.reply(StatusCode::OK, target, request_id, body);
    }

    let started = Instant::now();
    let upstream_id = request_id.to_string();
    let reply = state.upstream.call(&method, &rest, Some(&upstream_id)).await;
    state.stats.record_upstream(started.elapsed());

    state.record_breaker(target, !reply.status.is_server_error());

    let body = Bytes::from(reply.body.to_string());
    if reply.status == StatusCode::OK {
        state.store(cache_key.as_deref(), &body);
    }
    state.reply(reply.status, target, request_id, body)
}

fn router(state: Arc<ProxyState>) -> Router {
    Router::new()
        .route(PATH_HEALTH, get(handle_health))
        .route(PATH_METRICS, get(handle_metrics))
        .route(PATH_BREAKER_STATS, get(handle_breaker_stats))
        .fallback(handle_proxy)
        .with_state(state)
}

/// In-process stand-in for the proxy under test, with its own stub upstream.
pub struct MockProxy {
    handle: ServerHandle,
    state: Arc<ProxyState>,
}

impl MockProxy {
    pub async fn start() -> std::io::Result<Self> {
        Self::start_with(MockProxyOptions::default()).await
    }

    pub async fn start_with(options: MockProxyOptions) -> std::io::Result<Self> {
        Self::bind("127.0.0.1:0", options).await
    }

    pub async fn bind(addr: &str, options: MockProxyOptions) -> std::io::Result<Self> {
        let state = Arc::new(ProxyState::new(options));
        let handle = spawn_server(addr, router(state.clone())).await?;
        Ok(Self { handle, state })
    }

    pub fn base_url(&self) -> &str {
        &self.handle.base_url
    }

    pub fn stats(&self) -> &MockProxyStats {
        &self.state.stats
    }

    pub fn upstream(&self) -> &Upstream {
        &self.state.upstream
    }

    pub fn breaker_state(&self, target: &str) -> Option<CircuitState> {
        lock(&self.state.breakers).get(target).map(Breaker::state)
    }

    pub async fn shutdown(self) {
        self.handle.shutdown().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn target_is_split_from_path() {
        assert_eq!(
            split_target("/zerion/status/500"),
            Some(("zerion", "/status/500".to_string()))
        );
        assert_eq!(split_target("/zerion"), Some(("zerion", "/".to_string())));
        assert_eq!(split_target("/"), None);
    }

    #[test]
    fn fixed_window_admits_up_to_limit() {
        let opts = RateLimitOptions {
            max_requests: 3,
            window: Duration::from_secs(60),
        };
        let mut w = RateWindow {
            started: Instant::now(),
            admitted: 0,
        };
        let admitted = (0..10).filter(|_| w.admit(&opts)).count();
        assert_eq!(admitted, 3);
    }
}
