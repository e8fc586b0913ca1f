//! Scenario verifiers, each an `async fn` on [`crate::suite::Suite`].
//!
//! Every verifier records one named [`crate::results::ScenarioResult`] per check and returns a
//! [`crate::suite::Flow`] so fail-fast can stop the run at the first failure.

mod basic;
mod breaker;
mod caching;
mod load;
mod methods;
mod rate_limit;

pub const METRIC_REQUESTS_TOTAL: &str = "api_proxy_requests_total";
pub const METRIC_LATENCY_AVG: &str = "api_proxy_latency_avg_ms";

pub const HEADER_REQUEST_ID: &str = "x-proxy-request-id";
pub const HEADER_PROVIDER: &str = "x-provider";
pub const HEADER_DEGRADED: &str = "x-degraded";
