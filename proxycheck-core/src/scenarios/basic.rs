use serde_json::json;

use crate::poller::component_state;
use crate::probe::{Probe, ProbeRequest};
use crate::results::ScenarioResult;
use crate::suite::{Flow, Suite, fmt_status};

use super::{METRIC_LATENCY_AVG, METRIC_REQUESTS_TOTAL};

impl<P> Suite<P>
where
    P: Probe + 'static,
{
    /// `GET /health` answers 200 with a non-empty body.
    pub async fn health_endpoint(&mut self) -> Flow {
        tracing::info!(scenario = "health_endpoint", "running scenario");
        let out = self.send(ProbeRequest::get("/health")).await;
        let passed = out.status == Some(200) && !out.body.is_empty();

        let msg = if passed {
            "Health endpoint".to_string()
        } else {
            format!(
                "Health endpoint failed: {}, body={}",
                fmt_status(out.status),
                out.body_preview(50)
            )
        };
        self.record(
            ScenarioResult::new(
                "health_endpoint",
                passed,
                json!({
                    "status": out.status,
                    "body": out.body_preview(100),
                }),
            ),
            &msg,
        )
    }

    /// `GET /metrics` exposes both proxy metric families.
    pub async fn metrics_endpoint(&mut self) -> Flow {
        tracing::info!(scenario = "metrics_endpoint", "running scenario");
        let out = self.send(ProbeRequest::get("/metrics")).await;
        let body = out.body_text();
        let has_requests_total = body.contains(METRIC_REQUESTS_TOTAL);
        let has_latency = body.contains(METRIC_LATENCY_AVG);
        let passed = out.status == Some(200) && has_requests_total && has_latency;

        let msg = if passed {
            "Metrics endpoint".to_string()
        } else {
            format!("Metrics endpoint failed: {}", fmt_status(out.status))
        };
        self.record(
            ScenarioResult::new(
                "metrics_endpoint",
                passed,
                json!({
                    "status": out.status,
                    "has_requests_total": has_requests_total,
                    "has_latency": has_latency,
                }),
            ),
            &msg,
        )
    }

    /// `GET /circuit-breaker-stats` answers 200 and reports the configured target.
    pub async fn circuit_breaker_stats(&mut self) -> Flow {
        tracing::info!(scenario = "circuit_breaker_stats", "running scenario");
        let target = self.config.target.clone();
        let fetched = self.poller().fetch_stats().await;

        let (passed, status, state, msg) = match fetched {
            Ok(stats) => match component_state(&stats, &target) {
                Some(state) => (
                    true,
                    Some(200),
                    Some(state.to_string()),
                    format!("Circuit breaker stats (target: {target})"),
                ),
                None if stats.contains_key(&target) => (
                    true,
                    Some(200),
                    None,
                    format!("Circuit breaker stats (target: {target}, no state field)"),
                ),
                None => {
                    self.warn(&format!("Target {target} not found in stats"));
                    (
                        false,
                        Some(200),
                        None,
                        format!("Circuit breaker stats missing target {target}"),
                    )
                }
            },
            Err(status) => (
                false,
                status,
                None,
                format!("Circuit breaker stats failed: {}", fmt_status(status)),
            ),
        };

        self.record(
            ScenarioResult::new(
                "circuit_breaker_stats",
                passed,
                json!({
                    "status": status,
                    "state": state,
                }),
            ),
            &msg,
        )
    }
}
