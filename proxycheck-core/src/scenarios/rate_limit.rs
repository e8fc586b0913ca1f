use serde_json::json;

use crate::driver::LoadDriver;
use crate::probe::{Probe, ProbeRequest};
use crate::results::ScenarioResult;
use crate::stats::round2;
use crate::suite::{Flow, Suite};

impl<P> Suite<P>
where
    P: Probe + 'static,
{
    /// Burst against `/{target}/test`; passes once the limiter answers at least one 429.
    pub async fn rate_limiting(&mut self) -> Flow {
        tracing::info!(scenario = "rate_limiting", "running scenario");
        let cfg = self.config.rate_limit.clone();
        self.narrator.note(&format!(
            "Testing rate limiting with {} requests...",
            cfg.requests
        ));

        let req = ProbeRequest::get(self.target_path("test")).with_timeout(cfg.probe_timeout);
        let report = LoadDriver::new(self.probe.clone())
            .run_burst(req, cfg.requests, cfg.concurrency)
            .await;
        let stats = &report.stats;

        if let Some(at) = stats.first_rate_limited_at {
            self.narrator.note(&format!("First rate limit at request #{at}"));
        }

        let elapsed = report.elapsed.as_secs_f64();
        let passed = stats.rate_limited > 0;
        let msg = if passed {
            format!(
                "Rate limiting works ({}/{} limited in {elapsed:.1}s)",
                stats.rate_limited, stats.total
            )
        } else {
            format!(
                "Rate limiting not triggered (sent {} in {elapsed:.1}s)",
                stats.total
            )
        };

        let details = json!({
            "total_requests": stats.total,
            "limited_requests": stats.rate_limited,
            "first_limited_at": stats.first_rate_limited_at,
            "errors": stats.errors,
            "elapsed_seconds": round2(elapsed),
            "actual_qps": round2(report.qps()),
            "limit_rate": format!("{:.2}%", stats.rate_limited_ratio()),
        });
        self.record(ScenarioResult::new("rate_limiting", passed, details), &msg)
    }
}
