use serde_json::json;

use crate::driver::LoadDriver;
use crate::probe::{Probe, ProbeRequest};
use crate::results::ScenarioResult;
use crate::stats::round2;
use crate::suite::{Flow, Suite, fmt_secs};

fn fmt_ms(v: Option<f64>) -> String {
    v.map_or_else(|| "n/a".to_string(), |ms| format!("{ms:.2}ms"))
}

impl<P> Suite<P>
where
    P: Probe + 'static,
{
    /// Sustained load against `/{target}/test`.
    ///
    /// Passes when something succeeded, the average latency stays under the bound, the success
    /// rate meets the floor, and the limiter never answered 429.
    pub async fn load_test(&mut self) -> Flow {
        tracing::info!(scenario = "load_test", "running scenario");
        let cfg = self.config.load.clone();
        self.narrator.note(&format!(
            "Running load test: {} concurrent for {}...",
            cfg.concurrency,
            fmt_secs(cfg.duration)
        ));

        let req = ProbeRequest::get(self.target_path("test")).with_timeout(cfg.probe_timeout);
        let report = LoadDriver::new(self.probe.clone())
            .with_progress(self.narrator.load_progress())
            .run_sustained(req, cfg.duration, cfg.concurrency)
            .await;
        let stats = &report.stats;
        let latency = stats.latency_summary();

        // Throughput is reported against the configured window, not the measured one.
        let qps = stats.total as f64 / cfg.duration.as_secs_f64();
        let success_rate = stats.success_rate();
        let avg_ms = latency.avg.unwrap_or(0.0);
        let max_avg_ms = cfg.max_avg_latency.as_secs_f64() * 1000.0;

        let latency_ok = avg_ms < max_avg_ms;
        let rate_ok = success_rate >= cfg.min_success_rate;
        let passed = stats.success > 0 && latency_ok && rate_ok && stats.rate_limited == 0;

        self.narrator.note(&format!(
            "Total: {}, Success: {}, Errors: {}, Rate Limited: {}",
            stats.total, stats.success, stats.errors, stats.rate_limited
        ));
        self.narrator.note(&format!(
            "QPS: {qps:.2}, Success Rate: {success_rate:.2}%"
        ));
        self.narrator.note(&format!(
            "Latency: min={}, avg={}, max={}",
            fmt_ms(latency.min),
            fmt_ms(latency.avg),
            fmt_ms(latency.max)
        ));
        let mut tail = format!(
            "Latency: p50={}, p95={}, p99={}",
            fmt_ms(latency.p50),
            fmt_ms(latency.p95),
            fmt_ms(latency.p99)
        );
        if latency.p999.is_some() {
            tail.push_str(&format!(", p999={}", fmt_ms(latency.p999)));
        }
        self.narrator.note(&tail);

        if !passed {
            if stats.rate_limited > 0 {
                self.warn(&format!(
                    "Rate limiting triggered {} times during load",
                    stats.rate_limited
                ));
            }
            if !latency_ok {
                self.warn(&format!("High average latency: {avg_ms:.2}ms"));
            }
            if !rate_ok {
                self.warn(&format!("Low success rate: {success_rate:.2}%"));
            }
            if stats.success == 0 {
                self.warn("No successful requests during load");
            }
        }

        let details = json!({
            "total": stats.total,
            "success": stats.success,
            "errors": stats.errors,
            "rate_limited": stats.rate_limited,
            "qps": round2(qps),
            "success_rate": round2(success_rate),
            "concurrency": report.workers,
            "duration_seconds": cfg.duration.as_secs_f64(),
            "latency": latency.rounded(),
            "status_counts": stats.status_counts_by_name(),
        });
        let msg = if passed {
            "Load test completed"
        } else {
            "Load test performance issues"
        };
        self.record(ScenarioResult::new("load_test", passed, details), msg)
    }
}
