use std::time::{SystemTime, UNIX_EPOCH};

use serde_json::json;

use crate::probe::{Probe, ProbeRequest};
use crate::results::ScenarioResult;
use crate::stats::round2;
use crate::suite::{Flow, Suite, fmt_status};

impl<P> Suite<P>
where
    P: Probe + 'static,
{
    /// Two probes of a fresh path must agree on status and body hash.
    ///
    /// Whether the second probe was faster is reported but never decides the result.
    pub async fn caching(&mut self) -> Flow {
        tracing::info!(scenario = "caching", "running scenario");
        let stamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis())
            .unwrap_or_default();
        let path = self.target_path(&format!("cache-test-{stamp}"));

        let first = self.send(ProbeRequest::get(path.as_str())).await;
        if !first.status_in(&[200, 404]) {
            let msg = format!("First request failed: {}", fmt_status(first.status));
            return self.record(
                ScenarioResult::new(
                    "caching",
                    false,
                    json!({
                        "path": path,
                        "status_1": first.status,
                    }),
                ),
                &msg,
            );
        }

        self.pause(self.config.caching.gap).await;
        let second = self.send(ProbeRequest::get(path.as_str())).await;

        let latency_1 = first.latency_ms();
        let latency_2 = second.latency_ms();
        let same_status = first.status == second.status;
        let bodies_match = first.body_md5() == second.body_md5();
        let faster = latency_2 < latency_1 * 0.5;
        let passed = same_status && bodies_match;

        let msg = match (passed, faster) {
            (true, true) => format!(
                "Caching works (2nd req {latency_2:.1}ms < 1st {latency_1:.1}ms)"
            ),
            (true, false) => "Caching responses consistent".to_string(),
            (false, _) => format!(
                "Caching verification failed: status={same_status}, body={bodies_match}"
            ),
        };
        self.record(
            ScenarioResult::new(
                "caching",
                passed,
                json!({
                    "path": path,
                    "status_1": first.status,
                    "status_2": second.status,
                    "latency_1_ms": round2(latency_1),
                    "latency_2_ms": round2(latency_2),
                    "bodies_match": bodies_match,
                    "faster": faster,
                }),
            ),
            &msg,
        )
    }
}
