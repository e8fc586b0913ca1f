use serde_json::json;

use crate::config::BreakerConfig;
use crate::poller::{BreakerState, WaitReport};
use crate::probe::{Probe, ProbeRequest};
use crate::results::ScenarioResult;
use crate::suite::{Flow, Suite, duration_ms, fmt_secs};

use super::HEADER_DEGRADED;

fn wait_details(report: &WaitReport) -> serde_json::Value {
    json!({
        "observed": report.last.describe(),
        "polls": report.polls,
        "waited_ms": duration_ms(report.waited),
    })
}

fn merge(mut base: serde_json::Value, extra: serde_json::Value) -> serde_json::Value {
    if let (Some(base), serde_json::Value::Object(extra)) = (base.as_object_mut(), extra) {
        base.extend(extra);
    }
    base
}

impl<P> Suite<P>
where
    P: Probe + 'static,
{
    /// Bring the target's breaker back to `closed` if an earlier scenario left it tripped.
    ///
    /// Returns whether `closed` was observed within `recover_poll_timeout`.
    pub async fn ensure_breaker_closed(&mut self) -> bool {
        let target = self.config.target.clone();
        let b = self.config.breaker.clone();

        let initial = self.poller().observe(&target).await;
        let state = initial
            .state_label()
            .and_then(|s| s.parse::<BreakerState>().ok());
        tracing::debug!(target = %target, observed = %initial.describe(), "ensuring breaker is closed");

        match state {
            Some(BreakerState::Closed) => return true,
            Some(BreakerState::Open) => {
                self.narrator.note(&format!(
                    "Breaker is open, waiting {} before probing...",
                    fmt_secs(b.half_open_wait())
                ));
                self.pause(b.half_open_wait()).await;
                self.send(self.success_probe(&b)).await;
                self.pause(b.settle).await;
            }
            Some(BreakerState::HalfOpen) => {
                for _ in 0..b.recovery_probes() {
                    self.send(self.success_probe(&b)).await;
                    self.pause(b.success_gap).await;
                }
            }
            None => {}
        }

        let closed = self
            .poller()
            .wait_for_state(&target, BreakerState::Closed, b.recover_poll_timeout)
            .await;
        if !closed {
            self.warn(&format!(
                "Circuit breaker not in closed state: {}",
                initial.describe()
            ));
        }
        closed
    }

    /// Walk the breaker through `closed -> open -> half_open -> closed`.
    ///
    /// A failed ensure-closed or open step ends the cycle; the later steps are recorded
    /// regardless of each other.
    pub async fn circuit_breaker_full_cycle(&mut self) -> Flow {
        tracing::info!(scenario = "circuit_breaker_full_cycle", "running scenario");
        let target = self.config.target.clone();
        let b = self.config.breaker.clone();

        if !self.ensure_breaker_closed().await {
            return self.record(
                ScenarioResult::new(
                    "circuit_breaker_ready",
                    false,
                    json!({
                        "target": target,
                        "recover_timeout_ms": duration_ms(b.recover_poll_timeout),
                    }),
                ),
                "Circuit breaker still not closed, skipping full cycle test",
            );
        }

        self.narrator.note("Triggering failures...");
        let transport_failures = self.drive_failures(&b).await;
        self.pause(b.settle).await;

        let opened = self
            .poller()
            .wait_for(&target, BreakerState::Open, b.open_poll_timeout)
            .await;
        let details = merge(
            wait_details(&opened),
            json!({
                "failure_threshold": b.failure_threshold,
                "transport_failures": transport_failures,
            }),
        );
        if !opened.matched {
            return self.record(
                ScenarioResult::new("circuit_breaker_open", false, details),
                "Circuit breaker failed to open",
            );
        }
        self.record(
            ScenarioResult::new("circuit_breaker_open", true, details),
            "Circuit breaker: closed -> open",
        )?;

        self.narrator.note(&format!(
            "Waiting {} for the open timeout...",
            fmt_secs(b.half_open_wait())
        ));
        self.pause(b.half_open_wait()).await;
        let trigger = self.send(self.trigger_probe(&b)).await;
        self.pause(b.settle).await;

        let half_opened = self
            .poller()
            .wait_for(&target, BreakerState::HalfOpen, b.half_open_poll_timeout)
            .await;
        let details = merge(
            wait_details(&half_opened),
            json!({
                "open_timeout_ms": duration_ms(b.open_timeout),
                "trigger_status": trigger.status,
            }),
        );
        let msg = if half_opened.matched {
            "Circuit breaker: open -> half_open"
        } else {
            "Circuit breaker did not enter half_open state"
        };
        self.record(
            ScenarioResult::new("circuit_breaker_half_open", half_opened.matched, details),
            msg,
        )?;

        self.narrator
            .note("Sending successful requests to close circuit breaker...");
        let probes = b.recovery_probes();
        for _ in 0..probes {
            self.send(self.trigger_probe(&b)).await;
            self.pause(b.success_gap).await;
        }

        let closed = self
            .poller()
            .wait_for(&target, BreakerState::Closed, b.close_poll_timeout)
            .await;
        let details = merge(
            wait_details(&closed),
            json!({
                "success_threshold": b.success_threshold,
                "probes_sent": probes,
            }),
        );
        let msg = if closed.matched {
            "Circuit breaker: half_open -> closed"
        } else {
            "Circuit breaker failed to close"
        };
        self.record(
            ScenarioResult::new("circuit_breaker_closed", closed.matched, details),
            msg,
        )
    }

    /// With the breaker tripped, a previously cached path is served from cache and marked
    /// `X-Degraded: cache`.
    pub async fn circuit_breaker_degradation(&mut self) -> Flow {
        tracing::info!(scenario = "degradation_cache", "running scenario");
        let b = self.config.breaker.clone();

        if !self.ensure_breaker_closed().await {
            return self.record(
                ScenarioResult::new(
                    "degradation_cache",
                    false,
                    json!({
                        "target": self.config.target,
                        "recover_timeout_ms": duration_ms(b.recover_poll_timeout),
                    }),
                ),
                "Circuit breaker still not closed, skipping degradation test",
            );
        }

        let get = ProbeRequest::get(self.target_path("get"));
        let warm = self.send(get.clone()).await;
        self.pause(b.settle).await;

        self.drive_failures(&b).await;
        self.pause(b.settle).await;

        let out = self.send(get).await;
        let degraded_header = out.header(HEADER_DEGRADED).map(str::to_string);
        let degraded = degraded_header.as_deref() == Some("cache");
        let passed = out.status == Some(200) && degraded;

        let msg = if passed {
            "Circuit breaker degradation with cache".to_string()
        } else {
            format!(
                "Degradation failed: status={}, X-Degraded={}",
                crate::suite::fmt_status(out.status),
                degraded_header.as_deref().unwrap_or("none")
            )
        };
        self.record(
            ScenarioResult::new(
                "degradation_cache",
                passed,
                json!({
                    "status": out.status,
                    "degraded": degraded,
                    "warm_status": warm.status,
                }),
            ),
            &msg,
        )?;

        self.narrator.note(&format!(
            "Waiting {} for the breaker to recover...",
            fmt_secs(b.recovery_wait())
        ));
        self.pause(b.recovery_wait()).await;
        Ok(())
    }

    /// Send `failure_threshold` probes that the upstream always fails. Returns how many got no
    /// response at all.
    async fn drive_failures(&mut self, b: &BreakerConfig) -> u32 {
        let req = ProbeRequest::get(self.target_path("status/500")).with_timeout(b.probe_timeout);
        let mut transport_failures = 0u32;
        for attempt in 1..=b.failure_threshold {
            let out = self.send(req.clone()).await;
            if out.is_transport_failure() {
                transport_failures += 1;
                tracing::warn!(attempt, "failure probe got no response: {}", out.body_text());
                self.warn(&format!("Request {attempt} failed completely"));
            }
        }
        transport_failures
    }

    fn success_probe(&self, b: &BreakerConfig) -> ProbeRequest {
        ProbeRequest::get(self.target_path("success")).with_timeout(b.probe_timeout)
    }

    fn trigger_probe(&self, b: &BreakerConfig) -> ProbeRequest {
        ProbeRequest::get(self.target_path("test")).with_timeout(b.probe_timeout)
    }
}
