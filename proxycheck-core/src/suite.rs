use std::sync::Arc;
use std::time::Duration;

use crate::config::{RunMode, SuiteConfig};
use crate::error::Result;
use crate::narrate::Narrator;
use crate::poller::StatePoller;
use crate::probe::{Probe, ProbeOutcome, ProbeRequest};
use crate::results::{ResultCollector, RunSummary, ScenarioResult};

/// Returned by a scenario when fail-fast is set and a result failed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("scenario `{scenario}` failed and exit-on-fail is set")]
pub struct Halted {
    pub scenario: String,
}

pub type Flow = std::result::Result<(), Halted>;

#[derive(Debug, Clone)]
pub struct SuiteOutcome {
    pub summary: RunSummary,
    /// Set when fail-fast stopped the run early.
    pub halted: Option<Halted>,
}

/// Sequences the scenario verifiers of one run. Scenarios execute strictly one after another;
/// only the load driver inside a scenario runs work concurrently.
pub struct Suite<P> {
    pub(crate) probe: Arc<P>,
    pub(crate) config: SuiteConfig,
    pub(crate) narrator: Arc<dyn Narrator>,
    results: ResultCollector,
}

impl<P> std::fmt::Debug for Suite<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Suite")
            .field("config", &self.config)
            .field("results", &self.results)
            .finish_non_exhaustive()
    }
}

impl<P> Suite<P>
where
    P: Probe + 'static,
{
    pub fn new(probe: Arc<P>, config: SuiteConfig, narrator: Arc<dyn Narrator>) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            probe,
            config,
            narrator,
            results: ResultCollector::default(),
        })
    }

    pub fn config(&self) -> &SuiteConfig {
        &self.config
    }

    pub fn results(&self) -> &ResultCollector {
        &self.results
    }

    pub async fn run(mut self) -> SuiteOutcome {
        tracing::info!(mode = %self.config.mode, target = %self.config.target, "starting suite");

        let flow = match self.config.mode {
            RunMode::Full => self.run_full().await,
            RunMode::LoadOnly => {
                self.narrator.section("Running Load Test...");
                self.load_test().await
            }
            RunMode::RateLimitOnly => {
                self.narrator.section("Testing Rate Limiting...");
                self.rate_limiting().await
            }
            RunMode::CircuitBreakerOnly => self.circuit_breaker_group().await,
        };

        SuiteOutcome {
            summary: self.results.summary(),
            halted: flow.err(),
        }
    }

    async fn run_full(&mut self) -> Flow {
        self.narrator.section("Testing Basic Endpoints...");
        self.health_endpoint().await?;
        self.metrics_endpoint().await?;
        self.circuit_breaker_stats().await?;

        self.narrator.section("Testing HTTP Methods...");
        self.http_methods().await?;

        self.narrator.section("Testing Authentication...");
        self.authentication().await?;

        self.narrator.section("Testing All Targets...");
        self.smoke_targets().await?;

        self.narrator.section("Testing Caching...");
        self.caching().await?;

        self.narrator.section("Testing Rate Limiting...");
        self.rate_limiting().await?;

        if self.config.include_circuit_breaker {
            let cooldown = self.config.rate_limit_cooldown;
            if !cooldown.is_zero() {
                self.narrator.section(&format!(
                    "Waiting {} for rate limit cooldown...",
                    fmt_secs(cooldown)
                ));
                self.pause(cooldown).await;
            }
            self.circuit_breaker_group().await?;
        }

        if self.config.include_load_test {
            self.narrator.section("Running Load Test...");
            self.load_test().await?;
        }

        Ok(())
    }

    async fn circuit_breaker_group(&mut self) -> Flow {
        let b = &self.config.breaker;
        let estimate = b.half_open_wait() + b.recovery_wait();
        self.narrator.section(&format!(
            "Testing Circuit Breaker (this may take ~{})...",
            fmt_secs(estimate)
        ));
        self.circuit_breaker_full_cycle().await?;
        self.circuit_breaker_degradation().await
    }

    /// Store a result and narrate it. Under fail-fast a failed result halts the run.
    pub(crate) fn record(&mut self, result: ScenarioResult, msg: &str) -> Flow {
        let passed = result.passed;
        let name = result.name.clone();
        if passed {
            self.narrator.ok(msg);
        } else {
            self.narrator.fail(msg);
        }
        tracing::debug!(scenario = %name, passed, "scenario recorded");
        self.results.add(result);

        if !passed && self.config.exit_on_fail {
            return Err(Halted { scenario: name });
        }
        Ok(())
    }

    pub(crate) fn warn(&mut self, msg: &str) {
        self.results.add_warning();
        self.narrator.warn(msg);
    }

    pub(crate) async fn send(&self, req: ProbeRequest) -> ProbeOutcome {
        self.probe.probe(&req).await
    }

    pub(crate) fn target_path(&self, suffix: &str) -> String {
        format!("/{}/{suffix}", self.config.target)
    }

    pub(crate) fn poller(&self) -> StatePoller<'_, P> {
        StatePoller::new(self.probe.as_ref()).with_interval(self.config.poll_interval)
    }

    pub(crate) async fn pause(&self, d: Duration) {
        if !d.is_zero() {
            tokio::time::sleep(d).await;
        }
    }
}

pub(crate) fn fmt_status(status: Option<u16>) -> String {
    status.map_or_else(|| "none".to_string(), |s| s.to_string())
}

pub(crate) fn duration_ms(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

pub(crate) fn fmt_secs(d: Duration) -> String {
    let secs = d.as_secs_f64();
    if secs.fract() == 0.0 {
        format!("{secs:.0}s")
    } else {
        format!("{secs:.1}s")
    }
}
