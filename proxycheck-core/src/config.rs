use std::time::Duration;

use crate::error::{Error, Result};

/// Upper bound for every configured duration.
pub const MAX_DURATION: Duration = Duration::from_secs(24 * 60 * 60);

/// Which group of scenarios a run executes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, strum::Display)]
#[strum(serialize_all = "kebab-case")]
pub enum RunMode {
    /// Every functional scenario, plus the optional breaker and load groups.
    #[default]
    Full,
    LoadOnly,
    RateLimitOnly,
    CircuitBreakerOnly,
}

/// Constants of the breaker under test. The harness does not discover them; a mismatch with
/// the proxy's real settings produces false negatives in the full-cycle scenario.
#[derive(Debug, Clone, PartialEq)]
pub struct BreakerConfig {
    /// Consecutive failures that trip the breaker.
    pub failure_threshold: u32,
    /// Successes in half-open required to close again.
    pub success_threshold: u32,
    /// Time the breaker stays open before admitting a half-open probe.
    pub open_timeout: Duration,
    /// Extra wait on top of `open_timeout` before the half-open trigger probe.
    pub open_margin: Duration,
    /// Extra wait on top of `open_timeout` after the degradation scenario.
    pub recovery_margin: Duration,
    /// Pause between driving a transition and polling for it.
    pub settle: Duration,
    /// Pause between successive recovery probes.
    pub success_gap: Duration,
    pub open_poll_timeout: Duration,
    pub half_open_poll_timeout: Duration,
    pub close_poll_timeout: Duration,
    /// Bound for the self-healing "ensure closed" step.
    pub recover_poll_timeout: Duration,
    pub probe_timeout: Duration,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            success_threshold: 2,
            open_timeout: Duration::from_secs(30),
            open_margin: Duration::from_secs(1),
            recovery_margin: Duration::from_secs(5),
            settle: Duration::from_secs(1),
            success_gap: Duration::from_millis(500),
            open_poll_timeout: Duration::from_secs(3),
            half_open_poll_timeout: Duration::from_secs(3),
            close_poll_timeout: Duration::from_secs(5),
            recover_poll_timeout: Duration::from_secs(40),
            probe_timeout: Duration::from_secs(3),
        }
    }
}

impl BreakerConfig {
    /// How long to wait after forcing `open` before the half-open trigger probe.
    pub fn half_open_wait(&self) -> Duration {
        self.open_timeout.saturating_add(self.open_margin)
    }

    /// How long to wait after the degradation scenario for the breaker to recover.
    pub fn recovery_wait(&self) -> Duration {
        self.open_timeout.saturating_add(self.recovery_margin)
    }

    /// Number of successful probes that comfortably exceeds the success threshold.
    pub fn recovery_probes(&self) -> u32 {
        self.success_threshold.saturating_add(1)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RateLimitConfig {
    pub requests: u64,
    pub concurrency: usize,
    pub probe_timeout: Duration,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            requests: 500,
            concurrency: 50,
            probe_timeout: Duration::from_secs(2),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LoadConfig {
    pub concurrency: usize,
    pub duration: Duration,
    pub probe_timeout: Duration,
    /// Average latency must stay below this bound.
    pub max_avg_latency: Duration,
    /// Minimum success rate, in percent.
    pub min_success_rate: f64,
}

impl Default for LoadConfig {
    fn default() -> Self {
        Self {
            concurrency: 20,
            duration: Duration::from_secs(10),
            probe_timeout: Duration::from_secs(10),
            max_avg_latency: Duration::from_secs(1),
            min_success_rate: 95.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CachingConfig {
    /// Delay between the priming probe and the cached probe.
    pub gap: Duration,
}

impl Default for CachingConfig {
    fn default() -> Self {
        Self {
            gap: Duration::from_millis(200),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SuiteConfig {
    /// Component routed through the proxy, e.g. `zerion` for `/zerion/...`.
    pub target: String,
    /// Components hit once each by the multi-target smoke test.
    pub smoke_targets: Vec<String>,
    pub mode: RunMode,
    pub include_load_test: bool,
    pub include_circuit_breaker: bool,
    /// Pause before the breaker scenarios so the rate limiter's window drains.
    pub rate_limit_cooldown: Duration,
    /// Stop at the first failed scenario.
    pub exit_on_fail: bool,
    pub poll_interval: Duration,
    pub breaker: BreakerConfig,
    pub rate_limit: RateLimitConfig,
    pub load: LoadConfig,
    pub caching: CachingConfig,
}

impl Default for SuiteConfig {
    fn default() -> Self {
        Self {
            target: "zerion".to_string(),
            smoke_targets: vec![
                "zerion".to_string(),
                "coingecko".to_string(),
                "alchemy".to_string(),
            ],
            mode: RunMode::Full,
            include_load_test: false,
            include_circuit_breaker: false,
            rate_limit_cooldown: Duration::from_secs(60),
            exit_on_fail: false,
            poll_interval: crate::poller::DEFAULT_POLL_INTERVAL,
            breaker: BreakerConfig::default(),
            rate_limit: RateLimitConfig::default(),
            load: LoadConfig::default(),
            caching: CachingConfig::default(),
        }
    }
}

impl SuiteConfig {
    fn durations(&self) -> [(&'static str, Duration); 17] {
        let b = &self.breaker;
        [
            ("rate_limit_cooldown", self.rate_limit_cooldown),
            ("poll_interval", self.poll_interval),
            ("breaker.open_timeout", b.open_timeout),
            ("breaker.open_margin", b.open_margin),
            ("breaker.recovery_margin", b.recovery_margin),
            ("breaker.settle", b.settle),
            ("breaker.success_gap", b.success_gap),
            ("breaker.open_poll_timeout", b.open_poll_timeout),
            ("breaker.half_open_poll_timeout", b.half_open_poll_timeout),
            ("breaker.close_poll_timeout", b.close_poll_timeout),
            ("breaker.recover_poll_timeout", b.recover_poll_timeout),
            ("breaker.probe_timeout", b.probe_timeout),
            ("rate_limit.probe_timeout", self.rate_limit.probe_timeout),
            ("load.duration", self.load.duration),
            ("load.probe_timeout", self.load.probe_timeout),
            ("load.max_avg_latency", self.load.max_avg_latency),
            ("caching.gap", self.caching.gap),
        ]
    }

    pub fn validate(&self) -> Result<()> {
        if self.target.trim().is_empty() {
            return Err(Error::EmptyTarget);
        }
        if self.breaker.failure_threshold == 0 {
            return Err(Error::NotPositive("failure_threshold"));
        }
        if self.breaker.success_threshold == 0 {
            return Err(Error::NotPositive("success_threshold"));
        }
        if self.rate_limit.requests == 0 {
            return Err(Error::NotPositive("rate_limit.requests"));
        }
        if self.rate_limit.concurrency == 0 {
            return Err(Error::NotPositive("rate_limit.concurrency"));
        }
        if self.load.concurrency == 0 {
            return Err(Error::NotPositive("load.concurrency"));
        }
        if self.load.duration.is_zero() {
            return Err(Error::ZeroDuration("load.duration"));
        }
        if self.poll_interval.is_zero() {
            return Err(Error::ZeroDuration("poll_interval"));
        }
        for (name, d) in [
            ("breaker.probe_timeout", self.breaker.probe_timeout),
            ("rate_limit.probe_timeout", self.rate_limit.probe_timeout),
            ("load.probe_timeout", self.load.probe_timeout),
        ] {
            if d.is_zero() {
                return Err(Error::ZeroDuration(name));
            }
        }
        for (name, d) in self.durations() {
            if d > MAX_DURATION {
                return Err(Error::DurationTooLarge(name, MAX_DURATION));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_assumed_breaker_constants() {
        let cfg = SuiteConfig::default();
        assert_eq!(cfg.breaker.failure_threshold, 5);
        assert_eq!(cfg.breaker.success_threshold, 2);
        assert_eq!(cfg.breaker.half_open_wait(), Duration::from_secs(31));
        assert_eq!(cfg.breaker.recovery_wait(), Duration::from_secs(35));
        assert_eq!(cfg.breaker.recovery_probes(), 3);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn validate_rejects_zero_knobs() {
        let mut cfg = SuiteConfig::default();
        cfg.load.concurrency = 0;
        assert!(matches!(
            cfg.validate(),
            Err(Error::NotPositive("load.concurrency"))
        ));

        let mut cfg = SuiteConfig::default();
        cfg.target = "  ".to_string();
        assert!(matches!(cfg.validate(), Err(Error::EmptyTarget)));

        let mut cfg = SuiteConfig::default();
        cfg.load.duration = Duration::ZERO;
        assert!(matches!(
            cfg.validate(),
            Err(Error::ZeroDuration("load.duration"))
        ));
    }

    #[test]
    fn validate_rejects_durations_past_the_limit() {
        let mut cfg = SuiteConfig::default();
        cfg.load.duration = Duration::MAX;
        assert!(matches!(
            cfg.validate(),
            Err(Error::DurationTooLarge("load.duration", max)) if max == MAX_DURATION
        ));

        let mut cfg = SuiteConfig::default();
        cfg.breaker.recover_poll_timeout = MAX_DURATION + Duration::from_secs(1);
        let err = cfg.validate().err().map(|e| e.to_string());
        assert_eq!(
            err.as_deref(),
            Some("`breaker.recover_poll_timeout` must not exceed 86400s")
        );

        let mut cfg = SuiteConfig::default();
        cfg.rate_limit_cooldown = MAX_DURATION;
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn run_mode_renders_kebab_case() {
        assert_eq!(RunMode::CircuitBreakerOnly.to_string(), "circuit-breaker-only");
    }
}
