#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use proxycheck_core::{HttpProber, Suite, SuiteConfig, TracingNarrator};

/// Suite config with every wait shrunk to suit an in-process mock proxy.
pub fn fast_config() -> SuiteConfig {
    let mut cfg = SuiteConfig::default();
    cfg.rate_limit_cooldown = Duration::ZERO;
    cfg.poll_interval = Duration::from_millis(50);
    cfg.caching.gap = Duration::from_millis(20);
    cfg.rate_limit.requests = 200;
    cfg.rate_limit.concurrency = 20;

    let b = &mut cfg.breaker;
    b.open_timeout = Duration::from_secs(1);
    b.open_margin = Duration::from_millis(200);
    b.recovery_margin = Duration::from_millis(200);
    b.settle = Duration::from_millis(100);
    b.success_gap = Duration::from_millis(50);
    b.open_poll_timeout = Duration::from_secs(3);
    b.half_open_poll_timeout = Duration::from_secs(2);
    b.close_poll_timeout = Duration::from_secs(2);
    b.recover_poll_timeout = Duration::from_secs(3);

    cfg.load.duration = Duration::from_secs(1);
    cfg.load.concurrency = 4;
    cfg
}

pub fn suite(base_url: &str, cfg: SuiteConfig) -> anyhow::Result<Suite<HttpProber>> {
    let prober = HttpProber::new(base_url)?;
    Ok(Suite::new(Arc::new(prober), cfg, Arc::new(TracingNarrator))?)
}
