use std::path::Path;
use std::time::Duration;

use anyhow::Context as _;
use proxycheck_core::SuiteConfig;
use serde::Deserialize;

/// Optional YAML run config. Every key is optional; present keys override the built-in defaults
/// and are in turn overridden by CLI flags.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub(crate) struct ConfigYaml {
    pub base_url: Option<String>,
    pub target: Option<String>,
    pub smoke_targets: Option<Vec<String>>,
    pub include_load_test: Option<bool>,
    pub include_circuit_breaker: Option<bool>,
    pub exit_on_fail: Option<bool>,
    pub rate_limit_cooldown: Option<YamlDuration>,
    pub poll_interval: Option<YamlDuration>,
    pub report: Option<String>,

    #[serde(default)]
    pub breaker: BreakerYaml,
    #[serde(default)]
    pub rate_limit: RateLimitYaml,
    #[serde(default)]
    pub load: LoadYaml,
    #[serde(default)]
    pub caching: CachingYaml,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub(crate) struct BreakerYaml {
    pub failure_threshold: Option<u32>,
    pub success_threshold: Option<u32>,
    pub open_timeout: Option<YamlDuration>,
    pub open_margin: Option<YamlDuration>,
    pub recovery_margin: Option<YamlDuration>,
    pub settle: Option<YamlDuration>,
    pub success_gap: Option<YamlDuration>,
    pub open_poll_timeout: Option<YamlDuration>,
    pub half_open_poll_timeout: Option<YamlDuration>,
    pub close_poll_timeout: Option<YamlDuration>,
    pub recover_poll_timeout: Option<YamlDuration>,
    pub probe_timeout: Option<YamlDuration>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub(crate) struct RateLimitYaml {
    pub requests: Option<u64>,
    pub concurrency: Option<usize>,
    pub probe_timeout: Option<YamlDuration>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub(crate) struct LoadYaml {
    pub concurrency: Option<usize>,
    pub duration: Option<YamlDuration>,
    pub probe_timeout: Option<YamlDuration>,
    pub max_avg_latency: Option<YamlDuration>,
    pub min_success_rate: Option<f64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub(crate) struct CachingYaml {
    pub gap: Option<YamlDuration>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct YamlDuration(Duration);

impl YamlDuration {
    fn into_inner(self) -> Duration {
        self.0
    }
}

impl<'de> Deserialize<'de> for YamlDuration {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        struct V;

        impl<'de> serde::de::Visitor<'de> for V {
            type Value = YamlDuration;

            fn expecting(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
                f.write_str("duration as string (e.g. 10s), integer seconds, or float seconds")
            }

            fn visit_u64<E>(self, v: u64) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                Ok(YamlDuration(Duration::from_secs(v)))
            }

            fn visit_i64<E>(self, v: i64) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                let secs = u64::try_from(v).map_err(|_| E::custom("duration cannot be negative"))?;
                Ok(YamlDuration(Duration::from_secs(secs)))
            }

            fn visit_f64<E>(self, v: f64) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                Duration::try_from_secs_f64(v)
                    .map(YamlDuration)
                    .map_err(|err| E::custom(format!("invalid duration {v}: {err}")))
            }

            fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                let d = humantime::parse_duration(v).map_err(E::custom)?;
                Ok(YamlDuration(d))
            }

            fn visit_string<E>(self, v: String) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                self.visit_str(&v)
            }
        }

        deserializer.deserialize_any(V)
    }
}

pub(crate) fn parse(source: &str) -> anyhow::Result<ConfigYaml> {
    if source.trim().is_empty() {
        return Ok(ConfigYaml::default());
    }
    serde_yaml::from_str(source).context("invalid config yaml")
}

pub(crate) async fn load(path: &Path) -> anyhow::Result<ConfigYaml> {
    let source = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("failed to read config: {}", path.display()))?;
    parse(&source).with_context(|| format!("failed to parse config: {}", path.display()))
}

fn set<T>(slot: &mut T, value: Option<T>) {
    if let Some(v) = value {
        *slot = v;
    }
}

fn set_duration(slot: &mut Duration, value: Option<YamlDuration>) {
    set(slot, value.map(YamlDuration::into_inner));
}

impl ConfigYaml {
    /// Overlay the file's values onto `cfg`.
    pub(crate) fn apply(&self, cfg: &mut SuiteConfig) {
        set(&mut cfg.target, self.target.clone());
        set(&mut cfg.smoke_targets, self.smoke_targets.clone());
        set(&mut cfg.include_load_test, self.include_load_test);
        set(&mut cfg.include_circuit_breaker, self.include_circuit_breaker);
        set(&mut cfg.exit_on_fail, self.exit_on_fail);
        set_duration(&mut cfg.rate_limit_cooldown, self.rate_limit_cooldown);
        set_duration(&mut cfg.poll_interval, self.poll_interval);

        let b = &self.breaker;
        let out = &mut cfg.breaker;
        set(&mut out.failure_threshold, b.failure_threshold);
        set(&mut out.success_threshold, b.success_threshold);
        set_duration(&mut out.open_timeout, b.open_timeout);
        set_duration(&mut out.open_margin, b.open_margin);
        set_duration(&mut out.recovery_margin, b.recovery_margin);
        set_duration(&mut out.settle, b.settle);
        set_duration(&mut out.success_gap, b.success_gap);
        set_duration(&mut out.open_poll_timeout, b.open_poll_timeout);
        set_duration(&mut out.half_open_poll_timeout, b.half_open_poll_timeout);
        set_duration(&mut out.close_poll_timeout, b.close_poll_timeout);
        set_duration(&mut out.recover_poll_timeout, b.recover_poll_timeout);
        set_duration(&mut out.probe_timeout, b.probe_timeout);

        let r = &self.rate_limit;
        set(&mut cfg.rate_limit.requests, r.requests);
        set(&mut cfg.rate_limit.concurrency, r.concurrency);
        set_duration(&mut cfg.rate_limit.probe_timeout, r.probe_timeout);

        let l = &self.load;
        set(&mut cfg.load.concurrency, l.concurrency);
        set_duration(&mut cfg.load.duration, l.duration);
        set_duration(&mut cfg.load.probe_timeout, l.probe_timeout);
        set_duration(&mut cfg.load.max_avg_latency, l.max_avg_latency);
        set(&mut cfg.load.min_success_rate, l.min_success_rate);

        set_duration(&mut cfg.caching.gap, self.caching.gap);
    }
}
