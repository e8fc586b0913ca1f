use anyhow::Context as _;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use proxycheck_core::{HttpProber, RunMode, RunSummary, Suite, SuiteConfig};

use crate::cli::{DEFAULT_BASE_URL, RunArgs};
use crate::config_yaml::{self, ConfigYaml};
use crate::exit_codes::ExitCode;
use crate::output;
use crate::run_error::RunError;

/// Everything a run needs once flags and the optional config file are merged.
#[derive(Debug, Clone, PartialEq)]
struct ResolvedRun {
    base_url: String,
    report: Option<PathBuf>,
    suite: SuiteConfig,
}

pub async fn run(args: RunArgs) -> Result<ExitCode, RunError> {
    let file = match &args.config {
        Some(path) => Some(config_yaml::load(path).await.map_err(RunError::InvalidInput)?),
        None => None,
    };
    let resolved = resolve(&args, file.as_ref());
    tracing::debug!(?resolved, "resolved run config");

    let out = output::formatter(args.output, resolved.suite.load.duration);

    let prober = HttpProber::new(&resolved.base_url)
        .with_context(|| format!("invalid --base-url: {}", resolved.base_url))
        .map_err(RunError::InvalidInput)?;
    let suite = Suite::new(Arc::new(prober), resolved.suite, out.clone().narrator())
        .context("invalid run config")
        .map_err(RunError::InvalidInput)?;

    out.print_header(title(suite.config().mode), &resolved.base_url, suite.config());

    let outcome = suite.run().await;
    out.print_summary(&outcome).map_err(RunError::RuntimeError)?;

    if let Some(path) = &resolved.report {
        write_report(path, &outcome.summary)
            .await
            .map_err(RunError::RuntimeError)?;
        out.print_report_saved(path);
    }

    Ok(ExitCode::from_outcome(
        outcome.summary.all_passed() && outcome.halted.is_none(),
    ))
}

fn title(mode: RunMode) -> &'static str {
    match mode {
        RunMode::Full => "API Proxy Test Suite",
        RunMode::LoadOnly => "API Proxy Load Test",
        RunMode::RateLimitOnly => "API Proxy Rate Limit Test",
        RunMode::CircuitBreakerOnly => "API Proxy Circuit Breaker Test",
    }
}

/// Defaults, then the config file, then CLI flags.
fn resolve(args: &RunArgs, file: Option<&ConfigYaml>) -> ResolvedRun {
    let mut suite = SuiteConfig::default();
    let mut base_url = DEFAULT_BASE_URL.to_string();
    let mut report = None;

    if let Some(file) = file {
        file.apply(&mut suite);
        if let Some(url) = &file.base_url {
            base_url.clone_from(url);
        }
        report = file.report.as_ref().map(PathBuf::from);
    }

    if let Some(url) = &args.base_url {
        base_url.clone_from(url);
    }
    if let Some(path) = &args.report {
        report = Some(path.clone());
    }
    if let Some(target) = &args.target {
        suite.target.clone_from(target);
    }
    if let Some(targets) = &args.smoke_targets {
        suite.smoke_targets.clone_from(targets);
    }
    if let Some(n) = args.load_concurrency {
        suite.load.concurrency = n;
    }
    if let Some(d) = args.load_duration {
        suite.load.duration = d;
    }
    if let Some(d) = args.rate_limit_cooldown {
        suite.rate_limit_cooldown = d;
    }
    if let Some(n) = args.failure_threshold {
        suite.breaker.failure_threshold = n;
    }
    if let Some(n) = args.success_threshold {
        suite.breaker.success_threshold = n;
    }
    if let Some(d) = args.open_timeout {
        suite.breaker.open_timeout = d;
    }

    if args.load_test {
        suite.include_load_test = true;
    }
    if args.circuit_breaker {
        suite.include_circuit_breaker = true;
    }
    if args.quick {
        suite.include_load_test = false;
        suite.include_circuit_breaker = false;
    }
    if args.exit_on_fail {
        suite.exit_on_fail = true;
    }

    suite.mode = if args.load_only {
        RunMode::LoadOnly
    } else if args.rate_limit_only {
        RunMode::RateLimitOnly
    } else if args.circuit_breaker_only {
        RunMode::CircuitBreakerOnly
    } else {
        RunMode::Full
    };

    ResolvedRun {
        base_url,
        report,
        suite,
    }
}

async fn write_report(path: &Path, summary: &RunSummary) -> anyhow::Result<()> {
    let json = summary
        .to_json_pretty()
        .context("failed to encode report")?;
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent)
            .await
            .with_context(|| format!("failed to create report dir: {}", parent.display()))?;
    }
    tokio::fs::write(path, json)
        .await
        .with_context(|| format!("failed to write report: {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn defaults_without_flags_or_file() {
        let r = resolve(&RunArgs::default(), None);
        assert_eq!(r.base_url, DEFAULT_BASE_URL);
        assert_eq!(r.report, None);
        assert_eq!(r.suite, SuiteConfig::default());
    }

    #[test]
    fn flags_override_file_values() -> anyhow::Result<()> {
        let file = config_yaml::parse(
            "baseUrl: http://from-file:1\ntarget: coingecko\nreport: from-file.json\nload:\n  duration: 30s\n",
        )?;
        let args = RunArgs {
            base_url: Some("http://from-flag:2".to_string()),
            load_duration: Some(Duration::from_secs(3)),
            ..RunArgs::default()
        };

        let r = resolve(&args, Some(&file));
        assert_eq!(r.base_url, "http://from-flag:2");
        assert_eq!(r.suite.target, "coingecko");
        assert_eq!(r.suite.load.duration, Duration::from_secs(3));
        assert_eq!(r.report, Some(PathBuf::from("from-file.json")));
        Ok(())
    }

    #[test]
    fn quick_wins_over_group_flags_and_file() -> anyhow::Result<()> {
        let file = config_yaml::parse("includeLoadTest: true\nincludeCircuitBreaker: true\n")?;
        let args = RunArgs {
            quick: true,
            load_test: true,
            circuit_breaker: true,
            ..RunArgs::default()
        };

        let r = resolve(&args, Some(&file));
        assert!(!r.suite.include_load_test);
        assert!(!r.suite.include_circuit_breaker);
        Ok(())
    }

    #[test]
    fn only_modes_follow_precedence() {
        let args = RunArgs {
            load_only: true,
            rate_limit_only: true,
            circuit_breaker_only: true,
            ..RunArgs::default()
        };
        assert_eq!(resolve(&args, None).suite.mode, RunMode::LoadOnly);

        let args = RunArgs {
            rate_limit_only: true,
            circuit_breaker_only: true,
            ..RunArgs::default()
        };
        assert_eq!(resolve(&args, None).suite.mode, RunMode::RateLimitOnly);

        let args = RunArgs {
            circuit_breaker_only: true,
            ..RunArgs::default()
        };
        assert_eq!(resolve(&args, None).suite.mode, RunMode::CircuitBreakerOnly);
    }

    #[tokio::test]
    async fn report_is_written_with_parent_dirs() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("nested/out/report.json");
        let summary = proxycheck_core::ResultCollector::default().summary();

        write_report(&path, &summary).await?;

        let v: serde_json::Value = serde_json::from_str(&tokio::fs::read_to_string(&path).await?)?;
        assert_eq!(v["total"], 0);
        Ok(())
    }
}
