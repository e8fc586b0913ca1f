use clap::{ArgAction, Args, Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;

pub(crate) const DEFAULT_BASE_URL: &str = "http://localhost:8080";

fn parse_duration(input: &str) -> Result<Duration, String> {
    let s = input.trim();
    if s.is_empty() {
        return Err("duration cannot be empty (expected e.g. 10s, 250ms, 1m)".to_string());
    }

    let number_end = s
        .char_indices()
        .find(|(_, ch)| !ch.is_ascii_digit())
        .map_or(s.len(), |(idx, _)| idx);

    if number_end == 0 {
        return Err(format!(
            "invalid duration '{s}' (expected e.g. 10s, 250ms, 1m)"
        ));
    }

    let (number_str, unit_str) = s.split_at(number_end);
    let value: u64 = number_str
        .parse()
        .map_err(|_| format!("invalid duration '{s}' (expected e.g. 10s, 250ms, 1m)"))?;

    match unit_str.trim() {
        "" | "s" | "sec" | "secs" | "second" | "seconds" => Ok(Duration::from_secs(value)),
        "ms" | "msec" | "msecs" | "millisecond" | "milliseconds" => {
            Ok(Duration::from_millis(value))
        }
        "m" | "min" | "mins" | "minute" | "minutes" => {
            let secs = value
                .checked_mul(60)
                .ok_or_else(|| format!("duration '{s}' is too large"))?;
            Ok(Duration::from_secs(secs))
        }
        _ => Err(format!(
            "invalid duration '{s}' (expected e.g. 10s, 250ms, 1m)"
        )),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum OutputFormat {
    /// Console narration with [OK]/[FAIL]/[WARN] lines and a summary block.
    #[default]
    HumanReadable,
    /// One JSON object per event (NDJSON) on stdout.
    Json,
}

#[derive(Debug, Parser)]
#[command(
    name = "proxycheck",
    author,
    version,
    about = "Conformance and resilience checks for an HTTP API proxy",
    long_about = "proxycheck drives a running API proxy over HTTP and verifies its caching, rate limiting and circuit breaker from the outside.\n\nEach check is recorded as a named scenario result; the run exits non-zero if any scenario failed.",
    after_help = "Examples:\n  proxycheck run --base-url http://localhost:8080 --quick\n  proxycheck run --target zerion --circuit-breaker --rate-limit-cooldown 30s\n  proxycheck run --load-only --load-concurrency 50 --load-duration 30s --report out/load.json\n  proxycheck run --config proxycheck.yaml --exit-on-fail"
)]
pub struct Cli {
    /// Increase log verbosity on stderr (-v info, -vv debug). RUST_LOG overrides.
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run the scenario suite against a proxy
    #[command(
        long_about = "Run the scenario suite against a proxy.\n\nCLI flags override values from --config, which override built-in defaults."
    )]
    Run(RunArgs),
}

#[derive(Debug, Default, Args)]
pub struct RunArgs {
    /// Base URL of the proxy [default: http://localhost:8080]
    #[arg(long, value_name = "URL")]
    pub base_url: Option<String>,

    /// Component routed as /{target}/... [default: zerion]
    #[arg(long, visible_alias = "provider", value_name = "NAME")]
    pub target: Option<String>,

    /// Skip the slow groups (load test, circuit breaker)
    #[arg(long)]
    pub quick: bool,

    /// Include the sustained load test
    #[arg(long)]
    pub load_test: bool,

    /// Run only the load test
    #[arg(long)]
    pub load_only: bool,

    /// Run only the rate limiting scenario
    #[arg(long)]
    pub rate_limit_only: bool,

    /// Include the circuit breaker full cycle and degradation scenarios (slow)
    #[arg(long)]
    pub circuit_breaker: bool,

    /// Run only the circuit breaker scenarios
    #[arg(long)]
    pub circuit_breaker_only: bool,

    /// Load test concurrency [default: 20]
    #[arg(long, value_name = "N")]
    pub load_concurrency: Option<usize>,

    /// Load test duration (e.g. 10s, 1m) [default: 10s]
    #[arg(long, value_parser = parse_duration, value_name = "DURATION")]
    pub load_duration: Option<Duration>,

    /// Wait before the breaker scenarios so the rate limit window drains [default: 60s]
    #[arg(long, value_parser = parse_duration, value_name = "DURATION")]
    pub rate_limit_cooldown: Option<Duration>,

    /// Write the JSON report to this path (parent directories are created)
    #[arg(long, value_name = "PATH")]
    pub report: Option<PathBuf>,

    /// Stop at the first failed scenario
    #[arg(long)]
    pub exit_on_fail: bool,

    /// YAML config file (camelCase keys)
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Consecutive failures that trip the proxy's breaker [default: 5]
    #[arg(long, value_name = "N")]
    pub failure_threshold: Option<u32>,

    /// Half-open successes that close the proxy's breaker [default: 2]
    #[arg(long, value_name = "N")]
    pub success_threshold: Option<u32>,

    /// Time the proxy's breaker stays open [default: 30s]
    #[arg(long, value_parser = parse_duration, value_name = "DURATION")]
    pub open_timeout: Option<Duration>,

    /// Comma-separated components for the smoke test [default: zerion,coingecko,alchemy]
    #[arg(long, value_delimiter = ',', value_name = "NAMES")]
    pub smoke_targets: Option<Vec<String>>,

    /// Output format
    #[arg(long, value_enum, default_value_t = OutputFormat::HumanReadable)]
    pub output: OutputFormat,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_duration_accepts_common_units() {
        assert_eq!(parse_duration("250ms"), Ok(Duration::from_millis(250)));
        assert_eq!(parse_duration("10s"), Ok(Duration::from_secs(10)));
        assert_eq!(parse_duration("60"), Ok(Duration::from_secs(60)));
        assert_eq!(parse_duration("1m"), Ok(Duration::from_secs(60)));
    }

    #[test]
    fn parse_duration_rejects_invalid_values() {
        assert!(parse_duration("").is_err());
        assert!(parse_duration("abc").is_err());
        assert!(parse_duration("10x").is_err());
    }

    #[test]
    fn cli_parses_run_flags() {
        let parsed = Cli::try_parse_from([
            "proxycheck",
            "run",
            "--base-url",
            "http://127.0.0.1:9000",
            "--provider",
            "alchemy",
            "--circuit-breaker",
            "--load-duration",
            "250ms",
            "--rate-limit-cooldown",
            "0",
            "--smoke-targets",
            "zerion,alchemy",
            "--open-timeout",
            "2s",
            "-vv",
        ]);

        let cli = match parsed {
            Ok(v) => v,
            Err(err) => panic!("failed to parse args: {err}"),
        };
        assert_eq!(cli.verbose, 2);

        let Command::Run(args) = cli.command;
        assert_eq!(args.base_url.as_deref(), Some("http://127.0.0.1:9000"));
        assert_eq!(args.target.as_deref(), Some("alchemy"));
        assert!(args.circuit_breaker);
        assert!(!args.quick);
        assert_eq!(args.load_duration, Some(Duration::from_millis(250)));
        assert_eq!(args.rate_limit_cooldown, Some(Duration::ZERO));
        assert_eq!(
            args.smoke_targets,
            Some(vec!["zerion".to_string(), "alchemy".to_string()])
        );
        assert_eq!(args.open_timeout, Some(Duration::from_secs(2)));
        assert_eq!(args.output, OutputFormat::HumanReadable);
    }

    #[test]
    fn cli_rejects_bad_duration() {
        let parsed = Cli::try_parse_from(["proxycheck", "run", "--load-duration", "soon"]);
        assert!(parsed.is_err());
    }
}
