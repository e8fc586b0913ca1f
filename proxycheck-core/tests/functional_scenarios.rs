mod support;

use std::time::Duration;

use anyhow::Context as _;
use proxycheck_core::{RunMode, ScenarioResult};
use proxycheck_testserver::{MockProxy, MockProxyOptions, UpstreamOptions};

fn passed(result: Option<&ScenarioResult>) -> bool {
    result.is_some_and(|r| r.passed)
}

#[tokio::test]
async fn functional_group_passes_against_mock_proxy() -> anyhow::Result<()> {
    let proxy = MockProxy::start_with(
        MockProxyOptions::default().with_rate_limit(100, Duration::from_secs(60)),
    )
    .await
    .context("start mock proxy")?;

    let outcome = support::suite(proxy.base_url(), support::fast_config())?
        .run()
        .await;
    proxy.shutdown().await;

    let failed: Vec<&str> = outcome
        .summary
        .details
        .iter()
        .filter(|r| !r.passed)
        .map(|r| r.name.as_str())
        .collect();
    assert!(failed.is_empty(), "failed scenarios: {failed:?}");
    assert!(outcome.halted.is_none());

    let names: Vec<&str> = outcome.summary.details.iter().map(|r| r.name.as_str()).collect();
    for expected in [
        "health_endpoint",
        "metrics_endpoint",
        "circuit_breaker_stats",
        "http_get",
        "http_post",
        "http_put",
        "http_delete",
        "http_head",
        "authentication",
        "provider_zerion",
        "provider_coingecko",
        "provider_alchemy",
        "caching",
        "rate_limiting",
    ] {
        assert!(names.contains(&expected), "missing {expected} in {names:?}");
    }
    assert!(!names.contains(&"load_test"));
    assert!(!names.contains(&"circuit_breaker_open"));
    assert_eq!(outcome.summary.pass_rate, "100.00%");
    Ok(())
}

#[tokio::test]
async fn caching_passes_when_proxy_caches() -> anyhow::Result<()> {
    let proxy = MockProxy::start().await.context("start mock proxy")?;
    let mut suite = support::suite(proxy.base_url(), support::fast_config())?;

    suite.caching().await?;
    let hits = proxy.stats().cache_hits();
    proxy.shutdown().await;

    let result = suite.results().get("caching").context("caching recorded")?;
    assert!(result.passed);
    assert_eq!(result.details["bodies_match"], true);
    assert_eq!(result.details["status_1"], 200);
    assert_eq!(result.details["status_2"], 200);
    assert_eq!(hits, 1);
    Ok(())
}

#[tokio::test]
async fn caching_fails_when_bodies_differ() -> anyhow::Result<()> {
    let proxy = MockProxy::start_with(
        MockProxyOptions::default()
            .without_cache()
            .with_upstream(UpstreamOptions::default().without_delay().volatile_bodies()),
    )
    .await
    .context("start mock proxy")?;
    let mut suite = support::suite(proxy.base_url(), support::fast_config())?;

    suite.caching().await?;
    proxy.shutdown().await;

    let result = suite.results().get("caching").context("caching recorded")?;
    assert!(!result.passed);
    assert_eq!(result.details["bodies_match"], false);
    Ok(())
}

#[tokio::test]
async fn rate_limiting_sees_429_from_limited_proxy() -> anyhow::Result<()> {
    let proxy = MockProxy::start_with(
        MockProxyOptions::default().with_rate_limit(100, Duration::from_secs(60)),
    )
    .await
    .context("start mock proxy")?;
    let mut cfg = support::fast_config();
    cfg.rate_limit.requests = 500;
    cfg.rate_limit.concurrency = 50;
    let mut suite = support::suite(proxy.base_url(), cfg)?;

    suite.rate_limiting().await?;
    proxy.shutdown().await;

    let result = suite.results().get("rate_limiting").context("rate_limiting recorded")?;
    assert!(result.passed);
    assert_eq!(result.details["total_requests"], 500);
    assert_eq!(result.details["limited_requests"], 400);
    assert!(result.details["first_limited_at"].is_u64());
    assert_eq!(result.details["limit_rate"], "80.00%");
    Ok(())
}

#[tokio::test]
async fn rate_limiting_fails_without_limiter() -> anyhow::Result<()> {
    let proxy = MockProxy::start_with(
        MockProxyOptions::default().with_upstream(UpstreamOptions::default().without_delay()),
    )
    .await
    .context("start mock proxy")?;
    let mut suite = support::suite(proxy.base_url(), support::fast_config())?;

    suite.rate_limiting().await?;
    proxy.shutdown().await;

    let result = suite.results().get("rate_limiting").context("rate_limiting recorded")?;
    assert!(!result.passed);
    assert_eq!(result.details["limited_requests"], 0);
    assert!(result.details["first_limited_at"].is_null());
    Ok(())
}

#[tokio::test]
async fn authentication_fails_without_request_id() -> anyhow::Result<()> {
    let proxy = MockProxy::start_with(MockProxyOptions::default().without_request_id())
        .await
        .context("start mock proxy")?;
    let mut suite = support::suite(proxy.base_url(), support::fast_config())?;

    suite.authentication().await?;
    proxy.shutdown().await;

    let result = suite.results().get("authentication").context("authentication recorded")?;
    assert!(!result.passed);
    assert_eq!(result.details["has_request_id"], false);
    assert_eq!(result.details["has_provider"], true);
    Ok(())
}

#[tokio::test]
async fn exit_on_fail_stops_at_first_failure() -> anyhow::Result<()> {
    let proxy = MockProxy::start_with(MockProxyOptions::default().without_request_id())
        .await
        .context("start mock proxy")?;
    let mut cfg = support::fast_config();
    cfg.exit_on_fail = true;

    let outcome = support::suite(proxy.base_url(), cfg)?.run().await;
    proxy.shutdown().await;

    let halted = outcome.halted.context("run should halt")?;
    assert_eq!(halted.scenario, "authentication");
    assert_eq!(outcome.summary.failed, 1);
    assert!(outcome.summary.details.iter().all(|r| r.name != "caching"));
    assert!(!outcome.summary.all_passed());
    Ok(())
}

#[tokio::test]
async fn load_only_runs_just_the_load_test() -> anyhow::Result<()> {
    let proxy = MockProxy::start().await.context("start mock proxy")?;
    let mut cfg = support::fast_config();
    cfg.mode = RunMode::LoadOnly;

    let outcome = support::suite(proxy.base_url(), cfg)?.run().await;
    proxy.shutdown().await;

    assert_eq!(outcome.summary.total, 1);
    let result = outcome.summary.details.first().context("load_test recorded")?;
    assert_eq!(result.name, "load_test");
    assert!(result.passed, "load test failed: {:?}", result.details);
    assert_eq!(result.details["rate_limited"], 0);
    assert_eq!(result.details["concurrency"], 4);
    assert!(result.details["latency"]["p50"].is_number());
    Ok(())
}

#[tokio::test]
async fn unreachable_proxy_fails_every_scenario() -> anyhow::Result<()> {
    let mut cfg = support::fast_config();
    cfg.rate_limit.requests = 20;
    cfg.rate_limit.concurrency = 5;

    let outcome = support::suite("http://127.0.0.1:1", cfg)?.run().await;

    assert!(outcome.summary.total > 0);
    assert!(!outcome.summary.all_passed());
    assert!(!passed(outcome.summary.details.iter().find(|r| r.name == "health_endpoint")));
    assert!(!passed(outcome.summary.details.iter().find(|r| r.name == "rate_limiting")));
    Ok(())
}
