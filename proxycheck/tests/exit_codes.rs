use std::process::{Command, Output};
use std::time::Duration;

use anyhow::Context as _;
use proxycheck_testserver::{MockProxy, MockProxyOptions};

fn status_code(status: std::process::ExitStatus) -> i32 {
    status.code().unwrap_or(-1)
}

fn explain(out: &Output) -> String {
    format!(
        "exit code {}\nstdout:\n{}\nstderr:\n{}",
        status_code(out.status),
        String::from_utf8_lossy(&out.stdout),
        String::from_utf8_lossy(&out.stderr)
    )
}

async fn run_proxycheck(args: Vec<String>) -> anyhow::Result<Output> {
    let exe = env!("CARGO_BIN_EXE_proxycheck");
    tokio::task::spawn_blocking(move || Command::new(exe).args(&args).output())
        .await
        .context("spawn_blocking join")?
        .context("run proxycheck binary")
}

#[test]
fn invalid_flags_exit_2() -> anyhow::Result<()> {
    let exe = env!("CARGO_BIN_EXE_proxycheck");

    let out = Command::new(exe)
        .arg("run")
        .arg("--load-duration")
        .arg("10x")
        .output()
        .context("run proxycheck binary")?;

    anyhow::ensure!(status_code(out.status) == 2, "expected 2, {}", explain(&out));
    Ok(())
}

#[test]
fn help_exits_0() -> anyhow::Result<()> {
    let exe = env!("CARGO_BIN_EXE_proxycheck");

    let out = Command::new(exe)
        .arg("run")
        .arg("--help")
        .output()
        .context("run proxycheck binary")?;

    anyhow::ensure!(status_code(out.status) == 0, "expected 0, {}", explain(&out));
    anyhow::ensure!(String::from_utf8_lossy(&out.stdout).contains("--exit-on-fail"));
    Ok(())
}

#[tokio::test]
async fn unsupported_base_url_scheme_exits_2() -> anyhow::Result<()> {
    let out = run_proxycheck(vec![
        "run".to_string(),
        "--base-url".to_string(),
        "ftp://localhost:21".to_string(),
    ])
    .await?;

    anyhow::ensure!(status_code(out.status) == 2, "expected 2, {}", explain(&out));
    Ok(())
}

#[tokio::test]
async fn oversized_load_duration_exits_2() -> anyhow::Result<()> {
    let out = run_proxycheck(vec![
        "run".to_string(),
        "--base-url".to_string(),
        "http://127.0.0.1:1".to_string(),
        "--load-duration".to_string(),
        "18446744073709551615s".to_string(),
    ])
    .await?;

    anyhow::ensure!(status_code(out.status) == 2, "expected 2, {}", explain(&out));
    let stderr = String::from_utf8_lossy(&out.stderr);
    anyhow::ensure!(stderr.contains("load.duration"), "{}", explain(&out));
    anyhow::ensure!(!stderr.contains("panicked"), "{}", explain(&out));
    Ok(())
}

#[tokio::test]
async fn missing_config_file_exits_2() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("absent.yaml");

    let out = run_proxycheck(vec![
        "run".to_string(),
        "--config".to_string(),
        path.display().to_string(),
    ])
    .await?;

    anyhow::ensure!(status_code(out.status) == 2, "expected 2, {}", explain(&out));
    Ok(())
}

#[tokio::test]
async fn unreachable_proxy_exits_1() -> anyhow::Result<()> {
    let out = run_proxycheck(vec![
        "run".to_string(),
        "--base-url".to_string(),
        "http://127.0.0.1:1".to_string(),
        "--quick".to_string(),
    ])
    .await?;

    anyhow::ensure!(status_code(out.status) == 1, "expected 1, {}", explain(&out));
    let stdout = String::from_utf8_lossy(&out.stdout);
    anyhow::ensure!(stdout.contains("[FAIL] Health endpoint failed"), "{}", explain(&out));
    Ok(())
}

#[tokio::test]
async fn quick_run_against_mock_exits_0_and_writes_report() -> anyhow::Result<()> {
    let proxy = MockProxy::start_with(
        MockProxyOptions::default().with_rate_limit(100, Duration::from_secs(60)),
    )
    .await
    .context("start mock proxy")?;
    let dir = tempfile::tempdir()?;
    let report = dir.path().join("reports/run.json");

    let out = run_proxycheck(vec![
        "run".to_string(),
        "--base-url".to_string(),
        proxy.base_url().to_string(),
        "--quick".to_string(),
        "--report".to_string(),
        report.display().to_string(),
    ])
    .await?;
    proxy.shutdown().await;

    anyhow::ensure!(status_code(out.status) == 0, "expected 0, {}", explain(&out));
    let stdout = String::from_utf8_lossy(&out.stdout);
    anyhow::ensure!(stdout.contains("Test Summary"), "{}", explain(&out));
    anyhow::ensure!(stdout.contains("Report saved to:"), "{}", explain(&out));

    let body = tokio::fs::read_to_string(&report)
        .await
        .context("read report")?;
    let v: serde_json::Value = serde_json::from_str(&body)?;
    assert_eq!(v["failed"], 0);
    assert_eq!(v["pass_rate"], "100.00%");
    assert_eq!(v["details"]["rate_limiting"]["passed"], true);
    assert!(v["details"]["rate_limiting"]["details"]["limited_requests"].as_u64() > Some(0));
    Ok(())
}

#[tokio::test]
async fn exit_on_fail_exits_1_after_first_failure() -> anyhow::Result<()> {
    let proxy = MockProxy::start_with(MockProxyOptions::default().without_request_id())
        .await
        .context("start mock proxy")?;

    let out = run_proxycheck(vec![
        "run".to_string(),
        "--base-url".to_string(),
        proxy.base_url().to_string(),
        "--exit-on-fail".to_string(),
        "--output".to_string(),
        "json".to_string(),
    ])
    .await?;
    proxy.shutdown().await;

    anyhow::ensure!(status_code(out.status) == 1, "expected 1, {}", explain(&out));

    let stdout = String::from_utf8_lossy(&out.stdout);
    let mut summary = None;
    for line in stdout.lines().filter(|l| !l.trim().is_empty()) {
        let v: serde_json::Value =
            serde_json::from_str(line).with_context(|| format!("not json: {line}"))?;
        if v["kind"] == "summary" {
            summary = Some(v);
        }
    }
    let summary = summary.context("summary line missing")?;
    assert_eq!(summary["halted_at"], "authentication");
    assert_eq!(summary["failed"], 1);
    assert!(summary["details"].get("caching").is_none());
    Ok(())
}
