use std::fmt::Write as _;

use proxycheck_core::SuiteOutcome;

pub(crate) const RULE: &str = "============================================================";

pub(crate) fn render(outcome: &SuiteOutcome) -> String {
    let s = &outcome.summary;
    let mut out = String::new();

    writeln!(out, "\n{RULE}").ok();
    out.push_str("Test Summary\n");
    writeln!(out, "{RULE}").ok();
    writeln!(out, "Total: {}", s.total).ok();
    writeln!(out, "Passed: {}", s.passed).ok();
    writeln!(out, "Failed: {}", s.failed).ok();
    if s.warnings > 0 {
        writeln!(out, "Warnings: {}", s.warnings).ok();
    }
    writeln!(out, "Pass Rate: {}", s.pass_rate).ok();

    let failed: Vec<&str> = s
        .details
        .iter()
        .filter(|r| !r.passed)
        .map(|r| r.name.as_str())
        .collect();
    if !failed.is_empty() {
        writeln!(out, "Failed scenarios: {}", failed.join(", ")).ok();
    }
    if let Some(halted) = &outcome.halted {
        writeln!(
            out,
            "Stopped early after `{}` (--exit-on-fail)",
            halted.scenario
        )
        .ok();
    }
    writeln!(out, "{RULE}").ok();
    out
}
