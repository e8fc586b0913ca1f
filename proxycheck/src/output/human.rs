use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use proxycheck_core::{LoadProgress, Narrator, ProgressFn, SuiteConfig, SuiteOutcome};

mod progress;
mod summary;

use progress::LoadProgressBar;
use summary::{RULE, render};

use super::OutputFormatter;

pub(crate) struct HumanReadableOutput {
    progress: Arc<LoadProgressBar>,
}

impl HumanReadableOutput {
    pub(crate) fn new(load_duration: Duration) -> Self {
        Self {
            progress: Arc::new(LoadProgressBar::new(load_duration)),
        }
    }

    fn line(&self, text: &str) {
        self.progress.finish();
        println!("{text}");
    }
}

impl Narrator for HumanReadableOutput {
    fn section(&self, title: &str) {
        self.line(&format!("\n{title}"));
    }

    fn ok(&self, msg: &str) {
        self.line(&format!("[OK] {msg}"));
    }

    fn fail(&self, msg: &str) {
        self.line(&format!("[FAIL] {msg}"));
    }

    fn warn(&self, msg: &str) {
        self.line(&format!("[WARN] {msg}"));
    }

    fn note(&self, msg: &str) {
        self.line(&format!("  {msg}"));
    }

    fn load_progress(&self) -> Option<ProgressFn> {
        let progress = self.progress.clone();
        Some(Arc::new(move |p: LoadProgress| {
            progress.update(
                p.elapsed,
                format!("{} reqs, {:.0} req/s", p.requests_total, p.rps_now),
            );
        }))
    }
}

impl OutputFormatter for HumanReadableOutput {
    fn print_header(&self, title: &str, base_url: &str, cfg: &SuiteConfig) {
        println!("{RULE}");
        println!("{title}");
        println!("{RULE}");
        println!("base_url: {base_url}");
        println!("target: {} mode: {}", cfg.target, cfg.mode);
    }

    fn print_summary(&self, outcome: &SuiteOutcome) -> anyhow::Result<()> {
        self.progress.finish();
        print!("{}", render(outcome));
        Ok(())
    }

    fn print_report_saved(&self, path: &Path) {
        println!("Report saved to: {}", path.display());
    }

    fn narrator(self: Arc<Self>) -> Arc<dyn Narrator> {
        self
    }
}
