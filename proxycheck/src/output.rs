use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use proxycheck_core::{Narrator, SuiteConfig, SuiteOutcome};

use crate::cli::OutputFormat;

mod human;
mod json;

pub(crate) trait OutputFormatter: Narrator {
    fn print_header(&self, title: &str, base_url: &str, cfg: &SuiteConfig);
    fn print_summary(&self, outcome: &SuiteOutcome) -> anyhow::Result<()>;
    fn print_report_saved(&self, path: &Path);

    /// The same formatter, as the narration seam the suite reports through.
    fn narrator(self: Arc<Self>) -> Arc<dyn Narrator>;
}

pub(crate) fn formatter(format: OutputFormat, load_duration: Duration) -> Arc<dyn OutputFormatter> {
    match format {
        OutputFormat::HumanReadable => Arc::new(human::HumanReadableOutput::new(load_duration)),
        OutputFormat::Json => Arc::new(json::JsonOutput),
    }
}
