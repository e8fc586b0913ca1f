use serde::Serialize;
use std::io::Write as _;
use std::path::Path;
use std::sync::Arc;

use proxycheck_core::{LoadProgress, Narrator, ProgressFn, RunSummary, SuiteConfig, SuiteOutcome};

use super::OutputFormatter;

pub(crate) struct JsonOutput;

#[derive(Debug, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub(crate) enum JsonLine<'a> {
    Header {
        title: &'a str,
        base_url: &'a str,
        target: &'a str,
        mode: String,
    },
    Section {
        title: &'a str,
    },
    Ok {
        message: &'a str,
    },
    Fail {
        message: &'a str,
    },
    Warn {
        message: &'a str,
    },
    Note {
        message: &'a str,
    },
    Progress {
        elapsed_secs: f64,
        total_requests: u64,
        requests_per_sec: f64,
    },
    Summary {
        #[serde(flatten)]
        summary: &'a RunSummary,
        halted_at: Option<&'a str>,
    },
    Report {
        path: String,
    },
}

fn emit_json_line<T: Serialize>(line: &T) {
    let mut out = std::io::stdout().lock();
    if serde_json::to_writer(&mut out, line).is_ok() {
        let _ = writeln!(out);
    }
}

impl Narrator for JsonOutput {
    fn section(&self, title: &str) {
        emit_json_line(&JsonLine::Section { title });
    }

    fn ok(&self, message: &str) {
        emit_json_line(&JsonLine::Ok { message });
    }

    fn fail(&self, message: &str) {
        emit_json_line(&JsonLine::Fail { message });
    }

    fn warn(&self, message: &str) {
        emit_json_line(&JsonLine::Warn { message });
    }

    fn note(&self, message: &str) {
        emit_json_line(&JsonLine::Note { message });
    }

    fn load_progress(&self) -> Option<ProgressFn> {
        Some(Arc::new(|p: LoadProgress| {
            emit_json_line(&JsonLine::Progress {
                elapsed_secs: p.elapsed.as_secs_f64(),
                total_requests: p.requests_total,
                requests_per_sec: p.rps_now,
            });
        }))
    }
}

impl OutputFormatter for JsonOutput {
    fn print_header(&self, title: &str, base_url: &str, cfg: &SuiteConfig) {
        emit_json_line(&JsonLine::Header {
            title,
            base_url,
            target: &cfg.target,
            mode: cfg.mode.to_string(),
        });
    }

    fn print_summary(&self, outcome: &SuiteOutcome) -> anyhow::Result<()> {
        emit_json_line(&JsonLine::Summary {
            summary: &outcome.summary,
            halted_at: outcome.halted.as_ref().map(|h| h.scenario.as_str()),
        });
        Ok(())
    }

    fn print_report_saved(&self, path: &Path) {
        emit_json_line(&JsonLine::Report {
            path: path.display().to_string(),
        });
    }

    fn narrator(self: Arc<Self>) -> Arc<dyn Narrator> {
        self
    }
}
