use crate::driver::ProgressFn;

/// Console-facing narration of a run. The suite reports progress through this seam and never
/// writes to stdout itself.
pub trait Narrator: Send + Sync {
    /// A group of related scenarios begins.
    fn section(&self, title: &str);
    fn ok(&self, msg: &str);
    fn fail(&self, msg: &str);
    fn warn(&self, msg: &str);
    /// Indented detail under the previous line.
    fn note(&self, msg: &str);

    /// Periodic progress callback for sustained load runs.
    fn load_progress(&self) -> Option<ProgressFn> {
        None
    }
}

/// Narrates through `tracing` only.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingNarrator;

impl Narrator for TracingNarrator {
    fn section(&self, title: &str) {
        tracing::info!("== {title}");
    }

    fn ok(&self, msg: &str) {
        tracing::info!("[OK] {msg}");
    }

    fn fail(&self, msg: &str) {
        tracing::warn!("[FAIL] {msg}");
    }

    fn warn(&self, msg: &str) {
        tracing::warn!("[WARN] {msg}");
    }

    fn note(&self, msg: &str) {
        tracing::info!("  {msg}");
    }
}
