use std::sync::Mutex;
use std::time::Duration;

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};

/// Single progress bar for the sustained load run, drawn on stderr.
pub(crate) struct LoadProgressBar {
    total: Duration,
    bar: Mutex<Option<ProgressBar>>,
}

impl LoadProgressBar {
    pub(crate) fn new(total: Duration) -> Self {
        Self {
            total,
            bar: Mutex::new(None),
        }
    }

    pub(crate) fn update(&self, elapsed: Duration, message: String) {
        let total_ms = millis(self.total);
        let elapsed_ms = millis(elapsed);

        let mut bar = self
            .bar
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let pb = bar.get_or_insert_with(|| {
            let pb = ProgressBar::with_draw_target(
                Some(total_ms),
                ProgressDrawTarget::stderr_with_hz(5),
            );
            pb.set_style(bar_style());
            pb.set_prefix("load");
            pb
        });
        pb.set_message(message);
        pb.set_position(elapsed_ms.min(total_ms));
    }

    /// Clear the bar if one is showing. Safe to call at any time.
    pub(crate) fn finish(&self) {
        let taken = self
            .bar
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take();
        if let Some(pb) = taken {
            pb.finish_and_clear();
        }
    }
}

fn millis(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

fn bar_style() -> ProgressStyle {
    ProgressStyle::with_template("{prefix} [ {bar:20.cyan/blue} ] {percent:>3}% {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█░")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn millis_saturate_instead_of_wrapping() {
        assert_eq!(millis(Duration::from_millis(1500)), 1500);
        assert_eq!(millis(Duration::MAX), u64::MAX);
    }

    #[test]
    fn oversized_total_keeps_position_in_range() {
        let bar = LoadProgressBar::new(Duration::MAX);
        bar.update(Duration::from_secs(1), "1 req".to_string());
        let pos = bar
            .bar
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .as_ref()
            .map(ProgressBar::position);
        assert_eq!(pos, Some(1000));
        bar.finish();
    }
}
