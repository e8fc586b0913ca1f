use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Decides, per worker iteration, whether another probe may be issued.
///
/// Count mode hands out exactly `total` claims across all workers. Deadline mode admits
/// iterations until the shared wall-clock deadline passes; it is checked between iterations
/// only, so an in-flight probe is never interrupted. A duration past what `Instant` can
/// represent leaves the gate without a deadline.
#[derive(Debug)]
pub(crate) struct WorkGate {
    claimed: AtomicU64,
    total: Option<u64>,
    deadline: Option<Instant>,
}

impl WorkGate {
    pub(crate) fn count(total: u64) -> Self {
        Self {
            claimed: AtomicU64::new(0),
            total: Some(total),
            deadline: None,
        }
    }

    pub(crate) fn until(started: Instant, duration: Duration) -> Self {
        Self {
            claimed: AtomicU64::new(0),
            total: None,
            deadline: started.checked_add(duration),
        }
    }

    pub(crate) fn next(&self) -> bool {
        if let Some(deadline) = self.deadline
            && Instant::now() >= deadline
        {
            return false;
        }

        match self.total {
            Some(total) => self.claimed.fetch_add(1, Ordering::Relaxed) < total,
            None => {
                self.claimed.fetch_add(1, Ordering::Relaxed);
                true
            }
        }
    }
}
