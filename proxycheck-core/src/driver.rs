mod gate;

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::FutureExt as _;
use tokio::time::MissedTickBehavior;

use crate::probe::{Probe, ProbeOutcome, ProbeRequest};
use crate::stats::{LoadStats, StatsSnapshot};

use gate::WorkGate;

#[derive(Debug, Clone, Copy)]
pub struct LoadProgress {
    pub elapsed: Duration,
    pub requests_total: u64,
    /// Requests/sec observed during the last progress interval.
    pub rps_now: f64,
}

pub type ProgressFn = Arc<dyn Fn(LoadProgress) + Send + Sync + 'static>;

#[derive(Debug, Clone)]
pub struct LoadReport {
    pub stats: StatsSnapshot,
    pub elapsed: Duration,
    pub workers: usize,
}

impl LoadReport {
    /// Observed throughput over the measured wall time.
    pub fn qps(&self) -> f64 {
        self.stats.total as f64 / self.elapsed.as_secs_f64().max(1e-9)
    }
}

/// Bounded worker pool that drives probes and funnels every outcome into one [`LoadStats`].
pub struct LoadDriver<P> {
    probe: Arc<P>,
    progress: Option<ProgressFn>,
}

impl<P> std::fmt::Debug for LoadDriver<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoadDriver")
            .field("progress", &self.progress.is_some())
            .finish_non_exhaustive()
    }
}

impl<P> LoadDriver<P>
where
    P: Probe + 'static,
{
    pub fn new(probe: Arc<P>) -> Self {
        Self {
            probe,
            progress: None,
        }
    }

    #[must_use]
    pub fn with_progress(mut self, progress: Option<ProgressFn>) -> Self {
        self.progress = progress;
        self
    }

    /// Issue exactly `count` probes across `concurrency` workers.
    pub async fn run_burst(&self, req: ProbeRequest, count: u64, concurrency: usize) -> LoadReport {
        let workers = concurrency.max(1).min(count.min(usize::MAX as u64) as usize);
        let gate = Arc::new(WorkGate::count(count));
        self.run(req, gate, workers).await
    }

    /// Keep `concurrency` workers issuing probes back-to-back until `duration` elapses.
    pub async fn run_sustained(
        &self,
        req: ProbeRequest,
        duration: Duration,
        concurrency: usize,
    ) -> LoadReport {
        let gate = Arc::new(WorkGate::until(Instant::now(), duration));
        self.run(req, gate, concurrency.max(1)).await
    }

    async fn run(&self, req: ProbeRequest, gate: Arc<WorkGate>, workers: usize) -> LoadReport {
        let stats = Arc::new(LoadStats::default());
        let req = Arc::new(req);
        let started = Instant::now();

        tracing::debug!(path = %req.path, workers, "starting load workers");

        let mut handles = Vec::with_capacity(workers);
        for _ in 0..workers {
            let probe = self.probe.clone();
            let stats = stats.clone();
            let gate = gate.clone();
            let req = req.clone();
            handles.push(tokio::spawn(async move {
                let mut issued = 0u64;
                while gate.next() {
                    let started = Instant::now();
                    // A panicking probe still fills its claimed slot and the worker keeps going.
                    let outcome = AssertUnwindSafe(probe.probe(&req))
                        .catch_unwind()
                        .await
                        .unwrap_or_else(|_| {
                            tracing::warn!("probe panicked; recorded as a transport failure");
                            ProbeOutcome::transport_failure("probe panicked", started.elapsed())
                        });
                    stats.record(&outcome);
                    issued += 1;
                }
                issued
            }));
        }

        let progress_handle = self.progress.as_ref().map(|progress| {
            let progress = progress.clone();
            let stats = stats.clone();
            tokio::spawn(async move {
                let mut interval = tokio::time::interval(Duration::from_secs(1));
                interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
                // The first tick completes immediately.
                interval.tick().await;

                let mut last_at = Instant::now();
                let mut last_total = 0u64;
                loop {
                    interval.tick().await;
                    let now = Instant::now();
                    let dt = now.duration_since(last_at).as_secs_f64().max(1e-9);
                    last_at = now;

                    let total = stats.total();
                    let rps_now = total.saturating_sub(last_total) as f64 / dt;
                    last_total = total;

                    (progress)(LoadProgress {
                        elapsed: started.elapsed(),
                        requests_total: total,
                        rps_now,
                    });
                }
            })
        });

        // Full barrier: no outcome may be recorded after we read the snapshot.
        for (worker, h) in handles.into_iter().enumerate() {
            match h.await {
                Ok(issued) => tracing::debug!(worker, issued, "load worker finished"),
                Err(err) if err.is_panic() => {
                    tracing::warn!(worker, "load worker panicked: {err}");
                }
                Err(err) => tracing::warn!(worker, "load worker did not complete: {err}"),
            }
        }

        if let Some(h) = progress_handle {
            h.abort();
            let _ = h.await;
        }

        LoadReport {
            stats: stats.snapshot(),
            elapsed: started.elapsed(),
            workers,
        }
    }
}
