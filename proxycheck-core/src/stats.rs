use std::collections::BTreeMap;
use std::sync::Mutex;
use std::time::Duration;

use serde::Serialize;

use crate::probe::ProbeOutcome;

pub const STATUS_TOO_MANY_REQUESTS: u16 = 429;

/// Percentile tail that is only reported for runs with more than this many samples.
const P999_MIN_SAMPLES: usize = 1000;

/// Shared accumulator for probe outcomes.
///
/// Workers hold it behind an `Arc` and mutate it only through [`LoadStats::record`]; every
/// observation is applied under a single lock so counts and the latency sequence never diverge.
#[derive(Debug, Default)]
pub struct LoadStats {
    inner: Mutex<StatsSnapshot>,
}

impl LoadStats {
    pub fn record(&self, outcome: &ProbeOutcome) {
        self.record_observation(outcome.status, outcome.latency);
    }

    pub fn record_observation(&self, status: Option<u16>, latency: Duration) {
        let mut s = self
            .inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        s.total = s.total.saturating_add(1);
        match status {
            Some(code) => {
                if (200..400).contains(&code) {
                    s.success = s.success.saturating_add(1);
                } else if code == STATUS_TOO_MANY_REQUESTS {
                    s.rate_limited = s.rate_limited.saturating_add(1);
                    if s.first_rate_limited_at.is_none() {
                        s.first_rate_limited_at = Some(s.total);
                    }
                }
                *s.status_counts.entry(code).or_insert(0) += 1;
            }
            None => s.errors = s.errors.saturating_add(1),
        }
        s.latencies.push(latency);
    }

    pub fn total(&self) -> u64 {
        self.inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .total
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        self.inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct StatsSnapshot {
    pub total: u64,
    /// Responses with a 2xx/3xx status.
    pub success: u64,
    /// Transport failures (no status).
    pub errors: u64,
    pub rate_limited: u64,
    /// Per-status counts for every observation that produced an HTTP response.
    pub status_counts: BTreeMap<u16, u64>,
    /// Latencies in recording order, one per observation.
    pub latencies: Vec<Duration>,
    /// 1-based position (in recording order) of the first 429.
    pub first_rate_limited_at: Option<u64>,
}

impl StatsSnapshot {
    /// Percentage of observations that succeeded.
    pub fn success_rate(&self) -> f64 {
        self.success as f64 / self.total.max(1) as f64 * 100.0
    }

    /// Percentage of observations that were rate limited.
    pub fn rate_limited_ratio(&self) -> f64 {
        self.rate_limited as f64 / self.total.max(1) as f64 * 100.0
    }

    pub fn sorted_latencies_ms(&self) -> Vec<f64> {
        let mut ms: Vec<f64> = self
            .latencies
            .iter()
            .map(|d| d.as_secs_f64() * 1000.0)
            .collect();
        ms.sort_by(f64::total_cmp);
        ms
    }

    pub fn latency_summary(&self) -> LatencySummary {
        LatencySummary::from_sorted_ms(&self.sorted_latencies_ms())
    }

    pub fn status_counts_by_name(&self) -> BTreeMap<String, u64> {
        self.status_counts
            .iter()
            .map(|(code, count)| (code.to_string(), *count))
            .collect()
    }
}

/// Nearest-rank percentile over an ascending sequence.
///
/// Selects index `round((len - 1) * p)` with ties rounding to even. Returns `None` for an empty
/// sequence: a missing percentile is absent data, never zero.
pub fn percentile(sorted: &[f64], p: f64) -> Option<f64> {
    if sorted.is_empty() {
        return None;
    }
    let p = p.clamp(0.0, 1.0);
    let idx = ((sorted.len() - 1) as f64 * p).round_ties_even() as usize;
    sorted.get(idx.min(sorted.len() - 1)).copied()
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LatencySummary {
    pub min: Option<f64>,
    pub avg: Option<f64>,
    pub max: Option<f64>,
    pub p50: Option<f64>,
    pub p95: Option<f64>,
    pub p99: Option<f64>,
    pub p999: Option<f64>,
}

impl LatencySummary {
    pub fn from_sorted_ms(sorted: &[f64]) -> Self {
        let avg = if sorted.is_empty() {
            None
        } else {
            Some(sorted.iter().sum::<f64>() / sorted.len() as f64)
        };

        Self {
            min: sorted.first().copied(),
            avg,
            max: sorted.last().copied(),
            p50: percentile(sorted, 0.50),
            p95: percentile(sorted, 0.95),
            p99: percentile(sorted, 0.99),
            p999: if sorted.len() > P999_MIN_SAMPLES {
                percentile(sorted, 0.999)
            } else {
                None
            },
        }
    }

    /// Same summary with every value rounded to two decimals, for reports.
    #[must_use]
    pub fn rounded(&self) -> Self {
        let r = |v: Option<f64>| v.map(round2);
        Self {
            min: r(self.min),
            avg: r(self.avg),
            max: r(self.max),
            p50: r(self.p50),
            p95: r(self.p95),
            p99: r(self.p99),
            p999: r(self.p999),
        }
    }
}

pub fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(v: u64) -> Duration {
        Duration::from_millis(v)
    }

    #[test]
    fn percentile_of_empty_is_none() {
        assert_eq!(percentile(&[], 0.5), None);
        assert_eq!(percentile(&[], 0.0), None);
    }

    #[test]
    fn percentile_uses_nearest_rank_with_even_ties() {
        let values = [1.0, 2.0, 3.0, 4.0, 5.0, 6.0];
        // (6 - 1) * 0.5 = 2.5 -> ties to even -> index 2.
        assert_eq!(percentile(&values, 0.5), Some(3.0));
        assert_eq!(percentile(&values, 0.0), Some(1.0));
        assert_eq!(percentile(&values, 1.0), Some(6.0));
        // 5 * 0.95 = 4.75 -> index 5.
        assert_eq!(percentile(&values, 0.95), Some(6.0));

        let odd = [10.0, 20.0, 30.0, 40.0];
        // 3 * 0.5 = 1.5 -> ties to even -> index 2.
        assert_eq!(percentile(&odd, 0.5), Some(30.0));
    }

    #[test]
    fn percentile_is_idempotent() {
        let values: Vec<f64> = (1..=97).map(f64::from).collect();
        let first = percentile(&values, 0.99);
        assert_eq!(first, percentile(&values, 0.99));
        assert_eq!(first, Some(96.0));
    }

    #[test]
    fn record_classifies_each_observation() {
        let stats = LoadStats::default();
        stats.record_observation(Some(200), ms(5));
        stats.record_observation(Some(304), ms(6));
        stats.record_observation(Some(429), ms(7));
        stats.record_observation(Some(500), ms(8));
        stats.record_observation(None, ms(9));
        stats.record_observation(Some(429), ms(10));

        let snap = stats.snapshot();
        assert_eq!(snap.total, 6);
        assert_eq!(snap.success, 2);
        assert_eq!(snap.rate_limited, 2);
        assert_eq!(snap.errors, 1);
        assert_eq!(snap.first_rate_limited_at, Some(3));
        assert_eq!(snap.status_counts.get(&429), Some(&2));
        assert_eq!(snap.status_counts.get(&500), Some(&1));
        assert_eq!(snap.status_counts.values().sum::<u64>(), 5);
        assert_eq!(snap.latencies.len() as u64, snap.total);
    }

    #[test]
    fn total_matches_observations_under_contention() {
        let stats = std::sync::Arc::new(LoadStats::default());
        let handles: Vec<_> = (0..8)
            .map(|t| {
                let stats = stats.clone();
                std::thread::spawn(move || {
                    for i in 0..250u64 {
                        let status = if (i + t) % 7 == 0 { None } else { Some(200) };
                        stats.record_observation(status, ms(i));
                    }
                })
            })
            .collect();
        for h in handles {
            if h.join().is_err() {
                panic!("recording thread panicked");
            }
        }

        let snap = stats.snapshot();
        assert_eq!(snap.total, 2000);
        assert_eq!(snap.latencies.len(), 2000);
        assert_eq!(snap.success + snap.errors, 2000);
    }

    #[test]
    fn latency_summary_reports_p999_only_for_large_runs() {
        let small: Vec<f64> = (1..=1000).map(f64::from).collect();
        let summary = LatencySummary::from_sorted_ms(&small);
        assert_eq!(summary.min, Some(1.0));
        assert_eq!(summary.max, Some(1000.0));
        assert_eq!(summary.avg, Some(500.5));
        assert_eq!(summary.p999, None);

        let large: Vec<f64> = (1..=1001).map(f64::from).collect();
        let summary = LatencySummary::from_sorted_ms(&large);
        assert_eq!(summary.p999, Some(1000.0));

        assert_eq!(LatencySummary::from_sorted_ms(&[]), LatencySummary::default());
    }

    #[test]
    fn rates_guard_against_empty_runs() {
        let snap = StatsSnapshot::default();
        assert_eq!(snap.success_rate(), 0.0);
        assert_eq!(snap.rate_limited_ratio(), 0.0);
        assert_eq!(round2(12.3456), 12.35);
    }
}
