use std::time::{Duration, Instant};

use serde_json::{Map, Value};

use crate::probe::{Probe, ProbeRequest};

pub const BREAKER_STATS_PATH: &str = "/circuit-breaker-stats";
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(200);
const STATS_REQUEST_TIMEOUT: Duration = Duration::from_secs(5);
/// Smallest per-poll timeout inside [`StatePoller::wait_for`], so a wait with nothing left
/// still gets one real poll.
pub const MIN_POLL_BUDGET: Duration = Duration::from_millis(250);

/// Circuit-breaker state labels as reported by the proxy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display, strum::EnumString)]
#[strum(serialize_all = "snake_case")]
pub enum BreakerState {
    Closed,
    Open,
    HalfOpen,
}

/// What a single poll of the stats endpoint saw for one component.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Observation {
    /// Transport failure or a non-200 status.
    Unreachable { status: Option<u16> },
    /// The endpoint answered but reported no state for the component (or unparseable JSON).
    Missing,
    /// The raw state label reported for the component.
    State(String),
}

impl Observation {
    pub fn state_label(&self) -> Option<&str> {
        match self {
            Self::State(s) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn describe(&self) -> String {
        match self {
            Self::Unreachable { status: Some(s) } => format!("unreachable (status {s})"),
            Self::Unreachable { status: None } => "unreachable".to_string(),
            Self::Missing => "missing".to_string(),
            Self::State(s) => s.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WaitReport {
    pub matched: bool,
    pub polls: u32,
    pub last: Observation,
    pub waited: Duration,
}

/// Parse a `/circuit-breaker-stats` body into its top-level object.
///
/// Unparseable JSON (or a non-object document) is a protocol mismatch: it is logged and read as
/// an empty object so callers see "unknown" instead of an error.
pub fn parse_stats_body(body: &[u8]) -> Map<String, Value> {
    match serde_json::from_slice::<Value>(body) {
        Ok(Value::Object(map)) => map,
        Ok(other) => {
            tracing::warn!("circuit-breaker-stats is not a json object: {other}");
            Map::new()
        }
        Err(err) => {
            tracing::warn!("circuit-breaker-stats json decode failed: {err}");
            Map::new()
        }
    }
}

pub fn component_state<'a>(stats: &'a Map<String, Value>, component: &str) -> Option<&'a str> {
    stats.get(component)?.get("state")?.as_str()
}

/// Reads remote breaker state through a [`Probe`]. Holds no belief between calls: every
/// question re-fetches the stats endpoint.
#[derive(Debug)]
pub struct StatePoller<'a, P> {
    probe: &'a P,
    interval: Duration,
}

impl<'a, P> StatePoller<'a, P>
where
    P: Probe,
{
    pub fn new(probe: &'a P) -> Self {
        Self {
            probe,
            interval: DEFAULT_POLL_INTERVAL,
        }
    }

    #[must_use]
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Fetch the whole stats document. Anything but a 200 yields the observed status
    /// (`None` for a transport failure).
    pub async fn fetch_stats(&self) -> Result<Map<String, Value>, Option<u16>> {
        self.fetch_stats_within(STATS_REQUEST_TIMEOUT).await
    }

    async fn fetch_stats_within(
        &self,
        budget: Duration,
    ) -> Result<Map<String, Value>, Option<u16>> {
        let req = ProbeRequest::get(BREAKER_STATS_PATH).with_timeout(budget);
        let outcome = self.probe.probe(&req).await;
        match outcome.status {
            Some(200) => Ok(parse_stats_body(&outcome.body)),
            status => Err(status),
        }
    }

    pub async fn observe(&self, component: &str) -> Observation {
        self.observe_within(component, STATS_REQUEST_TIMEOUT).await
    }

    async fn observe_within(&self, component: &str, budget: Duration) -> Observation {
        match self.fetch_stats_within(budget).await {
            Ok(stats) => match component_state(&stats, component) {
                Some(state) => Observation::State(state.to_string()),
                None => Observation::Missing,
            },
            Err(status) => Observation::Unreachable { status },
        }
    }

    pub async fn current_state(&self, component: &str) -> Option<BreakerState> {
        self.observe(component).await.state_label()?.parse().ok()
    }

    /// Poll until `component` reports `target` or `timeout` elapses.
    ///
    /// At least one poll is always made. Unreachable polls count as "not yet". Each poll is
    /// bounded by the time left, floored at [`MIN_POLL_BUDGET`], and no poll starts once the
    /// deadline has passed.
    pub async fn wait_for(
        &self,
        component: &str,
        target: BreakerState,
        timeout: Duration,
    ) -> WaitReport {
        let target_label = target.to_string();
        let started = Instant::now();
        // `None` when the bound is past what `Instant` can represent.
        let deadline = started.checked_add(timeout);
        let remaining = || {
            deadline.map_or(Duration::MAX, |d| d.saturating_duration_since(Instant::now()))
        };
        let report = |matched, polls, last| WaitReport {
            matched,
            polls,
            last,
            waited: started.elapsed(),
        };
        let mut polls = 0u32;

        loop {
            let budget = remaining().clamp(MIN_POLL_BUDGET, STATS_REQUEST_TIMEOUT);
            let last = self.observe_within(component, budget).await;
            polls = polls.saturating_add(1);
            tracing::debug!(component, target = %target_label, observed = %last.describe(), polls, "breaker poll");

            if last.state_label() == Some(target_label.as_str()) {
                return report(true, polls, last);
            }

            let left = remaining();
            if !left.is_zero() {
                tokio::time::sleep(self.interval.min(left)).await;
            }
            if remaining().is_zero() {
                return report(false, polls, last);
            }
        }
    }

    pub async fn wait_for_state(
        &self,
        component: &str,
        target: BreakerState,
        timeout: Duration,
    ) -> bool {
        self.wait_for(component, target, timeout).await.matched
    }
}
