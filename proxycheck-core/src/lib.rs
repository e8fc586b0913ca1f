pub mod config;
pub mod driver;
mod error;
pub mod http;
pub mod narrate;
pub mod poller;
pub mod probe;
pub mod results;
mod scenarios;
pub mod stats;
pub mod suite;

pub use config::{
    BreakerConfig, CachingConfig, LoadConfig, MAX_DURATION, RateLimitConfig, RunMode, SuiteConfig,
};
pub use driver::{LoadDriver, LoadProgress, LoadReport, ProgressFn};
pub use error::{Error, Result};
pub use narrate::{Narrator, TracingNarrator};
pub use poller::{BreakerState, Observation, StatePoller, WaitReport};
pub use probe::{HttpProber, Probe, ProbeOutcome, ProbeRequest};
pub use results::{ResultCollector, RunSummary, ScenarioResult};
pub use scenarios::{
    HEADER_DEGRADED, HEADER_PROVIDER, HEADER_REQUEST_ID, METRIC_LATENCY_AVG, METRIC_REQUESTS_TOTAL,
};
pub use stats::{LatencySummary, LoadStats, StatsSnapshot, percentile};
pub use suite::{Flow, Halted, Suite, SuiteOutcome};
