//! Staged virtual-user load tests against a running backend.

pub mod metrics;
pub mod runner;
pub mod scenario;

pub use metrics::{Metrics, Report, TrendSummary, Verdict};
pub use runner::{LoadTest, LoadTestConfig, LoadTestError};
pub use scenario::{Scenario, ScenarioKind};
