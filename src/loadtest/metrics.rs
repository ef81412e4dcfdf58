use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use super::scenario::{Scenario, Selector};

/// One finished HTTP request.
#[derive(Debug, Clone)]
pub struct Sample {
    pub name: &'static str,
    pub phase: Option<&'static str>,
    pub duration: Duration,
    /// Transport error or a status outside 200..400.
    pub failed: bool,
}

/// Shared sink the virtual users report into.
#[derive(Default)]
pub struct Metrics {
    samples: Mutex<Vec<Sample>>,
    checks_passed: AtomicU64,
    checks_failed: AtomicU64,
    iterations: AtomicU64,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, sample: Sample) {
        self.samples
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(sample);
    }

    /// Count a named assertion about a response.
    pub fn check(&self, passed: bool) -> bool {
        let counter = if passed {
            &self.checks_passed
        } else {
            &self.checks_failed
        };
        counter.fetch_add(1, Ordering::Relaxed);
        passed
    }

    pub fn iteration_done(&self) {
        self.iterations.fetch_add(1, Ordering::Relaxed);
    }

    pub fn report(&self, scenario: &Scenario, elapsed: Duration) -> Report {
        let samples = self
            .samples
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();

        let durations = |filter: &dyn Fn(&Sample) -> bool| -> Vec<f64> {
            samples
                .iter()
                .filter(|s| filter(s))
                .map(|s| s.duration.as_secs_f64() * 1000.0)
                .collect()
        };

        let overall = TrendSummary::from_millis(durations(&|_| true));
        let mut by_name = BTreeMap::new();
        for name in samples.iter().map(|s| s.name) {
            by_name
                .entry(name.to_string())
                .or_insert_with(|| TrendSummary::from_millis(durations(&|s| s.name == name)));
        }

        let failed = samples.iter().filter(|s| s.failed).count();
        let failure_rate = if samples.is_empty() {
            0.0
        } else {
            failed as f64 / samples.len() as f64
        };

        let mut verdicts = Vec::new();
        for threshold in &scenario.latency {
            let selected = match threshold.selector {
                Selector::All => durations(&|_| true),
                Selector::Name(name) => durations(&|s| s.name == name),
                Selector::Phase(phase) => durations(&|s| s.phase == Some(phase)),
            };
            let actual = percentile(&sorted(selected), threshold.percentile);
            verdicts.push(Verdict {
                metric: threshold.selector.to_string(),
                condition: format!("p({}) < {}ms", threshold.percentile, threshold.limit_ms),
                actual: actual.map(|v| format!("{v:.2}ms")),
                passed: actual.is_none_or(|v| v < threshold.limit_ms),
            });
        }
        verdicts.push(Verdict {
            metric: "http_req_failed".to_string(),
            condition: format!("rate < {}", scenario.max_failure_rate),
            actual: Some(format!("{failure_rate:.4}")),
            passed: failure_rate < scenario.max_failure_rate,
        });

        let secs = elapsed.as_secs_f64();
        Report {
            scenario: scenario.kind.to_string(),
            elapsed_secs: secs,
            requests: samples.len(),
            failed,
            failure_rate,
            requests_per_sec: if secs > 0.0 {
                samples.len() as f64 / secs
            } else {
                0.0
            },
            iterations: self.iterations.load(Ordering::Relaxed),
            checks_passed: self.checks_passed.load(Ordering::Relaxed),
            checks_failed: self.checks_failed.load(Ordering::Relaxed),
            overall,
            by_name,
            verdicts,
        }
    }
}

/// min/avg/med/max/p90/p95/p99 of request durations, in milliseconds.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TrendSummary {
    pub count: usize,
    pub min: f64,
    pub avg: f64,
    pub med: f64,
    pub max: f64,
    pub p90: f64,
    pub p95: f64,
    pub p99: f64,
}

impl TrendSummary {
    pub fn from_millis(values: Vec<f64>) -> Self {
        let values = sorted(values);
        if values.is_empty() {
            return Self::default();
        }
        let at = |p: f64| percentile(&values, p).unwrap_or_default();
        Self {
            count: values.len(),
            min: values[0],
            avg: values.iter().sum::<f64>() / values.len() as f64,
            med: at(50.0),
            max: values[values.len() - 1],
            p90: at(90.0),
            p95: at(95.0),
            p99: at(99.0),
        }
    }
}

fn sorted(mut values: Vec<f64>) -> Vec<f64> {
    values.sort_by(f64::total_cmp);
    values
}

/// Percentile with linear interpolation between closest ranks.
pub fn percentile(sorted: &[f64], p: f64) -> Option<f64> {
    if sorted.is_empty() {
        return None;
    }
    let rank = (p / 100.0).clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lower = rank.floor() as usize;
    let upper = rank.ceil() as usize;
    let weight = rank - lower as f64;
    Some(sorted[lower] + (sorted[upper] - sorted[lower]) * weight)
}

#[derive(Debug, Clone, Serialize)]
pub struct Verdict {
    pub metric: String,
    pub condition: String,
    /// `None` when no request matched.
    pub actual: Option<String>,
    pub passed: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct Report {
    pub scenario: String,
    pub elapsed_secs: f64,
    pub requests: usize,
    pub failed: usize,
    pub failure_rate: f64,
    pub requests_per_sec: f64,
    pub iterations: u64,
    pub checks_passed: u64,
    pub checks_failed: u64,
    pub overall: TrendSummary,
    pub by_name: BTreeMap<String, TrendSummary>,
    pub verdicts: Vec<Verdict>,
}

impl Report {
    pub fn all_passed(&self) -> bool {
        self.verdicts.iter().all(|v| v.passed)
    }
}

fn write_trend(f: &mut fmt::Formatter<'_>, label: &str, t: &TrendSummary) -> fmt::Result {
    writeln!(
        f,
        "  {label:<32} n={:<6} min={:.2}ms avg={:.2}ms med={:.2}ms max={:.2}ms \
         p(90)={:.2}ms p(95)={:.2}ms p(99)={:.2}ms",
        t.count,
        t.min,
        t.avg,
        t.med,
        t.max,
        t.p90,
        t.p95,
        t.p99
    )
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{} test: {} requests in {:.1}s ({:.2}/s), {} iterations",
            self.scenario, self.requests, self.elapsed_secs, self.requests_per_sec, self.iterations
        )?;
        writeln!(
            f,
            "  failed requests: {} ({:.2}%), checks: {} passed / {} failed",
            self.failed,
            self.failure_rate * 100.0,
            self.checks_passed,
            self.checks_failed
        )?;
        write_trend(f, "http_req_duration", &self.overall)?;
        for (name, trend) in &self.by_name {
            write_trend(f, &format!("{{name:{name}}}"), trend)?;
        }
        writeln!(f, "thresholds:")?;
        for verdict in &self.verdicts {
            writeln!(
                f,
                "  [{}] {} {} (actual: {})",
                if verdict.passed { "PASS" } else { "FAIL" },
                verdict.metric,
                verdict.condition,
                verdict.actual.as_deref().unwrap_or("no data")
            )?;
        }
        Ok(())
    }
}
