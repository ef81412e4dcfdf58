use std::fmt;
use std::time::Duration;

/// One ramp step: move linearly from the previous target to `target` VUs over `duration`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Stage {
    pub duration: Duration,
    pub target: u32,
}

const fn secs(duration: u64, target: u32) -> Stage {
    Stage {
        duration: Duration::from_secs(duration),
        target,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum ScenarioKind {
    /// Typical traffic.
    Load,
    /// Ramp until the service degrades.
    Stress,
    /// Sudden jumps in traffic.
    Spike,
    /// Sustained moderate traffic for half an hour.
    Soak,
}

impl fmt::Display for ScenarioKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ScenarioKind::Load => "load",
            ScenarioKind::Stress => "stress",
            ScenarioKind::Spike => "spike",
            ScenarioKind::Soak => "soak",
        };
        f.write_str(name)
    }
}

/// Which requests a latency threshold applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Selector {
    All,
    Name(&'static str),
    Phase(&'static str),
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Selector::All => f.write_str("http_req_duration"),
            Selector::Name(name) => write!(f, "http_req_duration{{name:{name}}}"),
            Selector::Phase(phase) => write!(f, "http_req_duration{{phase:{phase}}}"),
        }
    }
}

/// `p(percentile) < limit_ms` over the selected requests.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LatencyThreshold {
    pub selector: Selector,
    pub percentile: f64,
    pub limit_ms: f64,
}

const fn p95(selector: Selector, limit_ms: f64) -> LatencyThreshold {
    LatencyThreshold {
        selector,
        percentile: 95.0,
        limit_ms,
    }
}

const fn p99(selector: Selector, limit_ms: f64) -> LatencyThreshold {
    LatencyThreshold {
        selector,
        percentile: 99.0,
        limit_ms,
    }
}

#[derive(Debug, Clone)]
pub struct Scenario {
    pub kind: ScenarioKind,
    pub stages: Vec<Stage>,
    pub latency: Vec<LatencyThreshold>,
    /// Failed requests must stay below this share of all requests.
    pub max_failure_rate: f64,
    /// Abort setup when the health check fails.
    pub require_healthy: bool,
    /// Abort setup when no token could be obtained.
    pub require_auth: bool,
    /// Check health again once the run has settled.
    pub recovery_check: bool,
}

impl Scenario {
    pub fn for_kind(kind: ScenarioKind) -> Self {
        match kind {
            ScenarioKind::Load => Self::load(),
            ScenarioKind::Stress => Self::stress(),
            ScenarioKind::Spike => Self::spike(),
            ScenarioKind::Soak => Self::soak(),
        }
    }

    pub fn load() -> Self {
        Self {
            kind: ScenarioKind::Load,
            stages: vec![
                secs(30, 5),
                secs(60, 10),
                secs(30, 15),
                secs(120, 15),
                secs(30, 0),
            ],
            latency: vec![
                p95(Selector::All, 500.0),
                p99(Selector::All, 1000.0),
                p95(Selector::Name("list_portfolios"), 300.0),
                p95(Selector::Name("get_portfolio"), 400.0),
                p95(Selector::Name("create_portfolio"), 600.0),
            ],
            max_failure_rate: 0.01,
            require_healthy: true,
            require_auth: false,
            recovery_check: false,
        }
    }

    pub fn stress() -> Self {
        Self {
            kind: ScenarioKind::Stress,
            stages: vec![
                secs(60, 10),
                secs(120, 25),
                secs(120, 50),
                secs(180, 100),
                secs(120, 150),
                secs(120, 200),
                secs(180, 200),
                secs(120, 0),
            ],
            latency: vec![
                p95(Selector::All, 2000.0),
                p99(Selector::All, 5000.0),
                p95(Selector::Name("list_portfolios"), 1500.0),
                p95(Selector::Name("get_portfolio"), 2000.0),
            ],
            max_failure_rate: 0.05,
            require_healthy: false,
            require_auth: false,
            recovery_check: false,
        }
    }

    pub fn spike() -> Self {
        Self {
            kind: ScenarioKind::Spike,
            stages: vec![
                secs(30, 10),
                secs(10, 100),
                secs(60, 100),
                secs(10, 10),
                secs(30, 10),
                secs(10, 150),
                secs(60, 150),
                secs(10, 10),
                secs(60, 10),
                secs(10, 0),
            ],
            latency: vec![
                p95(Selector::All, 3000.0),
                p95(Selector::Name("list_portfolios"), 2000.0),
            ],
            max_failure_rate: 0.1,
            require_healthy: false,
            require_auth: false,
            recovery_check: true,
        }
    }

    pub fn soak() -> Self {
        Self {
            kind: ScenarioKind::Soak,
            stages: vec![secs(120, 10), secs(120, 20), secs(26 * 60, 20), secs(120, 0)],
            latency: vec![
                p95(Selector::All, 800.0),
                p99(Selector::All, 1500.0),
                p95(Selector::Name("list_portfolios"), 500.0),
                p95(Selector::Name("get_portfolio"), 600.0),
                p95(Selector::Name("create_portfolio"), 800.0),
                p95(Selector::Phase("early"), 600.0),
                p95(Selector::Phase("late"), 800.0),
            ],
            max_failure_rate: 0.02,
            require_healthy: true,
            require_auth: true,
            recovery_check: true,
        }
    }

    pub fn total_duration(&self) -> Duration {
        self.stages.iter().map(|s| s.duration).sum()
    }

    /// Desired number of VUs `elapsed` into the run, starting from zero.
    pub fn target_at(&self, elapsed: Duration) -> u32 {
        let mut from = 0u32;
        let mut start = Duration::ZERO;
        for stage in &self.stages {
            let end = start + stage.duration;
            if elapsed < end {
                if stage.duration.is_zero() {
                    return stage.target;
                }
                let progress = (elapsed - start).as_secs_f64() / stage.duration.as_secs_f64();
                let value = from as f64 + (stage.target as f64 - from as f64) * progress;
                return value.round() as u32;
            }
            from = stage.target;
            start = end;
        }
        0
    }

    /// Soak runs compare the first half against the second.
    pub fn phase_at(&self, elapsed: Duration) -> Option<&'static str> {
        if self.kind != ScenarioKind::Soak {
            return None;
        }
        Some(if elapsed < Duration::from_secs(15 * 60) {
            "early"
        } else {
            "late"
        })
    }
}
