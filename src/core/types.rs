// src/core/types.rs: Core types for the sweep

use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Solve time above which a phyng count is considered a plateau.
pub const SOLVE_PLATEAU_MS: u64 = 60_000;

/// The fixed set of actuator types a sweep can grow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActuatorKind {
    Heaters,
    Acs,
    Windows,
    Doors,
}

impl ActuatorKind {
    pub const ALL: [ActuatorKind; 4] = [
        ActuatorKind::Heaters,
        ActuatorKind::Acs,
        ActuatorKind::Windows,
        ActuatorKind::Doors,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ActuatorKind::Heaters => "heaters",
            ActuatorKind::Acs => "acs",
            ActuatorKind::Windows => "windows",
            ActuatorKind::Doors => "doors",
        }
    }

    /// Initial used in case names (`m10c1phh3`).
    pub fn initial(self) -> char {
        match self {
            ActuatorKind::Heaters => 'h',
            ActuatorKind::Acs => 'a',
            ActuatorKind::Windows => 'w',
            ActuatorKind::Doors => 'd',
        }
    }

    /// Phyng type name understood by the simulator.
    pub fn phyng_type(self) -> &'static str {
        match self {
            ActuatorKind::Heaters => "heater",
            ActuatorKind::Acs => "ac",
            ActuatorKind::Windows => "window",
            ActuatorKind::Doors => "door",
        }
    }
}

impl fmt::Display for ActuatorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ActuatorKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "heaters" | "heater" => Ok(ActuatorKind::Heaters),
            "acs" | "ac" => Ok(ActuatorKind::Acs),
            "windows" | "window" => Ok(ActuatorKind::Windows),
            "doors" | "door" => Ok(ActuatorKind::Doors),
            other => Err(format!("unknown actuator type '{other}'")),
        }
    }
}

/// What a result row measured: one actuator type, or every enabled type in one case.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrialKind {
    Single(ActuatorKind),
    All,
}

impl fmt::Display for TrialKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrialKind::Single(kind) => kind.fmt(f),
            TrialKind::All => f.write_str("all"),
        }
    }
}

/// Lifecycle of a remote case as seen by the driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaseState {
    Created,
    Populated,
    SetupSucceeded,
    SetupFailed,
    Solved,
    SolveFailed,
}

/// Local handle to a case resource on the simulator.
#[derive(Debug, Clone)]
pub struct CaseSession {
    pub name: String,
    pub mesh_quality: u32,
    pub cores: u32,
    pub parallel: bool,
    pub phyngs: BTreeSet<String>,
    /// Number of phyngs added under test (baseline phyngs excluded).
    pub evaluated: u32,
    /// Configuration problems that did not abort the trial.
    pub notes: Vec<String>,
    pub state: CaseState,
}

impl CaseSession {
    pub fn new(name: impl Into<String>, mesh_quality: u32, cores: u32) -> Self {
        Self {
            name: name.into(),
            mesh_quality,
            cores,
            parallel: cores > 1,
            phyngs: BTreeSet::new(),
            evaluated: 0,
            notes: Vec::new(),
            state: CaseState::Created,
        }
    }

    pub fn has_phyng(&self, name: &str) -> bool {
        self.phyngs.contains(name)
    }
}

/// One persisted measurement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EvaluationOutcome {
    pub case_name: String,
    pub cores: u32,
    pub mesh_quality: u32,
    pub kind: String,
    pub amount: u32,
    pub setup_ms: u64,
    pub solve_ms: u64,
    /// Empty on success.
    pub error: String,
}

impl EvaluationOutcome {
    pub fn is_success(&self) -> bool {
        self.error.is_empty()
    }
}

/// Smallest phyng count per (type, mesh) whose solve exceeded the plateau threshold.
#[derive(Debug, Clone, Default)]
pub struct PlateauTable {
    entries: HashMap<(ActuatorKind, u32), u32>,
}

impl PlateauTable {
    pub fn threshold(&self, kind: ActuatorKind, mesh: u32) -> Option<u32> {
        self.entries.get(&(kind, mesh)).copied()
    }

    /// True when `count` is at or beyond the recorded plateau for (kind, mesh).
    pub fn blocks(&self, kind: ActuatorKind, mesh: u32, count: u32) -> bool {
        self.threshold(kind, mesh).is_some_and(|t| count >= t)
    }

    /// Records a plateau, keeping the smallest count seen.
    pub fn record(&mut self, kind: ActuatorKind, mesh: u32, count: u32) {
        self.entries
            .entry((kind, mesh))
            .and_modify(|t| *t = (*t).min(count))
            .or_insert(count);
    }
}

/// Counters reported at the end of a run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepSummary {
    pub trials: u32,
    pub failures: u32,
    pub retries: u32,
    pub plateaus: u32,
    pub skipped: u32,
}

impl SweepSummary {
    pub fn record(&mut self, outcome: &EvaluationOutcome) {
        self.trials += 1;
        if !outcome.is_success() {
            self.failures += 1;
        }
    }
}

/// State carried across the whole sweep, owned by one run.
#[derive(Debug, Default)]
pub struct SweepState {
    pub plateaus: PlateauTable,
    pub open_case: Option<CaseSession>,
    pub summary: SweepSummary,
}
