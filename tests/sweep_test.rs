// tests/sweep_test.rs: End-to-end sweep behaviour against a scripted simulator

use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use pretty_assertions::assert_eq;

use wopbench::core::sink::{MemorySink, ResultSink};
use wopbench::core::sweep::Sweep;
use wopbench::core::types::EvaluationOutcome;
use wopbench::infra::config::{Config, PacingConfig};
use wopbench::infra::errors::SweepError;
use wopbench::simulator::{
    CaseAction, CaseSpec, PhyngAction, PhyngProperty, PhyngSpec, PropertyValue, Simulator,
};

// ---------- Scripted simulator ----------

#[derive(Default)]
struct Script {
    /// Remaining inline setup failures per case name.
    setup_failures: HashMap<String, u32>,
    /// Remaining inline solver failures per case name.
    solve_failures: HashMap<String, u32>,
    setup_ms: HashMap<String, u64>,
    solve_ms: HashMap<String, u64>,
    /// Remaining create failures per case name, with the HTTP status returned.
    create_failures: HashMap<String, (u16, u32)>,
    /// Phyngs whose property writes are rejected.
    broken_phyngs: HashSet<String>,
    stale: Vec<String>,
}

#[derive(Default)]
struct FakeSimulator {
    script: Mutex<Script>,
    calls: Mutex<Vec<String>>,
    open: Mutex<BTreeSet<String>>,
    phyngs: Mutex<HashMap<String, Vec<String>>>,
    max_open: Mutex<usize>,
}

impl FakeSimulator {
    fn new(script: Script) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script),
            ..Default::default()
        })
    }

    fn log(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }

    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn count(&self, call: &str) -> usize {
        self.calls().iter().filter(|c| *c == call).count()
    }

    fn phyngs_of(&self, case: &str) -> Vec<String> {
        self.phyngs
            .lock()
            .unwrap()
            .get(case)
            .cloned()
            .unwrap_or_default()
    }

    fn max_open(&self) -> usize {
        *self.max_open.lock().unwrap()
    }

    fn take_failure(map: &mut HashMap<String, u32>, case: &str) -> bool {
        match map.get_mut(case) {
            Some(n) if *n > 0 => {
                *n -= 1;
                true
            }
            _ => false,
        }
    }
}

#[async_trait]
impl Simulator for FakeSimulator {
    async fn list_cases(&self) -> Result<Vec<String>, SweepError> {
        self.log("list".into());
        Ok(self.script.lock().unwrap().stale.clone())
    }

    async fn create_case(&self, spec: &CaseSpec) -> Result<(), SweepError> {
        self.log(format!("create {}", spec.name));
        let refused = {
            let mut script = self.script.lock().unwrap();
            match script.create_failures.get_mut(&spec.name) {
                Some((status, left)) if *left > 0 => {
                    *left -= 1;
                    Some(*status)
                }
                _ => None,
            }
        };
        if let Some(status) = refused {
            return Err(SweepError::Remote {
                operation: "create case".into(),
                status,
                message: "case rejected".into(),
            });
        }
        let mut open = self.open.lock().unwrap();
        open.insert(spec.name.clone());
        let mut max = self.max_open.lock().unwrap();
        *max = (*max).max(open.len());
        self.phyngs.lock().unwrap().insert(spec.name.clone(), Vec::new());
        Ok(())
    }

    async fn delete_case(&self, case: &str) -> Result<(), SweepError> {
        self.log(format!("delete {case}"));
        self.open.lock().unwrap().remove(case);
        Ok(())
    }

    async fn add_phyng(&self, case: &str, spec: &PhyngSpec) -> Result<(), SweepError> {
        self.log(format!("add {case} {}", spec.name));
        self.phyngs
            .lock()
            .unwrap()
            .entry(case.to_string())
            .or_default()
            .push(spec.name.clone());
        Ok(())
    }

    async fn write_property(
        &self,
        case: &str,
        phyng: &str,
        property: PhyngProperty,
        _value: &PropertyValue,
    ) -> Result<(), SweepError> {
        self.log(format!("write {case} {phyng} {}", property.as_str()));
        if self.script.lock().unwrap().broken_phyngs.contains(phyng) {
            return Err(SweepError::Remote {
                operation: "write".into(),
                status: 500,
                message: "snappyHexMesh failed".into(),
            });
        }
        Ok(())
    }

    async fn phyng_action(
        &self,
        case: &str,
        phyng: &str,
        action: PhyngAction,
    ) -> Result<(), SweepError> {
        self.log(format!("action {case} {phyng} {action}"));
        Ok(())
    }

    async fn case_action(
        &self,
        case: &str,
        action: CaseAction,
    ) -> Result<Option<String>, SweepError> {
        self.log(format!("{} {case}", action.command()));
        let (fail, delay) = {
            let mut script = self.script.lock().unwrap();
            match action {
                CaseAction::Setup => (
                    Self::take_failure(&mut script.setup_failures, case),
                    script.setup_ms.get(case).copied().unwrap_or(0),
                ),
                CaseAction::Run => (
                    Self::take_failure(&mut script.solve_failures, case),
                    script.solve_ms.get(case).copied().unwrap_or(0),
                ),
                CaseAction::Clean | CaseAction::Stop => (false, 0),
            }
        };
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }
        if fail {
            let message = match action {
                CaseAction::Run => "solver diverged",
                _ => "blockMesh failed",
            };
            return Ok(Some(message.into()));
        }
        Ok(None)
    }
}

struct FailingSink;

impl ResultSink for FailingSink {
    fn record(&mut self, _outcome: &EvaluationOutcome) -> Result<(), SweepError> {
        Err(SweepError::Sink("disk full".into()))
    }
}

// ---------- Helpers ----------

/// mesh 10 only, cores 1 only, no pacing, no stale cleanup, nothing enabled.
fn base_config() -> Config {
    let mut config = Config::default();
    config.sweep.start_mesh = 10;
    config.sweep.max_mesh = 10;
    config.sweep.mesh_step = 10;
    config.sweep.start_cores = 1;
    config.sweep.max_cores = 1;
    config.sweep.clean_stale = false;
    config.pacing = PacingConfig::none();
    config
}

fn names(rows: &[EvaluationOutcome]) -> Vec<&str> {
    rows.iter().map(|r| r.case_name.as_str()).collect()
}

async fn run(sim: &Arc<FakeSimulator>, config: Config) -> (MemorySink, Result<(), SweepError>) {
    let sweep = Sweep::new(sim.clone(), config);
    let mut sink = MemorySink::default();
    let result = sweep.run(&mut sink).await.map(|_| ());
    (sink, result)
}

// ---------- Sweep scenarios ----------

#[tokio::test(start_paused = true)]
async fn test_heaters_grow_one_to_target() {
    let sim = FakeSimulator::new(Script::default());
    let mut config = base_config();
    config.actuators.heaters.target = 3;

    let (sink, result) = run(&sim, config).await;
    result.unwrap();

    assert_eq!(names(&sink.rows), vec!["m10c1phh1", "m10c1phh2", "m10c1phh3"]);
    let amounts: Vec<u32> = sink.rows.iter().map(|r| r.amount).collect();
    assert_eq!(amounts, vec![1, 2, 3]);
    assert!(sink.rows.iter().all(|r| r.is_success()));
    assert!(sink.rows.iter().all(|r| r.kind == "heaters" && r.mesh_quality == 10 && r.cores == 1));
    assert_eq!(sim.max_open(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_setup_recovers_within_budget() {
    let mut script = Script::default();
    script.setup_failures.insert("m10c1phh1".into(), 2);
    script.setup_ms.insert("m10c1phh1".into(), 500);
    let sim = FakeSimulator::new(script);

    let mut config = base_config();
    config.actuators.heaters.target = 1;
    config.sweep.setup_retries = 2;

    let (sink, result) = run(&sim, config).await;
    result.unwrap();

    assert_eq!(sink.rows.len(), 1);
    let row = &sink.rows[0];
    assert_eq!(row.error, "");
    // Elapsed time of the third attempt only.
    assert!((500..=501).contains(&row.setup_ms), "setup_ms = {}", row.setup_ms);
    assert_eq!(sim.count("setup m10c1phh1"), 3);
    assert_eq!(sim.count("clean m10c1phh1"), 2);
    // Stage-level recovery does not rebuild the case.
    assert_eq!(sim.count("create m10c1phh1"), 1);
}

#[tokio::test(start_paused = true)]
async fn test_solve_plateau_prunes_larger_counts() {
    let mut script = Script::default();
    script.solve_ms.insert("m20c1pha1".into(), 20_000);
    script.solve_ms.insert("m20c1pha2".into(), 61_000);
    script.solve_ms.insert("m20c2pha1".into(), 10_000);
    let sim = FakeSimulator::new(script);

    let mut config = base_config();
    config.sweep.start_mesh = 20;
    config.sweep.max_mesh = 20;
    config.sweep.start_cores = 0;
    config.sweep.max_cores = 2;
    config.sweep.cores_step = 2;
    config.actuators.acs.target = 3;

    let sweep = Sweep::new(sim.clone(), config);
    let mut sink = MemorySink::default();
    let summary = sweep.run(&mut sink).await.unwrap();

    // Amount 2 is recorded, amount 3 never attempted, and the plateau holds
    // for the next core count at the same mesh.
    assert_eq!(names(&sink.rows), vec!["m20c1pha1", "m20c1pha2", "m20c2pha1"]);
    assert!(sink.rows[1].solve_ms > 60_000);
    assert_eq!(sim.count("create m20c1pha3"), 0);
    assert_eq!(sim.count("create m20c2pha2"), 0);
    assert_eq!(summary.plateaus, 1);
    assert_eq!(summary.skipped, 3);
    assert_eq!(summary.trials, 3);
}

#[tokio::test(start_paused = true)]
async fn test_retry_keeps_count_and_budget_resets_per_count() {
    let mut script = Script::default();
    script.solve_failures.insert("m10c1phh1".into(), 10);
    script.solve_failures.insert("m10c1phh2".into(), 1);
    let sim = FakeSimulator::new(script);

    let mut config = base_config();
    config.actuators.heaters.target = 2;
    config.sweep.retries = 2;

    let sweep = Sweep::new(sim.clone(), config);
    let mut sink = MemorySink::default();
    let summary = sweep.run(&mut sink).await.unwrap();

    // One row per trial, regardless of how many attempts it took.
    assert_eq!(names(&sink.rows), vec!["m10c1phh1", "m10c1phh2"]);
    assert_eq!(sink.rows[0].error, "Solver: solver diverged");
    assert_eq!(sink.rows[0].amount, 1);
    assert!(sink.rows[1].is_success());

    assert_eq!(sim.count("create m10c1phh1"), 3);
    assert_eq!(sim.count("create m10c1phh2"), 2);
    assert_eq!(sim.count("delete m10c1phh1"), 3);
    assert_eq!(summary.retries, 3);
    assert_eq!(summary.failures, 1);
    assert_eq!(sim.max_open(), 1);

    // The failed case is gone before its replacement is created.
    let calls = sim.calls();
    let first_delete = calls.iter().position(|c| c == "delete m10c1phh1").unwrap();
    let second_create = calls
        .iter()
        .enumerate()
        .filter(|(_, c)| *c == "create m10c1phh1")
        .nth(1)
        .map(|(i, _)| i)
        .unwrap();
    assert!(first_delete < second_create);
}

#[tokio::test(start_paused = true)]
async fn test_zero_retry_budget_records_first_failure() {
    let mut script = Script::default();
    script.setup_failures.insert("m10c1phw1".into(), 10);
    let sim = FakeSimulator::new(script);

    let mut config = base_config();
    config.actuators.windows.target = 1;
    config.sweep.retries = 0;
    config.sweep.setup_retries = 0;

    let (sink, result) = run(&sim, config).await;
    result.unwrap();

    assert_eq!(sink.rows.len(), 1);
    assert_eq!(sink.rows[0].error, "Setup: blockMesh failed");
    assert_eq!(sink.rows[0].setup_ms, 0);
    assert_eq!(sink.rows[0].solve_ms, 0);
    assert_eq!(sim.count("create m10c1phw1"), 1);
    assert_eq!(sim.count("run m10c1phw1"), 0);
}

#[tokio::test(start_paused = true)]
async fn test_baselines_per_type() {
    let sim = FakeSimulator::new(Script::default());
    let mut config = base_config();
    config.actuators.heaters.target = 1;
    config.actuators.doors.target = 1;

    let (sink, result) = run(&sim, config).await;
    result.unwrap();
    assert_eq!(names(&sink.rows), vec!["m10c1phh1", "m10c1phd1"]);

    assert_eq!(sim.phyngs_of("m10c1phh1"), vec!["walls", "heater0"]);
    assert_eq!(
        sim.phyngs_of("m10c1phd1"),
        vec!["walls", "base_heater", "base_window", "door0"]
    );

    let calls = sim.calls();
    assert!(calls.contains(&"action m10c1phd1 base_window open".to_string()));
    assert!(calls.contains(&"action m10c1phd1 door0 open".to_string()));
    assert!(calls.contains(&"write m10c1phd1 door0 velocity".to_string()));
}

#[tokio::test(start_paused = true)]
async fn test_configuration_failure_is_noted_not_retried() {
    let mut script = Script::default();
    script.broken_phyngs.insert("ac0".into());
    let sim = FakeSimulator::new(script);

    let mut config = base_config();
    config.actuators.acs.target = 1;
    config.sweep.retries = 2;

    let (sink, result) = run(&sim, config).await;
    result.unwrap();

    assert_eq!(sink.rows.len(), 1);
    assert_eq!(
        sink.rows[0].error,
        "Surface was not produced for ac0: snappyHexMesh failed"
    );
    assert_eq!(sim.count("create m10c1pha1"), 1);
    assert_eq!(sim.count("run m10c1pha1"), 1);
}

#[tokio::test(start_paused = true)]
async fn test_take_most_runs_single_largest_count() {
    let sim = FakeSimulator::new(Script::default());
    let mut config = base_config();
    // 3 m wall, 0.8 m pitch per door: only 3 fit.
    config.actuators.doors.target = 5;
    config.sweep.take_most = true;

    let (sink, result) = run(&sim, config).await;
    result.unwrap();

    assert_eq!(names(&sink.rows), vec!["m10c1phd3"]);
    assert_eq!(sink.rows[0].amount, 3);
}

#[tokio::test(start_paused = true)]
async fn test_all_in_one_builds_one_case_per_cell() {
    let sim = FakeSimulator::new(Script::default());
    let mut config = base_config();
    config.actuators.heaters.target = 2;
    config.actuators.doors.target = 1;
    config.sweep.all_in_one = true;

    let (sink, result) = run(&sim, config).await;
    result.unwrap();

    assert_eq!(names(&sink.rows), vec!["m10c1all"]);
    assert_eq!(sink.rows[0].kind, "all");
    assert_eq!(sink.rows[0].amount, 3);
    assert!(sink.rows[0].is_success());
    assert_eq!(
        sim.phyngs_of("m10c1all"),
        vec!["walls", "base_window", "heater0", "heater1", "door0"]
    );
    assert_eq!(sim.count("create m10c1all"), 1);
    assert_eq!(sim.count("delete m10c1all"), 1);
}

#[tokio::test(start_paused = true)]
async fn test_all_in_one_failure_not_retried() {
    let mut script = Script::default();
    script.solve_failures.insert("m10c1all".into(), 1);
    let sim = FakeSimulator::new(script);

    let mut config = base_config();
    config.actuators.windows.target = 1;
    config.sweep.all_in_one = true;
    config.sweep.retries = 3;

    let (sink, result) = run(&sim, config).await;
    result.unwrap();

    assert_eq!(sink.rows.len(), 1);
    assert_eq!(sink.rows[0].error, "Solver: solver diverged");
    assert_eq!(sim.count("create m10c1all"), 1);
}

#[tokio::test(start_paused = true)]
async fn test_sweeps_every_cell_in_order() {
    let sim = FakeSimulator::new(Script::default());
    let mut config = base_config();
    config.sweep.start_mesh = 15;
    config.sweep.max_mesh = 30;
    config.sweep.start_cores = 0;
    config.sweep.max_cores = 4;
    config.sweep.cores_step = 2;
    config.actuators.windows.target = 1;

    let (sink, result) = run(&sim, config).await;
    result.unwrap();

    assert_eq!(
        names(&sink.rows),
        vec![
            "m15c1phw1", "m15c2phw1", "m15c4phw1", "m20c1phw1", "m20c2phw1", "m20c4phw1",
            "m30c1phw1", "m30c2phw1", "m30c4phw1",
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn test_rejects_empty_selection_without_remote_calls() {
    let sim = FakeSimulator::new(Script::default());
    let (sink, result) = run(&sim, base_config()).await;

    assert!(matches!(result, Err(SweepError::NoActuatorSelected)));
    assert!(sink.rows.is_empty());
    assert!(sim.calls().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_stale_cases_removed_first() {
    let script = Script {
        stale: vec!["leftover".into()],
        ..Default::default()
    };
    let sim = FakeSimulator::new(script);
    let mut config = base_config();
    config.sweep.clean_stale = true;
    config.actuators.heaters.target = 1;

    let (_, result) = run(&sim, config).await;
    result.unwrap();

    let calls = sim.calls();
    assert_eq!(&calls[..3], &["list", "delete leftover", "create m10c1phh1"]);
}

#[tokio::test(start_paused = true)]
async fn test_sink_failure_aborts_and_releases_case() {
    let sim = FakeSimulator::new(Script::default());
    let mut config = base_config();
    config.actuators.heaters.target = 3;

    let sweep = Sweep::new(sim.clone(), config);
    let err = sweep.run(&mut FailingSink).await.unwrap_err();

    assert!(matches!(err, SweepError::Sink(_)));
    assert_eq!(sim.count("create m10c1phh1"), 1);
    assert_eq!(sim.count("delete m10c1phh1"), 1);
    assert_eq!(sim.count("create m10c1phh2"), 0);
}

#[tokio::test(start_paused = true)]
async fn test_pacing_spaces_remote_calls() {
    let sim = FakeSimulator::new(Script::default());
    let mut config = base_config();
    config.pacing = PacingConfig::default();
    config.actuators.heaters.target = 1;

    let start = tokio::time::Instant::now();
    let (_, result) = run(&sim, config).await;
    result.unwrap();

    // create (1000) + walls and heater0 (2 x 500) + temperature write (100) + outcome (3000)
    assert!(start.elapsed() >= Duration::from_millis(5100));
}

#[tokio::test(start_paused = true)]
async fn test_rejected_case_is_not_rebuilt() {
    let mut script = Script::default();
    script.create_failures.insert("m10c1phh1".into(), (409, 10));
    let sim = FakeSimulator::new(script);

    let mut config = base_config();
    config.actuators.heaters.target = 2;
    config.sweep.retries = 3;

    let sweep = Sweep::new(sim.clone(), config);
    let mut sink = MemorySink::default();
    let summary = sweep.run(&mut sink).await.unwrap();

    assert_eq!(names(&sink.rows), vec!["m10c1phh1", "m10c1phh2"]);
    assert!(sink.rows[0].error.starts_with("Case: "));
    assert!(sink.rows[0].error.contains("case rejected"));
    assert_eq!(sim.count("create m10c1phh1"), 1);
    assert_eq!(summary.retries, 0);
    assert!(sink.rows[1].is_success());
}

#[tokio::test(start_paused = true)]
async fn test_server_error_on_create_is_retried() {
    let mut script = Script::default();
    script.create_failures.insert("m10c1phh1".into(), (503, 1));
    let sim = FakeSimulator::new(script);

    let mut config = base_config();
    config.actuators.heaters.target = 1;
    config.sweep.retries = 2;

    let sweep = Sweep::new(sim.clone(), config);
    let mut sink = MemorySink::default();
    let summary = sweep.run(&mut sink).await.unwrap();

    assert_eq!(sink.rows.len(), 1);
    assert!(sink.rows[0].is_success());
    assert_eq!(sim.count("create m10c1phh1"), 2);
    assert_eq!(summary.retries, 1);
}
