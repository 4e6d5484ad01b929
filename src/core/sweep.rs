// src/core/sweep.rs: Sweep controller over mesh quality and core count

use std::sync::Arc;

use crate::infra::config::Config;
use crate::infra::errors::SweepError;
use crate::simulator::Simulator;

use super::evaluator::Evaluator;
use super::plan;
use super::sink::ResultSink;
use super::types::{SweepState, SweepSummary};

/// Drives the evaluator across every (mesh, cores, type) cell, one at a time.
pub struct Sweep {
    sim: Arc<dyn Simulator>,
    config: Config,
}

impl Sweep {
    pub fn new(sim: Arc<dyn Simulator>, config: Config) -> Self {
        Self { sim, config }
    }

    /// Run the whole sweep, writing one row per trial to `sink`.
    ///
    /// The configuration is validated before the first remote call. Remote
    /// failures are handled per trial and never stop the sweep; only a failing
    /// sink does.
    pub async fn run(&self, sink: &mut dyn ResultSink) -> Result<SweepSummary, SweepError> {
        self.config.validate()?;

        let sweep = &self.config.sweep;
        let kinds = self.config.actuators.enabled();
        tracing::info!(
            kinds = ?kinds,
            mesh = ?(sweep.start_mesh, sweep.max_mesh, sweep.mesh_step),
            cores = ?(sweep.start_cores, sweep.max_cores, sweep.cores_step),
            "starting sweep"
        );

        if sweep.clean_stale {
            match clean_stale_cases(self.sim.as_ref()).await {
                Ok(0) => {}
                Ok(removed) => tracing::info!(removed, "removed stale cases"),
                Err(e) => tracing::warn!("could not clear stale cases: {e}"),
            }
        }

        let evaluator = Evaluator::new(self.sim.as_ref(), &self.config);
        let mut state = SweepState::default();

        for mesh in plan::mesh_values(sweep.start_mesh, sweep.max_mesh, sweep.mesh_step) {
            for cores in plan::core_values(sweep.start_cores, sweep.max_cores, sweep.cores_step) {
                tracing::info!(mesh, cores, "sweeping cell");

                if sweep.all_in_one {
                    evaluator
                        .evaluate_combined(&mut state, sink, mesh, cores, &kinds)
                        .await?;
                    continue;
                }

                for &kind in &kinds {
                    evaluator
                        .evaluate(&mut state, sink, mesh, cores, kind, None)
                        .await?;
                }
            }
        }

        let summary = state.summary;
        tracing::info!(
            trials = summary.trials,
            failures = summary.failures,
            retries = summary.retries,
            plateaus = summary.plateaus,
            skipped = summary.skipped,
            "sweep finished"
        );
        Ok(summary)
    }
}

/// Delete every case the simulator knows about. Returns how many were removed.
pub async fn clean_stale_cases(sim: &dyn Simulator) -> Result<usize, SweepError> {
    let cases = sim.list_cases().await?;
    let mut removed = 0;
    for case in &cases {
        match sim.delete_case(case).await {
            Ok(()) => removed += 1,
            Err(e) => tracing::warn!(case = %case, "failed to delete stale case: {e}"),
        }
    }
    Ok(removed)
}
