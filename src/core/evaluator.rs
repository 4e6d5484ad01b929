// src/core/evaluator.rs: Phyng-count evaluator
//
// For one (mesh, cores, type) cell, grows the phyng count, owns the case
// lifecycle for each trial, retries whole trials and prunes on plateaus.

use tracing::Instrument;

use crate::infra::config::Config;
use crate::infra::errors::SweepError;
use crate::simulator::Simulator;

use super::backoff::{pause, Pacing, RetryConfig};
use super::execution;
use super::plan::{self, CountMode};
use super::session::SessionBuilder;
use super::sink::ResultSink;
use super::types::{
    ActuatorKind, CaseSession, EvaluationOutcome, SweepState, TrialKind, SOLVE_PLATEAU_MS,
};

/// How one attempt at a trial ended.
enum Attempt {
    Completed(EvaluationOutcome),
    /// Worth another attempt with a fresh case.
    Failed(EvaluationOutcome),
    /// The service refused the case or a phyng; a rebuild would get the same answer.
    Rejected(EvaluationOutcome),
}

impl Attempt {
    /// A session-build failure, retried only when the error may clear up.
    fn build_failed(error: &SweepError, outcome: EvaluationOutcome) -> Self {
        if error.is_transient() {
            Attempt::Failed(outcome)
        } else {
            Attempt::Rejected(outcome)
        }
    }
}

/// Identifies a single trial: one phyng count in one cell.
#[derive(Debug, Clone)]
struct Trial {
    case_name: String,
    mesh: u32,
    cores: u32,
    kind: ActuatorKind,
    amount: u32,
}

impl Trial {
    fn outcome(&self, setup_ms: u64, solve_ms: u64, error: String) -> EvaluationOutcome {
        EvaluationOutcome {
            case_name: self.case_name.clone(),
            cores: self.cores,
            mesh_quality: self.mesh,
            kind: TrialKind::Single(self.kind).to_string(),
            amount: self.amount,
            setup_ms,
            solve_ms,
            error,
        }
    }
}

/// Joins configuration notes collected on the case with the stage error, if any.
fn error_text(case: &CaseSession, error: Option<String>) -> String {
    case.notes
        .iter()
        .cloned()
        .chain(error)
        .collect::<Vec<_>>()
        .join("; ")
}

pub struct Evaluator<'a> {
    sim: &'a dyn Simulator,
    config: &'a Config,
    pacing: Pacing,
    retry: RetryConfig,
    mode: CountMode,
}

impl<'a> Evaluator<'a> {
    pub fn new(sim: &'a dyn Simulator, config: &'a Config) -> Self {
        Self {
            sim,
            config,
            pacing: Pacing::from_config(&config.pacing),
            retry: RetryConfig::from_pacing(&config.pacing),
            mode: CountMode::from_flags(config.sweep.take_most, config.sweep.take_least),
        }
    }

    fn builder(&self) -> SessionBuilder<'_> {
        SessionBuilder::new(self.sim, self.config, &self.pacing)
    }

    /// Phyng counts this evaluator would try for `kind`, before plateau pruning.
    pub fn candidates(&self, kind: ActuatorKind) -> Vec<u32> {
        plan::kind_counts(self.config, kind, self.mode)
    }

    /// Evaluate every candidate count of `kind` at (mesh, cores).
    ///
    /// With `external` set, the phyngs are only added to that case: nothing is
    /// measured, retried or recorded, and the caller owns the case.
    ///
    /// Remote failures never surface as `Err`; they end up in outcome rows. The
    /// only error returned is a failing result sink.
    pub async fn evaluate(
        &self,
        state: &mut SweepState,
        sink: &mut dyn ResultSink,
        mesh: u32,
        cores: u32,
        kind: ActuatorKind,
        external: Option<&mut CaseSession>,
    ) -> Result<(), SweepError> {
        if let Some(case) = external {
            self.populate(state, case, mesh, kind).await;
            return Ok(());
        }

        let counts = self.candidates(kind);
        for (i, &count) in counts.iter().enumerate() {
            if state.plateaus.blocks(kind, mesh, count) {
                tracing::info!(
                    mesh,
                    cores,
                    %kind,
                    amount = count,
                    "plateau already reached, skipping remaining counts"
                );
                state.summary.skipped += (counts.len() - i) as u32;
                return Ok(());
            }

            let trial = Trial {
                case_name: plan::case_name(mesh, cores, kind, count),
                mesh,
                cores,
                kind,
                amount: count,
            };
            let span = tracing::info_span!(
                "trial",
                case = %trial.case_name,
                mesh,
                cores,
                %kind,
                amount = count
            );
            let outcome = self.run_trial(state, &trial).instrument(span).await;

            let recorded = sink.record(&outcome);
            state.summary.record(&outcome);
            if let Some(case) = state.open_case.take() {
                self.builder().release(case).await;
            }
            recorded?;
            pause(self.pacing.after_outcome).await;

            if outcome.solve_ms > SOLVE_PLATEAU_MS {
                tracing::info!(
                    mesh,
                    %kind,
                    amount = count,
                    solve_ms = outcome.solve_ms,
                    "solve time plateau reached"
                );
                state.plateaus.record(kind, mesh, count);
                state.summary.plateaus += 1;
                state.summary.skipped += (counts.len() - i - 1) as u32;
                return Ok(());
            }
        }
        Ok(())
    }

    /// Run one trial, retrying the whole trial (fresh case, same count) while
    /// the retry budget lasts. The budget starts full for every trial.
    async fn run_trial(&self, state: &mut SweepState, trial: &Trial) -> EvaluationOutcome {
        let mut retries_left = self.config.sweep.retries;
        let mut attempt = 0;

        loop {
            match self.attempt(state, trial).await {
                Attempt::Completed(outcome) => {
                    tracing::info!(
                        case = %trial.case_name,
                        setup_ms = outcome.setup_ms,
                        solve_ms = outcome.solve_ms,
                        "trial finished"
                    );
                    return outcome;
                }
                Attempt::Failed(outcome) if retries_left > 0 => {
                    retries_left -= 1;
                    tracing::warn!(
                        case = %trial.case_name,
                        retries_left,
                        "trial failed, retrying: {}",
                        outcome.error
                    );
                    if let Some(case) = state.open_case.take() {
                        self.builder().release(case).await;
                    }
                    pause(self.retry.delay_for_attempt(attempt)).await;
                    attempt += 1;
                    state.summary.retries += 1;
                }
                Attempt::Failed(outcome) => {
                    tracing::warn!(
                        case = %trial.case_name,
                        "trial failed, recording error: {}",
                        outcome.error
                    );
                    return outcome;
                }
                Attempt::Rejected(outcome) => {
                    tracing::warn!(
                        case = %trial.case_name,
                        "trial rejected by the simulator, not retrying: {}",
                        outcome.error
                    );
                    return outcome;
                }
            }
        }
    }

    /// One pass through create, populate, setup and solve. The case is left
    /// open in `state` for the caller to release.
    async fn attempt(&self, state: &mut SweepState, trial: &Trial) -> Attempt {
        let builder = self.builder();

        let case = match state.open_case.take() {
            Some(case) => case,
            None => match builder
                .create_case(&trial.case_name, trial.mesh, trial.cores)
                .await
            {
                Ok(case) => case,
                Err(e) => {
                    let outcome = trial.outcome(0, 0, format!("Case: {e}"));
                    return Attempt::build_failed(&e, outcome);
                }
            },
        };
        let case = state.open_case.insert(case);

        if let Err(e) = builder.add_baseline(case, &[trial.kind]).await {
            let error = error_text(case, Some(format!("Case: {e}")));
            return Attempt::build_failed(&e, trial.outcome(0, 0, error));
        }
        if let Err(e) = builder.add_evaluated(case, trial.kind, trial.amount).await {
            let error = error_text(case, Some(format!("Case: {e}")));
            return Attempt::build_failed(&e, trial.outcome(0, 0, error));
        }

        let setup = execution::setup(
            self.sim,
            case,
            self.config.sweep.setup_retries,
            &self.pacing,
        )
        .await;
        if let Some(error) = setup.error {
            return Attempt::Failed(trial.outcome(0, 0, error_text(case, Some(error))));
        }

        let solve = execution::solve(self.sim, case).await;
        match solve.error {
            Some(error) => Attempt::Failed(trial.outcome(
                setup.elapsed_ms,
                0,
                error_text(case, Some(error)),
            )),
            None => Attempt::Completed(trial.outcome(
                setup.elapsed_ms,
                solve.elapsed_ms,
                error_text(case, None),
            )),
        }
    }

    /// Add the largest count of `kind` not past its plateau to a case owned by
    /// the caller. Failures are noted on the case, never retried.
    async fn populate(
        &self,
        state: &SweepState,
        case: &mut CaseSession,
        mesh: u32,
        kind: ActuatorKind,
    ) {
        let count = self
            .candidates(kind)
            .into_iter()
            .rev()
            .find(|c| !state.plateaus.blocks(kind, mesh, *c));
        let Some(count) = count else {
            tracing::info!(case = %case.name, %kind, "no feasible count to add");
            return;
        };

        if let Err(e) = self.builder().add_evaluated(case, kind, count).await {
            case.notes.push(format!("Case: {e}"));
        }
    }

    /// Put every enabled type into one case per (mesh, cores), then measure it
    /// once. Errors are recorded without retrying.
    pub async fn evaluate_combined(
        &self,
        state: &mut SweepState,
        sink: &mut dyn ResultSink,
        mesh: u32,
        cores: u32,
        kinds: &[ActuatorKind],
    ) -> Result<(), SweepError> {
        let builder = self.builder();
        let name = plan::combined_case_name(mesh, cores);
        let mut outcome = EvaluationOutcome {
            case_name: name.clone(),
            cores,
            mesh_quality: mesh,
            kind: TrialKind::All.to_string(),
            amount: 0,
            setup_ms: 0,
            solve_ms: 0,
            error: String::new(),
        };

        let mut case = match builder.create_case(&name, mesh, cores).await {
            Ok(case) => case,
            Err(e) => {
                outcome.error = format!("Case: {e}");
                sink.record(&outcome)?;
                state.summary.record(&outcome);
                return Ok(());
            }
        };

        let error = match builder.add_baseline(&mut case, kinds).await {
            Err(e) => Some(format!("Case: {e}")),
            Ok(()) => {
                for &kind in kinds {
                    self.evaluate(state, sink, mesh, cores, kind, Some(&mut case))
                        .await?;
                }
                self.measure(&mut case, &mut outcome).await
            }
        };

        outcome.amount = case.evaluated;
        outcome.error = error_text(&case, error);
        let recorded = sink.record(&outcome);
        state.summary.record(&outcome);
        builder.release(case).await;
        recorded?;
        pause(self.pacing.after_outcome).await;
        Ok(())
    }

    async fn measure(
        &self,
        case: &mut CaseSession,
        outcome: &mut EvaluationOutcome,
    ) -> Option<String> {
        let setup = execution::setup(
            self.sim,
            case,
            self.config.sweep.setup_retries,
            &self.pacing,
        )
        .await;
        if setup.error.is_some() {
            return setup.error;
        }
        outcome.setup_ms = setup.elapsed_ms;

        let solve = execution::solve(self.sim, case).await;
        outcome.solve_ms = solve.elapsed_ms;
        solve.error
    }
}
