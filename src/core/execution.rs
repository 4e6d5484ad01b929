// src/core/execution.rs: Setup and solve stages with stage-level retry
//
// Stages never return Err. A remote-reported failure and a failed request both
// come back as a StageResult with zero elapsed time and a prefixed message.

use tokio::time::Instant;

use crate::simulator::{CaseAction, Simulator};

use super::backoff::{pause, Pacing};
use super::types::{CaseSession, CaseState};

/// Elapsed wall-clock time of a stage, or why it failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageResult {
    pub elapsed_ms: u64,
    pub error: Option<String>,
}

impl StageResult {
    fn ok(elapsed_ms: u64) -> Self {
        Self {
            elapsed_ms,
            error: None,
        }
    }

    fn failed(error: String) -> Self {
        Self {
            elapsed_ms: 0,
            error: Some(error),
        }
    }
}

/// Run setup, cleaning and retrying up to `retries` more times on failure.
/// The elapsed time is that of the attempt that succeeded.
pub async fn setup(
    sim: &dyn Simulator,
    case: &mut CaseSession,
    retries: u32,
    pacing: &Pacing,
) -> StageResult {
    let mut remaining = retries;
    let mut needs_clean = false;

    loop {
        if needs_clean {
            clean(sim, case).await;
            pause(pacing.setup_clean).await;
        }

        let start = Instant::now();
        let reply = sim.case_action(&case.name, CaseAction::Setup).await;
        let elapsed_ms = start.elapsed().as_millis() as u64;

        let message = match reply {
            Ok(None) => {
                case.state = CaseState::SetupSucceeded;
                tracing::info!(case = %case.name, elapsed_ms, "setup finished");
                return StageResult::ok(elapsed_ms);
            }
            Ok(Some(message)) => message,
            Err(e) => {
                tracing::error!(case = %case.name, "setup request failed: {e}");
                e.remote_message()
            }
        };

        if remaining == 0 {
            case.state = CaseState::SetupFailed;
            return StageResult::failed(format!("Setup: {message}"));
        }
        remaining -= 1;
        needs_clean = true;
        tracing::warn!(
            case = %case.name,
            retries_left = remaining,
            "setup failed, cleaning and retrying: {message}"
        );
    }
}

/// Run the solver once and time it.
pub async fn solve(sim: &dyn Simulator, case: &mut CaseSession) -> StageResult {
    let start = Instant::now();
    let reply = sim.case_action(&case.name, CaseAction::Run).await;
    let elapsed_ms = start.elapsed().as_millis() as u64;

    match reply {
        Ok(None) => {
            case.state = CaseState::Solved;
            tracing::info!(case = %case.name, elapsed_ms, "solve finished");
            StageResult::ok(elapsed_ms)
        }
        Ok(Some(message)) => {
            case.state = CaseState::SolveFailed;
            StageResult::failed(format!("Solver: {message}"))
        }
        Err(e) => {
            tracing::error!(case = %case.name, "solve request failed: {e}");
            case.state = CaseState::SolveFailed;
            StageResult::failed(format!("Solver: {}", e.remote_message()))
        }
    }
}

async fn clean(sim: &dyn Simulator, case: &CaseSession) {
    match sim.case_action(&case.name, CaseAction::Clean).await {
        Ok(None) => {}
        Ok(Some(message)) => tracing::warn!(case = %case.name, "clean reported: {message}"),
        Err(e) => tracing::warn!(case = %case.name, "clean request failed: {e}"),
    }
}
