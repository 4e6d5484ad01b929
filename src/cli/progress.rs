// src/cli/progress.rs: Per-trial progress lines on stderr

use crate::core::sink::ResultSink;
use crate::core::types::EvaluationOutcome;
use crate::infra::errors::SweepError;

/// Wraps another sink and echoes every recorded outcome to stderr, so stdout
/// stays free for the summary.
pub struct ProgressSink<S> {
    inner: S,
    quiet: bool,
    count: u32,
}

impl<S: ResultSink> ProgressSink<S> {
    pub fn new(inner: S, quiet: bool) -> Self {
        Self {
            inner,
            quiet,
            count: 0,
        }
    }
}

impl<S: ResultSink> ResultSink for ProgressSink<S> {
    fn record(&mut self, outcome: &EvaluationOutcome) -> Result<(), SweepError> {
        self.inner.record(outcome)?;
        self.count += 1;
        if !self.quiet {
            eprintln!("{}", progress_line(self.count, outcome));
        }
        Ok(())
    }
}

pub fn progress_line(n: u32, o: &EvaluationOutcome) -> String {
    if o.is_success() {
        format!(
            "[{:>3}] {:<14} setup={}ms solve={}ms",
            n, o.case_name, o.setup_ms, o.solve_ms,
        )
    } else {
        format!("[{:>3}] {:<14} FAILED {}", n, o.case_name, o.error)
    }
}
