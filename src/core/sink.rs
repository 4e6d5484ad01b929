// src/core/sink.rs: Result sinks for evaluation outcomes

use std::borrow::Cow;
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::infra::errors::SweepError;

use super::types::EvaluationOutcome;

pub const CSV_HEADER: &str = "case,cores,mesh,type,amount,setup_ms,solve_ms,error";

/// Receives exactly one outcome per completed trial.
pub trait ResultSink: Send {
    fn record(&mut self, outcome: &EvaluationOutcome) -> Result<(), SweepError>;
}

/// Append-only CSV file, one per run, flushed after every row.
pub struct CsvSink {
    path: PathBuf,
    writer: BufWriter<File>,
}

impl CsvSink {
    /// Create `{dir}/{prefix}_{timestamp}.csv` and write the header.
    pub fn create(dir: &Path, prefix: &str) -> Result<Self, SweepError> {
        let stamp = chrono::Local::now().format("%Y%m%d_%H%M%S");
        Self::create_at(dir.join(format!("{prefix}_{stamp}.csv")))
    }

    pub fn create_at(path: PathBuf) -> Result<Self, SweepError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        let is_empty = file.metadata()?.len() == 0;

        let mut sink = Self {
            path,
            writer: BufWriter::new(file),
        };
        if is_empty {
            sink.write_line(CSV_HEADER)?;
        }
        Ok(sink)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn write_line(&mut self, line: &str) -> Result<(), SweepError> {
        writeln!(self.writer, "{line}")?;
        self.writer.flush()?;
        Ok(())
    }
}

impl ResultSink for CsvSink {
    fn record(&mut self, outcome: &EvaluationOutcome) -> Result<(), SweepError> {
        let row = csv_row(outcome);
        self.write_line(&row)
            .map_err(|e| SweepError::Sink(format!("{}: {e}", self.path.display())))
    }
}

/// Keeps outcomes in memory; used by dry runs and tests.
#[derive(Debug, Default)]
pub struct MemorySink {
    pub rows: Vec<EvaluationOutcome>,
}

impl ResultSink for MemorySink {
    fn record(&mut self, outcome: &EvaluationOutcome) -> Result<(), SweepError> {
        self.rows.push(outcome.clone());
        Ok(())
    }
}

pub fn csv_row(o: &EvaluationOutcome) -> String {
    format!(
        "{},{},{},{},{},{},{},{}",
        escape(&o.case_name),
        o.cores,
        o.mesh_quality,
        escape(&o.kind),
        o.amount,
        o.setup_ms,
        o.solve_ms,
        escape(&o.error),
    )
}

fn escape(field: &str) -> Cow<'_, str> {
    if field.contains([',', '"', '\n', '\r']) {
        Cow::Owned(format!("\"{}\"", field.replace('"', "\"\"")))
    } else {
        Cow::Borrowed(field)
    }
}
