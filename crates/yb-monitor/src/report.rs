//! What one monitoring pass found.

use std::fmt;
use std::path::PathBuf;

use serde::Serialize;
use yb_types::{to_um, IterationRecord, RunState, RunStatus};

/// Snapshot of a run directory. Every field may be empty: a run that has
/// just started has no status and no records yet.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonitorReport {
    pub run_dir: PathBuf,
    pub status: Option<RunStatus>,
    /// Why the status file could not be read, if it exists but is broken.
    pub status_error: Option<String>,
    pub latest: Option<IterationRecord>,
    pub best: Option<IterationRecord>,
    /// Number of good iteration records.
    pub records: usize,
    /// `path: reason` for each record that was skipped.
    pub skipped: Vec<String>,
    /// `(iteration, fom)` for plotting.
    pub series: Vec<(u64, f64)>,
}

impl MonitorReport {
    pub fn empty(run_dir: PathBuf) -> Self {
        Self {
            run_dir,
            status: None,
            status_error: None,
            latest: None,
            best: None,
            records: 0,
            skipped: Vec::new(),
            series: Vec::new(),
        }
    }

    pub fn latest_iteration(&self) -> Option<u64> {
        self.latest.as_ref().map(|r| r.iteration)
    }

    pub fn state(&self) -> Option<RunState> {
        self.status.as_ref().map(|s| s.state)
    }

    pub fn is_finished(&self) -> bool {
        self.status.as_ref().map_or(false, |s| s.is_finished())
    }
}

fn offsets_um(params: &[f64]) -> String {
    let values: Vec<String> = params.iter().map(|p| format!("{:.4}", to_um(*p))).collect();
    format!("[{}]", values.join(", "))
}

impl fmt::Display for MonitorReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "run        {}", self.run_dir.display())?;
        match (&self.status, &self.status_error) {
            (Some(status), _) => {
                write!(
                    f,
                    "status     {} ({}, {} gradients)",
                    status.state, status.name, status.gradient_mode
                )?;
                if let Some(error) = &status.error {
                    write!(f, ": {}", error)?;
                }
                writeln!(f)?;
            }
            (None, Some(error)) => writeln!(f, "status     unreadable: {}", error)?,
            (None, None) => writeln!(f, "status     not written yet")?,
        }

        match &self.latest {
            Some(latest) => {
                writeln!(
                    f,
                    "latest     iteration {}  fom {:.6}  |grad| {:.3e}  evaluations {}",
                    latest.iteration,
                    latest.fom,
                    latest.gradient_norm(),
                    latest.evaluations
                )?;
                writeln!(f, "offsets    {} um", offsets_um(&latest.params))?;
            }
            None => writeln!(f, "latest     no iterations recorded yet")?,
        }
        if let Some(best) = &self.best {
            writeln!(f, "best       fom {:.6} at iteration {}", best.fom, best.iteration)?;
        }
        if !self.skipped.is_empty() {
            writeln!(f, "skipped    {} unreadable record(s)", self.skipped.len())?;
        }
        Ok(())
    }
}
