//! Iteration records and run lifecycle tracking.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique optimization run identifier.
pub type RunId = Uuid;

/// How the gradient of the figure of merit is obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GradientMode {
    /// One forward and one adjoint solve per evaluation.
    Adjoint,
    /// One forward solve plus one extra forward solve per parameter.
    FiniteDifference,
}

impl Default for GradientMode {
    fn default() -> Self {
        Self::Adjoint
    }
}

impl std::fmt::Display for GradientMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Adjoint => write!(f, "adjoint"),
            Self::FiniteDifference => write!(f, "finite-difference"),
        }
    }
}

/// One completed optimizer iteration as persisted to the run directory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IterationRecord {
    pub iteration: u64,
    /// Control-point offsets in metres.
    pub params: Vec<f64>,
    pub fom: f64,
    /// dFOM/dparam, one entry per parameter.
    pub gradient: Vec<f64>,
    /// Total figure-of-merit evaluations so far (line searches included).
    pub evaluations: u64,
    pub gradient_mode: GradientMode,
    pub timestamp: DateTime<Utc>,
}

impl IterationRecord {
    pub fn new(iteration: u64, params: Vec<f64>, fom: f64, gradient: Vec<f64>) -> Self {
        Self {
            iteration,
            params,
            fom,
            gradient,
            evaluations: 0,
            gradient_mode: GradientMode::Adjoint,
            timestamp: Utc::now(),
        }
    }

    pub fn with_evaluations(mut self, evaluations: u64) -> Self {
        self.evaluations = evaluations;
        self
    }

    pub fn with_gradient_mode(mut self, mode: GradientMode) -> Self {
        self.gradient_mode = mode;
        self
    }

    pub fn gradient_norm(&self) -> f64 {
        self.gradient.iter().map(|g| g * g).sum::<f64>().sqrt()
    }
}

/// Lifecycle state for an optimization run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunState {
    Pending,
    Running,
    Completed,
    Failed,
}

impl std::fmt::Display for RunState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
        };
        f.write_str(label)
    }
}

/// Aggregate status of an optimization run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunStatus {
    pub id: RunId,
    pub name: String,
    pub state: RunState,
    pub gradient_mode: GradientMode,
    pub iterations_completed: u64,
    pub best: Option<IterationRecord>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub error: Option<String>,
}

impl RunStatus {
    pub fn new(name: impl Into<String>, gradient_mode: GradientMode) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            state: RunState::Pending,
            gradient_mode,
            iterations_completed: 0,
            best: None,
            started_at: None,
            finished_at: None,
            error: None,
        }
    }

    pub fn mark_running(&mut self) {
        self.state = RunState::Running;
        self.started_at = Some(Utc::now());
    }

    pub fn mark_completed(&mut self) {
        self.state = RunState::Completed;
        self.finished_at = Some(Utc::now());
    }

    pub fn mark_failed(&mut self, error: String) {
        self.state = RunState::Failed;
        self.finished_at = Some(Utc::now());
        self.error = Some(error);
    }

    /// Count the iteration and keep it if it beats the current best.
    /// The figure of merit is always maximized.
    pub fn record_iteration(&mut self, record: &IterationRecord) {
        self.iterations_completed = self.iterations_completed.max(record.iteration);
        let improves = match &self.best {
            None => true,
            Some(best) => record.fom > best.fom,
        };
        if improves {
            self.best = Some(record.clone());
        }
    }

    pub fn is_finished(&self) -> bool {
        matches!(self.state, RunState::Completed | RunState::Failed)
    }
}
