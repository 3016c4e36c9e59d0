//! Driver phases and the transition log.

use serde::Serialize;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Initialize,
    ForwardSimulate,
    AdjointSimulate,
    ComputeGradient,
    UpdateParameters,
    CheckConvergence,
    Terminate,
}

impl Phase {
    /// Transitions the driver is expected to make. Line searches may ask
    /// for a fresh evaluation straight after a gradient, and an iteration
    /// whose evaluations were all cached goes directly to the update.
    pub fn can_follow(self, previous: Phase) -> bool {
        use Phase::*;
        match (previous, self) {
            (_, Terminate) => true,
            (Initialize, ForwardSimulate) => true,
            (ForwardSimulate, AdjointSimulate) => true,
            (ForwardSimulate, ComputeGradient) => true,
            (AdjointSimulate, ComputeGradient) => true,
            (ComputeGradient, ForwardSimulate) => true,
            (ComputeGradient, UpdateParameters) => true,
            (UpdateParameters, CheckConvergence) => true,
            (CheckConvergence, ForwardSimulate) => true,
            (CheckConvergence, UpdateParameters) => true,
            _ => false,
        }
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Self::Initialize => "initialize",
            Self::ForwardSimulate => "forward_simulate",
            Self::AdjointSimulate => "adjoint_simulate",
            Self::ComputeGradient => "compute_gradient",
            Self::UpdateParameters => "update_parameters",
            Self::CheckConvergence => "check_convergence",
            Self::Terminate => "terminate",
        };
        f.write_str(label)
    }
}

/// Current phase plus every phase entered so far.
#[derive(Debug, Clone)]
pub struct PhaseLog {
    current: Phase,
    history: Vec<Phase>,
}

impl Default for PhaseLog {
    fn default() -> Self {
        Self {
            current: Phase::Initialize,
            history: vec![Phase::Initialize],
        }
    }
}

impl PhaseLog {
    pub fn current(&self) -> Phase {
        self.current
    }

    pub fn history(&self) -> &[Phase] {
        &self.history
    }

    pub fn enter(&mut self, next: Phase) {
        if !next.can_follow(self.current) {
            warn!(from = %self.current, to = %next, "unexpected phase transition");
        }
        debug!(from = %self.current, to = %next, "phase");
        self.current = next;
        self.history.push(next);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn adjoint_iteration_sequence_is_valid() {
        use Phase::*;
        let sequence = [
            Initialize,
            ForwardSimulate,
            AdjointSimulate,
            ComputeGradient,
            ForwardSimulate,
            AdjointSimulate,
            ComputeGradient,
            UpdateParameters,
            CheckConvergence,
            Terminate,
        ];
        assert!(sequence.windows(2).all(|w| w[1].can_follow(w[0])));
    }

    #[test]
    fn skipping_the_solve_is_not_expected() {
        assert!(!Phase::ComputeGradient.can_follow(Phase::Initialize));
        assert!(!Phase::AdjointSimulate.can_follow(Phase::CheckConvergence));
        assert!(Phase::Terminate.can_follow(Phase::AdjointSimulate));
    }

    #[test]
    fn log_records_history() {
        let mut log = PhaseLog::default();
        log.enter(Phase::ForwardSimulate);
        log.enter(Phase::ComputeGradient);
        assert_eq!(log.current(), Phase::ComputeGradient);
        assert_eq!(log.history().len(), 3);
    }
}
