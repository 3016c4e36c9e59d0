//! Solver session abstraction.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use yb_geometry::{GridSpec, Polygon};
use yb_types::{SolverError, SolverKind, SolverResult};

use crate::setup::SimulationSetup;

/// Result of a forward solve.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForwardSolution {
    /// Figure of merit, to be maximized.
    pub fom: f64,
    pub wavelengths: Vec<f64>,
    /// Total power transmitted into both output ports, per wavelength.
    pub transmission: Vec<f64>,
}

impl ForwardSolution {
    pub fn mean_transmission(&self) -> f64 {
        if self.transmission.is_empty() {
            return 0.0;
        }
        self.transmission.iter().sum::<f64>() / self.transmission.len() as f64
    }
}

/// dFOM / d(fill fraction) per cell of the optimisation grid, as obtained
/// from the overlap of forward and adjoint fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensitivityGrid {
    pub spec: GridSpec,
    pub values: Vec<f64>,
}

impl SensitivityGrid {
    pub fn new(spec: GridSpec, values: Vec<f64>) -> SolverResult<Self> {
        if values.len() != spec.cells() {
            return Err(SolverError::GridMismatch {
                expected: format!("{} cells", spec.cells()),
                actual: format!("{} values", values.len()),
            });
        }
        Ok(Self { spec, values })
    }

    /// Refuse sensitivities sampled on a different lattice.
    pub fn ensure_matches(&self, spec: &GridSpec) -> SolverResult<()> {
        if self.spec.matches(spec) {
            Ok(())
        } else {
            Err(SolverError::GridMismatch {
                expected: spec.to_string(),
                actual: self.spec.to_string(),
            })
        }
    }

    /// Chain rule: `sum_c sensitivity[c] * fill_derivative[c]`.
    pub fn project(&self, fill_derivative: &[f64]) -> f64 {
        self.values
            .iter()
            .zip(fill_derivative)
            .map(|(s, d)| s * d)
            .sum()
    }
}

/// Solver calls issued by a session so far.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionStats {
    pub forward_solves: u64,
    pub adjoint_solves: u64,
    pub geometry_updates: u64,
}

impl SessionStats {
    pub fn solves(&self) -> u64 {
        self.forward_solves + self.adjoint_solves
    }
}

/// Handle onto an external electromagnetic solver.
///
/// Calls block until the solver finishes. Errors are returned unmodified;
/// retrying is up to the caller.
pub trait SolverSession {
    fn kind(&self) -> SolverKind;

    /// Build the base project from the static setup.
    fn load_base(&mut self, setup: &SimulationSetup) -> SolverResult<()>;

    /// Replace the optimisable device with `polygon`, extruded to `depth`
    /// in 3D runs.
    fn update_geometry(&mut self, polygon: &Polygon, depth: f64) -> SolverResult<()>;

    fn forward_solve(&mut self) -> SolverResult<ForwardSolution>;

    /// Adjoint solve for the current geometry. Requires a preceding
    /// forward solve of the same geometry.
    fn adjoint_solve(&mut self) -> SolverResult<SensitivityGrid>;

    /// Persist the current project. Returns the path actually written.
    fn save_project(&mut self, path: &Path) -> SolverResult<PathBuf>;

    fn stats(&self) -> SessionStats;
}

impl<S: SolverSession + ?Sized> SolverSession for Box<S> {
    fn kind(&self) -> SolverKind {
        (**self).kind()
    }

    fn load_base(&mut self, setup: &SimulationSetup) -> SolverResult<()> {
        (**self).load_base(setup)
    }

    fn update_geometry(&mut self, polygon: &Polygon, depth: f64) -> SolverResult<()> {
        (**self).update_geometry(polygon, depth)
    }

    fn forward_solve(&mut self) -> SolverResult<ForwardSolution> {
        (**self).forward_solve()
    }

    fn adjoint_solve(&mut self) -> SolverResult<SensitivityGrid> {
        (**self).adjoint_solve()
    }

    fn save_project(&mut self, path: &Path) -> SolverResult<PathBuf> {
        (**self).save_project(path)
    }

    fn stats(&self) -> SessionStats {
        (**self).stats()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use yb_types::GridConfig;

    fn spec() -> GridSpec {
        GridSpec::from_config(&GridConfig::default()).unwrap()
    }

    #[test]
    fn sensitivity_length_checked() {
        let err = SensitivityGrid::new(spec(), vec![0.0; 3]).unwrap_err();
        assert!(matches!(err, SolverError::GridMismatch { .. }));
    }

    #[test]
    fn projection_is_dot_product() {
        let spec = spec();
        let mut values = vec![0.0; spec.cells()];
        values[0] = 2.0;
        values[5] = -1.0;
        let grid = SensitivityGrid::new(spec, values).unwrap();
        let mut d = vec![0.0; spec.cells()];
        d[0] = 0.5;
        d[5] = 3.0;
        assert_eq!(grid.project(&d), -2.0);
    }

    #[test]
    fn mismatched_lattice_rejected() {
        let grid = SensitivityGrid::new(spec(), vec![0.0; spec().cells()]).unwrap();
        let coarse = GridSpec::from_config(&GridConfig {
            cell: 50e-9,
            ..GridConfig::default()
        })
        .unwrap();
        assert!(grid.ensure_matches(&spec()).is_ok());
        assert!(grid.ensure_matches(&coarse).is_err());
    }

    #[test]
    fn mean_transmission() {
        let solution = ForwardSolution {
            fom: 0.9,
            wavelengths: vec![1.5e-6, 1.6e-6],
            transmission: vec![0.8, 1.0],
        };
        assert!((solution.mean_transmission() - 0.9).abs() < 1e-12);
    }
}
