//! Analytic stand-in for the electromagnetic solver.
//!
//! The figure of merit rewards overlap with a fixed target fill pattern:
//!
//! ```text
//! FOM = 1 - sum_c (fill_c - target_c)^2 / sum_c target_c
//! ```
//!
//! and the "adjoint" sensitivity is its exact derivative with respect to
//! each cell's fill fraction. It runs in milliseconds and needs no licence,
//! which makes it the backend for dry runs and tests.

use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{debug, info};
use yb_geometry::{rasterize, FillGrid, GridSpec, Polygon, YBranchGeometry};
use yb_types::{GeometryResult, SolverError, SolverKind, SolverResult, Wavelengths};

use crate::session::{ForwardSolution, SensitivityGrid, SessionStats, SolverSession};
use crate::setup::SimulationSetup;

pub struct SurrogateSession {
    kind: SolverKind,
    grid: GridSpec,
    target: FillGrid,
    target_mass: f64,
    wavelengths: Option<Wavelengths>,
    fill: Option<FillGrid>,
    solved: bool,
    stats: SessionStats,
}

/// Smooth taper through the middle of each bound interval, 1/6 of the way
/// up at the first control point and 5/6 at the last.
pub fn reference_params(geometry: &YBranchGeometry) -> Vec<f64> {
    let n = geometry.parameter_count();
    let outer = geometry.outer_count();
    geometry
        .bounds()
        .intervals()
        .iter()
        .enumerate()
        .map(|(i, interval)| {
            let (k, len) = if i < outer { (i, outer) } else { (i - outer, n - outer) };
            let s = if len > 1 { k as f64 / (len - 1) as f64 } else { 0.5 };
            let frac = 1.0 / 6.0 + 2.0 / 3.0 * (3.0 * s * s - 2.0 * s * s * s);
            interval.lower + frac * interval.width()
        })
        .collect()
}

impl SurrogateSession {
    /// Surrogate whose optimum is the outline of `target_params`.
    pub fn new(
        geometry: &YBranchGeometry,
        grid: GridSpec,
        target_params: &[f64],
    ) -> GeometryResult<Self> {
        let target = rasterize(&geometry.outline(target_params)?, &grid);
        let target_mass = target.values.iter().sum::<f64>().max(f64::EPSILON);
        Ok(Self {
            kind: SolverKind::Fdtd3D,
            grid,
            target,
            target_mass,
            wavelengths: None,
            fill: None,
            solved: false,
            stats: SessionStats::default(),
        })
    }

    /// Surrogate targeting [`reference_params`].
    pub fn reference(geometry: &YBranchGeometry, grid: GridSpec) -> GeometryResult<Self> {
        Self::new(geometry, grid, &reference_params(geometry))
    }

    pub fn with_kind(mut self, kind: SolverKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn target(&self) -> &FillGrid {
        &self.target
    }

    /// Figure of merit of an arbitrary fill pattern.
    pub fn figure_of_merit(&self, fill: &FillGrid) -> f64 {
        let err: f64 = fill
            .values
            .iter()
            .zip(&self.target.values)
            .map(|(f, t)| (f - t) * (f - t))
            .sum();
        1.0 - err / self.target_mass
    }

    fn current_fill(&self) -> SolverResult<&FillGrid> {
        self.fill.as_ref().ok_or_else(|| SolverError::NotInitialised {
            message: "no geometry loaded".into(),
        })
    }
}

#[derive(Serialize)]
struct SurrogateProject<'a> {
    kind: SolverKind,
    grid: &'a GridSpec,
    fom: Option<f64>,
    fill: Option<&'a [f64]>,
    stats: SessionStats,
}

impl SolverSession for SurrogateSession {
    fn kind(&self) -> SolverKind {
        self.kind
    }

    fn load_base(&mut self, setup: &SimulationSetup) -> SolverResult<()> {
        self.wavelengths = Some(setup.summary.wavelengths);
        self.fill = None;
        self.solved = false;
        debug!(cells = self.grid.cells(), "surrogate base loaded");
        Ok(())
    }

    fn update_geometry(&mut self, polygon: &Polygon, _depth: f64) -> SolverResult<()> {
        if self.wavelengths.is_none() {
            return Err(SolverError::NotInitialised {
                message: "load_base has not been called".into(),
            });
        }
        self.fill = Some(rasterize(polygon, &self.grid));
        self.solved = false;
        self.stats.geometry_updates += 1;
        Ok(())
    }

    fn forward_solve(&mut self) -> SolverResult<ForwardSolution> {
        let fom = self.figure_of_merit(self.current_fill()?);
        let wavelengths = self.wavelengths.map(|w| w.samples()).unwrap_or_default();
        self.solved = true;
        self.stats.forward_solves += 1;
        debug!(fom, "surrogate forward solve");
        Ok(ForwardSolution {
            fom,
            transmission: vec![fom; wavelengths.len()],
            wavelengths,
        })
    }

    fn adjoint_solve(&mut self) -> SolverResult<SensitivityGrid> {
        if !self.solved {
            return Err(SolverError::NotInitialised {
                message: "adjoint solve needs a forward solve of the current geometry".into(),
            });
        }
        let fill = self.current_fill()?;
        let values = fill
            .values
            .iter()
            .zip(&self.target.values)
            .map(|(f, t)| -2.0 * (f - t) / self.target_mass)
            .collect();
        self.stats.adjoint_solves += 1;
        SensitivityGrid::new(self.grid, values)
    }

    fn save_project(&mut self, path: &Path) -> SolverResult<PathBuf> {
        let target = path.with_extension("surrogate.json");
        let fill = self.fill.as_ref();
        let project = SurrogateProject {
            kind: self.kind,
            grid: &self.grid,
            fom: fill.map(|f| self.figure_of_merit(f)),
            fill: fill.map(|f| f.values.as_slice()),
            stats: self.stats,
        };
        let text = serde_json::to_string(&project).map_err(|e| SolverError::Output {
            path: target.display().to_string(),
            message: e.to_string(),
        })?;
        std::fs::write(&target, text)?;
        info!(path = %target.display(), "surrogate project saved");
        Ok(target)
    }

    fn stats(&self) -> SessionStats {
        self.stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use yb_types::{GeometryConfig, GridConfig};

    fn fixture() -> (YBranchGeometry, SurrogateSession) {
        let geometry = YBranchGeometry::from_config(&GeometryConfig::default()).unwrap();
        let grid = GridSpec::from_config(&GridConfig::default()).unwrap();
        let mut session = SurrogateSession::reference(&geometry, grid).unwrap();
        let setup = SimulationSetup::y_branch(SolverKind::Fdtd3D, Wavelengths::default());
        session.load_base(&setup).unwrap();
        (geometry, session)
    }

    #[test]
    fn reference_params_follow_bounds() {
        let (geometry, _) = fixture();
        let p = reference_params(&geometry);
        assert_eq!(p.len(), 10);
        assert!((p[0] - 0.3e-6).abs() < 1e-12);
        assert!((p[9] - 0.7e-6).abs() < 1e-12);
        assert!(p.windows(2).all(|w| w[1] > w[0]));
        geometry.create_polygon(&p).unwrap();
    }

    #[test]
    fn target_scores_one() {
        let (geometry, mut session) = fixture();
        let polygon = geometry.create_polygon(&reference_params(&geometry)).unwrap();
        session.update_geometry(&polygon, geometry.depth()).unwrap();
        let forward = session.forward_solve().unwrap();
        assert!((forward.fom - 1.0).abs() < 1e-12);
        assert_eq!(forward.transmission.len(), 21);
    }

    #[test]
    fn initial_design_scores_below_target() {
        let (geometry, mut session) = fixture();
        let polygon = geometry.create_polygon(geometry.initial_params()).unwrap();
        session.update_geometry(&polygon, geometry.depth()).unwrap();
        let fom = session.forward_solve().unwrap().fom;
        assert!(fom < 1.0 && fom > 0.0);
    }

    #[test]
    fn sensitivity_matches_cell_perturbation() {
        let (geometry, mut session) = fixture();
        let polygon = geometry.create_polygon(geometry.initial_params()).unwrap();
        session.update_geometry(&polygon, geometry.depth()).unwrap();
        session.forward_solve().unwrap();
        let sens = session.adjoint_solve().unwrap();

        let mut fill = rasterize(&polygon, &sens.spec);
        let base = session.figure_of_merit(&fill);
        let cell = fill
            .values
            .iter()
            .position(|v| *v > 0.2 && *v < 0.8)
            .unwrap();
        let h = 1e-6;
        fill.values[cell] += h;
        let numeric = (session.figure_of_merit(&fill) - base) / h;
        assert!((numeric - sens.values[cell]).abs() < 1e-7);
    }

    #[test]
    fn call_order_enforced() {
        let geometry = YBranchGeometry::from_config(&GeometryConfig::default()).unwrap();
        let grid = GridSpec::from_config(&GridConfig::default()).unwrap();
        let mut session = SurrogateSession::reference(&geometry, grid).unwrap();
        let polygon = geometry.create_polygon(geometry.initial_params()).unwrap();
        assert!(session.update_geometry(&polygon, 220e-9).is_err());

        let setup = SimulationSetup::y_branch(SolverKind::Fdtd3D, Wavelengths::default());
        session.load_base(&setup).unwrap();
        assert!(session.forward_solve().is_err());
        session.update_geometry(&polygon, 220e-9).unwrap();
        assert!(session.adjoint_solve().is_err());
        session.forward_solve().unwrap();
        session.adjoint_solve().unwrap();
        assert_eq!(session.stats().solves(), 2);
    }

    #[test]
    fn project_saved_as_json() {
        let (geometry, mut session) = fixture();
        let polygon = geometry.create_polygon(geometry.initial_params()).unwrap();
        session.update_geometry(&polygon, geometry.depth()).unwrap();
        let dir = tempfile::tempdir().unwrap();
        let path = session.save_project(&dir.path().join("y_branch.fsp")).unwrap();
        assert!(path.to_string_lossy().ends_with("y_branch.surrogate.json"));
        let value: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap();
        assert!(value["fom"].as_f64().is_some());
    }
}
