//! Run configuration.
//!
//! Every field has a default matching the reference Y-branch design, so an
//! empty JSON object (or no file at all) is a valid configuration. A handful
//! of environment variables override the file:
//!
//! - `LUMERICAL_PATH`: solver installation root
//! - `YB_RUN_ROOT`: directory under which run folders are created

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::bounds::{BoundsPolicy, ParameterBounds};
use crate::errors::{YbError, YbResult};
use crate::history::GradientMode;
use crate::units::{linspace, NM, UM};
use crate::{config_error, validation_error};

pub const ENV_SOLVER_PATH: &str = "LUMERICAL_PATH";
pub const ENV_RUN_ROOT: &str = "YB_RUN_ROOT";

/// Which solver product runs the simulation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SolverKind {
    /// MODE varFDTD, 2.5D.
    Mode25D,
    /// FDTD, full 3D.
    Fdtd3D,
}

impl Default for SolverKind {
    fn default() -> Self {
        Self::Fdtd3D
    }
}

impl SolverKind {
    /// Executable under `<install>/bin`, without platform suffix.
    pub fn binary_stem(&self) -> &'static str {
        match self {
            Self::Mode25D => "mode-solutions",
            Self::Fdtd3D => "fdtd-solutions",
        }
    }

    /// Extension of the solver's project files.
    pub fn project_extension(&self) -> &'static str {
        match self {
            Self::Mode25D => "lms",
            Self::Fdtd3D => "fsp",
        }
    }

    pub fn is_3d(&self) -> bool {
        matches!(self, Self::Fdtd3D)
    }
}

impl std::fmt::Display for SolverKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Mode25D => write!(f, "MODE 2.5D"),
            Self::Fdtd3D => write!(f, "FDTD 3D"),
        }
    }
}

/// Source / monitor wavelength sampling.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Wavelengths {
    pub start: f64,
    pub stop: f64,
    pub points: usize,
}

impl Default for Wavelengths {
    fn default() -> Self {
        Self {
            start: 1300.0 * NM,
            stop: 1800.0 * NM,
            points: 21,
        }
    }
}

impl Wavelengths {
    pub fn new(start: f64, stop: f64, points: usize) -> Self {
        Self {
            start,
            stop,
            points,
        }
    }

    pub fn samples(&self) -> Vec<f64> {
        linspace(self.start, self.stop, self.points)
    }

    pub fn center(&self) -> f64 {
        0.5 * (self.start + self.stop)
    }
}

/// Shape of the split (inner) edge of the Y-branch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum InnerEdgeConfig {
    /// Straight V from the split point to the output end; no parameters.
    Linear { split_x: f64 },
    /// Spline through its own optimisable knots from `x = 0` to `x_max`.
    Spline { points: usize, x_max: f64 },
}

impl Default for InnerEdgeConfig {
    fn default() -> Self {
        Self::Linear { split_x: 0.0 }
    }
}

impl InnerEdgeConfig {
    pub fn parameter_count(&self) -> usize {
        match self {
            Self::Linear { .. } => 0,
            Self::Spline { points, .. } => *points,
        }
    }
}

/// Geometry parameterization settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeometryConfig {
    /// Number of outer-edge control points.
    pub outer_points: usize,
    /// x extent of the outer-edge knots.
    pub x_min: f64,
    pub x_max: f64,
    pub inner: InnerEdgeConfig,
    /// Starting parameter vector (outer knots first, then inner knots).
    pub initial_params: Vec<f64>,
    pub bounds: ParameterBounds,
    pub bounds_policy: BoundsPolicy,
    pub waveguide_width: f64,
    /// Smallest allowed gap between the two arms at the output.
    pub min_gap: f64,
    /// Device thickness (z span).
    pub depth: f64,
    pub core_index: f64,
    pub cladding_index: f64,
    pub gds_layer: i16,
    pub gds_datatype: i16,
}

impl Default for GeometryConfig {
    fn default() -> Self {
        let outer_points = 10;
        Self {
            outer_points,
            x_min: -1.0 * UM,
            x_max: 1.0 * UM,
            inner: InnerEdgeConfig::default(),
            initial_params: linspace(0.3 * UM, 0.7 * UM, outer_points),
            bounds: ParameterBounds::uniform(outer_points, 0.2 * UM, 0.8 * UM),
            bounds_policy: BoundsPolicy::Reject,
            waveguide_width: 0.5 * UM,
            min_gap: 0.1 * UM,
            depth: 220.0 * NM,
            core_index: 3.48,
            cladding_index: 1.44,
            gds_layer: 1,
            gds_datatype: 0,
        }
    }
}

impl GeometryConfig {
    /// The 20-parameter design that optimises both the outer edge and the
    /// split edge, with pinned end points at the input and output ports.
    pub fn dual_edge() -> Self {
        let outer = 10;
        let inner = 10;
        let outer_bounds = ParameterBounds::uniform(outer, 0.2 * UM, 1.5 * UM)
            .with_interval(0, 0.24 * UM, 0.26 * UM)
            .with_interval(outer - 1, 1.2 * UM, 1.3 * UM);
        let inner_bounds = ParameterBounds::uniform(inner, 0.0, 0.8 * UM)
            .with_interval(0, -0.05 * UM, 0.05 * UM)
            .with_interval(inner - 1, 0.7 * UM, 0.8 * UM);

        let mut initial = linspace(0.25 * UM, 1.25 * UM, outer);
        initial.extend(linspace(0.0, 0.75 * UM, inner));

        Self {
            outer_points: outer,
            inner: InnerEdgeConfig::Spline {
                points: inner,
                x_max: 1.0 * UM,
            },
            initial_params: initial,
            bounds: outer_bounds.chain(inner_bounds),
            ..Self::default()
        }
    }

    pub fn parameter_count(&self) -> usize {
        self.outer_points + self.inner.parameter_count()
    }

    /// y of the output arm centre for the initial design. Used to line the
    /// output waveguides up with the parameterized ports.
    pub fn port_center(&self) -> f64 {
        let outer_end = self
            .initial_params
            .get(self.outer_points.saturating_sub(1))
            .copied()
            .unwrap_or(0.0);
        match &self.inner {
            InnerEdgeConfig::Linear { .. } => outer_end - 0.5 * self.waveguide_width,
            InnerEdgeConfig::Spline { .. } => {
                let inner_end = self.initial_params.last().copied().unwrap_or(0.0);
                0.5 * (outer_end + inner_end)
            }
        }
    }

    pub fn validate(&self) -> YbResult<()> {
        if self.outer_points < 2 {
            return Err(validation_error!(
                "geometry needs at least 2 outer control points, got {}",
                self.outer_points
            ));
        }
        if self.x_max <= self.x_min {
            return Err(validation_error!("geometry x_max must exceed x_min"));
        }
        let expected = self.parameter_count();
        if self.initial_params.len() != expected {
            return Err(validation_error!(
                "initial_params has {} entries, geometry needs {}",
                self.initial_params.len(),
                expected
            ));
        }
        if self.bounds.len() != expected {
            return Err(validation_error!(
                "bounds has {} entries, geometry needs {}",
                self.bounds.len(),
                expected
            ));
        }
        if self.bounds.intervals().iter().any(|i| i.width() <= 0.0) {
            return Err(validation_error!("every bound interval must have positive width"));
        }
        if self.waveguide_width <= 0.0 || self.depth <= 0.0 {
            return Err(validation_error!("waveguide width and depth must be positive"));
        }
        Ok(())
    }
}

/// Grid on which permittivity sensitivities are evaluated.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GridConfig {
    pub x_min: f64,
    pub x_max: f64,
    pub y_min: f64,
    pub y_max: f64,
    pub cell: f64,
    /// Sub-rows sampled per grid row when rasterizing.
    pub subsamples: usize,
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            x_min: -1.25 * UM,
            x_max: 1.25 * UM,
            y_min: -1.5 * UM,
            y_max: 1.5 * UM,
            cell: 20.0 * NM,
            subsamples: 8,
        }
    }
}

/// Optimizer settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OptimizerConfig {
    pub max_iterations: u64,
    /// Stop when the figure of merit changes by less than this.
    pub fom_tolerance: f64,
    pub gradient_mode: GradientMode,
    /// Forward-difference step for the finite-difference gradient mode.
    pub fd_step: f64,
    /// Boundary perturbation used to take d(fill)/d(param) in adjoint mode.
    pub geometry_step: f64,
    /// L-BFGS history length.
    pub lbfgs_memory: usize,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            max_iterations: 30,
            fom_tolerance: 1e-9,
            gradient_mode: GradientMode::Adjoint,
            fd_step: 5.0 * NM,
            geometry_step: 1.0 * NM,
            lbfgs_memory: 10,
        }
    }
}

/// Solver installation and product.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SolverConfig {
    pub kind: SolverKind,
    /// Installation root; falls back to `LUMERICAL_PATH`.
    pub install_path: Option<PathBuf>,
    /// Extra arguments appended to every solver invocation.
    pub extra_args: Vec<String>,
}

/// Top-level configuration for an optimization run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    pub name: String,
    pub output_root: PathBuf,
    pub solver: SolverConfig,
    pub wavelengths: Wavelengths,
    pub geometry: GeometryConfig,
    pub grid: GridConfig,
    pub optimizer: OptimizerConfig,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            name: "y_branch".to_string(),
            output_root: PathBuf::from("runs"),
            solver: SolverConfig::default(),
            wavelengths: Wavelengths::default(),
            geometry: GeometryConfig::default(),
            grid: GridConfig::default(),
            optimizer: OptimizerConfig::default(),
        }
    }
}

impl RunConfig {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Load from an optional JSON file, then apply environment overrides.
    pub fn load(path: Option<&Path>) -> YbResult<Self> {
        let mut config = match path {
            Some(path) => {
                let text = std::fs::read_to_string(path).map_err(|e| {
                    config_error!("cannot read config file {}: {}", path.display(), e)
                })?;
                serde_json::from_str(&text).map_err(|e| {
                    config_error!("invalid config file {}: {}", path.display(), e)
                })?
            }
            None => Self::default(),
        };
        config.apply_env();
        config.validate()?;
        Ok(config)
    }

    /// Fill unset fields from the environment.
    pub fn apply_env(&mut self) {
        if self.solver.install_path.is_none() {
            if let Ok(path) = std::env::var(ENV_SOLVER_PATH) {
                if !path.is_empty() {
                    debug!(path = %path, "solver install path from {}", ENV_SOLVER_PATH);
                    self.solver.install_path = Some(PathBuf::from(path));
                }
            }
        }
        if let Ok(root) = std::env::var(ENV_RUN_ROOT) {
            if !root.is_empty() {
                self.output_root = PathBuf::from(root);
            }
        }
    }

    pub fn with_solver_kind(mut self, kind: SolverKind) -> Self {
        self.solver.kind = kind;
        self
    }

    pub fn with_install_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.solver.install_path = Some(path.into());
        self
    }

    pub fn with_output_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.output_root = root.into();
        self
    }

    pub fn with_geometry(mut self, geometry: GeometryConfig) -> Self {
        self.geometry = geometry;
        self
    }

    pub fn with_gradient_mode(mut self, mode: GradientMode) -> Self {
        self.optimizer.gradient_mode = mode;
        self
    }

    pub fn with_max_iterations(mut self, n: u64) -> Self {
        self.optimizer.max_iterations = n;
        self
    }

    pub fn with_grid(mut self, grid: GridConfig) -> Self {
        self.grid = grid;
        self
    }

    pub fn validate(&self) -> YbResult<()> {
        self.geometry.validate()?;
        if self.wavelengths.points == 0 || self.wavelengths.stop < self.wavelengths.start {
            return Err(validation_error!("wavelength range is empty"));
        }
        if self.grid.cell <= 0.0
            || self.grid.subsamples == 0
            || self.grid.x_max <= self.grid.x_min
            || self.grid.y_max <= self.grid.y_min
        {
            return Err(validation_error!("sensitivity grid is degenerate"));
        }
        if self.optimizer.fd_step <= 0.0 || self.optimizer.geometry_step <= 0.0 {
            return Err(validation_error!("finite-difference steps must be positive"));
        }
        if self.optimizer.lbfgs_memory == 0 {
            return Err(YbError::Validation("lbfgs_memory must be at least 1".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn default_config_is_valid_single_edge_design() {
        let config = RunConfig::default();
        config.validate().unwrap();
        assert_eq!(config.geometry.parameter_count(), 10);
        assert_eq!(config.optimizer.max_iterations, 30);
        assert_eq!(config.solver.kind, SolverKind::Fdtd3D);
        assert!((config.geometry.initial_params[0] - 0.3 * UM).abs() < 1e-15);
        assert!((config.geometry.initial_params[9] - 0.7 * UM).abs() < 1e-15);
    }

    #[test]
    fn dual_edge_preset_lines_up_with_two_micron_spacing() {
        let geometry = GeometryConfig::dual_edge();
        geometry.validate().unwrap();
        assert_eq!(geometry.parameter_count(), 20);
        assert!((geometry.port_center() - 1.0 * UM).abs() < 1e-12);
    }

    #[test]
    fn single_edge_port_center() {
        let geometry = GeometryConfig::default();
        assert!((geometry.port_center() - 0.45 * UM).abs() < 1e-12);
    }

    #[test]
    fn mismatched_bounds_fail_validation() {
        let mut geometry = GeometryConfig::default();
        geometry.bounds = ParameterBounds::uniform(4, 0.2 * UM, 0.8 * UM);
        let err = geometry.validate().unwrap_err();
        assert!(err.to_string().contains("bounds"));
    }

    #[test]
    fn partial_json_file_keeps_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"name": "sweep", "optimizer": {{"max_iterations": 5, "gradient_mode": "finite_difference"}}}}"#
        )
        .unwrap();

        let config = RunConfig::load(Some(file.path())).unwrap();
        assert_eq!(config.name, "sweep");
        assert_eq!(config.optimizer.max_iterations, 5);
        assert_eq!(config.optimizer.gradient_mode, GradientMode::FiniteDifference);
        assert_eq!(config.geometry, GeometryConfig::default());
    }

    #[test]
    fn unreadable_config_is_config_error() {
        let err = RunConfig::load(Some(Path::new("/definitely/not/here.json"))).unwrap_err();
        assert!(matches!(err, YbError::Config(_)));
    }

    #[test]
    fn wavelength_samples() {
        let wl = Wavelengths::default();
        let samples = wl.samples();
        assert_eq!(samples.len(), 21);
        assert!((wl.center() - 1550.0 * NM).abs() < 1e-15);
    }
}
