//! File layout of a run directory.
//!
//! ```text
//! <output_root>/<name>_<YYYYmmdd_HHMMSS>/
//!     config.json
//!     status.json
//!     iterations/iter_0001.json ...
//!     parameters.txt
//!     y_branch_optimized.gds
//!     fom_history.png
//!     shape.png
//!     y_branch.fsp | y_branch.lms
//!     solver/            scripts and raw solver output
//! ```

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use yb_types::{SolverKind, YbResult};

pub const CONFIG_FILE: &str = "config.json";
pub const STATUS_FILE: &str = "status.json";
pub const ITERATIONS_DIR: &str = "iterations";
pub const PARAMETERS_FILE: &str = "parameters.txt";
pub const LAYOUT_FILE: &str = "y_branch_optimized.gds";
pub const PLOT_FILE: &str = "fom_history.png";
pub const SHAPE_PLOT_FILE: &str = "shape.png";
pub const PROJECT_STEM: &str = "y_branch";
pub const SOLVER_DIR: &str = "solver";

const ITERATION_PREFIX: &str = "iter_";
const ITERATION_SUFFIX: &str = ".json";

/// Paths inside one run directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunLayout {
    root: PathBuf,
}

impl RunLayout {
    /// Layout over an existing (or to-be-created) directory.
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    /// Create a fresh, timestamped run directory under `output_root`.
    /// A numeric suffix is appended if the name is taken.
    pub fn create<P: AsRef<Path>>(output_root: P, name: &str, started: DateTime<Utc>) -> YbResult<Self> {
        let output_root = output_root.as_ref();
        std::fs::create_dir_all(output_root)?;
        let base = run_dir_name(name, started);
        let mut root = output_root.join(&base);
        let mut n = 1;
        while root.exists() {
            root = output_root.join(format!("{}_{}", base, n));
            n += 1;
        }
        std::fs::create_dir_all(root.join(ITERATIONS_DIR))?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn config_path(&self) -> PathBuf {
        self.root.join(CONFIG_FILE)
    }

    pub fn status_path(&self) -> PathBuf {
        self.root.join(STATUS_FILE)
    }

    pub fn iterations_dir(&self) -> PathBuf {
        self.root.join(ITERATIONS_DIR)
    }

    pub fn iteration_path(&self, iteration: u64) -> PathBuf {
        self.iterations_dir().join(iteration_file_name(iteration))
    }

    pub fn parameters_path(&self) -> PathBuf {
        self.root.join(PARAMETERS_FILE)
    }

    pub fn layout_path(&self) -> PathBuf {
        self.root.join(LAYOUT_FILE)
    }

    pub fn plot_path(&self) -> PathBuf {
        self.root.join(PLOT_FILE)
    }

    pub fn shape_plot_path(&self) -> PathBuf {
        self.root.join(SHAPE_PLOT_FILE)
    }

    pub fn project_path(&self, kind: SolverKind) -> PathBuf {
        self.root
            .join(format!("{}.{}", PROJECT_STEM, kind.project_extension()))
    }

    pub fn solver_dir(&self) -> PathBuf {
        self.root.join(SOLVER_DIR)
    }

    /// Whether `dir` looks like a run directory.
    pub fn is_run_dir(dir: &Path) -> bool {
        dir.is_dir()
            && (dir.join(CONFIG_FILE).exists()
                || dir.join(STATUS_FILE).exists()
                || dir.join(ITERATIONS_DIR).is_dir())
    }
}

pub fn run_dir_name(name: &str, started: DateTime<Utc>) -> String {
    format!("{}_{}", name, started.format("%Y%m%d_%H%M%S"))
}

pub fn iteration_file_name(iteration: u64) -> String {
    format!("{}{:04}{}", ITERATION_PREFIX, iteration, ITERATION_SUFFIX)
}

/// Iteration number encoded in an iteration file name.
pub fn parse_iteration_file_name(name: &str) -> Option<u64> {
    name.strip_prefix(ITERATION_PREFIX)?
        .strip_suffix(ITERATION_SUFFIX)?
        .parse()
        .ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn names_are_timestamped() {
        let t = Utc.with_ymd_and_hms(2024, 3, 9, 14, 5, 7).unwrap();
        assert_eq!(run_dir_name("y_branch", t), "y_branch_20240309_140507");
    }

    #[test]
    fn iteration_names_round_trip() {
        assert_eq!(iteration_file_name(7), "iter_0007.json");
        assert_eq!(parse_iteration_file_name("iter_0007.json"), Some(7));
        assert_eq!(parse_iteration_file_name("iter_12345.json"), Some(12345));
        assert_eq!(parse_iteration_file_name("iter_0007.json.tmp"), None);
        assert_eq!(parse_iteration_file_name("status.json"), None);
    }

    #[test]
    fn create_avoids_collisions() {
        let dir = tempfile::tempdir().unwrap();
        let t = Utc.with_ymd_and_hms(2024, 3, 9, 14, 5, 7).unwrap();
        let a = RunLayout::create(dir.path(), "y_branch", t).unwrap();
        let b = RunLayout::create(dir.path(), "y_branch", t).unwrap();
        assert_ne!(a.root(), b.root());
        assert!(a.iterations_dir().is_dir());
        assert!(RunLayout::is_run_dir(b.root()));
        assert!(b.root().ends_with("y_branch_20240309_140507_1"));
    }

    #[test]
    fn project_extension_follows_solver() {
        let layout = RunLayout::new("/tmp/run");
        assert!(layout.project_path(SolverKind::Mode25D).ends_with("y_branch.lms"));
        assert!(layout.project_path(SolverKind::Fdtd3D).ends_with("y_branch.fsp"));
    }
}
