//! Startup check for the external solver installation.

use std::path::{Path, PathBuf};

use tracing::{debug, info};
use yb_types::{DependencyError, SolverConfig, SolverKind, ENV_SOLVER_PATH};

/// A located solver installation.
#[derive(Debug, Clone, PartialEq)]
pub struct SolverInstallation {
    pub root: PathBuf,
    pub kind: SolverKind,
    pub binary: PathBuf,
}

/// Executable name for `kind` on this platform.
pub fn binary_name(kind: SolverKind) -> String {
    if cfg!(windows) {
        format!("{}.exe", kind.binary_stem())
    } else {
        kind.binary_stem().to_string()
    }
}

/// Resolve and check the solver installation. The configured path wins
/// over `LUMERICAL_PATH`.
pub fn probe_dependencies(config: &SolverConfig) -> Result<SolverInstallation, DependencyError> {
    let root = match &config.install_path {
        Some(path) => path.clone(),
        None => match std::env::var(ENV_SOLVER_PATH) {
            Ok(path) if !path.is_empty() => PathBuf::from(path),
            _ => return Err(DependencyError::InstallPathUnset),
        },
    };
    probe_install(&root, config.kind)
}

pub fn probe_install(root: &Path, kind: SolverKind) -> Result<SolverInstallation, DependencyError> {
    debug!(root = %root.display(), %kind, "probing solver installation");
    if !root.is_dir() {
        return Err(DependencyError::InstallNotFound {
            path: root.display().to_string(),
        });
    }
    let binary = root.join("bin").join(binary_name(kind));
    if !binary.is_file() {
        return Err(DependencyError::BinaryMissing {
            binary: binary_name(kind),
            path: root.join("bin").display().to_string(),
        });
    }
    info!(binary = %binary.display(), "solver installation found");
    Ok(SolverInstallation {
        root: root.to_path_buf(),
        kind,
        binary,
    })
}
