use thiserror::Error;

/// Main error type for the Y-branch toolkit
#[derive(Error, Debug)]
pub enum YbError {
    #[error("Geometry error: {0}")]
    Geometry(#[from] GeometryError),

    #[error("Solver error: {0}")]
    Solver(#[from] SolverError),

    #[error("Dependency error: {0}")]
    Dependency(#[from] DependencyError),

    #[error("Artifact error: {0}")]
    Artifact(#[from] ArtifactError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Optimizer error: {0}")]
    Optimizer(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Validation error: {0}")]
    Validation(String),
}

/// Geometry construction errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GeometryError {
    #[error("Expected {expected} parameters, got {actual}")]
    ParameterCount { expected: usize, actual: usize },

    #[error("Parameter {index} = {value:e} m is outside [{lower:e}, {upper:e}] m")]
    OutOfBounds {
        index: usize,
        value: f64,
        lower: f64,
        upper: f64,
    },

    #[error("Parameter {index} is not finite")]
    NonFinite { index: usize },

    #[error("Spline knots must be strictly increasing (violated at knot {index})")]
    NonMonotonicKnots { index: usize },

    #[error("Spline needs at least {required} knots, got {actual}")]
    InsufficientKnots { required: usize, actual: usize },

    #[error("Knot and value arrays differ in length: {knots} vs {values}")]
    LengthMismatch { knots: usize, values: usize },

    #[error("Singular system while fitting spline")]
    SingularSystem,

    #[error("Polygon is self-intersecting (edges {first} and {second})")]
    SelfIntersecting { first: usize, second: usize },

    #[error("Polygon has {vertices} vertices, layout limit is {limit}")]
    TooManyVertices { vertices: usize, limit: usize },

    #[error("Degenerate polygon: {message}")]
    Degenerate { message: String },

    #[error("Invalid grid: {message}")]
    InvalidGrid { message: String },
}

/// Errors surfaced by the external solver. These are propagated as-is; no
/// retry or recovery happens in this layer.
#[derive(Error, Debug)]
pub enum SolverError {
    #[error("Solver licence unavailable: {message}")]
    License { message: String },

    #[error("Solver process {program} exited with status {status}: {stderr}")]
    ProcessFailed {
        program: String,
        status: String,
        stderr: String,
    },

    #[error("Failed to launch solver process {program}: {source}")]
    Launch {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Simulation did not converge: {message}")]
    Unconverged { message: String },

    #[error("Solver session is not initialised: {message}")]
    NotInitialised { message: String },

    #[error("Could not read solver output {path}: {message}")]
    Output { path: String, message: String },

    #[error("Sensitivity grid {actual} does not match optimisation grid {expected}")]
    GridMismatch { expected: String, actual: String },

    #[error("Solver IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Missing dependencies detected at startup, before any solver call
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DependencyError {
    #[error("Solver installation not configured: set LUMERICAL_PATH or solver.install_path")]
    InstallPathUnset,

    #[error("Solver installation not found at {path}")]
    InstallNotFound { path: String },

    #[error("Solver executable {binary} missing from {path}")]
    BinaryMissing { binary: String, path: String },
}

/// Run-directory artifact errors
#[derive(Error, Debug)]
pub enum ArtifactError {
    #[error("Run directory not found: {path}")]
    RunNotFound { path: String },

    #[error("No run directories under {path}")]
    NoRuns { path: String },

    #[error("Malformed record {path}: {message}")]
    Malformed { path: String, message: String },

    #[error("Layout export failed: {message}")]
    Layout { message: String },

    #[error("Plot rendering failed: {message}")]
    Plot { message: String },
}

/// Result type alias for toolkit operations
pub type YbResult<T> = Result<T, YbError>;

/// Result type alias for solver session calls
pub type SolverResult<T> = Result<T, SolverError>;

/// Result type alias for geometry operations
pub type GeometryResult<T> = Result<T, GeometryError>;

/// Macro for creating validation errors
#[macro_export]
macro_rules! validation_error {
    ($($arg:tt)*) => {
        $crate::YbError::Validation(format!($($arg)*))
    };
}

/// Macro for creating internal errors
#[macro_export]
macro_rules! internal_error {
    ($($arg:tt)*) => {
        $crate::YbError::Internal(format!($($arg)*))
    };
}

/// Macro for creating configuration errors
#[macro_export]
macro_rules! config_error {
    ($($arg:tt)*) => {
        $crate::YbError::Config(format!($($arg)*))
    };
}
