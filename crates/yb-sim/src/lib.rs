pub mod lumerical;
pub mod probe;
pub mod session;
pub mod setup;
pub mod surrogate;

pub use lumerical::LumericalSession;
pub use probe::{binary_name, probe_dependencies, probe_install, SolverInstallation};
pub use session::*;
pub use setup::*;
pub use surrogate::{reference_params, SurrogateSession};
