pub mod bounds;
pub mod config;
pub mod errors;
pub mod history;
pub mod units;

pub use bounds::*;
pub use config::*;
pub use errors::*;
pub use history::*;
pub use units::*;
