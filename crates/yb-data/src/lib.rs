pub mod layout;
pub mod plot;
pub mod reader;
pub mod writer;

pub use layout::*;
pub use plot::{plot_fom_history, plot_shape};
pub use reader::{find_latest_run, History, RunReader, SkippedRecord};
pub use writer::RunWriter;
