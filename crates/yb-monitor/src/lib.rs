//! Read-only progress monitor for Y-branch optimization runs.
//!
//! Provides:
//! - One-shot status reports over a run directory
//! - A watch loop that refreshes on a fixed interval until Ctrl-C
//! - Figure-of-merit history and latest-shape plots rendered outside the
//!   observed directory

pub mod monitor;
pub mod report;

pub use monitor::{
    render_plot, render_shape, resolve_run_dir, watch, RunMonitor, DEFAULT_INTERVAL,
};
pub use report::MonitorReport;
