//! Writes run artifacts as the optimization progresses.
//!
//! JSON files are written to a temporary sibling and renamed into place,
//! so a concurrent reader sees either the old or the new file. Readers
//! still have to cope with truncated files left behind by a crash.

use std::fmt::Write as _;
use std::path::Path;

use chrono::Utc;
use serde::Serialize;
use tracing::{debug, info};
use yb_types::{to_um, IterationRecord, RunConfig, RunStatus, YbResult};

use crate::layout::RunLayout;

#[derive(Debug)]
pub struct RunWriter {
    layout: RunLayout,
}

impl RunWriter {
    /// Create a new run directory for `config` and store the configuration.
    pub fn create(config: &RunConfig) -> YbResult<Self> {
        let layout = RunLayout::create(&config.output_root, &config.name, Utc::now())?;
        let writer = Self { layout };
        writer.write_json(&writer.layout.config_path(), config)?;
        info!(run_dir = %writer.layout.root().display(), "run directory created");
        Ok(writer)
    }

    /// Writer over an existing layout.
    pub fn open(layout: RunLayout) -> YbResult<Self> {
        std::fs::create_dir_all(layout.iterations_dir())?;
        Ok(Self { layout })
    }

    pub fn layout(&self) -> &RunLayout {
        &self.layout
    }

    pub fn write_status(&self, status: &RunStatus) -> YbResult<()> {
        self.write_json(&self.layout.status_path(), status)
    }

    pub fn append_iteration(&self, record: &IterationRecord) -> YbResult<()> {
        let path = self.layout.iteration_path(record.iteration);
        self.write_json(&path, record)?;
        debug!(iteration = record.iteration, path = %path.display(), "iteration recorded");
        Ok(())
    }

    /// Human-readable parameter dump, rewritten every iteration.
    pub fn write_parameters(&self, iteration: u64, fom: f64, params: &[f64]) -> YbResult<()> {
        let mut text = String::new();
        let _ = writeln!(text, "# iteration {}", iteration);
        let _ = writeln!(text, "# fom {:.9}", fom);
        let _ = writeln!(text, "# index  offset_um  offset_m");
        for (i, p) in params.iter().enumerate() {
            let _ = writeln!(text, "{:5}  {:.6}  {:e}", i, to_um(*p), p);
        }
        write_atomic(&self.layout.parameters_path(), text.as_bytes())
    }

    fn write_json<T: Serialize>(&self, path: &Path, value: &T) -> YbResult<()> {
        let text = serde_json::to_string_pretty(value)?;
        write_atomic(path, text.as_bytes())
    }
}

fn write_atomic(path: &Path, bytes: &[u8]) -> YbResult<()> {
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    std::fs::write(&tmp, bytes)?;
    std::fs::rename(&tmp, path)?;
    Ok(())
}
