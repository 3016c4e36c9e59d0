//! Polling monitor over a run directory.
//!
//! The [`RunMonitor`] re-reads the run directory on every [`RunMonitor::poll`]
//! and logs what changed since the previous pass. It never writes into the
//! directory it observes; a bad record or status file shows up in the report
//! and the pass carries on.

use std::future::Future;
use std::ops::ControlFlow;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::{debug, info, warn};
use yb_data::{find_latest_run, plot_fom_history, plot_shape, RunReader};
use yb_geometry::YBranchGeometry;
use yb_types::{ArtifactError, RunState, YbResult};

use crate::report::MonitorReport;

/// Default refresh period of `--watch`.
pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(10);

/// The directory to observe: `folder` itself, or with `latest` the most
/// recently active run directory under it.
pub fn resolve_run_dir(folder: &Path, latest: bool) -> Result<PathBuf, ArtifactError> {
    if latest {
        let run = find_latest_run(folder)?;
        info!(run_dir = %run.display(), "latest run selected");
        Ok(run)
    } else if folder.is_dir() {
        Ok(folder.to_path_buf())
    } else {
        Err(ArtifactError::RunNotFound {
            path: folder.display().to_string(),
        })
    }
}

pub struct RunMonitor {
    reader: RunReader,
    last_iteration: Option<u64>,
    last_state: Option<RunState>,
    last_skipped: usize,
}

impl RunMonitor {
    pub fn open<P: AsRef<Path>>(run_dir: P) -> Result<Self, ArtifactError> {
        Ok(Self {
            reader: RunReader::open(run_dir)?,
            last_iteration: None,
            last_state: None,
            last_skipped: 0,
        })
    }

    pub fn run_dir(&self) -> &Path {
        self.reader.root()
    }

    /// Geometry of the observed run, rebuilt from its stored configuration.
    pub fn geometry(&self) -> YbResult<YBranchGeometry> {
        let config = self
            .reader
            .read_config()?
            .ok_or_else(|| ArtifactError::Plot {
                message: format!("{} has no stored configuration", self.run_dir().display()),
            })?;
        Ok(YBranchGeometry::from_config(&config.geometry)?)
    }

    /// One monitoring pass. Never fails: unreadable files are reported
    /// in the returned snapshot.
    pub fn poll(&mut self) -> MonitorReport {
        let mut report = MonitorReport::empty(self.run_dir().to_path_buf());

        match self.reader.read_status() {
            Ok(status) => report.status = status,
            Err(e) => {
                warn!(error = %e, "status file unreadable");
                report.status_error = Some(e.to_string());
            }
        }

        let history = self.reader.read_history();
        report.records = history.len();
        report.latest = history.latest().cloned();
        report.best = history.best().cloned();
        report.series = history.fom_series();
        report.skipped = history
            .skipped
            .iter()
            .map(|s| format!("{}: {}", s.path.display(), s.reason))
            .collect();

        self.note_changes(&report);
        report
    }

    fn note_changes(&mut self, report: &MonitorReport) {
        let iteration = report.latest_iteration();
        if iteration != self.last_iteration {
            if let Some(latest) = &report.latest {
                info!(
                    iteration = latest.iteration,
                    fom = latest.fom,
                    gradient_norm = latest.gradient_norm(),
                    "new iteration"
                );
            }
            self.last_iteration = iteration;
        }

        let state = report.state();
        if state != self.last_state {
            if let Some(state) = state {
                info!(%state, "run state changed");
            }
            self.last_state = state;
        }

        if report.skipped.len() > self.last_skipped {
            warn!(
                skipped = report.skipped.len(),
                "some iteration records could not be read"
            );
        }
        self.last_skipped = report.skipped.len();
        debug!(records = report.records, "monitor pass");
    }
}

/// Render the FOM history of `report` to `path`, which must lie outside
/// the observed run directory.
pub fn render_plot(report: &MonitorReport, path: &Path) -> Result<(), ArtifactError> {
    if is_inside(&report.run_dir, path) {
        return Err(ArtifactError::Plot {
            message: format!("{} is inside the observed run directory", path.display()),
        });
    }
    let title = report
        .status
        .as_ref()
        .map(|s| format!("{} figure of merit", s.name))
        .unwrap_or_else(|| "figure of merit".to_string());
    plot_fom_history(&report.series, path, &title)?;
    debug!(path = %path.display(), "history plot written");
    Ok(())
}

/// Render the outline of the latest recorded design to `path`, outside the
/// observed run directory.
pub fn render_shape(
    report: &MonitorReport,
    geometry: &YBranchGeometry,
    path: &Path,
) -> YbResult<()> {
    if is_inside(&report.run_dir, path) {
        return Err(ArtifactError::Plot {
            message: format!("{} is inside the observed run directory", path.display()),
        }
        .into());
    }
    let latest = report.latest.as_ref().ok_or_else(|| ArtifactError::Plot {
        message: "no iterations to plot".into(),
    })?;
    let polygon = geometry.outline(&latest.params)?;
    let knots = geometry.control_points(&latest.params);
    let title = format!("iteration {}  fom {:.4}", latest.iteration, latest.fom);
    plot_shape(&polygon, &knots, path, &title)?;
    debug!(path = %path.display(), iteration = latest.iteration, "shape plot written");
    Ok(())
}

fn is_inside(dir: &Path, path: &Path) -> bool {
    let dir = dir.canonicalize().unwrap_or_else(|_| dir.to_path_buf());
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };
    let parent = parent.canonicalize().unwrap_or(parent);
    parent.starts_with(&dir)
}

/// Poll every `period` until `shutdown` resolves or `on_report` breaks.
/// Returns the number of passes made.
pub async fn watch<F, R>(
    mut monitor: RunMonitor,
    period: Duration,
    shutdown: F,
    mut on_report: R,
) -> u64
where
    F: Future<Output = ()>,
    R: FnMut(&MonitorReport) -> ControlFlow<()>,
{
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    tokio::pin!(shutdown);

    let mut passes = 0;
    loop {
        tokio::select! {
            _ = &mut shutdown => {
                info!(passes, "monitor stopped");
                break;
            }
            _ = ticker.tick() => {
                let report = monitor.poll();
                passes += 1;
                if on_report(&report).is_break() {
                    break;
                }
            }
        }
    }
    passes
}
