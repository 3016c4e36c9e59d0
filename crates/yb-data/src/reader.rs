//! Tolerant reader over a run directory.
//!
//! The writer may be mid-update while we read. Missing files mean the run
//! has not got that far yet; unreadable or truncated records are skipped
//! and reported, never fatal.

use std::path::{Path, PathBuf};
use std::time::SystemTime;

use serde::de::DeserializeOwned;
use tracing::{debug, warn};
use yb_types::{ArtifactError, IterationRecord, RunConfig, RunStatus};

use crate::layout::{parse_iteration_file_name, RunLayout};

/// A record that could not be used.
#[derive(Debug, Clone, PartialEq)]
pub struct SkippedRecord {
    pub path: PathBuf,
    pub reason: String,
}

/// Iteration history recovered from disk.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct History {
    /// Good records, ordered by iteration.
    pub records: Vec<IterationRecord>,
    pub skipped: Vec<SkippedRecord>,
}

impl History {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn latest(&self) -> Option<&IterationRecord> {
        self.records.last()
    }

    pub fn best(&self) -> Option<&IterationRecord> {
        self.records
            .iter()
            .max_by(|a, b| a.fom.total_cmp(&b.fom))
    }

    /// `(iteration, fom)` pairs for plotting.
    pub fn fom_series(&self) -> Vec<(u64, f64)> {
        self.records.iter().map(|r| (r.iteration, r.fom)).collect()
    }
}

#[derive(Debug, Clone)]
pub struct RunReader {
    layout: RunLayout,
}

impl RunReader {
    pub fn open<P: AsRef<Path>>(root: P) -> Result<Self, ArtifactError> {
        let root = root.as_ref();
        if !root.is_dir() {
            return Err(ArtifactError::RunNotFound {
                path: root.display().to_string(),
            });
        }
        Ok(Self {
            layout: RunLayout::new(root),
        })
    }

    pub fn layout(&self) -> &RunLayout {
        &self.layout
    }

    pub fn root(&self) -> &Path {
        self.layout.root()
    }

    /// `Ok(None)` while the writer has not produced the file yet.
    pub fn read_status(&self) -> Result<Option<RunStatus>, ArtifactError> {
        read_optional_json(&self.layout.status_path())
    }

    pub fn read_config(&self) -> Result<Option<RunConfig>, ArtifactError> {
        read_optional_json(&self.layout.config_path())
    }

    /// All parseable iteration records. Each bad file is logged at `warn`
    /// and listed in [`History::skipped`].
    pub fn read_history(&self) -> History {
        let mut history = History::default();
        let dir = self.layout.iterations_dir();
        let entries = match std::fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) => {
                debug!(dir = %dir.display(), error = %e, "no iterations yet");
                return history;
            }
        };

        let mut files: Vec<(u64, PathBuf)> = entries
            .filter_map(|entry| entry.ok())
            .filter_map(|entry| {
                let name = entry.file_name();
                parse_iteration_file_name(&name.to_string_lossy()).map(|n| (n, entry.path()))
            })
            .collect();
        files.sort();

        for (number, path) in files {
            match read_json::<IterationRecord>(&path) {
                Ok(record) if record.iteration == number => history.records.push(record),
                Ok(record) => {
                    let reason = format!(
                        "file name says iteration {}, record says {}",
                        number, record.iteration
                    );
                    warn!(path = %path.display(), %reason, "skipping iteration record");
                    history.skipped.push(SkippedRecord { path, reason });
                }
                Err(e) => {
                    let reason = e.to_string();
                    warn!(path = %path.display(), %reason, "skipping iteration record");
                    history.skipped.push(SkippedRecord { path, reason });
                }
            }
        }
        history
    }
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, ArtifactError> {
    let text = std::fs::read_to_string(path).map_err(|e| ArtifactError::Malformed {
        path: path.display().to_string(),
        message: e.to_string(),
    })?;
    serde_json::from_str(&text).map_err(|e| ArtifactError::Malformed {
        path: path.display().to_string(),
        message: e.to_string(),
    })
}

fn read_optional_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>, ArtifactError> {
    if !path.exists() {
        return Ok(None);
    }
    read_json(path).map(Some)
}

/// Most recently modified run directory directly under `base`.
pub fn find_latest_run<P: AsRef<Path>>(base: P) -> Result<PathBuf, ArtifactError> {
    let base = base.as_ref();
    let entries = std::fs::read_dir(base).map_err(|_| ArtifactError::RunNotFound {
        path: base.display().to_string(),
    })?;

    let mut latest: Option<(SystemTime, PathBuf)> = None;
    for entry in entries.filter_map(|e| e.ok()) {
        let path = entry.path();
        if !RunLayout::is_run_dir(&path) {
            continue;
        }
        let modified = last_activity(&path);
        let newer = match &latest {
            None => true,
            Some((t, p)) => (modified, &path) > (*t, p),
        };
        if newer {
            latest = Some((modified, path));
        }
    }

    latest
        .map(|(_, path)| path)
        .ok_or_else(|| ArtifactError::NoRuns {
            path: base.display().to_string(),
        })
}

/// Newest mtime of the directory and its status and iterations entries.
/// Writing a new record updates the iterations directory, not the run
/// directory itself.
fn last_activity(dir: &Path) -> SystemTime {
    let layout = RunLayout::new(dir);
    [dir.to_path_buf(), layout.status_path(), layout.iterations_dir()]
        .iter()
        .filter_map(|p| std::fs::metadata(p).and_then(|m| m.modified()).ok())
        .max()
        .unwrap_or(SystemTime::UNIX_EPOCH)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::writer::RunWriter;

    fn record(iteration: u64, fom: f64) -> IterationRecord {
        IterationRecord::new(iteration, vec![0.5e-6; 2], fom, vec![0.0; 2])
    }

    fn run_with(dir: &Path, n: u64) -> RunWriter {
        let writer = RunWriter::open(RunLayout::new(dir)).unwrap();
        for i in 1..=n {
            writer.append_iteration(&record(i, 0.1 * i as f64)).unwrap();
        }
        writer
    }

    #[test]
    fn reads_all_good_records_in_order() {
        let dir = tempfile::tempdir().unwrap();
        run_with(dir.path(), 12);
        let history = RunReader::open(dir.path()).unwrap().read_history();
        assert_eq!(history.len(), 12);
        assert!(history.skipped.is_empty());
        assert_eq!(history.latest().unwrap().iteration, 12);
        let iterations: Vec<u64> = history.records.iter().map(|r| r.iteration).collect();
        assert_eq!(iterations, (1..=12).collect::<Vec<_>>());
    }

    #[test]
    fn truncated_latest_record_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let writer = run_with(dir.path(), 4);
        let path = writer.layout().iteration_path(5);
        std::fs::write(&path, r#"{"iteration": 5, "params": [0.1"#).unwrap();

        let history = RunReader::open(dir.path()).unwrap().read_history();
        assert_eq!(history.latest().unwrap().iteration, 4);
        assert_eq!(history.skipped.len(), 1);
        assert_eq!(history.skipped[0].path, path);
    }

    #[test]
    fn mislabelled_and_foreign_files() {
        let dir = tempfile::tempdir().unwrap();
        let writer = run_with(dir.path(), 2);
        let iterations = writer.layout().iterations_dir();
        std::fs::write(
            iterations.join("iter_0003.json"),
            serde_json::to_string(&record(9, 0.5)).unwrap(),
        )
        .unwrap();
        std::fs::write(iterations.join("notes.txt"), "hello").unwrap();
        std::fs::write(iterations.join("iter_0004.json.tmp"), "{").unwrap();

        let history = RunReader::open(dir.path()).unwrap().read_history();
        assert_eq!(history.len(), 2);
        assert_eq!(history.skipped.len(), 1);
    }

    #[test]
    fn empty_run_directory() {
        let dir = tempfile::tempdir().unwrap();
        let reader = RunReader::open(dir.path()).unwrap();
        assert!(reader.read_history().is_empty());
        assert!(reader.read_status().unwrap().is_none());
        assert!(reader.read_config().unwrap().is_none());
    }

    #[test]
    fn corrupt_status_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("status.json"), "{\"state\":").unwrap();
        let err = RunReader::open(dir.path()).unwrap().read_status().unwrap_err();
        assert!(matches!(err, ArtifactError::Malformed { .. }));
    }

    #[test]
    fn best_record() {
        let history = History {
            records: vec![record(1, 0.2), record(2, 0.9), record(3, 0.5)],
            skipped: Vec::new(),
        };
        assert_eq!(history.best().unwrap().iteration, 2);
        assert_eq!(history.fom_series()[1], (2, 0.9));
    }

    #[test]
    fn missing_run_directory() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            RunReader::open(dir.path().join("absent")),
            Err(ArtifactError::RunNotFound { .. })
        ));
    }

    #[test]
    fn latest_run_by_activity() {
        let base = tempfile::tempdir().unwrap();
        let old = base.path().join("y_branch_20240101_000000");
        let new = base.path().join("y_branch_20240102_000000");
        std::fs::create_dir_all(old.join("iterations")).unwrap();
        std::fs::create_dir_all(new.join("iterations")).unwrap();
        std::fs::create_dir_all(base.path().join("not_a_run")).unwrap();

        let stale = SystemTime::UNIX_EPOCH + std::time::Duration::from_secs(1_000_000);
        for p in [old.clone(), old.join("iterations")] {
            std::fs::File::open(&p).unwrap().set_modified(stale).unwrap();
        }
        assert_eq!(find_latest_run(base.path()).unwrap(), new);

        let empty = tempfile::tempdir().unwrap();
        assert!(matches!(
            find_latest_run(empty.path()),
            Err(ArtifactError::NoRuns { .. })
        ));
    }
}
