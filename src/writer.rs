//! Persisting accumulated records.

use std::io::Write;
use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::ris::{format_records, RisRecord};

/// Where the final flush ended up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteOutcome {
    /// Nothing to write.
    Empty,
    /// Written to the primary path.
    Primary(PathBuf),
    /// Primary failed; written to the backup path.
    Backup(PathBuf),
    /// Both paths failed.
    Failed,
}

/// Destination for accumulated records.
///
/// Called from a blocking context; implementations may do synchronous I/O.
pub trait ResultSink: Send + Sync {
    /// Persist a snapshot of the records completed so far.
    fn checkpoint(&self, records: &[RisRecord]);

    /// Persist the final set of records.
    fn finish(&self, records: &[RisRecord]) -> WriteOutcome;
}

/// Writes records to an RIS file plus a `.backup` sibling.
#[derive(Debug, Clone)]
pub struct RisFileWriter {
    path: PathBuf,
    backup: PathBuf,
}

impl RisFileWriter {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let backup = backup_path(&path);
        Self { path, backup }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn backup(&self) -> &Path {
        &self.backup
    }
}

impl ResultSink for RisFileWriter {
    fn checkpoint(&self, records: &[RisRecord]) {
        let contents = format_records(records);
        for target in [&self.path, &self.backup] {
            if let Err(e) = write_atomic(target, &contents) {
                tracing::warn!(path = %target.display(), error = %e, "checkpoint write failed");
            }
        }
        tracing::info!(records = records.len(), path = %self.path.display(), "checkpoint saved");
    }

    fn finish(&self, records: &[RisRecord]) -> WriteOutcome {
        if records.is_empty() {
            return WriteOutcome::Empty;
        }
        let contents = format_records(records);
        match write_atomic(&self.path, &contents) {
            Ok(()) => WriteOutcome::Primary(self.path.clone()),
            Err(e) => {
                tracing::error!(path = %self.path.display(), error = %e, "failed to write output");
                match write_atomic(&self.backup, &contents) {
                    Ok(()) => WriteOutcome::Backup(self.backup.clone()),
                    Err(e) => {
                        tracing::error!(
                            path = %self.backup.display(),
                            error = %e,
                            "failed to write backup as well"
                        );
                        WriteOutcome::Failed
                    }
                }
            }
        }
    }
}

/// `<path>.backup`
pub fn backup_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(".backup");
    PathBuf::from(name)
}

/// Write through a temporary sibling and rename over the target, so readers
/// never observe a half-written file.
pub fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    let mut tmp_name = path.as_os_str().to_os_string();
    tmp_name.push(".tmp");
    let tmp = PathBuf::from(tmp_name);

    let result = (|| -> Result<()> {
        let mut file = std::fs::File::create(&tmp)?;
        file.write_all(contents.as_bytes())?;
        file.sync_all()?;
        std::fs::rename(&tmp, path)?;
        Ok(())
    })();

    if result.is_err() {
        let _ = std::fs::remove_file(&tmp);
    }
    result
}
