//! One-file-per-record JSON store.
//!
//! Layout inside the store directory:
//!
//! ```text
//! <slug>.json      one record per identifier
//! _failed.json     identifiers still failing after the last run (only while non-empty)
//! _report.json     last audit report, rewritten on every audit
//! ```
//!
//! Every write goes to a temporary file in the same directory and is then
//! renamed into place, so a reader sees either the previous file or the new
//! one, never a partial write. Names starting with `_` or `.` are never
//! records.

use std::collections::BTreeSet;
use std::fs;
use std::io::{BufWriter, ErrorKind, Write};
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde::de::DeserializeOwned;
use tempfile::NamedTempFile;
use thiserror::Error;
use tracing::{debug, instrument};

use crate::record::Record;

/// File holding the outstanding failure set.
pub const FAILED_FILE: &str = "_failed.json";

/// File holding the last audit report.
pub const REPORT_FILE: &str = "_report.json";

const RECORD_EXTENSION: &str = "json";

/// Errors produced by the record store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// I/O error reading or writing a store file.
    #[error("IO error at {path}: {source}")]
    Io {
        /// The file or directory involved.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// A stored file is not valid JSON for its expected shape.
    #[error("malformed JSON in {path}: {source}")]
    Json {
        /// The offending file.
        path: PathBuf,
        /// The underlying decode error.
        #[source]
        source: serde_json::Error,
    },

    /// The identifier cannot name a record file.
    #[error("invalid identifier '{identifier}': {reason}")]
    InvalidIdentifier {
        /// The rejected identifier.
        identifier: String,
        /// Why it was rejected.
        reason: &'static str,
    },
}

impl StoreError {
    fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    fn json(path: impl Into<PathBuf>, source: serde_json::Error) -> Self {
        Self::Json {
            path: path.into(),
            source,
        }
    }
}

/// Handle to a store directory.
#[derive(Debug, Clone)]
pub struct RecordStore {
    root: PathBuf,
}

impl RecordStore {
    /// Opens the store at `root`, creating the directory if needed.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Io`] if the directory cannot be created.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let root = root.into();
        fs::create_dir_all(&root).map_err(|e| StoreError::io(&root, e))?;
        Ok(Self { root })
    }

    /// Returns the store directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Returns the path a record for `identifier` is stored at.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::InvalidIdentifier`] for identifiers that cannot
    /// name a record file.
    pub fn record_path(&self, identifier: &str) -> Result<PathBuf, StoreError> {
        validate_identifier(identifier)?;
        Ok(self
            .root
            .join(format!("{identifier}.{RECORD_EXTENSION}")))
    }

    /// Returns the failure set path.
    #[must_use]
    pub fn failures_path(&self) -> PathBuf {
        self.root.join(FAILED_FILE)
    }

    /// Returns the report path.
    #[must_use]
    pub fn report_path(&self) -> PathBuf {
        self.root.join(REPORT_FILE)
    }

    /// Returns true when a record for `identifier` exists.
    #[must_use]
    pub fn contains(&self, identifier: &str) -> bool {
        self.record_path(identifier)
            .map(|path| path.is_file())
            .unwrap_or(false)
    }

    /// Writes `record` under its slug, replacing any previous record.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on invalid identifier, serialization or I/O failure.
    #[instrument(skip(self, record), fields(slug = %record.slug))]
    pub fn save(&self, record: &Record) -> Result<PathBuf, StoreError> {
        let path = self.record_path(&record.slug)?;
        self.write_json_atomic(&path, record)?;
        debug!(path = %path.display(), "record saved");
        Ok(path)
    }

    /// Reads the record for `identifier`, if present.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on I/O failure or malformed JSON.
    pub fn load(&self, identifier: &str) -> Result<Option<Record>, StoreError> {
        let path = self.record_path(identifier)?;
        read_json(&path)
    }

    /// Deletes the record for `identifier`. Returns whether a file was removed.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on invalid identifier or I/O failure.
    pub fn remove(&self, identifier: &str) -> Result<bool, StoreError> {
        let path = self.record_path(identifier)?;
        remove_if_exists(&path)
    }

    /// Lists stored identifiers, sorted.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Io`] if the directory cannot be read.
    pub fn identifiers(&self) -> Result<Vec<String>, StoreError> {
        let entries = fs::read_dir(&self.root).map_err(|e| StoreError::io(&self.root, e))?;
        let mut identifiers = BTreeSet::new();
        for entry in entries {
            let entry = entry.map_err(|e| StoreError::io(&self.root, e))?;
            let path = entry.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some(RECORD_EXTENSION) {
                continue;
            }
            let Some(stem) = path.file_stem().and_then(|stem| stem.to_str()) else {
                continue;
            };
            if validate_identifier(stem).is_ok() && path.is_file() {
                identifiers.insert(stem.to_string());
            }
        }
        Ok(identifiers.into_iter().collect())
    }

    /// Reads the failure set. `None` when no failures are outstanding.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on I/O failure or malformed JSON.
    pub fn load_failures(&self) -> Result<Option<Vec<String>>, StoreError> {
        read_json(&self.failures_path())
    }

    /// Replaces the failure set; an empty list clears it.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on serialization or I/O failure.
    pub fn save_failures(&self, identifiers: &[String]) -> Result<(), StoreError> {
        if identifiers.is_empty() {
            self.clear_failures()?;
            return Ok(());
        }
        self.write_json_atomic(&self.failures_path(), &identifiers)
    }

    /// Deletes the failure set. Returns whether a file was removed.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Io`] if removal fails.
    pub fn clear_failures(&self) -> Result<bool, StoreError> {
        remove_if_exists(&self.failures_path())
    }

    /// Writes the audit report, replacing the previous one.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on serialization or I/O failure.
    pub fn save_report<T: Serialize>(&self, report: &T) -> Result<PathBuf, StoreError> {
        let path = self.report_path();
        self.write_json_atomic(&path, report)?;
        Ok(path)
    }

    fn write_json_atomic<T: Serialize + ?Sized>(
        &self,
        path: &Path,
        value: &T,
    ) -> Result<(), StoreError> {
        let temp = tempfile::Builder::new()
            .prefix(".tmp-")
            .tempfile_in(&self.root)
            .map_err(|e| StoreError::io(&self.root, e))?;
        write_pretty(temp, path, value)
    }
}

fn write_pretty<T: Serialize + ?Sized>(
    temp: NamedTempFile,
    path: &Path,
    value: &T,
) -> Result<(), StoreError> {
    {
        let mut writer = BufWriter::new(temp.as_file());
        serde_json::to_writer_pretty(&mut writer, value).map_err(|e| StoreError::json(path, e))?;
        writer.flush().map_err(|e| StoreError::io(path, e))?;
    }
    temp.as_file()
        .sync_all()
        .map_err(|e| StoreError::io(path, e))?;
    // Dropping `temp` on an earlier error removes the partial file.
    temp.persist(path)
        .map_err(|e| StoreError::io(path, e.error))?;
    Ok(())
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>, StoreError> {
    let raw = match fs::read(path) {
        Ok(raw) => raw,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(StoreError::io(path, e)),
    };
    serde_json::from_slice(&raw)
        .map(Some)
        .map_err(|e| StoreError::json(path, e))
}

fn remove_if_exists(path: &Path) -> Result<bool, StoreError> {
    match fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
        Err(e) => Err(StoreError::io(path, e)),
    }
}

fn validate_identifier(identifier: &str) -> Result<(), StoreError> {
    let reason = if identifier.trim().is_empty() {
        Some("empty")
    } else if identifier.contains(['/', '\\']) {
        Some("contains a path separator")
    } else if identifier.starts_with(['.', '_']) {
        Some("reserved prefix")
    } else {
        None
    };

    match reason {
        Some(reason) => Err(StoreError::InvalidIdentifier {
            identifier: identifier.to_string(),
            reason,
        }),
        None => Ok(()),
    }
}
