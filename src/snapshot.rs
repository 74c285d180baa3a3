// src/snapshot.rs
//! Snapshot writer: dumps the full fetch result and the matched subset as
//! pretty JSON. Each write fully replaces the previous file.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tempfile::NamedTempFile;

use crate::error::CycleError;
use crate::ingest::types::{NormalizedMessage, SnapshotEntry};

pub const DEFAULT_ALL_FILE: &str = "all_messages.json";
pub const DEFAULT_FILTERED_FILE: &str = "filtered_messages.json";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotWriter {
    all_path: PathBuf,
    filtered_path: PathBuf,
}

impl SnapshotWriter {
    pub fn new(dir: &Path, all_file: &str, filtered_file: &str) -> Self {
        Self {
            all_path: dir.join(all_file),
            filtered_path: dir.join(filtered_file),
        }
    }

    /// Default file names inside `dir`.
    pub fn in_dir(dir: &Path) -> Self {
        Self::new(dir, DEFAULT_ALL_FILE, DEFAULT_FILTERED_FILE)
    }

    pub fn all_path(&self) -> &Path {
        &self.all_path
    }

    pub fn filtered_path(&self) -> &Path {
        &self.filtered_path
    }

    pub fn write(
        &self,
        all: &[SnapshotEntry],
        matched: &[NormalizedMessage],
    ) -> Result<(), CycleError> {
        write_json(&self.all_path, all)?;
        write_json(&self.filtered_path, matched)?;
        tracing::debug!(
            all = %self.all_path.display(),
            filtered = %self.filtered_path.display(),
            "snapshots written"
        );
        Ok(())
    }
}

fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<(), CycleError> {
    let io_err = |source| CycleError::Snapshot {
        path: path.to_path_buf(),
        source,
    };

    // serde_json never escapes non-ASCII, so Arabic/Persian text stays readable.
    let json = serde_json::to_string_pretty(value).map_err(|source| CycleError::Serialize {
        path: path.to_path_buf(),
        source,
    })?;

    let parent = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or(Path::new("."));
    fs::create_dir_all(parent).map_err(io_err)?;

    // Unique temp file per write; concurrent cycles race on the rename and the
    // last one wins.
    let mut tmp = NamedTempFile::new_in(parent).map_err(io_err)?;
    tmp.write_all(json.as_bytes()).map_err(io_err)?;
    tmp.flush().map_err(io_err)?;
    tmp.persist(path).map_err(|e| io_err(e.error))?;
    Ok(())
}
