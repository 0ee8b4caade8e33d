// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Schedule fire history, kept as a bounded ring in one document.

use std::fs;
use std::path::PathBuf;

use dl_core::ScheduleHistoryEntry;

use crate::store::StorageError;

/// Maximum retained history entries. Oldest entries fall off first.
pub const HISTORY_CAP: usize = 100;

/// Append-mostly history store backed by `schedules/_history.json`.
#[derive(Debug, Clone)]
pub struct ScheduleHistoryStore {
    path: PathBuf,
}

impl ScheduleHistoryStore {
    pub fn new(data_root: impl Into<PathBuf>) -> Self {
        Self {
            path: data_root.into().join("schedules/_history.json"),
        }
    }

    /// Read all retained entries, newest last.
    pub fn read(&self) -> Result<Vec<ScheduleHistoryEntry>, StorageError> {
        let data = match fs::read(&self.path) {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        Ok(serde_json::from_slice(&data)?)
    }

    /// Append an entry, trimming to [`HISTORY_CAP`].
    pub fn append(&self, entry: ScheduleHistoryEntry) -> Result<(), StorageError> {
        let mut entries = self.read()?;
        entries.push(entry);
        if entries.len() > HISTORY_CAP {
            let excess = entries.len() - HISTORY_CAP;
            entries.drain(..excess);
        }
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let data = serde_json::to_vec_pretty(&entries)?;
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, data)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

#[cfg(test)]
#[path = "history_tests.rs"]
mod tests;
