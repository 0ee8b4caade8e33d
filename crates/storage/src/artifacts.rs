// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Artifact layout for run outputs.
//!
//! Every run pre-allocates a report id, so screenshots and videos land under
//! per-report directories with no cross-run contention:
//!
//! - `reports/screenshots/<reportId>/<deviceId>/<nodeId>_<kind>_<ts>.png`
//! - `reports/videos/<reportId>/<deviceId>.mp4`

use std::fs;
use std::path::{Path, PathBuf};

use dl_core::{DeviceId, ReportId, ScreenshotKind};

use crate::store::{sanitize_id, StorageError};

/// Writes run artifacts under a configurable root.
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    root: PathBuf,
}

impl ArtifactStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn screenshot_dir(&self, report_id: &ReportId, device_id: &DeviceId) -> PathBuf {
        self.root
            .join("reports/screenshots")
            .join(report_id.as_str())
            .join(sanitize_id(device_id.as_str()))
    }

    /// Persist a PNG capture and return its path.
    pub fn write_screenshot(
        &self,
        report_id: &ReportId,
        device_id: &DeviceId,
        node_id: &str,
        kind: ScreenshotKind,
        epoch_ms: u64,
        png: &[u8],
    ) -> Result<PathBuf, StorageError> {
        let dir = self.screenshot_dir(report_id, device_id);
        fs::create_dir_all(&dir)?;
        let path = dir.join(format!("{}_{}_{}.png", sanitize_id(node_id), kind, epoch_ms));
        fs::write(&path, png)?;
        Ok(path)
    }

    /// Persist an H.264 MP4 recording and return its path.
    pub fn write_video(
        &self,
        report_id: &ReportId,
        device_id: &DeviceId,
        mp4: &[u8],
    ) -> Result<PathBuf, StorageError> {
        let dir = self.root.join("reports/videos").join(report_id.as_str());
        fs::create_dir_all(&dir)?;
        let path = dir.join(format!("{}.mp4", sanitize_id(device_id.as_str())));
        fs::write(&path, mp4)?;
        Ok(path)
    }
}

#[cfg(test)]
#[path = "artifacts_tests.rs"]
mod tests;
