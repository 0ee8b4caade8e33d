// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon configuration: env-resolved data dir plus an optional
//! `daemon.toml` next to it.

use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::{env, LifecycleError};

/// Settings read from `daemon.toml`. Everything is optional; missing file
/// means all defaults.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    /// Overrides the env-resolved data directory.
    #[serde(default)]
    pub data_dir: Option<PathBuf>,
    /// First port probed for MJPEG stream allocation.
    #[serde(default)]
    pub mjpeg_port_base: Option<u16>,
    /// Broadcast buffer per event subscriber.
    #[serde(default)]
    pub event_capacity: Option<usize>,
    /// Seconds between device inventory scans. 0 disables scanning.
    #[serde(default)]
    pub inventory_scan_secs: Option<u64>,
}

impl Config {
    /// Resolve the data dir from the environment, then merge `daemon.toml`
    /// if one exists there.
    pub fn load() -> Result<(PathBuf, Self), LifecycleError> {
        let data_dir = env::data_dir()?;
        let config = Self::read(&data_dir.join("daemon.toml"))?;
        let data_dir = config.data_dir.clone().unwrap_or(data_dir);
        Ok((data_dir, config))
    }

    fn read(path: &Path) -> Result<Self, LifecycleError> {
        let raw = match std::fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(e) => return Err(LifecycleError::Io(e)),
        };
        toml::from_str(&raw).map_err(|e| LifecycleError::InvalidConfig(e.to_string()))
    }

    pub fn event_capacity(&self) -> usize {
        self.event_capacity
            .unwrap_or(crate::event_bus::DEFAULT_EVENT_CAPACITY)
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
