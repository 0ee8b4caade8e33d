// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Device inventory: reconcile stored device documents with a fleet scan.
//!
//! Descriptors are created on first discovery and updated on every scan;
//! devices that disappear are marked offline, never deleted. Deletion is
//! an explicit user action handled at the document store.

use dl_core::{Clock, Device, DeviceStatus};
use dl_driver::AutomationDriver;
use dl_storage::{collections, DocumentStore};

use crate::error::EngineError;

/// Result counters of one scan.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ScanSummary {
    /// Devices seen for the first time.
    pub discovered: usize,
    /// Known devices whose snapshot was refreshed.
    pub updated: usize,
    /// Known devices absent from the scan, marked offline.
    pub offline: usize,
}

/// Keeps the saved-device collection in sync with the fleet.
pub struct DeviceInventory<D: AutomationDriver, C: Clock> {
    driver: D,
    store: DocumentStore,
    clock: C,
}

impl<D: AutomationDriver, C: Clock> DeviceInventory<D, C> {
    pub fn new(driver: D, store: DocumentStore, clock: C) -> Self {
        Self {
            driver,
            store,
            clock,
        }
    }

    /// Scan the fleet once and upsert device documents.
    pub async fn scan(&self) -> Result<ScanSummary, EngineError> {
        let seen = self.driver.list_devices().await?;
        let now = self.clock.epoch_ms();
        let mut summary = ScanSummary::default();

        for discovered in &seen {
            let existing: Option<Device> = self
                .store
                .try_get(collections::DEVICES, discovered.id.as_str())?;
            let device = match existing {
                Some(mut device) => {
                    device.status = discovered.status;
                    if discovered.status == DeviceStatus::Connected {
                        device.last_connected_at_ms = now;
                    }
                    if device.hardware.model.is_none() {
                        device.hardware.model = discovered.model.clone();
                    }
                    summary.updated += 1;
                    device
                }
                None => {
                    tracing::info!(device = %discovered.id, status = %discovered.status, "new device discovered");
                    let mut device = Device::discovered(discovered.id.clone(), discovered.status, now);
                    device.hardware.model = discovered.model.clone();
                    summary.discovered += 1;
                    device
                }
            };
            self.store
                .put(collections::DEVICES, device.id.as_str(), &device)?;
        }

        // Anything we know about but did not see went offline
        let known: Vec<Device> = self.store.list(collections::DEVICES)?;
        for mut device in known {
            if seen.iter().any(|d| d.id == device.id) {
                continue;
            }
            if device.status != DeviceStatus::Offline {
                device.status = DeviceStatus::Offline;
                self.store
                    .put(collections::DEVICES, device.id.as_str(), &device)?;
                summary.offline += 1;
            }
        }

        tracing::debug!(?summary, "inventory scan complete");
        Ok(summary)
    }
}

#[cfg(test)]
#[path = "inventory_tests.rs"]
mod tests;
