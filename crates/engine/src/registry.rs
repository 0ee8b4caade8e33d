// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Session registry: at most one live automation session per device.
//!
//! Health probing and eviction happen under a per-device creation lock so
//! two concurrent `ensure_session` callers cannot race into double-create.
//! The shared map and the MJPEG port pool are mutated only inside short
//! critical sections; lookups never block on remote calls.

use parking_lot::Mutex;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use tokio::task::JoinSet;

use dl_core::{Clock, DeviceId, SessionId, SessionInfo, SessionStatus};
use dl_driver::AutomationDriver;

use crate::error::EngineError;

/// First port probed for MJPEG stream allocation.
pub const MJPEG_PORT_BASE: u16 = 9100;

#[derive(Default)]
struct RegistryState {
    sessions: HashMap<DeviceId, SessionInfo>,
    ports_in_use: BTreeSet<u16>,
}

/// Outcome partitions of a bulk session validation.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct ValidationOutcome {
    /// Sessions that existed and answered the health probe.
    pub validated: Vec<DeviceId>,
    /// Sessions that were absent or dead and were (re)created.
    pub recreated: Vec<DeviceId>,
    /// Devices the driver refused a session for.
    pub failed: Vec<DeviceId>,
}

impl ValidationOutcome {
    /// Devices that can proceed: validated plus recreated, in that order.
    pub fn usable(&self) -> Vec<DeviceId> {
        self.validated
            .iter()
            .chain(self.recreated.iter())
            .cloned()
            .collect()
    }
}

/// Owns the `deviceId → Session` map and its port pool.
pub struct SessionRegistry<D: AutomationDriver, C: Clock> {
    driver: D,
    clock: C,
    port_base: u16,
    state: Mutex<RegistryState>,
    create_locks: Mutex<HashMap<DeviceId, Arc<tokio::sync::Mutex<()>>>>,
}

impl<D: AutomationDriver, C: Clock> SessionRegistry<D, C> {
    pub fn new(driver: D, clock: C) -> Self {
        Self::with_port_base(driver, clock, MJPEG_PORT_BASE)
    }

    pub fn with_port_base(driver: D, clock: C, port_base: u16) -> Self {
        Self {
            driver,
            clock,
            port_base,
            state: Mutex::new(RegistryState::default()),
            create_locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn driver(&self) -> &D {
        &self.driver
    }

    /// Non-owning session lookup.
    pub fn info(&self, device_id: &DeviceId) -> Option<SessionInfo> {
        self.state.lock().sessions.get(device_id).cloned()
    }

    /// Driver session handle for a device, if one is live.
    pub fn session_id(&self, device_id: &DeviceId) -> Option<SessionId> {
        self.state
            .lock()
            .sessions
            .get(device_id)
            .map(|s| s.session_id.clone())
    }

    /// Snapshot of all live sessions.
    pub fn infos(&self) -> Vec<SessionInfo> {
        self.state.lock().sessions.values().cloned().collect()
    }

    pub fn live_count(&self) -> usize {
        self.state.lock().sessions.len()
    }

    fn creation_lock(&self, device_id: &DeviceId) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self.create_locks.lock();
        Arc::clone(locks.entry(device_id.clone()).or_default())
    }

    /// Create (or return) the session for a device.
    ///
    /// Idempotent: a healthy existing session is returned as-is; a dead one
    /// is evicted and replaced.
    pub async fn create(&self, device_id: &DeviceId) -> Result<SessionInfo, EngineError> {
        let lock = self.creation_lock(device_id);
        let _guard = lock.lock().await;
        self.ensure_locked(device_id).await
    }

    /// Health probe → recreate. The canonical entry point before issuing
    /// any command against a device.
    pub async fn ensure_session(&self, device_id: &DeviceId) -> Result<SessionInfo, EngineError> {
        self.create(device_id).await
    }

    /// Body shared by create/ensure; caller holds the per-device lock.
    async fn ensure_locked(&self, device_id: &DeviceId) -> Result<SessionInfo, EngineError> {
        if let Some(existing) = self.info(device_id) {
            if self.probe(&existing).await {
                return Ok(existing);
            }
            tracing::warn!(device = %device_id, session = %existing.session_id, "session unhealthy, evicting");
            self.evict(device_id).await;
        }

        let session_id = self
            .driver
            .create_session(device_id)
            .await
            .map_err(|e| EngineError::SessionCreationFailed {
                device: device_id.clone(),
                reason: e.to_string(),
            })?;

        let info = {
            let mut state = self.state.lock();
            let mjpeg_port = allocate_port(&state.ports_in_use, self.port_base);
            state.ports_in_use.insert(mjpeg_port);
            let info = SessionInfo {
                device_id: device_id.clone(),
                session_id: SessionId::new(session_id),
                mjpeg_port,
                created_at_ms: self.clock.epoch_ms(),
                status: SessionStatus::Active,
            };
            state.sessions.insert(device_id.clone(), info.clone());
            info
        };
        tracing::info!(device = %device_id, session = %info.session_id, port = info.mjpeg_port, "session created");
        Ok(info)
    }

    async fn probe(&self, info: &SessionInfo) -> bool {
        self.driver
            .window_size(info.session_id.as_str())
            .await
            .is_ok()
    }

    /// Drop the map entry (freeing the port) and best-effort delete the
    /// remote session. The port is released even when the remote delete
    /// fails.
    async fn evict(&self, device_id: &DeviceId) -> Option<SessionInfo> {
        let removed = {
            let mut state = self.state.lock();
            let removed = state.sessions.remove(device_id);
            if let Some(info) = &removed {
                state.ports_in_use.remove(&info.mjpeg_port);
            }
            removed
        };
        if let Some(info) = &removed {
            if let Err(e) = self.driver.delete_session(info.session_id.as_str()).await {
                tracing::warn!(device = %device_id, error = %e, "remote session delete failed");
            }
        }
        removed
    }

    /// Destroy a device's session. Returns false for unknown devices.
    pub async fn destroy(&self, device_id: &DeviceId) -> Result<bool, EngineError> {
        let lock = self.creation_lock(device_id);
        let _guard = lock.lock().await;
        let removed = self.evict(device_id).await;
        if removed.is_some() {
            tracing::info!(device = %device_id, "session destroyed");
        }
        Ok(removed.is_some())
    }

    /// Fan-out destroy over every live session.
    pub async fn destroy_all(&self) {
        let device_ids: Vec<DeviceId> = {
            let state = self.state.lock();
            state.sessions.keys().cloned().collect()
        };
        for device_id in device_ids {
            let _ = self.destroy(&device_id).await;
        }
    }

    /// Probe one session; evict on failure.
    pub async fn check_health(&self, device_id: &DeviceId) -> bool {
        let lock = self.creation_lock(device_id);
        let _guard = lock.lock().await;
        let Some(info) = self.info(device_id) else {
            return false;
        };
        if self.probe(&info).await {
            true
        } else {
            tracing::warn!(device = %device_id, "health probe failed, evicting session");
            self.evict(device_id).await;
            false
        }
    }

    /// Concurrent ensure over a device set, partitioned into
    /// validated / recreated / failed.
    pub async fn validate_and_ensure(self: &Arc<Self>, device_ids: &[DeviceId]) -> ValidationOutcome
    where
        D: AutomationDriver,
    {
        let mut join_set = JoinSet::new();
        for device_id in device_ids.iter().cloned() {
            let registry = Arc::clone(self);
            join_set.spawn(async move {
                let lock = registry.creation_lock(&device_id);
                let _guard = lock.lock().await;

                if let Some(existing) = registry.info(&device_id) {
                    if registry.probe(&existing).await {
                        return (device_id, Ok(false));
                    }
                    registry.evict(&device_id).await;
                }
                match registry.ensure_locked(&device_id).await {
                    Ok(_) => (device_id, Ok(true)),
                    Err(e) => (device_id, Err(e)),
                }
            });
        }

        let mut outcome = ValidationOutcome::default();
        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok((device_id, Ok(false))) => outcome.validated.push(device_id),
                Ok((device_id, Ok(true))) => outcome.recreated.push(device_id),
                Ok((device_id, Err(e))) => {
                    tracing::warn!(device = %device_id, error = %e, "session validation failed");
                    outcome.failed.push(device_id);
                }
                Err(e) => tracing::error!(error = %e, "validation task panicked"),
            }
        }
        // Keep the partitions in request order for stable reporting
        for list in [
            &mut outcome.validated,
            &mut outcome.recreated,
            &mut outcome.failed,
        ] {
            list.sort_by_key(|d| device_ids.iter().position(|o| o == d));
        }
        outcome
    }
}

/// Linear probe for the next free port at or above the base.
fn allocate_port(in_use: &BTreeSet<u16>, base: u16) -> u16 {
    let mut candidate = base;
    while in_use.contains(&candidate) {
        candidate += 1;
    }
    candidate
}

#[cfg(test)]
#[path = "registry_tests.rs"]
mod tests;
