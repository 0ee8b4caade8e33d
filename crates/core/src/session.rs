// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Session identifier and info record.
//!
//! A session is the live automation attachment for one device. The registry
//! guarantees at most one session per device id; the info record is the
//! non-owning view handed out to callers.

use serde::{Deserialize, Serialize};

use crate::device::DeviceId;

crate::define_id! {
    /// Opaque identifier assigned by the remote automation driver.
    pub struct SessionId;
}

/// Liveness of a session as last observed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Active,
    Dead,
}

/// Non-owning snapshot of a live session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionInfo {
    pub device_id: DeviceId,
    pub session_id: SessionId,
    /// Port reserved for the MJPEG screen stream, unique across live sessions.
    pub mjpeg_port: u16,
    pub created_at_ms: u64,
    pub status: SessionStatus,
}
