// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Automation driver trait and implementations.

mod adb;

pub use adb::AdbDriver;

// Test support - only compiled for tests or when explicitly requested
#[cfg(any(test, feature = "test-support"))]
mod fake;
#[cfg(any(test, feature = "test-support"))]
pub use fake::{DriverCall, FakeDriver};

use async_trait::async_trait;
use thiserror::Error;

use dl_core::{DeviceId, DeviceStatus};
use dl_scenario::Selector;

/// Errors from driver operations
#[derive(Debug, Error)]
pub enum DriverError {
    #[error("session not found: {0}")]
    SessionNotFound(String),
    #[error("session rejected: {0}")]
    SessionRejected(String),
    #[error("element not found: {0}")]
    ElementNotFound(String),
    #[error("unsupported: {0}")]
    Unsupported(String),
    #[error("command failed: {0}")]
    CommandFailed(String),
    #[error("timed out after {0} ms")]
    Timeout(u64),
}

impl DriverError {
    /// Transient faults are worth a retry; the rest are not.
    pub fn is_transient(&self) -> bool {
        matches!(self, DriverError::CommandFailed(_))
    }
}

/// Bounding box of a located element, in screen pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ElementRect {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl ElementRect {
    /// Center point, used as the tap target.
    pub fn center(&self) -> (i32, i32) {
        (self.x + self.width / 2, self.y + self.height / 2)
    }
}

/// Screen recording parameters.
#[derive(Debug, Clone)]
pub struct RecordingOptions {
    pub bitrate: u32,
    pub width: u32,
    pub height: u32,
    pub time_limit_secs: u32,
    /// Stop and discard any recording already running on the session.
    pub force_restart: bool,
}

impl Default for RecordingOptions {
    fn default() -> Self {
        Self {
            bitrate: 4_000_000,
            width: 720,
            height: 1280,
            time_limit_secs: 300,
            force_restart: true,
        }
    }
}

/// One device as reported by a fleet scan.
#[derive(Debug, Clone, PartialEq)]
pub struct DiscoveredDevice {
    pub id: DeviceId,
    pub status: DeviceStatus,
    pub model: Option<String>,
}

/// Remote automation surface, one session handle per device.
///
/// Every method is a remote round-trip; implementations must be safe to call
/// concurrently from independent device workers.
#[async_trait]
pub trait AutomationDriver: Clone + Send + Sync + 'static {
    /// Attach to a device. Fails with `SessionRejected` when the remote
    /// driver refuses or times out.
    async fn create_session(&self, device_id: &DeviceId) -> Result<String, DriverError>;

    /// Detach. Safe to call on an already-dead session.
    async fn delete_session(&self, session_id: &str) -> Result<(), DriverError>;

    /// Cheap round-trip used as the health probe.
    async fn window_size(&self, session_id: &str) -> Result<(u32, u32), DriverError>;

    /// Scan the fleet for attached devices.
    async fn list_devices(&self) -> Result<Vec<DiscoveredDevice>, DriverError>;

    // -- touch --
    async fn tap(&self, session_id: &str, x: i32, y: i32) -> Result<(), DriverError>;
    async fn long_press(
        &self,
        session_id: &str,
        x: i32,
        y: i32,
        duration_ms: u64,
    ) -> Result<(), DriverError>;
    async fn swipe(
        &self,
        session_id: &str,
        x1: i32,
        y1: i32,
        x2: i32,
        y2: i32,
        duration_ms: u64,
    ) -> Result<(), DriverError>;

    // -- inspection --
    /// Locate one element; `Ok(None)` when nothing matches right now.
    async fn find_element(
        &self,
        session_id: &str,
        selector: &Selector,
    ) -> Result<Option<ElementRect>, DriverError>;

    /// Whether the given text is visible anywhere on screen.
    async fn text_on_screen(&self, session_id: &str, text: &str) -> Result<bool, DriverError>;

    /// PNG capture of the current screen.
    async fn screenshot(&self, session_id: &str) -> Result<Vec<u8>, DriverError>;

    // -- text input --
    async fn input_text(&self, session_id: &str, text: &str) -> Result<(), DriverError>;
    async fn clear_text(&self, session_id: &str) -> Result<(), DriverError>;
    async fn press_key(&self, session_id: &str, keycode: u32) -> Result<(), DriverError>;

    // -- app management --
    async fn launch_app(&self, session_id: &str, package: &str) -> Result<(), DriverError>;
    async fn terminate_app(&self, session_id: &str, package: &str) -> Result<(), DriverError>;
    async fn clear_app_data(&self, session_id: &str, package: &str) -> Result<(), DriverError>;
    async fn clear_app_cache(&self, session_id: &str, package: &str) -> Result<(), DriverError>;

    // -- recording --
    async fn start_recording(
        &self,
        session_id: &str,
        options: &RecordingOptions,
    ) -> Result<(), DriverError>;

    /// Stop and collect the recording. Empty bytes when nothing was recorded.
    async fn stop_recording(&self, session_id: &str) -> Result<Vec<u8>, DriverError>;
}

/// Android keycodes used by the nav actions.
pub mod keycodes {
    pub const HOME: u32 = 3;
    pub const BACK: u32 = 4;
    pub const DEL: u32 = 67;
    /// Move-end + select-all precede bulk deletion in `clear_text`.
    pub const MOVE_END: u32 = 123;
}
