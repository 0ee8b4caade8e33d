// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Fake automation driver for testing
#![cfg_attr(coverage_nightly, coverage(off))]

use super::{
    AutomationDriver, DiscoveredDevice, DriverError, ElementRect, RecordingOptions,
};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;

use dl_core::DeviceId;
use dl_scenario::Selector;

/// Recorded driver call
#[derive(Debug, Clone, PartialEq)]
pub enum DriverCall {
    CreateSession { device_id: String },
    DeleteSession { session_id: String },
    WindowSize { session_id: String },
    Tap { session_id: String, x: i32, y: i32 },
    LongPress { session_id: String, x: i32, y: i32, duration_ms: u64 },
    Swipe { session_id: String, x1: i32, y1: i32, x2: i32, y2: i32 },
    FindElement { session_id: String, selector: String },
    TextOnScreen { session_id: String, text: String },
    Screenshot { session_id: String },
    InputText { session_id: String, text: String },
    ClearText { session_id: String },
    PressKey { session_id: String, keycode: u32 },
    LaunchApp { session_id: String, package: String },
    TerminateApp { session_id: String, package: String },
    ClearAppData { session_id: String, package: String },
    ClearAppCache { session_id: String, package: String },
    StartRecording { session_id: String },
    StopRecording { session_id: String },
}

struct FakeSession {
    device_id: String,
    alive: bool,
    recording: bool,
}

#[derive(Default)]
struct FakeState {
    sessions: HashMap<String, FakeSession>,
    calls: Vec<DriverCall>,
    next_id: u64,
    /// Devices whose create_session should be rejected.
    reject_devices: HashSet<String>,
    /// Elements visible on screen, per device: selector string -> rect.
    elements: HashMap<String, HashMap<String, ElementRect>>,
    /// Text visible on screen, per device.
    texts: HashMap<String, HashSet<String>>,
    /// Queued transient failures consumed by the next touch call.
    transient_faults: VecDeque<String>,
    discovered: Vec<DiscoveredDevice>,
}

/// Fully scripted driver for tests. All sessions succeed unless told
/// otherwise; element visibility is controlled per device id.
#[derive(Clone, Default)]
pub struct FakeDriver {
    inner: Arc<Mutex<FakeState>>,
}

impl FakeDriver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get all recorded calls
    pub fn calls(&self) -> Vec<DriverCall> {
        self.inner.lock().calls.clone()
    }

    /// Count of live (non-dead) fake sessions.
    pub fn live_sessions(&self) -> usize {
        self.inner.lock().sessions.values().filter(|s| s.alive).count()
    }

    /// Reject future create_session calls for a device.
    pub fn reject_device(&self, device_id: &str) {
        self.inner.lock().reject_devices.insert(device_id.to_string());
    }

    /// Stop rejecting a device.
    pub fn accept_device(&self, device_id: &str) {
        self.inner.lock().reject_devices.remove(device_id);
    }

    /// Kill a session so the next health probe fails.
    pub fn kill_session(&self, session_id: &str) {
        if let Some(session) = self.inner.lock().sessions.get_mut(session_id) {
            session.alive = false;
        }
    }

    /// Kill every session attached to a device.
    pub fn kill_device_sessions(&self, device_id: &str) {
        for session in self.inner.lock().sessions.values_mut() {
            if session.device_id == device_id {
                session.alive = false;
            }
        }
    }

    /// Make an element visible on a device's screen.
    pub fn show_element(&self, device_id: &str, selector: &Selector, rect: ElementRect) {
        self.inner
            .lock()
            .elements
            .entry(device_id.to_string())
            .or_default()
            .insert(selector.to_string(), rect);
    }

    /// Remove an element from a device's screen.
    pub fn hide_element(&self, device_id: &str, selector: &Selector) {
        if let Some(elements) = self.inner.lock().elements.get_mut(device_id) {
            elements.remove(&selector.to_string());
        }
    }

    /// Make text visible on a device's screen.
    pub fn show_text(&self, device_id: &str, text: &str) {
        self.inner
            .lock()
            .texts
            .entry(device_id.to_string())
            .or_default()
            .insert(text.to_string());
    }

    /// Queue a transient fault consumed by the next touch call.
    pub fn push_transient_fault(&self, message: &str) {
        self.inner
            .lock()
            .transient_faults
            .push_back(message.to_string());
    }

    /// Script the device list returned by scans.
    pub fn set_discovered(&self, devices: Vec<DiscoveredDevice>) {
        self.inner.lock().discovered = devices;
    }

    fn session_device(&self, session_id: &str) -> Result<String, DriverError> {
        let inner = self.inner.lock();
        let session = inner
            .sessions
            .get(session_id)
            .ok_or_else(|| DriverError::SessionNotFound(session_id.to_string()))?;
        if !session.alive {
            return Err(DriverError::CommandFailed("session is dead".to_string()));
        }
        Ok(session.device_id.clone())
    }

    fn record(&self, call: DriverCall) {
        self.inner.lock().calls.push(call);
    }

    fn take_transient_fault(&self) -> Option<String> {
        self.inner.lock().transient_faults.pop_front()
    }
}

#[async_trait]
impl AutomationDriver for FakeDriver {
    async fn create_session(&self, device_id: &DeviceId) -> Result<String, DriverError> {
        self.record(DriverCall::CreateSession {
            device_id: device_id.to_string(),
        });
        let mut inner = self.inner.lock();
        if inner.reject_devices.contains(device_id.as_str()) {
            return Err(DriverError::SessionRejected(format!(
                "scripted rejection for {device_id}"
            )));
        }
        inner.next_id += 1;
        let session_id = format!("fake-{}", inner.next_id);
        inner.sessions.insert(
            session_id.clone(),
            FakeSession {
                device_id: device_id.to_string(),
                alive: true,
                recording: false,
            },
        );
        Ok(session_id)
    }

    async fn delete_session(&self, session_id: &str) -> Result<(), DriverError> {
        self.record(DriverCall::DeleteSession {
            session_id: session_id.to_string(),
        });
        self.inner.lock().sessions.remove(session_id);
        Ok(())
    }

    async fn window_size(&self, session_id: &str) -> Result<(u32, u32), DriverError> {
        self.record(DriverCall::WindowSize {
            session_id: session_id.to_string(),
        });
        self.session_device(session_id)?;
        Ok((1080, 2400))
    }

    async fn list_devices(&self) -> Result<Vec<DiscoveredDevice>, DriverError> {
        Ok(self.inner.lock().discovered.clone())
    }

    async fn tap(&self, session_id: &str, x: i32, y: i32) -> Result<(), DriverError> {
        self.record(DriverCall::Tap {
            session_id: session_id.to_string(),
            x,
            y,
        });
        self.session_device(session_id)?;
        if let Some(message) = self.take_transient_fault() {
            return Err(DriverError::CommandFailed(message));
        }
        Ok(())
    }

    async fn long_press(
        &self,
        session_id: &str,
        x: i32,
        y: i32,
        duration_ms: u64,
    ) -> Result<(), DriverError> {
        self.record(DriverCall::LongPress {
            session_id: session_id.to_string(),
            x,
            y,
            duration_ms,
        });
        self.session_device(session_id)?;
        if let Some(message) = self.take_transient_fault() {
            return Err(DriverError::CommandFailed(message));
        }
        Ok(())
    }

    async fn swipe(
        &self,
        session_id: &str,
        x1: i32,
        y1: i32,
        x2: i32,
        y2: i32,
        _duration_ms: u64,
    ) -> Result<(), DriverError> {
        self.record(DriverCall::Swipe {
            session_id: session_id.to_string(),
            x1,
            y1,
            x2,
            y2,
        });
        self.session_device(session_id)?;
        if let Some(message) = self.take_transient_fault() {
            return Err(DriverError::CommandFailed(message));
        }
        Ok(())
    }

    async fn find_element(
        &self,
        session_id: &str,
        selector: &Selector,
    ) -> Result<Option<ElementRect>, DriverError> {
        self.record(DriverCall::FindElement {
            session_id: session_id.to_string(),
            selector: selector.to_string(),
        });
        // Mirror the ADB driver's contract: xpath needs the remote service
        if selector.strategy == dl_scenario::SelectorStrategy::Xpath {
            return Err(DriverError::Unsupported(
                "xpath selectors require the remote inspection service".to_string(),
            ));
        }
        let device_id = self.session_device(session_id)?;
        let inner = self.inner.lock();
        Ok(inner
            .elements
            .get(&device_id)
            .and_then(|elements| elements.get(&selector.to_string()))
            .copied())
    }

    async fn text_on_screen(&self, session_id: &str, text: &str) -> Result<bool, DriverError> {
        self.record(DriverCall::TextOnScreen {
            session_id: session_id.to_string(),
            text: text.to_string(),
        });
        let device_id = self.session_device(session_id)?;
        let inner = self.inner.lock();
        Ok(inner
            .texts
            .get(&device_id)
            .is_some_and(|texts| texts.contains(text)))
    }

    async fn screenshot(&self, session_id: &str) -> Result<Vec<u8>, DriverError> {
        self.record(DriverCall::Screenshot {
            session_id: session_id.to_string(),
        });
        self.session_device(session_id)?;
        Ok(b"fake-png".to_vec())
    }

    async fn input_text(&self, session_id: &str, text: &str) -> Result<(), DriverError> {
        self.record(DriverCall::InputText {
            session_id: session_id.to_string(),
            text: text.to_string(),
        });
        self.session_device(session_id)?;
        Ok(())
    }

    async fn clear_text(&self, session_id: &str) -> Result<(), DriverError> {
        self.record(DriverCall::ClearText {
            session_id: session_id.to_string(),
        });
        self.session_device(session_id)?;
        Ok(())
    }

    async fn press_key(&self, session_id: &str, keycode: u32) -> Result<(), DriverError> {
        self.record(DriverCall::PressKey {
            session_id: session_id.to_string(),
            keycode,
        });
        self.session_device(session_id)?;
        Ok(())
    }

    async fn launch_app(&self, session_id: &str, package: &str) -> Result<(), DriverError> {
        self.record(DriverCall::LaunchApp {
            session_id: session_id.to_string(),
            package: package.to_string(),
        });
        self.session_device(session_id)?;
        Ok(())
    }

    async fn terminate_app(&self, session_id: &str, package: &str) -> Result<(), DriverError> {
        self.record(DriverCall::TerminateApp {
            session_id: session_id.to_string(),
            package: package.to_string(),
        });
        self.session_device(session_id)?;
        Ok(())
    }

    async fn clear_app_data(&self, session_id: &str, package: &str) -> Result<(), DriverError> {
        self.record(DriverCall::ClearAppData {
            session_id: session_id.to_string(),
            package: package.to_string(),
        });
        self.session_device(session_id)?;
        Ok(())
    }

    async fn clear_app_cache(&self, session_id: &str, package: &str) -> Result<(), DriverError> {
        self.record(DriverCall::ClearAppCache {
            session_id: session_id.to_string(),
            package: package.to_string(),
        });
        self.session_device(session_id)?;
        Ok(())
    }

    async fn start_recording(
        &self,
        session_id: &str,
        _options: &RecordingOptions,
    ) -> Result<(), DriverError> {
        self.record(DriverCall::StartRecording {
            session_id: session_id.to_string(),
        });
        self.session_device(session_id)?;
        if let Some(session) = self.inner.lock().sessions.get_mut(session_id) {
            session.recording = true;
        }
        Ok(())
    }

    async fn stop_recording(&self, session_id: &str) -> Result<Vec<u8>, DriverError> {
        self.record(DriverCall::StopRecording {
            session_id: session_id.to_string(),
        });
        let mut inner = self.inner.lock();
        let Some(session) = inner.sessions.get_mut(session_id) else {
            return Err(DriverError::SessionNotFound(session_id.to_string()));
        };
        let was_recording = session.recording;
        session.recording = false;
        if was_recording {
            Ok(b"fake-mp4".to_vec())
        } else {
            Ok(Vec::new())
        }
    }
}

#[cfg(test)]
#[path = "fake_tests.rs"]
mod tests;
