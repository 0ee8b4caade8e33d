// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! ADB automation driver.
//!
//! Every operation shells out to `adb -s <serial> ...`. ADB itself is
//! sessionless; the session ids handed out here exist so callers hold an
//! explicit attachment whose lifetime the registry controls.

use super::{
    keycodes, AutomationDriver, DiscoveredDevice, DriverError, ElementRect, RecordingOptions,
};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::process::{Child, Command};

use dl_core::{DeviceId, DeviceStatus};
use dl_scenario::{Selector, SelectorStrategy};

/// Characters deleted by one `clear_text` call.
const CLEAR_TEXT_DELETES: usize = 50;

struct Recording {
    child: Child,
    remote_path: String,
}

struct AdbSession {
    serial: String,
    recording: Option<Recording>,
}

#[derive(Default)]
struct AdbState {
    sessions: HashMap<String, AdbSession>,
    next_id: u64,
}

/// ADB-backed automation driver.
#[derive(Clone, Default)]
pub struct AdbDriver {
    inner: Arc<Mutex<AdbState>>,
}

impl AdbDriver {
    pub fn new() -> Self {
        Self::default()
    }

    fn serial_for(&self, session_id: &str) -> Result<String, DriverError> {
        let inner = self.inner.lock();
        inner
            .sessions
            .get(session_id)
            .map(|s| s.serial.clone())
            .ok_or_else(|| DriverError::SessionNotFound(session_id.to_string()))
    }

    async fn adb(&self, serial: &str, args: &[&str]) -> Result<Vec<u8>, DriverError> {
        let output = Command::new("adb")
            .arg("-s")
            .arg(serial)
            .args(args)
            .output()
            .await
            .map_err(|e| DriverError::CommandFailed(e.to_string()))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(DriverError::CommandFailed(format!(
                "adb {}: {}",
                args.first().copied().unwrap_or(""),
                stderr.trim()
            )));
        }
        Ok(output.stdout)
    }

    async fn adb_text(&self, serial: &str, args: &[&str]) -> Result<String, DriverError> {
        let stdout = self.adb(serial, args).await?;
        Ok(String::from_utf8_lossy(&stdout).to_string())
    }

    async fn ui_dump(&self, serial: &str) -> Result<String, DriverError> {
        // Dump to stdout; the trailing "UI hierchary dumped to..." line is
        // harmless to the substring scans below.
        self.adb_text(serial, &["exec-out", "uiautomator", "dump", "/dev/tty"])
            .await
    }
}

#[async_trait]
impl AutomationDriver for AdbDriver {
    async fn create_session(&self, device_id: &DeviceId) -> Result<String, DriverError> {
        let serial = device_id.as_str();

        // Verify the device answers before handing out a handle
        let output = Command::new("adb")
            .args(["-s", serial, "shell", "echo", "ok"])
            .output()
            .await
            .map_err(|e| DriverError::SessionRejected(e.to_string()))?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            tracing::error!(serial, stderr = %stderr, "adb session probe failed");
            return Err(DriverError::SessionRejected(stderr.trim().to_string()));
        }

        let mut inner = self.inner.lock();
        inner.next_id += 1;
        let session_id = format!("adb-{}-{}", inner.next_id, serial);
        inner.sessions.insert(
            session_id.clone(),
            AdbSession {
                serial: serial.to_string(),
                recording: None,
            },
        );
        Ok(session_id)
    }

    async fn delete_session(&self, session_id: &str) -> Result<(), DriverError> {
        let session = self.inner.lock().sessions.remove(session_id);
        let Some(mut session) = session else {
            return Ok(());
        };
        // Discard any in-flight recording
        if let Some(mut rec) = session.recording.take() {
            let _ = rec.child.start_kill();
            let _ = self
                .adb(&session.serial, &["shell", "rm", "-f", &rec.remote_path])
                .await;
        }
        Ok(())
    }

    async fn window_size(&self, session_id: &str) -> Result<(u32, u32), DriverError> {
        let serial = self.serial_for(session_id)?;
        let out = self.adb_text(&serial, &["shell", "wm", "size"]).await?;
        parse_window_size(&out)
            .ok_or_else(|| DriverError::CommandFailed(format!("unparseable wm size: {}", out.trim())))
    }

    async fn list_devices(&self) -> Result<Vec<DiscoveredDevice>, DriverError> {
        let output = Command::new("adb")
            .args(["devices", "-l"])
            .output()
            .await
            .map_err(|e| DriverError::CommandFailed(e.to_string()))?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(DriverError::CommandFailed(stderr.trim().to_string()));
        }
        Ok(parse_devices(&String::from_utf8_lossy(&output.stdout)))
    }

    async fn tap(&self, session_id: &str, x: i32, y: i32) -> Result<(), DriverError> {
        let serial = self.serial_for(session_id)?;
        self.adb(
            &serial,
            &["shell", "input", "tap", &x.to_string(), &y.to_string()],
        )
        .await?;
        Ok(())
    }

    async fn long_press(
        &self,
        session_id: &str,
        x: i32,
        y: i32,
        duration_ms: u64,
    ) -> Result<(), DriverError> {
        let serial = self.serial_for(session_id)?;
        let (xs, ys, ds) = (x.to_string(), y.to_string(), duration_ms.to_string());
        // A zero-distance swipe is how `input` expresses a long press
        self.adb(&serial, &["shell", "input", "swipe", &xs, &ys, &xs, &ys, &ds])
            .await?;
        Ok(())
    }

    async fn swipe(
        &self,
        session_id: &str,
        x1: i32,
        y1: i32,
        x2: i32,
        y2: i32,
        duration_ms: u64,
    ) -> Result<(), DriverError> {
        let serial = self.serial_for(session_id)?;
        let args: Vec<String> = [x1, y1, x2, y2]
            .iter()
            .map(|v| v.to_string())
            .chain(std::iter::once(duration_ms.to_string()))
            .collect();
        let mut cmd: Vec<&str> = vec!["shell", "input", "swipe"];
        cmd.extend(args.iter().map(String::as_str));
        self.adb(&serial, &cmd).await?;
        Ok(())
    }

    async fn find_element(
        &self,
        session_id: &str,
        selector: &Selector,
    ) -> Result<Option<ElementRect>, DriverError> {
        if selector.strategy == SelectorStrategy::Xpath {
            return Err(DriverError::Unsupported(
                "xpath selectors require the remote inspection service".to_string(),
            ));
        }
        let serial = self.serial_for(session_id)?;
        let xml = self.ui_dump(&serial).await?;
        Ok(find_in_dump(&xml, selector))
    }

    async fn text_on_screen(&self, session_id: &str, text: &str) -> Result<bool, DriverError> {
        let serial = self.serial_for(session_id)?;
        let xml = self.ui_dump(&serial).await?;
        Ok(xml.contains(text))
    }

    async fn screenshot(&self, session_id: &str) -> Result<Vec<u8>, DriverError> {
        let serial = self.serial_for(session_id)?;
        self.adb(&serial, &["exec-out", "screencap", "-p"]).await
    }

    async fn input_text(&self, session_id: &str, text: &str) -> Result<(), DriverError> {
        let serial = self.serial_for(session_id)?;
        // `input text` has no quoting; spaces must travel as %s
        let escaped = text.replace(' ', "%s");
        self.adb(&serial, &["shell", "input", "text", &escaped])
            .await?;
        Ok(())
    }

    async fn clear_text(&self, session_id: &str) -> Result<(), DriverError> {
        let serial = self.serial_for(session_id)?;
        self.adb(
            &serial,
            &["shell", "input", "keyevent", &keycodes::MOVE_END.to_string()],
        )
        .await?;
        let del = keycodes::DEL.to_string();
        let mut cmd: Vec<&str> = vec!["shell", "input", "keyevent"];
        cmd.extend(std::iter::repeat(del.as_str()).take(CLEAR_TEXT_DELETES));
        self.adb(&serial, &cmd).await?;
        Ok(())
    }

    async fn press_key(&self, session_id: &str, keycode: u32) -> Result<(), DriverError> {
        let serial = self.serial_for(session_id)?;
        self.adb(&serial, &["shell", "input", "keyevent", &keycode.to_string()])
            .await?;
        Ok(())
    }

    async fn launch_app(&self, session_id: &str, package: &str) -> Result<(), DriverError> {
        let serial = self.serial_for(session_id)?;
        self.adb(
            &serial,
            &[
                "shell", "monkey", "-p", package, "-c", "android.intent.category.LAUNCHER", "1",
            ],
        )
        .await?;
        Ok(())
    }

    async fn terminate_app(&self, session_id: &str, package: &str) -> Result<(), DriverError> {
        let serial = self.serial_for(session_id)?;
        self.adb(&serial, &["shell", "am", "force-stop", package])
            .await?;
        Ok(())
    }

    async fn clear_app_data(&self, session_id: &str, package: &str) -> Result<(), DriverError> {
        let serial = self.serial_for(session_id)?;
        self.adb(&serial, &["shell", "pm", "clear", package]).await?;
        Ok(())
    }

    async fn clear_app_cache(&self, session_id: &str, package: &str) -> Result<(), DriverError> {
        let serial = self.serial_for(session_id)?;
        self.adb(&serial, &["shell", "pm", "clear", "--cache-only", package])
            .await?;
        Ok(())
    }

    async fn start_recording(
        &self,
        session_id: &str,
        options: &RecordingOptions,
    ) -> Result<(), DriverError> {
        let serial = self.serial_for(session_id)?;

        let already_recording = {
            let inner = self.inner.lock();
            inner
                .sessions
                .get(session_id)
                .is_some_and(|s| s.recording.is_some())
        };
        if already_recording {
            if !options.force_restart {
                return Err(DriverError::CommandFailed(
                    "recording already running".to_string(),
                ));
            }
            let _ = self.stop_recording(session_id).await;
        }

        let remote_path = format!("/sdcard/dl-rec-{}.mp4", sanitize(session_id));
        let child = Command::new("adb")
            .args([
                "-s",
                &serial,
                "shell",
                "screenrecord",
                "--bit-rate",
                &options.bitrate.to_string(),
                "--size",
                &format!("{}x{}", options.width, options.height),
                "--time-limit",
                &options.time_limit_secs.to_string(),
                &remote_path,
            ])
            .spawn()
            .map_err(|e| DriverError::CommandFailed(e.to_string()))?;

        let mut inner = self.inner.lock();
        match inner.sessions.get_mut(session_id) {
            Some(session) => {
                session.recording = Some(Recording { child, remote_path });
                Ok(())
            }
            None => Err(DriverError::SessionNotFound(session_id.to_string())),
        }
    }

    async fn stop_recording(&self, session_id: &str) -> Result<Vec<u8>, DriverError> {
        let serial = self.serial_for(session_id)?;
        let recording = {
            let mut inner = self.inner.lock();
            match inner.sessions.get_mut(session_id) {
                Some(session) => session.recording.take(),
                None => return Err(DriverError::SessionNotFound(session_id.to_string())),
            }
        };
        let Some(mut recording) = recording else {
            return Ok(Vec::new());
        };

        // SIGINT lets screenrecord finalize the MP4 moov atom
        let _ = self
            .adb(&serial, &["shell", "pkill", "-2", "screenrecord"])
            .await;
        tokio::time::sleep(Duration::from_millis(500)).await;
        let _ = recording.child.wait().await;

        let bytes = self
            .adb(&serial, &["exec-out", "cat", &recording.remote_path])
            .await
            .unwrap_or_default();
        let _ = self
            .adb(&serial, &["shell", "rm", "-f", &recording.remote_path])
            .await;
        Ok(bytes)
    }
}

fn sanitize(id: &str) -> String {
    id.chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '-' })
        .collect()
}

/// Parse `wm size` output: prefers the override size when present.
fn parse_window_size(out: &str) -> Option<(u32, u32)> {
    let parse_line = |line: &str| -> Option<(String, (u32, u32))> {
        let (label, dims) = line.split_once(':')?;
        let (w, h) = dims.trim().split_once('x')?;
        Some((
            label.trim().to_string(),
            (w.trim().parse().ok()?, h.trim().parse().ok()?),
        ))
    };
    let mut physical = None;
    for line in out.lines() {
        let Some((label, parsed)) = parse_line(line) else {
            continue;
        };
        if label == "Override size" {
            return Some(parsed);
        }
        physical = Some(parsed);
    }
    physical
}

/// Parse `adb devices -l` output into discovered devices.
fn parse_devices(out: &str) -> Vec<DiscoveredDevice> {
    let mut devices = Vec::new();
    for line in out.lines().skip(1) {
        let mut fields = line.split_whitespace();
        let Some(serial) = fields.next() else {
            continue;
        };
        let Some(state) = fields.next() else {
            continue;
        };
        let Ok(id) = DeviceId::parse(serial) else {
            tracing::warn!(serial, "skipping device with unparseable serial");
            continue;
        };
        let status = match state {
            "device" => DeviceStatus::Connected,
            "unauthorized" => DeviceStatus::Unauthorized,
            _ => DeviceStatus::Offline,
        };
        let model = fields
            .find_map(|f| f.strip_prefix("model:"))
            .map(|m| m.to_string());
        devices.push(DiscoveredDevice { id, status, model });
    }
    devices
}

/// Find the first node in a uiautomator dump matching the selector and pull
/// its `bounds` attribute.
fn find_in_dump(xml: &str, selector: &Selector) -> Option<ElementRect> {
    let needle = match selector.strategy {
        SelectorStrategy::Id => format!("resource-id=\"{}\"", selector.value),
        SelectorStrategy::AccessibilityId => format!("content-desc=\"{}\"", selector.value),
        SelectorStrategy::Text => format!("text=\"{}\"", selector.value),
        SelectorStrategy::Xpath => return None,
    };
    let at = match xml.find(&needle) {
        Some(at) => at,
        None if selector.strategy == SelectorStrategy::Id => {
            // Resource ids are usually stored fully qualified (pkg:id/name);
            // fall back to a suffix match on the short form.
            let suffix = format!("id/{}\"", selector.value);
            xml.find(&suffix)?
        }
        None => return None,
    };
    let tag_end = at + xml[at..].find('>')?;
    let tag = &xml[at..tag_end];
    parse_bounds(tag)
}

/// Parse a `bounds="[x1,y1][x2,y2]"` attribute out of one tag.
fn parse_bounds(tag: &str) -> Option<ElementRect> {
    let raw = tag.split("bounds=\"").nth(1)?.split('"').next()?;
    let raw = raw.strip_prefix('[')?.strip_suffix(']')?;
    let (first, second) = raw.split_once("][")?;
    let (x1, y1) = parse_point(first)?;
    let (x2, y2) = parse_point(second)?;
    Some(ElementRect {
        x: x1,
        y: y1,
        width: x2 - x1,
        height: y2 - y1,
    })
}

fn parse_point(raw: &str) -> Option<(i32, i32)> {
    let (x, y) = raw.split_once(',')?;
    Some((x.trim().parse().ok()?, y.trim().parse().ok()?))
}

#[cfg(test)]
#[path = "adb_tests.rs"]
mod tests;
