// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Device descriptor and identifier validation.
//!
//! A device id is either an ADB-style serial (`emulator-5554`, `R3CN30XXXX`)
//! or a network endpoint (`192.168.0.12:5555`). Ids arrive from user input
//! and from `adb devices` output, so they are validated before entering any
//! queue or file name.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

crate::define_id! {
    /// Stable identifier for a physical or virtual device.
    ///
    /// Matches what the automation backend reports: an ADB serial or an
    /// `ip:port` endpoint for devices attached over TCP.
    pub struct DeviceId;
}

/// Errors from device id validation
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DeviceIdError {
    #[error("device id is empty")]
    Empty,
    #[error("device id contains invalid character: {0:?}")]
    InvalidCharacter(char),
    #[error("invalid IPv4 address: {0}")]
    InvalidAddress(String),
    #[error("invalid port: {0}")]
    InvalidPort(String),
}

impl DeviceId {
    /// Validate a raw device id string.
    ///
    /// Accepts ADB serials (`[A-Za-z0-9._-]`) and `ip:port` endpoints where
    /// the address is a dotted IPv4 quad and the port is 1..=65535.
    pub fn parse(raw: &str) -> Result<Self, DeviceIdError> {
        if raw.is_empty() {
            return Err(DeviceIdError::Empty);
        }
        if let Some((addr, port)) = raw.split_once(':') {
            validate_ipv4(addr)?;
            validate_port(port)?;
            return Ok(Self::new(raw));
        }
        for c in raw.chars() {
            if !c.is_ascii_alphanumeric() && c != '.' && c != '_' && c != '-' {
                return Err(DeviceIdError::InvalidCharacter(c));
            }
        }
        Ok(Self::new(raw))
    }
}

fn validate_ipv4(addr: &str) -> Result<(), DeviceIdError> {
    let octets: Vec<&str> = addr.split('.').collect();
    if octets.len() != 4 {
        return Err(DeviceIdError::InvalidAddress(addr.to_string()));
    }
    for octet in octets {
        if octet.is_empty() || octet.parse::<u8>().is_err() {
            return Err(DeviceIdError::InvalidAddress(addr.to_string()));
        }
    }
    Ok(())
}

fn validate_port(port: &str) -> Result<(), DeviceIdError> {
    match port.parse::<u16>() {
        Ok(p) if p > 0 => Ok(()),
        _ => Err(DeviceIdError::InvalidPort(port.to_string())),
    }
}

/// Connection state as reported by the automation backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceStatus {
    Connected,
    Offline,
    Unauthorized,
}

impl fmt::Display for DeviceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeviceStatus::Connected => write!(f, "connected"),
            DeviceStatus::Offline => write!(f, "offline"),
            DeviceStatus::Unauthorized => write!(f, "unauthorized"),
        }
    }
}

/// What the device is reserved for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceRole {
    Editing,
    Testing,
}

impl Default for DeviceRole {
    fn default() -> Self {
        DeviceRole::Testing
    }
}

/// Static hardware snapshot captured at discovery.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HardwareInfo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub brand: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub os: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub os_version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolution: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cpu_abi: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sdk: Option<String>,
}

/// Runtime snapshot refreshed on each inventory scan.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RuntimeInfo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub battery_pct: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub battery_temp_c: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memory_mb: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage_gb: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cpu_temp_c: Option<f32>,
}

/// Persistent device descriptor.
///
/// Created on first discovery, updated on every scan, deleted only by
/// explicit user action.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Device {
    pub id: DeviceId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,
    #[serde(default)]
    pub hardware: HardwareInfo,
    #[serde(default)]
    pub runtime: RuntimeInfo,
    pub status: DeviceStatus,
    #[serde(default)]
    pub role: DeviceRole,
    pub first_connected_at_ms: u64,
    pub last_connected_at_ms: u64,
}

impl Device {
    /// Create a descriptor for a freshly discovered device.
    pub fn discovered(id: DeviceId, status: DeviceStatus, epoch_ms: u64) -> Self {
        Self {
            id,
            alias: None,
            hardware: HardwareInfo::default(),
            runtime: RuntimeInfo::default(),
            status,
            role: DeviceRole::default(),
            first_connected_at_ms: epoch_ms,
            last_connected_at_ms: epoch_ms,
        }
    }
}

#[cfg(test)]
#[path = "device_tests.rs"]
mod tests;
