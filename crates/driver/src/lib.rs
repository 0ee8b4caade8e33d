// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! dl-driver: automation adapters for devicelab.
//!
//! The orchestration core talks to devices exclusively through the
//! [`AutomationDriver`] trait; the ADB implementation shells out to `adb`
//! per call, the fake is fully scripted for tests.

pub mod automation;
pub mod matcher;

pub use automation::{
    AdbDriver, AutomationDriver, DiscoveredDevice, DriverError, ElementRect, RecordingOptions,
};
pub use matcher::{MatcherError, NoopMatcher, TemplateMatch, TemplateMatcher};

// Test support - only compiled for tests or when explicitly requested
#[cfg(any(test, feature = "test-support"))]
pub use automation::{DriverCall, FakeDriver};
#[cfg(any(test, feature = "test-support"))]
pub use matcher::FakeMatcher;
