// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Typed action parameters.
//!
//! One variant per `actionType` found in stored scenario documents. Common
//! knobs (timeout, continue-on-error) sit beside the kind so every action
//! carries them without repeating fields per variant.

use serde::{Deserialize, Serialize};

use crate::selector::Selector;

/// Ambient timeout applied when an action does not carry its own.
pub const DEFAULT_ACTION_TIMEOUT_MS: u64 = 30_000;

/// Polling tick for wait-family actions.
pub const DEFAULT_WAIT_INTERVAL_MS: u64 = 1_000;

/// Parameter bag of an action node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionParams {
    #[serde(flatten)]
    pub kind: ActionKind,
    /// Per-action timeout override in milliseconds.
    #[serde(default, rename = "timeout", skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
    /// Keep walking the graph even if this action fails.
    #[serde(default, rename = "continueOnError")]
    pub continue_on_error: bool,
}

impl ActionParams {
    pub fn new(kind: ActionKind) -> Self {
        Self {
            kind,
            timeout_ms: None,
            continue_on_error: false,
        }
    }

    pub fn timeout_ms(&self) -> u64 {
        self.timeout_ms.unwrap_or(DEFAULT_ACTION_TIMEOUT_MS)
    }
}

/// All supported action kinds, tagged by `actionType`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "actionType", rename_all = "camelCase")]
pub enum ActionKind {
    // -- touch --
    Tap {
        x: i32,
        y: i32,
    },
    TapElement {
        #[serde(flatten)]
        target: Selector,
    },
    #[serde(rename_all = "camelCase")]
    LongPress {
        x: i32,
        y: i32,
        #[serde(default = "default_long_press_ms")]
        duration_ms: u64,
    },
    #[serde(rename_all = "camelCase")]
    Swipe {
        x1: i32,
        y1: i32,
        x2: i32,
        y2: i32,
        #[serde(default = "default_swipe_ms")]
        duration_ms: u64,
    },
    DoubleTap {
        x: i32,
        y: i32,
    },

    // -- wait --
    Wait {
        ms: u64,
    },
    #[serde(rename_all = "camelCase")]
    WaitUntilExists {
        #[serde(flatten)]
        target: Selector,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        interval_ms: Option<u64>,
    },
    #[serde(rename_all = "camelCase")]
    WaitUntilGone {
        #[serde(flatten)]
        target: Selector,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        interval_ms: Option<u64>,
    },
    WaitUntilTextExists {
        text: String,
    },
    WaitUntilTextGone {
        text: String,
    },
    #[serde(rename_all = "camelCase")]
    WaitUntilImage {
        template_id: String,
    },
    #[serde(rename_all = "camelCase")]
    WaitUntilImageGone {
        template_id: String,
    },

    // -- app --
    LaunchApp {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        package: Option<String>,
    },
    TerminateApp {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        package: Option<String>,
    },
    RestartApp,
    ClearData {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        package: Option<String>,
    },
    ClearCache {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        package: Option<String>,
    },

    // -- nav --
    Back,
    Home,

    // -- text --
    InputText {
        text: String,
    },
    ClearText,
    PressKey {
        keycode: u32,
    },

    // -- image --
    #[serde(rename_all = "camelCase")]
    TapImage {
        template_id: String,
    },
}

fn default_long_press_ms() -> u64 {
    1_000
}

fn default_swipe_ms() -> u64 {
    300
}

impl ActionKind {
    /// Whether this action blocks polling for a condition (wait family).
    ///
    /// Wait-family actions emit a `waiting` step marker before blocking.
    pub fn is_wait(&self) -> bool {
        matches!(
            self,
            ActionKind::Wait { .. }
                | ActionKind::WaitUntilExists { .. }
                | ActionKind::WaitUntilGone { .. }
                | ActionKind::WaitUntilTextExists { .. }
                | ActionKind::WaitUntilTextGone { .. }
                | ActionKind::WaitUntilImage { .. }
                | ActionKind::WaitUntilImageGone { .. }
        )
    }

    /// Wire name, used for display and step records.
    pub fn name(&self) -> &'static str {
        match self {
            ActionKind::Tap { .. } => "tap",
            ActionKind::TapElement { .. } => "tapElement",
            ActionKind::LongPress { .. } => "longPress",
            ActionKind::Swipe { .. } => "swipe",
            ActionKind::DoubleTap { .. } => "doubleTap",
            ActionKind::Wait { .. } => "wait",
            ActionKind::WaitUntilExists { .. } => "waitUntilExists",
            ActionKind::WaitUntilGone { .. } => "waitUntilGone",
            ActionKind::WaitUntilTextExists { .. } => "waitUntilTextExists",
            ActionKind::WaitUntilTextGone { .. } => "waitUntilTextGone",
            ActionKind::WaitUntilImage { .. } => "waitUntilImage",
            ActionKind::WaitUntilImageGone { .. } => "waitUntilImageGone",
            ActionKind::LaunchApp { .. } => "launchApp",
            ActionKind::TerminateApp { .. } => "terminateApp",
            ActionKind::RestartApp => "restartApp",
            ActionKind::ClearData { .. } => "clearData",
            ActionKind::ClearCache { .. } => "clearCache",
            ActionKind::Back => "back",
            ActionKind::Home => "home",
            ActionKind::InputText { .. } => "inputText",
            ActionKind::ClearText => "clearText",
            ActionKind::PressKey { .. } => "pressKey",
            ActionKind::TapImage { .. } => "tapImage",
        }
    }
}

#[cfg(test)]
#[path = "action_tests.rs"]
mod tests;
