// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Typed condition parameters.

use serde::{Deserialize, Serialize};

use crate::selector::Selector;

/// Parameter bag of a condition node.
///
/// Evaluation yields a boolean routed through the node's `yes`/`no`
/// branches. A condition that errors is recorded and treated as `no`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConditionParams {
    #[serde(flatten)]
    pub kind: ConditionKind,
    /// Per-condition timeout override in milliseconds.
    #[serde(default, rename = "timeout", skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
}

/// All supported condition kinds, tagged by `conditionType`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "conditionType", rename_all = "camelCase")]
pub enum ConditionKind {
    ElementExists {
        #[serde(flatten)]
        target: Selector,
    },
    ElementNotExists {
        #[serde(flatten)]
        target: Selector,
    },
    TextExists {
        text: String,
    },
    TextNotExists {
        text: String,
    },
    #[serde(rename_all = "camelCase")]
    ImageExists {
        template_id: String,
    },
    #[serde(rename_all = "camelCase")]
    ImageNotExists {
        template_id: String,
    },
}

impl ConditionKind {
    /// Wire name, used for display and step records.
    pub fn name(&self) -> &'static str {
        match self {
            ConditionKind::ElementExists { .. } => "elementExists",
            ConditionKind::ElementNotExists { .. } => "elementNotExists",
            ConditionKind::TextExists { .. } => "textExists",
            ConditionKind::TextNotExists { .. } => "textNotExists",
            ConditionKind::ImageExists { .. } => "imageExists",
            ConditionKind::ImageNotExists { .. } => "imageNotExists",
        }
    }
}
