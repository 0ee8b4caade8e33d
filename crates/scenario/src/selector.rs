// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Element selectors for touch and wait actions.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Location strategy understood by the automation driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SelectorStrategy {
    #[serde(rename = "id")]
    Id,
    #[serde(rename = "xpath")]
    Xpath,
    #[serde(rename = "accessibility id")]
    AccessibilityId,
    #[serde(rename = "text")]
    Text,
}

impl fmt::Display for SelectorStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SelectorStrategy::Id => write!(f, "id"),
            SelectorStrategy::Xpath => write!(f, "xpath"),
            SelectorStrategy::AccessibilityId => write!(f, "accessibility id"),
            SelectorStrategy::Text => write!(f, "text"),
        }
    }
}

/// A strategy + value pair identifying one element on screen.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Selector {
    pub strategy: SelectorStrategy,
    #[serde(rename = "selector")]
    pub value: String,
}

impl Selector {
    pub fn new(strategy: SelectorStrategy, value: impl Into<String>) -> Self {
        Self {
            strategy,
            value: value.into(),
        }
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.strategy, self.value)
    }
}
