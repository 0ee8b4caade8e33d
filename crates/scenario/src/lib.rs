// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::expect_used))]
#![cfg_attr(test, allow(clippy::unwrap_used))]

//! dl-scenario: scenario graph model for devicelab.
//!
//! A scenario is a directed graph of test steps: one `start` node, `action`
//! and `condition` and `loop` nodes in the middle, `end` nodes at the
//! leaves. Documents are stored as JSON; every parameter bag is a typed sum
//! (one variant per action/condition/loop kind) so the interpreter is a
//! single exhaustive match.

mod action;
mod condition;
mod graph;
mod selector;
mod validate;

pub use action::{ActionKind, ActionParams, DEFAULT_ACTION_TIMEOUT_MS, DEFAULT_WAIT_INTERVAL_MS};
pub use condition::{ConditionKind, ConditionParams};
pub use graph::{Branch, Connection, LoopKind, LoopParams, Node, NodeId, NodeKind, Scenario};
pub use selector::{Selector, SelectorStrategy};
pub use validate::{validate, ScenarioError};
