// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Structural validation of scenario graphs.

use indexmap::IndexMap;
use thiserror::Error;

use crate::graph::{Branch, Node, NodeId, NodeKind, Scenario};

/// Errors from scenario validation
#[derive(Debug, Error, PartialEq)]
pub enum ScenarioError {
    #[error("scenario has no start node")]
    MissingStart,
    #[error("scenario has {0} start nodes, expected exactly one")]
    MultipleStart(usize),
    #[error("duplicate node id: {0}")]
    DuplicateNode(NodeId),
    #[error("connection references unknown node: {0}")]
    UnknownNode(NodeId),
    #[error("node {0} has no outgoing connection")]
    NoOutgoing(NodeId),
    #[error("node {node} is missing its '{branch}' branch")]
    MissingBranch { node: NodeId, branch: &'static str },
}

/// Check the graph invariants of a scenario document.
///
/// - exactly one `start` node, with duplicate-free node ids;
/// - every connection endpoint resolves to a known node;
/// - every non-terminal node has outgoing connections consistent with its
///   branching type (`yes`+`no` for conditions, `loop`+`exit` for loops, a
///   plain successor otherwise).
///
/// Back-edges into loop nodes are legal; the graph only has to be finite.
pub fn validate(scenario: &Scenario) -> Result<(), ScenarioError> {
    let mut by_id: IndexMap<&NodeId, &Node> = IndexMap::with_capacity(scenario.nodes.len());
    for node in &scenario.nodes {
        if by_id.insert(&node.id, node).is_some() {
            return Err(ScenarioError::DuplicateNode(node.id.clone()));
        }
    }

    let starts = scenario
        .nodes
        .iter()
        .filter(|n| matches!(n.kind, NodeKind::Start))
        .count();
    match starts {
        0 => return Err(ScenarioError::MissingStart),
        1 => {}
        n => return Err(ScenarioError::MultipleStart(n)),
    }

    for conn in &scenario.connections {
        if !by_id.contains_key(&conn.from) {
            return Err(ScenarioError::UnknownNode(conn.from.clone()));
        }
        if !by_id.contains_key(&conn.to) {
            return Err(ScenarioError::UnknownNode(conn.to.clone()));
        }
    }

    for node in &scenario.nodes {
        match &node.kind {
            NodeKind::End => {}
            NodeKind::Condition(_) => {
                require_branch(scenario, &node.id, Branch::Yes, "yes")?;
                require_branch(scenario, &node.id, Branch::No, "no")?;
            }
            NodeKind::Loop(_) => {
                require_branch(scenario, &node.id, Branch::Loop, "loop")?;
                require_branch(scenario, &node.id, Branch::Exit, "exit")?;
            }
            NodeKind::Start | NodeKind::Action(_) => {
                if scenario.successor(&node.id).is_none() {
                    return Err(ScenarioError::NoOutgoing(node.id.clone()));
                }
            }
        }
    }

    Ok(())
}

fn require_branch(
    scenario: &Scenario,
    node: &NodeId,
    branch: Branch,
    name: &'static str,
) -> Result<(), ScenarioError> {
    if scenario.branch_successor(node, branch).is_none() {
        return Err(ScenarioError::MissingBranch {
            node: node.clone(),
            branch: name,
        });
    }
    Ok(())
}

#[cfg(test)]
#[path = "validate_tests.rs"]
mod tests;
