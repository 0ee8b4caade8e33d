// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Scenario graph: nodes, connections, and traversal lookups.

use serde::{Deserialize, Serialize};

use dl_core::ScenarioId;

use crate::action::ActionParams;
use crate::condition::ConditionParams;
use crate::selector::Selector;

dl_core::define_id! {
    /// Identifier of a node inside one scenario graph.
    pub struct NodeId;
}

/// Loop kinds, tagged by `loopType`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "loopType", rename_all = "camelCase")]
pub enum LoopKind {
    /// Iterate the body a fixed number of times.
    Count { count: u32 },
    /// Iterate while the selector matches something on screen.
    WhileExists {
        #[serde(flatten)]
        target: Selector,
    },
    /// Iterate while the selector matches nothing on screen.
    WhileNotExists {
        #[serde(flatten)]
        target: Selector,
    },
}

/// Parameter bag of a loop node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoopParams {
    #[serde(flatten)]
    pub kind: LoopKind,
}

/// Node behavior, tagged by `type` with parameters under `params`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "params", rename_all = "lowercase")]
pub enum NodeKind {
    Start,
    Action(ActionParams),
    Condition(ConditionParams),
    Loop(LoopParams),
    End,
}

impl NodeKind {
    /// Node type name as stored in step records.
    pub fn type_name(&self) -> &'static str {
        match self {
            NodeKind::Start => "start",
            NodeKind::Action(_) => "action",
            NodeKind::Condition(_) => "condition",
            NodeKind::Loop(_) => "loop",
            NodeKind::End => "end",
        }
    }

    pub fn is_loop(&self) -> bool {
        matches!(self, NodeKind::Loop(_))
    }
}

/// One node of a scenario graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub id: NodeId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(flatten)]
    pub kind: NodeKind,
}

impl Node {
    /// Display name: the label when present, otherwise a kind-derived name.
    pub fn display_name(&self) -> String {
        if let Some(label) = &self.label {
            return label.clone();
        }
        match &self.kind {
            NodeKind::Action(params) => params.kind.name().to_string(),
            NodeKind::Condition(params) => params.kind.name().to_string(),
            other => other.type_name().to_string(),
        }
    }
}

/// Branch discriminator on a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Branch {
    Yes,
    No,
    Loop,
    Exit,
}

/// Directed edge between two nodes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Connection {
    pub from: NodeId,
    pub to: NodeId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch: Option<Branch>,
}

/// A stored scenario document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scenario {
    pub id: ScenarioId,
    pub name: String,
    #[serde(default, rename = "packageId", skip_serializing_if = "Option::is_none")]
    pub package_id: Option<String>,
    pub nodes: Vec<Node>,
    pub connections: Vec<Connection>,
}

impl Scenario {
    /// Look up a node by id.
    pub fn node(&self, id: &NodeId) -> Option<&Node> {
        self.nodes.iter().find(|n| &n.id == id)
    }

    /// The unique start node, if the graph has exactly one.
    pub fn start_node(&self) -> Option<&Node> {
        let mut starts = self
            .nodes
            .iter()
            .filter(|n| matches!(n.kind, NodeKind::Start));
        match (starts.next(), starts.next()) {
            (Some(node), None) => Some(node),
            _ => None,
        }
    }

    /// First unbranched successor of a node.
    pub fn successor(&self, from: &NodeId) -> Option<&NodeId> {
        self.connections
            .iter()
            .find(|c| &c.from == from && c.branch.is_none())
            .map(|c| &c.to)
    }

    /// Successor along a specific branch.
    pub fn branch_successor(&self, from: &NodeId, branch: Branch) -> Option<&NodeId> {
        self.connections
            .iter()
            .find(|c| &c.from == from && c.branch == Some(branch))
            .map(|c| &c.to)
    }
}

#[cfg(test)]
#[path = "graph_tests.rs"]
mod tests;
