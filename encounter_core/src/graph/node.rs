//! Node definitions - the steps of an encounter.

use encounter_state::{ScopeKind, Value};
use serde::{Deserialize, Serialize};

use super::{Edge, EventPayload, PresentedKind, PresentedPayload, SwitchPayload};

/// Stable, author-assigned identifier of a node.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(pub String);

impl NodeId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for NodeId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for NodeId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Authoring flags of a node.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeFlags {
    /// Valid graph entry point.
    pub is_beginning: bool,
    /// Valid terminal point.
    pub is_ending: bool,
    /// The node must define a fallback edge.
    pub requires_fallback: bool,
    /// Presentation hint only.
    pub editable_duration: bool,
}

/// How a switch node picks one of its eligible edges.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SelectionMethod {
    /// The first eligible edge in authored order.
    #[default]
    FirstFilter,
    /// Uniform choice among eligible edges.
    Random,
    /// Choice proportional to edge weight; non-positive weights never win.
    RandomWeighted,
}

/// One write performed by a "set" node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScopeWrite {
    pub scope: ScopeKind,
    pub key: String,
    pub value: Value,
}

impl ScopeWrite {
    pub fn new(scope: ScopeKind, key: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            scope,
            key: key.into(),
            value: value.into(),
        }
    }
}

/// The shape and behaviour of a node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum NodeBody {
    /// Linear step with no side effects.
    Pass {
        #[serde(default)]
        next: Option<NodeId>,
    },

    /// Linear step that writes into scopes before advancing.
    Set {
        writes: Vec<ScopeWrite>,
        #[serde(default)]
        next: Option<NodeId>,
    },

    /// Picks exactly one edge and follows it.
    Switch {
        #[serde(default)]
        method: SelectionMethod,
        edges: Vec<Edge<SwitchPayload>>,
    },

    /// Dispatches actions and waits for the halting ones.
    Event {
        /// Every eligible edge halts, whatever its own flag says.
        #[serde(default)]
        always_halting: bool,
        edges: Vec<Edge<EventPayload>>,
        #[serde(default)]
        next: Option<NodeId>,
    },

    /// Hands its eligible edges to presentation and waits for it.
    Presented {
        kind: PresentedKind,
        edges: Vec<Edge<PresentedPayload>>,
        #[serde(default)]
        next: Option<NodeId>,
    },
}

/// Node kinds, used to route handoffs to presentation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeKind {
    Pass,
    Set,
    Switch,
    Event,
    Presented(PresentedKind),
}

/// A vertex of the encounter graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub id: NodeId,
    #[serde(default)]
    pub flags: NodeFlags,
    pub body: NodeBody,
}

impl Node {
    /// Create a node with default flags.
    pub fn new(id: impl Into<NodeId>, body: NodeBody) -> Self {
        Self {
            id: id.into(),
            flags: NodeFlags::default(),
            body,
        }
    }

    pub fn pass(id: impl Into<NodeId>, next: Option<NodeId>) -> Self {
        Self::new(id, NodeBody::Pass { next })
    }

    pub fn set(id: impl Into<NodeId>, writes: Vec<ScopeWrite>, next: Option<NodeId>) -> Self {
        Self::new(id, NodeBody::Set { writes, next })
    }

    pub fn switch(
        id: impl Into<NodeId>,
        method: SelectionMethod,
        edges: Vec<Edge<SwitchPayload>>,
    ) -> Self {
        Self::new(id, NodeBody::Switch { method, edges })
    }

    pub fn event(
        id: impl Into<NodeId>,
        always_halting: bool,
        edges: Vec<Edge<EventPayload>>,
        next: Option<NodeId>,
    ) -> Self {
        Self::new(
            id,
            NodeBody::Event {
                always_halting,
                edges,
                next,
            },
        )
    }

    pub fn presented(
        id: impl Into<NodeId>,
        kind: PresentedKind,
        edges: Vec<Edge<PresentedPayload>>,
        next: Option<NodeId>,
    ) -> Self {
        Self::new(id, NodeBody::Presented { kind, edges, next })
    }

    /// Mark as a valid entry point.
    pub fn beginning(mut self) -> Self {
        self.flags.is_beginning = true;
        self
    }

    /// Mark as a valid terminal point.
    pub fn ending(mut self) -> Self {
        self.flags.is_ending = true;
        self
    }

    /// Require a fallback edge.
    pub fn requiring_fallback(mut self) -> Self {
        self.flags.requires_fallback = true;
        self
    }

    pub fn with_editable_duration(mut self) -> Self {
        self.flags.editable_duration = true;
        self
    }

    pub fn kind(&self) -> NodeKind {
        match &self.body {
            NodeBody::Pass { .. } => NodeKind::Pass,
            NodeBody::Set { .. } => NodeKind::Set,
            NodeBody::Switch { .. } => NodeKind::Switch,
            NodeBody::Event { .. } => NodeKind::Event,
            NodeBody::Presented { kind, .. } => NodeKind::Presented(*kind),
        }
    }

    /// Whether the node has a single successor and no filtering.
    pub fn is_linear(&self) -> bool {
        matches!(self.body, NodeBody::Pass { .. } | NodeBody::Set { .. })
    }

    /// The successor declared by the node itself, if any.
    pub fn next(&self) -> Option<&NodeId> {
        match &self.body {
            NodeBody::Pass { next }
            | NodeBody::Set { next, .. }
            | NodeBody::Event { next, .. }
            | NodeBody::Presented { next, .. } => next.as_ref(),
            NodeBody::Switch { .. } => None,
        }
    }

    /// Every successor id the node refers to, its own and its edges'.
    pub fn successors(&self) -> Vec<&NodeId> {
        let edge_targets: Vec<&NodeId> = match &self.body {
            NodeBody::Pass { .. } | NodeBody::Set { .. } => Vec::new(),
            NodeBody::Switch { edges, .. } => edges.iter().filter_map(|e| e.next.as_ref()).collect(),
            NodeBody::Event { edges, .. } => edges.iter().filter_map(|e| e.next.as_ref()).collect(),
            NodeBody::Presented { edges, .. } => {
                edges.iter().filter_map(|e| e.next.as_ref()).collect()
            }
        };

        self.next().into_iter().chain(edge_targets).collect()
    }

    /// Number of authored edges; zero for linear nodes.
    pub fn edge_count(&self) -> usize {
        match &self.body {
            NodeBody::Pass { .. } | NodeBody::Set { .. } => 0,
            NodeBody::Switch { edges, .. } => edges.len(),
            NodeBody::Event { edges, .. } => edges.len(),
            NodeBody::Presented { edges, .. } => edges.len(),
        }
    }

    /// Number of edges flagged as fallback.
    pub fn fallback_count(&self) -> usize {
        match &self.body {
            NodeBody::Pass { .. } | NodeBody::Set { .. } => 0,
            NodeBody::Switch { edges, .. } => edges.iter().filter(|e| e.is_fallback).count(),
            NodeBody::Event { edges, .. } => edges.iter().filter(|e| e.is_fallback).count(),
            NodeBody::Presented { edges, .. } => edges.iter().filter(|e| e.is_fallback).count(),
        }
    }
}
