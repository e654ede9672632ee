//! Handlers - runtime state of a node waiting on presentation.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use uuid::Uuid;

use crate::graph::{EdgeId, NodeId, NodeKind};

/// Identifier of one node activation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct HandlerId(pub Uuid);

impl HandlerId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for HandlerId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for HandlerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// What a completion call did to a handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompletionOutcome {
    /// The edge was pending and is now complete.
    Recorded,
    /// The edge had already completed.
    Duplicate,
    /// The edge is not one the handler waits on.
    NotRequired,
}

/// The runtime instance of an active edged node.
///
/// Created by the evaluator when a node starts waiting and dropped when the
/// node exits or the traversal is abandoned. Presentation only ever sees it
/// by shared reference.
#[derive(Debug, Clone)]
pub struct Handler {
    id: HandlerId,
    node: NodeId,
    kind: NodeKind,

    /// Edges handed to presentation, in authored order.
    eligible: Vec<EdgeId>,

    /// Whether `eligible` is the fallback set.
    used_fallback: bool,

    /// Edge chosen by presentation, for presented nodes.
    selection: Option<EdgeId>,

    /// Halting edges the node waits on.
    required: BTreeSet<EdgeId>,
    completed: BTreeSet<EdgeId>,

    /// Non-halting edges sent off without waiting.
    dispatched: Vec<EdgeId>,
}

impl Handler {
    pub(crate) fn new(
        node: NodeId,
        kind: NodeKind,
        eligible: Vec<EdgeId>,
        used_fallback: bool,
    ) -> Self {
        Self {
            id: HandlerId::new(),
            node,
            kind,
            eligible,
            used_fallback,
            selection: None,
            required: BTreeSet::new(),
            completed: BTreeSet::new(),
            dispatched: Vec::new(),
        }
    }

    pub(crate) fn with_halting(
        mut self,
        required: BTreeSet<EdgeId>,
        dispatched: Vec<EdgeId>,
    ) -> Self {
        self.required = required;
        self.dispatched = dispatched;
        self
    }

    pub fn id(&self) -> HandlerId {
        self.id
    }

    pub fn node(&self) -> &NodeId {
        &self.node
    }

    pub fn kind(&self) -> NodeKind {
        self.kind
    }

    pub fn eligible(&self) -> &[EdgeId] {
        &self.eligible
    }

    pub fn used_fallback(&self) -> bool {
        self.used_fallback
    }

    pub fn selection(&self) -> Option<EdgeId> {
        self.selection
    }

    pub fn required(&self) -> &BTreeSet<EdgeId> {
        &self.required
    }

    pub fn dispatched(&self) -> &[EdgeId] {
        &self.dispatched
    }

    /// Required edges still waiting for completion.
    pub fn pending(&self) -> impl Iterator<Item = EdgeId> + '_ {
        self.required.difference(&self.completed).copied()
    }

    /// Whether every required edge has completed.
    pub fn is_satisfied(&self) -> bool {
        self.completed.len() == self.required.len()
    }

    pub(crate) fn record_completion(&mut self, edge: EdgeId) -> CompletionOutcome {
        if !self.required.contains(&edge) {
            CompletionOutcome::NotRequired
        } else if self.completed.insert(edge) {
            CompletionOutcome::Recorded
        } else {
            CompletionOutcome::Duplicate
        }
    }

    pub(crate) fn select(&mut self, edge: EdgeId) {
        self.selection = Some(edge);
    }
}
