//! Error types for graph construction and traversal.

use encounter_state::{ScopeError, ValueType};
use thiserror::Error;

use crate::graph::{EdgeId, NodeId, PresentedKind};

/// Errors raised while loading a graph or traversing it.
#[derive(Debug, Error)]
pub enum EngineError {
    /// A "set" node wrote a value the scope rejected.
    #[error(transparent)]
    Scope(#[from] ScopeError),

    /// No edge was eligible and the node has no fallback edge.
    #[error("dead end at node {node}: no eligible edge and no fallback")]
    GraphDeadEnd { node: NodeId },

    #[error("switch node {node} has no edges")]
    EmptyGraphNode { node: NodeId },

    #[error("node id {0} is defined more than once")]
    DuplicateNode(NodeId),

    #[error("node {node} points at unknown node {target}")]
    DanglingSuccessor { node: NodeId, target: NodeId },

    #[error("node {node} requires a fallback edge but defines none")]
    MissingFallback { node: NodeId },

    #[error("edge {edge} of {expected} node {node} carries a {found} payload")]
    EdgeKindMismatch {
        node: NodeId,
        edge: EdgeId,
        expected: PresentedKind,
        found: PresentedKind,
    },

    #[error(
        "filter on edge {edge} of node {node}: operand `{operand}` must be {expected}, found {}",
        describe_found(.found)
    )]
    OperandTypeMismatch {
        node: NodeId,
        edge: EdgeId,
        operand: String,
        expected: ValueType,
        found: Option<ValueType>,
    },

    #[error("graph has no beginning node")]
    NoBeginningNode,

    #[error("unknown node {0}")]
    UnknownNode(NodeId),

    #[error("traversal did not wait or end within {0} steps")]
    StepLimitExceeded(usize),

    #[error("no node is active")]
    NotActive,

    #[error("invalid graph definition: {0}")]
    Definition(#[from] serde_json::Error),

    #[error("invalid engine config: {0}")]
    Config(#[from] toml::de::Error),
}

fn describe_found(found: &Option<ValueType>) -> String {
    match found {
        Some(value_type) => value_type.to_string(),
        None => "nothing".to_string(),
    }
}

/// Result alias for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;
