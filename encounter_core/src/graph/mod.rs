//! Encounter graph - validated nodes and edges.
//!
//! The graph consists of:
//! - **Nodes**: steps of the encounter, either linear or edged
//! - **Edges**: filter-gated transitions carrying kind-specific payloads
//!
//! A [`Graph`] can only be built from nodes that pass validation, so the
//! evaluator never has to check authoring invariants at traversal time.

mod edge;
mod node;

pub use edge::*;
pub use node::*;

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::debug;

use crate::address::LocalContext;
use crate::error::{EngineError, EngineResult};

/// Serializable form of a graph, as produced by authoring tools.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GraphDefinition {
    pub nodes: Vec<Node>,
}

/// A validated encounter graph.
#[derive(Debug, Clone)]
pub struct Graph {
    /// Nodes in authored order.
    nodes: Vec<Node>,

    /// Index: node id -> position in `nodes`.
    index: HashMap<NodeId, usize>,
}

impl Graph {
    /// Build a graph, rejecting nodes that break an authoring invariant.
    pub fn new(nodes: Vec<Node>) -> EngineResult<Self> {
        let mut index = HashMap::with_capacity(nodes.len());
        for (position, node) in nodes.iter().enumerate() {
            if index.insert(node.id.clone(), position).is_some() {
                return Err(EngineError::DuplicateNode(node.id.clone()));
            }
        }

        for node in &nodes {
            for target in node.successors() {
                if !index.contains_key(target) {
                    return Err(EngineError::DanglingSuccessor {
                        node: node.id.clone(),
                        target: target.clone(),
                    });
                }
            }
            validate_node(node)?;
        }

        if !nodes.iter().any(|node| node.flags.is_beginning) {
            return Err(EngineError::NoBeginningNode);
        }

        debug!(nodes = nodes.len(), "graph validated");
        Ok(Self { nodes, index })
    }

    /// Build a graph from its definition.
    pub fn from_definition(definition: GraphDefinition) -> EngineResult<Self> {
        Self::new(definition.nodes)
    }

    /// Parse and validate a JSON graph definition.
    pub fn from_json(json: &str) -> EngineResult<Self> {
        let definition: GraphDefinition = serde_json::from_str(json)?;
        Self::from_definition(definition)
    }

    /// The serializable form of this graph.
    pub fn to_definition(&self) -> GraphDefinition {
        GraphDefinition {
            nodes: self.nodes.clone(),
        }
    }

    /// Get node by ID.
    pub fn node(&self, id: &NodeId) -> Option<&Node> {
        self.index.get(id).map(|&position| &self.nodes[position])
    }

    /// Get node by ID, failing with [`EngineError::UnknownNode`].
    pub fn require(&self, id: &NodeId) -> EngineResult<&Node> {
        self.node(id)
            .ok_or_else(|| EngineError::UnknownNode(id.clone()))
    }

    /// The first beginning node in authored order.
    pub fn beginning(&self) -> Option<&Node> {
        self.nodes.iter().find(|node| node.flags.is_beginning)
    }

    /// All valid entry points.
    pub fn beginnings(&self) -> impl Iterator<Item = &Node> {
        self.nodes.iter().filter(|node| node.flags.is_beginning)
    }

    /// All valid terminal points.
    pub fn endings(&self) -> impl Iterator<Item = &Node> {
        self.nodes.iter().filter(|node| node.flags.is_ending)
    }

    /// Iterate nodes in authored order.
    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.iter()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

fn validate_node(node: &Node) -> EngineResult<()> {
    match &node.body {
        NodeBody::Pass { .. } | NodeBody::Set { .. } => return Ok(()),
        NodeBody::Switch { edges, .. } => {
            if edges.is_empty() {
                return Err(EngineError::EmptyGraphNode {
                    node: node.id.clone(),
                });
            }
            validate_filters(node, edges)?;
        }
        NodeBody::Event { edges, .. } => validate_filters(node, edges)?,
        NodeBody::Presented { kind, edges, .. } => {
            for (position, edge) in edges.iter().enumerate() {
                let found = edge.payload.kind();
                if found != *kind {
                    return Err(EngineError::EdgeKindMismatch {
                        node: node.id.clone(),
                        edge: EdgeId(position),
                        expected: *kind,
                        found,
                    });
                }
            }
            validate_filters(node, edges)?;
        }
    }

    if node.flags.requires_fallback && node.fallback_count() == 0 {
        return Err(EngineError::MissingFallback {
            node: node.id.clone(),
        });
    }

    Ok(())
}

fn validate_filters<P: LocalContext>(node: &Node, edges: &[Edge<P>]) -> EngineResult<()> {
    for (position, edge) in edges.iter().enumerate() {
        edge.validate_filters()
            .map_err(|mismatch| EngineError::OperandTypeMismatch {
                node: node.id.clone(),
                edge: EdgeId(position),
                operand: mismatch.operand,
                expected: mismatch.expected,
                found: mismatch.found,
            })?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::address::Address;
    use crate::filter::{FilterEntry, IntOp};
    use encounter_state::ValueType;

    fn start() -> Node {
        Node::pass("start", Some("end".into())).beginning()
    }

    fn end() -> Node {
        Node::pass("end", None).ending()
    }

    #[test]
    fn test_valid_graph() {
        let graph = Graph::new(vec![start(), end()]).unwrap();

        assert_eq!(graph.len(), 2);
        assert_eq!(graph.beginning().unwrap().id, NodeId::from("start"));
        assert_eq!(graph.endings().count(), 1);
        assert!(graph.node(&"end".into()).is_some());
        assert!(matches!(
            graph.require(&"missing".into()),
            Err(EngineError::UnknownNode(_))
        ));
    }

    #[test]
    fn test_several_beginnings() {
        let side_door = Node::pass("side_door", Some("end".into())).beginning();
        let graph = Graph::new(vec![start(), side_door, end()]).unwrap();

        let ids: Vec<&str> = graph.beginnings().map(|node| node.id.as_str()).collect();
        assert_eq!(ids, vec!["start", "side_door"]);
        assert_eq!(graph.beginning().unwrap().id, NodeId::from("start"));
    }

    #[test]
    fn test_duplicate_node() {
        let err = Graph::new(vec![start(), end(), end()]).unwrap_err();
        assert!(matches!(err, EngineError::DuplicateNode(id) if id.as_str() == "end"));
    }

    #[test]
    fn test_dangling_successor() {
        let err = Graph::new(vec![start()]).unwrap_err();
        assert!(matches!(
            err,
            EngineError::DanglingSuccessor { target, .. } if target.as_str() == "end"
        ));
    }

    #[test]
    fn test_dangling_edge_target() {
        let switch = Node::switch(
            "start",
            SelectionMethod::FirstFilter,
            vec![Edge::new(SwitchPayload::default()).to("nowhere")],
        )
        .beginning();
        assert!(matches!(
            Graph::new(vec![switch]),
            Err(EngineError::DanglingSuccessor { .. })
        ));
    }

    #[test]
    fn test_empty_switch_is_rejected() {
        let switch = Node::switch("start", SelectionMethod::Random, vec![]).beginning();
        let err = Graph::new(vec![switch]).unwrap_err();
        assert!(matches!(err, EngineError::EmptyGraphNode { node } if node.as_str() == "start"));
    }

    #[test]
    fn test_missing_fallback() {
        let switch = Node::switch(
            "start",
            SelectionMethod::FirstFilter,
            vec![Edge::new(SwitchPayload::default()).to("end")],
        )
        .beginning()
        .requiring_fallback();
        let err = Graph::new(vec![switch, end()]).unwrap_err();
        assert!(matches!(err, EngineError::MissingFallback { .. }));
    }

    #[test]
    fn test_presented_edge_kind_mismatch() {
        let node = Node::presented(
            "start",
            PresentedKind::Button,
            vec![
                Edge::new(PresentedPayload::button("OK")),
                Edge::new(PresentedPayload::text("oops")),
            ],
            None,
        )
        .beginning();

        let err = Graph::new(vec![node]).unwrap_err();
        assert!(matches!(
            err,
            EngineError::EdgeKindMismatch {
                edge: EdgeId(1),
                expected: PresentedKind::Button,
                found: PresentedKind::Text,
                ..
            }
        ));
    }

    #[test]
    fn test_operand_type_mismatch() {
        let switch = Node::switch(
            "start",
            SelectionMethod::FirstFilter,
            vec![Edge::new(SwitchPayload::default())
                .to("end")
                .with_filter(FilterEntry::int_kv(
                    IntOp::Equal,
                    Address::local("weight"),
                    Address::constant(1),
                ))],
        )
        .beginning();

        let err = Graph::new(vec![switch, end()]).unwrap_err();
        match err {
            EngineError::OperandTypeMismatch {
                operand,
                expected,
                found,
                ..
            } => {
                assert_eq!(operand, "weight");
                assert_eq!(expected, ValueType::Int);
                assert_eq!(found, Some(ValueType::Float));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_no_beginning() {
        let err = Graph::new(vec![end()]).unwrap_err();
        assert!(matches!(err, EngineError::NoBeginningNode));
    }

    #[test]
    fn test_self_edge_is_legal() {
        let looping = Node::switch(
            "start",
            SelectionMethod::FirstFilter,
            vec![Edge::new(SwitchPayload::default()).to("start")],
        )
        .beginning();
        assert!(Graph::new(vec![looping]).is_ok());
    }

    #[test]
    fn test_from_json() {
        let json = r#"{
            "nodes": [
                {
                    "id": "start",
                    "flags": { "is_beginning": true },
                    "body": {
                        "type": "Switch",
                        "method": "RandomWeighted",
                        "edges": [
                            { "payload": { "weight": 1.0 }, "next": "end" },
                            { "payload": { "weight": 3.0 }, "next": "end" }
                        ]
                    }
                },
                { "id": "end", "flags": { "is_ending": true }, "body": { "type": "Pass" } }
            ]
        }"#;

        let graph = Graph::from_json(json).unwrap();
        assert_eq!(graph.len(), 2);
        assert_eq!(graph.to_definition().nodes[0].edge_count(), 2);

        assert!(matches!(
            Graph::from_json("{ \"nodes\": 3 }"),
            Err(EngineError::Definition(_))
        ));
    }
}
