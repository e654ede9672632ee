//! Handoff of waiting nodes to presentation.
//!
//! The engine never draws anything. When a node waits, its [`Handler`] is
//! routed to the [`Presenter`] registered for the node's kind, which later
//! resumes traversal through [`Encounter::complete`] or [`Encounter::finish`].

use std::collections::HashMap;
use tracing::{debug, warn};

use crate::evaluator::{Activation, Encounter, Exit, Handler};
use crate::graph::{EdgeId, EventPayload, Graph, Node, NodeBody, NodeKind};

/// Consumer of one node kind.
pub trait Presenter {
    /// Show a waiting node.
    fn present(&mut self, node: &Node, handler: &Handler);

    /// Run a fire-and-forget event edge.
    fn dispatch(&mut self, _node: &Node, _edge: EdgeId, _payload: &EventPayload) {}
}

/// Routes handlers to presenters by node kind.
#[derive(Default)]
pub struct PresentationRouter {
    presenters: HashMap<NodeKind, Box<dyn Presenter>>,
}

impl std::fmt::Debug for PresentationRouter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PresentationRouter")
            .field("kinds", &self.presenters.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl PresentationRouter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the presenter of a kind, replacing any previous one.
    pub fn register(&mut self, kind: NodeKind, presenter: impl Presenter + 'static) {
        if self.presenters.insert(kind, Box::new(presenter)).is_some() {
            debug!(?kind, "presenter replaced");
        }
    }

    pub fn with_presenter(mut self, kind: NodeKind, presenter: impl Presenter + 'static) -> Self {
        self.register(kind, presenter);
        self
    }

    pub fn handles(&self, kind: NodeKind) -> bool {
        self.presenters.contains_key(&kind)
    }

    /// Hand a waiting node to its presenter.
    ///
    /// Event edges listed as dispatched are sent first. Returns `false` when
    /// no presenter handles the node's kind.
    pub fn hand_off(&mut self, graph: &Graph, handler: &Handler) -> bool {
        let Some(node) = graph.node(handler.node()) else {
            warn!(node = %handler.node(), "handler for a node outside the graph");
            return false;
        };
        let Some(presenter) = self.presenters.get_mut(&handler.kind()) else {
            warn!(node = %node.id, kind = ?handler.kind(), "no presenter registered");
            return false;
        };

        dispatch_edges(presenter.as_mut(), node, handler.dispatched());
        presenter.present(node, handler);
        true
    }

    /// Send the dispatched edges of an exited event node.
    pub fn dispatch_exit(&mut self, graph: &Graph, exit: &Exit) {
        if exit.dispatched.is_empty() {
            return;
        }
        let Some(node) = graph.node(&exit.from) else {
            return;
        };
        match self.presenters.get_mut(&node.kind()) {
            Some(presenter) => dispatch_edges(presenter.as_mut(), node, &exit.dispatched),
            None => warn!(node = %node.id, "dispatched edges dropped, no presenter registered"),
        }
    }

    /// Route the outcome of a step.
    pub fn route(&mut self, encounter: &Encounter, activation: &Activation) -> bool {
        match activation {
            Activation::Waiting(id) => match encounter.handler() {
                Some(handler) if handler.id() == *id => self.hand_off(encounter.graph(), handler),
                _ => false,
            },
            Activation::Exited(exit) => {
                self.dispatch_exit(encounter.graph(), exit);
                true
            }
        }
    }
}

fn dispatch_edges(presenter: &mut dyn Presenter, node: &Node, edges: &[EdgeId]) {
    let NodeBody::Event { edges: authored, .. } = &node.body else {
        return;
    };
    for &edge in edges {
        if let Some(authored) = authored.get(edge.0) {
            presenter.dispatch(node, edge, &authored.payload);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::filter::NullWorld;
    use crate::graph::{Edge, PresentedKind, PresentedPayload};
    use encounter_state::ScopeStore;
    use std::cell::RefCell;
    use std::rc::Rc;
    use std::sync::Arc;

    #[derive(Debug, PartialEq)]
    enum Seen {
        Presented(String, usize),
        Dispatched(String, String),
    }

    #[derive(Clone, Default)]
    struct Recorder(Rc<RefCell<Vec<Seen>>>);

    impl Presenter for Recorder {
        fn present(&mut self, node: &Node, handler: &Handler) {
            self.0
                .borrow_mut()
                .push(Seen::Presented(node.id.to_string(), handler.eligible().len()));
        }

        fn dispatch(&mut self, node: &Node, _edge: EdgeId, payload: &EventPayload) {
            self.0
                .borrow_mut()
                .push(Seen::Dispatched(node.id.to_string(), payload.action.clone()));
        }
    }

    fn start(nodes: Vec<Node>) -> (Encounter, ScopeStore, Activation) {
        let graph = Graph::new(nodes).unwrap();
        let mut encounter = Encounter::new(Arc::new(graph), EngineConfig::default().with_seed(1));
        let mut store = ScopeStore::new();
        let activation = encounter.start(&mut store, &NullWorld).unwrap();
        (encounter, store, activation)
    }

    #[test]
    fn test_routes_by_kind() {
        let buttons = Recorder::default();
        let mut router = PresentationRouter::new()
            .with_presenter(NodeKind::Presented(PresentedKind::Button), buttons.clone());

        let (encounter, _, activation) = start(vec![Node::presented(
            "menu",
            PresentedKind::Button,
            vec![
                Edge::new(PresentedPayload::button("Dock")),
                Edge::new(PresentedPayload::button("Leave")),
            ],
            None,
        )
        .beginning()]);

        assert!(router.route(&encounter, &activation));
        assert_eq!(*buttons.0.borrow(), vec![Seen::Presented("menu".into(), 2)]);
    }

    #[test]
    fn test_unhandled_kind() {
        let mut router = PresentationRouter::new();
        let (encounter, _, activation) = start(vec![Node::presented(
            "note",
            PresentedKind::Text,
            vec![Edge::new(PresentedPayload::text("Hull breach"))],
            None,
        )
        .beginning()]);

        assert!(!router.handles(NodeKind::Presented(PresentedKind::Text)));
        assert!(!router.route(&encounter, &activation));
    }

    #[test]
    fn test_dispatch_before_present() {
        let events = Recorder::default();
        let mut router = PresentationRouter::new().with_presenter(NodeKind::Event, events.clone());

        let (encounter, _, activation) = start(vec![Node::event(
            "launch",
            false,
            vec![
                Edge::new(EventPayload::new("play_music")),
                Edge::new(EventPayload::new("undock").halting()),
            ],
            None,
        )
        .beginning()]);

        assert!(router.route(&encounter, &activation));
        assert_eq!(
            *events.0.borrow(),
            vec![
                Seen::Dispatched("launch".into(), "play_music".into()),
                Seen::Presented("launch".into(), 2),
            ]
        );
    }

    #[test]
    fn test_dispatch_on_exit() {
        let events = Recorder::default();
        let mut router = PresentationRouter::new().with_presenter(NodeKind::Event, events.clone());

        let (encounter, _, activation) = start(vec![Node::event(
            "ambience",
            false,
            vec![Edge::new(EventPayload::new("dim_lights"))],
            None,
        )
        .beginning()]);

        assert!(matches!(activation, Activation::Exited(_)));
        router.route(&encounter, &activation);
        assert_eq!(
            *events.0.borrow(),
            vec![Seen::Dispatched("ambience".into(), "dim_lights".into())]
        );
    }
}
