//! Traversal evaluator - walks an encounter graph one node at a time.
//!
//! Each node activation goes through:
//! 1. **Entering**: the node is looked up and its edges filtered
//! 2. **Linear advance / Selecting / Halting wait**: depending on the node body
//! 3. **Exited**: the successor is recorded and entered by the next [`Encounter::step`]
//!
//! Nodes that wait on presentation park a [`Handler`] and return
//! [`Activation::Waiting`]. The host resumes them through
//! [`Encounter::complete`] or [`Encounter::finish`]. Traversal never recurses
//! across nodes, so self-referencing edges cannot overflow the stack.

mod handler;
mod selection;

pub use handler::*;
pub use selection::*;

use encounter_state::{EncounterId, ScopeStore};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::address::LocalContext;
use crate::config::EngineConfig;
use crate::error::{EngineError, EngineResult};
use crate::filter::{FilterContext, WorldView};
use crate::graph::{
    Edge, EdgeId, EventPayload, Graph, Node, NodeBody, NodeId, PresentedPayload, SelectionMethod,
    SwitchPayload,
};

/// A node that finished.
#[derive(Debug, Clone, PartialEq)]
pub struct Exit {
    pub from: NodeId,

    /// Node entered by the next step. `None` ends the branch.
    pub to: Option<NodeId>,

    /// Edge the transition went through, if any.
    pub via: Option<EdgeId>,

    /// Non-halting event edges to hand to their consumers.
    pub dispatched: Vec<EdgeId>,

    /// Whether the exited node is a valid terminal point.
    pub is_ending: bool,
}

impl Exit {
    pub fn ends_branch(&self) -> bool {
        self.to.is_none()
    }
}

/// Result of entering or resuming a node.
#[derive(Debug, Clone, PartialEq)]
pub enum Activation {
    Exited(Exit),
    /// The node waits on presentation through the given handler.
    Waiting(HandlerId),
}

#[derive(Debug)]
enum Phase {
    /// Nothing entered yet.
    Idle,
    /// The previous node exited towards this one.
    Pending(NodeId),
    Waiting(Handler),
    /// The branch ended or traversal failed.
    Finished,
    Abandoned,
}

/// One running instance of an encounter graph.
pub struct Encounter {
    id: EncounterId,
    graph: Arc<Graph>,
    config: EngineConfig,
    rng: StdRng,
    phase: Phase,
}

impl std::fmt::Debug for Encounter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Encounter")
            .field("id", &self.id)
            .field("nodes", &self.graph.len())
            .field("phase", &self.phase)
            .finish()
    }
}

impl Encounter {
    /// Create an instance of a graph. Nothing is entered until [`Encounter::start`].
    pub fn new(graph: Arc<Graph>, config: EngineConfig) -> Self {
        let rng = match config.rng_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        Self {
            id: EncounterId::new(),
            graph,
            config,
            rng,
            phase: Phase::Idle,
        }
    }

    /// Create an instance with default configuration.
    pub fn with_defaults(graph: Arc<Graph>) -> Self {
        Self::new(graph, EngineConfig::default())
    }

    pub fn id(&self) -> EncounterId {
        self.id
    }

    pub fn graph(&self) -> &Graph {
        &self.graph
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// The handler of the waiting node, if any.
    pub fn handler(&self) -> Option<&Handler> {
        match &self.phase {
            Phase::Waiting(handler) => Some(handler),
            _ => None,
        }
    }

    /// Node to be entered by the next step.
    pub fn pending(&self) -> Option<&NodeId> {
        match &self.phase {
            Phase::Pending(id) => Some(id),
            _ => None,
        }
    }

    pub fn is_waiting(&self) -> bool {
        matches!(self.phase, Phase::Waiting(_))
    }

    /// Whether the branch ended, traversal failed, or it was abandoned.
    pub fn is_finished(&self) -> bool {
        matches!(self.phase, Phase::Finished | Phase::Abandoned)
    }

    /// Open the encounter scope and enter the graph's first beginning node.
    ///
    /// Fails with [`EngineError::NotActive`] once the instance has started.
    pub fn start(
        &mut self,
        store: &mut ScopeStore,
        world: &dyn WorldView,
    ) -> EngineResult<Activation> {
        if !matches!(self.phase, Phase::Idle) {
            return Err(EngineError::NotActive);
        }

        let beginning = self
            .graph
            .beginning()
            .map(|node| node.id.clone())
            .ok_or(EngineError::NoBeginningNode)?;

        store.begin_encounter(self.id);
        info!(encounter = %self.id, node = %beginning, "encounter started");
        self.enter(&beginning, store, world)
    }

    /// Take one transition.
    ///
    /// Enters the pending successor, or reports the current wait.
    pub fn step(
        &mut self,
        store: &mut ScopeStore,
        world: &dyn WorldView,
    ) -> EngineResult<Activation> {
        match &self.phase {
            Phase::Idle => self.start(store, world),
            Phase::Pending(next) => {
                let next = next.clone();
                self.enter(&next, store, world)
            }
            Phase::Waiting(handler) => Ok(Activation::Waiting(handler.id())),
            Phase::Finished | Phase::Abandoned => Err(EngineError::NotActive),
        }
    }

    /// Step until a node waits or the branch ends.
    ///
    /// Returns every activation in order; the last one is the wait or the
    /// final exit.
    pub fn run_until_wait(
        &mut self,
        store: &mut ScopeStore,
        world: &dyn WorldView,
    ) -> EngineResult<Vec<Activation>> {
        let mut trail = Vec::new();

        for _ in 0..self.config.max_auto_steps {
            let activation = self.step(store, world)?;
            let stop = match &activation {
                Activation::Waiting(_) => true,
                Activation::Exited(exit) => exit.ends_branch(),
            };
            trail.push(activation);
            if stop {
                return Ok(trail);
            }
        }

        warn!(encounter = %self.id, limit = self.config.max_auto_steps, "step limit reached");
        Err(EngineError::StepLimitExceeded(self.config.max_auto_steps))
    }

    /// Enter a node directly, e.g. to recover after a dead end.
    ///
    /// A node still waiting is abandoned first. An abandoned instance cannot
    /// be re-entered.
    pub fn enter(
        &mut self,
        id: &NodeId,
        store: &mut ScopeStore,
        world: &dyn WorldView,
    ) -> EngineResult<Activation> {
        if matches!(self.phase, Phase::Abandoned) {
            return Err(EngineError::NotActive);
        }
        if let Phase::Waiting(handler) = &self.phase {
            debug!(handler = %handler.id(), node = %handler.node(), "dropping handler on re-entry");
        }

        let graph = Arc::clone(&self.graph);
        let node = graph.require(id)?;
        debug!(node = %id, kind = ?node.kind(), "entering node");

        let result = self.activate(node, store, world);
        if let Err(err) = &result {
            warn!(node = %id, error = %err, "traversal halted");
            self.phase = Phase::Finished;
        }
        result
    }

    fn activate(
        &mut self,
        node: &Node,
        store: &mut ScopeStore,
        world: &dyn WorldView,
    ) -> EngineResult<Activation> {
        match &node.body {
            NodeBody::Pass { next } => Ok(self.exit(node, next.clone(), None, Vec::new())),
            NodeBody::Set { writes, next } => {
                // Writes before a rejected one stay applied.
                for write in writes {
                    store.set(write.scope, write.key.clone(), write.value.clone())?;
                }
                Ok(self.exit(node, next.clone(), None, Vec::new()))
            }
            NodeBody::Switch { method, edges } => {
                let ctx = FilterContext::new(store, world, self.config.float_epsilon);
                self.enter_switch(node, *method, edges, &ctx)
            }
            NodeBody::Event {
                always_halting,
                edges,
                next,
            } => {
                let ctx = FilterContext::new(store, world, self.config.float_epsilon);
                Ok(self.enter_event(node, *always_halting, edges, next, &ctx))
            }
            NodeBody::Presented { edges, next, .. } => {
                let ctx = FilterContext::new(store, world, self.config.float_epsilon);
                Ok(self.enter_presented(node, edges, next, &ctx))
            }
        }
    }

    fn enter_switch(
        &mut self,
        node: &Node,
        method: SelectionMethod,
        edges: &[Edge<SwitchPayload>],
        ctx: &FilterContext<'_>,
    ) -> EngineResult<Activation> {
        let (eligible, used_fallback) = eligible_edges(edges, ctx);
        let candidates: Vec<(EdgeId, f64)> = eligible
            .iter()
            .map(|&edge| (edge, edges[edge.0].payload.weight))
            .collect();

        let chosen = if used_fallback {
            candidates.first().map(|(edge, _)| *edge)
        } else {
            select(method, &candidates, &mut self.rng)
        };

        let Some(edge) = chosen else {
            return Err(EngineError::GraphDeadEnd {
                node: node.id.clone(),
            });
        };

        debug!(node = %node.id, edge = %edge, ?method, used_fallback, "switch selected edge");
        Ok(self.exit(node, edges[edge.0].next.clone(), Some(edge), Vec::new()))
    }

    fn enter_event(
        &mut self,
        node: &Node,
        always_halting: bool,
        edges: &[Edge<EventPayload>],
        next: &Option<NodeId>,
        ctx: &FilterContext<'_>,
    ) -> Activation {
        let (eligible, used_fallback) = eligible_edges(edges, ctx);
        let (required, dispatched): (Vec<EdgeId>, Vec<EdgeId>) = eligible
            .iter()
            .copied()
            .partition(|edge| always_halting || edges[edge.0].payload.is_halting);

        if required.is_empty() {
            return self.exit(node, next.clone(), None, dispatched);
        }

        let handler = Handler::new(node.id.clone(), node.kind(), eligible, used_fallback)
            .with_halting(required.into_iter().collect::<BTreeSet<_>>(), dispatched);
        self.wait(handler)
    }

    fn enter_presented(
        &mut self,
        node: &Node,
        edges: &[Edge<PresentedPayload>],
        next: &Option<NodeId>,
        ctx: &FilterContext<'_>,
    ) -> Activation {
        let (eligible, used_fallback) = eligible_edges(edges, ctx);

        if eligible.is_empty() {
            debug!(node = %node.id, "nothing to present, advancing");
            return self.exit(node, next.clone(), None, Vec::new());
        }

        let handler = Handler::new(node.id.clone(), node.kind(), eligible, used_fallback);
        self.wait(handler)
    }

    /// Report completion of an edge of the waiting node.
    ///
    /// For event nodes this marks a halting edge done; the node exits once
    /// all of them are. For presented nodes it chooses the edge and exits
    /// through it. Unknown handlers, repeated completions and edges the node
    /// is not waiting on are ignored and yield `None`.
    pub fn complete(&mut self, handler_id: HandlerId, edge: EdgeId) -> Option<Activation> {
        let Phase::Waiting(handler) = &mut self.phase else {
            debug!(handler = %handler_id, "completion without a waiting node ignored");
            return None;
        };
        if handler.id() != handler_id {
            debug!(handler = %handler_id, "completion for a stale handler ignored");
            return None;
        }

        let graph = Arc::clone(&self.graph);
        let node = graph.node(handler.node())?;

        match &node.body {
            NodeBody::Event { next, .. } => {
                match handler.record_completion(edge) {
                    CompletionOutcome::Recorded => {}
                    outcome => {
                        debug!(handler = %handler_id, edge = %edge, ?outcome, "completion ignored");
                        return None;
                    }
                }
                if !handler.is_satisfied() {
                    return None;
                }
                Some(self.exit(node, next.clone(), None, Vec::new()))
            }
            NodeBody::Presented { edges, next, .. } => {
                if !handler.eligible().contains(&edge) {
                    debug!(handler = %handler_id, edge = %edge, "edge was not presented");
                    return None;
                }
                handler.select(edge);
                let to = edges[edge.0].next.clone().or_else(|| next.clone());
                Some(self.exit(node, to, Some(edge), Vec::new()))
            }
            _ => None,
        }
    }

    /// Report that presentation of the waiting node is done without choosing
    /// an edge. The node exits through its own successor.
    ///
    /// Event nodes only exit through completions, so this is ignored for them.
    pub fn finish(&mut self, handler_id: HandlerId) -> Option<Activation> {
        let Phase::Waiting(handler) = &self.phase else {
            debug!(handler = %handler_id, "finish without a waiting node ignored");
            return None;
        };
        if handler.id() != handler_id {
            debug!(handler = %handler_id, "finish for a stale handler ignored");
            return None;
        }

        let graph = Arc::clone(&self.graph);
        let node = graph.node(handler.node())?;

        match &node.body {
            NodeBody::Presented { next, .. } => {
                Some(self.exit(node, next.clone(), None, Vec::new()))
            }
            _ => {
                debug!(handler = %handler_id, node = %node.id, "finish ignored for non-presented node");
                None
            }
        }
    }

    /// Stop traversal, dropping any waiting handler and the encounter scope.
    ///
    /// Completions arriving afterwards are no-ops.
    pub fn abandon(&mut self, store: &mut ScopeStore) {
        if let Phase::Waiting(handler) = std::mem::replace(&mut self.phase, Phase::Abandoned) {
            info!(encounter = %self.id, node = %handler.node(), "abandoned while waiting");
        }
        self.close(store);
    }

    /// Drop the encounter scope if it belongs to this instance.
    pub fn close(&mut self, store: &mut ScopeStore) {
        if store.active_encounter() == Some(self.id) {
            store.end_encounter();
            debug!(encounter = %self.id, "encounter scope closed");
        }
    }

    fn exit(
        &mut self,
        node: &Node,
        to: Option<NodeId>,
        via: Option<EdgeId>,
        dispatched: Vec<EdgeId>,
    ) -> Activation {
        self.phase = match &to {
            Some(next) => Phase::Pending(next.clone()),
            None => Phase::Finished,
        };

        match &to {
            Some(next) => debug!(from = %node.id, to = %next, "node exited"),
            None => info!(from = %node.id, is_ending = node.flags.is_ending, "branch ended"),
        }

        Activation::Exited(Exit {
            from: node.id.clone(),
            to,
            via,
            dispatched,
            is_ending: node.flags.is_ending,
        })
    }

    fn wait(&mut self, handler: Handler) -> Activation {
        let id = handler.id();
        debug!(handler = %id, node = %handler.node(), edges = handler.eligible().len(), "node waiting");
        self.phase = Phase::Waiting(handler);
        Activation::Waiting(id)
    }
}

/// Non-fallback edges whose filters pass, or the first fallback edge when
/// none do. The flag tells whether the fallback was used.
fn eligible_edges<P: LocalContext>(
    edges: &[Edge<P>],
    ctx: &FilterContext<'_>,
) -> (Vec<EdgeId>, bool) {
    let passing: Vec<EdgeId> = edges
        .iter()
        .enumerate()
        .filter(|(_, edge)| !edge.is_fallback && edge.passes(ctx))
        .map(|(position, _)| EdgeId(position))
        .collect();

    if !passing.is_empty() {
        return (passing, false);
    }

    match edges.iter().position(|edge| edge.is_fallback) {
        Some(position) => (vec![EdgeId(position)], true),
        None => (Vec::new(), false),
    }
}
