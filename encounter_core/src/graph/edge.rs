//! Edge definitions - filter-gated transitions out of edged nodes.

use encounter_state::Value;
use serde::{Deserialize, Serialize};

use super::NodeId;
use crate::address::{LocalContext, LocalFields};
use crate::filter::{FilterContext, FilterEntry, FilterGroup, OperandMismatch};

/// Position of an edge within its node, in authored order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EdgeId(pub usize);

impl std::fmt::Display for EdgeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// An edge with its kind-specific payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Edge<P> {
    pub payload: P,

    /// Conditions that must all hold for the edge to be eligible.
    #[serde(default)]
    pub filters: FilterGroup,

    /// Target node. `None` ends the branch.
    #[serde(default)]
    pub next: Option<NodeId>,

    /// Used unconditionally when no other edge of the node is eligible.
    #[serde(default)]
    pub is_fallback: bool,
}

impl<P> Edge<P> {
    /// Create an unfiltered edge that ends the branch.
    pub fn new(payload: P) -> Self {
        Self {
            payload,
            filters: FilterGroup::new(),
            next: None,
            is_fallback: false,
        }
    }

    /// Set the target node.
    pub fn to(mut self, next: impl Into<NodeId>) -> Self {
        self.next = Some(next.into());
        self
    }

    /// Add a filter entry.
    pub fn with_filter(mut self, entry: FilterEntry) -> Self {
        self.filters.push(entry);
        self
    }

    /// Replace the filter group.
    pub fn with_filters(mut self, filters: FilterGroup) -> Self {
        self.filters = filters;
        self
    }

    /// Mark the edge as the node's fallback.
    pub fn as_fallback(mut self) -> Self {
        self.is_fallback = true;
        self
    }
}

impl<P: LocalContext> Edge<P> {
    /// Whether the edge's filter group holds.
    pub fn passes(&self, ctx: &FilterContext<'_>) -> bool {
        self.filters.evaluate(ctx, &self.payload)
    }

    /// Check the filters' operand types against this edge's locals.
    pub fn validate_filters(&self) -> Result<(), OperandMismatch> {
        self.filters.validate(&self.payload)
    }
}

/// Payload of a switch edge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SwitchPayload {
    /// Relative likelihood under weighted selection.
    #[serde(default = "default_weight")]
    pub weight: f64,
}

fn default_weight() -> f64 {
    1.0
}

impl SwitchPayload {
    pub fn weighted(weight: f64) -> Self {
        Self { weight }
    }
}

impl Default for SwitchPayload {
    fn default() -> Self {
        Self {
            weight: default_weight(),
        }
    }
}

impl LocalContext for SwitchPayload {
    fn local(&self, name: &str) -> Option<Value> {
        match name {
            "weight" => Some(Value::Float(self.weight)),
            _ => None,
        }
    }
}

/// Payload of an event edge: a side-effecting action for the host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventPayload {
    /// Whether the node waits for this action to complete.
    #[serde(default)]
    pub is_halting: bool,

    /// Name of the action, e.g. "play_sound" or "wait".
    pub action: String,

    #[serde(default)]
    pub params: LocalFields,
}

impl EventPayload {
    /// Create a non-halting action.
    pub fn new(action: impl Into<String>) -> Self {
        Self {
            is_halting: false,
            action: action.into(),
            params: LocalFields::new(),
        }
    }

    /// Make the node wait for this action.
    pub fn halting(mut self) -> Self {
        self.is_halting = true;
        self
    }

    pub fn with_param(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.params.insert(name.into(), value.into());
        self
    }
}

impl LocalContext for EventPayload {
    fn local(&self, name: &str) -> Option<Value> {
        match name {
            "action" => Some(Value::Str(self.action.clone())),
            "is_halting" => Some(Value::Bool(self.is_halting)),
            _ => self.params.local(name),
        }
    }
}

/// The kinds of nodes whose edges are handed to presentation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PresentedKind {
    Text,
    Button,
    Conversation,
    Dialog,
    Bust,
    Module,
    ModuleSwap,
    ModuleTrait,
    KeyValue,
    Encyclopedia,
}

impl std::fmt::Display for PresentedKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            PresentedKind::Text => "text",
            PresentedKind::Button => "button",
            PresentedKind::Conversation => "conversation",
            PresentedKind::Dialog => "dialog",
            PresentedKind::Bust => "bust",
            PresentedKind::Module => "module",
            PresentedKind::ModuleSwap => "module-swap",
            PresentedKind::ModuleTrait => "module-trait",
            PresentedKind::KeyValue => "key-value",
            PresentedKind::Encyclopedia => "encyclopedia",
        };
        write!(f, "{}", name)
    }
}

/// Payload of an edge handed to presentation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum PresentedPayload {
    Text { text: String },
    Button { label: String },
    Conversation { speaker: String, line: String },
    Dialog { title: String, body: String },
    /// A character portrait shown beside the text.
    Bust { portrait: String },
    Module { module: String },
    ModuleSwap { remove: String, install: String },
    ModuleTrait { module: String, trait_id: String },
    KeyValue { key: String, value: Value },
    Encyclopedia { entry: String },
}

impl PresentedPayload {
    pub fn text(text: impl Into<String>) -> Self {
        PresentedPayload::Text { text: text.into() }
    }

    pub fn button(label: impl Into<String>) -> Self {
        PresentedPayload::Button {
            label: label.into(),
        }
    }

    pub fn conversation(speaker: impl Into<String>, line: impl Into<String>) -> Self {
        PresentedPayload::Conversation {
            speaker: speaker.into(),
            line: line.into(),
        }
    }

    /// The node kind this payload belongs to.
    pub fn kind(&self) -> PresentedKind {
        match self {
            PresentedPayload::Text { .. } => PresentedKind::Text,
            PresentedPayload::Button { .. } => PresentedKind::Button,
            PresentedPayload::Conversation { .. } => PresentedKind::Conversation,
            PresentedPayload::Dialog { .. } => PresentedKind::Dialog,
            PresentedPayload::Bust { .. } => PresentedKind::Bust,
            PresentedPayload::Module { .. } => PresentedKind::Module,
            PresentedPayload::ModuleSwap { .. } => PresentedKind::ModuleSwap,
            PresentedPayload::ModuleTrait { .. } => PresentedKind::ModuleTrait,
            PresentedPayload::KeyValue { .. } => PresentedKind::KeyValue,
            PresentedPayload::Encyclopedia { .. } => PresentedKind::Encyclopedia,
        }
    }
}

impl LocalContext for PresentedPayload {
    fn local(&self, name: &str) -> Option<Value> {
        let text = |s: &String| Some(Value::Str(s.clone()));
        match (self, name) {
            (PresentedPayload::Text { text: t }, "text") => text(t),
            (PresentedPayload::Button { label }, "label") => text(label),
            (PresentedPayload::Conversation { speaker, .. }, "speaker") => text(speaker),
            (PresentedPayload::Conversation { line, .. }, "line") => text(line),
            (PresentedPayload::Dialog { title, .. }, "title") => text(title),
            (PresentedPayload::Dialog { body, .. }, "body") => text(body),
            (PresentedPayload::Bust { portrait }, "portrait") => text(portrait),
            (PresentedPayload::Module { module }, "module") => text(module),
            (PresentedPayload::ModuleSwap { remove, .. }, "remove") => text(remove),
            (PresentedPayload::ModuleSwap { install, .. }, "install") => text(install),
            (PresentedPayload::ModuleTrait { module, .. }, "module") => text(module),
            (PresentedPayload::ModuleTrait { trait_id, .. }, "trait_id") => text(trait_id),
            (PresentedPayload::KeyValue { key, .. }, "key") => text(key),
            (PresentedPayload::KeyValue { value, .. }, "value") => Some(value.clone()),
            (PresentedPayload::Encyclopedia { entry }, "entry") => text(entry),
            _ => None,
        }
    }
}
