//! Scope store - the named key-value maps the encounter engine reads and writes.
//!
//! Each [`ScopeKind`] owns an independent map of string keys to typed
//! [`Value`]s. The first write of a key declares its type; later writes with a
//! different type are rejected and the stored value is kept.
//!
//! Scope lifecycles follow their owners:
//! - **Game**: created by [`ScopeStore::begin_session`], dropped by [`ScopeStore::end_session`]
//! - **Encounter**: created by [`ScopeStore::begin_encounter`], dropped by [`ScopeStore::end_encounter`]
//! - **Global / Preferences**: process-wide, loaded at startup and handed to a
//!   [`ScopePersistence`] hook after every write
//! - **Location**: created the first time a location is entered and kept for
//!   the lifetime of the store

mod value;

pub use value::*;

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use thiserror::Error;
use tracing::{debug, trace};

use crate::ids::{EncounterId, LocationId};

/// The named scopes of the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ScopeKind {
    /// State of the current game session.
    Game,
    /// Scratch state of the active encounter.
    Encounter,
    /// Process-wide state.
    Global,
    /// User preferences.
    Preferences,
    /// State of the currently visited location.
    Location,
}

impl ScopeKind {
    pub const ALL: [ScopeKind; 5] = [
        ScopeKind::Game,
        ScopeKind::Encounter,
        ScopeKind::Global,
        ScopeKind::Preferences,
        ScopeKind::Location,
    ];

    /// Whether writes to this scope are handed to the persistence hook.
    pub fn is_persistent(&self) -> bool {
        matches!(self, ScopeKind::Global | ScopeKind::Preferences)
    }
}

impl std::fmt::Display for ScopeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ScopeKind::Game => "game",
            ScopeKind::Encounter => "encounter",
            ScopeKind::Global => "global",
            ScopeKind::Preferences => "preferences",
            ScopeKind::Location => "location",
        };
        write!(f, "{}", name)
    }
}

/// Errors raised by scope writes.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ScopeError {
    #[error("type mismatch for {scope}/{key}: declared {expected}, written {found}")]
    TypeMismatch {
        scope: ScopeKind,
        key: String,
        expected: ValueType,
        found: ValueType,
    },

    #[error("scope {0} has no active owner")]
    ScopeInactive(ScopeKind),

    #[error("scope {0} is not process-wide and cannot be loaded")]
    NotPersistent(ScopeKind),
}

/// A single key-value map.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Scope {
    values: BTreeMap<String, Value>,
}

impl Scope {
    /// Create a new empty scope.
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the raw value stored under a key.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    /// The type a key was declared with, if it was ever written.
    pub fn declared_type(&self, key: &str) -> Option<ValueType> {
        self.values.get(key).map(Value::value_type)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Iterate entries in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.values.iter()
    }

    fn insert(&mut self, key: String, value: Value) -> Option<Value> {
        self.values.insert(key, value)
    }
}

impl FromIterator<(String, Value)> for Scope {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self {
            values: iter.into_iter().collect(),
        }
    }
}

/// A recorded write to a watched scope.
#[derive(Debug, Clone, PartialEq)]
pub struct ScopeChange {
    pub scope: ScopeKind,
    pub key: String,
    /// `None` when the key was written for the first time.
    pub old: Option<Value>,
    pub new: Value,
}

/// Hook called with the full map after each write to a process-wide scope.
///
/// The store does not define a file format; the host decides how and where
/// the map is saved.
pub trait ScopePersistence {
    fn persist(&mut self, kind: ScopeKind, scope: &Scope);
}

/// The complete set of scopes available to an encounter graph.
#[derive(Default)]
pub struct ScopeStore {
    game: Option<Scope>,
    encounter: Option<(EncounterId, Scope)>,
    global: Scope,
    preferences: Scope,
    locations: HashMap<LocationId, Scope>,
    current_location: Option<LocationId>,

    /// Scopes whose writes are recorded in `changes`.
    watched: HashSet<ScopeKind>,
    changes: Vec<ScopeChange>,

    persistence: Option<Box<dyn ScopePersistence>>,
}

impl std::fmt::Debug for ScopeStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScopeStore")
            .field("game", &self.game)
            .field("encounter", &self.encounter)
            .field("global", &self.global)
            .field("preferences", &self.preferences)
            .field("locations", &self.locations)
            .field("current_location", &self.current_location)
            .field("watched", &self.watched)
            .field("has_persistence", &self.persistence.is_some())
            .finish()
    }
}

impl ScopeStore {
    /// Create a store with empty process-wide scopes and no active owners.
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach the hook that saves process-wide scopes.
    pub fn with_persistence(mut self, persistence: impl ScopePersistence + 'static) -> Self {
        self.persistence = Some(Box::new(persistence));
        self
    }

    /// Start a game session with an empty game scope.
    pub fn begin_session(&mut self) {
        if self.game.is_some() {
            debug!("replacing game scope of previous session");
        }
        self.game = Some(Scope::new());
    }

    /// End the game session, dropping its scope.
    pub fn end_session(&mut self) -> Option<Scope> {
        self.game.take()
    }

    /// Whether a game session is running.
    pub fn has_session(&self) -> bool {
        self.game.is_some()
    }

    /// Start an encounter with an empty encounter scope.
    pub fn begin_encounter(&mut self, id: EncounterId) {
        if let Some((previous, _)) = &self.encounter {
            debug!(%previous, next = %id, "replacing scope of previous encounter");
        }
        self.encounter = Some((id, Scope::new()));
    }

    /// End the active encounter, dropping its scope.
    pub fn end_encounter(&mut self) -> Option<EncounterId> {
        self.encounter.take().map(|(id, _)| id)
    }

    /// The encounter whose scope is active.
    pub fn active_encounter(&self) -> Option<EncounterId> {
        self.encounter.as_ref().map(|(id, _)| *id)
    }

    /// Make a location current, creating its scope on first visit.
    pub fn enter_location(&mut self, id: LocationId) {
        self.locations.entry(id).or_default();
        self.current_location = Some(id);
    }

    /// Leave the current location. Its scope is kept for later visits.
    pub fn leave_location(&mut self) -> Option<LocationId> {
        self.current_location.take()
    }

    /// The location whose scope backs [`ScopeKind::Location`].
    pub fn current_location(&self) -> Option<LocationId> {
        self.current_location
    }

    /// Replace a process-wide scope with previously saved contents.
    pub fn load_persistent(&mut self, kind: ScopeKind, scope: Scope) -> Result<(), ScopeError> {
        match kind {
            ScopeKind::Global => self.global = scope,
            ScopeKind::Preferences => self.preferences = scope,
            other => return Err(ScopeError::NotPersistent(other)),
        }
        Ok(())
    }

    /// Get a scope if its owner is active.
    pub fn scope(&self, kind: ScopeKind) -> Option<&Scope> {
        match kind {
            ScopeKind::Game => self.game.as_ref(),
            ScopeKind::Encounter => self.encounter.as_ref().map(|(_, scope)| scope),
            ScopeKind::Global => Some(&self.global),
            ScopeKind::Preferences => Some(&self.preferences),
            ScopeKind::Location => self
                .current_location
                .and_then(|id| self.locations.get(&id)),
        }
    }

    fn scope_mut(&mut self, kind: ScopeKind) -> Option<&mut Scope> {
        match kind {
            ScopeKind::Game => self.game.as_mut(),
            ScopeKind::Encounter => self.encounter.as_mut().map(|(_, scope)| scope),
            ScopeKind::Global => Some(&mut self.global),
            ScopeKind::Preferences => Some(&mut self.preferences),
            ScopeKind::Location => match self.current_location {
                Some(id) => self.locations.get_mut(&id),
                None => None,
            },
        }
    }

    /// Read a key as the given type.
    ///
    /// Absent scopes, absent keys and keys of another type all yield the
    /// type's zero-value.
    pub fn get(&self, kind: ScopeKind, key: &str, value_type: &ValueType) -> Value {
        self.scope(kind)
            .and_then(|scope| scope.get(key))
            .filter(|value| value.value_type() == *value_type)
            .cloned()
            .unwrap_or_else(|| value_type.default_value())
    }

    /// Read a key as a Rust type, falling back to its default.
    pub fn get_as<T: ScopeValue>(&self, kind: ScopeKind, key: &str) -> T {
        self.scope(kind)
            .and_then(|scope| scope.get(key))
            .and_then(T::from_value)
            .unwrap_or_default()
    }

    /// Check if a key has been written in a scope.
    pub fn contains(&self, kind: ScopeKind, key: &str) -> bool {
        self.scope(kind).is_some_and(|scope| scope.get(key).is_some())
    }

    /// Write a key.
    ///
    /// Fails with [`ScopeError::TypeMismatch`] if the key already holds a value
    /// of another type; the stored value is left untouched.
    pub fn set(
        &mut self,
        kind: ScopeKind,
        key: impl Into<String>,
        value: impl Into<Value>,
    ) -> Result<(), ScopeError> {
        let key = key.into();
        let value = value.into();

        let scope = self
            .scope_mut(kind)
            .ok_or(ScopeError::ScopeInactive(kind))?;

        if let Some(expected) = scope.declared_type(&key) {
            let found = value.value_type();
            if expected != found {
                debug!(scope = %kind, %key, %expected, %found, "rejected write with mismatched type");
                return Err(ScopeError::TypeMismatch {
                    scope: kind,
                    key,
                    expected,
                    found,
                });
            }
        }

        trace!(scope = %kind, %key, ?value, "scope write");
        let old = scope.insert(key.clone(), value.clone());

        if kind.is_persistent() {
            if let Some(persistence) = self.persistence.as_mut() {
                let scope = match kind {
                    ScopeKind::Global => &self.global,
                    _ => &self.preferences,
                };
                persistence.persist(kind, scope);
            }
        }

        if self.watched.contains(&kind) {
            self.changes.push(ScopeChange {
                scope: kind,
                key,
                old,
                new: value,
            });
        }

        Ok(())
    }

    /// List the contents of a scope in key order, for diagnostics.
    pub fn dump(&self, kind: ScopeKind) -> Vec<(String, ValueType, Value)> {
        self.scope(kind)
            .map(|scope| {
                scope
                    .iter()
                    .map(|(key, value)| (key.clone(), value.value_type(), value.clone()))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Start recording writes to a scope.
    pub fn watch(&mut self, kind: ScopeKind) {
        self.watched.insert(kind);
    }

    /// Stop recording writes to a scope.
    pub fn unwatch(&mut self, kind: ScopeKind) {
        self.watched.remove(&kind);
    }

    /// Drain the recorded writes, oldest first.
    pub fn take_changes(&mut self) -> Vec<ScopeChange> {
        std::mem::take(&mut self.changes)
    }
}
