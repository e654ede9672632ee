//! Addresses - typed references to the operands of a filter.

use encounter_state::{ScopeKind, ScopeStore, ScopeValue, Value};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Named values sitting next to a filter, readable through [`Address::Local`].
pub type LocalFields = BTreeMap<String, Value>;

/// Something that exposes named sibling values to local addresses.
pub trait LocalContext {
    fn local(&self, name: &str) -> Option<Value>;
}

impl LocalContext for LocalFields {
    fn local(&self, name: &str) -> Option<Value> {
        self.get(name).cloned()
    }
}

/// A context with no local values.
pub struct NoLocals;

impl LocalContext for NoLocals {
    fn local(&self, _name: &str) -> Option<Value> {
        None
    }
}

/// Looks a name up in a filter entry's own fields first, then in the
/// owning edge's locals.
pub struct LocalChain<'a> {
    pub entry: &'a LocalFields,
    pub edge: &'a dyn LocalContext,
}

impl LocalContext for LocalChain<'_> {
    fn local(&self, name: &str) -> Option<Value> {
        self.entry.local(name).or_else(|| self.edge.local(name))
    }
}

/// A reference to a value of type `T`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Address<T> {
    /// A literal carried inline.
    Constant(T),

    /// A sibling field on the filter entry or edge being evaluated.
    Local(String),

    /// A key in one of the store's scopes.
    Foreign { scope: ScopeKind, key: String },
}

impl<T: ScopeValue> Address<T> {
    /// Create a constant address.
    pub fn constant(value: impl Into<T>) -> Self {
        Address::Constant(value.into())
    }

    /// Create a local address.
    pub fn local(name: impl Into<String>) -> Self {
        Address::Local(name.into())
    }

    /// Create a foreign address.
    pub fn foreign(scope: ScopeKind, key: impl Into<String>) -> Self {
        Address::Foreign {
            scope,
            key: key.into(),
        }
    }

    /// Resolve the address to a value.
    ///
    /// Never fails: missing locals, missing scopes and missing keys all
    /// resolve to `T::default()`.
    pub fn resolve(&self, locals: &dyn LocalContext, store: &ScopeStore) -> T {
        match self {
            Address::Constant(value) => value.clone(),
            Address::Local(name) => locals
                .local(name)
                .and_then(|value| T::from_value(&value))
                .unwrap_or_default(),
            Address::Foreign { scope, key } => store.get_as::<T>(*scope, key),
        }
    }

    /// The field name if this is a local address.
    pub fn local_name(&self) -> Option<&str> {
        match self {
            Address::Local(name) => Some(name),
            _ => None,
        }
    }
}
