//! # Encounter State
//!
//! The key-value side of the Waypoint encounter engine. Holds the typed scopes
//! (game session, active encounter, global, preferences, location) that the
//! graph evaluator reads from and that "set" nodes write into.
//! This crate knows nothing about graphs or filters.

pub mod ids;
pub mod scope;

pub use ids::*;
pub use scope::*;
