//! # Encounter Core
//!
//! The graph side of the Waypoint encounter engine. Encounters are authored
//! as graphs of nodes joined by filter-gated edges; this crate validates
//! those graphs and walks them against the scopes of `encounter_state`.
//!
//! ## Core Components
//!
//! - **address / filter**: typed operands and the conditions that gate edges
//! - **graph**: nodes, edges and their payloads, with load-time validation
//! - **evaluator**: the traversal state machine and its handlers
//! - **handoff**: routing of waiting nodes to presentation
//!
//! ## Design Philosophy
//!
//! - **Total evaluation**: missing keys read as zero-values, filters always yield a boolean
//! - **Validated up front**: authoring mistakes fail at graph construction, not mid-encounter
//! - **Host-driven**: the engine never presents anything, it waits and is resumed

pub mod address;
pub mod config;
pub mod error;
pub mod evaluator;
pub mod filter;
pub mod graph;
pub mod handoff;

pub use address::*;
pub use config::*;
pub use error::*;
pub use evaluator::*;
pub use filter::*;
pub use graph::*;
pub use handoff::*;

/// Install a `tracing` subscriber filtered by `RUST_LOG`.
///
/// Does nothing if the host already installed one.
pub fn init_tracing() {
    use tracing_subscriber::{fmt, EnvFilter};

    let _ = fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(true)
        .try_init();
}
