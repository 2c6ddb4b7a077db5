//! Target definition and incremental execution.
//!
//! A build is a graph of named targets. Each target declares input and output
//! sources and an action; the action runs only when the target's stamp no
//! longer matches the content of its inputs or its outputs have gone missing.
//!
//! # Characteristics
//!
//! - **Incremental**: Inputs are compared by hash against the last stamp
//! - **Ordered**: Dependencies always complete before their dependents
//! - **Checked**: Unknown targets and cycles are rejected before any action runs
//!
//! # Submodules
//!
//! - [`execute`] - `BuildSystem` and the staleness check
//! - [`graph`] - Dependency graph and execution order
//! - [`store`] - Stamp persistence

pub mod execute;
pub mod graph;
pub mod store;
mod target;
mod types;

pub use execute::BuildSystem;
pub use target::*;
pub use types::*;
