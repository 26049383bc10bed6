//! Flow model used by [`crate::FlowTool`]: input introspection, tweak maps,
//! run outputs and the boundary to whatever executes a flow.

mod errors;
mod graph;
mod inputs;
mod output;
mod runner;
mod tweaks;

pub use errors::{FlowRunError, GraphError};
pub use graph::*;
pub use inputs::*;
pub use output::*;
pub use runner::*;
pub use tweaks::*;
