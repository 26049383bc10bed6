pub mod langfuse;
mod logging;

use thiserror::Error;

pub use logging::init_default_tracing;

#[derive(Debug, Error)]
pub enum ObservabilityError {
    #[error("Invalid log filter: {0}")]
    Filter(String),
    #[error("Failed to build trace exporter: {0}")]
    Exporter(String),
    #[error("A global tracing subscriber is already installed: {0}")]
    AlreadyInitialized(String),
}
