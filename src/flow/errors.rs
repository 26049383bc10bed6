use thiserror::Error;

/// Errors raised while reading a flow graph.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GraphError {
    #[error("Run ID not set for graph {0}")]
    RunIdNotSet(String),
    #[error("Invalid flow payload: {0}")]
    InvalidPayload(String),
}

/// Errors reported by a [`crate::FlowRunner`].
#[derive(Debug, Error)]
pub enum FlowRunError {
    #[error("Flow id is required to run a flow")]
    MissingFlowId,
    #[error("Flow runner configuration error: {0}")]
    Config(String),
    #[error("Flow run request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("Flow run failed: {status} - {message}")]
    Api { status: u16, message: String },
    #[error("Error decoding flow run response: {0}")]
    Serialization(String),
    #[error("Flow run failed: {0}")]
    Execution(String),
}
