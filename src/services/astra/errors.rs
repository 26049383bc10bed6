use thiserror::Error;

/// Errors returned by the Astra DB client.
#[derive(Debug, Error)]
pub enum DataApiError {
    #[error("Request Error: {0}")]
    Request(#[from] reqwest::Error),
    /// Non-success HTTP status.
    #[error("API Error: {status} - {message}")]
    Api { status: u16, message: String },
    /// The request succeeded but the command reported errors.
    #[error("Data API command failed: {}", .0.join("; "))]
    Command(Vec<String>),
    #[error("Serialization Error: {0}")]
    Serialization(String),
    #[error("Config Error: {0}")]
    Config(String),
}
