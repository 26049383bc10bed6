use thiserror::Error;

use crate::{services::astra::DataApiError, vectorstores::EmbeddingError};

/// Errors raised by the vector store handle.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error(transparent)]
    DataApi(#[from] DataApiError),
    #[error(transparent)]
    Embedding(#[from] EmbeddingError),
    #[error("Invalid document: {0}")]
    InvalidDocument(String),
    #[error("{0}")]
    Config(String),
}

/// Errors reported by [`crate::AstraDbVectorStoreComponent`].
#[derive(Debug, Error)]
pub enum AstraDbError {
    #[error("Error initializing AstraDBVectorStore: {0}")]
    VectorStoreInit(String),
    #[error("Error adding documents to AstraDBVectorStore: {0}")]
    AddDocuments(String),
    #[error("Error building search arguments for AstraDBVectorStore: {0}")]
    SearchArgs(String),
    #[error("Error performing {method} in AstraDBVectorStore: {message}")]
    Search { method: &'static str, message: String },
    #[error("Error creating collection in Astra DB: {0}")]
    CreateCollection(String),
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("{0}")]
    Config(String),
}
