use std::{future::Future, pin::Pin};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum EmbeddingError {
    #[error("Embedding request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("Embedding API error: {status} - {message}")]
    Api { status: u16, message: String },
    #[error("Embedding response invalid: {0}")]
    InvalidResponse(String),
}

pub type EmbedFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, EmbeddingError>> + Send + 'a>>;

/// A model that turns text into vectors on the client side.
pub trait Embeddings: Send + Sync {
    /// Embeds each text, preserving order.
    fn embed_documents<'a>(&'a self, texts: &'a [String]) -> EmbedFuture<'a, Vec<Vec<f32>>>;

    fn embed_query<'a>(&'a self, text: &'a str) -> EmbedFuture<'a, Vec<f32>>;

    /// Stable description of the model (provider and name), used to tell
    /// two configurations apart.
    fn identifier(&self) -> String;
}
