pub mod astradb;
mod embeddings;

pub use embeddings::*;
