mod client;

pub use client::OllamaEmbeddings;
