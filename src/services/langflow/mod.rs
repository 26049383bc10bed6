mod client;

pub use client::{LangflowClient, LangflowClientConfig};
