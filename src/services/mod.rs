pub mod astra;
pub mod langflow;
pub mod ollama;
