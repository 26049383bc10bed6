pub mod flow;
pub mod observability;
pub mod schema;
pub mod services;
pub mod tools;
pub mod vectorstores;

pub use flow::{FlowRunError, FlowRunner, Graph, GraphError, RunFlowRequest, RunOutputs, Tweaks, Vertex};
pub use schema::{Data, Document};
pub use tools::*;

pub use services::langflow::{LangflowClient, LangflowClientConfig};
pub use services::ollama::OllamaEmbeddings;
pub use vectorstores::astradb::{
    AstraDbError, AstraDbInputs, AstraDbVectorStore, AstraDbVectorStoreComponent, Discovery, SearchType,
};
pub use vectorstores::Embeddings;

pub use observability::init_default_tracing;
