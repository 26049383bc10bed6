//! Minimal Astra DB client: the DevOps API for database discovery and the
//! Data API for collection and document commands.

pub mod client;
pub mod endpoint;
pub mod errors;
pub mod models;

pub use client::{AstraDbAdmin, Collection, DataApiClient, DataApiClientConfig, Database, DEFAULT_KEYSPACE};
pub use endpoint::{build_api_endpoint, parse_api_endpoint, Environment, ParsedApiEndpoint};
pub use errors::DataApiError;
pub use models::*;
