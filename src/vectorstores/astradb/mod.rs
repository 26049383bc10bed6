//! Astra DB vector store and the component that configures it.

mod build_config;
mod cache;
mod codec;
mod component;
mod discovery;
mod errors;
mod mmr;
mod search;
mod store;

pub use build_config::{
    default_build_config, BuildConfig, CollectionOption, DatabaseOption, FieldConfig, NewCollectionInput,
    NewDatabaseInput,
};
pub use cache::{config_key, StoreCache};
pub use codec::{ContentField, DocumentCodec};
pub use component::{AstraDbInputs, AstraDbVectorStoreComponent, DatabaseEntry, TOKEN_ENV_VAR};
pub use discovery::Discovery;
pub use errors::{AstraDbError, StoreError};
pub use mmr::{cosine_similarity, maximal_marginal_relevance};
pub use search::{SearchArgs, SearchType, SEARCH_TYPE_OPTIONS};
pub use store::{AstraDbStoreParams, AstraDbVectorStore, StoreOptions};
