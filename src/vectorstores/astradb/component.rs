use std::{env, fmt, sync::Arc};

use futures::future::join_all;
use serde_json::{Map, Value};
use tracing::{debug, info, instrument, warn};

use super::{
    build_config::{BuildConfig, CollectionOption, DatabaseOption, NewCollectionInput},
    cache::{config_key, StoreCache},
    discovery::Discovery,
    errors::AstraDbError,
    search::{SearchArgs, SearchType},
    store::{AstraDbStoreParams, AstraDbVectorStore, StoreOptions},
};
use crate::{
    schema::{docs_to_data, Data, Document},
    services::astra::{
        parse_api_endpoint, AstraDatabase, AstraDbAdmin, CollectionOptions, DataApiClient, DataApiClientConfig, DataApiError,
        Database, Environment, VectorOptions, VectorServiceOptions,
    },
    vectorstores::Embeddings,
};

pub const TOKEN_ENV_VAR: &str = "ASTRA_DB_APPLICATION_TOKEN";
const LANGFLOW_HOST_ENV_VAR: &str = "LANGFLOW_HOST";

/// User-facing configuration of [`AstraDbVectorStoreComponent`].
#[derive(Clone)]
pub struct AstraDbInputs {
    /// Application token. Falls back to `ASTRA_DB_APPLICATION_TOKEN`.
    pub token: Option<String>,
    /// Overrides the endpoint of `database_name`.
    pub api_endpoint: Option<String>,
    pub database_name: String,
    pub collection_name: String,
    pub keyspace: Option<String>,
    pub embedding_model: Option<Arc<dyn Embeddings>>,
    pub search_query: Option<String>,
    pub ingest_data: Vec<Data>,
    pub number_of_results: usize,
    /// One of [`super::SEARCH_TYPE_OPTIONS`].
    pub search_type: String,
    pub search_score_threshold: f32,
    pub advanced_search_filter: Map<String, Value>,
    pub content_field: Option<String>,
    pub ignore_invalid_documents: bool,
    /// Passed to the store: `batch_size`, `metric`, `dimension`, `fetch_k`, `lambda_mult`.
    pub astradb_vectorstore_kwargs: Map<String, Value>,
}

impl Default for AstraDbInputs {
    fn default() -> Self {
        Self {
            token: None,
            api_endpoint: None,
            database_name: String::new(),
            collection_name: String::new(),
            keyspace: None,
            embedding_model: None,
            search_query: None,
            ingest_data: Vec::new(),
            number_of_results: 4,
            search_type: "Similarity".into(),
            search_score_threshold: 0.0,
            advanced_search_filter: Map::new(),
            content_field: None,
            ignore_invalid_documents: false,
            astradb_vectorstore_kwargs: Map::new(),
        }
    }
}

impl fmt::Debug for AstraDbInputs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AstraDbInputs")
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .field("api_endpoint", &self.api_endpoint)
            .field("database_name", &self.database_name)
            .field("collection_name", &self.collection_name)
            .field("keyspace", &self.keyspace)
            .field("embedding_model", &self.embedding_model.as_ref().map(|e| e.identifier()))
            .field("search_query", &self.search_query)
            .field("ingest_data", &self.ingest_data.len())
            .field("number_of_results", &self.number_of_results)
            .field("search_type", &self.search_type)
            .field("search_score_threshold", &self.search_score_threshold)
            .field("advanced_search_filter", &self.advanced_search_filter)
            .field("content_field", &self.content_field)
            .field("ignore_invalid_documents", &self.ignore_invalid_documents)
            .field("astradb_vectorstore_kwargs", &self.astradb_vectorstore_kwargs)
            .finish()
    }
}

/// A database reachable with the configured token.
#[derive(Debug, Clone, PartialEq)]
pub struct DatabaseEntry {
    pub name: String,
    pub api_endpoint: String,
    pub collections: usize,
}

/// Inputs that decide which store gets built.
#[derive(Hash)]
struct StoreKey<'a> {
    token: Option<String>,
    api_endpoint: Option<&'a str>,
    database_name: &'a str,
    collection_name: &'a str,
    keyspace: Option<String>,
    content_field: Option<&'a str>,
    ignore_invalid_documents: bool,
    kwargs: String,
    embedding: Option<String>,
    ingest_data: String,
}

/// Ingests documents into, and searches, an Astra DB collection.
///
/// The store handle is built on first use and reused until an input that
/// affects it changes.
pub struct AstraDbVectorStoreComponent {
    pub inputs: AstraDbInputs,
    devops_url: Option<String>,
    data_api_base_url: Option<String>,
    cache: StoreCache<AstraDbVectorStore>,
}

impl fmt::Debug for AstraDbVectorStoreComponent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AstraDbVectorStoreComponent")
            .field("inputs", &self.inputs)
            .field("devops_url", &self.devops_url)
            .field("data_api_base_url", &self.data_api_base_url)
            .finish()
    }
}

impl AstraDbVectorStoreComponent {
    pub const DISPLAY_NAME: &'static str = "Astra DB";
    pub const DESCRIPTION: &'static str = "Ingest and search documents in Astra DB";
    pub const DOCUMENTATION: &'static str = "https://docs.datastax.com/en/langflow/astra-components.html";
    pub const NAME: &'static str = "AstraDB";
    pub const ICON: &'static str = "AstraDB";

    pub fn new(inputs: AstraDbInputs) -> Self {
        Self { inputs, devops_url: None, data_api_base_url: None, cache: StoreCache::new() }
    }

    /// Points database discovery at another DevOps API.
    pub fn with_devops_url(mut self, devops_url: impl Into<String>) -> Self {
        self.devops_url = Some(devops_url.into());
        self
    }

    /// Serves discovered databases from `{base_url}/{id}-{region}` instead
    /// of their Astra hosts.
    pub fn with_data_api_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.data_api_base_url = Some(base_url.into().trim_end_matches('/').to_string());
        self
    }

    fn database_endpoint(&self, admin: &AstraDbAdmin, database: &AstraDatabase) -> String {
        match &self.data_api_base_url {
            Some(base_url) => format!("{base_url}/{}-{}", database.id, database.info.region),
            None => admin.database_endpoint(database),
        }
    }

    fn token(&self) -> Option<String> {
        self.inputs
            .token
            .clone()
            .filter(|t| !t.trim().is_empty())
            .or_else(|| env::var(TOKEN_ENV_VAR).ok().filter(|t| !t.trim().is_empty()))
    }

    fn explicit_api_endpoint(&self) -> Option<&str> {
        self.inputs.api_endpoint.as_deref().map(str::trim).filter(|e| !e.is_empty())
    }

    fn client(&self, environment: Option<Environment>) -> Result<DataApiClient, DataApiError> {
        let mut config = DataApiClientConfig::default()
            .environment(environment)
            .devops_url(self.devops_url.clone());
        if let Some(token) = self.token() {
            config = config.token(token);
        }
        config.build()
    }

    /// Lists databases with their endpoints and collection counts.
    ///
    /// Counts are fetched concurrently; a database whose collections cannot
    /// be listed is reported with zero.
    #[instrument(skip(self))]
    pub async fn get_database_list(&self) -> Result<Vec<DatabaseEntry>, DataApiError> {
        let environment = self
            .explicit_api_endpoint()
            .and_then(parse_api_endpoint)
            .map(|parsed| parsed.environment);
        let client = self.client(environment)?;
        let admin = client.get_admin();
        let databases = admin.list_databases().await?;

        let counts = join_all(databases.iter().map(|db| {
            let database = client.get_database(&self.database_endpoint(&admin, db), db.info.keyspace.as_deref());
            let name = db.info.name.clone();
            async move {
                match database.list_collection_names().await {
                    Ok(names) => names.len(),
                    Err(e) => {
                        warn!("Error counting collections of database {name}: {e}");
                        0
                    }
                }
            }
        }))
        .await;

        Ok(databases
            .iter()
            .zip(counts)
            .map(|(db, collections)| DatabaseEntry {
                name: db.info.name.clone(),
                api_endpoint: self.database_endpoint(&admin, db),
                collections,
            })
            .collect())
    }

    /// The explicit endpoint, else the endpoint of the selected database.
    pub async fn get_api_endpoint(&self) -> Option<String> {
        if let Some(endpoint) = self.explicit_api_endpoint() {
            return Some(endpoint.to_string());
        }

        let database_name = self.inputs.database_name.trim();
        if database_name.is_empty() {
            return None;
        }

        match self.get_database_list().await {
            Ok(databases) => databases
                .into_iter()
                .find(|db| db.name == database_name)
                .map(|db| db.api_endpoint),
            Err(e) => {
                warn!("Error fetching databases: {e}");
                None
            }
        }
    }

    pub async fn get_environment(&self) -> Option<Environment> {
        let endpoint = self.get_api_endpoint().await?;
        parse_api_endpoint(&endpoint).map(|parsed| parsed.environment)
    }

    pub fn get_keyspace(&self) -> Option<String> {
        self.inputs
            .keyspace
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .map(str::to_string)
    }

    async fn database(&self) -> Result<Database, String> {
        let api_endpoint = self
            .get_api_endpoint()
            .await
            .ok_or_else(|| "no API endpoint or database name configured".to_string())?;
        let environment = parse_api_endpoint(&api_endpoint).map(|parsed| parsed.environment);
        let client = self.client(environment).map_err(|e| e.to_string())?;
        Ok(client.get_database(&api_endpoint, self.get_keyspace().as_deref()))
    }

    pub async fn get_database_object(&self) -> Discovery<Option<Database>> {
        Discovery::from_result(self.database().await.map(Some), None, "Error getting database")
    }

    pub async fn collection_exists(&self) -> Discovery<bool> {
        let result = match self.database().await {
            Ok(database) => database.list_collection_names().await.map_err(|e| e.to_string()),
            Err(e) => Err(e),
        };
        let name = self.inputs.collection_name.as_str();
        Discovery::from_result(
            result.map(|names| names.iter().any(|n| n == name)),
            false,
            "Error getting collection status",
        )
    }

    /// Estimated document count of a collection, `collection_name` when
    /// none is given.
    pub async fn collection_data(&self, collection_name: Option<&str>) -> Discovery<Option<u64>> {
        let name = collection_name.unwrap_or(self.inputs.collection_name.as_str());
        let result = match self.database().await {
            Ok(database) => database
                .get_collection(name)
                .estimated_document_count()
                .await
                .map(Some)
                .map_err(|e| e.to_string()),
            Err(e) => Err(e),
        };
        Discovery::from_result(result, None, "Error checking collection data")
    }

    pub async fn initialize_database_options(&self) -> Discovery<Vec<DatabaseOption>> {
        let result = self.get_database_list().await.map(|databases| {
            databases
                .into_iter()
                .map(|db| DatabaseOption { name: db.name, collections: db.collections })
                .collect()
        });
        Discovery::from_result(result, Vec::new(), "Error fetching databases")
    }

    pub async fn initialize_collection_options(&self) -> Discovery<Vec<CollectionOption>> {
        let database = match self.database().await {
            Ok(database) => database,
            Err(e) => return Discovery::degraded(Vec::new(), format!("Error getting database: {e}")),
        };
        let collections = match database.list_collections().await {
            Ok(collections) => collections,
            Err(e) => return Discovery::degraded(Vec::new(), format!("Error fetching collections: {e}")),
        };

        let counts = join_all(collections.iter().map(|descriptor| {
            let collection = database.get_collection(&descriptor.name);
            async move {
                collection
                    .estimated_document_count()
                    .await
                    .map_err(|e| warn!("Error checking collection data for {}: {e}", collection.name()))
                    .ok()
            }
        }))
        .await;

        Discovery::Found(
            collections
                .iter()
                .zip(counts)
                .map(|(descriptor, records)| CollectionOption {
                    name: descriptor.name.clone(),
                    records,
                    provider: descriptor.service().map(|s| s.provider.clone()),
                    model: descriptor.service().map(|s| s.model_name.clone()),
                    icon: String::new(),
                })
                .collect(),
        )
    }

    /// Refreshes the database and collection dropdowns.
    ///
    /// When a token is set but no database could be listed, the endpoint
    /// field is promoted and the database dropdown hidden.
    #[instrument(skip(self, build_config, field_value))]
    pub async fn update_build_config(
        &self,
        mut build_config: BuildConfig,
        field_value: &Value,
        field_name: Option<&str>,
    ) -> BuildConfig {
        debug!(?field_value, "Refreshing build config");
        let database_options = self.initialize_database_options().await.into_value();
        let database_field = build_config.field_mut("database_name");
        database_field.options = database_options.iter().map(|db| db.name.clone()).collect();
        database_field.options_metadata = database_options.iter().map(DatabaseOption::metadata).collect();

        let endpoint_fallback = self.token().is_some() && database_options.is_empty();
        build_config.field_mut("api_endpoint").advanced = !endpoint_fallback;
        build_config.field_mut("database_name").advanced = endpoint_fallback;

        let collection_options = self.initialize_collection_options().await.into_value();
        let collection_field = build_config.field_mut("collection_name");
        collection_field.options = collection_options.iter().map(|c| c.name.clone()).collect();
        collection_field.options_metadata = collection_options.iter().map(CollectionOption::metadata).collect();

        build_config
    }

    /// Creates a collection, embedded either by a vectorize provider or by
    /// the client with vectors of `dimensions`.
    #[instrument(skip(self, input), fields(collection = %input.collection_name))]
    pub async fn create_collection(&self, input: NewCollectionInput) -> Result<(), AstraDbError> {
        let name = input.collection_name.trim();
        if name.is_empty() {
            return Err(AstraDbError::InvalidInput("a collection name is required".into()));
        }
        let metric = input.similarity_metrics.first().cloned();
        let dimension = (input.dimensions > 0).then_some(input.dimensions);

        let vector = match input.embedding_provider.as_deref().map(str::trim).filter(|p| !p.is_empty()) {
            Some(provider) => {
                if input.model.trim().is_empty() {
                    return Err(AstraDbError::InvalidInput(format!(
                        "a model is required for embedding provider '{provider}'"
                    )));
                }
                VectorOptions {
                    dimension,
                    metric,
                    service: Some(VectorServiceOptions {
                        provider: provider.to_string(),
                        model_name: input.model.trim().to_string(),
                        authentication: None,
                        parameters: None,
                    }),
                }
            }
            None if dimension.is_some() => VectorOptions { dimension, metric, service: None },
            None => {
                return Err(AstraDbError::InvalidInput(
                    "either an embedding provider or a vector dimension is required".into(),
                ))
            }
        };

        let database = self.database().await.map_err(AstraDbError::CreateCollection)?;
        database
            .create_collection(name, &CollectionOptions { vector: Some(vector) })
            .await
            .map_err(|e| AstraDbError::CreateCollection(e.to_string()))?;
        info!("Created collection {name}");
        self.invalidate().await;
        Ok(())
    }

    fn store_key(&self) -> u64 {
        let inputs = &self.inputs;
        config_key(&StoreKey {
            token: self.token(),
            api_endpoint: self.explicit_api_endpoint(),
            database_name: inputs.database_name.trim(),
            collection_name: &inputs.collection_name,
            keyspace: self.get_keyspace(),
            content_field: inputs.content_field.as_deref(),
            ignore_invalid_documents: inputs.ignore_invalid_documents,
            kwargs: Value::Object(inputs.astradb_vectorstore_kwargs.clone()).to_string(),
            embedding: inputs.embedding_model.as_ref().map(|e| e.identifier()),
            ingest_data: serde_json::to_string(&inputs.ingest_data).unwrap_or_default(),
        })
    }

    /// Drops the cached store so the next build reconnects.
    pub async fn invalidate(&self) {
        self.cache.invalidate().await;
    }

    /// Returns the store for the current inputs, building it and ingesting
    /// `ingest_data` when the inputs changed since the last build.
    pub async fn build_vector_store(&self) -> Result<Arc<AstraDbVectorStore>, AstraDbError> {
        let key = self.store_key();
        self.cache.get_or_try_build(key, move || self.construct_store()).await
    }

    #[instrument(skip(self), fields(collection = %self.inputs.collection_name))]
    async fn construct_store(&self) -> Result<AstraDbVectorStore, AstraDbError> {
        let token = self
            .token()
            .ok_or_else(|| AstraDbError::VectorStoreInit("an application token is required".into()))?;
        let api_endpoint = self.get_api_endpoint().await.ok_or_else(|| {
            AstraDbError::VectorStoreInit("an API endpoint or a known database name is required".into())
        })?;
        let options = StoreOptions::from_kwargs(&self.inputs.astradb_vectorstore_kwargs)
            .map_err(|e| AstraDbError::VectorStoreInit(e.to_string()))?;

        let embedding = self.inputs.embedding_model.clone();
        let autodetect_collection = self.collection_exists().await.into_value();
        let content_field = match (&embedding, self.inputs.content_field.as_deref()) {
            (None, _) => None,
            (Some(_), Some(field)) if !field.trim().is_empty() => Some(field.trim().to_string()),
            (Some(_), _) => match self.collection_data(None).await.into_value() {
                Some(0) => Some("page_content".to_string()),
                _ => None,
            },
        };

        let caller = if env::var_os(LANGFLOW_HOST_ENV_VAR).is_some() { "ds-langflow" } else { "langflow" };
        let params = AstraDbStoreParams {
            token,
            environment: parse_api_endpoint(&api_endpoint).map(|parsed| parsed.environment),
            api_endpoint,
            keyspace: self.get_keyspace(),
            collection_name: self.inputs.collection_name.clone(),
            callers: vec![(caller.to_string(), env!("CARGO_PKG_VERSION").to_string())],
            autodetect_collection,
            content_field,
            ignore_invalid_documents: self.inputs.ignore_invalid_documents,
            embedding,
            options,
        };

        let store = AstraDbVectorStore::new(params)
            .await
            .map_err(|e| AstraDbError::VectorStoreInit(e.to_string()))?;
        self.add_documents_to_vector_store(&store).await?;
        Ok(store)
    }

    /// Adds `ingest_data` to the store, returning how many documents were sent.
    pub async fn add_documents_to_vector_store(&self, store: &AstraDbVectorStore) -> Result<usize, AstraDbError> {
        let documents: Vec<Document> = self.inputs.ingest_data.iter().map(Data::to_document).collect();
        if documents.is_empty() {
            info!("No documents to add to the Vector Store.");
            return Ok(0);
        }

        info!("Adding {} documents to the Vector Store.", documents.len());
        let count = documents.len();
        store
            .add_documents(documents)
            .await
            .map_err(|e| AstraDbError::AddDocuments(e.to_string()))?;
        Ok(count)
    }

    pub fn map_search_type(&self) -> SearchType {
        SearchType::from_label(&self.inputs.search_type)
    }

    /// Arguments for the configured search, or `None` when there is neither
    /// a query nor a filter.
    pub fn build_search_args(&self) -> Result<Option<SearchArgs>, AstraDbError> {
        let inputs = &self.inputs;
        let filter = (!inputs.advanced_search_filter.is_empty()).then(|| inputs.advanced_search_filter.clone());
        let query = inputs.search_query.as_deref().filter(|q| !q.trim().is_empty());

        let args = match (query, filter) {
            (Some(query), filter) => SearchArgs::Query {
                query: query.to_string(),
                search_type: self.map_search_type(),
                k: inputs.number_of_results,
                score_threshold: inputs.search_score_threshold,
                filter,
            },
            (None, Some(filter)) => SearchArgs::Metadata { n: inputs.number_of_results, filter },
            (None, None) => return Ok(None),
        };

        if inputs.number_of_results == 0 {
            return Err(AstraDbError::SearchArgs("number_of_results must be greater than zero".into()));
        }
        if !inputs.search_score_threshold.is_finite() {
            return Err(AstraDbError::SearchArgs("search_score_threshold must be a finite number".into()));
        }
        Ok(Some(args))
    }

    /// Runs the configured search against `store`, or against the store
    /// for the current inputs when none is given.
    pub async fn search_documents(
        &self,
        store: Option<Arc<AstraDbVectorStore>>,
    ) -> Result<Vec<Data>, AstraDbError> {
        let store = match store {
            Some(store) => store,
            None => self.build_vector_store().await?,
        };

        info!(
            search_query = ?self.inputs.search_query,
            search_type = %self.inputs.search_type,
            number_of_results = self.inputs.number_of_results,
            "Searching vector store"
        );

        let Some(args) = self.build_search_args()? else {
            info!("No search input or filters provided. Skipping search.");
            return Ok(Vec::new());
        };

        let method = args.method();
        debug!("Calling vector_store.{method} with args: {:?}", args.to_kwargs());
        let result = match &args {
            SearchArgs::Query { query, search_type, k, score_threshold, filter } => {
                store.search(query, *search_type, *k, *score_threshold, filter.as_ref()).await
            }
            SearchArgs::Metadata { n, filter } => store.metadata_search(filter, *n).await,
        };
        let documents = result.map_err(|e| AstraDbError::Search { method, message: e.to_string() })?;

        info!("Retrieved documents: {}", documents.len());
        Ok(docs_to_data(documents))
    }

    /// `{ search_type, search_kwargs }` for a retriever over this store.
    pub fn get_retriever_kwargs(&self) -> Result<Map<String, Value>, AstraDbError> {
        let search_kwargs = self.build_search_args()?.map(|args| args.to_kwargs()).unwrap_or_default();
        let mut kwargs = Map::new();
        kwargs.insert("search_type".into(), self.map_search_type().as_str().into());
        kwargs.insert("search_kwargs".into(), Value::Object(search_kwargs));
        Ok(kwargs)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use wiremock::{
        matchers::{body_json, body_partial_json, header, method, path},
        Mock, MockServer, ResponseTemplate,
    };

    use super::*;
    use crate::vectorstores::astradb::build_config::default_build_config;

    const KEYSPACE_PATH: &str = "/api/json/v1/default_keyspace";
    const COLLECTION_PATH: &str = "/api/json/v1/default_keyspace/docs";

    fn inputs(server: &MockServer) -> AstraDbInputs {
        AstraDbInputs {
            token: Some("AstraCS:test".into()),
            api_endpoint: Some(server.uri()),
            collection_name: "docs".into(),
            ..Default::default()
        }
    }

    fn object(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    /// An existing vectorize collection with no sample documents.
    async fn mount_existing_collection(server: &MockServer) {
        Mock::given(method("POST"))
            .and(path(KEYSPACE_PATH))
            .and(body_json(json!({"findCollections": {}})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": {"collections": ["docs"]}})))
            .mount(server)
            .await;
        Mock::given(method("POST"))
            .and(path(KEYSPACE_PATH))
            .and(body_json(json!({"findCollections": {"options": {"explain": true}}})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "status": {"collections": [{"name": "docs", "options": {"vector": {
                    "service": {"provider": "nvidia", "modelName": "NV-Embed-QA"}
                }}}]}
            })))
            .mount(server)
            .await;
        Mock::given(method("POST"))
            .and(path(COLLECTION_PATH))
            .and(body_partial_json(json!({"find": {"options": {"limit": 10}}})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": {"documents": []}})))
            .mount(server)
            .await;
    }

    #[test]
    fn search_type_mapping() {
        let mut component = AstraDbVectorStoreComponent::new(AstraDbInputs::default());
        assert_eq!(component.map_search_type(), SearchType::Similarity);
        component.inputs.search_type = "Similarity with score threshold".into();
        assert_eq!(component.map_search_type().as_str(), "similarity_score_threshold");
        component.inputs.search_type = "MMR (Max Marginal Relevance)".into();
        assert_eq!(component.map_search_type().as_str(), "mmr");
        component.inputs.search_type = "Unknown".into();
        assert_eq!(component.map_search_type().as_str(), "similarity");
    }

    #[test]
    fn search_args_follow_query_and_filter() {
        let mut component = AstraDbVectorStoreComponent::new(AstraDbInputs::default());
        assert_eq!(component.build_search_args().unwrap(), None);

        component.inputs.search_query = Some("   ".into());
        assert_eq!(component.build_search_args().unwrap(), None);

        component.inputs.advanced_search_filter = object(json!({"source": "a"}));
        let args = component.build_search_args().unwrap().unwrap();
        assert_eq!(args.method(), "metadata_search");
        assert_eq!(args, SearchArgs::Metadata { n: 4, filter: object(json!({"source": "a"})) });

        component.inputs.search_query = Some("rust".into());
        let args = component.build_search_args().unwrap().unwrap();
        assert_eq!(args.method(), "search");
        assert_eq!(
            Value::Object(args.to_kwargs()),
            json!({
                "query": "rust",
                "search_type": "similarity",
                "k": 4,
                "score_threshold": 0.0,
                "filter": {"source": "a"}
            })
        );
    }

    #[test]
    fn invalid_search_args_are_rejected() {
        let mut component = AstraDbVectorStoreComponent::new(AstraDbInputs {
            search_query: Some("rust".into()),
            number_of_results: 0,
            ..Default::default()
        });
        assert!(matches!(component.build_search_args(), Err(AstraDbError::SearchArgs(_))));

        component.inputs.number_of_results = 2;
        component.inputs.search_score_threshold = f32::NAN;
        assert!(matches!(component.build_search_args(), Err(AstraDbError::SearchArgs(_))));
    }

    #[test]
    fn retriever_kwargs_wrap_search_args() {
        let component = AstraDbVectorStoreComponent::new(AstraDbInputs {
            search_query: Some("rust".into()),
            search_type: "MMR (Max Marginal Relevance)".into(),
            ..Default::default()
        });
        let kwargs = component.get_retriever_kwargs().unwrap();
        assert_eq!(kwargs["search_type"], "mmr");
        assert_eq!(kwargs["search_kwargs"]["k"], 4);

        let empty = AstraDbVectorStoreComponent::new(AstraDbInputs::default());
        assert_eq!(empty.get_retriever_kwargs().unwrap()["search_kwargs"], json!({}));
    }

    #[test]
    fn keyspace_is_trimmed() {
        let mut component = AstraDbVectorStoreComponent::new(AstraDbInputs::default());
        assert_eq!(component.get_keyspace(), None);
        component.inputs.keyspace = Some("  ".into());
        assert_eq!(component.get_keyspace(), None);
        component.inputs.keyspace = Some(" ks ".into());
        assert_eq!(component.get_keyspace().as_deref(), Some("ks"));
    }

    #[tokio::test]
    async fn endpoint_and_environment_resolution() {
        let component = AstraDbVectorStoreComponent::new(AstraDbInputs::default());
        assert_eq!(component.get_api_endpoint().await, None);
        assert_eq!(component.get_environment().await, None);

        let endpoint = "https://01234567-89ab-cdef-0123-456789abcdef-us-east1.apps.astra-dev.datastax.com";
        let component = AstraDbVectorStoreComponent::new(AstraDbInputs {
            api_endpoint: Some(endpoint.into()),
            ..Default::default()
        });
        assert_eq!(component.get_api_endpoint().await.as_deref(), Some(endpoint));
        assert_eq!(component.get_environment().await, Some(Environment::Dev));
    }

    #[tokio::test]
    async fn discovery_degrades_when_devops_fails() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v2/databases"))
            .respond_with(ResponseTemplate::new(500).set_body_string("down"))
            .mount(&server)
            .await;

        let component = AstraDbVectorStoreComponent::new(AstraDbInputs {
            token: Some("AstraCS:test".into()),
            database_name: "prod-db".into(),
            ..Default::default()
        })
        .with_devops_url(server.uri());

        let options = component.initialize_database_options().await;
        assert!(options.is_degraded());
        assert!(options.value().is_empty());
        assert_eq!(component.get_api_endpoint().await, None);
        assert!(component.get_database_object().await.is_degraded());
        assert!(component.initialize_collection_options().await.is_degraded());
        assert!(!component.collection_exists().await.into_value());
        assert_eq!(component.collection_data(None).await.into_value(), None);
    }

    #[tokio::test]
    async fn build_config_falls_back_to_endpoint() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v2/databases"))
            .and(header("Authorization", "Bearer AstraCS:test"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .mount(&server)
            .await;

        let component = AstraDbVectorStoreComponent::new(AstraDbInputs {
            token: Some("AstraCS:test".into()),
            ..Default::default()
        })
        .with_devops_url(server.uri());

        let config = component
            .update_build_config(default_build_config(), &Value::Null, Some("token"))
            .await;
        assert!(!config.get("api_endpoint").unwrap().advanced);
        assert!(config.get("database_name").unwrap().advanced);
        assert!(config.get("database_name").unwrap().options.is_empty());
        assert!(config.get("collection_name").unwrap().options.is_empty());
    }

    const DB_VECTORS: &str = "01234567-89ab-cdef-0123-456789abcdef";
    const DB_BROKEN: &str = "fedcba98-7654-3210-fedc-ba9876543210";

    /// Two databases: `vectors` with two collections and `broken`, whose
    /// collections cannot be listed.
    async fn discovery_server() -> MockServer {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v2/databases"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {"id": DB_VECTORS, "status": "ACTIVE",
                 "info": {"name": "vectors", "region": "us-east1", "keyspace": "default_keyspace"}},
                {"id": DB_BROKEN, "status": "ACTIVE",
                 "info": {"name": "broken", "region": "eu-west1"}}
            ])))
            .mount(&server)
            .await;

        let vectors = format!("/{DB_VECTORS}-us-east1/api/json/v1/default_keyspace");
        Mock::given(method("POST"))
            .and(path(vectors.as_str()))
            .and(body_json(json!({"findCollections": {}})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": {"collections": ["docs", "notes"]}})))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path(vectors.as_str()))
            .and(body_json(json!({"findCollections": {"options": {"explain": true}}})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "status": {"collections": [{"name": "docs", "options": {}}]}
            })))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path(format!("{vectors}/docs").as_str()))
            .and(body_json(json!({"estimatedDocumentCount": {}})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": {"count": 3}})))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path(format!("/{DB_BROKEN}-eu-west1/api/json/v1/default_keyspace").as_str()))
            .respond_with(ResponseTemplate::new(503).set_body_string("unavailable"))
            .mount(&server)
            .await;
        server
    }

    fn discovering_component(server: &MockServer, database_name: &str) -> AstraDbVectorStoreComponent {
        AstraDbVectorStoreComponent::new(AstraDbInputs {
            token: Some("AstraCS:test".into()),
            database_name: database_name.into(),
            ..Default::default()
        })
        .with_devops_url(server.uri())
        .with_data_api_base_url(server.uri())
    }

    #[tokio::test]
    async fn database_list_counts_collections_per_database() {
        let server = discovery_server().await;
        let component = discovering_component(&server, "");

        let databases = component.get_database_list().await.unwrap();
        assert_eq!(
            databases,
            vec![
                DatabaseEntry {
                    name: "vectors".into(),
                    api_endpoint: format!("{}/{DB_VECTORS}-us-east1", server.uri()),
                    collections: 2,
                },
                DatabaseEntry {
                    name: "broken".into(),
                    api_endpoint: format!("{}/{DB_BROKEN}-eu-west1", server.uri()),
                    collections: 0,
                },
            ]
        );

        let options = component.initialize_database_options().await;
        assert!(!options.is_degraded());
        assert_eq!(options.value().len(), 2);
    }

    #[tokio::test]
    async fn database_name_resolves_through_discovery() {
        let server = discovery_server().await;

        let component = discovering_component(&server, "vectors");
        let expected = format!("{}/{DB_VECTORS}-us-east1", server.uri());
        assert_eq!(component.get_api_endpoint().await, Some(expected));
        // Not an Astra host, so no environment can be derived.
        assert_eq!(component.get_environment().await, None);

        let unknown = discovering_component(&server, "missing");
        assert_eq!(unknown.get_api_endpoint().await, None);
    }

    #[tokio::test]
    async fn build_config_lists_discovered_databases() {
        let server = discovery_server().await;
        let component = discovering_component(&server, "vectors");

        let config = component
            .update_build_config(default_build_config(), &json!("vectors"), Some("database_name"))
            .await;

        assert!(config.get("api_endpoint").unwrap().advanced);
        let database = config.get("database_name").unwrap();
        assert!(!database.advanced);
        assert_eq!(database.options, vec!["vectors", "broken"]);
        assert_eq!(
            database.options_metadata,
            vec![object(json!({"collections": 2})), object(json!({"collections": 0}))]
        );

        let collection = config.get("collection_name").unwrap();
        assert_eq!(collection.options, vec!["docs"]);
        assert_eq!(
            collection.options_metadata,
            vec![object(json!({"records": 3, "provider": null, "icon": "", "model": null}))]
        );
    }

    #[tokio::test]
    async fn collection_options_carry_counts_and_service() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(KEYSPACE_PATH))
            .and(body_json(json!({"findCollections": {"options": {"explain": true}}})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "status": {"collections": [
                    {"name": "docs", "options": {"vector": {"service": {"provider": "nvidia", "modelName": "NV-Embed-QA"}}}},
                    {"name": "plain", "options": {}}
                ]}
            })))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path(COLLECTION_PATH))
            .and(body_json(json!({"estimatedDocumentCount": {}})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": {"count": 12}})))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/api/json/v1/default_keyspace/plain"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let component = AstraDbVectorStoreComponent::new(inputs(&server));
        let options = component.initialize_collection_options().await.into_value();
        assert_eq!(options.len(), 2);
        assert_eq!(options[0].records, Some(12));
        assert_eq!(options[0].provider.as_deref(), Some("nvidia"));
        assert_eq!(options[0].model.as_deref(), Some("NV-Embed-QA"));
        assert_eq!(options[1].records, None);
        assert_eq!(options[1].provider, None);
    }

    #[tokio::test]
    async fn empty_ingest_makes_no_insert_call() {
        let server = MockServer::start().await;
        mount_existing_collection(&server).await;
        Mock::given(method("POST"))
            .and(path(COLLECTION_PATH))
            .and(body_partial_json(json!({"insertMany": {}})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": {"insertedIds": []}})))
            .expect(0)
            .mount(&server)
            .await;

        let component = AstraDbVectorStoreComponent::new(inputs(&server));
        let store = component.build_vector_store().await.unwrap();
        assert_eq!(component.add_documents_to_vector_store(&store).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn ingests_data_once_and_reuses_store() {
        let server = MockServer::start().await;
        mount_existing_collection(&server).await;
        Mock::given(method("POST"))
            .and(path(COLLECTION_PATH))
            .and(body_partial_json(json!({"insertMany": {"documents": [
                {"$vectorize": "first", "metadata": {"source": "a"}},
                {"$vectorize": "second", "metadata": {}}
            ]}})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": {"insertedIds": ["1", "2"]}})))
            .expect(1)
            .mount(&server)
            .await;

        let mut first = Data::from_text("first");
        first.data.insert("source".into(), json!("a"));
        let component = AstraDbVectorStoreComponent::new(AstraDbInputs {
            ingest_data: vec![first, Data::from_text("second")],
            ..inputs(&server)
        });

        let a = component.build_vector_store().await.unwrap();
        let b = component.build_vector_store().await.unwrap();
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[tokio::test]
    async fn changed_inputs_rebuild_the_store() {
        let server = MockServer::start().await;
        mount_existing_collection(&server).await;

        let mut component = AstraDbVectorStoreComponent::new(inputs(&server));
        let a = component.build_vector_store().await.unwrap();
        component.inputs.ignore_invalid_documents = true;
        let b = component.build_vector_store().await.unwrap();
        assert!(!Arc::ptr_eq(&a, &b));

        component.invalidate().await;
        let c = component.build_vector_store().await.unwrap();
        assert!(!Arc::ptr_eq(&b, &c));
    }

    #[tokio::test]
    async fn init_failure_is_wrapped() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(KEYSPACE_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": {"collections": []}})))
            .mount(&server)
            .await;

        // The collection is missing and there is no embedding model to create it with.
        let component = AstraDbVectorStoreComponent::new(inputs(&server));
        let err = component.build_vector_store().await.unwrap_err();
        assert!(matches!(err, AstraDbError::VectorStoreInit(_)));
        assert!(err.to_string().starts_with("Error initializing AstraDBVectorStore: "));
    }

    #[tokio::test]
    async fn search_converts_documents_to_data() {
        let server = MockServer::start().await;
        mount_existing_collection(&server).await;
        Mock::given(method("POST"))
            .and(path(COLLECTION_PATH))
            .and(body_partial_json(json!({"find": {"sort": {"$vectorize": "rust"}, "options": {"limit": 2}}})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": {"documents": [
                {"_id": "1", "$vectorize": "Rust is fast", "$similarity": 0.9, "metadata": {"source": "a"}}
            ]}})))
            .mount(&server)
            .await;

        let component = AstraDbVectorStoreComponent::new(AstraDbInputs {
            search_query: Some("rust".into()),
            number_of_results: 2,
            ..inputs(&server)
        });
        let data = component.search_documents(None).await.unwrap();
        assert_eq!(data.len(), 1);
        assert_eq!(data[0].get_text(), "Rust is fast");
        assert_eq!(data[0].data["source"], "a");
        assert_eq!(data[0].data["id"], "1");
    }

    #[tokio::test]
    async fn no_query_and_no_filter_skips_search() {
        let server = MockServer::start().await;
        mount_existing_collection(&server).await;
        Mock::given(method("POST"))
            .and(path(COLLECTION_PATH))
            .and(body_partial_json(json!({"find": {"options": {"limit": 4}}})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": {"documents": []}})))
            .expect(0)
            .mount(&server)
            .await;

        let component = AstraDbVectorStoreComponent::new(inputs(&server));
        assert!(component.search_documents(None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn search_failures_name_the_method() {
        let server = MockServer::start().await;
        mount_existing_collection(&server).await;
        Mock::given(method("POST"))
            .and(path(COLLECTION_PATH))
            .and(body_partial_json(json!({"find": {"filter": {"metadata.source": "a"}}})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "errors": [{"message": "bad filter", "errorCode": "INVALID_FILTER_EXPRESSION"}]
            })))
            .mount(&server)
            .await;

        let component = AstraDbVectorStoreComponent::new(AstraDbInputs {
            advanced_search_filter: object(json!({"source": "a"})),
            ..inputs(&server)
        });
        let err = component.search_documents(None).await.unwrap_err();
        assert!(matches!(err, AstraDbError::Search { method: "metadata_search", .. }));
        assert!(err.to_string().starts_with("Error performing metadata_search in AstraDBVectorStore: "));
    }

    #[tokio::test]
    async fn create_collection_validates_and_sends_service() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(KEYSPACE_PATH))
            .and(body_json(json!({"createCollection": {"name": "fresh", "options": {"vector": {
                "metric": "dot_product",
                "service": {"provider": "nvidia", "modelName": "NV-Embed-QA"}
            }}}})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": {"ok": 1}})))
            .expect(1)
            .mount(&server)
            .await;

        let component = AstraDbVectorStoreComponent::new(inputs(&server));
        let err = component.create_collection(NewCollectionInput::default()).await.unwrap_err();
        assert!(matches!(err, AstraDbError::InvalidInput(_)));

        let err = component
            .create_collection(NewCollectionInput { collection_name: "fresh".into(), ..Default::default() })
            .await
            .unwrap_err();
        assert!(matches!(err, AstraDbError::InvalidInput(_)));

        component
            .create_collection(NewCollectionInput {
                collection_name: "fresh".into(),
                embedding_provider: Some("nvidia".into()),
                model: "NV-Embed-QA".into(),
                similarity_metrics: vec!["dot_product".into()],
                ..Default::default()
            })
            .await
            .unwrap();
    }
}
