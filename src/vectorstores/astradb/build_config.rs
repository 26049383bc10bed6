use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::search::SEARCH_TYPE_OPTIONS;

/// UI description of one component input.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
pub struct FieldConfig {
    pub name: String,
    pub display_name: String,
    #[serde(default)]
    pub info: String,
    #[serde(rename = "type")]
    pub field_type: String,
    #[serde(default)]
    pub value: Value,
    #[serde(default)]
    pub options: Vec<String>,
    #[serde(default)]
    pub options_metadata: Vec<Map<String, Value>>,
    #[serde(default)]
    pub advanced: bool,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub refresh_button: bool,
    #[serde(default)]
    pub real_time_refresh: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dialog_inputs: Vec<Value>,
}

impl FieldConfig {
    pub fn new(name: &str, display_name: &str, field_type: &str) -> Self {
        Self {
            name: name.into(),
            display_name: display_name.into(),
            field_type: field_type.into(),
            ..Default::default()
        }
    }

    fn info(mut self, info: &str) -> Self {
        self.info = info.into();
        self
    }

    fn value(mut self, value: impl Into<Value>) -> Self {
        self.value = value.into();
        self
    }

    fn advanced(mut self) -> Self {
        self.advanced = true;
        self
    }

    fn required(mut self) -> Self {
        self.required = true;
        self
    }

    fn refreshing(mut self) -> Self {
        self.refresh_button = true;
        self.real_time_refresh = true;
        self
    }
}

/// Field configurations keyed by field name.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
#[serde(transparent)]
pub struct BuildConfig(pub BTreeMap<String, FieldConfig>);

impl BuildConfig {
    pub fn get(&self, name: &str) -> Option<&FieldConfig> {
        self.0.get(name)
    }

    /// The named field, created empty if the config lacks it.
    pub fn field_mut(&mut self, name: &str) -> &mut FieldConfig {
        self.0
            .entry(name.to_string())
            .or_insert_with(|| FieldConfig { name: name.into(), ..Default::default() })
    }

    pub fn insert(&mut self, field: FieldConfig) {
        self.0.insert(field.name.clone(), field);
    }
}

impl FromIterator<FieldConfig> for BuildConfig {
    fn from_iter<I: IntoIterator<Item = FieldConfig>>(iter: I) -> Self {
        let mut config = BuildConfig::default();
        for field in iter {
            config.insert(field);
        }
        config
    }
}

/// Dialog shown when creating a database.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct NewDatabaseInput {
    pub title: String,
    pub description: String,
    pub db_names: Vec<String>,
    pub status: String,
    pub collection_count: usize,
    pub record_count: u64,
}

impl Default for NewDatabaseInput {
    fn default() -> Self {
        Self {
            title: "Create New Database".into(),
            description: "Create a new database in Astra DB.".into(),
            db_names: Vec::new(),
            status: String::new(),
            collection_count: 0,
            record_count: 0,
        }
    }
}

/// Dialog shown when creating a collection, and the arguments of
/// [`crate::AstraDbVectorStoreComponent::create_collection`].
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct NewCollectionInput {
    pub title: String,
    pub description: String,
    pub status: String,
    pub collection_name: String,
    /// Vectorize provider; when set, the server embeds documents.
    pub embedding_provider: Option<String>,
    pub model: String,
    pub dimensions: usize,
    pub similarity_metrics: Vec<String>,
    pub icon: String,
}

impl Default for NewCollectionInput {
    fn default() -> Self {
        Self {
            title: "Create New Collection".into(),
            description: "Create a new collection in Astra DB.".into(),
            status: String::new(),
            collection_name: String::new(),
            embedding_provider: None,
            model: String::new(),
            dimensions: 0,
            similarity_metrics: Vec::new(),
            icon: "Collection".into(),
        }
    }
}

/// A database offered in the database dropdown.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct DatabaseOption {
    pub name: String,
    pub collections: usize,
}

impl DatabaseOption {
    pub(crate) fn metadata(&self) -> Map<String, Value> {
        let mut metadata = Map::new();
        metadata.insert("collections".into(), self.collections.into());
        metadata
    }
}

/// A collection offered in the collection dropdown.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct CollectionOption {
    pub name: String,
    /// Estimated document count, when it could be read.
    pub records: Option<u64>,
    pub provider: Option<String>,
    pub model: Option<String>,
    pub icon: String,
}

impl CollectionOption {
    pub(crate) fn metadata(&self) -> Map<String, Value> {
        let mut metadata = Map::new();
        metadata.insert("records".into(), self.records.into());
        metadata.insert("provider".into(), self.provider.clone().into());
        metadata.insert("icon".into(), self.icon.clone().into());
        metadata.insert("model".into(), self.model.clone().into());
        metadata
    }
}

fn dialog<T: Serialize + Default>() -> Vec<Value> {
    serde_json::to_value(T::default()).map(|v| vec![v]).unwrap_or_default()
}

/// Field configuration of the Astra DB component before any refresh.
pub fn default_build_config() -> BuildConfig {
    let mut database = FieldConfig::new("database_name", "Database", "dropdown")
        .info("Select a database in Astra DB.")
        .value("")
        .required()
        .refreshing();
    database.dialog_inputs = dialog::<NewDatabaseInput>();
    database.options_metadata = vec![DatabaseOption { name: String::new(), collections: 0 }.metadata()];

    let mut collection = FieldConfig::new("collection_name", "Collection", "dropdown")
        .info("The name of the collection within Astra DB where the vectors will be stored.")
        .value("")
        .required()
        .refreshing();
    collection.dialog_inputs = dialog::<NewCollectionInput>();
    collection.options_metadata = vec![CollectionOption {
        name: String::new(),
        records: Some(0),
        provider: None,
        model: None,
        icon: String::new(),
    }
    .metadata()];

    let mut search_type = FieldConfig::new("search_type", "Search Type", "dropdown")
        .info("Search type to use")
        .value(SEARCH_TYPE_OPTIONS[0])
        .advanced();
    search_type.options = SEARCH_TYPE_OPTIONS.iter().map(|s| s.to_string()).collect();

    let mut token = FieldConfig::new("token", "Astra DB Application Token", "secret")
        .info("Authentication token for accessing Astra DB.")
        .value("ASTRA_DB_APPLICATION_TOKEN")
        .required();
    token.real_time_refresh = true;

    [
        token,
        FieldConfig::new("api_endpoint", "API Endpoint", "secret")
            .info("The Astra DB API Endpoint to use. Overrides selection of database.")
            .refreshing()
            .advanced(),
        database,
        collection,
        FieldConfig::new("keyspace", "Keyspace", "str")
            .info("Optional keyspace within Astra DB to use for the collection.")
            .advanced(),
        FieldConfig::new("embedding_model", "Embedding Model", "handle")
            .info("Allows an embedding model configuration."),
        FieldConfig::new("search_query", "Search Query", "str"),
        FieldConfig::new("ingest_data", "Ingest Data", "data"),
        FieldConfig::new("number_of_results", "Number of Search Results", "int")
            .info("Number of search results to return.")
            .value(4)
            .advanced(),
        search_type,
        FieldConfig::new("search_score_threshold", "Search Score Threshold", "float")
            .info(
                "Minimum similarity score threshold for search results. \
                 (when using 'Similarity with score threshold')",
            )
            .value(0.0)
            .advanced(),
        FieldConfig::new("advanced_search_filter", "Search Metadata Filter", "dict")
            .info("Optional dictionary of filters to apply to the search query.")
            .advanced(),
        FieldConfig::new("content_field", "Content Field", "str")
            .info("Field to use as the text content field for the vector store.")
            .advanced(),
        FieldConfig::new("ignore_invalid_documents", "Ignore Invalid Documents", "bool")
            .info("Boolean flag to determine whether to ignore invalid documents at runtime.")
            .advanced(),
        FieldConfig::new("astradb_vectorstore_kwargs", "AstraDBVectorStore Parameters", "dict")
            .info("Optional dictionary of additional parameters for the AstraDBVectorStore.")
            .advanced(),
    ]
    .into_iter()
    .collect()
}
