use std::{fmt, sync::Arc};

use serde::Deserialize;
use serde_json::{json, Map, Value};
use tracing::{debug, info, instrument};
use uuid::Uuid;

use super::{
    codec::{ContentField, DocumentCodec, StoredHit, DEFAULT_CONTENT_FIELD},
    errors::StoreError,
    mmr::maximal_marginal_relevance,
    search::{metadata_filter, SearchType},
};
use crate::{
    schema::Document,
    services::astra::{
        Collection, CollectionOptions, DataApiClientConfig, Environment, FindQuery, VectorOptions,
    },
    vectorstores::Embeddings,
};

/// Text embedded to learn the dimension of a client-side model.
const DIMENSION_PROBE: &str = "This is a sample sentence.";
const AUTODETECT_SAMPLE_SIZE: usize = 10;

/// Tuning knobs passed through as extra keyword arguments.
#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct StoreOptions {
    pub batch_size: usize,
    pub metric: Option<String>,
    pub dimension: Option<usize>,
    pub fetch_k: usize,
    pub lambda_mult: f32,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self { batch_size: 80, metric: None, dimension: None, fetch_k: 20, lambda_mult: 0.5 }
    }
}

impl StoreOptions {
    /// Reads options from a keyword map. Unknown keys are ignored.
    pub fn from_kwargs(kwargs: &Map<String, Value>) -> Result<Self, StoreError> {
        let options: Self = serde_json::from_value(Value::Object(kwargs.clone()))
            .map_err(|e| StoreError::Config(format!("Invalid vector store arguments: {e}")))?;
        if options.batch_size == 0 {
            return Err(StoreError::Config("batch_size must be greater than zero".into()));
        }
        Ok(options)
    }
}

/// Everything needed to open (or create) a collection as a vector store.
#[derive(Clone, Default)]
pub struct AstraDbStoreParams {
    pub token: String,
    pub api_endpoint: String,
    pub keyspace: Option<String>,
    pub collection_name: String,
    pub environment: Option<Environment>,
    /// `(name, version)` pairs reported in the user agent.
    pub callers: Vec<(String, String)>,
    /// Open an existing collection and infer its layout instead of creating it.
    pub autodetect_collection: bool,
    pub content_field: Option<String>,
    pub ignore_invalid_documents: bool,
    /// Client-side embeddings. Without one, the collection's vectorize
    /// service embeds text on the server.
    pub embedding: Option<Arc<dyn Embeddings>>,
    pub options: StoreOptions,
}

/// A collection used as a vector store.
pub struct AstraDbVectorStore {
    collection: Collection,
    embedding: Option<Arc<dyn Embeddings>>,
    codec: DocumentCodec,
    options: StoreOptions,
}

impl fmt::Debug for AstraDbVectorStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AstraDbVectorStore")
            .field("collection", &self.collection.name())
            .field("embedding", &self.embedding.as_ref().map(|e| e.identifier()))
            .field("codec", &self.codec)
            .field("options", &self.options)
            .finish()
    }
}

impl AstraDbVectorStore {
    #[instrument(name = "AstraDbVectorStore::new", skip(params), fields(collection = %params.collection_name))]
    pub async fn new(params: AstraDbStoreParams) -> Result<Self, StoreError> {
        let mut config = DataApiClientConfig::default()
            .token(params.token)
            .environment(params.environment);
        for (name, version) in params.callers {
            config = config.caller(name, version);
        }
        let database = config.build()?.get_database(&params.api_endpoint, params.keyspace.as_deref());

        let codec = if params.autodetect_collection {
            let descriptor = database
                .list_collections()
                .await?
                .into_iter()
                .find(|c| c.name == params.collection_name)
                .ok_or_else(|| {
                    StoreError::Config(format!("Collection '{}' does not exist", params.collection_name))
                })?;
            let collection = database.get_collection(&params.collection_name);
            let samples = collection
                .find(&FindQuery {
                    projection: Some(json!({"$vector": 0})),
                    limit: Some(AUTODETECT_SAMPLE_SIZE),
                    ..Default::default()
                })
                .await?
                .documents;
            debug!(samples = samples.len(), "Autodetecting collection layout");
            DocumentCodec::autodetect(
                &samples,
                descriptor.service().is_some(),
                params.content_field.as_deref(),
                params.ignore_invalid_documents,
            )
        } else {
            let embedding = params.embedding.as_ref().ok_or_else(|| {
                StoreError::Config(
                    "An embedding model is required to create a collection without a vectorize service"
                        .into(),
                )
            })?;
            let dimension = match params.options.dimension {
                Some(dimension) => dimension,
                None => embedding.embed_query(DIMENSION_PROBE).await?.len(),
            };
            let options = CollectionOptions {
                vector: Some(VectorOptions {
                    dimension: Some(dimension),
                    metric: params.options.metric.clone(),
                    service: None,
                }),
            };
            info!(dimension, "Creating collection {}", params.collection_name);
            database.create_collection(&params.collection_name, &options).await?;
            let content_field = params.content_field.as_deref().unwrap_or(DEFAULT_CONTENT_FIELD);
            DocumentCodec::new(ContentField::from_name(content_field), params.ignore_invalid_documents)
        };

        Ok(Self {
            collection: database.get_collection(&params.collection_name),
            embedding: params.embedding,
            codec,
            options: params.options,
        })
    }

    pub fn collection_name(&self) -> &str {
        self.collection.name()
    }

    pub fn codec(&self) -> &DocumentCodec {
        &self.codec
    }

    pub fn options(&self) -> &StoreOptions {
        &self.options
    }

    /// Inserts documents in batches, returning their ids. Documents without
    /// an id get a random one.
    #[instrument(skip_all, fields(collection = %self.collection.name(), count = documents.len()))]
    pub async fn add_documents(&self, documents: Vec<Document>) -> Result<Vec<String>, StoreError> {
        if documents.is_empty() {
            return Ok(Vec::new());
        }

        let vectors = match (&self.embedding, &self.codec.content_field) {
            (_, ContentField::Vectorize) | (None, _) => None,
            (Some(embedding), ContentField::Field(_)) => {
                let texts: Vec<String> = documents.iter().map(|d| d.page_content.clone()).collect();
                Some(embedding.embed_documents(&texts).await?)
            }
        };
        if let Some(vectors) = &vectors {
            if vectors.len() != documents.len() {
                return Err(StoreError::InvalidDocument(format!(
                    "Expected {} embeddings, got {}",
                    documents.len(),
                    vectors.len()
                )));
            }
        }
        let mut vectors = vectors.map(Vec::into_iter);

        let mut ids = Vec::with_capacity(documents.len());
        let mut records = Vec::with_capacity(documents.len());
        for document in &documents {
            let id = document.id.clone().unwrap_or_else(|| Uuid::new_v4().simple().to_string());
            let vector = vectors.as_mut().and_then(|v| v.next());
            records.push(self.codec.encode(&id, document, vector));
            ids.push(id);
        }

        let mut inserted = Vec::with_capacity(ids.len());
        let mut records = records.into_iter().peekable();
        while records.peek().is_some() {
            let batch: Vec<Value> = records.by_ref().take(self.options.batch_size).collect();
            let batch_ids = self.collection.insert_many(batch, false).await?;
            inserted.extend(batch_ids.iter().map(crate::schema::value_to_text));
        }
        debug!(inserted = inserted.len(), "Documents added");
        Ok(inserted)
    }

    /// Runs a query search of the given kind.
    pub async fn search(
        &self,
        query: &str,
        search_type: SearchType,
        k: usize,
        score_threshold: f32,
        filter: Option<&Map<String, Value>>,
    ) -> Result<Vec<Document>, StoreError> {
        match search_type {
            SearchType::Similarity => Ok(self
                .similarity_search_with_score(query, k, filter)
                .await?
                .into_iter()
                .map(|(doc, _)| doc)
                .collect()),
            SearchType::SimilarityScoreThreshold => Ok(self
                .similarity_search_with_score(query, k, filter)
                .await?
                .into_iter()
                .filter(|(_, score)| *score >= score_threshold)
                .map(|(doc, _)| doc)
                .collect()),
            SearchType::Mmr => self.max_marginal_relevance_search(query, k, filter).await,
        }
    }

    #[instrument(skip(self, filter), fields(collection = %self.collection.name()))]
    pub async fn similarity_search_with_score(
        &self,
        query: &str,
        k: usize,
        filter: Option<&Map<String, Value>>,
    ) -> Result<Vec<(Document, f32)>, StoreError> {
        let (sort, _) = self.sort_for(query).await?;
        let result = self
            .collection
            .find(&FindQuery {
                filter: self.translate_filter(filter),
                sort: Some(sort),
                projection: Some(self.default_projection()),
                limit: Some(k),
                include_similarity: true,
                include_sort_vector: false,
            })
            .await?;

        Ok(self
            .decode_all(result.documents)?
            .into_iter()
            .map(|hit| {
                let score = hit.similarity.unwrap_or_default();
                (hit.document, score)
            })
            .collect())
    }

    /// Fetches `fetch_k` candidates and keeps `k` of them by maximal
    /// marginal relevance.
    #[instrument(skip(self, filter), fields(collection = %self.collection.name()))]
    pub async fn max_marginal_relevance_search(
        &self,
        query: &str,
        k: usize,
        filter: Option<&Map<String, Value>>,
    ) -> Result<Vec<Document>, StoreError> {
        let (sort, query_vector) = self.sort_for(query).await?;
        let result = self
            .collection
            .find(&FindQuery {
                filter: self.translate_filter(filter),
                sort: Some(sort),
                projection: Some(json!({"*": 1})),
                limit: Some(self.options.fetch_k.max(k)),
                include_similarity: false,
                include_sort_vector: query_vector.is_none(),
            })
            .await?;

        let query_vector = query_vector.or(result.sort_vector).ok_or_else(|| {
            StoreError::InvalidDocument("The query vector was not returned by the server".into())
        })?;
        let (vectors, documents): (Vec<Vec<f32>>, Vec<Document>) = self
            .decode_all(result.documents)?
            .into_iter()
            .filter_map(|hit| hit.vector.map(|vector| (vector, hit.document)))
            .unzip();

        let mut documents: Vec<Option<Document>> = documents.into_iter().map(Some).collect();
        Ok(maximal_marginal_relevance(&query_vector, &vectors, self.options.lambda_mult, k)
            .into_iter()
            .filter_map(|i| documents[i].take())
            .collect())
    }

    /// Returns up to `n` documents matching a metadata filter.
    #[instrument(skip(self, filter), fields(collection = %self.collection.name()))]
    pub async fn metadata_search(
        &self,
        filter: &Map<String, Value>,
        n: usize,
    ) -> Result<Vec<Document>, StoreError> {
        let result = self
            .collection
            .find(&FindQuery {
                filter: self.translate_filter(Some(filter)),
                projection: Some(self.default_projection()),
                limit: Some(n),
                ..Default::default()
            })
            .await?;
        Ok(self.decode_all(result.documents)?.into_iter().map(|hit| hit.document).collect())
    }

    /// Sort clause for a query, and the query vector when embedded locally.
    async fn sort_for(&self, query: &str) -> Result<(Value, Option<Vec<f32>>), StoreError> {
        match (&self.embedding, &self.codec.content_field) {
            (Some(embedding), ContentField::Field(_)) => {
                let vector = embedding.embed_query(query).await?;
                Ok((json!({"$vector": vector}), Some(vector)))
            }
            _ => Ok((json!({"$vectorize": query}), None)),
        }
    }

    fn default_projection(&self) -> Value {
        match self.codec.content_field {
            ContentField::Vectorize => json!({"*": 1}),
            ContentField::Field(_) => json!({"$vector": 0}),
        }
    }

    fn translate_filter(&self, filter: Option<&Map<String, Value>>) -> Option<Map<String, Value>> {
        filter
            .filter(|f| !f.is_empty())
            .map(|f| metadata_filter(f, self.codec.nested_metadata))
    }

    fn decode_all(&self, records: Vec<Value>) -> Result<Vec<StoredHit>, StoreError> {
        let mut hits = Vec::with_capacity(records.len());
        for record in records {
            if let Some(hit) = self.codec.decode(record)? {
                hits.push(hit);
            }
        }
        Ok(hits)
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
    use crate::vectorstores::{EmbedFuture, EmbeddingError};

    const KEYSPACE_PATH: &str = "/api/json/v1/default_keyspace";
    const COLLECTION_PATH: &str = "/api/json/v1/default_keyspace/docs";

    /// Embeds text as `[len, 1.0]`.
    struct LengthEmbeddings;

    impl Embeddings for LengthEmbeddings {
        fn embed_documents<'a>(&'a self, texts: &'a [String]) -> EmbedFuture<'a, Vec<Vec<f32>>> {
            Box::pin(async move {
                Ok::<_, EmbeddingError>(texts.iter().map(|t| vec![t.len() as f32, 1.0]).collect())
            })
        }

        fn embed_query<'a>(&'a self, text: &'a str) -> EmbedFuture<'a, Vec<f32>> {
            Box::pin(async move { Ok(vec![text.len() as f32, 1.0]) })
        }

        fn identifier(&self) -> String {
            "test:length".into()
        }
    }

    fn params(server: &MockServer) -> AstraDbStoreParams {
        AstraDbStoreParams {
            token: "AstraCS:test".into(),
            api_endpoint: server.uri(),
            collection_name: "docs".into(),
            autodetect_collection: true,
            ..Default::default()
        }
    }

    async fn mount_vectorize_collection(server: &MockServer) {
        Mock::given(method("POST"))
            .and(path(KEYSPACE_PATH))
            .and(body_json(json!({"findCollections": {"options": {"explain": true}}})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "status": {"collections": [{"name": "docs", "options": {"vector": {
                    "dimension": 1024,
                    "service": {"provider": "nvidia", "modelName": "NV-Embed-QA"}
                }}}]}
            })))
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn autodetect_opens_vectorize_collection() {
        let server = MockServer::start().await;
        mount_vectorize_collection(&server).await;
        Mock::given(method("POST"))
            .and(path(COLLECTION_PATH))
            .and(body_partial_json(json!({"find": {"options": {"limit": 10}}})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": {"documents": []}})))
            .mount(&server)
            .await;

        let store = AstraDbVectorStore::new(params(&server)).await.unwrap();
        assert_eq!(store.codec().content_field, ContentField::Vectorize);
        assert!(store.codec().nested_metadata);
    }

    #[tokio::test]
    async fn missing_collection_fails_autodetect() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(KEYSPACE_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": {"collections": []}})))
            .mount(&server)
            .await;

        let err = AstraDbVectorStore::new(params(&server)).await.unwrap_err();
        assert!(matches!(err, StoreError::Config(message) if message.contains("docs")));
    }

    #[tokio::test]
    async fn creates_collection_with_probed_dimension() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(KEYSPACE_PATH))
            .and(header("Token", "AstraCS:test"))
            .and(body_json(json!({"createCollection": {
                "name": "docs",
                "options": {"vector": {"dimension": 2}}
            }})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": {"ok": 1}})))
            .expect(1)
            .mount(&server)
            .await;

        let store = AstraDbVectorStore::new(AstraDbStoreParams {
            autodetect_collection: false,
            embedding: Some(Arc::new(LengthEmbeddings)),
            ..params(&server)
        })
        .await
        .unwrap();
        assert_eq!(store.codec().content_field, ContentField::Field("content".into()));
    }

    #[tokio::test]
    async fn creating_without_embeddings_is_rejected() {
        let server = MockServer::start().await;
        let err = AstraDbVectorStore::new(AstraDbStoreParams { autodetect_collection: false, ..params(&server) })
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Config(_)));
    }

    #[tokio::test]
    async fn adds_documents_in_batches() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(KEYSPACE_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": {"ok": 1}})))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path(COLLECTION_PATH))
            .and(body_partial_json(json!({"insertMany": {"options": {"ordered": false}}})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": {"insertedIds": ["x"]}})))
            .expect(3)
            .mount(&server)
            .await;

        let options = StoreOptions { batch_size: 1, dimension: Some(2), ..Default::default() };
        let store = AstraDbVectorStore::new(AstraDbStoreParams {
            autodetect_collection: false,
            embedding: Some(Arc::new(LengthEmbeddings)),
            options,
            ..params(&server)
        })
        .await
        .unwrap();

        let docs = vec![Document::new("a"), Document::new("bb"), Document::new("ccc").with_id("c")];
        let ids = store.add_documents(docs).await.unwrap();
        assert_eq!(ids, vec!["x", "x", "x"]);
        assert!(store.add_documents(Vec::new()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn score_threshold_keeps_matching_hits() {
        let server = MockServer::start().await;
        mount_vectorize_collection(&server).await;
        Mock::given(method("POST"))
            .and(path(COLLECTION_PATH))
            .and(body_partial_json(json!({"find": {"sort": {"$vectorize": "rust"}}})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": {"documents": [
                {"_id": "1", "$vectorize": "close", "$similarity": 0.9, "metadata": {}},
                {"_id": "2", "$vectorize": "far", "$similarity": 0.4, "metadata": {}}
            ]}})))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path(COLLECTION_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": {"documents": []}})))
            .mount(&server)
            .await;

        let store = AstraDbVectorStore::new(params(&server)).await.unwrap();
        let docs = store
            .search("rust", SearchType::SimilarityScoreThreshold, 4, 0.5, None)
            .await
            .unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].page_content, "close");

        let all = store.search("rust", SearchType::Similarity, 4, 0.5, None).await.unwrap();
        assert_eq!(all.len(), 2);
    }

    #[tokio::test]
    async fn mmr_uses_server_sort_vector() {
        let server = MockServer::start().await;
        mount_vectorize_collection(&server).await;
        Mock::given(method("POST"))
            .and(path(COLLECTION_PATH))
            .and(body_partial_json(json!({"find": {"options": {"includeSortVector": true, "limit": 20}}})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": {"documents": [
                    {"_id": "1", "$vectorize": "a", "$vector": [1.0, 0.0], "metadata": {}},
                    {"_id": "2", "$vectorize": "a again", "$vector": [0.99, 0.1], "metadata": {}},
                    {"_id": "3", "$vectorize": "b", "$vector": [0.6, 0.8], "metadata": {}}
                ]},
                "status": {"sortVector": [1.0, 0.0]}
            })))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path(COLLECTION_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": {"documents": []}})))
            .mount(&server)
            .await;

        let store = AstraDbVectorStore::new(params(&server)).await.unwrap();
        let docs = store.search("a", SearchType::Mmr, 2, 0.0, None).await.unwrap();
        let texts: Vec<&str> = docs.iter().map(|d| d.page_content.as_str()).collect();
        assert_eq!(texts, vec!["a", "b"]);
    }

    #[tokio::test]
    async fn metadata_search_prefixes_filter() {
        let server = MockServer::start().await;
        mount_vectorize_collection(&server).await;
        Mock::given(method("POST"))
            .and(path(COLLECTION_PATH))
            .and(body_partial_json(json!({"find": {"filter": {"metadata.source": "a"}, "options": {"limit": 3}}})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": {"documents": [
                {"_id": "1", "$vectorize": "from a", "metadata": {"source": "a"}}
            ]}})))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path(COLLECTION_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": {"documents": []}})))
            .mount(&server)
            .await;

        let store = AstraDbVectorStore::new(params(&server)).await.unwrap();
        let filter = json!({"source": "a"}).as_object().cloned().unwrap();
        let docs = store.metadata_search(&filter, 3).await.unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].metadata["source"], "a");
    }

    #[test]
    fn options_from_kwargs() {
        let kwargs = json!({"batch_size": 10, "fetch_k": 5, "unrelated": true});
        let options = StoreOptions::from_kwargs(kwargs.as_object().unwrap()).unwrap();
        assert_eq!(options.batch_size, 10);
        assert_eq!(options.fetch_k, 5);
        assert_eq!(options.lambda_mult, 0.5);

        let zero = json!({"batch_size": 0});
        assert!(StoreOptions::from_kwargs(zero.as_object().unwrap()).is_err());
    }
}
