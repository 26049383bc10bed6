use std::fmt;

use reqwest::{Client, RequestBuilder};
use serde_json::{json, Map, Value};
use tracing::{debug, error, span, Instrument, Level, Span};
use tracing_opentelemetry::OpenTelemetrySpanExt;

use super::{
    endpoint::{build_api_endpoint, Environment},
    errors::DataApiError,
    models::{AstraDatabase, CollectionDescriptor, CollectionOptions, CommandResponse, FindQuery, FindResult},
};

pub const DEFAULT_KEYSPACE: &str = "default_keyspace";
const DATA_API_PATH: &str = "api/json/v1";

/// Settings for a [`DataApiClient`].
#[derive(Debug, Clone, Default)]
pub struct DataApiClientConfig {
    pub token: Option<String>,
    pub environment: Option<Environment>,
    /// Overrides the DevOps API base URL derived from the environment.
    pub devops_url: Option<String>,
    /// `(name, version)` pairs reported in the user agent.
    pub callers: Vec<(String, String)>,
}

impl DataApiClientConfig {
    pub fn token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    pub fn environment(mut self, environment: Option<Environment>) -> Self {
        self.environment = environment;
        self
    }

    pub fn devops_url(mut self, devops_url: Option<impl Into<String>>) -> Self {
        self.devops_url = devops_url.map(Into::into);
        self
    }

    pub fn caller(mut self, name: impl Into<String>, version: impl Into<String>) -> Self {
        self.callers.push((name.into(), version.into()));
        self
    }

    pub fn build(self) -> Result<DataApiClient, DataApiError> {
        DataApiClient::try_from(self)
    }
}

/// Token-scoped entry point to Astra DB.
#[derive(Clone)]
pub struct DataApiClient {
    http: Client,
    token: String,
    environment: Environment,
    devops_url: String,
    user_agent: String,
}

impl fmt::Debug for DataApiClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DataApiClient")
            .field("environment", &self.environment)
            .field("devops_url", &self.devops_url)
            .field("user_agent", &self.user_agent)
            .field("token", &"<redacted>")
            .finish()
    }
}

impl TryFrom<DataApiClientConfig> for DataApiClient {
    type Error = DataApiError;

    fn try_from(cfg: DataApiClientConfig) -> Result<Self, Self::Error> {
        let token = cfg
            .token
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| DataApiError::Config("Astra DB requires an application token".into()))?;
        let environment = cfg.environment.unwrap_or_default();

        let mut user_agent: Vec<String> =
            cfg.callers.iter().map(|(name, version)| format!("{name}/{version}")).collect();
        user_agent.push(format!("{}/{}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION")));

        Ok(Self {
            http: Client::new(),
            token,
            environment,
            devops_url: cfg
                .devops_url
                .unwrap_or_else(|| environment.devops_url().to_string())
                .trim_end_matches('/')
                .to_string(),
            user_agent: user_agent.join(" "),
        })
    }
}

impl DataApiClient {
    pub fn environment(&self) -> Environment {
        self.environment
    }

    pub fn get_admin(&self) -> AstraDbAdmin {
        AstraDbAdmin { client: self.clone() }
    }

    /// Handle on the database served at `api_endpoint`. No request is made.
    pub fn get_database(&self, api_endpoint: &str, keyspace: Option<&str>) -> Database {
        Database {
            client: self.clone(),
            api_endpoint: api_endpoint.trim_end_matches('/').to_string(),
            keyspace: keyspace.unwrap_or(DEFAULT_KEYSPACE).to_string(),
        }
    }

    async fn send<R>(&self, name: &str, url: &str, request: RequestBuilder) -> Result<R, DataApiError>
    where
        R: serde::de::DeserializeOwned,
    {
        let span = span!(
            Level::DEBUG,
            "Astra DB HTTP request",
            "otel.name" = name,
            "url.full" = url,
        );

        async {
            let response = request
                .header(reqwest::header::USER_AGENT, &self.user_agent)
                .send()
                .await
                .map_err(|e| {
                    Span::current().set_status(opentelemetry::trace::Status::Error {
                        description: e.to_string().into(),
                    });
                    DataApiError::Request(e)
                })?;

            let status = response.status();
            Span::current().set_attribute("http.response.status_code", status.as_u16() as i64);

            let body = response.text().await?;
            if !status.is_success() {
                error!(%status, body = %body, "Astra DB request failed");
                Span::current().set_status(opentelemetry::trace::Status::Error {
                    description: format!("HTTP {status}").into(),
                });
                return Err(DataApiError::Api { status: status.as_u16(), message: body });
            }

            serde_json::from_str::<R>(&body).map_err(|e| {
                error!(%e, raw = %body, "deserialization error");
                DataApiError::Serialization(format!(
                    "Error decoding response body: {e}. Raw JSON was: '{body}'"
                ))
            })
        }
        .instrument(span)
        .await
    }

    async fn command(&self, url: &str, command: &Value) -> Result<CommandResponse, DataApiError> {
        let name = command
            .as_object()
            .and_then(|c| c.keys().next())
            .map(String::as_str)
            .unwrap_or("command");
        debug!(command = name, url, "sending Data API command");

        let request = self.http.post(url).header("Token", &self.token).json(command);
        let response: CommandResponse = self.send(name, url, request).await?;
        if !response.errors.is_empty() {
            return Err(DataApiError::Command(response.errors.iter().map(|e| e.describe()).collect()));
        }
        Ok(response)
    }
}

/// Organisation-level operations (DevOps API).
#[derive(Debug, Clone)]
pub struct AstraDbAdmin {
    client: DataApiClient,
}

impl AstraDbAdmin {
    /// Databases that are not terminated, across all cloud providers.
    pub async fn list_databases(&self) -> Result<Vec<AstraDatabase>, DataApiError> {
        let url = format!("{}/v2/databases", self.client.devops_url);
        let request = self
            .client
            .http
            .get(&url)
            .query(&[("include", "nonterminated"), ("provider", "ALL"), ("limit", "1000")])
            .bearer_auth(&self.client.token);
        self.client.send("listDatabases", &url, request).await
    }

    /// Data API endpoint of a listed database in the client's environment.
    pub fn database_endpoint(&self, database: &AstraDatabase) -> String {
        build_api_endpoint(&database.id, &database.info.region, self.client.environment)
    }
}

/// A keyspace of a database, reached through its Data API endpoint.
#[derive(Debug, Clone)]
pub struct Database {
    client: DataApiClient,
    api_endpoint: String,
    keyspace: String,
}

impl Database {
    pub fn api_endpoint(&self) -> &str {
        &self.api_endpoint
    }

    pub fn keyspace(&self) -> &str {
        &self.keyspace
    }

    fn url(&self) -> String {
        format!("{}/{DATA_API_PATH}/{}", self.api_endpoint, self.keyspace)
    }

    pub async fn list_collection_names(&self) -> Result<Vec<String>, DataApiError> {
        let response = self.client.command(&self.url(), &json!({"findCollections": {}})).await?;
        status_field(response.status, "collections")
    }

    pub async fn list_collections(&self) -> Result<Vec<CollectionDescriptor>, DataApiError> {
        let command = json!({"findCollections": {"options": {"explain": true}}});
        let response = self.client.command(&self.url(), &command).await?;
        status_field(response.status, "collections")
    }

    pub async fn create_collection(
        &self,
        name: &str,
        options: &CollectionOptions,
    ) -> Result<Collection, DataApiError> {
        let options = serde_json::to_value(options).map_err(|e| DataApiError::Serialization(e.to_string()))?;
        let command = json!({"createCollection": {"name": name, "options": options}});
        self.client.command(&self.url(), &command).await?;
        Ok(self.get_collection(name))
    }

    /// Handle on a collection. No request is made.
    pub fn get_collection(&self, name: &str) -> Collection {
        Collection {
            client: self.client.clone(),
            url: format!("{}/{name}", self.url()),
            name: name.to_string(),
        }
    }
}

/// A collection of JSON documents.
#[derive(Debug, Clone)]
pub struct Collection {
    client: DataApiClient,
    url: String,
    name: String,
}

impl Collection {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub async fn estimated_document_count(&self) -> Result<u64, DataApiError> {
        let response = self.client.command(&self.url, &json!({"estimatedDocumentCount": {}})).await?;
        status_field(response.status, "count")
    }

    /// Inserts documents and returns the ids the server assigned or kept.
    pub async fn insert_many(&self, documents: Vec<Value>, ordered: bool) -> Result<Vec<Value>, DataApiError> {
        let command = json!({"insertMany": {"documents": documents, "options": {"ordered": ordered}}});
        let response = self.client.command(&self.url, &command).await?;
        status_field(response.status, "insertedIds")
    }

    pub async fn find(&self, query: &FindQuery) -> Result<FindResult, DataApiError> {
        let response = self.client.command(&self.url, &query.to_command()).await?;
        let sort_vector = response
            .status
            .as_ref()
            .and_then(|s| s.get("sortVector"))
            .and_then(|v| serde_json::from_value(v.clone()).ok());
        Ok(FindResult {
            documents: response.data.map(|d| d.documents).unwrap_or_default(),
            sort_vector,
        })
    }
}

fn status_field<T>(status: Option<Map<String, Value>>, field: &str) -> Result<T, DataApiError>
where
    T: serde::de::DeserializeOwned,
{
    let value = status
        .and_then(|mut s| s.remove(field))
        .ok_or_else(|| DataApiError::Serialization(format!("Response status has no '{field}'")))?;
    serde_json::from_value(value).map_err(|e| DataApiError::Serialization(e.to_string()))
}
