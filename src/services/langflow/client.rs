use std::{collections::HashMap, env};

use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{error, info, span, Instrument, Level, Span};
use tracing_opentelemetry::OpenTelemetrySpanExt;

use crate::flow::{FlowRunError, FlowRunner, RunFlowRequest, RunFuture, RunOutputs, Tweaks};

const DEFAULT_BASE_URL: &str = "http://localhost:7860";

/// Settings for a [`LangflowClient`].
#[derive(Debug, Clone, Default)]
pub struct LangflowClientConfig {
    pub base_url: Option<String>,
    pub api_key: Option<String>,
    pub extra_headers: Option<HashMap<String, String>>,
}

impl LangflowClientConfig {
    /// Reads `LANGFLOW_BASE_URL` and `LANGFLOW_API_KEY`.
    pub fn from_env() -> Self {
        Self {
            base_url: env::var("LANGFLOW_BASE_URL").ok(),
            api_key: env::var("LANGFLOW_API_KEY").ok(),
            extra_headers: None,
        }
    }

    pub fn base_url(mut self, base_url: Option<impl Into<String>>) -> Self {
        self.base_url = base_url.map(|s| s.into());
        self
    }

    pub fn api_key(mut self, api_key: Option<impl Into<String>>) -> Self {
        self.api_key = api_key.map(|s| s.into());
        self
    }

    pub fn extra_headers(mut self, extra_headers: Option<HashMap<String, String>>) -> Self {
        self.extra_headers = extra_headers;
        self
    }

    pub fn build(self) -> Result<LangflowClient, FlowRunError> {
        LangflowClient::try_from(self)
    }
}

#[derive(Serialize, Debug)]
struct RunRequestBody<'a> {
    tweaks: &'a Tweaks,
    #[serde(skip_serializing_if = "Option::is_none")]
    session_id: Option<&'a str>,
}

#[derive(Deserialize, Debug)]
struct RunResponse {
    #[serde(default)]
    outputs: Vec<RunOutputs>,
}

/// Runs flows stored on a Langflow server through its REST API.
///
/// The server resolves the user from the API key, so `user_id` is only
/// recorded on the request span. A `run_id` is sent as the session id.
#[derive(Debug, Clone)]
pub struct LangflowClient {
    client: Client,
    base_url: String,
    api_key: Option<String>,
    extra_headers: HashMap<String, String>,
}

impl TryFrom<LangflowClientConfig> for LangflowClient {
    type Error = FlowRunError;

    fn try_from(cfg: LangflowClientConfig) -> Result<Self, Self::Error> {
        let base_url = cfg.base_url.unwrap_or_else(|| DEFAULT_BASE_URL.into());
        if !base_url.starts_with("http://") && !base_url.starts_with("https://") {
            return Err(FlowRunError::Config(format!("Invalid Langflow base URL: {base_url}")));
        }
        Ok(Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: cfg.api_key.filter(|k| !k.is_empty()),
            extra_headers: cfg.extra_headers.unwrap_or_default(),
        })
    }
}

impl LangflowClient {
    pub fn from_env() -> Result<Self, FlowRunError> {
        LangflowClientConfig::from_env().build()
    }

    async fn run(&self, request: RunFlowRequest) -> Result<Vec<RunOutputs>, FlowRunError> {
        let flow_id = request.flow_id.as_deref().ok_or(FlowRunError::MissingFlowId)?;
        let url = format!("{}/api/v1/run/{flow_id}", self.base_url);

        let span = span!(
            Level::INFO,
            "Langflow run",
            "http.request.method" = "POST",
            "url.full" = url.as_str(),
            flow_id,
            user_id = request.user_id.as_deref(),
            run_id = request.run_id.as_deref(),
        );

        async {
            let mut builder = self
                .client
                .post(&url)
                .query(&[("stream", "false")])
                .json(&RunRequestBody {
                    tweaks: &request.tweaks,
                    session_id: request.run_id.as_deref(),
                });
            if let Some(key) = &self.api_key {
                builder = builder.header("x-api-key", key);
            }
            for (name, value) in &self.extra_headers {
                builder = builder.header(name, value);
            }

            let response = builder.send().await?;
            let status = response.status();
            Span::current().set_attribute("http.response.status_code", status.as_u16() as i64);

            if !status.is_success() {
                let message = response.text().await.unwrap_or_else(|_| "Failed to read error body".into());
                error!(%status, body = %message, "flow run failed");
                Span::current().set_status(opentelemetry::trace::Status::Error {
                    description: format!("HTTP {status}").into(),
                });
                return Err(FlowRunError::Api { status: status.as_u16(), message });
            }

            let text = response.text().await?;
            let parsed: RunResponse = serde_json::from_str(&text).map_err(|e| {
                error!(%e, raw = %text, "deserialization error");
                FlowRunError::Serialization(format!("{e}. Raw JSON was: '{text}'"))
            })?;
            info!(runs = parsed.outputs.len(), "flow run finished");
            Ok(parsed.outputs)
        }
        .instrument(span)
        .await
    }
}

impl FlowRunner for LangflowClient {
    fn run_flow(&self, request: RunFlowRequest) -> RunFuture<'_> {
        Box::pin(self.run(request))
    }
}
