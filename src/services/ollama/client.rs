use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{error, instrument};

use crate::vectorstores::{EmbedFuture, EmbeddingError, Embeddings};

#[derive(Serialize, Debug)]
struct EmbedRequest<'a> {
    model: &'a str,
    input: &'a [String],
    #[serde(skip_serializing_if = "Option::is_none")]
    keep_alive: Option<&'a str>,
}

/// Response from the `/api/embed` endpoint.
#[derive(Deserialize, Debug)]
struct EmbedResponse {
    embeddings: Vec<Vec<f32>>,
}

/// Client-side embeddings computed by an Ollama server.
#[derive(Debug, Clone)]
pub struct OllamaEmbeddings {
    client: Client,
    base_url: String,
    model: String,
    keep_alive: Option<String>,
}

impl OllamaEmbeddings {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: "http://localhost:11434".into(),
            model: model.into(),
            keep_alive: None,
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_keep_alive(mut self, keep_alive: impl Into<String>) -> Self {
        self.keep_alive = Some(keep_alive.into());
        self
    }

    #[instrument(skip(self, input), fields(model = %self.model, count = input.len()))]
    async fn embed(&self, input: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        let url = format!("{}/api/embed", self.base_url);
        let request = EmbedRequest { model: &self.model, input, keep_alive: self.keep_alive.as_deref() };

        let response = self.client.post(&url).json(&request).send().await?;
        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_else(|_| "Failed to read error body".into());
            error!(%status, body = %message, "embedding request failed");
            return Err(EmbeddingError::Api { status: status.as_u16(), message });
        }

        let parsed: EmbedResponse = response.json().await?;
        if parsed.embeddings.len() != input.len() {
            return Err(EmbeddingError::InvalidResponse(format!(
                "expected {} embeddings, got {}",
                input.len(),
                parsed.embeddings.len()
            )));
        }
        Ok(parsed.embeddings)
    }
}

impl Embeddings for OllamaEmbeddings {
    fn embed_documents<'a>(&'a self, texts: &'a [String]) -> EmbedFuture<'a, Vec<Vec<f32>>> {
        Box::pin(self.embed(texts))
    }

    fn embed_query<'a>(&'a self, text: &'a str) -> EmbedFuture<'a, Vec<f32>> {
        Box::pin(async move {
            let mut vectors = self.embed(&[text.to_string()]).await?;
            vectors
                .pop()
                .ok_or_else(|| EmbeddingError::InvalidResponse("no embedding returned".into()))
        })
    }

    fn identifier(&self) -> String {
        format!("ollama:{}@{}", self.model, self.base_url)
    }
}
