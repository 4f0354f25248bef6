mod client;
pub(crate) mod types;

use crate::traits::{EmbedAgent, GenerateAgent, GenerationConfig};
use anyhow::Result;
use async_trait::async_trait;

use client::GeminiClient;

// =============================================================================
// Gemini Agent
// =============================================================================

#[derive(Clone)]
pub struct Gemini {
    api_key: String,
    pub(crate) model: String,
    embedding_model: String,
    base_url: Option<String>,
    http: reqwest::Client,
}

impl Gemini {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: model.into(),
            embedding_model: "text-embedding-004".to_string(),
            base_url: None,
            http: reqwest::Client::new(),
        }
    }

    pub fn with_embedding_model(mut self, model: impl Into<String>) -> Self {
        self.embedding_model = model.into();
        self
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Use a pre-configured HTTP client (timeouts, proxies, connection pool).
    pub fn with_http_client(mut self, http: reqwest::Client) -> Self {
        self.http = http;
        self
    }

    pub(crate) fn client(&self) -> GeminiClient {
        let client = GeminiClient::new(&self.api_key, self.http.clone());
        if let Some(ref url) = self.base_url {
            client.with_base_url(url)
        } else {
            client
        }
    }
}

// =============================================================================
// GenerateAgent Implementation
// =============================================================================

#[async_trait]
impl GenerateAgent for Gemini {
    fn model(&self) -> &str {
        &self.model
    }

    async fn generate(&self, prompt: &str, config: &GenerationConfig) -> Result<String> {
        let request = types::GenerateRequest::single(prompt, config);
        self.client().generate(&self.model, &request).await
    }
}

// =============================================================================
// EmbedAgent Implementation
// =============================================================================

#[async_trait]
impl EmbedAgent for Gemini {
    async fn embed(&self, text: impl Into<String> + Send) -> Result<Vec<f32>> {
        self.client()
            .embed(&self.embedding_model, &text.into())
            .await
    }
}
