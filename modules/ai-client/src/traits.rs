use anyhow::Result;
use async_trait::async_trait;

// =============================================================================
// Generation options
// =============================================================================

/// Sampling knobs forwarded to the provider with every generation call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GenerationConfig {
    pub temperature: Option<f32>,
    pub max_output_tokens: Option<u32>,
    /// Ask the provider for a specific response MIME type
    /// (e.g. `application/json`).
    pub response_mime_type: Option<String>,
}

impl GenerationConfig {
    pub fn temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn max_output_tokens(mut self, tokens: u32) -> Self {
        self.max_output_tokens = Some(tokens);
        self
    }

    pub fn json(mut self) -> Self {
        self.response_mime_type = Some("application/json".to_string());
        self
    }
}

// =============================================================================
// GenerateAgent Trait
// =============================================================================

#[async_trait]
pub trait GenerateAgent: Send + Sync {
    /// Model identifier used for generation.
    fn model(&self) -> &str;

    /// Single-shot, non-streaming generation. Returns the first candidate's text.
    async fn generate(&self, prompt: &str, config: &GenerationConfig) -> Result<String>;
}

// =============================================================================
// EmbedAgent Trait
// =============================================================================

#[async_trait]
pub trait EmbedAgent: Send + Sync {
    async fn embed(&self, text: impl Into<String> + Send) -> Result<Vec<f32>>;
}
