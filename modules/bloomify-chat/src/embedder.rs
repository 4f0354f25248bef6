use ai_client::traits::EmbedAgent;
use ai_client::Gemini;
use anyhow::Result;

use crate::traits::TextEmbedder;

/// Gemini `embedContent` behind the dyn-compatible [`TextEmbedder`].
pub struct GeminiEmbedder {
    client: Gemini,
}

impl GeminiEmbedder {
    pub fn new(client: Gemini) -> Self {
        Self { client }
    }
}

#[async_trait::async_trait]
impl TextEmbedder for GeminiEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.client.embed(text.to_string()).await
    }
}
