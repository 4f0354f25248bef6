use std::sync::Arc;

use ai_client::GenerateAgent;
use bloomify_common::FileConfig;

use crate::traits::{AiLogSink, Catalog, ResponseCache, SessionStore, TextEmbedder};

/// Collaborators shared by the chat, card and search services.
#[derive(Clone)]
pub struct ChatDeps {
    pub sessions: Arc<dyn SessionStore>,
    pub catalog: Arc<dyn Catalog>,
    pub embedder: Arc<dyn TextEmbedder>,
    pub generator: Arc<dyn GenerateAgent>,
    pub ai_log: Arc<dyn AiLogSink>,
    pub cache: Arc<dyn ResponseCache>,
    pub file_config: Arc<FileConfig>,
}

impl ChatDeps {
    pub fn new(
        sessions: Arc<dyn SessionStore>,
        catalog: Arc<dyn Catalog>,
        embedder: Arc<dyn TextEmbedder>,
        generator: Arc<dyn GenerateAgent>,
        ai_log: Arc<dyn AiLogSink>,
        cache: Arc<dyn ResponseCache>,
        file_config: Arc<FileConfig>,
    ) -> Self {
        Self {
            sessions,
            catalog,
            embedder,
            generator,
            ai_log,
            cache,
            file_config,
        }
    }
}
