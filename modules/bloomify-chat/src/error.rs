use std::fmt;
use std::future::Future;
use std::time::Duration;

use serde::Serialize;
use thiserror::Error;

use bloomify_common::BloomifyError;

/// Pipeline step that can abort a request.
///
/// Chat turns run `PersistUserMessage` through `PersistAssistantMessage`.
/// Card, recommendation and search requests reuse the embedding and model
/// steps next to their own. Slot load, merge and persist are one atomic store call
/// reported as `MergeSlots`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnStage {
    CreateSession,
    PersistUserMessage,
    MergeSlots,
    LoadHistory,
    EmbedQuery,
    RetrieveCandidates,
    LoadKnowledge,
    InvokeModel,
    PersistAssistantMessage,
    ReadCache,
    WriteCache,
    SearchCatalog,
    LoadCatalog,
}

impl TurnStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            TurnStage::CreateSession => "create_session",
            TurnStage::PersistUserMessage => "persist_user_message",
            TurnStage::MergeSlots => "merge_slots",
            TurnStage::LoadHistory => "load_history",
            TurnStage::EmbedQuery => "embed_query",
            TurnStage::RetrieveCandidates => "retrieve_candidates",
            TurnStage::LoadKnowledge => "load_knowledge",
            TurnStage::InvokeModel => "invoke_model",
            TurnStage::PersistAssistantMessage => "persist_assistant_message",
            TurnStage::ReadCache => "read_cache",
            TurnStage::WriteCache => "write_cache",
            TurnStage::SearchCatalog => "search_catalog",
            TurnStage::LoadCatalog => "load_catalog",
        }
    }

    /// Whether the stage talks to the database rather than the AI provider.
    pub fn is_store(&self) -> bool {
        !matches!(self, TurnStage::EmbedQuery | TurnStage::InvokeModel)
    }
}

impl fmt::Display for TurnStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
pub enum TurnError {
    /// Rejected before any side effect.
    #[error("{0}")]
    Validation(String),

    #[error("{stage} failed: {source}")]
    Stage {
        stage: TurnStage,
        #[source]
        source: anyhow::Error,
    },

    #[error("{stage} timed out after {after:?}")]
    Timeout { stage: TurnStage, after: Duration },
}

impl TurnError {
    pub fn stage(&self) -> Option<TurnStage> {
        match self {
            TurnError::Validation(_) => None,
            TurnError::Stage { stage, .. } | TurnError::Timeout { stage, .. } => Some(*stage),
        }
    }
}

impl From<BloomifyError> for TurnError {
    fn from(e: BloomifyError) -> Self {
        TurnError::Validation(match e {
            BloomifyError::Validation(msg) => msg,
            other => other.to_string(),
        })
    }
}

/// Run one collaborator call under a deadline, tagging failures with `stage`.
pub(crate) async fn run_stage<T, F>(
    stage: TurnStage,
    after: Duration,
    fut: F,
) -> Result<T, TurnError>
where
    F: Future<Output = anyhow::Result<T>>,
{
    match tokio::time::timeout(after, fut).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(source)) => Err(TurnError::Stage { stage, source }),
        Err(_) => Err(TurnError::Timeout { stage, after }),
    }
}
