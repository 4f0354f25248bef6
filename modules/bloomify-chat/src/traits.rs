// Collaborator seams for the chat core.
//
// SessionStore: per-session slots plus append-only message history.
// Catalog: product and knowledge retrieval (vector + price queries).
// TextEmbedder: text → fixed-dimension vector.
// AiLogSink: best-effort audit trail of model calls.
// ResponseCache: keyed generation cache with TTL and hit counting.
//
// Generation goes through `ai_client::GenerateAgent` directly.
//
// PgStore implements the store-backed traits; `testing` has in-memory mocks.

use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;

use bloomify_common::{
    CandidateProduct, ChatMessage, ChatRole, Occasion, ScoredProduct, SessionId, SlotUpdate, Slots,
};

use crate::ai_log::AiLogEntry;

// ---------------------------------------------------------------------------
// SessionStore
// ---------------------------------------------------------------------------

#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Persist an empty session and return its id.
    async fn create_session(&self) -> Result<SessionId>;

    /// Persisted slots, or all-`None` slots for an unknown session.
    async fn load_slots(&self, session: &SessionId) -> Result<Slots>;

    /// Load, merge with [`merge_slots`](crate::session::merge_slots) and save
    /// as one atomic step per session. Returns the merged slots.
    async fn merge_and_save(&self, session: &SessionId, update: &SlotUpdate) -> Result<Slots>;

    async fn append_message(&self, session: &SessionId, role: ChatRole, content: &str)
        -> Result<()>;

    /// The most recent `limit` messages, oldest first.
    async fn recent_messages(&self, session: &SessionId, limit: usize) -> Result<Vec<ChatMessage>>;
}

// ---------------------------------------------------------------------------
// Catalog
// ---------------------------------------------------------------------------

#[async_trait]
pub trait Catalog: Send + Sync {
    /// Ranked by similarity, constrained by occasion and maximum price.
    async fn similar_products(
        &self,
        embedding: &[f32],
        occasion: Option<Occasion>,
        max_price: Option<f64>,
        limit: usize,
    ) -> Result<Vec<CandidateProduct>>;

    /// Ascending by price. `occasion` admits products tagged with it and
    /// untagged products.
    async fn cheapest_products(
        &self,
        occasion: Option<Occasion>,
        max_price: Option<f64>,
        limit: usize,
    ) -> Result<Vec<CandidateProduct>>;

    /// Store knowledge snippets, most similar first.
    async fn similar_knowledge(&self, embedding: &[f32], limit: usize) -> Result<Vec<String>>;

    /// A slice of the catalog ordered by slug.
    async fn list_products(&self, limit: usize) -> Result<Vec<CandidateProduct>>;

    /// Products with any of the given slugs. Unknown slugs are skipped.
    async fn products_by_slugs(&self, slugs: &[String]) -> Result<Vec<CandidateProduct>>;

    /// Unconstrained semantic search with similarity scores in 0..1.
    async fn search_products(
        &self,
        embedding: &[f32],
        k: usize,
        max_price: Option<f64>,
    ) -> Result<Vec<ScoredProduct>>;
}

// ---------------------------------------------------------------------------
// TextEmbedder
// ---------------------------------------------------------------------------

#[async_trait]
pub trait TextEmbedder: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;
}

// ---------------------------------------------------------------------------
// AiLogSink
// ---------------------------------------------------------------------------

#[async_trait]
pub trait AiLogSink: Send + Sync {
    async fn record(&self, entry: &AiLogEntry) -> Result<()>;
}

// ---------------------------------------------------------------------------
// ResponseCache
// ---------------------------------------------------------------------------

/// A generation to remember under `key`.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry {
    pub key: String,
    pub route: String,
    pub model: String,
    pub input: serde_json::Value,
    pub output: String,
}

#[async_trait]
pub trait ResponseCache: Send + Sync {
    /// Cached output younger than `max_age`. A hit bumps the entry's hit count.
    async fn get(&self, key: &str, max_age: Duration) -> Result<Option<String>>;

    /// Insert or replace the entry for `entry.key`.
    async fn put(&self, entry: &CacheEntry) -> Result<()>;
}
