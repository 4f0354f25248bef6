// Test mocks for the chat core.
//
// One mock per collaborator seam:
// - MockSessionStore (SessionStore): in-memory slots and message log
// - MockCatalog (Catalog): scripted similarity results, price-sorted catalog
// - FixedEmbedder (TextEmbedder): deterministic hash-based vectors
// - ScriptedGenerator (GenerateAgent): queued replies, records prompts
// - RecordingAiLog (AiLogSink): captures log entries
// - MemoryCache (ResponseCache): HashMap with creation instants
//
// Plus `MockDeps` to wire them into a `ChatDeps`, and small fixtures.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use ai_client::{GenerateAgent, GenerationConfig};
use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use uuid::Uuid;

use bloomify_common::{
    CandidateProduct, ChatMessage, ChatRole, FileConfig, Occasion, ScoredProduct, SessionId,
    SlotUpdate, Slots,
};

use crate::ai_log::AiLogEntry;
use crate::deps::ChatDeps;
use crate::session::merge_slots;
use crate::traits::{AiLogSink, CacheEntry, Catalog, ResponseCache, SessionStore, TextEmbedder};

/// Standard embedding dimension for test vectors.
pub const TEST_EMBEDDING_DIM: usize = 8;

/// Candidate product with a fresh id.
pub fn product(slug: &str, name: &str, price: f64) -> CandidateProduct {
    CandidateProduct {
        id: Uuid::new_v4(),
        slug: slug.to_string(),
        name: name.to_string(),
        price,
        image_url: None,
    }
}

/// Search hit with a fresh id.
pub fn scored_product(slug: &str, name: &str, similarity: f64) -> ScoredProduct {
    ScoredProduct {
        id: Uuid::new_v4(),
        slug: slug.to_string(),
        name: name.to_string(),
        description: None,
        price: 100_000.0,
        image_url: None,
        similarity,
    }
}

// ---------------------------------------------------------------------------
// MockSessionStore
// ---------------------------------------------------------------------------

/// Store operation a [`MockSessionStore`] can be told to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreOp {
    CreateSession,
    AppendUserMessage,
    AppendAssistantMessage,
    MergeSlots,
    RecentMessages,
}

#[derive(Default)]
struct SessionInner {
    slots: HashMap<String, Slots>,
    messages: HashMap<String, Vec<ChatMessage>>,
    fail_on: Option<StoreOp>,
}

/// Sessions are created lazily on first write, like the Postgres store.
#[derive(Default)]
pub struct MockSessionStore {
    inner: Mutex<SessionInner>,
}

impl MockSessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_slots(self, session: &str, slots: Slots) -> Self {
        self.inner
            .lock()
            .unwrap()
            .slots
            .insert(session.to_string(), slots);
        self
    }

    pub fn with_messages(self, session: &str, messages: Vec<ChatMessage>) -> Self {
        self.inner
            .lock()
            .unwrap()
            .messages
            .insert(session.to_string(), messages);
        self
    }

    pub fn failing_on(self, op: StoreOp) -> Self {
        self.inner.lock().unwrap().fail_on = Some(op);
        self
    }

    pub fn slots(&self, session: &str) -> Option<Slots> {
        self.inner.lock().unwrap().slots.get(session).cloned()
    }

    pub fn messages(&self, session: &str) -> Vec<ChatMessage> {
        self.inner
            .lock()
            .unwrap()
            .messages
            .get(session)
            .cloned()
            .unwrap_or_default()
    }

    pub fn session_count(&self) -> usize {
        self.inner.lock().unwrap().slots.len()
    }

    fn check(&self, op: StoreOp) -> Result<()> {
        if self.inner.lock().unwrap().fail_on == Some(op) {
            bail!("MockSessionStore: {op:?} unavailable");
        }
        Ok(())
    }
}

#[async_trait]
impl SessionStore for MockSessionStore {
    async fn create_session(&self) -> Result<SessionId> {
        self.check(StoreOp::CreateSession)?;
        let id = SessionId::generate();
        self.inner
            .lock()
            .unwrap()
            .slots
            .insert(id.to_string(), Slots::default());
        Ok(id)
    }

    async fn load_slots(&self, session: &SessionId) -> Result<Slots> {
        Ok(self.slots(session.as_str()).unwrap_or_default())
    }

    async fn merge_and_save(&self, session: &SessionId, update: &SlotUpdate) -> Result<Slots> {
        self.check(StoreOp::MergeSlots)?;
        let mut inner = self.inner.lock().unwrap();
        let entry = inner.slots.entry(session.to_string()).or_default();
        *entry = merge_slots(entry, update);
        Ok(entry.clone())
    }

    async fn append_message(
        &self,
        session: &SessionId,
        role: ChatRole,
        content: &str,
    ) -> Result<()> {
        self.check(match role {
            ChatRole::User => StoreOp::AppendUserMessage,
            ChatRole::Assistant => StoreOp::AppendAssistantMessage,
        })?;
        let mut inner = self.inner.lock().unwrap();
        inner.slots.entry(session.to_string()).or_default();
        inner
            .messages
            .entry(session.to_string())
            .or_default()
            .push(ChatMessage {
                role,
                content: content.to_string(),
            });
        Ok(())
    }

    async fn recent_messages(&self, session: &SessionId, limit: usize) -> Result<Vec<ChatMessage>> {
        self.check(StoreOp::RecentMessages)?;
        let all = self.messages(session.as_str());
        let skip = all.len().saturating_sub(limit);
        Ok(all.into_iter().skip(skip).collect())
    }
}

// ---------------------------------------------------------------------------
// MockCatalog
// ---------------------------------------------------------------------------

/// Arguments of one price/similarity query.
#[derive(Debug, Clone, PartialEq)]
pub struct CatalogCall {
    pub occasion: Option<Occasion>,
    pub max_price: Option<f64>,
    pub limit: usize,
}

/// `similar_products` returns the scripted list; `cheapest_products` sorts
/// the whole catalog by price and applies the ceiling (occasion tags are
/// not modelled, every product counts as untagged). Listing and slug lookups
/// read the same catalog.
#[derive(Default)]
pub struct MockCatalog {
    products: Vec<CandidateProduct>,
    similar: Vec<CandidateProduct>,
    knowledge: Vec<String>,
    knowledge_fails: bool,
    listing_fails: bool,
    search_hits: Vec<ScoredProduct>,
    list_calls: Mutex<Vec<usize>>,
    similar_calls: Mutex<Vec<CatalogCall>>,
    cheapest_calls: Mutex<Vec<CatalogCall>>,
    search_calls: Mutex<Vec<CatalogCall>>,
}

impl MockCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_products(mut self, products: Vec<CandidateProduct>) -> Self {
        self.products = products;
        self
    }

    pub fn on_similar(mut self, products: Vec<CandidateProduct>) -> Self {
        self.similar = products;
        self
    }

    pub fn with_knowledge(mut self, snippets: Vec<&str>) -> Self {
        self.knowledge = snippets.into_iter().map(str::to_string).collect();
        self
    }

    pub fn failing_knowledge(mut self) -> Self {
        self.knowledge_fails = true;
        self
    }

    /// `list_products` and `products_by_slugs` error.
    pub fn failing_listing(mut self) -> Self {
        self.listing_fails = true;
        self
    }

    pub fn on_search(mut self, hits: Vec<ScoredProduct>) -> Self {
        self.search_hits = hits;
        self
    }

    pub fn similar_calls(&self) -> Vec<CatalogCall> {
        self.similar_calls.lock().unwrap().clone()
    }

    pub fn cheapest_calls(&self) -> Vec<CatalogCall> {
        self.cheapest_calls.lock().unwrap().clone()
    }

    pub fn search_calls(&self) -> Vec<CatalogCall> {
        self.search_calls.lock().unwrap().clone()
    }

    /// Limits passed to `list_products`, in call order.
    pub fn list_calls(&self) -> Vec<usize> {
        self.list_calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl Catalog for MockCatalog {
    async fn similar_products(
        &self,
        _embedding: &[f32],
        occasion: Option<Occasion>,
        max_price: Option<f64>,
        limit: usize,
    ) -> Result<Vec<CandidateProduct>> {
        self.similar_calls.lock().unwrap().push(CatalogCall {
            occasion,
            max_price,
            limit,
        });
        Ok(self.similar.iter().take(limit).cloned().collect())
    }

    async fn cheapest_products(
        &self,
        occasion: Option<Occasion>,
        max_price: Option<f64>,
        limit: usize,
    ) -> Result<Vec<CandidateProduct>> {
        self.cheapest_calls.lock().unwrap().push(CatalogCall {
            occasion,
            max_price,
            limit,
        });
        let mut pool: Vec<CandidateProduct> = self
            .products
            .iter()
            .filter(|p| max_price.map_or(true, |ceiling| p.price <= ceiling))
            .cloned()
            .collect();
        pool.sort_by(|a, b| a.price.total_cmp(&b.price));
        pool.truncate(limit);
        Ok(pool)
    }

    async fn similar_knowledge(&self, _embedding: &[f32], limit: usize) -> Result<Vec<String>> {
        if self.knowledge_fails {
            bail!("MockCatalog: knowledge base unavailable");
        }
        Ok(self.knowledge.iter().take(limit).cloned().collect())
    }

    async fn list_products(&self, limit: usize) -> Result<Vec<CandidateProduct>> {
        self.list_calls.lock().unwrap().push(limit);
        if self.listing_fails {
            bail!("MockCatalog: product table unavailable");
        }
        let mut listed = self.products.clone();
        listed.sort_by(|a, b| a.slug.cmp(&b.slug));
        listed.truncate(limit);
        Ok(listed)
    }

    async fn products_by_slugs(&self, slugs: &[String]) -> Result<Vec<CandidateProduct>> {
        if self.listing_fails {
            bail!("MockCatalog: product table unavailable");
        }
        Ok(self
            .products
            .iter()
            .filter(|p| slugs.contains(&p.slug))
            .cloned()
            .collect())
    }

    async fn search_products(
        &self,
        _embedding: &[f32],
        k: usize,
        max_price: Option<f64>,
    ) -> Result<Vec<ScoredProduct>> {
        self.search_calls.lock().unwrap().push(CatalogCall {
            occasion: None,
            max_price,
            limit: k,
        });
        Ok(self.search_hits.iter().take(k).cloned().collect())
    }
}

// ---------------------------------------------------------------------------
// FixedEmbedder
// ---------------------------------------------------------------------------

/// Deterministic embedder. Registered texts get exact vectors; anything
/// else gets a hash-based unit vector.
pub struct FixedEmbedder {
    vectors: HashMap<String, Vec<f32>>,
    dimension: usize,
    fails: bool,
    calls: Mutex<Vec<String>>,
}

impl FixedEmbedder {
    pub fn new(dimension: usize) -> Self {
        Self {
            vectors: HashMap::new(),
            dimension,
            fails: false,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn on_text(mut self, text: &str, vector: Vec<f32>) -> Self {
        self.vectors.insert(text.to_string(), vector);
        self
    }

    pub fn failing(mut self) -> Self {
        self.fails = true;
        self
    }

    /// Texts embedded so far, in call order.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn hash_vector(&self, text: &str) -> Vec<f32> {
        use std::hash::{Hash, Hasher};
        let mut hasher = std::collections::hash_map::DefaultHasher::new();
        text.hash(&mut hasher);
        let mut state = hasher.finish();

        let mut vec = vec![0.0f32; self.dimension];
        for v in vec.iter_mut() {
            state = state
                .wrapping_mul(6364136223846793005)
                .wrapping_add(1442695040888963407);
            *v = ((state >> 33) as f32 / u32::MAX as f32) * 2.0 - 1.0;
        }
        let norm: f32 = vec.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for v in vec.iter_mut() {
                *v /= norm;
            }
        }
        vec
    }
}

#[async_trait]
impl TextEmbedder for FixedEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.calls.lock().unwrap().push(text.to_string());
        if self.fails {
            bail!("FixedEmbedder: embedding service unavailable");
        }
        Ok(self
            .vectors
            .get(text)
            .cloned()
            .unwrap_or_else(|| self.hash_vector(text)))
    }
}

// ---------------------------------------------------------------------------
// ScriptedGenerator
// ---------------------------------------------------------------------------

enum Scripted {
    Reply(String),
    Fail(String),
    Stall,
}

/// Replays queued outcomes in order. Errors once the queue is empty.
pub struct ScriptedGenerator {
    model: String,
    script: Mutex<VecDeque<Scripted>>,
    prompts: Mutex<Vec<(String, GenerationConfig)>>,
}

impl ScriptedGenerator {
    pub fn new(model: &str) -> Self {
        Self {
            model: model.to_string(),
            script: Mutex::new(VecDeque::new()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn then_reply(self, raw: &str) -> Self {
        self.script
            .lock()
            .unwrap()
            .push_back(Scripted::Reply(raw.to_string()));
        self
    }

    pub fn then_fail(self, message: &str) -> Self {
        self.script
            .lock()
            .unwrap()
            .push_back(Scripted::Fail(message.to_string()));
        self
    }

    /// Never answers; pair with a paused clock to exercise timeouts.
    pub fn then_stall(self) -> Self {
        self.script.lock().unwrap().push_back(Scripted::Stall);
        self
    }

    /// Prompts received so far with their generation options.
    pub fn prompts(&self) -> Vec<(String, GenerationConfig)> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl GenerateAgent for ScriptedGenerator {
    fn model(&self) -> &str {
        &self.model
    }

    async fn generate(&self, prompt: &str, config: &GenerationConfig) -> Result<String> {
        self.prompts
            .lock()
            .unwrap()
            .push((prompt.to_string(), config.clone()));
        let next = self.script.lock().unwrap().pop_front();
        match next {
            Some(Scripted::Reply(raw)) => Ok(raw),
            Some(Scripted::Fail(message)) => Err(anyhow!(message)),
            Some(Scripted::Stall) => {
                tokio::time::sleep(Duration::from_secs(24 * 3600)).await;
                bail!("ScriptedGenerator: stall elapsed")
            }
            None => bail!("ScriptedGenerator: no scripted reply left"),
        }
    }
}

// ---------------------------------------------------------------------------
// RecordingAiLog
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct RecordingAiLog {
    entries: Mutex<Vec<AiLogEntry>>,
    fails: bool,
}

impl RecordingAiLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every write errors; nothing is recorded.
    pub fn failing() -> Self {
        Self {
            fails: true,
            ..Self::default()
        }
    }

    pub fn entries(&self) -> Vec<AiLogEntry> {
        self.entries.lock().unwrap().clone()
    }
}

#[async_trait]
impl AiLogSink for RecordingAiLog {
    async fn record(&self, entry: &AiLogEntry) -> Result<()> {
        if self.fails {
            bail!("RecordingAiLog: log table unavailable");
        }
        self.entries.lock().unwrap().push(entry.clone());
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// MemoryCache
// ---------------------------------------------------------------------------

struct CachedOutput {
    entry: CacheEntry,
    created: Instant,
    /// Extra age for seeded entries.
    backdate: Duration,
    hits: u32,
}

impl CachedOutput {
    fn age(&self) -> Duration {
        self.created.elapsed() + self.backdate
    }
}

#[derive(Default)]
pub struct MemoryCache {
    entries: Mutex<HashMap<String, CachedOutput>>,
    fails: bool,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self {
            fails: true,
            ..Self::default()
        }
    }

    /// Seed an entry created `age` ago.
    pub fn with_entry(self, key: &str, output: &str, age: Duration) -> Self {
        self.entries.lock().unwrap().insert(
            key.to_string(),
            CachedOutput {
                entry: CacheEntry {
                    key: key.to_string(),
                    route: String::new(),
                    model: String::new(),
                    input: serde_json::Value::Null,
                    output: output.to_string(),
                },
                created: Instant::now(),
                backdate: age,
                hits: 0,
            },
        );
        self
    }

    pub fn hits(&self, key: &str) -> Option<u32> {
        self.entries.lock().unwrap().get(key).map(|c| c.hits)
    }

    pub fn entry(&self, key: &str) -> Option<CacheEntry> {
        self.entries.lock().unwrap().get(key).map(|c| c.entry.clone())
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl ResponseCache for MemoryCache {
    async fn get(&self, key: &str, max_age: Duration) -> Result<Option<String>> {
        if self.fails {
            bail!("MemoryCache: cache unavailable");
        }
        let mut entries = self.entries.lock().unwrap();
        Ok(entries
            .get_mut(key)
            .filter(|c| c.age() < max_age)
            .map(|c| {
                c.hits += 1;
                c.entry.output.clone()
            }))
    }

    async fn put(&self, entry: &CacheEntry) -> Result<()> {
        if self.fails {
            bail!("MemoryCache: cache unavailable");
        }
        self.entries.lock().unwrap().insert(
            entry.key.clone(),
            CachedOutput {
                entry: entry.clone(),
                created: Instant::now(),
                backdate: Duration::ZERO,
                hits: 0,
            },
        );
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// MockDeps
// ---------------------------------------------------------------------------

/// All mocks with handles kept for assertions.
pub struct MockDeps {
    pub sessions: Arc<MockSessionStore>,
    pub catalog: Arc<MockCatalog>,
    pub embedder: Arc<FixedEmbedder>,
    pub generator: Arc<ScriptedGenerator>,
    pub ai_log: Arc<RecordingAiLog>,
    pub cache: Arc<MemoryCache>,
    pub file_config: FileConfig,
}

impl Default for MockDeps {
    fn default() -> Self {
        Self::new()
    }
}

impl MockDeps {
    pub fn new() -> Self {
        Self {
            sessions: Arc::new(MockSessionStore::new()),
            catalog: Arc::new(MockCatalog::new()),
            embedder: Arc::new(FixedEmbedder::new(TEST_EMBEDDING_DIM)),
            generator: Arc::new(ScriptedGenerator::new("test-model")),
            ai_log: Arc::new(RecordingAiLog::new()),
            cache: Arc::new(MemoryCache::new()),
            file_config: FileConfig::default(),
        }
    }

    pub fn sessions(mut self, sessions: MockSessionStore) -> Self {
        self.sessions = Arc::new(sessions);
        self
    }

    pub fn catalog(mut self, catalog: MockCatalog) -> Self {
        self.catalog = Arc::new(catalog);
        self
    }

    pub fn embedder(mut self, embedder: FixedEmbedder) -> Self {
        self.embedder = Arc::new(embedder);
        self
    }

    pub fn generator(mut self, generator: ScriptedGenerator) -> Self {
        self.generator = Arc::new(generator);
        self
    }

    pub fn ai_log(mut self, ai_log: RecordingAiLog) -> Self {
        self.ai_log = Arc::new(ai_log);
        self
    }

    pub fn cache(mut self, cache: MemoryCache) -> Self {
        self.cache = Arc::new(cache);
        self
    }

    pub fn file_config(mut self, file_config: FileConfig) -> Self {
        self.file_config = file_config;
        self
    }

    pub fn chat_deps(&self) -> ChatDeps {
        ChatDeps::new(
            self.sessions.clone(),
            self.catalog.clone(),
            self.embedder.clone(),
            self.generator.clone(),
            self.ai_log.clone(),
            self.cache.clone(),
            Arc::new(self.file_config.clone()),
        )
    }
}
