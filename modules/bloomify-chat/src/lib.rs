pub mod ai_log;
pub mod cache;
pub mod card;
pub mod deps;
pub mod embedder;
pub mod error;
pub mod prompt;
pub mod recommend;
pub mod retrieval;
pub mod search;
pub mod session;
pub mod slots;
pub mod store;
#[cfg(any(test, feature = "test-support"))]
pub mod testing;
pub mod tool_call;
pub mod traits;
pub mod turn;

pub use card::{CardRequest, CardText, CardTone, CardWriter};
pub use deps::ChatDeps;
pub use embedder::GeminiEmbedder;
pub use error::{TurnError, TurnStage};
pub use recommend::{
    CartLine, Recommendation, RecommendRequest, RecommendWriter, UpsellRequest,
};
pub use search::{ProductSearch, SearchRequest};
pub use store::PgStore;
pub use turn::TurnOrchestrator;
