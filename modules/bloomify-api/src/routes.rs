use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use bloomify_chat::{CardWriter, ChatDeps, ProductSearch, RecommendWriter, TurnOrchestrator};

use crate::rest;

/// Services shared by every handler.
#[derive(Clone)]
pub struct AppState {
    pub turns: Arc<TurnOrchestrator>,
    pub cards: Arc<CardWriter>,
    pub recommend: Arc<RecommendWriter>,
    pub search: Arc<ProductSearch>,
}

impl AppState {
    pub fn new(deps: ChatDeps) -> Self {
        Self {
            turns: Arc::new(TurnOrchestrator::new(deps.clone())),
            cards: Arc::new(CardWriter::new(deps.clone())),
            recommend: Arc::new(RecommendWriter::new(deps.clone())),
            search: Arc::new(ProductSearch::new(deps)),
        }
    }
}

/// An empty `allowed_origins` list allows any origin.
pub fn build_router(state: AppState, allowed_origins: &[String]) -> Router {
    let cors = if allowed_origins.is_empty() {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
    } else {
        let origins: Vec<_> = allowed_origins
            .iter()
            .filter_map(|o| o.parse().ok())
            .collect();
        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(Any)
            .allow_headers(Any)
    };

    Router::new()
        .route("/health", get(health))
        .route("/api/chat/start", post(rest::chat::api_chat_start))
        .route("/api/chat/message", post(rest::chat::api_chat_message))
        .route("/api/ai", post(rest::recommend::api_ai))
        .route("/api/ai-upsell", post(rest::recommend::api_ai_upsell))
        .route("/api/ai-card", post(rest::card::api_ai_card))
        .route("/api/search", post(rest::search::api_search))
        .with_state(state)
        .layer(cors)
        // Method and path only; bodies carry shopper text.
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &axum::http::Request<_>| {
                tracing::info_span!(
                    "http_request",
                    method = %request.method(),
                    path = %request.uri().path(),
                )
            }),
        )
}

async fn health() -> &'static str {
    "ok"
}
