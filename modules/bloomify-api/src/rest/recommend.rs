use axum::{
    extract::{rejection::JsonRejection, State},
    response::{IntoResponse, Json},
};
use serde_json::json;

use bloomify_chat::recommend::{RECOMMEND_ROUTE, UPSELL_ROUTE};
use bloomify_chat::{RecommendRequest, UpsellRequest};

use super::{failure, rejected};
use crate::AppState;

pub async fn api_ai(
    State(state): State<AppState>,
    body: Result<Json<RecommendRequest>, JsonRejection>,
) -> impl IntoResponse {
    let Json(body) = match body {
        Ok(body) => body,
        Err(rejection) => return rejected(RECOMMEND_ROUTE, rejection),
    };
    match state.recommend.recommend(&body).await {
        Ok(picks) => Json(json!({
            "ok": true,
            "text": picks.text,
            "cached": picks.cached,
            "slugs": picks.slugs,
        }))
        .into_response(),
        Err(e) => failure(RECOMMEND_ROUTE, &e),
    }
}

pub async fn api_ai_upsell(
    State(state): State<AppState>,
    body: Result<Json<UpsellRequest>, JsonRejection>,
) -> impl IntoResponse {
    let Json(body) = match body {
        Ok(body) => body,
        Err(rejection) => return rejected(UPSELL_ROUTE, rejection),
    };
    match state.recommend.upsell(&body).await {
        Ok(text) => Json(json!({ "ok": true, "text": text })).into_response(),
        Err(e) => failure(UPSELL_ROUTE, &e),
    }
}
