use axum::{
    extract::{rejection::JsonRejection, State},
    response::{IntoResponse, Json},
};
use serde_json::json;

use bloomify_chat::card::CARD_ROUTE;
use bloomify_chat::CardRequest;

use super::{failure, rejected};
use crate::AppState;

pub async fn api_ai_card(
    State(state): State<AppState>,
    body: Result<Json<CardRequest>, JsonRejection>,
) -> impl IntoResponse {
    let Json(body) = match body {
        Ok(body) => body,
        Err(rejection) => return rejected(CARD_ROUTE, rejection),
    };
    match state.cards.write(&body).await {
        Ok(card) => Json(json!({ "ok": true, "text": card.text, "cached": card.cached }))
            .into_response(),
        Err(e) => failure(CARD_ROUTE, &e),
    }
}
