use axum::{
    extract::{rejection::JsonRejection, State},
    response::{IntoResponse, Json},
};
use serde::Deserialize;
use serde_json::json;

use bloomify_chat::turn::CHAT_ROUTE;

use super::{failure, rejected};
use crate::AppState;

/// Missing fields deserialize as empty and fail validation with a 400.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessageRequest {
    #[serde(default)]
    session_id: String,
    #[serde(default)]
    text: String,
}

pub async fn api_chat_start(State(state): State<AppState>) -> impl IntoResponse {
    match state.turns.start_session().await {
        Ok(session) => Json(json!({ "ok": true, "sessionId": session })).into_response(),
        Err(e) => failure("/api/chat/start", &e),
    }
}

pub async fn api_chat_message(
    State(state): State<AppState>,
    body: Result<Json<ChatMessageRequest>, JsonRejection>,
) -> impl IntoResponse {
    let Json(body) = match body {
        Ok(body) => body,
        Err(rejection) => return rejected(CHAT_ROUTE, rejection),
    };
    match state.turns.handle_turn(&body.session_id, &body.text).await {
        Ok(reply) => Json(json!({
            "ok": true,
            "answer": reply.answer,
            "tool": reply.tool,
        }))
        .into_response(),
        Err(e) => failure(CHAT_ROUTE, &e),
    }
}
