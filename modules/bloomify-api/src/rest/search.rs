use axum::{
    extract::{rejection::JsonRejection, State},
    response::{IntoResponse, Json},
};
use serde_json::json;

use bloomify_chat::SearchRequest;

use super::{failure, rejected};
use crate::AppState;

const SEARCH_ROUTE: &str = "/api/search";

pub async fn api_search(
    State(state): State<AppState>,
    body: Result<Json<SearchRequest>, JsonRejection>,
) -> impl IntoResponse {
    let Json(body) = match body {
        Ok(body) => body,
        Err(rejection) => return rejected(SEARCH_ROUTE, rejection),
    };
    match state.search.search(&body).await {
        Ok(items) => Json(json!({ "ok": true, "items": items })).into_response(),
        Err(e) => failure(SEARCH_ROUTE, &e),
    }
}
