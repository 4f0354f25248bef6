pub mod card;
pub mod chat;
pub mod recommend;
pub mod search;

use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use tracing::warn;

use bloomify_chat::TurnError;

const STORE_FAILURE: &str = "Terjadi kesalahan, silakan coba lagi.";
const UPSTREAM_FAILURE: &str = "Asisten sedang tidak tersedia, silakan coba lagi.";

/// `{ok: false, error}` with a status matching the failure class.
/// Only validation messages reach the caller; everything else is logged.
pub(crate) fn failure(route: &str, e: &TurnError) -> Response {
    let (status, message) = match e {
        TurnError::Validation(msg) => (StatusCode::BAD_REQUEST, msg.as_str()),
        other => {
            warn!(route, error = %other, stage = ?other.stage(), "Request failed");
            if other.stage().is_some_and(|s| s.is_store()) {
                (StatusCode::INTERNAL_SERVER_ERROR, STORE_FAILURE)
            } else {
                (StatusCode::BAD_GATEWAY, UPSTREAM_FAILURE)
            }
        }
    };
    (status, Json(serde_json::json!({ "ok": false, "error": message }))).into_response()
}

/// Malformed or mistyped bodies get the same envelope as validation errors.
pub(crate) fn rejected(route: &str, rejection: JsonRejection) -> Response {
    failure(route, &TurnError::Validation(rejection.body_text()))
}
