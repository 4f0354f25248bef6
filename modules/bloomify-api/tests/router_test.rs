//! HTTP surface against the in-memory collaborators.

use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use tower::ServiceExt;

use bloomify_api::{build_router, AppState};
use bloomify_chat::testing::{
    product, scored_product, FixedEmbedder, MockCatalog, MockDeps, MockSessionStore,
    ScriptedGenerator, StoreOp, TEST_EMBEDDING_DIM,
};

fn app(mocks: &MockDeps) -> Router {
    build_router(AppState::new(mocks.chat_deps()), &[])
}

async fn post(app: Router, uri: &str, body: Value) -> (StatusCode, Value) {
    post_raw(app, uri, body.to_string()).await
}

async fn post_raw(app: Router, uri: &str, body: String) -> (StatusCode, Value) {
    let request = Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body))
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

#[tokio::test]
async fn health_says_ok() {
    let response = app(&MockDeps::new())
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert_eq!(&bytes[..], b"ok");
}

#[tokio::test]
async fn start_returns_session_id() {
    let mocks = MockDeps::new();
    let (status, body) = post(app(&mocks), "/api/chat/start", json!({})).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["ok"], json!(true));
    let session = body["sessionId"].as_str().unwrap();
    assert!(mocks.sessions.slots(session).is_some());
}

#[tokio::test]
async fn message_returns_answer_and_tool() {
    let mocks = MockDeps::new()
        .catalog(MockCatalog::new().on_similar(vec![product("pink-party", "Pink Party", 185_000.0)]))
        .generator(ScriptedGenerator::new("test-model").then_reply(
            r#"{"answer":"Ini pilihannya","action":"add_to_cart","slug":"pink-party","qty":2}"#,
        ));

    let (status, body) = post(
        app(&mocks),
        "/api/chat/message",
        json!({ "sessionId": "s-1", "text": "bunga pink buat ultah" }),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        json!({
            "ok": true,
            "answer": "Ini pilihannya",
            "tool": { "action": "add_to_cart", "slug": "pink-party", "qty": 2 },
        })
    );
}

#[tokio::test]
async fn reply_only_turn_has_null_tool() {
    let mocks = MockDeps::new().generator(
        ScriptedGenerator::new("test-model").then_reply(r#"{"answer":"Halo!","action":"none"}"#),
    );
    let (status, body) = post(
        app(&mocks),
        "/api/chat/message",
        json!({ "sessionId": "s-1", "text": "halo" }),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["tool"], Value::Null);
}

#[tokio::test]
async fn missing_text_is_bad_request() {
    let mocks = MockDeps::new();
    let (status, body) = post(app(&mocks), "/api/chat/message", json!({ "sessionId": "s-1" })).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, json!({ "ok": false, "error": "text is required" }));
    assert!(mocks.sessions.messages("s-1").is_empty());
}

#[tokio::test]
async fn provider_failure_is_bad_gateway_without_detail() {
    let mocks = MockDeps::new().embedder(FixedEmbedder::new(TEST_EMBEDDING_DIM).failing());
    let (status, body) = post(
        app(&mocks),
        "/api/chat/message",
        json!({ "sessionId": "s-1", "text": "halo" }),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["ok"], json!(false));
    let message = body["error"].as_str().unwrap();
    assert!(!message.contains("embed"));
    assert!(!message.contains("unavailable"));
}

#[tokio::test]
async fn store_failure_is_internal_error() {
    let mocks = MockDeps::new().sessions(MockSessionStore::new().failing_on(StoreOp::MergeSlots));
    let (status, body) = post(
        app(&mocks),
        "/api/chat/message",
        json!({ "sessionId": "s-1", "text": "halo" }),
    )
    .await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["ok"], json!(false));
}

#[tokio::test]
async fn card_reports_cache_state() {
    let mocks = MockDeps::new()
        .generator(ScriptedGenerator::new("test-model").then_reply("Selamat ulang tahun!"));
    let request = json!({ "occasion": "birthday", "tone": "cheerful" });

    let (status, first) = post(app(&mocks), "/api/ai-card", request.clone()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(first, json!({ "ok": true, "text": "Selamat ulang tahun!", "cached": false }));

    let (_, second) = post(app(&mocks), "/api/ai-card", request).await;
    assert_eq!(second["cached"], json!(true));
}

#[tokio::test]
async fn card_rejects_zero_words() {
    let (status, body) = post(app(&MockDeps::new()), "/api/ai-card", json!({ "maxWords": 0 })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["ok"], json!(false));
}

#[tokio::test]
async fn blank_search_returns_no_items() {
    let mocks = MockDeps::new();
    let (status, body) = post(app(&mocks), "/api/search", json!({ "q": "  " })).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "ok": true, "items": [] }));
    assert!(mocks.embedder.calls().is_empty());
}

#[tokio::test]
async fn search_returns_ranked_items() {
    let mocks = MockDeps::new().catalog(MockCatalog::new().on_search(vec![
        scored_product("roses", "Roses", 0.4),
        scored_product("lilies", "Lilies", 0.9),
    ]));
    let (status, body) = post(app(&mocks), "/api/search", json!({ "q": "bunga", "k": 5 })).await;

    assert_eq!(status, StatusCode::OK);
    let slugs: Vec<&str> = body["items"]
        .as_array()
        .unwrap()
        .iter()
        .map(|item| item["slug"].as_str().unwrap())
        .collect();
    assert_eq!(slugs, vec!["lilies", "roses"]);
    assert_eq!(mocks.catalog.search_calls()[0].limit, 5);
}

#[tokio::test]
async fn mistyped_body_keeps_the_error_envelope() {
    let mocks = MockDeps::new();
    let (status, body) = post(
        app(&mocks),
        "/api/chat/message",
        json!({ "sessionId": 5, "text": "halo" }),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["ok"], json!(false));
    assert!(body["error"].is_string());
    assert!(mocks.sessions.messages("5").is_empty());
}

#[tokio::test]
async fn malformed_json_keeps_the_error_envelope() {
    for uri in ["/api/ai-card", "/api/search", "/api/ai", "/api/ai-upsell"] {
        let (status, body) = post_raw(app(&MockDeps::new()), uri, "{not json".to_string()).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{uri}");
        assert_eq!(body["ok"], json!(false), "{uri}");
        assert!(body["error"].is_string(), "{uri}");
    }
}

#[tokio::test]
async fn recommendation_returns_text_and_slugs() {
    let mocks = MockDeps::new()
        .catalog(MockCatalog::new().with_products(vec![product("pink-party", "Pink Party", 185_000.0)]))
        .generator(
            ScriptedGenerator::new("test-model").then_reply("1. Pink Party | ceria\nslug:pink-party"),
        );
    let request = json!({ "occasion": "ulang tahun", "colors": "pink" });

    let (status, first) = post(app(&mocks), "/api/ai", request.clone()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(first["ok"], json!(true));
    assert_eq!(first["cached"], json!(false));
    assert_eq!(first["slugs"], json!(["pink-party"]));

    let (_, second) = post(app(&mocks), "/api/ai", request).await;
    assert_eq!(second["cached"], json!(true));
    assert_eq!(second["text"], first["text"]);
}

#[tokio::test]
async fn upsell_returns_suggestions() {
    let mocks = MockDeps::new()
        .catalog(MockCatalog::new().with_products(vec![
            product("pink-party", "Pink Party", 185_000.0),
            product("choco-box", "Choco Box", 90_000.0),
        ]))
        .generator(ScriptedGenerator::new("test-model").then_reply("- Choco Box | manis | slug:choco-box"));

    let (status, body) = post(
        app(&mocks),
        "/api/ai-upsell",
        json!({ "lines": [{ "slug": "pink-party", "qty": 1 }], "budgetExtra": 100000 }),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "ok": true, "text": "- Choco Box | manis | slug:choco-box" }));
}

#[tokio::test]
async fn upsell_rejects_negative_extra_budget() {
    let (status, body) = post(
        app(&MockDeps::new()),
        "/api/ai-upsell",
        json!({ "lines": [], "budgetExtra": -1 }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], json!("budgetExtra must be a positive number"));
}
