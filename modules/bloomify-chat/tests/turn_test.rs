//! Chat turns end to end against in-memory collaborators.

use bloomify_chat::testing::{
    product, FixedEmbedder, MockCatalog, MockDeps, MockSessionStore, RecordingAiLog,
    ScriptedGenerator, StoreOp, TEST_EMBEDDING_DIM,
};
use bloomify_chat::tool_call::FALLBACK_ANSWER;
use bloomify_chat::turn::CHAT_ROUTE;
use bloomify_chat::{TurnError, TurnOrchestrator, TurnStage};
use bloomify_common::{ChatMessage, ChatRole, Color, FileConfig, Occasion, Slots, ToolAction};
use serde_json::json;

const SESSION: &str = "sess-1";

fn birthday() -> Slots {
    Slots {
        occasion: Some(Occasion::Birthday),
        ..Slots::default()
    }
}

fn add_to_cart(slug: &str) -> String {
    json!({ "answer": "Cocok untukmu!", "action": "add_to_cart", "slug": slug }).to_string()
}

#[tokio::test]
async fn follow_up_turn_merges_budget_and_color() {
    let mocks = MockDeps::new()
        .sessions(MockSessionStore::new().with_slots(SESSION, birthday()))
        .catalog(MockCatalog::new().on_similar(vec![
            product("pink-party", "Pink Party Bouquet", 185_000.0),
            product("rose-mix", "Rose Mix", 150_000.0),
        ]))
        .generator(ScriptedGenerator::new("test-model").then_reply(&add_to_cart("pink-party")));
    let turns = TurnOrchestrator::new(mocks.chat_deps());

    let reply = turns
        .handle_turn(SESSION, "budget 200k warna pink")
        .await
        .unwrap();

    assert_eq!(reply.answer, "Cocok untukmu!");
    let tool = reply.tool.expect("verified add_to_cart");
    assert_eq!(tool.action, ToolAction::AddToCart);
    assert_eq!(tool.slug.as_deref(), Some("pink-party"));
    assert_eq!(tool.qty, Some(1));

    let slots = mocks.sessions.slots(SESSION).unwrap();
    assert_eq!(slots.occasion, Some(Occasion::Birthday));
    assert_eq!(slots.budget, Some(200_000.0));
    assert_eq!(slots.colors, Some(vec![Color::Pink]));

    let calls = mocks.catalog.similar_calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].occasion, Some(Occasion::Birthday));
    assert_eq!(calls[0].max_price, Some(200_000.0));
    assert!(mocks.catalog.cheapest_calls().is_empty());

    let messages = mocks.sessions.messages(SESSION);
    assert_eq!(
        messages,
        vec![
            ChatMessage::user("budget 200k warna pink"),
            ChatMessage::assistant("Cocok untukmu!"),
        ]
    );

    let entries = mocks.ai_log.entries();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].route, CHAT_ROUTE);
    assert_eq!(entries[0].model, "test-model");
    assert_eq!(entries[0].input["used_fallback"], json!(false));
    assert_eq!(entries[0].input["slots"]["budget"], json!(200_000.0));
    assert_eq!(entries[0].output, "[add_to_cart] Cocok untukmu!");
}

#[tokio::test]
async fn prompt_carries_candidates_slots_and_history() {
    let mocks = MockDeps::new()
        .sessions(MockSessionStore::new().with_messages(
            SESSION,
            vec![
                ChatMessage::user("halo"),
                ChatMessage::assistant("Halo! Ada yang bisa dibantu?"),
            ],
        ))
        .catalog(
            MockCatalog::new()
                .on_similar(vec![product("sunflower-joy", "Sunflower Joy", 220_000.0)])
                .with_knowledge(vec!["Pengiriman same-day untuk pesanan sebelum jam 2 siang."]),
        )
        .generator(ScriptedGenerator::new("test-model").then_reply(r#"{"answer":"Ini dia","action":"none"}"#));
    let turns = TurnOrchestrator::new(mocks.chat_deps());

    turns
        .handle_turn(SESSION, "bunga ulang tahun warna kuning")
        .await
        .unwrap();

    let prompts = mocks.generator.prompts();
    assert_eq!(prompts.len(), 1);
    let (prompt, options) = &prompts[0];
    assert!(prompt.contains("slug MUST be one of: [sunflower-joy]"));
    assert!(prompt.contains("- Sunflower Joy | slug:sunflower-joy | price:220000"));
    assert!(prompt.contains("occasion=birthday"));
    assert!(prompt.contains("KB#1: Pengiriman same-day"));
    assert!(prompt.contains("User: halo"));
    assert!(prompt.contains("Assistant: Halo! Ada yang bisa dibantu?"));
    assert!(prompt.contains("Question: bunga ulang tahun warna kuning"));
    assert_eq!(options.response_mime_type.as_deref(), Some("application/json"));
}

#[tokio::test]
async fn get_well_never_offers_funeral_products() {
    let mocks = MockDeps::new()
        .catalog(MockCatalog::new().on_similar(vec![
            product("sympathy-wreath-classic", "Sympathy Wreath Classic", 500_000.0),
            product("sunny-day", "Sunny Day Bouquet", 250_000.0),
        ]))
        .generator(
            ScriptedGenerator::new("test-model").then_reply(&add_to_cart("sympathy-wreath-classic")),
        );
    let turns = TurnOrchestrator::new(mocks.chat_deps());

    let reply = turns
        .handle_turn(SESSION, "mau jenguk teman yang sakit")
        .await
        .unwrap();

    let (prompt, _) = &mocks.generator.prompts()[0];
    assert!(prompt.contains("slug:sunny-day"));
    assert!(!prompt.contains("Sympathy Wreath Classic"));
    assert!(prompt.contains("funeral"));

    // Out-of-set pick is downgraded to a plain reply.
    assert_eq!(reply.answer, "Cocok untukmu!");
    assert!(reply.tool.is_none());
    assert_eq!(mocks.ai_log.entries()[0].output, "[none] Cocok untukmu!");
}

#[tokio::test]
async fn empty_semantic_results_use_cheapest_fallback() {
    let mocks = MockDeps::new()
        .catalog(MockCatalog::new().with_products(vec![
            product("red-grand", "Red Grand Bouquet", 900_000.0),
            product("mini-pink", "Mini Pink", 120_000.0),
            product("white-lily", "White Lily", 180_000.0),
        ]))
        .generator(ScriptedGenerator::new("test-model").then_reply(&add_to_cart("mini-pink")));
    let turns = TurnOrchestrator::new(mocks.chat_deps());

    let reply = turns
        .handle_turn(SESSION, "ada bunga pink 200rb?")
        .await
        .unwrap();

    assert_eq!(reply.tool.unwrap().slug.as_deref(), Some("mini-pink"));
    let cheapest = mocks.catalog.cheapest_calls();
    assert_eq!(cheapest.len(), 1);
    assert!((cheapest[0].max_price.unwrap() - 220_000.0).abs() < 1e-6);

    let (prompt, _) = &mocks.generator.prompts()[0];
    assert!(prompt.contains("slug:mini-pink"));
    assert!(!prompt.contains("white-lily"));
    assert!(!prompt.contains("red-grand"));
    assert_eq!(mocks.ai_log.entries()[0].input["used_fallback"], json!(true));
}

#[tokio::test]
async fn empty_catalog_forces_reply_only() {
    let mocks = MockDeps::new()
        .generator(ScriptedGenerator::new("test-model").then_reply(&add_to_cart("ghost")));
    let turns = TurnOrchestrator::new(mocks.chat_deps());

    let reply = turns.handle_turn(SESSION, "halo").await.unwrap();

    assert!(reply.tool.is_none());
    let (prompt, _) = &mocks.generator.prompts()[0];
    assert!(prompt.contains(r#"action MUST be "none""#));
    assert!(prompt.contains("(empty)"));
}

#[tokio::test]
async fn unparseable_reply_is_passed_through_as_text() {
    let mocks = MockDeps::new().generator(
        ScriptedGenerator::new("test-model").then_reply("Tentu, kami punya banyak pilihan."),
    );
    let turns = TurnOrchestrator::new(mocks.chat_deps());

    let reply = turns.handle_turn(SESSION, "halo").await.unwrap();
    assert_eq!(reply.answer, "Tentu, kami punya banyak pilihan.");
    assert!(reply.tool.is_none());
}

#[tokio::test]
async fn blank_reply_becomes_apology() {
    let mocks =
        MockDeps::new().generator(ScriptedGenerator::new("test-model").then_reply("```json\n```"));
    let turns = TurnOrchestrator::new(mocks.chat_deps());

    let reply = turns.handle_turn(SESSION, "halo").await.unwrap();
    assert_eq!(reply.answer, FALLBACK_ANSWER);
    assert_eq!(
        mocks.sessions.messages(SESSION).last().map(|m| m.content.as_str()),
        Some(FALLBACK_ANSWER)
    );
}

#[tokio::test]
async fn blank_text_is_rejected_without_side_effects() {
    let mocks = MockDeps::new();
    let turns = TurnOrchestrator::new(mocks.chat_deps());

    let err = turns.handle_turn(SESSION, "   ").await.unwrap_err();
    assert!(matches!(err, TurnError::Validation(ref m) if m == "text is required"));

    let err = turns.handle_turn("  ", "halo").await.unwrap_err();
    assert!(matches!(err, TurnError::Validation(ref m) if m == "sessionId is required"));

    assert_eq!(mocks.sessions.session_count(), 0);
    assert!(mocks.embedder.calls().is_empty());
    assert!(mocks.generator.prompts().is_empty());
    assert!(mocks.ai_log.entries().is_empty());
}

#[tokio::test]
async fn embedding_failure_aborts_and_is_logged() {
    let mocks = MockDeps::new().embedder(FixedEmbedder::new(TEST_EMBEDDING_DIM).failing());
    let turns = TurnOrchestrator::new(mocks.chat_deps());

    let err = turns
        .handle_turn(SESSION, "bunga wisuda budget 300k")
        .await
        .unwrap_err();
    assert_eq!(err.stage(), Some(TurnStage::EmbedQuery));

    // Earlier writes stay.
    assert_eq!(mocks.sessions.messages(SESSION), vec![ChatMessage::user("bunga wisuda budget 300k")]);
    assert_eq!(mocks.sessions.slots(SESSION).unwrap().budget, Some(300_000.0));

    assert!(mocks.catalog.similar_calls().is_empty());
    assert!(mocks.generator.prompts().is_empty());

    let entries = mocks.ai_log.entries();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].input, json!({ "error": true, "stage": "embed_query" }));
}

#[tokio::test]
async fn store_failures_carry_their_stage() {
    for (op, stage) in [
        (StoreOp::AppendUserMessage, TurnStage::PersistUserMessage),
        (StoreOp::MergeSlots, TurnStage::MergeSlots),
        (StoreOp::RecentMessages, TurnStage::LoadHistory),
        (StoreOp::AppendAssistantMessage, TurnStage::PersistAssistantMessage),
    ] {
        let mocks = MockDeps::new()
            .sessions(MockSessionStore::new().failing_on(op))
            .generator(ScriptedGenerator::new("test-model").then_reply(r#"{"answer":"ok","action":"none"}"#));
        let turns = TurnOrchestrator::new(mocks.chat_deps());

        let err = turns.handle_turn(SESSION, "halo").await.unwrap_err();
        assert_eq!(err.stage(), Some(stage), "{op:?}");
        assert!(stage.is_store());
        assert_eq!(mocks.ai_log.entries()[0].input["stage"], json!(stage.as_str()));
    }
}

#[tokio::test]
async fn model_failure_is_an_invoke_model_error() {
    let mocks = MockDeps::new()
        .generator(ScriptedGenerator::new("test-model").then_fail("503 overloaded"));
    let turns = TurnOrchestrator::new(mocks.chat_deps());

    let err = turns.handle_turn(SESSION, "halo").await.unwrap_err();
    assert_eq!(err.stage(), Some(TurnStage::InvokeModel));
    assert!(!err.stage().unwrap().is_store());

    // Only the user message was persisted.
    let roles: Vec<ChatRole> = mocks.sessions.messages(SESSION).iter().map(|m| m.role).collect();
    assert_eq!(roles, vec![ChatRole::User]);
}

#[tokio::test(start_paused = true)]
async fn stalled_model_times_out() {
    let mocks = MockDeps::new().generator(ScriptedGenerator::new("test-model").then_stall());
    let turns = TurnOrchestrator::new(mocks.chat_deps());

    let err = turns.handle_turn(SESSION, "halo").await.unwrap_err();
    match err {
        TurnError::Timeout { stage, after } => {
            assert_eq!(stage, TurnStage::InvokeModel);
            assert_eq!(after, FileConfig::default().timeouts.generation());
        }
        other => panic!("expected timeout, got {other:?}"),
    }
}

#[tokio::test]
async fn knowledge_failure_does_not_abort_turn() {
    let mocks = MockDeps::new()
        .catalog(MockCatalog::new().failing_knowledge())
        .generator(ScriptedGenerator::new("test-model").then_reply(r#"{"answer":"ok","action":"none"}"#));
    let turns = TurnOrchestrator::new(mocks.chat_deps());

    let reply = turns.handle_turn(SESSION, "halo").await.unwrap();
    assert_eq!(reply.answer, "ok");
    let (prompt, _) = &mocks.generator.prompts()[0];
    assert!(prompt.contains("(none)"));
}

#[tokio::test]
async fn ai_log_failure_does_not_fail_turn() {
    let mocks = MockDeps::new()
        .ai_log(RecordingAiLog::failing())
        .generator(ScriptedGenerator::new("test-model").then_reply(r#"{"answer":"ok","action":"none"}"#));
    let turns = TurnOrchestrator::new(mocks.chat_deps());

    let reply = turns.handle_turn(SESSION, "halo").await.unwrap();
    assert_eq!(reply.answer, "ok");
}

#[tokio::test]
async fn unknown_session_is_created_on_first_turn() {
    let mocks = MockDeps::new()
        .generator(ScriptedGenerator::new("test-model").then_reply(r#"{"answer":"ok","action":"none"}"#));
    let turns = TurnOrchestrator::new(mocks.chat_deps());

    turns.handle_turn("brand-new", "bunga putih").await.unwrap();
    assert_eq!(
        mocks.sessions.slots("brand-new").unwrap().colors,
        Some(vec![Color::White])
    );
}

#[tokio::test]
async fn start_session_returns_fresh_ids() {
    let mocks = MockDeps::new();
    let turns = TurnOrchestrator::new(mocks.chat_deps());

    let a = turns.start_session().await.unwrap();
    let b = turns.start_session().await.unwrap();
    assert_ne!(a, b);
    assert_eq!(mocks.sessions.slots(a.as_str()), Some(Slots::default()));

    let failing = MockDeps::new().sessions(MockSessionStore::new().failing_on(StoreOp::CreateSession));
    let err = TurnOrchestrator::new(failing.chat_deps())
        .start_session()
        .await
        .unwrap_err();
    assert_eq!(err.stage(), Some(TurnStage::CreateSession));
}

#[tokio::test]
async fn history_is_limited_to_recent_messages() {
    let older: Vec<ChatMessage> = (0..30)
        .map(|i| ChatMessage::user(format!("pesan-{i:02}")))
        .collect();
    let mocks = MockDeps::new()
        .sessions(MockSessionStore::new().with_messages(SESSION, older))
        .generator(ScriptedGenerator::new("test-model").then_reply(r#"{"answer":"ok","action":"none"}"#));
    let turns = TurnOrchestrator::new(mocks.chat_deps());

    turns.handle_turn(SESSION, "halo").await.unwrap();

    let (prompt, _) = &mocks.generator.prompts()[0];
    let limit = FileConfig::default().chat.history_limit;
    // The new user message is the newest history entry.
    assert!(prompt.contains("User: halo"));
    assert!(!prompt.contains("pesan-00"));
    assert!(prompt.contains("pesan-29"));
    assert_eq!(prompt.matches("User: pesan-").count(), limit - 1);
}
