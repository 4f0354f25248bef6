//! One chat turn, end to end.
//!
//! Steps run strictly in order and the first failure aborts the rest.
//! Writes that already happened (the user message, merged slots) stay.

use std::time::Instant;

use ai_client::GenerationConfig;
use serde_json::json;
use tracing::{info, warn};

use bloomify_common::{ChatRole, SessionId, TurnReply};

use crate::ai_log::{record_best_effort, AiLogEntry};
use crate::deps::ChatDeps;
use crate::error::{run_stage, TurnError, TurnStage};
use crate::prompt::{compose, PromptContext};
use crate::retrieval::CandidateRetriever;
use crate::slots::extract_slots;
use crate::tool_call::{cart_tool, parse_tool_call, verify_membership};

pub const CHAT_ROUTE: &str = "/api/chat/message";

pub struct TurnOrchestrator {
    deps: ChatDeps,
    retriever: CandidateRetriever,
}

impl TurnOrchestrator {
    pub fn new(deps: ChatDeps) -> Self {
        let retriever = CandidateRetriever::new(deps.catalog.clone(), &deps.file_config.chat);
        Self { deps, retriever }
    }

    pub async fn start_session(&self) -> Result<SessionId, TurnError> {
        let session = run_stage(
            TurnStage::CreateSession,
            self.deps.file_config.timeouts.store(),
            self.deps.sessions.create_session(),
        )
        .await?;
        info!(session_id = %session, "Chat session started");
        Ok(session)
    }

    /// Validate, run the pipeline, and write one AI log record either way.
    pub async fn handle_turn(&self, session: &str, text: &str) -> Result<TurnReply, TurnError> {
        let session = SessionId::parse(session)?;
        let text = text.trim();
        if text.is_empty() {
            return Err(TurnError::Validation("text is required".to_string()));
        }

        let started = Instant::now();
        let model = self.deps.generator.model().to_string();

        match self.run(&session, text).await {
            Ok(done) => {
                let entry = AiLogEntry::new(CHAT_ROUTE, model, done.log_input, &done.log_output, started);
                info!(
                    session_id = %session,
                    latency_ms = entry.latency_ms,
                    has_tool = done.reply.tool.is_some(),
                    "Chat turn completed"
                );
                record_best_effort(self.deps.ai_log.as_ref(), entry).await;
                Ok(done.reply)
            }
            Err(e) => {
                warn!(session_id = %session, error = %e, stage = ?e.stage(), "Chat turn failed");
                let input = json!({ "error": true, "stage": e.stage() });
                let entry = AiLogEntry::new(CHAT_ROUTE, model, input, &e.to_string(), started);
                record_best_effort(self.deps.ai_log.as_ref(), entry).await;
                Err(e)
            }
        }
    }

    async fn run(&self, session: &SessionId, text: &str) -> Result<CompletedTurn, TurnError> {
        let chat = &self.deps.file_config.chat;
        let timeouts = &self.deps.file_config.timeouts;
        let sessions = &self.deps.sessions;

        run_stage(
            TurnStage::PersistUserMessage,
            timeouts.store(),
            sessions.append_message(session, ChatRole::User, text),
        )
        .await?;

        let update = extract_slots(text);
        let slots = run_stage(
            TurnStage::MergeSlots,
            timeouts.store(),
            sessions.merge_and_save(session, &update),
        )
        .await?;
        info!(
            session_id = %session,
            occasion = ?slots.occasion,
            budget = ?slots.budget,
            colors = ?slots.colors,
            "Slots merged"
        );

        let history = run_stage(
            TurnStage::LoadHistory,
            timeouts.store(),
            sessions.recent_messages(session, chat.history_limit),
        )
        .await?;

        let embedding = run_stage(
            TurnStage::EmbedQuery,
            timeouts.embedding(),
            self.deps.embedder.embed(text),
        )
        .await?;

        let retrieval = run_stage(
            TurnStage::RetrieveCandidates,
            timeouts.store(),
            self.retriever.retrieve(&embedding, &slots),
        )
        .await?;
        info!(
            session_id = %session,
            candidates = retrieval.candidates.len(),
            used_fallback = retrieval.used_fallback,
            "Candidates retrieved"
        );

        let knowledge = self.knowledge(&embedding).await;

        let prompt = compose(&PromptContext {
            text,
            slots: &slots,
            candidates: &retrieval.candidates,
            knowledge: &knowledge,
            history: &history,
            reply_language: &chat.reply_language,
        });
        let options = GenerationConfig::default()
            .temperature(chat.temperature)
            .max_output_tokens(chat.max_output_tokens)
            .json();
        let prompt_text = prompt.to_text();

        let raw = run_stage(
            TurnStage::InvokeModel,
            timeouts.generation(),
            self.deps.generator.generate(&prompt_text, &options),
        )
        .await?;

        let parsed = parse_tool_call(&raw);
        let requested = parsed.action;
        let call = verify_membership(parsed, &retrieval.candidates);
        if call.action != requested {
            warn!(session_id = %session, "Model picked a product outside the candidate set");
        }

        run_stage(
            TurnStage::PersistAssistantMessage,
            timeouts.store(),
            sessions.append_message(session, ChatRole::Assistant, &call.answer),
        )
        .await?;

        Ok(CompletedTurn {
            log_input: json!({
                "text": text,
                "slots": slots,
                "used_fallback": retrieval.used_fallback,
            }),
            log_output: format!("[{}] {}", call.action.as_str(), call.answer),
            reply: TurnReply {
                tool: cart_tool(&call),
                answer: call.answer,
            },
        })
    }

    /// Store knowledge for the prompt. Failures leave it empty.
    async fn knowledge(&self, embedding: &[f32]) -> Vec<String> {
        let limit = self.deps.file_config.chat.knowledge_count;
        if limit == 0 {
            return Vec::new();
        }
        run_stage(
            TurnStage::LoadKnowledge,
            self.deps.file_config.timeouts.store(),
            self.deps.catalog.similar_knowledge(embedding, limit),
        )
        .await
        .unwrap_or_else(|e| {
            warn!(error = %e, stage = ?e.stage(), "Knowledge lookup failed, continuing without it");
            Vec::new()
        })
    }
}

struct CompletedTurn {
    reply: TurnReply,
    log_input: serde_json::Value,
    log_output: String,
}
