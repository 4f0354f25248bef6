//! Greeting-card text generation with a keyed response cache.

use std::time::{Duration, Instant};

use ai_client::GenerationConfig;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::ai_log::{record_best_effort, AiLogEntry};
use crate::cache;
use crate::deps::ChatDeps;
use crate::error::{run_stage, TurnError, TurnStage};
use crate::traits::CacheEntry;

pub const CARD_ROUTE: &str = "/api/ai-card";

/// Upper bound on requested card length.
const MAX_WORDS_LIMIT: u32 = 200;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CardTone {
    #[default]
    Romantic,
    Formal,
    Cheerful,
}

impl CardTone {
    pub fn as_str(&self) -> &'static str {
        match self {
            CardTone::Romantic => "romantic",
            CardTone::Formal => "formal",
            CardTone::Cheerful => "cheerful",
        }
    }
}

/// Caller input. Missing fields take the `[card]` defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CardRequest {
    pub occasion: Option<String>,
    pub recipient: Option<String>,
    pub tone: Option<CardTone>,
    pub max_words: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CardText {
    pub text: String,
    pub cached: bool,
}

pub struct CardWriter {
    deps: ChatDeps,
}

impl CardWriter {
    pub fn new(deps: ChatDeps) -> Self {
        Self { deps }
    }

    pub async fn write(&self, request: &CardRequest) -> Result<CardText, TurnError> {
        if request.max_words == Some(0) {
            return Err(TurnError::Validation("maxWords must be at least 1".to_string()));
        }

        let config = &self.deps.file_config.card;
        let timeouts = &self.deps.file_config.timeouts;
        let model = self.deps.generator.model().to_string();
        let key = cache::cache_key(CARD_ROUTE, &model, request);
        let max_age = Duration::from_secs(config.cache_ttl_secs);

        if let Some(text) = cache::lookup(&self.deps, &key, max_age).await {
            return Ok(CardText { text, cached: true });
        }

        let started = Instant::now();
        let prompt = self.prompt(request);
        let text = match run_stage(
            TurnStage::InvokeModel,
            timeouts.generation(),
            self.deps.generator.generate(&prompt, &GenerationConfig::default()),
        )
        .await
        {
            Ok(text) => text.trim().to_string(),
            Err(e) => {
                warn!(error = %e, "Card generation failed");
                let input = serde_json::json!({ "error": true, "stage": e.stage() });
                let entry = AiLogEntry::new(CARD_ROUTE, model, input, &e.to_string(), started);
                record_best_effort(self.deps.ai_log.as_ref(), entry).await;
                return Err(e);
            }
        };

        let input = serde_json::to_value(request).unwrap_or_default();
        let entry = AiLogEntry::new(CARD_ROUTE, model.clone(), input.clone(), &text, started);
        record_best_effort(self.deps.ai_log.as_ref(), entry).await;

        cache::remember(
            &self.deps,
            CacheEntry {
                key,
                route: CARD_ROUTE.to_string(),
                model,
                input,
                output: text.clone(),
            },
        )
        .await;

        Ok(CardText { text, cached: false })
    }

    fn prompt(&self, request: &CardRequest) -> String {
        let config = &self.deps.file_config.card;
        let language = &self.deps.file_config.chat.reply_language;
        let tone = request.tone.unwrap_or_default();
        let max_words = request
            .max_words
            .unwrap_or(config.default_max_words)
            .min(MAX_WORDS_LIMIT);
        let occasion = non_blank(request.occasion.as_deref()).unwrap_or(&config.default_occasion);
        let recipient =
            non_blank(request.recipient.as_deref()).unwrap_or(&config.default_recipient);

        format!(
            "Write a one-paragraph greeting card message in {language}: warm, polite, no emoji.\n\
             Tone: {tone}.\n\
             Maximum length: {max_words} words.\n\n\
             Occasion: {occasion}\n\
             For: {recipient}",
            tone = tone.as_str(),
        )
    }
}

pub(crate) fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}
