//! Free-text product recommendations and cart upsell suggestions.
//!
//! Both hand a slice of the catalog to the model and return its prose.
//! Recommendations go through the response cache; upsell depends on the
//! live cart and is always generated.

use std::sync::LazyLock;
use std::time::{Duration, Instant};

use ai_client::GenerationConfig;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{info, warn};

use bloomify_common::CandidateProduct;

use crate::ai_log::{record_best_effort, AiLogEntry};
use crate::cache;
use crate::card::non_blank;
use crate::deps::ChatDeps;
use crate::error::{run_stage, TurnError, TurnStage};
use crate::traits::CacheEntry;

pub const RECOMMEND_ROUTE: &str = "/api/ai";
pub const UPSELL_ROUTE: &str = "/api/ai-upsell";

/// Returned when the model produces nothing usable.
pub const NO_RECOMMENDATION: &str = "Tidak ada respons dari AI.";
pub const NO_UPSELL: &str = "Tidak ada saran.";

/// Prefix on the AI log output of a cache hit.
const CACHE_HIT_MARKER: &str = "[CACHE] ";

static SLUG_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bslug:\s*([a-z0-9][a-z0-9-]*)").unwrap());

/// Shopper preferences, all optional and passed through as typed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecommendRequest {
    pub occasion: Option<String>,
    pub budget: Option<String>,
    pub colors: Option<String>,
    pub recipient: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Recommendation {
    pub text: String,
    pub cached: bool,
    /// Slugs named on `slug:` lines, in order of first mention.
    pub slugs: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartLine {
    pub slug: String,
    #[serde(default = "one")]
    pub qty: u32,
}

fn one() -> u32 {
    1
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpsellRequest {
    #[serde(default)]
    pub lines: Vec<CartLine>,
    pub budget_extra: Option<f64>,
}

/// Slugs from `slug:<slug>` lines, lowercased and deduplicated.
/// `slug:-` (no fitting product) is skipped.
pub fn recommended_slugs(text: &str) -> Vec<String> {
    let mut slugs: Vec<String> = Vec::new();
    for caps in SLUG_LINE.captures_iter(text) {
        let slug = caps[1].to_lowercase();
        if !slugs.contains(&slug) {
            slugs.push(slug);
        }
    }
    slugs
}

pub struct RecommendWriter {
    deps: ChatDeps,
}

impl RecommendWriter {
    pub fn new(deps: ChatDeps) -> Self {
        Self { deps }
    }

    /// Three catalog picks for the given preferences.
    pub async fn recommend(&self, request: &RecommendRequest) -> Result<Recommendation, TurnError> {
        let config = &self.deps.file_config.recommend;
        let timeouts = &self.deps.file_config.timeouts;
        let model = self.deps.generator.model().to_string();
        let key = cache::cache_key(RECOMMEND_ROUTE, &model, request);
        let input = serde_json::to_value(request).unwrap_or_default();
        let started = Instant::now();

        let max_age = Duration::from_secs(config.cache_ttl_secs);
        if let Some(text) = cache::lookup(&self.deps, &key, max_age).await {
            let output = format!("{CACHE_HIT_MARKER}{text}");
            let entry = AiLogEntry::new(RECOMMEND_ROUTE, model, input, &output, started);
            record_best_effort(self.deps.ai_log.as_ref(), entry).await;
            return Ok(Recommendation {
                slugs: recommended_slugs(&text),
                text,
                cached: true,
            });
        }

        let result = async {
            let products = run_stage(
                TurnStage::LoadCatalog,
                timeouts.store(),
                self.deps.catalog.list_products(config.catalog_size),
            )
            .await?;
            let prompt = self.recommend_prompt(request, &products);
            let options = GenerationConfig::default()
                .temperature(config.temperature)
                .max_output_tokens(config.max_output_tokens);
            run_stage(
                TurnStage::InvokeModel,
                timeouts.generation(),
                self.deps.generator.generate(&prompt, &options),
            )
            .await
        }
        .await;

        let generated = match result {
            Ok(text) => text.trim().to_string(),
            Err(e) => return Err(self.log_failure(RECOMMEND_ROUTE, model, e, started).await),
        };

        let entry = AiLogEntry::new(RECOMMEND_ROUTE, model.clone(), input.clone(), &generated, started);
        record_best_effort(self.deps.ai_log.as_ref(), entry).await;

        if generated.is_empty() {
            warn!("Recommendation came back blank");
            return Ok(Recommendation {
                text: NO_RECOMMENDATION.to_string(),
                cached: false,
                slugs: Vec::new(),
            });
        }

        cache::remember(
            &self.deps,
            CacheEntry {
                key,
                route: RECOMMEND_ROUTE.to_string(),
                model,
                input,
                output: generated.clone(),
            },
        )
        .await;

        let slugs = recommended_slugs(&generated);
        info!(slugs = slugs.len(), "Recommendation generated");
        Ok(Recommendation {
            text: generated,
            cached: false,
            slugs,
        })
    }

    /// Add-on suggestions for the products already in the cart.
    pub async fn upsell(&self, request: &UpsellRequest) -> Result<String, TurnError> {
        if let Some(extra) = request.budget_extra {
            if !(extra.is_finite() && extra > 0.0) {
                return Err(TurnError::Validation(
                    "budgetExtra must be a positive number".to_string(),
                ));
            }
        }

        let config = &self.deps.file_config.recommend;
        let timeouts = &self.deps.file_config.timeouts;
        let model = self.deps.generator.model().to_string();
        let started = Instant::now();
        let slugs: Vec<String> = request.lines.iter().map(|l| l.slug.clone()).collect();

        let result = async {
            let in_cart = run_stage(
                TurnStage::LoadCatalog,
                timeouts.store(),
                self.deps.catalog.products_by_slugs(&slugs),
            )
            .await?;
            let pool = run_stage(
                TurnStage::LoadCatalog,
                timeouts.store(),
                self.deps.catalog.list_products(config.upsell_pool_size),
            )
            .await?;
            let prompt = self.upsell_prompt(&in_cart, &pool, request.budget_extra);
            run_stage(
                TurnStage::InvokeModel,
                timeouts.generation(),
                self.deps.generator.generate(&prompt, &GenerationConfig::default()),
            )
            .await
        }
        .await;

        let generated = match result {
            Ok(text) => text.trim().to_string(),
            Err(e) => return Err(self.log_failure(UPSELL_ROUTE, model, e, started).await),
        };

        let input = json!({ "slugs": slugs, "budget_extra": request.budget_extra });
        let entry = AiLogEntry::new(UPSELL_ROUTE, model, input, &generated, started);
        record_best_effort(self.deps.ai_log.as_ref(), entry).await;

        if generated.is_empty() {
            return Ok(NO_UPSELL.to_string());
        }
        Ok(generated)
    }

    async fn log_failure(
        &self,
        route: &str,
        model: String,
        e: TurnError,
        started: Instant,
    ) -> TurnError {
        warn!(route, error = %e, stage = ?e.stage(), "Generation request failed");
        let input = json!({ "error": true, "stage": e.stage() });
        let entry = AiLogEntry::new(route, model, input, &e.to_string(), started);
        record_best_effort(self.deps.ai_log.as_ref(), entry).await;
        e
    }

    fn recommend_prompt(&self, request: &RecommendRequest, products: &[CandidateProduct]) -> String {
        let language = &self.deps.file_config.chat.reply_language;
        let field = |value: &Option<String>| non_blank(value.as_deref()).unwrap_or("-").to_string();
        format!(
            "You are a florist assistant. Give 3 recommendations in {language}, as bullet points.\n\
             For every option:\n\
             - Include a line: slug:<product-slug> (no space after the colon, all lowercase).\n\
             - If no product fits, write slug:-.\n\
             Example of one bullet:\n\
             Name | reason | price\n\
             slug:classic-white-vase\n\
             End with a short flower care tip.\n\n\
             Occasion: {occasion}\n\
             Budget: Rp {budget}\n\
             Colors: {colors}\n\
             For: {recipient}\n\
             Products:\n{list}",
            occasion = field(&request.occasion),
            budget = field(&request.budget),
            colors = field(&request.colors),
            recipient = field(&request.recipient),
            list = product_lines(products),
        )
    }

    fn upsell_prompt(
        &self,
        in_cart: &[CandidateProduct],
        pool: &[CandidateProduct],
        budget_extra: Option<f64>,
    ) -> String {
        let language = &self.deps.file_config.chat.reply_language;
        let cart = if in_cart.is_empty() {
            "(empty)".to_string()
        } else {
            product_lines(in_cart)
        };
        let budget = budget_extra.map_or_else(|| "not set".to_string(), |b| format!("Rp {b:.0}"));
        format!(
            "You are a florist sales assistant. Suggest 1-3 short upsell add-ons that suit the cart.\n\
             Consider theme and price fit. Answer in {language}, as bullet points:\n\
             - Product name | short reason | price | slug:<product-slug>\n\
             If an extra budget is set, keep the suggestions' total within it.\n\n\
             Cart:\n{cart}\n\
             Available products:\n{pool}\n\
             Extra budget: {budget}",
            pool = product_lines(pool),
        )
    }
}

fn product_lines(products: &[CandidateProduct]) -> String {
    products
        .iter()
        .map(|p| format!("- {} (Rp {:.0}) slug:{}", p.name, p.price, p.slug))
        .collect::<Vec<_>>()
        .join("\n")
}
