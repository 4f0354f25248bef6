//! Candidate retrieval: semantic first, cheapest-first fallback.

use std::sync::{Arc, LazyLock};

use anyhow::Result;
use regex::Regex;
use tracing::{debug, info};

use bloomify_common::file_config::ChatConfig;
use bloomify_common::{CandidateProduct, Color, Occasion, Slots};

use crate::slots::detect_colors;
use crate::traits::Catalog;

// ---------------------------------------------------------------------------
// Occasion guards
// ---------------------------------------------------------------------------

const CONDOLENCE_TERMS: &str = r"(?i)wreath|sympathy|condolence|funeral|duka";

/// Products whose `"{slug} {name}"` matches are never offered for the occasion.
const BAN_PATTERNS: &[(Occasion, &str)] = &[
    (Occasion::GetWell, r"(?i)wreath|sympathy|condolence|funeral|graduation"),
    (Occasion::Birthday, CONDOLENCE_TERMS),
    (Occasion::Anniversary, CONDOLENCE_TERMS),
    (Occasion::Romance, CONDOLENCE_TERMS),
    (Occasion::NewBaby, CONDOLENCE_TERMS),
];

static BAN_RULES: LazyLock<Vec<(Occasion, Regex)>> = LazyLock::new(|| {
    BAN_PATTERNS
        .iter()
        .map(|(occasion, pattern)| (*occasion, Regex::new(pattern).unwrap()))
        .collect()
});

/// Extra instruction for the model on occasions with sensitive themes.
pub fn safety_instruction(occasion: Option<Occasion>) -> Option<&'static str> {
    match occasion? {
        Occasion::GetWell => Some(
            "Never recommend products themed 'wreath', 'sympathy', 'condolence', 'funeral' or \
             'graduation'. Prefer bright bouquets (yellow, white, pastel).",
        ),
        Occasion::Condolence => Some(
            "Keep the tone calm and respectful. Prefer white or soft-colored arrangements and \
             avoid festive wording.",
        ),
        Occasion::Birthday | Occasion::Anniversary | Occasion::Romance | Occasion::NewBaby => {
            Some("Never recommend condolence-themed products (wreaths, sympathy or funeral arrangements).")
        }
        Occasion::Graduation | Occasion::ThankYou => None,
    }
}

pub fn is_banned(occasion: Option<Occasion>, product: &CandidateProduct) -> bool {
    let Some(occasion) = occasion else {
        return false;
    };
    BAN_RULES
        .iter()
        .filter(|(o, _)| *o == occasion)
        .any(|(_, re)| re.is_match(&format!("{} {}", product.slug, product.name)))
}

/// Drop products banned for the occasion, keeping order.
pub fn filter_occasion(
    products: Vec<CandidateProduct>,
    occasion: Option<Occasion>,
) -> Vec<CandidateProduct> {
    products
        .into_iter()
        .filter(|p| !is_banned(occasion, p))
        .collect()
}

fn matches_any_color(product: &CandidateProduct, preferred: &[Color]) -> bool {
    detect_colors(&format!("{} {}", product.name, product.slug))
        .is_some_and(|found| found.iter().any(|c| preferred.contains(c)))
}

// ---------------------------------------------------------------------------
// CandidateRetriever
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct Retrieval {
    pub candidates: Vec<CandidateProduct>,
    pub used_fallback: bool,
}

pub struct CandidateRetriever {
    catalog: Arc<dyn Catalog>,
    max_candidates: usize,
    fallback_pool_size: usize,
    budget_slack: f64,
}

impl CandidateRetriever {
    pub fn new(catalog: Arc<dyn Catalog>, config: &ChatConfig) -> Self {
        Self {
            catalog,
            max_candidates: config.max_candidates,
            fallback_pool_size: config.fallback_pool_size,
            budget_slack: config.budget_slack,
        }
    }

    /// At most `max_candidates` products, never one banned for the occasion.
    /// The fallback runs only when the semantic path yields nothing.
    pub async fn retrieve(&self, embedding: &[f32], slots: &Slots) -> Result<Retrieval> {
        let ranked = self
            .catalog
            .similar_products(embedding, slots.occasion, slots.budget, self.max_candidates)
            .await?;
        let ranked_count = ranked.len();
        let mut candidates = filter_occasion(ranked, slots.occasion);

        if !candidates.is_empty() {
            candidates.truncate(self.max_candidates);
            debug!(ranked_count, kept = candidates.len(), "Semantic candidates");
            return Ok(Retrieval {
                candidates,
                used_fallback: false,
            });
        }

        let candidates = self.fallback(slots).await?;
        info!(
            ranked_count,
            kept = candidates.len(),
            occasion = ?slots.occasion,
            "Semantic path empty, using cheapest-first fallback"
        );
        Ok(Retrieval {
            candidates,
            used_fallback: true,
        })
    }

    async fn fallback(&self, slots: &Slots) -> Result<Vec<CandidateProduct>> {
        let ceiling = slots.budget.map(|b| b * self.budget_slack);
        let pool = self
            .catalog
            .cheapest_products(slots.occasion, ceiling, self.fallback_pool_size)
            .await?;
        let mut pool = filter_occasion(pool, slots.occasion);

        if let Some(preferred) = slots.colors.as_deref().filter(|c| !c.is_empty()) {
            let colored: Vec<CandidateProduct> = pool
                .iter()
                .filter(|p| matches_any_color(p, preferred))
                .cloned()
                .collect();
            if !colored.is_empty() {
                pool = colored;
            }
        }

        if pool.is_empty() && ceiling.is_some() {
            let cheapest = self
                .catalog
                .cheapest_products(slots.occasion, None, self.fallback_pool_size)
                .await?;
            pool = filter_occasion(cheapest, slots.occasion);
        }

        pool.truncate(self.max_candidates);
        Ok(pool)
    }
}
