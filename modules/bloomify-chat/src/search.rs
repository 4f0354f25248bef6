//! Semantic product search with occasion-aware query expansion and re-ranking.

use serde::Deserialize;
use tracing::info;

use bloomify_common::{Occasion, ScoredProduct};

use crate::deps::ChatDeps;
use crate::error::{run_stage, TurnError, TurnStage};
use crate::slots::detect_occasion;

const MAX_K: usize = 100;

const GRADUATION_TERMS: &[&str] = &[
    "wisuda",
    "kelulusan",
    "lulus",
    "toga",
    "sarjana",
    "graduation",
    "yudisium",
    "congrats",
];

const CONDOLENCE_TERMS: &[&str] = &[
    "duka",
    "belasungkawa",
    "pemakaman",
    "takziah",
    "wreath",
    "sympathy",
    "condolence",
    "funeral",
];

const GRADUATION_BONUS: f64 = 0.2;
const CONDOLENCE_PENALTY_FOR_GRADUATION: f64 = 0.4;
const CONDOLENCE_BONUS: f64 = 0.2;
const GRADUATION_PENALTY_FOR_CONDOLENCE: f64 = 0.25;

/// Extra terms appended to a query with a detected occasion.
fn vocabulary(occasion: Occasion) -> &'static [&'static str] {
    match occasion {
        Occasion::Graduation => GRADUATION_TERMS,
        Occasion::Condolence => CONDOLENCE_TERMS,
        Occasion::GetWell => &["lekas sembuh", "get well", "cepat sembuh"],
        Occasion::Birthday => &["ulang tahun", "ultah", "birthday", "happy birthday"],
        Occasion::Anniversary | Occasion::Romance => {
            &["romantis", "valentine", "anniversary", "cinta", "romance"]
        }
        Occasion::NewBaby => &["bayi", "newborn", "kelahiran", "new baby"],
        Occasion::ThankYou => &["terima kasih", "apresiasi", "thank you"],
    }
}

pub fn expand_query(q: &str) -> (Option<Occasion>, String) {
    match detect_occasion(q) {
        Some(intent) => (Some(intent), format!("{q} {}", vocabulary(intent).join(" "))),
        None => (None, q.to_string()),
    }
}

fn mentions_any(text: &str, terms: &[&str]) -> bool {
    terms.iter().any(|t| text.contains(t))
}

/// Boost on-theme items, penalise clashing ones, sort by score descending.
pub fn rerank(intent: Option<Occasion>, items: Vec<ScoredProduct>) -> Vec<ScoredProduct> {
    let mut items: Vec<ScoredProduct> = items
        .into_iter()
        .map(|mut p| {
            let text = format!("{} {}", p.name, p.description.as_deref().unwrap_or(""))
                .to_lowercase();
            let graduation = mentions_any(&text, GRADUATION_TERMS);
            let condolence = mentions_any(&text, CONDOLENCE_TERMS);
            match intent {
                Some(Occasion::Graduation) => {
                    if graduation {
                        p.similarity += GRADUATION_BONUS;
                    }
                    if condolence {
                        p.similarity -= CONDOLENCE_PENALTY_FOR_GRADUATION;
                    }
                }
                Some(Occasion::Condolence) => {
                    if condolence {
                        p.similarity += CONDOLENCE_BONUS;
                    }
                    if graduation {
                        p.similarity -= GRADUATION_PENALTY_FOR_CONDOLENCE;
                    }
                }
                _ => {}
            }
            p
        })
        .collect();
    items.sort_by(|a, b| b.similarity.total_cmp(&a.similarity));
    items
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchRequest {
    #[serde(default)]
    pub q: String,
    pub k: Option<usize>,
    pub max_price: Option<f64>,
}

pub struct ProductSearch {
    deps: ChatDeps,
}

impl ProductSearch {
    pub fn new(deps: ChatDeps) -> Self {
        Self { deps }
    }

    /// A blank query returns nothing without touching the embedder or store.
    pub async fn search(&self, request: &SearchRequest) -> Result<Vec<ScoredProduct>, TurnError> {
        let q = request.q.trim();
        if q.is_empty() {
            return Ok(Vec::new());
        }
        if let Some(max_price) = request.max_price {
            if !(max_price.is_finite() && max_price > 0.0) {
                return Err(TurnError::Validation(
                    "maxPrice must be a positive number".to_string(),
                ));
            }
        }

        let k = request
            .k
            .unwrap_or(self.deps.file_config.search.default_k)
            .clamp(1, MAX_K);
        let timeouts = &self.deps.file_config.timeouts;
        let (intent, expanded) = expand_query(q);

        let embedding = run_stage(
            TurnStage::EmbedQuery,
            timeouts.embedding(),
            self.deps.embedder.embed(&expanded),
        )
        .await?;
        let rows = run_stage(
            TurnStage::SearchCatalog,
            timeouts.store(),
            self.deps.catalog.search_products(&embedding, k, request.max_price),
        )
        .await?;

        info!(intent = ?intent, k, hits = rows.len(), "Product search");
        Ok(rerank(intent, rows))
    }
}
