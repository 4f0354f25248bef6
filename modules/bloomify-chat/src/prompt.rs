//! Prompt assembly for one chat turn.
//!
//! The system block carries the JSON reply contract and the closed list of
//! slugs the model may pick from; the user block carries the question and
//! its context.

use bloomify_common::{CandidateProduct, ChatMessage, ChatRole, Slots};

use crate::retrieval::safety_instruction;

/// Everything the composer reads for one turn.
#[derive(Debug, Clone, Copy)]
pub struct PromptContext<'a> {
    pub text: &'a str,
    pub slots: &'a Slots,
    pub candidates: &'a [CandidateProduct],
    pub knowledge: &'a [String],
    pub history: &'a [ChatMessage],
    pub reply_language: &'a str,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ComposedPrompt {
    pub system: String,
    pub user: String,
}

impl ComposedPrompt {
    /// Single-string form sent to the generator.
    pub fn to_text(&self) -> String {
        format!("{}\n\n{}", self.system, self.user)
    }
}

pub fn compose(ctx: &PromptContext<'_>) -> ComposedPrompt {
    ComposedPrompt {
        system: system_block(ctx),
        user: user_block(ctx),
    }
}

fn system_block(ctx: &PromptContext<'_>) -> String {
    let slots = ctx.slots;
    let occasion = slots.occasion.map_or("null", |o| o.as_str());
    let budget = slots.budget.map_or_else(|| "null".to_string(), format_price);
    let colors = match slots.colors.as_deref() {
        Some(colors) if !colors.is_empty() => colors
            .iter()
            .map(|c| c.as_str())
            .collect::<Vec<_>>()
            .join("/"),
        _ => "null".to_string(),
    };

    let selection_rule = if ctx.candidates.is_empty() {
        "The ALLOWED list is empty: action MUST be \"none\" and slug must be omitted. \
         Do not invent products."
            .to_string()
    } else {
        let slugs = ctx
            .candidates
            .iter()
            .map(|p| p.slug.as_str())
            .collect::<Vec<_>>()
            .join(", ");
        format!(
            "Pick exactly one product from the ALLOWED list (action=\"add_to_cart\"). \
             slug MUST be one of: [{slugs}]."
        )
    };

    let mut system = format!(
        r#"Reply with pure JSON only:
{{
  "answer": "short friendly reply in {lang}, 1-3 sentences",
  "action": "add_to_cart" | "none",
  "slug": "<slug when add_to_cart>",
  "qty": <at least 1 when add_to_cart>
}}
Consider occasion={occasion}, budget={budget}, colors={colors}.
{selection_rule}"#,
        lang = ctx.reply_language,
    );
    if let Some(instruction) = safety_instruction(slots.occasion) {
        system.push('\n');
        system.push_str(instruction);
    }
    system
}

fn user_block(ctx: &PromptContext<'_>) -> String {
    let products = if ctx.candidates.is_empty() {
        "(empty)".to_string()
    } else {
        ctx.candidates
            .iter()
            .map(|p| format!("- {} | slug:{} | price:{}", p.name, p.slug, format_price(p.price)))
            .collect::<Vec<_>>()
            .join("\n")
    };

    let knowledge = if ctx.knowledge.is_empty() {
        "(none)".to_string()
    } else {
        ctx.knowledge
            .iter()
            .enumerate()
            .map(|(i, k)| format!("KB#{}: {}", i + 1, k))
            .collect::<Vec<_>>()
            .join("\n---\n")
    };

    let history = ctx
        .history
        .iter()
        .map(|m| {
            let speaker = match m.role {
                ChatRole::User => "User",
                ChatRole::Assistant => "Assistant",
            };
            format!("{speaker}: {}", m.content)
        })
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "Question: {}\nALLOWED products:\n{products}\nStore knowledge (KB):\n{knowledge}\nHistory:\n{history}",
        ctx.text
    )
    .trim_end()
    .to_string()
}

/// Whole amounts print without a fractional part.
fn format_price(price: f64) -> String {
    if price.fract() == 0.0 && price.abs() < 1e15 {
        format!("{price:.0}")
    } else {
        price.to_string()
    }
}
