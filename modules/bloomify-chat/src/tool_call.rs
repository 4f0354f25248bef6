//! Decoding of untrusted model output into a [`ToolCall`].
//!
//! Parsing never fails: strategies are tried in order and the first valid
//! result wins, otherwise the cleaned text becomes a reply-only call.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;

use bloomify_common::{CandidateProduct, CartTool, ToolAction, ToolCall};

/// Reply used when the model produced nothing usable.
pub const FALLBACK_ANSWER: &str = "Maaf, aku belum menemukan jawabannya.";

static FENCE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)```(?:\s*json)?\s*([\s\S]*?)\s*```").unwrap());

static FENCE_MARK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)```(?:\s*json)?").unwrap());

/// Keys accepted for the reply text, in priority order.
const ANSWER_KEYS: [&str; 3] = ["answer", "message", "text"];

type Strategy = fn(&str) -> Option<ToolCall>;

const STRATEGIES: [Strategy; 2] = [parse_whole, parse_outer_braces];

/// Remove code fences and their language tags.
pub fn strip_fence(raw: &str) -> String {
    let inner = FENCE_RE
        .captures(raw)
        .and_then(|caps| caps.get(1))
        .map_or(raw, |m| m.as_str());
    FENCE_MARK_RE.replace_all(inner, "").trim().to_string()
}

pub fn parse_tool_call(raw: &str) -> ToolCall {
    let cleaned = strip_fence(raw);
    let mut call = STRATEGIES
        .iter()
        .find_map(|strategy| strategy(&cleaned))
        .unwrap_or_else(|| ToolCall::reply(cleaned.clone()));
    if call.answer.trim().is_empty() {
        call.answer = FALLBACK_ANSWER.to_string();
    }
    call
}

fn parse_whole(text: &str) -> Option<ToolCall> {
    validate(serde_json::from_str(text).ok()?)
}

fn parse_outer_braces(text: &str) -> Option<ToolCall> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if end <= start {
        return None;
    }
    validate(serde_json::from_str(&text[start..=end]).ok()?)
}

fn validate(value: Value) -> Option<ToolCall> {
    let obj = value.as_object()?;

    let action = match obj.get("action")?.as_str()? {
        "add_to_cart" => ToolAction::AddToCart,
        "none" => ToolAction::None,
        _ => return None,
    };
    let answer = ANSWER_KEYS
        .iter()
        .find_map(|key| obj.get(*key)?.as_str())?
        .to_string();
    let slug = obj
        .get("slug")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string);
    let qty = obj.get("qty").and_then(positive_qty);

    Some(ToolCall {
        answer,
        action,
        slug,
        qty,
    })
}

fn positive_qty(value: &Value) -> Option<u32> {
    if let Some(n) = value.as_u64() {
        return u32::try_from(n).ok().filter(|n| *n > 0);
    }
    let f = value.as_f64()?;
    (f.fract() == 0.0 && f >= 1.0 && f <= f64::from(u32::MAX)).then_some(f as u32)
}

// ---------------------------------------------------------------------------
// Membership check
// ---------------------------------------------------------------------------

/// Downgrade an `add_to_cart` whose slug is missing or outside the turn's
/// candidates to a reply-only call. The answer is kept.
pub fn verify_membership(call: ToolCall, candidates: &[CandidateProduct]) -> ToolCall {
    if call.action != ToolAction::AddToCart {
        return call;
    }
    let member = call
        .slug
        .as_deref()
        .is_some_and(|slug| candidates.iter().any(|p| p.slug == slug));
    if member {
        call
    } else {
        ToolCall::reply(call.answer)
    }
}

/// Caller-facing affordance for a verified call. `qty` defaults to 1.
pub fn cart_tool(call: &ToolCall) -> Option<CartTool> {
    (call.action == ToolAction::AddToCart).then(|| CartTool {
        action: ToolAction::AddToCart,
        slug: call.slug.clone(),
        qty: Some(call.qty.unwrap_or(1)),
    })
}
