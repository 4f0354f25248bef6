use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::BloomifyError;

// --- Session ---

/// Opaque chat session token.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    /// Fresh random session id.
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Wrap a caller-supplied token. Blank tokens are rejected.
    pub fn parse(raw: &str) -> Result<Self, BloomifyError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(BloomifyError::Validation("sessionId is required".to_string()));
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// --- Enums ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Occasion {
    GetWell,
    Condolence,
    Graduation,
    Birthday,
    Anniversary,
    Romance,
    NewBaby,
    ThankYou,
}

impl Occasion {
    pub const ALL: [Occasion; 8] = [
        Occasion::GetWell,
        Occasion::Condolence,
        Occasion::Graduation,
        Occasion::Birthday,
        Occasion::Anniversary,
        Occasion::Romance,
        Occasion::NewBaby,
        Occasion::ThankYou,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Occasion::GetWell => "get_well",
            Occasion::Condolence => "condolence",
            Occasion::Graduation => "graduation",
            Occasion::Birthday => "birthday",
            Occasion::Anniversary => "anniversary",
            Occasion::Romance => "romance",
            Occasion::NewBaby => "new_baby",
            Occasion::ThankYou => "thank_you",
        }
    }
}

impl fmt::Display for Occasion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Occasion {
    type Err = BloomifyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Occasion::ALL
            .into_iter()
            .find(|o| o.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| BloomifyError::Validation(format!("unknown occasion: {s}")))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Color {
    White,
    Yellow,
    Pink,
    Purple,
    Red,
    Blue,
    Green,
}

impl Color {
    pub fn as_str(&self) -> &'static str {
        match self {
            Color::White => "white",
            Color::Yellow => "yellow",
            Color::Pink => "pink",
            Color::Purple => "purple",
            Color::Red => "red",
            Color::Blue => "blue",
            Color::Green => "green",
        }
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// --- Slots ---

/// Structured intent accumulated across a session.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Slots {
    pub occasion: Option<Occasion>,
    pub budget: Option<f64>,
    pub colors: Option<Vec<Color>>,
}

/// Partial slots extracted from a single turn. `None` means "not mentioned".
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SlotUpdate {
    pub occasion: Option<Occasion>,
    pub budget: Option<f64>,
    pub colors: Option<Vec<Color>>,
}

impl SlotUpdate {
    pub fn is_empty(&self) -> bool {
        self.occasion.is_none() && self.budget.is_none() && self.colors.is_none()
    }
}

// --- Messages ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChatRole {
    User,
    Assistant,
}

impl ChatRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChatRole::User => "user",
            ChatRole::Assistant => "assistant",
        }
    }
}

impl FromStr for ChatRole {
    type Err = BloomifyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(ChatRole::User),
            "assistant" => Ok(ChatRole::Assistant),
            other => Err(BloomifyError::Database(format!("unknown chat role: {other}"))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Assistant,
            content: content.into(),
        }
    }
}

// --- Catalog ---

/// A product eligible for recommendation during one turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateProduct {
    pub id: Uuid,
    pub slug: String,
    pub name: String,
    pub price: f64,
    pub image_url: Option<String>,
}

/// Semantic search hit with a 0..1 similarity (re-ranked score after boosting).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredProduct {
    pub id: Uuid,
    pub slug: String,
    pub name: String,
    pub description: Option<String>,
    pub price: f64,
    pub image_url: Option<String>,
    pub similarity: f64,
}

// --- Tool calls ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolAction {
    AddToCart,
    None,
}

impl ToolAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            ToolAction::AddToCart => "add_to_cart",
            ToolAction::None => "none",
        }
    }
}

/// Structured action decoded from model output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub answer: String,
    pub action: ToolAction,
    pub slug: Option<String>,
    pub qty: Option<u32>,
}

impl ToolCall {
    /// Reply-only tool call.
    pub fn reply(answer: impl Into<String>) -> Self {
        Self {
            answer: answer.into(),
            action: ToolAction::None,
            slug: None,
            qty: None,
        }
    }
}

/// Caller-facing "add to cart" affordance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CartTool {
    pub action: ToolAction,
    pub slug: Option<String>,
    pub qty: Option<u32>,
}

/// Caller-facing outcome of one chat turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TurnReply {
    pub answer: String,
    pub tool: Option<CartTool>,
}
