pub mod error;
pub mod gemini;
pub mod traits;

pub use error::AiError;
pub use gemini::Gemini;
pub use traits::{EmbedAgent, GenerateAgent, GenerationConfig};
