use std::time::Instant;

use serde::Serialize;
use tracing::warn;

use crate::traits::AiLogSink;

/// Max bytes of model output kept in a log record.
pub const OUTPUT_PREVIEW_BYTES: usize = 200;

/// One model call, as written to the `ai_logs` table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AiLogEntry {
    pub route: String,
    pub model: String,
    pub input: serde_json::Value,
    pub output: String,
    pub latency_ms: i64,
}

impl AiLogEntry {
    /// Build an entry; `output` is cut to [`OUTPUT_PREVIEW_BYTES`].
    pub fn new(
        route: impl Into<String>,
        model: impl Into<String>,
        input: serde_json::Value,
        output: &str,
        started: Instant,
    ) -> Self {
        Self {
            route: route.into(),
            model: model.into(),
            input,
            output: preview(output).to_string(),
            latency_ms: started.elapsed().as_millis().try_into().unwrap_or(i64::MAX),
        }
    }
}

/// Longest prefix of `output` within [`OUTPUT_PREVIEW_BYTES`] ending on a char boundary.
fn preview(output: &str) -> &str {
    let end = output
        .char_indices()
        .map(|(i, c)| i + c.len_utf8())
        .take_while(|&end| end <= OUTPUT_PREVIEW_BYTES)
        .last()
        .unwrap_or(0);
    &output[..end]
}

/// Write an entry, reporting failures only through tracing.
pub async fn record_best_effort(sink: &dyn AiLogSink, entry: AiLogEntry) {
    if let Err(e) = sink.record(&entry).await {
        warn!(error = %e, route = %entry.route, "Failed to write AI log");
    }
}
