use anyhow::Result;
use async_trait::async_trait;
use sqlx::types::Json;

use super::PgStore;
use crate::ai_log::AiLogEntry;
use crate::traits::AiLogSink;

#[async_trait]
impl AiLogSink for PgStore {
    async fn record(&self, entry: &AiLogEntry) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO ai_logs (route, model, input_json, output_text, latency_ms)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(&entry.route)
        .bind(&entry.model)
        .bind(Json(&entry.input))
        .bind(&entry.output)
        .bind(entry.latency_ms.max(0))
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
