use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use sqlx::types::Json;

use super::PgStore;
use crate::traits::{CacheEntry, ResponseCache};

#[async_trait]
impl ResponseCache for PgStore {
    async fn get(&self, key: &str, max_age: Duration) -> Result<Option<String>> {
        // Lookup and hit count in one statement; stale rows are left untouched.
        let output = sqlx::query_scalar::<_, String>(
            r#"
            UPDATE ai_cache
            SET hits = hits + 1
            WHERE key = $1
              AND created_at > now() - make_interval(secs => $2)
            RETURNING output_text
            "#,
        )
        .bind(key)
        .bind(max_age.as_secs_f64())
        .fetch_optional(&self.pool)
        .await?;
        Ok(output)
    }

    async fn put(&self, entry: &CacheEntry) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO ai_cache (key, route, model, input_json, output_text)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (key)
            DO UPDATE SET route = EXCLUDED.route,
                          model = EXCLUDED.model,
                          input_json = EXCLUDED.input_json,
                          output_text = EXCLUDED.output_text,
                          hits = 0,
                          created_at = now()
            "#,
        )
        .bind(&entry.key)
        .bind(&entry.route)
        .bind(&entry.model)
        .bind(Json(&entry.input))
        .bind(&entry.output)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
