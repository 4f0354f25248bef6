use anyhow::Result;
use async_trait::async_trait;
use sqlx::types::Json;

use bloomify_common::{ChatMessage, ChatRole, SessionId, SlotUpdate, Slots};

use super::{sql_limit, PgStore};
use crate::session::merge_slots;
use crate::traits::SessionStore;

#[async_trait]
impl SessionStore for PgStore {
    async fn create_session(&self) -> Result<SessionId> {
        let id = SessionId::generate();
        sqlx::query("INSERT INTO chat_sessions (id) VALUES ($1)")
            .bind(id.as_str())
            .execute(&self.pool)
            .await?;
        Ok(id)
    }

    async fn load_slots(&self, session: &SessionId) -> Result<Slots> {
        let row: Option<(Json<Slots>,)> =
            sqlx::query_as("SELECT slots FROM chat_sessions WHERE id = $1")
                .bind(session.as_str())
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.map(|(Json(slots),)| slots).unwrap_or_default())
    }

    async fn merge_and_save(&self, session: &SessionId, update: &SlotUpdate) -> Result<Slots> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("INSERT INTO chat_sessions (id) VALUES ($1) ON CONFLICT (id) DO NOTHING")
            .bind(session.as_str())
            .execute(&mut *tx)
            .await?;

        // Row lock serializes concurrent turns on the same session.
        let (Json(prev),): (Json<Slots>,) =
            sqlx::query_as("SELECT slots FROM chat_sessions WHERE id = $1 FOR UPDATE")
                .bind(session.as_str())
                .fetch_one(&mut *tx)
                .await?;

        let merged = merge_slots(&prev, update);

        sqlx::query("UPDATE chat_sessions SET slots = $2, updated_at = now() WHERE id = $1")
            .bind(session.as_str())
            .bind(Json(&merged))
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(merged)
    }

    async fn append_message(
        &self,
        session: &SessionId,
        role: ChatRole,
        content: &str,
    ) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("INSERT INTO chat_sessions (id) VALUES ($1) ON CONFLICT (id) DO NOTHING")
            .bind(session.as_str())
            .execute(&mut *tx)
            .await?;

        sqlx::query("INSERT INTO chat_messages (session_id, role, content) VALUES ($1, $2, $3)")
            .bind(session.as_str())
            .bind(role.as_str())
            .bind(content)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn recent_messages(&self, session: &SessionId, limit: usize) -> Result<Vec<ChatMessage>> {
        let rows: Vec<(String, String)> = sqlx::query_as(
            r#"
            SELECT role, content FROM (
                SELECT id, role, content
                FROM chat_messages
                WHERE session_id = $1
                ORDER BY id DESC
                LIMIT $2
            ) recent
            ORDER BY id ASC
            "#,
        )
        .bind(session.as_str())
        .bind(sql_limit(limit))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|(role, content)| {
                Ok(ChatMessage {
                    role: role.parse::<ChatRole>()?,
                    content,
                })
            })
            .collect()
    }
}
