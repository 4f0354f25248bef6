//! Postgres implementation of the store-backed collaborator traits.
//!
//! Tables and retrieval functions come from `migrations/`.

mod ai_cache;
mod ai_logs;
mod catalog;
mod sessions;

use sqlx::PgPool;

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// `LIMIT` parameter from a `usize`.
fn sql_limit(limit: usize) -> i64 {
    i64::try_from(limit).unwrap_or(i64::MAX)
}

/// `match_count` argument of the retrieval functions (SQL `INTEGER`).
fn sql_count(count: usize) -> i32 {
    i32::try_from(count).unwrap_or(i32::MAX)
}
