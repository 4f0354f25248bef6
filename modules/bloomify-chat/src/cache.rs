//! Response-cache plumbing shared by the card and recommendation writers.
//!
//! The cache is never fatal: read failures become misses and write failures
//! are logged. Blank outputs are neither served nor stored, so a blocked or
//! empty generation does not stick for the whole TTL.

use std::time::Duration;

use serde::Serialize;
use sha2::{Digest, Sha256};
use tracing::{info, warn};

use crate::deps::ChatDeps;
use crate::error::{run_stage, TurnStage};
use crate::traits::CacheEntry;

/// Lowercase hex SHA-256 of `{"route","model","input"}`.
pub fn cache_key<T: Serialize>(route: &str, model: &str, input: &T) -> String {
    let raw = serde_json::json!({ "route": route, "model": model, "input": input });
    hex::encode(Sha256::digest(raw.to_string().as_bytes()))
}

/// Cached output for `key` younger than `max_age`.
pub(crate) async fn lookup(deps: &ChatDeps, key: &str, max_age: Duration) -> Option<String> {
    let lookup = run_stage(
        TurnStage::ReadCache,
        deps.file_config.timeouts.store(),
        deps.cache.get(key, max_age),
    )
    .await;
    match lookup {
        Ok(Some(text)) if !text.trim().is_empty() => {
            info!(cache_key = %key, "Served from response cache");
            Some(text)
        }
        Ok(Some(_)) => {
            warn!(cache_key = %key, "Ignoring blank cached output");
            None
        }
        Ok(None) => None,
        Err(e) => {
            warn!(cache_key = %key, error = %e, "Response cache lookup failed, generating fresh");
            None
        }
    }
}

/// Store a fresh generation. Blank output is skipped.
pub(crate) async fn remember(deps: &ChatDeps, entry: CacheEntry) {
    if entry.output.trim().is_empty() {
        warn!(cache_key = %entry.key, route = %entry.route, "Not caching blank output");
        return;
    }
    let stored = run_stage(
        TurnStage::WriteCache,
        deps.file_config.timeouts.store(),
        deps.cache.put(&entry),
    )
    .await;
    if let Err(e) = stored {
        warn!(cache_key = %entry.key, error = %e, "Failed to store response in cache");
    }
}
