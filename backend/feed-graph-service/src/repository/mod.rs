mod graph_repository;
mod memory_repository;
mod r#trait;

pub use graph_repository::Neo4jFeedStore;
pub use memory_repository::InMemoryFeedStore;
pub use r#trait::FeedGraphStore;

use anyhow::{Context, Result};
use chrono::{DateTime, TimeZone, Utc};

/// Timestamps live in the graph as epoch milliseconds so that
/// `ORDER BY created_at` is a plain integer sort.
pub(crate) fn to_millis(at: DateTime<Utc>) -> i64 {
    at.timestamp_millis()
}

pub(crate) fn from_millis(millis: i64) -> Result<DateTime<Utc>> {
    Utc.timestamp_millis_opt(millis)
        .single()
        .with_context(|| format!("Invalid timestamp: {}", millis))
}
