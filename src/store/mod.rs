pub mod sqlite;

use anyhow::Result;
use async_trait::async_trait;

use crate::feedback::{FeedbackRecord, NewRecord};

/// Where classified feedback ends up. Append-only: records are never
/// updated or deleted.
#[async_trait]
pub trait FeedbackStore: Send + Sync {
    /// Insert one row and return the id the store assigned to it.
    async fn insert(&self, record: &NewRecord) -> Result<i64>;
    /// All rows, newest first (timestamp descending, then id descending).
    async fn list(&self) -> Result<Vec<FeedbackRecord>>;
}
