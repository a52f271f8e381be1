use chrono::{DateTime, Utc};

use crate::feedback::{Classification, IncomingFeedback, NewRecord};

/// Combine an item and its classification into an insertable record.
/// `now` should be taken right before the insert, not when the batch arrived.
pub fn assemble(
    item: &IncomingFeedback,
    classification: Classification,
    now: DateTime<Utc>,
) -> NewRecord {
    NewRecord {
        source: item.source.clone(),
        content: item.content.clone(),
        sentiment: classification.sentiment,
        theme: classification.theme,
        timestamp: now,
    }
}
