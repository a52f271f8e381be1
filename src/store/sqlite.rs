use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{Connection, params};
use std::sync::Mutex;

use super::FeedbackStore;
use crate::feedback::{FeedbackRecord, NewRecord};

/// SQLite-backed feedback store.
///
/// Can share a database file with [`Config`](crate::config::Config).
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    pub fn open(path: &str) -> Result<Self> {
        let conn = Connection::open(path).context("failed to open feedback database")?;
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS feedback (
                id        INTEGER PRIMARY KEY AUTOINCREMENT,
                source    TEXT NOT NULL,
                content   TEXT NOT NULL,
                sentiment TEXT NOT NULL,
                theme     TEXT NOT NULL,
                timestamp TEXT NOT NULL
            );",
        )
        .context("failed to create feedback table")?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub fn in_memory() -> Result<Self> {
        Self::open(":memory:")
    }
}

// Fixed-width UTC so that text ordering matches time ordering.
fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

#[async_trait]
impl FeedbackStore for SqliteStore {
    async fn insert(&self, record: &NewRecord) -> Result<i64> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO feedback (source, content, sentiment, theme, timestamp)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                record.source,
                record.content,
                record.sentiment.as_str(),
                record.theme.as_str(),
                format_timestamp(&record.timestamp),
            ],
        )
        .context("failed to insert feedback record")?;
        Ok(conn.last_insert_rowid())
    }

    async fn list(&self) -> Result<Vec<FeedbackRecord>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT id, source, content, sentiment, theme, timestamp
             FROM feedback ORDER BY timestamp DESC, id DESC",
        )?;
        let rows = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, String>(4)?,
                    row.get::<_, String>(5)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        rows.into_iter().map(into_record).collect()
    }
}

type Row = (i64, String, String, String, String, String);

fn into_record((id, source, content, sentiment, theme, timestamp): Row) -> Result<FeedbackRecord> {
    Ok(FeedbackRecord {
        id,
        source,
        content,
        sentiment: sentiment.parse()?,
        theme: theme.parse()?,
        timestamp: DateTime::parse_from_rfc3339(&timestamp)
            .with_context(|| format!("bad timestamp in row {id}"))?
            .with_timezone(&Utc),
    })
}
