//! Persistent settings backed by SQLite.
//!
//! Lives in the same database file as the feedback table; pass the same
//! path to [`Config::open`] and [`SqliteStore::open`](crate::store::sqlite::SqliteStore::open).

use anyhow::{Context, Result, bail};
use rusqlite::Connection;
use std::sync::Mutex;

pub const MODEL_KEY: &str = "model";
pub const MAX_ATTEMPTS_KEY: &str = "max_attempts";

/// Keys `sift config` accepts.
pub const KNOWN_KEYS: &[&str] = &[MODEL_KEY, MAX_ATTEMPTS_KEY];

/// Persistent key-value settings.
pub struct Config {
    conn: Mutex<Connection>,
}

impl Config {
    /// Open or create the config table in the given database.
    /// Use `":memory:"` for tests.
    pub fn open(path: &str) -> Result<Self> {
        let conn = Connection::open(path).context("failed to open config database")?;
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS config (
                key   TEXT PRIMARY KEY,
                value TEXT NOT NULL
            )",
        )
        .context("failed to create config table")?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub fn get(&self, key: &str) -> Result<Option<String>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare("SELECT value FROM config WHERE key = ?1")?;
        let mut rows = stmt.query([key])?;
        match rows.next()? {
            Some(row) => Ok(Some(row.get(0)?)),
            None => Ok(None),
        }
    }

    /// Set a known key (upsert). Values are checked before they are stored.
    pub fn set(&self, key: &str, value: &str) -> Result<()> {
        validate(key, value)?;
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO config (key, value) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            [key, value],
        )?;
        Ok(())
    }

    pub fn remove(&self, key: &str) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute("DELETE FROM config WHERE key = ?1", [key])?;
        Ok(())
    }

    /// Saved classification model, if any.
    pub fn model(&self) -> Result<Option<String>> {
        self.get(MODEL_KEY)
    }

    /// Saved step attempt limit, if any.
    pub fn max_attempts(&self) -> Result<Option<u32>> {
        self.get(MAX_ATTEMPTS_KEY)?
            .map(|v| parse_attempts(&v))
            .transpose()
    }
}

fn validate(key: &str, value: &str) -> Result<()> {
    match key {
        MODEL_KEY if value.trim().is_empty() => bail!("model must not be empty"),
        MODEL_KEY => Ok(()),
        MAX_ATTEMPTS_KEY => parse_attempts(value).map(|_| ()),
        other => bail!(
            "unknown config key: {other} (known: {})",
            KNOWN_KEYS.join(", ")
        ),
    }
}

fn parse_attempts(value: &str) -> Result<u32> {
    let n: u32 = value
        .trim()
        .parse()
        .with_context(|| format!("max_attempts must be a positive integer, got {value:?}"))?;
    if n == 0 {
        bail!("max_attempts must be at least 1");
    }
    Ok(n)
}
