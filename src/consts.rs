//! Project-wide constants.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};

/// Default Anthropic model when none is specified.
pub const DEFAULT_MODEL: &str = "claude-haiku-4-5";

/// Attempts per step (first try included) before an item is dropped.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Delay before the first retry. Doubles on every further retry.
pub const DEFAULT_INITIAL_BACKOFF: Duration = Duration::from_millis(500);

/// Upper bound on the delay between retries.
pub const DEFAULT_MAX_BACKOFF: Duration = Duration::from_secs(10);

/// Default database path: `~/.sift/sift.db`.
/// Single DB for feedback records and settings.
pub fn default_db_path() -> Result<PathBuf> {
    let home = dirs::home_dir().context("cannot determine home directory")?;
    Ok(home.join(".sift").join("sift.db"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn consts_are_sane() {
        assert!(!DEFAULT_MODEL.is_empty());
        assert!(DEFAULT_MAX_ATTEMPTS >= 1);
        assert!(DEFAULT_INITIAL_BACKOFF <= DEFAULT_MAX_BACKOFF);
    }

    #[test]
    fn db_path_ends_in_sift_dir() {
        if let Ok(path) = default_db_path() {
            assert!(path.ends_with(".sift/sift.db"));
        }
    }
}
