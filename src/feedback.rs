//! Feedback items, their classification, and the stored record.

use anyhow::{Result, bail};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Sentiment used whenever the classifier's answer can't be trusted.
pub const DEFAULT_SENTIMENT: Sentiment = Sentiment::Neutral;

/// Theme used whenever the classifier's answer can't be trusted.
pub const DEFAULT_THEME: Theme = Theme::FeatureRequest;

/// A single piece of feedback as submitted, before classification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IncomingFeedback {
    pub source: String,
    pub content: String,
}

impl IncomingFeedback {
    /// Build a validated item. Both fields must be non-empty after trimming.
    pub fn new(source: impl Into<String>, content: impl Into<String>) -> Result<Self> {
        let item = Self {
            source: source.into(),
            content: content.into(),
        };
        item.validate()?;
        Ok(item)
    }

    /// Check that both fields carry something besides whitespace.
    pub fn validate(&self) -> Result<()> {
        if self.source.trim().is_empty() {
            bail!("feedback source is empty");
        }
        if self.content.trim().is_empty() {
            bail!("feedback content is empty");
        }
        Ok(())
    }

    pub fn is_valid(&self) -> bool {
        self.validate().is_ok()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Sentiment {
    Positive,
    Neutral,
    Negative,
}

impl Sentiment {
    pub const ALL: [Sentiment; 3] = [Sentiment::Positive, Sentiment::Neutral, Sentiment::Negative];

    pub fn as_str(&self) -> &'static str {
        match self {
            Sentiment::Positive => "Positive",
            Sentiment::Neutral => "Neutral",
            Sentiment::Negative => "Negative",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Theme {
    #[serde(rename = "UI/UX")]
    UiUx,
    Bug,
    Performance,
    #[serde(rename = "Feature Request")]
    FeatureRequest,
}

impl Theme {
    pub const ALL: [Theme; 4] = [
        Theme::UiUx,
        Theme::Bug,
        Theme::Performance,
        Theme::FeatureRequest,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Theme::UiUx => "UI/UX",
            Theme::Bug => "Bug",
            Theme::Performance => "Performance",
            Theme::FeatureRequest => "Feature Request",
        }
    }
}

// Parsing is exact: "positive" or "UI / UX" are not members.
impl FromStr for Sentiment {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        Sentiment::ALL
            .into_iter()
            .find(|v| v.as_str() == s)
            .ok_or_else(|| anyhow::anyhow!("unknown sentiment: {s:?}"))
    }
}

impl FromStr for Theme {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        Theme::ALL
            .into_iter()
            .find(|v| v.as_str() == s)
            .ok_or_else(|| anyhow::anyhow!("unknown theme: {s:?}"))
    }
}

impl fmt::Display for Sentiment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl fmt::Display for Theme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

/// A fully populated classification. There is no way to leave a field unset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Classification {
    pub sentiment: Sentiment,
    pub theme: Theme,
}

impl Default for Classification {
    fn default() -> Self {
        Self {
            sentiment: DEFAULT_SENTIMENT,
            theme: DEFAULT_THEME,
        }
    }
}

/// A record ready to be inserted. The store assigns the id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewRecord {
    pub source: String,
    pub content: String,
    pub sentiment: Sentiment,
    pub theme: Theme,
    pub timestamp: DateTime<Utc>,
}

/// A persisted record. Never updated or deleted once written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedbackRecord {
    pub id: i64,
    pub source: String,
    pub content: String,
    pub sentiment: Sentiment,
    pub theme: Theme,
    pub timestamp: DateTime<Utc>,
}
