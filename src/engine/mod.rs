//! The step-execution boundary.
//!
//! The pipeline hands named units of work ("steps") to a [`StepEngine`].
//! The engine owns retries and checkpointing: a step that already completed
//! within a run is never executed again, its recorded output is returned
//! instead. Outputs cross the boundary as JSON so any engine can store them.

pub mod local;

use anyhow::Result;
use async_trait::async_trait;
use futures::FutureExt;
use futures::future::BoxFuture;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::fmt;
use std::future::Future;
use std::time::Duration;

use crate::consts::{DEFAULT_INITIAL_BACKOFF, DEFAULT_MAX_ATTEMPTS, DEFAULT_MAX_BACKOFF};

/// Opaque identifier of one pipeline run. Only used for checkpoint keys
/// and for observability.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RunId(String);

impl RunId {
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for RunId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// How often and how patiently a failing step is re-run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first one. Never less than 1.
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl RetryPolicy {
    /// Retry immediately, no sleeping. For tests.
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            initial_backoff: Duration::ZERO,
            max_backoff: Duration::ZERO,
        }
    }

    /// Delay before attempt `failed + 1`, doubling each time up to the cap.
    pub fn backoff(&self, failed: u32) -> Duration {
        let exp = failed.saturating_sub(1).min(16);
        self.initial_backoff
            .saturating_mul(1 << exp)
            .min(self.max_backoff)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            initial_backoff: DEFAULT_INITIAL_BACKOFF,
            max_backoff: DEFAULT_MAX_BACKOFF,
        }
    }
}

pub type StepFuture<'a> = BoxFuture<'a, Result<serde_json::Value>>;

/// A re-runnable unit of work. `Fn`, not `FnOnce`: retries call it again.
pub type StepFn<'a> = Box<dyn Fn() -> StepFuture<'a> + Send + Sync + 'a>;

/// Executes named steps at least once, memoizing completed ones per run.
#[async_trait]
pub trait StepEngine: Send + Sync {
    /// Run `work` as step `name` of `run`, or return its checkpointed output.
    /// Errors only once the retry policy is exhausted.
    async fn step(&self, run: &RunId, name: &str, work: StepFn<'_>) -> Result<serde_json::Value>;
}

/// Typed wrapper around [`StepEngine::step`].
pub async fn run_step<'a, T, F, Fut>(
    engine: &dyn StepEngine,
    run: &RunId,
    name: &str,
    work: F,
) -> Result<T>
where
    T: Serialize + DeserializeOwned + Send + 'a,
    F: Fn() -> Fut + Send + Sync + 'a,
    Fut: Future<Output = Result<T>> + Send + 'a,
{
    let work: StepFn<'a> = Box::new(move || {
        let fut = work();
        async move {
            let output = fut.await?;
            Ok::<_, anyhow::Error>(serde_json::to_value(output)?)
        }
        .boxed()
    });
    let value = engine.step(run, name, work).await?;
    Ok(serde_json::from_value(value)?)
}
