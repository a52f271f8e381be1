use anyhow::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::{debug, warn};

use super::{RetryPolicy, RunId, StepEngine, StepFn};

struct Checkpoint {
    step: String,
    output: serde_json::Value,
}

/// In-process step engine: bounded retries with backoff, and per-run
/// memoization of completed steps.
///
/// Checkpoints live in memory only. A process restart loses them.
pub struct LocalEngine {
    policy: RetryPolicy,
    checkpoints: Mutex<HashMap<RunId, Vec<Checkpoint>>>,
    executions: AtomicUsize,
}

impl LocalEngine {
    pub fn new(policy: RetryPolicy) -> Self {
        Self {
            policy,
            checkpoints: Mutex::new(HashMap::new()),
            executions: AtomicUsize::new(0),
        }
    }

    /// Names of the steps completed in `run`, in completion order.
    pub fn completed_steps(&self, run: &RunId) -> Vec<String> {
        self.checkpoints
            .lock()
            .unwrap()
            .get(run)
            .map(|cps| cps.iter().map(|cp| cp.step.clone()).collect())
            .unwrap_or_default()
    }

    /// Total number of times any step body was invoked, retries included.
    pub fn executions(&self) -> usize {
        self.executions.load(Ordering::SeqCst)
    }

    fn lookup(&self, run: &RunId, name: &str) -> Option<serde_json::Value> {
        self.checkpoints
            .lock()
            .unwrap()
            .get(run)?
            .iter()
            .find(|cp| cp.step == name)
            .map(|cp| cp.output.clone())
    }

    fn record(&self, run: &RunId, name: &str, output: serde_json::Value) {
        self.checkpoints
            .lock()
            .unwrap()
            .entry(run.clone())
            .or_default()
            .push(Checkpoint {
                step: name.to_string(),
                output,
            });
    }
}

impl Default for LocalEngine {
    fn default() -> Self {
        Self::new(RetryPolicy::default())
    }
}

#[async_trait]
impl StepEngine for LocalEngine {
    async fn step(&self, run: &RunId, name: &str, work: StepFn<'_>) -> Result<serde_json::Value> {
        if let Some(output) = self.lookup(run, name) {
            debug!(run = %run, step = name, "step already completed, replaying checkpoint");
            return Ok(output);
        }

        let max_attempts = self.policy.max_attempts.max(1);
        let mut attempt = 0;
        loop {
            attempt += 1;
            self.executions.fetch_add(1, Ordering::SeqCst);
            debug!(run = %run, step = name, attempt, "executing step");

            match work().await {
                Ok(output) => {
                    self.record(run, name, output.clone());
                    return Ok(output);
                }
                Err(e) if attempt < max_attempts => {
                    let delay = self.policy.backoff(attempt);
                    warn!(
                        run = %run,
                        step = name,
                        attempt,
                        "step failed, retrying in {delay:?}: {e:#}"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => {
                    return Err(e.context(format!(
                        "step {name} failed after {attempt} attempt(s)"
                    )));
                }
            }
        }
    }
}
