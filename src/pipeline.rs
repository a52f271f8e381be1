//! The batch driver.
//!
//! Each item goes through two steps on the [`StepEngine`]:
//! `classify-{i}-{source}` (call the classifier and normalize the reply) and
//! `persist-{i}-{source}` (assemble the record and insert it). Items run
//! strictly one after another, in input order.
//!
//! A batch never fails as a whole. Malformed items are skipped before any
//! step runs. An item whose step exhausts its retries is dropped and the
//! run moves on, so a finished run can hold fewer records than items
//! submitted. Already persisted items are left as they are.

use anyhow::Result;
use chrono::Utc;
use std::sync::Arc;
use tracing::{info, warn};

use crate::classifier::{Classifier, build_request};
use crate::engine::{RunId, StepEngine, run_step};
use crate::events::{Event, EventBus};
use crate::feedback::{Classification, IncomingFeedback};
use crate::normalize::normalize;
use crate::record::assemble;
use crate::store::FeedbackStore;

/// What happened to the items of one run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub total: usize,
    pub persisted: usize,
    pub skipped: usize,
    pub failed: usize,
}

/// Step identity for item `index` of a batch. The index keeps items with
/// the same source apart.
pub fn step_name(kind: &str, index: usize, source: &str) -> String {
    format!("{kind}-{index}-{source}")
}

pub struct Pipeline {
    classifier: Arc<dyn Classifier>,
    store: Arc<dyn FeedbackStore>,
    engine: Arc<dyn StepEngine>,
    events: Option<Arc<EventBus>>,
}

impl Pipeline {
    pub fn new(
        classifier: Arc<dyn Classifier>,
        store: Arc<dyn FeedbackStore>,
        engine: Arc<dyn StepEngine>,
    ) -> Self {
        Self {
            classifier,
            store,
            engine,
            events: None,
        }
    }

    /// Publish per-item progress on `bus`.
    pub fn with_events(mut self, bus: Arc<EventBus>) -> Self {
        self.events = Some(bus);
        self
    }

    /// Drive every item of `batch` through classify then persist.
    pub async fn run(&self, run: &RunId, batch: &[IncomingFeedback]) -> RunSummary {
        let mut summary = RunSummary {
            total: batch.len(),
            ..RunSummary::default()
        };
        info!(run = %run, items = batch.len(), "starting run");

        for (index, item) in batch.iter().enumerate() {
            if let Err(e) = item.validate() {
                warn!(run = %run, index, "skipping malformed item: {e}");
                summary.skipped += 1;
                self.emit(Event::ItemSkipped {
                    run: run.clone(),
                    index,
                });
                continue;
            }

            match self.process(run, index, item).await {
                Ok((id, classification)) => {
                    summary.persisted += 1;
                    self.emit(Event::ItemPersisted {
                        run: run.clone(),
                        index,
                        id,
                        classification,
                    });
                }
                Err(e) => {
                    warn!(run = %run, index, source = %item.source, "item dropped: {e:#}");
                    summary.failed += 1;
                    self.emit(Event::ItemFailed {
                        run: run.clone(),
                        index,
                        error: format!("{e:#}"),
                    });
                }
            }
        }

        info!(
            run = %run,
            persisted = summary.persisted,
            skipped = summary.skipped,
            failed = summary.failed,
            "run completed"
        );
        self.emit(Event::RunCompleted { run: run.clone() });
        summary
    }

    async fn process(
        &self,
        run: &RunId,
        index: usize,
        item: &IncomingFeedback,
    ) -> Result<(i64, Classification)> {
        let engine = self.engine.as_ref();
        let classifier = self.classifier.as_ref();
        let store = self.store.as_ref();

        let classification: Classification = run_step(
            engine,
            run,
            &step_name("classify", index, &item.source),
            move || async move {
                let raw = classifier.classify(&build_request(item)).await?;
                Ok(normalize(&raw))
            },
        )
        .await?;

        // The timestamp is taken inside the step so it reflects the write.
        let id: i64 = run_step(
            engine,
            run,
            &step_name("persist", index, &item.source),
            move || async move {
                let record = assemble(item, classification, Utc::now());
                store.insert(&record).await
            },
        )
        .await?;

        Ok((id, classification))
    }

    fn emit(&self, event: Event) {
        if let Some(bus) = &self.events {
            bus.emit(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn step_names_include_index_and_source() {
        assert_eq!(step_name("classify", 0, "Discord"), "classify-0-Discord");
        assert_eq!(step_name("persist", 3, "Email"), "persist-3-Email");
    }

    #[test]
    fn same_source_different_index_differ() {
        assert_ne!(step_name("persist", 0, "Discord"), step_name("persist", 1, "Discord"));
    }
}
