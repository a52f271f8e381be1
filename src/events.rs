//! Progress events for pipeline runs.
//!
//! The pipeline emits via [`EventBus::emit`]; anything that wants to watch
//! a run (the CLI progress printer, tests) subscribes via
//! [`EventBus::subscribe`]. Built on [`tokio::sync::broadcast`] so
//! multiple listeners can react independently.

use tokio::sync::broadcast;

use crate::engine::RunId;
use crate::feedback::Classification;

/// Events that flow out of a pipeline run.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    /// An item was classified and written. Carries the store's id.
    ItemPersisted {
        run: RunId,
        index: usize,
        id: i64,
        classification: Classification,
    },
    /// An item was malformed and never entered a step.
    ItemSkipped { run: RunId, index: usize },
    /// An item's steps ran out of retries. Its record was not written.
    ItemFailed {
        run: RunId,
        index: usize,
        error: String,
    },
    /// Every item has been visited.
    RunCompleted { run: RunId },
}

/// A broadcast channel that any component can emit to or subscribe from.
#[derive(Debug)]
pub struct EventBus {
    tx: broadcast::Sender<Event>,
}

impl EventBus {
    /// Create a new event bus with the given channel capacity.
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Emit an event to all current subscribers.
    /// Returns the number of receivers that will see it.
    pub fn emit(&self, event: Event) -> usize {
        self.tx.send(event).unwrap_or(0)
    }

    /// Subscribe to events. Returns a receiver that yields all
    /// future events (does not replay past ones).
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.tx.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(64)
    }
}
