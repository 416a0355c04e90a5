//! Batch Observer Module
//!
//! Observers receive [`BatchEvent`]s while records are being batched. They are
//! purely informational: nothing an observer does changes which batches are
//! produced.
//!
//! Uses the Strategy pattern so callers pick how discards and flushes are
//! surfaced:
//! - `NoopObserver`: ignore everything (default)
//! - `TracingObserver`: emit `tracing` events
//! - `EventRecorder`: keep events in memory for auditing data loss

use crate::BatchEvent;
use std::sync::{Arc, Mutex};
use tracing::{debug, info, warn};

/// Receives batching events
pub trait BatchObserver: Send + Sync {
    fn on_event(&self, event: &BatchEvent);
}

/// Observer that does nothing
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl BatchObserver for NoopObserver {
    fn on_event(&self, _event: &BatchEvent) {}
}

/// Observer that logs every event through `tracing`
///
/// Discards are logged at `warn` since they mean data was dropped.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingObserver;

impl BatchObserver for TracingObserver {
    fn on_event(&self, event: &BatchEvent) {
        match event {
            BatchEvent::Discarded { index, record_size } => {
                warn!(index, record_size, "Discarding oversized record");
            }
            BatchEvent::BatchClosed {
                batch_index,
                record_count,
                batch_size,
            } => {
                debug!(batch_index, record_count, batch_size, "Batch closed");
            }
            BatchEvent::BatchFinal {
                batch_index,
                record_count,
                batch_size,
            } => {
                info!(batch_index, record_count, batch_size, "Final batch closed");
            }
        }
    }
}

/// Observer that records every event in memory
///
/// Cloning shares the underlying buffer, so a clone can be handed to a
/// [`crate::batch::Batcher`] while the original is kept for inspection.
#[derive(Debug, Clone, Default)]
pub struct EventRecorder {
    events: Arc<Mutex<Vec<BatchEvent>>>,
}

impl EventRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of all events seen so far, in emission order
    pub fn events(&self) -> Vec<BatchEvent> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }

    /// `(index, record_size)` of every discarded record
    pub fn discarded(&self) -> Vec<(usize, u64)> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                BatchEvent::Discarded { index, record_size } => Some((index, record_size)),
                _ => None,
            })
            .collect()
    }

    pub fn clear(&self) {
        if let Ok(mut events) = self.events.lock() {
            events.clear();
        }
    }
}

impl BatchObserver for EventRecorder {
    fn on_event(&self, event: &BatchEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event.clone());
        }
    }
}
