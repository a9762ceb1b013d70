//! Progress reporting for batch transfers

use std::sync::{Arc, Mutex};

use serde::Serialize;

/// Snapshot of a batch's counters, emitted after each item
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ProgressEvent {
    pub bytes_done: u64,
    pub bytes_total: u64,
    pub items_done: usize,
    pub items_total: usize,
    /// Item that just finished
    pub current_item: String,
}

impl ProgressEvent {
    /// Completed fraction by bytes, falling back to items for empty payloads
    pub fn fraction(&self) -> f64 {
        if self.bytes_total > 0 {
            self.bytes_done as f64 / self.bytes_total as f64
        } else if self.items_total > 0 {
            self.items_done as f64 / self.items_total as f64
        } else {
            1.0
        }
    }
}

/// Receives progress events from a running batch
///
/// Calls are serialized: an observer never sees two events at once, and
/// events arrive in counter order.
pub trait ProgressObserver: Send + Sync {
    fn on_progress(&self, event: &ProgressEvent);
}

/// Adapts a closure into a [`ProgressObserver`]
pub struct FnObserver<F>(pub F);

impl<F> ProgressObserver for FnObserver<F>
where
    F: Fn(&ProgressEvent) + Send + Sync,
{
    fn on_progress(&self, event: &ProgressEvent) {
        (self.0)(event)
    }
}

/// Shared counters for one batch call
pub(crate) struct ProgressTracker {
    state: Mutex<ProgressEvent>,
    observer: Option<Arc<dyn ProgressObserver>>,
}

impl ProgressTracker {
    pub(crate) fn new(
        items_total: usize,
        bytes_total: u64,
        observer: Option<Arc<dyn ProgressObserver>>,
    ) -> Self {
        Self {
            state: Mutex::new(ProgressEvent {
                items_total,
                bytes_total,
                ..Default::default()
            }),
            observer,
        }
    }

    /// Record a finished item; failed items advance nothing but still notify
    pub(crate) fn record(&self, item: &str, bytes: u64, succeeded: bool) {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        if succeeded {
            state.items_done += 1;
            state.bytes_done += bytes;
        }
        state.current_item = item.to_string();
        // Notifying under the lock keeps events in counter order.
        if let Some(observer) = &self.observer {
            observer.on_progress(&state);
        }
    }

    pub(crate) fn snapshot(&self) -> ProgressEvent {
        self.state.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}
