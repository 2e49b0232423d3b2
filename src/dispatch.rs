//! Cross-runtime event marshaling.
//!
//! Engine threads must not run arbitrary consumer code when the consumer
//! lives on a single-threaded runtime. `QueuedDispatcher` is a
//! `SessionCallback` that forwards every event, wrapped in a versioned
//! envelope, onto one consumer-owned worker thread, so delivery into the
//! foreign runtime is serialized regardless of how many engine threads
//! fire events.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc;
use std::thread::JoinHandle;

use parking_lot::Mutex;
use serde::Serialize;

use crate::event::{SessionCallback, SessionEvent};

/// Versioned wrapper around every dispatched event.
#[derive(Debug, Clone, Serialize)]
pub struct EventEnvelope {
    /// Schema version (always 1 for now).
    pub version: u32,
    /// Monotonically increasing per dispatcher instance.
    pub seq: u64,
    /// UTC milliseconds when the envelope was created.
    pub timestamp_ms: i64,
    pub event: SessionEvent,
}

impl EventEnvelope {
    pub fn new(seq: u64, event: SessionEvent) -> Self {
        Self {
            version: 1,
            seq,
            timestamp_ms: chrono::Utc::now().timestamp_millis(),
            event,
        }
    }
}

/// Serializing dispatcher: events go into a channel, one worker thread
/// drains them in order and hands each envelope to the consumer closure.
pub struct QueuedDispatcher {
    tx: Mutex<Option<mpsc::Sender<EventEnvelope>>>,
    worker: Mutex<Option<JoinHandle<()>>>,
    seq: AtomicU64,
}

impl QueuedDispatcher {
    /// Spawn the worker thread. `deliver` runs there for every event, in
    /// dispatch order.
    pub fn spawn<F>(mut deliver: F) -> Self
    where
        F: FnMut(EventEnvelope) + Send + 'static,
    {
        let (tx, rx) = mpsc::channel::<EventEnvelope>();
        let worker = std::thread::Builder::new()
            .name("glacier-dispatch".to_string())
            .spawn(move || {
                while let Ok(envelope) = rx.recv() {
                    deliver(envelope);
                }
            })
            .expect("failed to spawn dispatch thread");
        Self {
            tx: Mutex::new(Some(tx)),
            worker: Mutex::new(Some(worker)),
            seq: AtomicU64::new(0),
        }
    }

    /// Stop accepting events and wait for the worker to drain what was
    /// already queued. Safe to call more than once.
    pub fn close(&self) {
        self.tx.lock().take();
        if let Some(worker) = self.worker.lock().take() {
            let _ = worker.join();
        }
    }
}

impl SessionCallback for QueuedDispatcher {
    fn on_event(&self, event: SessionEvent) {
        let seq = self.seq.fetch_add(1, Ordering::Relaxed) + 1;
        let envelope = EventEnvelope::new(seq, event);
        let tx = self.tx.lock();
        match tx.as_ref() {
            Some(tx) => {
                if tx.send(envelope).is_err() {
                    tracing::warn!("dispatch worker gone, event dropped");
                }
            }
            None => tracing::debug!("dispatcher closed, event dropped"),
        }
    }
}

impl Drop for QueuedDispatcher {
    fn drop(&mut self) {
        self.close();
    }
}
