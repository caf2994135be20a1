use std::sync::{
    Arc,
    atomic::{AtomicU64, Ordering},
};

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

/// Observer of run progress. Implementations must return immediately.
pub trait ProgressSink: Send + Sync {
    fn report(&self, current: usize, total: usize, message: &str);
}

pub struct NoopProgress;

impl ProgressSink for NoopProgress {
    fn report(&self, _current: usize, _total: usize, _message: &str) {}
}

impl<F> ProgressSink for F
where
    F: Fn(usize, usize, &str) + Send + Sync,
{
    fn report(&self, current: usize, total: usize, message: &str) {
        self(current, total, message)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressEvent {
    pub current: usize,
    pub total: usize,
    pub message: String,
}

/// Forwards progress into a bounded channel read by a single listener.
///
/// A full channel drops the event rather than stall the run.
#[derive(Clone)]
pub struct ChannelProgress {
    tx: mpsc::Sender<ProgressEvent>,
    drops_total: Arc<AtomicU64>,
}

impl ChannelProgress {
    pub fn new(capacity: usize) -> (ChannelProgress, mpsc::Receiver<ProgressEvent>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (
            ChannelProgress {
                tx,
                drops_total: Arc::new(AtomicU64::new(0)),
            },
            rx,
        )
    }

    pub fn dropped(&self) -> u64 {
        self.drops_total.load(Ordering::Relaxed)
    }
}

impl ProgressSink for ChannelProgress {
    fn report(&self, current: usize, total: usize, message: &str) {
        let event = ProgressEvent {
            current,
            total,
            message: message.to_string(),
        };
        if self.tx.try_send(event).is_err() {
            self.drops_total.fetch_add(1, Ordering::Relaxed);
        }
    }
}
