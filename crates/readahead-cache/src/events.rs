#![forbid(unsafe_code)]

use tokio::sync::broadcast;

/// Events emitted by a [`FileCache`](crate::FileCache).
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CacheEvent {
    /// Session opened and fill thread started.
    Opened {
        chunk_size: usize,
        forward_capacity: u64,
    },
    /// The fill thread serviced a seek request.
    SeekCompleted { position: u64, full_reset: bool },
    /// The source refused a seek.
    SeekFailed { position: u64 },
    /// The source has no more data at `position`.
    EndOfInput { position: u64 },
    /// Forward fill level crossed a hysteresis threshold.
    FillingChanged { filling: bool },
    /// The source could not keep up with the rate cap while filling.
    LowSpeed { actual: u32, target: u32 },
    /// The fill thread exited.
    FillerStopped,
}

/// Broadcast bus for [`CacheEvent`]s.
///
/// `publish()` is a sync call and works from the fill thread. Events are
/// dropped when there are no subscribers.
#[derive(Clone, Debug)]
pub struct EventBus {
    tx: broadcast::Sender<CacheEvent>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(32)
    }
}

impl EventBus {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn publish(&self, event: CacheEvent) {
        let _ = self.tx.send(event);
    }

    /// Subscribe to all future events.
    ///
    /// Slow subscribers receive `Lagged(n)` instead of blocking the fill
    /// thread.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<CacheEvent> {
        self.tx.subscribe()
    }
}
