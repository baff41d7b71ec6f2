#![forbid(unsafe_code)]

//! State shared between the consumer and the fill thread.

use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering},
    },
    time::{Duration, Instant},
};

use parking_lot::{Condvar, Mutex};
use readahead_storage::CacheStrategy;
use tokio_util::sync::CancellationToken;

use crate::{CacheEvent, EventBus};

/// Longest single condvar wait in an unbounded wait, so that a cancelled
/// parent token is noticed even without an explicit wake-up.
const MAX_WAIT_SLICE: Duration = Duration::from_millis(100);

/// Fill thread's answer to a seek request.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum SeekResponse {
    /// The cache now covers `pos` and the source continues from its end.
    Done { pos: u64 },
    /// The source refused to seek.
    Failed,
}

/// Why a fill-thread wait ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Wake {
    Seek,
    Stop,
    Timeout,
}

#[derive(Debug, Default)]
struct SeekSlot {
    request: Option<u64>,
    response: Option<SeekResponse>,
}

#[derive(Debug)]
pub(crate) struct Shared {
    pub(crate) strategy: Arc<dyn CacheStrategy>,
    pub(crate) cancel: CancellationToken,
    pub(crate) bus: Option<EventBus>,
    /// Redacted location, for logs.
    pub(crate) source_id: String,
    pub(crate) chunk_size: usize,
    pub(crate) forward_capacity: u64,

    /// Consumer position. Written by the consumer only.
    pub(crate) read_pos: AtomicU64,
    /// End of the data handed to the strategy. Written by the fill thread only.
    pub(crate) write_pos: AtomicU64,
    pub(crate) file_size: AtomicU64,
    /// Fill-rate cap in bytes/s, `0` = unlimited.
    pub(crate) write_rate: AtomicU32,
    pub(crate) write_rate_actual: AtomicU32,
    pub(crate) seek_possible: AtomicBool,
    pub(crate) filling: AtomicBool,
    pub(crate) low_speed: AtomicBool,
    pub(crate) running: AtomicBool,

    slot: Mutex<SeekSlot>,
    signal: Condvar,
}

pub(crate) struct SharedInit {
    pub(crate) strategy: Arc<dyn CacheStrategy>,
    pub(crate) cancel: CancellationToken,
    pub(crate) bus: Option<EventBus>,
    pub(crate) source_id: String,
    pub(crate) chunk_size: usize,
    pub(crate) forward_capacity: u64,
    pub(crate) file_size: u64,
    pub(crate) write_rate: u32,
    pub(crate) seek_possible: bool,
}

impl Shared {
    pub(crate) fn new(init: SharedInit) -> Self {
        Self {
            strategy: init.strategy,
            cancel: init.cancel,
            bus: init.bus,
            source_id: init.source_id,
            chunk_size: init.chunk_size,
            forward_capacity: init.forward_capacity,
            read_pos: AtomicU64::new(0),
            write_pos: AtomicU64::new(0),
            file_size: AtomicU64::new(init.file_size),
            write_rate: AtomicU32::new(init.write_rate),
            write_rate_actual: AtomicU32::new(0),
            seek_possible: AtomicBool::new(init.seek_possible),
            filling: AtomicBool::new(true),
            low_speed: AtomicBool::new(false),
            running: AtomicBool::new(false),
            slot: Mutex::new(SeekSlot::default()),
            signal: Condvar::new(),
        }
    }

    pub(crate) fn publish(&self, event: CacheEvent) {
        if let Some(bus) = &self.bus {
            bus.publish(event);
        }
    }

    pub(crate) fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Cancel the fill thread and wake it from any wait.
    pub(crate) fn stop(&self) {
        self.cancel.cancel();
        let _slot = self.slot.lock();
        self.signal.notify_all();
    }

    // Consumer side.

    pub(crate) fn request_seek(&self, pos: u64) {
        let mut slot = self.slot.lock();
        slot.request = Some(pos);
        slot.response = None;
        self.signal.notify_all();
    }

    /// Wait up to `timeout` for the fill thread's answer.
    pub(crate) fn wait_seek_response(&self, timeout: Duration) -> Option<SeekResponse> {
        let mut slot = self.slot.lock();
        if slot.response.is_none() {
            let _ = self.signal.wait_for(&mut slot, timeout);
        }
        slot.response.take()
    }

    // Fill-thread side.

    pub(crate) fn take_seek_request(&self) -> Option<u64> {
        self.slot.lock().request.take()
    }

    pub(crate) fn has_seek_request(&self) -> bool {
        self.slot.lock().request.is_some()
    }

    pub(crate) fn answer_seek(&self, response: SeekResponse) {
        let mut slot = self.slot.lock();
        slot.response = Some(response);
        self.signal.notify_all();
    }

    /// Block until a seek is requested, the thread is stopped, or `timeout`
    /// elapses (`None` waits without limit).
    pub(crate) fn wait_for_seek_or_stop(&self, timeout: Option<Duration>) -> Wake {
        let deadline = timeout.map(|t| Instant::now() + t);
        let mut slot = self.slot.lock();

        loop {
            if self.cancel.is_cancelled() {
                return Wake::Stop;
            }
            if slot.request.is_some() {
                return Wake::Seek;
            }

            let slice = match deadline {
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        return Wake::Timeout;
                    }
                    (deadline - now).min(MAX_WAIT_SLICE)
                }
                None => MAX_WAIT_SLICE,
            };
            let _ = self.signal.wait_for(&mut slot, slice);
        }
    }
}
