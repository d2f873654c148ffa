//! Single-slot message mailbox between the receive context and a poller.

use crate::control::message::{ControlMessage, parse_record};
use crate::defaults::MESSAGE_HEADER_LEN;
use crate::error::{Result, WakegateError};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use tracing::debug;

/// Holds at most one unread message.
///
/// The receive side calls [`MessageChannel::process`] with each record; a new
/// message always overwrites an unread one. The polling side checks
/// [`MessageChannel::is_fresh`] and reads with [`MessageChannel::take`].
#[derive(Debug)]
pub struct MessageChannel {
    pending: Mutex<Option<ControlMessage>>,
    fresh: AtomicBool,
    capacity: usize,
    attempts: AtomicU64,
    rejected: AtomicU64,
}

impl MessageChannel {
    /// # Errors
    /// `InvalidArgument` if `capacity` is zero.
    pub fn new(capacity: usize) -> Result<Self> {
        if capacity == 0 {
            return Err(WakegateError::invalid_argument(
                "payload capacity must be greater than zero",
            ));
        }
        Ok(Self {
            pending: Mutex::new(None),
            fresh: AtomicBool::new(false),
            capacity,
            attempts: AtomicU64::new(0),
            rejected: AtomicU64::new(0),
        })
    }

    /// Bytes in one receive record: header plus payload capacity.
    pub fn record_size(&self) -> usize {
        MESSAGE_HEADER_LEN + self.capacity
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Parse one record and publish it.
    ///
    /// # Errors
    /// `InvalidArgument` for a malformed record; the slot and the fresh flag
    /// are left as they were.
    pub fn process(&self, raw: &[u8]) -> Result<()> {
        let outcome = parse_record(raw, self.capacity).map(|message| {
            let mut pending = self.pending.lock().unwrap_or_else(|e| e.into_inner());
            *pending = Some(message);
            self.fresh.store(true, Ordering::Release);
        });

        if let Err(e) = &outcome {
            self.rejected.fetch_add(1, Ordering::Relaxed);
            debug!("discarding control record: {}", e);
        }
        // Counted last so a poller that sees the attempt also sees its result.
        self.attempts.fetch_add(1, Ordering::SeqCst);
        outcome
    }

    /// Whether an unread message is waiting.
    pub fn is_fresh(&self) -> bool {
        self.fresh.load(Ordering::Acquire)
    }

    /// Read the waiting message and mark it read.
    ///
    /// Returns `None` without touching the slot when nothing fresh arrived.
    pub fn take(&self) -> Option<ControlMessage> {
        if !self.fresh.load(Ordering::Acquire) {
            return None;
        }
        let pending = self.pending.lock().unwrap_or_else(|e| e.into_inner());
        let message = pending.clone();
        self.fresh.store(false, Ordering::Release);
        message
    }

    /// Last accepted message, read or not.
    pub fn last(&self) -> Option<ControlMessage> {
        self.pending
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Records handed to `process` so far, accepted or not.
    pub fn attempts(&self) -> u64 {
        self.attempts.load(Ordering::SeqCst)
    }

    /// Records rejected as malformed.
    pub fn rejected(&self) -> u64 {
        self.rejected.load(Ordering::Relaxed)
    }
}

impl Default for MessageChannel {
    fn default() -> Self {
        Self {
            pending: Mutex::new(None),
            fresh: AtomicBool::new(false),
            capacity: crate::defaults::MESSAGE_PAYLOAD_CAPACITY,
            attempts: AtomicU64::new(0),
            rejected: AtomicU64::new(0),
        }
    }
}
