//! Receive side of the control channel.
//!
//! A dedicated thread stands in for the receive interrupt: it reads exactly one
//! fixed-size record, hands it to the [`MessageChannel`], then waits until the
//! consumer re-arms it before reading the next one.

use crate::control::channel::MessageChannel;
use crate::error::{Result, WakegateError};
use crossbeam_channel::{Sender, TrySendError, bounded};
use std::io::{ErrorKind, Read};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tracing::{debug, warn};

/// Handle to a running receive thread.
pub struct ControlLink {
    channel: Arc<MessageChannel>,
    arm_tx: Sender<()>,
    thread: Option<JoinHandle<()>>,
}

impl ControlLink {
    /// Start receiving from `transport`. The link starts armed, so the first
    /// record is read right away.
    pub fn spawn<R>(transport: R, channel: Arc<MessageChannel>) -> Result<Self>
    where
        R: Read + Send + 'static,
    {
        let (arm_tx, arm_rx) = bounded::<()>(1);
        let receiver_channel = Arc::clone(&channel);

        let thread = thread::Builder::new()
            .name("control-rx".to_string())
            .spawn(move || {
                let mut transport = transport;
                let mut record = vec![0u8; receiver_channel.record_size()];

                for () in arm_rx.iter() {
                    match transport.read_exact(&mut record) {
                        Ok(()) => {
                            if receiver_channel.process(&record).is_err() {
                                debug!(
                                    rejected = receiver_channel.rejected(),
                                    "record discarded, waiting for re-arm"
                                );
                            }
                        }
                        Err(e) if e.kind() == ErrorKind::UnexpectedEof => {
                            debug!("control transport closed");
                            break;
                        }
                        Err(e) => {
                            warn!("control transport failed: {}", e);
                            break;
                        }
                    }
                }
            })?;

        arm_tx
            .try_send(())
            .map_err(|_| WakegateError::invalid_state("control link closed before start"))?;

        Ok(Self {
            channel,
            arm_tx,
            thread: Some(thread),
        })
    }

    /// Allow the receive thread to read the next record.
    ///
    /// Re-arming an already armed link is a no-op.
    ///
    /// # Errors
    /// `InvalidState` once the receive thread has exited.
    pub fn rearm(&self) -> Result<()> {
        match self.arm_tx.try_send(()) {
            Ok(()) | Err(TrySendError::Full(())) => Ok(()),
            Err(TrySendError::Disconnected(())) => {
                Err(WakegateError::invalid_state("control link closed"))
            }
        }
    }

    pub fn channel(&self) -> &Arc<MessageChannel> {
        &self.channel
    }

    /// Whether the receive thread is still running.
    pub fn is_running(&self) -> bool {
        self.thread
            .as_ref()
            .is_some_and(|thread| !thread.is_finished())
    }

    /// Stop re-arming and wait for the receive thread to exit.
    ///
    /// A read already in flight is allowed to finish, so this blocks until the
    /// transport yields a record, reaches end of stream or fails.
    pub fn join(self) -> Result<()> {
        let Self { arm_tx, thread, .. } = self;
        drop(arm_tx);
        let Some(thread) = thread else {
            return Ok(());
        };
        thread
            .join()
            .map_err(|_| WakegateError::Other("control receive thread panicked".to_string()))
    }
}
