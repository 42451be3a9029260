//! Consumer-facing pull path
//!
//! Maps blocking queue outcomes onto the pull contract of the downstream
//! consumer: data, end-of-stream, or cancellation while flushing.

use crate::playback::buffer::{AudioBuffer, BufferQueue, Dequeued};
use std::sync::Arc;
use tracing::trace;

/// Outcome of a pull request
#[derive(Debug)]
pub enum Pull {
    /// A chunk of decoded PCM with its presentation metadata
    Buffer(AudioBuffer),
    /// The stream has ended; no further data will be produced
    EndOfStream,
    /// The pull was interrupted by a flush (seek or shutdown)
    Cancelled,
}

/// The synchronous pull operation over the buffer queue
pub struct PullCoordinator {
    queue: Arc<BufferQueue>,
}

impl PullCoordinator {
    pub fn new(queue: Arc<BufferQueue>) -> Self {
        Self { queue }
    }

    /// Block until the queue yields data, flush or EOS
    ///
    /// The backend controls chunk granularity, so `length` is ignored;
    /// `offset` is accepted for interface fidelity only, since seeking is
    /// the explicit seek operation rather than a pull-side offset jump.
    /// The returned buffer's timestamp and duration are passed through
    /// unchanged.
    pub fn pull(&self, offset: u64, length: u32) -> Pull {
        trace!("pull requested: offset={} length={}", offset, length);

        match self.queue.dequeue_blocking() {
            Dequeued::Buffer(buffer) => {
                trace!(
                    "pull returning {} bytes at ts {:?}",
                    buffer.len(),
                    buffer.timestamp()
                );
                Pull::Buffer(buffer)
            }
            Dequeued::Flushing => Pull::Cancelled,
            Dequeued::Eos => Pull::EndOfStream,
        }
    }
}
