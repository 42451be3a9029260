//! Bounded PCM buffer queue
//!
//! The delivery callback (producer, backend thread) and the pull path
//! (consumer, pipeline thread) meet here. The queue is a FIFO of
//! variable-size PCM chunks with a byte budget: once `max_bytes` worth of
//! audio is buffered, further enqueues are rejected and the backend
//! redelivers later. The consumer blocks on an empty queue until data,
//! flush or end-of-stream arrives.
//!
//! ```text
//! music_delivery (backend thread) → try_enqueue()
//!                                        ↓
//!                                   BufferQueue
//!                                   - byte budget (backpressure)
//!                                   - flushing / eos flags
//!                                   - playback position accumulator
//!                                        ↓
//! pull (consumer thread)          ← dequeue_blocking()
//! ```
//!
//! ## Thread Safety
//!
//! One mutex protects all queue state; one condition variable is broadcast
//! on every change that could unblock a waiter (enqueue, dequeue, flush,
//! flushing cleared, EOS). All waits loop-guard their predicate, so lost
//! and spurious wakeups are harmless.

use bytes::Bytes;
use std::collections::VecDeque;
use std::sync::{Condvar, Mutex};
use std::time::Duration;
use tracing::{debug, trace};

/// An immutable chunk of decoded PCM with presentation metadata
///
/// Created at enqueue time; ownership transfers to the consumer on
/// dequeue. The timestamp is stamped from the queue's running playback
/// position.
#[derive(Debug, Clone)]
pub struct AudioBuffer {
    data: Bytes,
    frame_count: u32,
    duration: Duration,
    timestamp: Duration,
}

impl AudioBuffer {
    /// Raw PCM bytes
    pub fn data(&self) -> &Bytes {
        &self.data
    }

    /// Chunk size in bytes
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether the chunk carries no audio
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Frame count of the chunk
    pub fn frame_count(&self) -> u32 {
        self.frame_count
    }

    /// Playback duration of the chunk
    pub fn duration(&self) -> Duration {
        self.duration
    }

    /// Presentation timestamp of the first frame
    pub fn timestamp(&self) -> Duration {
        self.timestamp
    }
}

/// Outcome of a blocking dequeue
#[derive(Debug)]
pub enum Dequeued {
    /// Head-of-queue chunk, ownership transferred to the caller
    Buffer(AudioBuffer),
    /// The queue is flushing; nothing was consumed
    Flushing,
    /// The queue is drained and no further data will arrive
    Eos,
}

struct QueueState {
    items: VecDeque<AudioBuffer>,
    queued_bytes: u64,
    flushing: bool,
    eos: bool,
    stutter_count: u64,
    /// Running presentation timestamp, advanced by each enqueued chunk's
    /// duration; reset on seek and session start.
    position: Duration,
}

/// Bounded, thread-safe FIFO of [`AudioBuffer`]s
///
/// Invariants (checked under the lock):
/// - `queued_bytes` equals the byte sum of all queued chunks
/// - while `flushing` is set, no enqueue succeeds and the queue is empty
pub struct BufferQueue {
    state: Mutex<QueueState>,
    cond: Condvar,
    max_bytes: u64,
}

impl BufferQueue {
    /// Create a queue with the given byte budget
    ///
    /// A budget of zero disables backpressure.
    pub fn new(max_bytes: u64) -> Self {
        Self {
            state: Mutex::new(QueueState {
                items: VecDeque::new(),
                queued_bytes: 0,
                flushing: false,
                eos: false,
                stutter_count: 0,
                position: Duration::ZERO,
            }),
            cond: Condvar::new(),
            max_bytes,
        }
    }

    /// Attempt to enqueue a PCM chunk
    ///
    /// The chunk is stamped with the current playback position and the
    /// position advances by `duration`. Returns false, discarding the
    /// chunk, when the queue is flushing, at EOS, or over its byte budget;
    /// backpressure rejection is a retry-later signal for the producer,
    /// not an error.
    ///
    /// Never blocks; safe to call from the backend's delivery thread.
    pub fn try_enqueue(&self, data: Bytes, frame_count: u32, duration: Duration) -> bool {
        let mut state = self.state.lock().unwrap();

        if state.flushing {
            trace!("refusing audio chunk, queue is flushing");
            return false;
        }

        if state.eos {
            trace!("refusing audio chunk, queue is at EOS");
            return false;
        }

        if self.max_bytes > 0 && state.queued_bytes >= self.max_bytes {
            debug!(
                "queue filled ({} >= {}), rejecting chunk",
                state.queued_bytes, self.max_bytes
            );
            return false;
        }

        let buffer = AudioBuffer {
            timestamp: state.position,
            frame_count,
            duration,
            data,
        };

        state.queued_bytes += buffer.len() as u64;
        state.position += duration;
        trace!(
            "queued {} bytes, total {} bytes, ts {:?}",
            buffer.len(),
            state.queued_bytes,
            buffer.timestamp
        );
        state.items.push_back(buffer);

        self.cond.notify_all();
        true
    }

    /// Block until a chunk, flush or EOS is available
    ///
    /// Flushing is re-checked on every wakeup and wins over queued data;
    /// EOS is only reported once the queue has drained. Removing a chunk
    /// wakes waiters so a backpressured producer can retry. Each wait
    /// entered with no data ready (not flushing, not EOS) increments the
    /// stutter counter, the underrun instrumentation reported back to the
    /// backend.
    pub fn dequeue_blocking(&self) -> Dequeued {
        let mut state = self.state.lock().unwrap();

        loop {
            if state.flushing {
                debug!("dequeue while flushing");
                return Dequeued::Flushing;
            }

            if let Some(buffer) = state.items.pop_front() {
                state.queued_bytes -= buffer.len() as u64;
                trace!(
                    "dequeued {} bytes, {} bytes remain",
                    buffer.len(),
                    state.queued_bytes
                );

                // Wake backpressured producers.
                self.cond.notify_all();
                return Dequeued::Buffer(buffer);
            }

            if state.eos {
                debug!("dequeue at EOS");
                return Dequeued::Eos;
            }

            state.stutter_count += 1;
            state = self.cond.wait(state).unwrap();
        }
    }

    /// Set flushing, discard all queued chunks and wake all waiters
    ///
    /// Used on stop and around seek. Enqueues fail until
    /// [`clear_flushing`](Self::clear_flushing) is called.
    pub fn flush(&self) {
        let mut state = self.state.lock().unwrap();
        let dropped = state.items.len();
        state.flushing = true;
        state.items.clear();
        state.queued_bytes = 0;
        debug!("flushed queue, dropped {} chunks", dropped);
        self.cond.notify_all();
    }

    /// Set flushing without discarding queued data
    ///
    /// The unlock path: unblocks an in-progress dequeue with
    /// [`Dequeued::Flushing`], leaving the drain to whoever initiated the
    /// unlock (stop or seek).
    pub fn start_flushing(&self) {
        let mut state = self.state.lock().unwrap();
        state.flushing = true;
        debug!("flushing set");
        self.cond.notify_all();
    }

    /// Clear flushing and wake waiters
    ///
    /// The unlock-stop path; the queue has already been drained by the
    /// operation that set flushing.
    pub fn clear_flushing(&self) {
        let mut state = self.state.lock().unwrap();
        state.flushing = false;
        debug!("flushing cleared");
        self.cond.notify_all();
    }

    /// Mark end-of-stream and wake waiters
    ///
    /// Queued chunks still drain in FIFO order before the consumer sees
    /// [`Dequeued::Eos`]. Ignored while flushing.
    pub fn set_eos(&self) {
        let mut state = self.state.lock().unwrap();
        if state.flushing {
            debug!("refusing EOS, queue is flushing");
            return;
        }
        debug!("EOS set");
        state.eos = true;
        self.cond.notify_all();
    }

    /// Clear a pending end-of-stream marker (after a successful seek)
    pub fn clear_eos(&self) {
        let mut state = self.state.lock().unwrap();
        state.eos = false;
    }

    /// Reset per-session state for a fresh start
    ///
    /// Clears flushing/EOS, zeroes the stutter counter and rewinds the
    /// playback position. The queue itself is already empty after the
    /// stop-path flush.
    pub fn reset_for_start(&self) {
        let mut state = self.state.lock().unwrap();
        state.flushing = false;
        state.eos = false;
        state.stutter_count = 0;
        state.position = Duration::ZERO;
        self.cond.notify_all();
    }

    /// Rewind the playback position accumulator (seek)
    pub fn reset_position(&self, position: Duration) {
        let mut state = self.state.lock().unwrap();
        state.position = position;
    }

    /// Current playback position accumulator
    pub fn position(&self) -> Duration {
        self.state.lock().unwrap().position
    }

    /// Bytes currently queued
    pub fn queued_bytes(&self) -> u64 {
        self.state.lock().unwrap().queued_bytes
    }

    /// Consumer underrun events since session start (monotonic)
    pub fn stutter_count(&self) -> u64 {
        self.state.lock().unwrap().stutter_count
    }

    /// Whether the queue holds no chunks
    pub fn is_empty(&self) -> bool {
        self.state.lock().unwrap().items.is_empty()
    }

    /// Configured byte budget
    pub fn max_bytes(&self) -> u64 {
        self.max_bytes
    }
}
