//! Playback-side components: the bounded buffer queue and the pull path

pub mod buffer;
pub mod pull;

pub use buffer::{AudioBuffer, BufferQueue, Dequeued};
pub use pull::{Pull, PullCoordinator};
