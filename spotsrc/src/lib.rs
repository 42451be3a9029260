//! # spotsrc
//!
//! Pull-based source adapter for a callback-driven audio streaming
//! backend.
//!
//! **Purpose:** the backend delivers decoded PCM asynchronously, on its
//! own threads, in chunks of its own choosing; the consumer pulls audio
//! synchronously, blocking until data is available, and expects seeking,
//! flushing and clean end-of-stream signaling. This crate is the adapter
//! between those two timing domains: a bounded buffer queue with
//! byte-budget backpressure, a session lifecycle state machine driven by
//! backend callbacks, and an event-loop thread, tied together by a
//! condition-variable wake-up protocol.
//!
//! **Architecture:** [`SpotifySource`] is the consumer-facing facade; a
//! [`session::SessionController`] owns the live backend session and its
//! event loop; deliveries land in a [`playback::BufferQueue`] that the
//! pull path blocks on. The backend itself sits behind the traits in
//! [`backend`], so the whole session layer runs against a scripted
//! backend in tests.

pub mod backend;
pub mod config;
pub mod credentials;
pub mod error;
pub mod playback;
pub mod session;
pub mod source;
pub mod uri;

pub use config::SourceConfig;
pub use error::{Error, Result};
pub use playback::{AudioBuffer, Pull};
pub use source::SpotifySource;
