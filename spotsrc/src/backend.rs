//! Streaming backend boundary
//!
//! The remote streaming library is an external collaborator: it logs in,
//! resolves track links, drives playback and delivers decoded PCM through
//! callbacks on threads of its own choosing. This module pins down that
//! boundary as a set of traits so the session layer can be exercised
//! against a scripted backend in tests.
//!
//! ## Callback routing
//!
//! Callbacks are delivered to the [`SessionDelegate`] handed to
//! [`SessionBackend::open_session`]. The delegate is the per-session
//! user-data pointer: implementations must invoke it for exactly the
//! session it was registered with, and must stop invoking it once the
//! session handle has been dropped.
//!
//! ## Threading
//!
//! Delegate methods may be invoked from the event-loop thread or from
//! backend-internal threads; implementations of [`SessionDelegate`] take
//! their own locks and never assume a particular calling thread.
//! [`SessionDelegate::music_delivery`] must return without blocking.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Errors reported by the streaming backend
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendError {
    #[error("application key was rejected")]
    BadApplicationKey,

    #[error("username or password was rejected")]
    BadCredentials,

    #[error("account does not allow streaming playback")]
    PremiumRequired,

    #[error("track cannot be played")]
    TrackNotPlayable,

    #[error("network unavailable or connection lost")]
    ConnectionLost,

    #[error("backend error code {0}")]
    Other(i32),
}

/// PCM format of delivered audio
///
/// Reported by the backend with each delivery; the source sizes incoming
/// chunks from it but does not negotiate it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AudioFormat {
    /// Sample rate in Hz
    pub sample_rate: u32,
    /// Interleaved channel count
    pub channels: u32,
}

impl AudioFormat {
    /// 16-bit stereo at 44.1 kHz, the backend's usual delivery format.
    pub const CD_STEREO: AudioFormat = AudioFormat {
        sample_rate: 44_100,
        channels: 2,
    };

    /// Bytes per frame (one 16-bit sample per channel)
    pub fn frame_bytes(&self) -> usize {
        self.channels as usize * std::mem::size_of::<i16>()
    }

    /// Playback duration of `frames` frames at this sample rate
    pub fn frames_to_duration(&self, frames: u32) -> Duration {
        Duration::from_nanos(frames as u64 * 1_000_000_000 / self.sample_rate as u64)
    }
}

impl Default for AudioFormat {
    fn default() -> Self {
        Self::CD_STEREO
    }
}

/// Buffer statistics reported back to the backend
///
/// The backend polls these to adapt its delivery pacing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AudioBufferStats {
    /// Consumer waits with no data available (underrun events)
    pub stutter: u64,
    /// Currently queued audio, in frames
    pub queued_samples: u64,
}

/// Session configuration passed to the backend at create time
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Opaque application key blob
    pub application_key: Vec<u8>,
    /// Backend cache directory
    pub cache_location: PathBuf,
    /// Backend settings directory
    pub settings_location: PathBuf,
    /// User agent string
    pub user_agent: String,
}

/// A resolved track reference
///
/// Resolution is asynchronous: the handle exists immediately, but its
/// metadata only becomes valid once [`TrackHandle::is_loaded`] reports
/// true (driven by event processing). Dropping the handle releases the
/// backend's reference.
pub trait TrackHandle: Send {
    /// Whether the track's metadata has finished loading
    fn is_loaded(&self) -> bool;

    /// Total track duration; only meaningful once loaded
    fn duration(&self) -> Duration;
}

/// Callbacks the backend invokes on a live session
///
/// One method per backend callback; each implementation acquires the
/// session or queue lock, mutates, and signals waiters.
pub trait SessionDelegate: Send + Sync {
    /// Asynchronous completion of a login request
    fn logged_in(&self, result: Result<(), BackendError>);

    /// The session was logged out
    fn logged_out(&self);

    /// Connection-level failure; recorded for the caller to inspect
    fn connection_error(&self, error: BackendError);

    /// Streaming-level failure; recorded for the caller to inspect
    fn streaming_error(&self, error: BackendError);

    /// Playback was claimed by another client of the same account
    fn play_token_lost(&self);

    /// No further audio will be delivered for the current track
    fn end_of_track(&self);

    /// The backend wants an immediate event-processing iteration
    fn notify_main_thread(&self);

    /// Decoded PCM delivery
    ///
    /// `frames` holds interleaved 16-bit samples,
    /// `frames.len() == frame_count * format.channels`. Returns the number
    /// of frames accepted; anything less than the offered count tells the
    /// backend to redeliver the remainder later. Never blocks.
    fn music_delivery(&self, format: AudioFormat, frames: &[i16]) -> usize;

    /// Buffer occupancy report for backend pacing
    fn buffer_stats(&self) -> AudioBufferStats;
}

/// A live backend session handle
///
/// All methods issue backend requests; asynchronous completions arrive via
/// the [`SessionDelegate`]. Dropping the last handle releases the backend
/// session and its resources.
pub trait BackendSession: Send + Sync {
    /// Issue an asynchronous login request; completion arrives via
    /// [`SessionDelegate::logged_in`]
    fn login(&self, username: &str, password: &str) -> Result<(), BackendError>;

    /// Process pending network/session events
    ///
    /// Returns the suggested maximum wait before the next call. Called
    /// periodically by the event loop, and additionally by the blocking
    /// login/track-load waits; implementations serialize internally.
    fn process_events(&self) -> Result<Duration, BackendError>;

    /// Resolve a URI location into a track handle
    fn resolve_track(&self, location: &str) -> Result<Box<dyn TrackHandle>, BackendError>;

    /// Load a resolved (and fully loaded) track into the player
    fn player_load(&self, track: &dyn TrackHandle) -> Result<(), BackendError>;

    /// Start or pause playback of the loaded track
    fn player_play(&self, playing: bool) -> Result<(), BackendError>;

    /// Seek the player, in track time
    fn player_seek(&self, position: Duration) -> Result<(), BackendError>;

    /// Unload the current track
    fn player_unload(&self) -> Result<(), BackendError>;
}

/// Factory for backend sessions
///
/// At most one session is opened at a time per source instance; the
/// session layer enforces this.
pub trait SessionBackend: Send + Sync {
    /// Open a session, registering `delegate` for its callbacks
    fn open_session(
        &self,
        config: SessionConfig,
        delegate: Arc<dyn SessionDelegate>,
    ) -> Result<Arc<dyn BackendSession>, BackendError>;
}
