//! Session lifecycle controller
//!
//! Owns the single active backend session: creates it from the loaded
//! application key, drives login and track loading to completion over the
//! asynchronous backend, issues playback control, and tears everything
//! down in one finalization path. Synchronous-looking operations are
//! implemented by issuing the asynchronous request and then waiting on the
//! session condition variable, running the backend's event-processing step
//! on every wakeup so the completion callback can actually arrive.
//!
//! ## Teardown ordering
//!
//! The caller marks the buffer queue flushing before invoking
//! [`SessionController::shutdown`], and flushing stays asserted through
//! the destroy-flag/join/release sequence. A delivery callback racing
//! teardown is therefore rejected at the queue boundary instead of being
//! queued into a dying session.

use crate::backend::{
    AudioBufferStats, AudioFormat, BackendError, BackendSession, SessionBackend, SessionConfig,
    SessionDelegate,
};
use crate::config::SourceConfig;
use crate::credentials::ApplicationKey;
use crate::error::{Error, Result};
use crate::playback::buffer::BufferQueue;
use crate::session::context::{SessionContext, SessionState};
use crate::session::event_loop::EventLoop;
use bytes::Bytes;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Upper bound on one wait slice in the login/track-load waits; keeps the
/// waits responsive to callbacks that fire without a notify.
const POLL_SLICE: Duration = Duration::from_millis(10);

/// Routes backend callbacks into the session context and buffer queue
///
/// Registered with the backend at session create; the backend invokes it
/// from the event-loop thread or threads of its own. Every method takes
/// the appropriate lock, mutates one piece of state and signals waiters.
struct SourceDelegate {
    context: Arc<SessionContext>,
    queue: Arc<BufferQueue>,
    /// Format used for buffer statistics conversion
    stats_format: AudioFormat,
}

impl SessionDelegate for SourceDelegate {
    fn logged_in(&self, result: std::result::Result<(), BackendError>) {
        self.context.set_logged_in(result);
    }

    fn logged_out(&self) {
        self.context.set_logged_out();
    }

    fn connection_error(&self, error: BackendError) {
        self.context.record_connection_error(error);
    }

    fn streaming_error(&self, error: BackendError) {
        self.context.record_streaming_error(error);
    }

    fn play_token_lost(&self) {
        self.context.set_play_token_lost();
    }

    fn end_of_track(&self) {
        self.queue.set_eos();
    }

    fn notify_main_thread(&self) {
        self.context.notify();
    }

    fn music_delivery(&self, format: AudioFormat, frames: &[i16]) -> usize {
        // A zero-frame delivery is the backend's own seek marker.
        if frames.is_empty() {
            return 0;
        }

        let channels = format.channels.max(1) as usize;
        let frame_count = frames.len() / channels;

        let mut data = Vec::with_capacity(frames.len() * std::mem::size_of::<i16>());
        for sample in frames {
            data.extend_from_slice(&sample.to_ne_bytes());
        }
        let duration = format.frames_to_duration(frame_count as u32);

        // Rejected chunks are redelivered by the backend later; reporting
        // zero accepted frames is the backpressure signal, not an error.
        if self
            .queue
            .try_enqueue(Bytes::from(data), frame_count as u32, duration)
        {
            frame_count
        } else {
            0
        }
    }

    fn buffer_stats(&self) -> AudioBufferStats {
        AudioBufferStats {
            stutter: self.queue.stutter_count(),
            queued_samples: self.queue.queued_bytes() / self.stats_format.frame_bytes() as u64,
        }
    }
}

/// Owns the active streaming session and its event-loop thread
pub struct SessionController {
    session: Arc<dyn BackendSession>,
    context: Arc<SessionContext>,
    event_loop: EventLoop,
}

impl SessionController {
    /// Create a backend session and spawn its event loop
    ///
    /// Loads the application key, opens the session with a delegate wired
    /// to `queue` and the new session context, and spawns the event-loop
    /// thread. If the thread cannot be spawned the session handle is
    /// released before the error returns.
    pub fn create(
        backend: &dyn SessionBackend,
        config: &SourceConfig,
        queue: Arc<BufferQueue>,
    ) -> Result<Self> {
        let key = ApplicationKey::load(&config.appkey_file)?;

        let context = Arc::new(SessionContext::new());
        context.set_state(SessionState::Creating);

        let delegate = Arc::new(SourceDelegate {
            context: Arc::clone(&context),
            queue,
            stats_format: AudioFormat::default(),
        });

        let session_config = SessionConfig {
            application_key: key.into_bytes(),
            cache_location: config.cache_dir.clone(),
            settings_location: config.settings_dir.clone(),
            user_agent: config.user_agent.clone(),
        };

        debug!("creating backend session");
        let session = backend
            .open_session(session_config, delegate)
            .map_err(|e| Error::SessionCreate(e.to_string()))?;

        let event_loop = match EventLoop::spawn(Arc::clone(&session), Arc::clone(&context)) {
            Ok(event_loop) => event_loop,
            Err(e) => {
                // Release the half-created session before surfacing the
                // spawn failure.
                drop(session);
                context.set_state(SessionState::Destroyed);
                return Err(e);
            }
        };

        context.set_state(SessionState::Authenticating);

        Ok(Self {
            session,
            context,
            event_loop,
        })
    }

    /// Log in and block until the backend confirms or fails
    ///
    /// Issues the asynchronous login request, then waits on the session
    /// condition variable (bounded slices, event processing on every
    /// wakeup) until the login callback sets the flag or records an
    /// error.
    pub fn login(&self, username: &str, password: &str) -> Result<()> {
        debug!("attempting login");
        self.context.reset_login();

        self.session
            .login(username, password)
            .map_err(|e| Error::Login(e.to_string()))?;

        loop {
            if self.context.logged_in() {
                info!("login complete");
                self.context.set_state(SessionState::Ready);
                return Ok(());
            }
            if let Some(e) = self.context.connection_error() {
                return Err(Error::Login(e.to_string()));
            }

            let timeout = self.drive_events();
            self.context.wait_timeout(timeout.min(POLL_SLICE));
        }
    }

    /// Resolve and start playing a track; returns its total duration
    ///
    /// Resolution is asynchronous: the handle is created immediately but
    /// its metadata loads over subsequent event-processing iterations.
    /// The handle is scoped to this call, so every exit path (including
    /// the error returns) releases the backend's track reference.
    pub fn play(&self, location: &str) -> Result<Duration> {
        debug!("resolving track '{}'", location);
        let track = self
            .session
            .resolve_track(location)
            .map_err(|e| Error::TrackResolution(format!("'{}': {}", location, e)))?;

        while !track.is_loaded() {
            if let Some(e) = self.context.connection_error() {
                return Err(Error::TrackResolution(format!(
                    "'{}': connection lost while loading: {}",
                    location, e
                )));
            }

            let timeout = self.drive_events();
            self.context.wait_timeout(timeout.min(POLL_SLICE));
        }
        debug!("track loaded");

        self.session
            .player_load(track.as_ref())
            .map_err(|e| Error::PlaybackStart(format!("load rejected: {}", e)))?;

        let duration = track.duration();

        self.session
            .player_play(true)
            .map_err(|e| Error::PlaybackStart(format!("play rejected: {}", e)))?;

        info!("playback started, track duration {:?}", duration);
        self.context.set_state(SessionState::Playing);
        Ok(duration)
    }

    /// Issue a backend seek
    pub fn seek(&self, target: Duration) -> Result<()> {
        debug!("seeking to {:?}", target);
        self.context.set_state(SessionState::Seeking);

        let result = self
            .session
            .player_seek(target)
            .map_err(|e| Error::Seek(e.to_string()));

        // Playing again whether or not the backend took the seek; a
        // rejected seek leaves the old position streaming.
        self.context.set_state(SessionState::Playing);
        result
    }

    /// Stop playback and tear the session down
    ///
    /// Stops and unloads the player (failures logged, teardown
    /// continues), asks the event loop to exit, joins it, and releases
    /// the session handle. The caller has already marked the buffer
    /// queue flushing, so deliveries racing this teardown are rejected.
    pub fn shutdown(mut self) -> Result<()> {
        info!("shutting down session");
        self.context.set_state(SessionState::Stopping);

        if let Err(e) = self.session.player_play(false) {
            warn!("player stop rejected: {}", e);
        }
        if let Err(e) = self.session.player_unload() {
            warn!("player unload rejected: {}", e);
        }

        self.context.request_destroy();
        self.event_loop.join();

        // Last handles: ours and the joined loop's. Dropping here
        // releases the backend session.
        drop(self.session);

        self.context.set_state(SessionState::Destroyed);
        debug!("session destroyed");
        Ok(())
    }

    /// Shared session context (state and asynchronous error flags)
    pub fn context(&self) -> &Arc<SessionContext> {
        &self.context
    }

    fn drive_events(&self) -> Duration {
        match self.session.process_events() {
            Ok(timeout) => timeout,
            Err(e) => {
                warn!("event processing failed: {}", e);
                Duration::from_millis(1000)
            }
        }
    }
}
