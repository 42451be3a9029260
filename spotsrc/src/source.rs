//! Pull-based source facade
//!
//! `SpotifySource` is the element-level surface the pipeline talks to:
//! `start` brings a session up (create, login, resolve, play), `pull`
//! blocks for the next decoded chunk, `seek`/`unlock`/`unlock_stop`
//! manage flushing, and `stop` tears everything down. One source owns at
//! most one live session at a time.
//!
//! The facade also owns the two pieces of element state that outlive a
//! single session operation: the configured URI (settable only while
//! stopped) and the reported track size (known only between a successful
//! `play` and `stop`).

use crate::backend::{BackendError, SessionBackend};
use crate::config::SourceConfig;
use crate::error::{Error, Result};
use crate::playback::buffer::BufferQueue;
use crate::playback::pull::{Pull, PullCoordinator};
use crate::session::controller::SessionController;
use crate::uri::TrackUri;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{debug, info, warn};

struct SourceState {
    config: SourceConfig,
    controller: Option<SessionController>,
    /// Total track duration, known once `play` succeeds
    size: Option<Duration>,
    /// The first seek to zero after start is swallowed (the backend
    /// misbehaves when seeked to zero before delivering any data)
    first_seek: bool,
}

/// Pull-based source over a callback-driven streaming backend
pub struct SpotifySource {
    backend: Arc<dyn SessionBackend>,
    queue: Arc<BufferQueue>,
    coordinator: PullCoordinator,
    state: Mutex<SourceState>,
}

impl SpotifySource {
    /// Create a stopped source
    ///
    /// The queue byte budget is taken from `config.max_queue_bytes`; no
    /// backend call is made until [`start`](Self::start).
    pub fn new(backend: Arc<dyn SessionBackend>, config: SourceConfig) -> Self {
        let queue = Arc::new(BufferQueue::new(config.max_queue_bytes));
        let coordinator = PullCoordinator::new(Arc::clone(&queue));

        Self {
            backend,
            queue,
            coordinator,
            state: Mutex::new(SourceState {
                config,
                controller: None,
                size: None,
                first_seek: true,
            }),
        }
    }

    /// Bring the source up: create session, login, resolve and play
    ///
    /// Any failing step tears the partial session down before the error
    /// returns; the source is only considered started when every step
    /// succeeded.
    pub fn start(&self) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        if state.controller.is_some() {
            return Err(Error::InvalidState("source already started".into()));
        }

        info!("starting source");
        let uri = TrackUri::parse(&state.config.uri)?;

        state.first_seek = true;
        self.queue.reset_for_start();

        let controller =
            SessionController::create(self.backend.as_ref(), &state.config, Arc::clone(&self.queue))?;

        if let Err(e) = controller.login(&state.config.username, &state.config.password) {
            self.teardown(controller);
            return Err(e);
        }

        let size = match controller.play(uri.location()) {
            Ok(size) => size,
            Err(e) => {
                self.teardown(controller);
                return Err(e);
            }
        };

        state.size = Some(size);
        state.controller = Some(controller);
        info!("source started, track duration {:?}", size);
        Ok(())
    }

    /// Tear the source down
    ///
    /// Marks the queue flushing (unblocking any in-progress pull with
    /// `Cancelled`), stops backend playback, drains the queue, joins the
    /// event loop and releases the session. Safe to call when already
    /// stopped.
    pub fn stop(&self) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        let Some(controller) = state.controller.take() else {
            debug!("stop on a stopped source");
            return Ok(());
        };

        info!("stopping source");
        state.size = None;

        // Flushing is asserted before the backend stop and stays set
        // through join, so a delivery racing teardown is rejected at the
        // queue.
        self.queue.flush();
        controller.shutdown()?;
        self.queue.clear_eos();

        Ok(())
    }

    /// Block for the next chunk of decoded audio
    ///
    /// `length` is ignored (the backend controls chunk granularity) and
    /// `offset` is not interpreted as a seek; use [`seek`](Self::seek).
    /// Returns `Cancelled` while flushing (seek/shutdown) and
    /// `EndOfStream` once the queue drains after end-of-track.
    pub fn pull(&self, offset: u64, length: u32) -> Pull {
        self.coordinator.pull(offset, length)
    }

    /// Seek to an absolute track position
    ///
    /// On backend acceptance the queue is flushed and the playback
    /// position accumulator rewound to `target`. The very first seek to
    /// zero after `start` is treated as already satisfied and makes no
    /// backend call.
    pub fn seek(&self, target: Duration) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        if state.controller.is_none() {
            return Err(Error::InvalidState("seek on a stopped source".into()));
        }

        if state.first_seek && target == Duration::ZERO {
            debug!("swallowing initial seek to zero");
            state.first_seek = false;
            return Ok(());
        }
        state.first_seek = false;

        if let Some(controller) = state.controller.as_ref() {
            if let Err(e) = controller.seek(target) {
                warn!("seek failed: {}", e);
                return Err(e);
            }
        }

        debug!("flushing queue after seek");
        self.queue.flush();
        self.queue.clear_eos();
        self.queue.reset_position(target);
        self.queue.clear_flushing();

        Ok(())
    }

    /// Unblock a pending pull (flush begins)
    ///
    /// Sets the queue flushing so any blocked pull returns `Cancelled`.
    /// The data drain belongs to the operation that triggered the unlock
    /// (stop or seek).
    pub fn unlock(&self) {
        debug!("unlock");
        self.queue.start_flushing();
    }

    /// Resume normal pull operation after an unlock
    pub fn unlock_stop(&self) {
        debug!("unlock stop");
        self.queue.clear_flushing();
    }

    /// Total track duration, once known
    ///
    /// `None` before `play` succeeds and after `stop`.
    pub fn size(&self) -> Option<Duration> {
        self.state.lock().unwrap().size
    }

    /// The configured track URI
    pub fn uri(&self) -> String {
        self.state.lock().unwrap().config.uri.clone()
    }

    /// Replace the configured track URI
    ///
    /// Validated against the fixed scheme; rejected while the source is
    /// started.
    pub fn set_uri(&self, uri: &str) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        if state.controller.is_some() {
            warn!("rejecting URI change while started");
            return Err(Error::InvalidState("cannot set URI while started".into()));
        }

        let parsed = TrackUri::parse(uri)?;
        debug!("URI set to '{}'", parsed);
        state.config.uri = parsed.as_str().to_string();
        Ok(())
    }

    /// Connection error recorded by backend callbacks, if any
    pub fn connection_error(&self) -> Option<BackendError> {
        let state = self.state.lock().unwrap();
        state
            .controller
            .as_ref()
            .and_then(|c| c.context().connection_error())
    }

    /// Streaming error recorded by backend callbacks, if any
    pub fn streaming_error(&self) -> Option<BackendError> {
        let state = self.state.lock().unwrap();
        state
            .controller
            .as_ref()
            .and_then(|c| c.context().streaming_error())
    }

    /// Whether playback was claimed by another client of the account
    pub fn play_token_lost(&self) -> bool {
        let state = self.state.lock().unwrap();
        state
            .controller
            .as_ref()
            .map(|c| c.context().play_token_lost())
            .unwrap_or(false)
    }

    fn teardown(&self, controller: SessionController) {
        self.queue.flush();
        if let Err(e) = controller.shutdown() {
            warn!("teardown after failed start: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{BackendSession, SessionConfig, SessionDelegate};

    /// Backend whose sessions can never be opened; enough for the
    /// stopped-state surface.
    struct UnreachableBackend;

    impl SessionBackend for UnreachableBackend {
        fn open_session(
            &self,
            _config: SessionConfig,
            _delegate: Arc<dyn SessionDelegate>,
        ) -> std::result::Result<Arc<dyn BackendSession>, BackendError> {
            Err(BackendError::ConnectionLost)
        }
    }

    fn stopped_source() -> SpotifySource {
        SpotifySource::new(Arc::new(UnreachableBackend), SourceConfig::default())
    }

    #[test]
    fn test_size_unknown_before_start() {
        let source = stopped_source();
        assert!(source.size().is_none());
    }

    #[test]
    fn test_stop_is_idempotent_when_stopped() {
        let source = stopped_source();
        assert!(source.stop().is_ok());
        assert!(source.stop().is_ok());
    }

    #[test]
    fn test_seek_rejected_when_stopped() {
        let source = stopped_source();
        let result = source.seek(Duration::from_secs(1));
        assert!(matches!(result, Err(Error::InvalidState(_))));
    }

    #[test]
    fn test_set_uri_validates_scheme() {
        let source = stopped_source();
        assert!(source.set_uri("spotify://spotify:track:abc").is_ok());
        assert_eq!(source.uri(), "spotify://spotify:track:abc");

        let result = source.set_uri("http://spotify:track:abc");
        assert!(matches!(result, Err(Error::InvalidUri(_))));
        assert_eq!(source.uri(), "spotify://spotify:track:abc");
    }

    #[test]
    fn test_unlock_cancels_pull_and_unlock_stop_resumes() {
        let source = stopped_source();

        source.unlock();
        assert!(matches!(source.pull(0, 4096), Pull::Cancelled));

        source.unlock_stop();
        // Queue accepts data again after unlock_stop.
        assert!(source.queue.try_enqueue(
            bytes::Bytes::from_static(&[0; 4]),
            1,
            Duration::from_millis(1)
        ));
    }

    #[test]
    fn test_start_failure_leaves_source_stopped() {
        let key_error_source = stopped_source();
        // Default config points at no readable key file, so create fails
        // before the backend is even consulted.
        assert!(key_error_source.start().is_err());
        assert!(key_error_source.size().is_none());
        // Still settable: the source never started.
        assert!(key_error_source
            .set_uri("spotify://spotify:track:other")
            .is_ok());
    }
}
