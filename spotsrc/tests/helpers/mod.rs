//! Shared test helpers: a scripted mock backend
//!
//! The mock implements the backend boundary traits with configurable
//! failure points and records every player call. Tests drive the
//! delegate directly to simulate the backend's delivery/callback threads.

use spotsrc::backend::{
    AudioFormat, BackendError, BackendSession, SessionBackend, SessionConfig, SessionDelegate,
    TrackHandle,
};
use spotsrc::config::SourceConfig;
use spotsrc::credentials::APPLICATION_KEY_SIZE;
use std::io::Write;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Failure points and timings for a scripted session.
#[derive(Clone)]
pub struct MockBehavior {
    pub fail_login: bool,
    pub fail_resolve: bool,
    pub fail_load: bool,
    pub fail_play: bool,
    pub fail_seek: bool,
    /// Number of process_events iterations before the track reports
    /// loaded
    pub track_load_iterations: u32,
    pub track_duration: Duration,
}

impl Default for MockBehavior {
    fn default() -> Self {
        Self {
            fail_login: false,
            fail_resolve: false,
            fail_load: false,
            fail_play: false,
            fail_seek: false,
            track_load_iterations: 2,
            track_duration: Duration::from_secs(213),
        }
    }
}

#[derive(Default)]
pub struct MockShared {
    delegate: Mutex<Option<Arc<dyn SessionDelegate>>>,
    calls: Mutex<Vec<String>>,
    seeks: Mutex<Vec<Duration>>,
    session_released: AtomicBool,
}

pub struct MockBackend {
    behavior: MockBehavior,
    shared: Arc<MockShared>,
}

impl MockBackend {
    pub fn new(behavior: MockBehavior) -> Arc<Self> {
        Arc::new(Self {
            behavior,
            shared: Arc::new(MockShared::default()),
        })
    }

    /// The delegate registered by the most recent open_session
    pub fn delegate(&self) -> Arc<dyn SessionDelegate> {
        self.shared
            .delegate
            .lock()
            .unwrap()
            .clone()
            .expect("no session opened yet")
    }

    /// Deliver `frames` stereo frames of silence, returning the accepted
    /// count (simulates the backend's delivery thread)
    pub fn deliver(&self, frames: usize) -> usize {
        let samples = vec![0i16; frames * 2];
        self.delegate()
            .music_delivery(AudioFormat::CD_STEREO, &samples)
    }

    /// Signal end-of-track (simulates the backend's callback thread)
    pub fn end_of_track(&self) {
        self.delegate().end_of_track();
    }

    /// Player calls recorded so far
    pub fn calls(&self) -> Vec<String> {
        self.shared.calls.lock().unwrap().clone()
    }

    /// Seek targets forwarded to the backend
    pub fn seeks(&self) -> Vec<Duration> {
        self.shared.seeks.lock().unwrap().clone()
    }

    /// Whether the session handle has been dropped
    pub fn session_released(&self) -> bool {
        self.shared.session_released.load(Ordering::SeqCst)
    }
}

struct MockSession {
    behavior: MockBehavior,
    shared: Arc<MockShared>,
    login_pending: AtomicBool,
    track_countdown: Arc<AtomicU32>,
}

impl Drop for MockSession {
    fn drop(&mut self) {
        self.shared.session_released.store(true, Ordering::SeqCst);
    }
}

struct MockTrack {
    countdown: Arc<AtomicU32>,
    duration: Duration,
}

impl TrackHandle for MockTrack {
    fn is_loaded(&self) -> bool {
        self.countdown.load(Ordering::SeqCst) == 0
    }

    fn duration(&self) -> Duration {
        self.duration
    }
}

impl BackendSession for MockSession {
    fn login(&self, _username: &str, _password: &str) -> Result<(), BackendError> {
        self.shared.calls.lock().unwrap().push("login".into());
        self.login_pending.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn process_events(&self) -> Result<Duration, BackendError> {
        // Login completion arrives via the delegate during event
        // processing, like a real callback.
        if self.login_pending.swap(false, Ordering::SeqCst) {
            let delegate = self.shared.delegate.lock().unwrap().clone();
            if let Some(delegate) = delegate {
                if self.behavior.fail_login {
                    delegate.logged_in(Err(BackendError::BadCredentials));
                } else {
                    delegate.logged_in(Ok(()));
                }
            }
        }

        let remaining = self.track_countdown.load(Ordering::SeqCst);
        if remaining > 0 {
            self.track_countdown.store(remaining - 1, Ordering::SeqCst);
        }

        Ok(Duration::from_millis(5))
    }

    fn resolve_track(&self, location: &str) -> Result<Box<dyn TrackHandle>, BackendError> {
        self.shared
            .calls
            .lock()
            .unwrap()
            .push(format!("resolve:{}", location));
        if self.behavior.fail_resolve {
            return Err(BackendError::TrackNotPlayable);
        }
        Ok(Box::new(MockTrack {
            countdown: Arc::clone(&self.track_countdown),
            duration: self.behavior.track_duration,
        }))
    }

    fn player_load(&self, _track: &dyn TrackHandle) -> Result<(), BackendError> {
        self.shared.calls.lock().unwrap().push("load".into());
        if self.behavior.fail_load {
            return Err(BackendError::TrackNotPlayable);
        }
        Ok(())
    }

    fn player_play(&self, playing: bool) -> Result<(), BackendError> {
        self.shared
            .calls
            .lock()
            .unwrap()
            .push(format!("play:{}", playing));
        if playing && self.behavior.fail_play {
            return Err(BackendError::PremiumRequired);
        }
        Ok(())
    }

    fn player_seek(&self, position: Duration) -> Result<(), BackendError> {
        if self.behavior.fail_seek {
            return Err(BackendError::Other(-1));
        }
        self.shared.seeks.lock().unwrap().push(position);
        Ok(())
    }

    fn player_unload(&self) -> Result<(), BackendError> {
        self.shared.calls.lock().unwrap().push("unload".into());
        Ok(())
    }
}

impl SessionBackend for MockBackend {
    fn open_session(
        &self,
        _config: SessionConfig,
        delegate: Arc<dyn SessionDelegate>,
    ) -> Result<Arc<dyn BackendSession>, BackendError> {
        *self.shared.delegate.lock().unwrap() = Some(delegate);
        Ok(Arc::new(MockSession {
            behavior: self.behavior.clone(),
            shared: Arc::clone(&self.shared),
            login_pending: AtomicBool::new(false),
            track_countdown: Arc::new(AtomicU32::new(self.behavior.track_load_iterations)),
        }))
    }
}

/// Write a correctly-sized application key file
pub fn appkey_file() -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(&[0x42u8; APPLICATION_KEY_SIZE]).unwrap();
    file.flush().unwrap();
    file
}

/// Source configuration pointing at the given key file
pub fn test_config(appkey: &Path) -> SourceConfig {
    SourceConfig {
        username: "tester".into(),
        password: "secret".into(),
        appkey_file: appkey.to_path_buf(),
        uri: "spotify://spotify:track:27jdUE1EYDSXZqhjuNxLem".into(),
        ..SourceConfig::default()
    }
}
