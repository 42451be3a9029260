//! Shared session context
//!
//! Thread-safe session state shared between the consumer thread, the
//! event-loop thread and the backend's callback threads. All flags live
//! behind one mutex and every mutation broadcasts one condition variable,
//! so a waiter (login wait, track-load wait, event loop) never misses a
//! state change. Raw fields are never exposed across the thread boundary;
//! mutation happens only through the set-and-notify methods here.

use crate::backend::BackendError;
use std::sync::{Condvar, Mutex};
use std::time::Duration;
use tracing::debug;

/// Session lifecycle states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Uninitialized,
    Creating,
    Authenticating,
    Ready,
    Playing,
    Seeking,
    Stopping,
    Destroyed,
}

#[derive(Debug)]
struct ContextFlags {
    state: SessionState,
    destroy: bool,
    logged_in: bool,
    logged_out: bool,
    play_token_lost: bool,
    connection_error: Option<BackendError>,
    streaming_error: Option<BackendError>,
}

/// Lock-guarded session flag set with set-and-notify mutators
pub struct SessionContext {
    flags: Mutex<ContextFlags>,
    cond: Condvar,
}

impl SessionContext {
    pub fn new() -> Self {
        Self {
            flags: Mutex::new(ContextFlags {
                state: SessionState::Uninitialized,
                destroy: false,
                logged_in: false,
                logged_out: false,
                play_token_lost: false,
                connection_error: None,
                streaming_error: None,
            }),
            cond: Condvar::new(),
        }
    }

    /// Current lifecycle state
    pub fn state(&self) -> SessionState {
        self.flags.lock().unwrap().state
    }

    /// Transition the lifecycle state
    pub fn set_state(&self, state: SessionState) {
        let mut flags = self.flags.lock().unwrap();
        debug!("session state {:?} -> {:?}", flags.state, state);
        flags.state = state;
        self.cond.notify_all();
    }

    /// Record the login callback's result
    ///
    /// A failed login also records the error as a connection error so the
    /// login wait terminates instead of spinning on a flag that will never
    /// be set.
    pub fn set_logged_in(&self, result: Result<(), BackendError>) {
        let mut flags = self.flags.lock().unwrap();
        match result {
            Ok(()) => {
                debug!("logged in");
                flags.logged_in = true;
            }
            Err(e) => {
                debug!("login failed: {}", e);
                flags.logged_in = false;
                flags.connection_error = Some(e);
            }
        }
        self.cond.notify_all();
    }

    /// Reset the logged-in flag before issuing a login request
    pub fn reset_login(&self) {
        let mut flags = self.flags.lock().unwrap();
        flags.logged_in = false;
        flags.connection_error = None;
        self.cond.notify_all();
    }

    pub fn logged_in(&self) -> bool {
        self.flags.lock().unwrap().logged_in
    }

    /// Record a logout callback
    pub fn set_logged_out(&self) {
        let mut flags = self.flags.lock().unwrap();
        debug!("logged out");
        flags.logged_in = false;
        flags.logged_out = true;
        self.cond.notify_all();
    }

    pub fn logged_out(&self) -> bool {
        self.flags.lock().unwrap().logged_out
    }

    /// Record a connection-level error from a backend callback
    pub fn record_connection_error(&self, error: BackendError) {
        let mut flags = self.flags.lock().unwrap();
        debug!("connection error: {}", error);
        flags.connection_error = Some(error);
        self.cond.notify_all();
    }

    pub fn connection_error(&self) -> Option<BackendError> {
        self.flags.lock().unwrap().connection_error
    }

    /// Record a streaming-level error from a backend callback
    pub fn record_streaming_error(&self, error: BackendError) {
        let mut flags = self.flags.lock().unwrap();
        debug!("streaming error: {}", error);
        flags.streaming_error = Some(error);
        self.cond.notify_all();
    }

    pub fn streaming_error(&self) -> Option<BackendError> {
        self.flags.lock().unwrap().streaming_error
    }

    /// Record that playback was claimed by another client
    pub fn set_play_token_lost(&self) {
        let mut flags = self.flags.lock().unwrap();
        debug!("play token lost");
        flags.play_token_lost = true;
        self.cond.notify_all();
    }

    pub fn play_token_lost(&self) -> bool {
        self.flags.lock().unwrap().play_token_lost
    }

    /// Ask the event loop to exit and wake it
    pub fn request_destroy(&self) {
        let mut flags = self.flags.lock().unwrap();
        flags.destroy = true;
        self.cond.notify_all();
    }

    pub fn destroy_requested(&self) -> bool {
        self.flags.lock().unwrap().destroy
    }

    /// Wake any waiter without changing state
    ///
    /// Used by the backend's notify callback to trigger an immediate
    /// event-processing iteration. Suppressed once destroy is requested.
    pub fn notify(&self) {
        let flags = self.flags.lock().unwrap();
        if !flags.destroy {
            self.cond.notify_all();
        }
    }

    /// Block for at most `timeout`, woken early by any state change
    ///
    /// Callers re-check their predicate afterwards; spurious wakeups are
    /// expected.
    pub fn wait_timeout(&self, timeout: Duration) {
        let flags = self.flags.lock().unwrap();
        let _unused = self.cond.wait_timeout(flags, timeout).unwrap();
    }
}

impl Default for SessionContext {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;
    use std::time::Instant;

    #[test]
    fn test_initial_flags() {
        let context = SessionContext::new();
        assert_eq!(context.state(), SessionState::Uninitialized);
        assert!(!context.logged_in());
        assert!(!context.logged_out());
        assert!(!context.play_token_lost());
        assert!(!context.destroy_requested());
        assert!(context.connection_error().is_none());
        assert!(context.streaming_error().is_none());
    }

    #[test]
    fn test_login_result_recording() {
        let context = SessionContext::new();

        context.set_logged_in(Ok(()));
        assert!(context.logged_in());

        context.set_logged_in(Err(BackendError::BadCredentials));
        assert!(!context.logged_in());
        assert_eq!(
            context.connection_error(),
            Some(BackendError::BadCredentials)
        );

        context.reset_login();
        assert!(!context.logged_in());
        assert!(context.connection_error().is_none());
    }

    #[test]
    fn test_logout_clears_logged_in() {
        let context = SessionContext::new();
        context.set_logged_in(Ok(()));
        context.set_logged_out();
        assert!(!context.logged_in());
        assert!(context.logged_out());
    }

    #[test]
    fn test_wait_timeout_expires() {
        let context = SessionContext::new();
        let start = Instant::now();
        context.wait_timeout(Duration::from_millis(30));
        assert!(start.elapsed() >= Duration::from_millis(25));
    }

    #[test]
    fn test_wait_woken_by_mutation() {
        let context = Arc::new(SessionContext::new());

        let waiter = {
            let context = Arc::clone(&context);
            thread::spawn(move || {
                let start = Instant::now();
                while !context.logged_in() {
                    context.wait_timeout(Duration::from_secs(5));
                }
                start.elapsed()
            })
        };

        thread::sleep(Duration::from_millis(20));
        context.set_logged_in(Ok(()));

        // Woken well before the 5 s timeout.
        let elapsed = waiter.join().unwrap();
        assert!(elapsed < Duration::from_secs(1));
    }
}
