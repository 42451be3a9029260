//! Session event loop
//!
//! The backend only makes progress (network traffic, callback dispatch)
//! when its event-processing step runs. A dedicated thread drives that
//! step, sleeping between iterations for whatever interval the backend
//! suggests, and waking early when the backend's notify callback signals
//! the session condition variable. The thread exits when the destroy flag
//! is set and is joined by the controller during stop.

use crate::backend::BackendSession;
use crate::error::{Error, Result};
use crate::session::context::SessionContext;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, trace, warn};

/// Fallback wait when event processing itself fails.
const ERROR_RETRY_INTERVAL: Duration = Duration::from_millis(1000);

/// Handle to the running event-loop thread
pub struct EventLoop {
    handle: Option<JoinHandle<()>>,
}

impl EventLoop {
    /// Spawn the event-loop thread
    ///
    /// # Errors
    /// Thread creation failure; the caller must release the session
    /// handle it passed in.
    pub fn spawn(session: Arc<dyn BackendSession>, context: Arc<SessionContext>) -> Result<Self> {
        let handle = thread::Builder::new()
            .name("spotsrc-session".to_string())
            .spawn(move || run(session, context))
            .map_err(|e| Error::SessionCreate(format!("failed to spawn event loop: {}", e)))?;

        Ok(Self {
            handle: Some(handle),
        })
    }

    /// Join the event-loop thread
    ///
    /// The destroy flag must already be set (and the condvar signalled)
    /// or this blocks until the next process-events timeout.
    pub fn join(&mut self) {
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                warn!("session event loop panicked");
            }
        }
    }
}

fn run(session: Arc<dyn BackendSession>, context: Arc<SessionContext>) {
    debug!("session event loop started");

    while !context.destroy_requested() {
        let timeout = match session.process_events() {
            Ok(timeout) => {
                trace!("processed events, next timeout {:?}", timeout);
                timeout
            }
            Err(e) => {
                warn!("event processing failed: {}", e);
                ERROR_RETRY_INTERVAL
            }
        };

        // Re-check after processing: a stop issued mid-iteration must not
        // strand us in the timed wait.
        if context.destroy_requested() {
            break;
        }

        context.wait_timeout(timeout);
    }

    debug!("session event loop exiting");
}
