//! Session-side components: lifecycle controller, shared context and the
//! event-loop thread

pub mod context;
pub mod controller;
pub mod event_loop;

pub use context::{SessionContext, SessionState};
pub use controller::SessionController;
pub use event_loop::EventLoop;
