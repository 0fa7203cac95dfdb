//! Inbound SMTP: the command state machine and the accept loop.

mod listener;
mod session;

pub use listener::{MessageSink, run, serve_connection};
pub use session::{ReceivedMessage, Session, SessionLimits, SessionState, Step};
