//! Session-fatal errors: failures that terminate the receive thread and
//! leave the control plane in `Idle` with an observable error, as opposed to
//! [`crate::decoder::RejectReason`], which only ever drops one frame.

use std::io;

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("failed to create or bind the UDP socket: {0}")]
    Socket(#[from] io::Error),
    #[error("session is already running")]
    AlreadyRunning,
    #[error("receive thread panicked")]
    ThreadPanicked,
}
