//! The control plane: owns the receive thread and the socket, and exposes
//! an `Idle -> Running -> Stopping -> Idle` lifecycle. An `Arc<AtomicBool>`
//! running flag, a named `thread::Builder` spawn, shutdown-unblocks-the-
//! blocking-call followed by `join`, and a `Drop` impl that calls `stop`.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crate::config::Config;
use crate::consumer::Consumer;
use crate::decoder::{self, RejectReason};
use crate::error::SessionError;
use crate::framer;
use crate::socket::{SocketSource, MAX_DATAGRAM_LEN};

/// A started, stoppable decode session. `Session` itself is the `Idle`
/// state; calling [`Session::start`] with a consumer transitions it to
/// `Running` and hands back the handle to call `stop` on.
#[derive(Default)]
pub struct Session {
    handle: Option<Handle>,
}

struct Handle {
    running: Arc<AtomicBool>,
    source: Arc<SocketSource>,
    thread: JoinHandle<()>,
}

impl Session {
    pub fn new() -> Self {
        Session::default()
    }

    /// Starts the receive thread. Returns `SessionError::AlreadyRunning` if
    /// a previous `start` has not been `stop`ped: a started session cannot
    /// be restarted without a full teardown.
    pub fn start<C>(&mut self, config: Config, consumer: C) -> Result<(), SessionError>
    where
        C: Consumer + Send + 'static,
    {
        if self.handle.is_some() {
            return Err(SessionError::AlreadyRunning);
        }

        let source = Arc::new(SocketSource::bind(&config)?);
        let running = Arc::new(AtomicBool::new(true));

        let thread_running = Arc::clone(&running);
        let thread_source = Arc::clone(&source);
        let thread = thread::Builder::new()
            .name("twse-feed-recv".to_string())
            .spawn(move || receive_loop(thread_source, thread_running, config, consumer))
            .map_err(|_| SessionError::ThreadPanicked)?;

        self.handle = Some(Handle { running, source, thread });
        log::info!("session started");
        Ok(())
    }

    /// Idempotent: flips the running flag, shuts the socket down to unblock
    /// the receive thread, and joins it. A session with no active `start`
    /// is a no-op.
    pub fn stop(&mut self) -> Result<(), SessionError> {
        let handle = match self.handle.take() {
            Some(handle) => handle,
            None => return Ok(()),
        };
        handle.running.store(false, Ordering::Release);
        let _ = handle.source.shutdown();
        handle.thread.join().map_err(|_| SessionError::ThreadPanicked)?;
        log::info!("session stopped");
        Ok(())
    }

    pub fn is_running(&self) -> bool {
        self.handle.is_some()
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        let _ = self.stop();
    }
}

fn receive_loop<C: Consumer>(
    source: Arc<SocketSource>,
    running: Arc<AtomicBool>,
    config: Config,
    consumer: C,
) {
    let mut buf = [0u8; MAX_DATAGRAM_LEN];
    while running.load(Ordering::Acquire) {
        let datagram = match source.recv(&mut buf) {
            Ok(datagram) => datagram,
            Err(e) => {
                log::error!("fatal receive error: {}", e);
                break;
            }
        };
        if datagram.is_empty() {
            continue;
        }

        for frame in framer::frames(datagram) {
            match decoder::decode(frame, &config) {
                Ok(record) => consumer.on_record(&record),
                Err(reason) => log_rejected_frame(frame, reason),
            }
        }
    }
    running.store(false, Ordering::Release);
}

fn log_rejected_frame(frame: &[u8], reason: RejectReason) {
    if log::log_enabled!(log::Level::Debug) {
        log::debug!("dropped frame ({reason}): {}", hex(frame));
    } else {
        log::debug!("dropped frame: {reason}");
    }
}

fn hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}
