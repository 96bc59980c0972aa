//! X11 Async Event Stream
//!
//! Readiness of the display socket for the single-threaded event loop.
//! The connection keeps its own read buffer, so readiness is only a hint:
//! callers always drain with `poll_event` until it returns `None` before
//! waiting again.

use std::os::unix::io::RawFd;

use anyhow::{Context, Result};
use tokio::io::unix::AsyncFd;
use tokio::io::Interest;

/// Display socket registered with the current-thread reactor
pub struct X11EventStream {
    fd: AsyncFd<RawFd>,
}

impl X11EventStream {
    /// Register the display socket for read readiness
    pub fn new(fd: RawFd) -> Result<Self> {
        let fd = AsyncFd::with_interest(fd, Interest::READABLE)
            .context("Failed to register X11 socket with the reactor")?;
        Ok(Self { fd })
    }

    /// Wait until the socket becomes readable.
    ///
    /// Readiness is cleared immediately; the caller drains the connection
    /// afterwards and everything already buffered is seen on the next drain.
    pub async fn wait_readable(&self) -> Result<()> {
        let mut guard = self
            .fd
            .readable()
            .await
            .context("X11 socket readiness failed")?;
        guard.clear_ready();
        Ok(())
    }
}
