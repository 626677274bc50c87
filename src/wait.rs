use std::io;
use std::time::{Duration, Instant};

use log::trace;

use crate::error::{Error, Result};
use crate::handle::Handle;

/// Outcome of waiting for a frame
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Readiness {
    /// The device has data to be dequeued
    Ready,
    /// The timeout elapsed; waiting again is fine
    TimedOut,
}

/// Blocks until `handle` is readable or `timeout` elapses
///
/// Interruptions by signals are never reported. The wait resumes with whatever is left of
/// `timeout`.
pub(crate) fn wait_readable<H: Handle + ?Sized>(handle: &H, timeout: Duration) -> Result<Readiness> {
    let deadline = Instant::now().checked_add(timeout);
    let mut remaining = timeout;
    loop {
        match handle.wait_readable(remaining) {
            Ok(0) => return Ok(Readiness::TimedOut),
            Ok(_) => return Ok(Readiness::Ready),
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {
                if let Some(deadline) = deadline {
                    remaining = deadline.saturating_duration_since(Instant::now());
                }
                trace!("wait interrupted, retrying with {:?} left", remaining);
            }
            Err(e) => return Err(Error::Io(e)),
        }
    }
}
