//! Bridge from the synchronous store traits onto the tokio runtime.

use std::fmt;
use std::future::Future;

use tokio::runtime::{Handle, RuntimeFlavor};

/// Why a blocking bridge call could not run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum BridgeError {
    /// No tokio runtime is entered on this thread.
    NoRuntime,
    /// The ambient runtime is single-threaded; blocking its only
    /// worker on a database call would stall the whole runtime.
    CurrentThreadRuntime,
}

impl fmt::Display for BridgeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BridgeError::NoRuntime => write!(f, "no tokio runtime on this thread"),
            BridgeError::CurrentThreadRuntime => {
                write!(f, "persistent stores require the multi-thread tokio runtime")
            }
        }
    }
}

/// Drives `fut` to completion from synchronous code.
///
/// Callers sit on runtime worker threads (HTTP handlers) or on
/// `spawn_blocking` threads (projection subscribers). A bare
/// `Handle::block_on` panics on a worker thread, so the call goes
/// through `block_in_place`, which needs the multi-thread flavor.
pub(crate) fn block_on<F: Future>(fut: F) -> Result<F::Output, BridgeError> {
    let handle = Handle::try_current().map_err(|_| BridgeError::NoRuntime)?;
    if matches!(handle.runtime_flavor(), RuntimeFlavor::CurrentThread) {
        return Err(BridgeError::CurrentThreadRuntime);
    }
    Ok(tokio::task::block_in_place(|| handle.block_on(fut)))
}
