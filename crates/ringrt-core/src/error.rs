//! Error types shared by the runtime and its callers.
//!
//! Per the failure-semantics design: I/O operation results (negative errno)
//! are never wrapped in these types — they travel as plain `i32` through the
//! awaitable's `Output`. These types cover only the two kinds of error that
//! *do* need a `Result`: setup failures and channel closure.

use thiserror::Error;

/// Errors that can occur while constructing or configuring the runtime.
///
/// A runtime that fails to construct is not usable at all — there is no
/// partial/degraded state to recover into.
#[derive(Debug, Error)]
pub enum RuntimeError {
    /// `io_uring_setup` (or an option applied at setup time) failed.
    #[error("io_uring setup failed: {0}")]
    SetupFailed(#[source] std::io::Error),

    /// Registering fixed files or fixed buffers with the ring failed.
    #[error("failed to register {what}: {source}")]
    RegisterFailed {
        /// What was being registered (`"files"` or `"buffers"`).
        what: &'static str,
        #[source]
        source: std::io::Error,
    },

    /// `RuntimeOptions` failed validation before the ring was ever touched.
    #[error("invalid runtime options: {0}")]
    InvalidOptions(&'static str),
}

/// Result alias for setup-time fallible operations.
pub type RuntimeResult<T> = Result<T, RuntimeError>;

/// Error returned by `Channel::push` when the channel has been closed.
///
/// `pop` does not use this type — per the channel's data model, exhaustion
/// after close is represented as `None`, not an error, since a closed-but-
/// still-draining channel is not a failure.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[error("channel is closed")]
pub struct ChannelClosed;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn channel_closed_display() {
        assert_eq!(ChannelClosed.to_string(), "channel is closed");
    }

    #[test]
    fn runtime_error_display_includes_source() {
        let io_err = std::io::Error::from_raw_os_error(12); // ENOMEM
        let err = RuntimeError::SetupFailed(io_err);
        assert!(err.to_string().contains("io_uring setup failed"));
    }
}
