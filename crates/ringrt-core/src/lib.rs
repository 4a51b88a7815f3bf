//! Platform-agnostic types shared by the runtime and its callers.
//!
//! This crate has no dependency on `io_uring` or any scheduler: it holds
//! only the pieces of the data model that make sense without a running
//! event loop behind them — errors and the channel. Everything that
//! touches the ring itself lives in `ringrt-runtime`.

pub mod channel;
pub mod error;

pub use channel::{channel, Channel, Pop, Push};
pub use error::{ChannelClosed, RuntimeError, RuntimeResult};
