//! # ringrt — a single-threaded coroutine runtime over `io_uring`
//!
//! One OS thread drives one [`Runtime`], which drives one `io_uring`
//! instance. Coroutines are ordinary `async fn`/`async {}` blocks; every
//! suspension point is either an I/O awaitable (`AsyncRead`, `AsyncWrite`,
//! ...), a [`Channel`] `push`/`pop`, or [`co_switch`]. There is no
//! work-stealing, no preemption, and no cross-thread scheduling — see the
//! crate's design notes for why that's a feature here, not a limitation.
//!
//! ## Quick start
//!
//! ```ignore
//! use ringrt::{Runtime, RuntimeOptions, co_switch};
//!
//! let rt = Runtime::new(RuntimeOptions::new()).expect("failed to build runtime");
//! let task = rt.spawn(async {
//!     co_switch().await;
//!     42
//! });
//! rt.allow_exit();
//! rt.run();
//! ```
//!
//! This crate re-exports [`ringrt-core`] (errors, the channel) and
//! [`ringrt-runtime`] (the ring-backed engine) under one name, the way the
//! teacher's own facade crate re-exports its `-core`/`-runtime` split.

pub use ringrt_core::{channel, Channel, ChannelClosed, Pop, Push, RuntimeError, RuntimeResult};

pub use ringrt_runtime::{
    co_switch, current_runtime, options, AsyncAccept, AsyncAcceptDirect, AsyncClose, AsyncRead,
    AsyncRecv, AsyncSend, AsyncWrite, BufferSlot, Errno, EventInterval, FileRef, Runtime,
    RuntimeOptions, SlotPolicy, Task, Yield,
};
