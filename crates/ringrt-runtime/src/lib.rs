//! Single-threaded cooperative coroutine scheduler over Linux `io_uring`.
//!
//! See `ringrt-core` for the platform-agnostic pieces (errors, the
//! awaitable channel); this crate is the engine: the ring bridge, the
//! fixed-fd/fixed-buffer tables, the per-opcode I/O awaitables, and the
//! scheduler that ties them together.

mod errno;
mod ops;
pub mod options;
mod ring;
mod sched;
mod tables;
mod task;
mod tls;

pub use errno::Errno;
pub use ops::{
    AsyncAccept, AsyncAcceptDirect, AsyncClose, AsyncRead, AsyncRecv, AsyncSend, AsyncWrite,
    SlotPolicy,
};
pub use options::{EventInterval, RuntimeOptions};
pub use sched::{co_switch, current_runtime, Runtime, Yield};
pub use tables::{BufferSlot, FileRef};
pub use task::Task;
