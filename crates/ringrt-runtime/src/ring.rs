//! `RingBridge` — owns the one `io_uring` instance per runtime.
//!
//! Grounded on the teacher's `ksvc-module::basic_iouring::BasicIoUring`:
//! same `IoUring::builder()` construction, same raw SQE push path, same
//! `cqe.user_data()`/`cqe.result()`/`cqe.flags()` completion reading. The
//! difference is shape, not technique — `BasicIoUring` translates a generic
//! `SubmitEntry` into an SQE by syscall number; `RingBridge` is hit with
//! already-built `squeue::Entry` values from `ops.rs` and only owns the
//! submit/wait/drain step.

use std::io;

use io_uring::{squeue, IoUring};
use ringrt_core::error::{RuntimeError, RuntimeResult};

use crate::options::RuntimeOptions;

/// Owns the submission/completion queues and applies the runtime's
/// `io_uring` setup flags.
pub struct RingBridge {
    ring: IoUring,
}

impl RingBridge {
    pub fn new(options: &RuntimeOptions) -> RuntimeResult<Self> {
        let mut builder = IoUring::builder();
        if options.enable_iopoll {
            builder.setup_iopoll();
        }
        if options.enable_sqpoll {
            builder.setup_sqpoll(1000);
        }
        // The runtime drives exactly one OS thread; tell the kernel so it
        // can skip locking on its side too.
        builder.setup_single_issuer();

        let ring = builder
            .build(options.sq_size)
            .map_err(RuntimeError::SetupFailed)?;

        Ok(RingBridge { ring })
    }

    pub fn register_files(&self, files: &[i32]) -> io::Result<()> {
        self.ring.submitter().register_files(files)
    }

    pub fn update_registered_files(&self, offset: u32, files: &[i32]) -> io::Result<()> {
        self.ring.submitter().register_files_update(offset, files)?;
        Ok(())
    }

    pub fn register_buffers(&self, iovecs: &[libc::iovec]) -> io::Result<()> {
        unsafe { self.ring.submitter().register_buffers(iovecs) }
    }

    /// Push a prepared SQE. On a full submission queue, submits once
    /// unconditionally and retries; a second `Busy` is a fatal invariant
    /// break per the contract in `acquire_sqe`.
    pub fn push_sqe(&mut self, entry: squeue::Entry) {
        let pushed = unsafe { self.ring.submission().push(&entry) };
        if pushed.is_ok() {
            tracing::trace!(?entry, "SQE acquired");
            return;
        }
        tracing::debug!("submission queue full, forcing submit before retrying push");
        self.ring.submit().expect("io_uring_enter (forced submit) failed");
        let pushed_again = unsafe { self.ring.submission().push(&entry) };
        if pushed_again.is_err() {
            panic!("submission queue full after mandatory submit: fatal invariant break");
        }
        tracing::trace!(?entry, "SQE acquired after forced submit");
    }

    /// Post all prepared SQEs and block until at least `min_complete` CQEs
    /// are available.
    pub fn submit_and_wait(&mut self, min_complete: usize) -> io::Result<usize> {
        self.ring.submit_and_wait(min_complete)
    }

    /// Invoke `callback(user_data, res, flags)` for every pending CQE, then
    /// advance the CQ head by the consumed count.
    pub fn drain_cqes(&mut self, mut callback: impl FnMut(u64, i32, u32)) -> usize {
        let mut queue = self.ring.completion();
        queue.sync();
        let mut count = 0;
        for cqe in &mut queue {
            callback(cqe.user_data(), cqe.result(), cqe.flags());
            count += 1;
        }
        count
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_options_build_a_ring() {
        let options = RuntimeOptions::new();
        let bridge = RingBridge::new(&options);
        // This exercises the real syscall path; on a kernel without
        // io_uring it would return an error rather than panic, which this
        // test intentionally tolerates.
        match bridge {
            Ok(_) => {}
            Err(RuntimeError::SetupFailed(_)) => {}
            Err(other) => panic!("unexpected error: {other}"),
        }
    }
}
