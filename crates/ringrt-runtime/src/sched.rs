//! The runtime: ready queue, pending/task accounting, the driver loop, and
//! the coroutine primitives (`co_switch`, `current_runtime`) that sit on
//! top of it.
//!
//! The ready queue plays the same role as the teacher's ready-bitmap → run
//! queue handoff in `gvthread-runtime::scheduler`, simplified because there
//! is exactly one worker thread: no work-stealing, no per-worker shards,
//! just one FIFO.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::future::Future;
use std::os::unix::io::RawFd;
use std::pin::Pin;
use std::rc::Rc;
use std::task::{Context, Poll, Waker};

use async_task::Runnable;
use slab::Slab;

use ringrt_core::error::{RuntimeError, RuntimeResult};

use crate::options::{EventInterval, RuntimeOptions};
use crate::ring::RingBridge;
use crate::tables::{BufferSlot, BufferTable, FdTable, FileRef};
use crate::task::Task;
use crate::tls;

/// Per-outstanding-SQE bookkeeping: either still waiting for its CQE, or
/// holding the result for an awaitable that hasn't been polled again yet.
///
/// This is the generational-arena replacement for the raw-pointer
/// `user_data` the source uses — the slab index is what actually travels in
/// the CQE's `user_data` field.
pub(crate) enum CompletionSlot {
    Pending(Option<Waker>),
    Ready { res: i32, flags: u32 },
}

/// Shared runtime state. `Runtime` is a thin `Rc` handle over this; the
/// split exists so `tls` can hold its own strong reference for the
/// lifetime of `run()` without `Runtime` itself needing to be `Clone` in
/// application code.
pub(crate) struct RuntimeInner {
    ring: RefCell<RingBridge>,
    fd_table: RefCell<Option<FdTable>>,
    buffer_table: RefCell<Option<BufferTable>>,
    completions: RefCell<Slab<CompletionSlot>>,
    ready: RefCell<VecDeque<Runnable>>,
    pending: Cell<usize>,
    tasks: Cell<usize>,
    exit_allowed: Cell<bool>,
    event_interval: Cell<EventInterval>,
}

impl RuntimeInner {
    /// Register a new outstanding operation; returns the slab key to stamp
    /// into the SQE's `user_data`.
    pub(crate) fn register_completion(&self) -> usize {
        self.completions
            .borrow_mut()
            .insert(CompletionSlot::Pending(None))
    }

    /// Poll an outstanding operation's slot, registering `waker` if it is
    /// still pending.
    pub(crate) fn poll_completion(&self, key: usize, waker: &Waker) -> Poll<(i32, u32)> {
        let mut completions = self.completions.borrow_mut();
        match &mut completions[key] {
            CompletionSlot::Ready { res, flags } => {
                let (res, flags) = (*res, *flags);
                completions.remove(key);
                Poll::Ready((res, flags))
            }
            CompletionSlot::Pending(slot_waker) => {
                *slot_waker = Some(waker.clone());
                Poll::Pending
            }
        }
    }

    /// Submit a prepared SQE and account for the new pending operation.
    pub(crate) fn submit(&self, entry: io_uring::squeue::Entry) {
        self.ring.borrow_mut().push_sqe(entry);
        self.pending.set(self.pending.get() + 1);
    }

    fn dispatch_completion(&self, user_data: u64, res: i32, flags: u32) {
        let key = user_data as usize;
        let waker = {
            let mut completions = self.completions.borrow_mut();
            if !completions.contains(key) {
                // Fatal per spec.md §7.4: a CQE for unknown user_data means
                // memory corruption or a dropped-while-outstanding awaitable.
                panic!("CQE for unknown user_data={key}: fatal invariant break");
            }
            let slot = &mut completions[key];
            let waker = match slot {
                CompletionSlot::Pending(w) => w.take(),
                CompletionSlot::Ready { .. } => {
                    panic!("duplicate CQE for user_data={key}: fatal invariant break")
                }
            };
            *slot = CompletionSlot::Ready { res, flags };
            waker
        };
        self.pending.set(self.pending.get() - 1);
        tracing::trace!(key, res, flags, "CQE dispatched");
        if let Some(waker) = waker {
            waker.wake();
        }
    }

    fn schedule(&self, runnable: Runnable) {
        self.ready.borrow_mut().push_back(runnable);
    }
}

/// The coroutine scheduler and its owned `io_uring` ring.
///
/// `!Send + !Sync`: there is exactly one of these per driver thread, and it
/// must never be touched from another thread (spec.md §5).
pub struct Runtime {
    pub(crate) inner: Rc<RuntimeInner>,
}

impl Runtime {
    /// Construct a runtime from validated options.
    pub fn new(options: RuntimeOptions) -> RuntimeResult<Self> {
        options.validate()?;
        let ring = RingBridge::new(&options)?;
        let inner = Rc::new(RuntimeInner {
            ring: RefCell::new(ring),
            fd_table: RefCell::new(None),
            buffer_table: RefCell::new(None),
            completions: RefCell::new(Slab::new()),
            ready: RefCell::new(VecDeque::new()),
            pending: Cell::new(0),
            tasks: Cell::new(0),
            exit_allowed: Cell::new(false),
            event_interval: Cell::new(options.event_interval),
        });
        Ok(Runtime { inner })
    }

    /// Spawn a coroutine, returning a joinable/detachable [`Task`] handle.
    ///
    /// Increments the live-task count; the count is decremented when the
    /// future completes, not when the handle is joined or dropped (spec.md
    /// §4.6: `tasks` tracks *spawned*, not *joined*, work).
    pub fn spawn<F, T>(&self, future: F) -> Task<T>
    where
        F: Future<Output = T> + 'static,
        T: 'static,
    {
        self.inner.tasks.set(self.inner.tasks.get() + 1);
        tracing::debug!(live_tasks = self.inner.tasks.get(), "task spawned");

        let inner_for_schedule = Rc::clone(&self.inner);
        let inner_for_completion = Rc::clone(&self.inner);
        let wrapped = async move {
            let output = future.await;
            inner_for_completion
                .tasks
                .set(inner_for_completion.tasks.get() - 1);
            tracing::debug!(
                live_tasks = inner_for_completion.tasks.get(),
                "task completed"
            );
            output
        };

        let schedule = move |runnable: Runnable| {
            inner_for_schedule.schedule(runnable);
        };

        // SAFETY / contract: `spawn_local` is only sound if `runnable` is
        // never woken from another thread. `Runtime` is `!Send`, every
        // `Waker` this crate hands out is reached only through this
        // runtime's own `run()` loop, and `tls` asserts a single active
        // runtime per thread, so that contract holds.
        let (runnable, raw_task) = async_task::spawn_local(wrapped, schedule);
        runnable.schedule();

        Task::new(raw_task)
    }

    /// Permit the driver loop to treat "nothing left to do" as a terminal
    /// condition rather than a bug. Idempotent (spec.md §9 open question,
    /// resolved in `DESIGN.md`): calling it twice, or before any task is
    /// spawned, is harmless.
    pub fn allow_exit(&self) {
        self.inner.exit_allowed.set(true);
    }

    /// Register `n` sparse fixed-fd slots with the ring.
    pub fn init_fd_table(&self, n: usize) -> RuntimeResult<()> {
        let table = FdTable::init(&self.inner.ring.borrow(), n)?;
        *self.inner.fd_table.borrow_mut() = Some(table);
        Ok(())
    }

    /// Fill or replace fixed-fd slots starting at `offset`.
    pub fn update_fd_table(&self, offset: u32, fds: &[RawFd]) -> RuntimeResult<()> {
        let mut table = self.inner.fd_table.borrow_mut();
        let table = table
            .as_mut()
            .expect("update_fd_table called before init_fd_table");
        table.update(&self.inner.ring.borrow(), offset, fds)
    }

    /// A typed handle to a registered fixed-fd slot.
    pub fn fixed_fd(&self, index: u32) -> FileRef {
        let table = self.inner.fd_table.borrow();
        table
            .as_ref()
            .expect("fixed_fd called before init_fd_table")
            .fixed(index)
    }

    /// Register the given buffers as a fixed iovec table.
    pub fn init_buffer_table(&self, buffers: &[&mut [u8]]) -> RuntimeResult<()> {
        let table = BufferTable::init(&self.inner.ring.borrow(), buffers)?;
        *self.inner.buffer_table.borrow_mut() = Some(table);
        Ok(())
    }

    /// A typed handle to a registered fixed-buffer slot.
    pub fn fixed_buffer(&self, index: u32) -> BufferSlot {
        let table = self.inner.buffer_table.borrow();
        table
            .as_ref()
            .expect("fixed_buffer called before init_buffer_table")
            .fixed(index)
    }

    /// Drive the scheduler until the ready queue, pending set, and
    /// spawned-task count all quiesce and `allow_exit()` has been called.
    #[tracing::instrument(skip(self))]
    pub fn run(&self) {
        let _tls_guard = tls::enter(&self.inner);
        loop {
            let ready_empty = self.inner.ready.borrow().is_empty();
            let pending = self.inner.pending.get();

            if ready_empty && pending == 0 {
                let tasks = self.inner.tasks.get();
                if tasks == 0 && self.inner.exit_allowed.get() {
                    break;
                }
                // No coroutine is runnable and nothing is in flight, but
                // spawned work remains — per spec.md §4.5.c this should
                // not happen (every suspension adds to `ready` or
                // `pending`); block on a `min_complete=1` wait so a
                // spurious wake doesn't spin the CPU, and loop back to
                // re-check.
                self.submit_and_dispatch(1);
                continue;
            }

            if ready_empty {
                // pending > 0: nothing to run, something outstanding.
                self.submit_and_dispatch(1);
            } else {
                self.drain_ready_with_interleave();
            }
        }
    }

    fn submit_and_dispatch(&self, min_complete: usize) {
        let mut ring = self.inner.ring.borrow_mut();
        ring.submit_and_wait(min_complete)
            .expect("submit_and_wait failed");
        let inner = &self.inner;
        ring.drain_cqes(|user_data, res, flags| {
            inner.dispatch_completion(user_data, res, flags);
        });
    }

    fn drain_ready_with_interleave(&self) {
        // Snapshot the current length so newly-rescheduled runnables
        // (e.g. a `co_switch` re-enqueueing itself) don't extend this
        // drain indefinitely — they run on the *next* drain, preserving
        // strict ready-queue FIFO order across ticks.
        let batch = self.inner.ready.borrow().len();
        let interval = self.inner.event_interval.get();
        let mut since_check = 0u32;

        for _ in 0..batch {
            let runnable = match self.inner.ready.borrow_mut().pop_front() {
                Some(r) => r,
                None => break,
            };
            runnable.run();

            if let EventInterval::Every(n) = interval {
                since_check += 1;
                if since_check >= n {
                    self.submit_and_dispatch_nonblocking();
                    since_check = 0;
                }
            }
        }
    }

    fn submit_and_dispatch_nonblocking(&self) {
        let mut ring = self.inner.ring.borrow_mut();
        ring.submit_and_wait(0).expect("submit_and_wait failed");
        let inner = &self.inner;
        ring.drain_cqes(|user_data, res, flags| {
            inner.dispatch_completion(user_data, res, flags);
        });
    }
}

/// The thread-local "current runtime" pointer, for free-function
/// awaitables that don't carry a `&Runtime` of their own.
pub fn current_runtime() -> Runtime {
    Runtime {
        inner: tls::current(),
    }
}

/// Always suspends exactly once, re-enqueueing its own continuation at the
/// tail of the ready queue before returning control — the yield point used
/// for fairness between producer/consumer-style coroutines that never
/// touch I/O.
pub struct Yield {
    done: bool,
}

impl Future for Yield {
    type Output = ();

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
        let this = self.get_mut();
        if this.done {
            Poll::Ready(())
        } else {
            this.done = true;
            cx.waker().wake_by_ref();
            Poll::Pending
        }
    }
}

/// Yield to the next ready coroutine, if any. Guarantees at least one other
/// ready continuation runs before this one resumes, provided one exists
/// (spec.md §4.5 ordering guarantee).
pub fn co_switch() -> Yield {
    Yield { done: false }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::RuntimeOptions;

    fn try_new_runtime() -> Option<Runtime> {
        // Skipped on kernels without io_uring rather than failing the
        // whole suite; the scheduler logic itself is exercised against
        // the channel's pure-Rust poll loop in `ringrt-core`.
        Runtime::new(RuntimeOptions::new()).ok()
    }

    #[test]
    fn spawn_empty_task_quiesces() {
        let Some(rt) = try_new_runtime() else {
            return;
        };
        let task = rt.spawn(async { 1 + 1 });
        rt.allow_exit();
        rt.run();
        assert_eq!(rt.inner.tasks.get(), 0);
        drop(task);
    }

    #[test]
    fn co_switch_yields_to_other_ready_work() {
        let Some(rt) = try_new_runtime() else {
            return;
        };
        let order = Rc::new(RefCell::new(Vec::new()));

        let order_a = Rc::clone(&order);
        rt.spawn(async move {
            co_switch().await;
            order_a.borrow_mut().push('a');
        })
        .detach();

        let order_b = Rc::clone(&order);
        rt.spawn(async move {
            order_b.borrow_mut().push('b');
        })
        .detach();

        rt.allow_exit();
        rt.run();
        assert_eq!(*order.borrow(), vec!['b', 'a']);
    }
}
