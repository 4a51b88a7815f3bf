//! Thread-local "current runtime" pointer.
//!
//! Grounded on the teacher's `gvthread-runtime` thread-local-current-worker
//! pattern: free-function awaitables (`co_switch`, `current_runtime`, every
//! I/O awaitable in `ops.rs`) need to find the driver without threading a
//! `&Runtime` through every `.await` point. Set for the duration of
//! `Runtime::run`; no lock needed because the runtime is single-threaded.

use std::cell::RefCell;
use std::rc::Rc;

use crate::sched::RuntimeInner;

thread_local! {
    static CURRENT: RefCell<Option<Rc<RuntimeInner>>> = const { RefCell::new(None) };
}

/// RAII guard clearing the thread-local on scope exit (including unwind).
pub(crate) struct Guard;

impl Drop for Guard {
    fn drop(&mut self) {
        CURRENT.with(|cell| *cell.borrow_mut() = None);
    }
}

/// Install `inner` as the current runtime for this thread. Panics if a
/// runtime is already driving this thread — driving two runtimes on one
/// thread is a misuse case (spec.md §7.4), not a recoverable error.
pub(crate) fn enter(inner: &Rc<RuntimeInner>) -> Guard {
    CURRENT.with(|cell| {
        let mut slot = cell.borrow_mut();
        assert!(
            slot.is_none(),
            "a runtime is already driving this thread; nested run() is not supported"
        );
        *slot = Some(Rc::clone(inner));
    });
    Guard
}

/// The current runtime, or panics if none is set.
pub(crate) fn current() -> Rc<RuntimeInner> {
    CURRENT
        .with(|cell| cell.borrow().clone())
        .expect("no runtime is currently driving this thread")
}
