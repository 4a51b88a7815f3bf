//! Bounded MPMC channel for coroutine communication.
//!
//! Unlike a thread-oriented channel, `push`/`pop` never block the OS
//! thread: when the fast path is unavailable the awaitable suspends by
//! registering a [`Waker`] and returns [`Poll::Pending`], the same way any
//! other awaitable in the runtime does. This type has no dependency on
//! `io_uring` or the scheduler — it only needs `Future`/`Waker`, so it lives
//! in `ringrt-core` rather than `ringrt-runtime`.
//!
//! `Channel<T>` is a single clonable handle used by both producers and
//! consumers (the data model does not split sender/receiver roles — any
//! handle can push and pop).

use std::cell::RefCell;
use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;
use std::task::{Context, Poll, Waker};

use crate::error::ChannelClosed;

struct SendWaiter<T> {
    value: Option<T>,
    result: Option<Result<(), ChannelClosed>>,
    waker: Option<Waker>,
}

struct RecvWaiter<T> {
    value: Option<T>,
    closed: bool,
    waker: Option<Waker>,
}

struct Inner<T> {
    buffer: VecDeque<T>,
    capacity: usize,
    send_waiters: VecDeque<Rc<RefCell<SendWaiter<T>>>>,
    recv_waiters: VecDeque<Rc<RefCell<RecvWaiter<T>>>>,
    closed: bool,
}

/// A bounded multi-producer/multi-consumer channel.
///
/// Cloning shares the same underlying buffer and waiter queues (it is a
/// handle, like `Rc`, not a deep copy).
pub struct Channel<T> {
    inner: Rc<RefCell<Inner<T>>>,
}

impl<T> Clone for Channel<T> {
    fn clone(&self) -> Self {
        Channel {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T> Channel<T> {
    /// Create a new channel with the given buffer capacity.
    ///
    /// Capacity 0 is legal and makes every `push` rendezvous directly with
    /// a waiting `pop` (no buffering at all).
    pub fn new(capacity: usize) -> Self {
        Channel {
            inner: Rc::new(RefCell::new(Inner {
                buffer: VecDeque::with_capacity(capacity.min(1024)),
                capacity,
                send_waiters: VecDeque::new(),
                recv_waiters: VecDeque::new(),
                closed: false,
            })),
        }
    }

    /// Push a value onto the channel, suspending if the buffer is full.
    pub fn push(&self, value: T) -> Push<T> {
        Push {
            channel: self.clone(),
            state: PushState::Init(Some(value)),
        }
    }

    /// Pop a value from the channel, suspending if it is empty.
    ///
    /// Resolves to `None` exactly when the channel is closed and drained.
    pub fn pop(&self) -> Pop<T> {
        Pop {
            channel: self.clone(),
            state: PopState::Init,
        }
    }

    /// Close the channel: wakes every waiting receiver with `None` and every
    /// waiting sender with [`ChannelClosed`]; subsequent pushes fail.
    ///
    /// Idempotent — a second call observes the same state as the first.
    pub fn close(&self) {
        let mut inner = self.inner.borrow_mut();
        if inner.closed {
            return;
        }
        inner.closed = true;
        for waiter in inner.recv_waiters.drain(..) {
            let mut w = waiter.borrow_mut();
            w.closed = true;
            if let Some(waker) = w.waker.take() {
                drop(w);
                waker.wake();
            }
        }
        for waiter in inner.send_waiters.drain(..) {
            let mut w = waiter.borrow_mut();
            w.result = Some(Err(ChannelClosed));
            if let Some(waker) = w.waker.take() {
                drop(w);
                waker.wake();
            }
        }
    }

    /// Alias for [`Channel::close`], matching the name used at call sites
    /// that close a channel from its producer side.
    pub fn push_close(&self) {
        self.close();
    }

    /// Whether the channel has been closed.
    pub fn is_closed(&self) -> bool {
        self.inner.borrow().closed
    }

    /// Number of values currently buffered.
    pub fn len(&self) -> usize {
        self.inner.borrow().buffer.len()
    }

    /// Whether the buffer currently holds no values.
    pub fn is_empty(&self) -> bool {
        self.inner.borrow().buffer.is_empty()
    }

    /// The channel's fixed capacity.
    pub fn capacity(&self) -> usize {
        self.inner.borrow().capacity
    }
}

enum PushState<T> {
    Init(Option<T>),
    Pending(Rc<RefCell<SendWaiter<T>>>),
    Done,
}

/// Future returned by [`Channel::push`].
pub struct Push<T> {
    channel: Channel<T>,
    state: PushState<T>,
}

impl<T> Future for Push<T> {
    type Output = Result<(), ChannelClosed>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        loop {
            match &this.state {
                PushState::Init(_) => {
                    let value = match &mut this.state {
                        PushState::Init(slot) => slot.take().expect("polled Init without value"),
                        _ => unreachable!(),
                    };
                    let mut inner = this.channel.inner.borrow_mut();
                    if inner.closed {
                        this.state = PushState::Done;
                        return Poll::Ready(Err(ChannelClosed));
                    }
                    if let Some(waiter) = inner.recv_waiters.pop_front() {
                        let mut w = waiter.borrow_mut();
                        w.value = Some(value);
                        let waker = w.waker.take();
                        drop(w);
                        drop(inner);
                        if let Some(waker) = waker {
                            waker.wake();
                        }
                        this.state = PushState::Done;
                        return Poll::Ready(Ok(()));
                    }
                    if inner.buffer.len() < inner.capacity {
                        inner.buffer.push_back(value);
                        this.state = PushState::Done;
                        return Poll::Ready(Ok(()));
                    }
                    let waiter = Rc::new(RefCell::new(SendWaiter {
                        value: Some(value),
                        result: None,
                        waker: Some(cx.waker().clone()),
                    }));
                    inner.send_waiters.push_back(Rc::clone(&waiter));
                    drop(inner);
                    this.state = PushState::Pending(waiter);
                    return Poll::Pending;
                }
                PushState::Pending(waiter) => {
                    let mut w = waiter.borrow_mut();
                    if let Some(result) = w.result.take() {
                        drop(w);
                        this.state = PushState::Done;
                        return Poll::Ready(result);
                    }
                    w.waker = Some(cx.waker().clone());
                    return Poll::Pending;
                }
                PushState::Done => panic!("Push polled after completion"),
            }
        }
    }
}

enum PopState<T> {
    Init,
    Pending(Rc<RefCell<RecvWaiter<T>>>),
    Done,
}

/// Future returned by [`Channel::pop`].
pub struct Pop<T> {
    channel: Channel<T>,
    state: PopState<T>,
}

impl<T> Future for Pop<T> {
    type Output = Option<T>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        match &this.state {
            PopState::Init => {
                let mut inner = this.channel.inner.borrow_mut();
                if let Some(value) = inner.buffer.pop_front() {
                    if let Some(sender) = inner.send_waiters.pop_front() {
                        let mut s = sender.borrow_mut();
                        let handed = s.value.take().expect("send waiter without value");
                        inner.buffer.push_back(handed);
                        s.result = Some(Ok(()));
                        let waker = s.waker.take();
                        drop(s);
                        drop(inner);
                        if let Some(waker) = waker {
                            waker.wake();
                        }
                    }
                    this.state = PopState::Done;
                    return Poll::Ready(Some(value));
                }
                if let Some(sender) = inner.send_waiters.pop_front() {
                    let mut s = sender.borrow_mut();
                    let handed = s.value.take().expect("send waiter without value");
                    s.result = Some(Ok(()));
                    let waker = s.waker.take();
                    drop(s);
                    drop(inner);
                    if let Some(waker) = waker {
                        waker.wake();
                    }
                    this.state = PopState::Done;
                    return Poll::Ready(Some(handed));
                }
                if inner.closed {
                    this.state = PopState::Done;
                    return Poll::Ready(None);
                }
                let waiter = Rc::new(RefCell::new(RecvWaiter {
                    value: None,
                    closed: false,
                    waker: Some(cx.waker().clone()),
                }));
                inner.recv_waiters.push_back(Rc::clone(&waiter));
                drop(inner);
                this.state = PopState::Pending(waiter);
                Poll::Pending
            }
            PopState::Pending(waiter) => {
                let mut w = waiter.borrow_mut();
                if let Some(value) = w.value.take() {
                    drop(w);
                    this.state = PopState::Done;
                    return Poll::Ready(Some(value));
                }
                if w.closed {
                    drop(w);
                    this.state = PopState::Done;
                    return Poll::Ready(None);
                }
                w.waker = Some(cx.waker().clone());
                Poll::Pending
            }
            PopState::Done => panic!("Pop polled after completion"),
        }
    }
}

/// Create a new channel with the given capacity.
///
/// Thin free function mirroring the constructor shape of `std::sync::mpsc`
/// and the teacher's own `channel()` constructor, for callers that prefer
/// `let ch = channel(1024);` over `Channel::new(1024)`.
pub fn channel<T>(capacity: usize) -> Channel<T> {
    Channel::new(capacity)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::task::Wake;

    struct NoopWake;
    impl Wake for NoopWake {
        fn wake(self: Arc<Self>) {}
    }

    fn noop_waker() -> Waker {
        Waker::from(Arc::new(NoopWake))
    }

    fn poll_once<F: Future + Unpin>(fut: &mut F) -> Poll<F::Output> {
        let waker = noop_waker();
        let mut cx = Context::from_waker(&waker);
        Pin::new(fut).poll(&mut cx)
    }

    #[test]
    fn push_then_pop_fast_path() {
        let ch = Channel::new(4);
        let mut push = ch.push(42);
        assert_eq!(poll_once(&mut push), Poll::Ready(Ok(())));
        let mut pop = ch.pop();
        assert_eq!(poll_once(&mut pop), Poll::Ready(Some(42)));
    }

    #[test]
    fn fifo_order_single_producer_single_consumer() {
        let ch = Channel::new(8);
        for i in 0..8 {
            let mut push = ch.push(i);
            assert_eq!(poll_once(&mut push), Poll::Ready(Ok(())));
        }
        for i in 0..8 {
            let mut pop = ch.pop();
            assert_eq!(poll_once(&mut pop), Poll::Ready(Some(i)));
        }
    }

    #[test]
    fn push_suspends_when_full_then_completes_on_pop() {
        let ch = Channel::new(1);
        let mut p1 = ch.push(1);
        assert_eq!(poll_once(&mut p1), Poll::Ready(Ok(())));

        let mut p2 = ch.push(2);
        assert_eq!(poll_once(&mut p2), Poll::Pending);

        let mut pop = ch.pop();
        assert_eq!(poll_once(&mut pop), Poll::Ready(Some(1)));

        // The waiting sender's value should now be in the buffer.
        assert_eq!(poll_once(&mut p2), Poll::Ready(Ok(())));
        let mut pop2 = ch.pop();
        assert_eq!(poll_once(&mut pop2), Poll::Ready(Some(2)));
    }

    #[test]
    fn pop_suspends_when_empty_then_completes_on_push() {
        let ch = Channel::new(4);
        let mut pop = ch.pop();
        assert_eq!(poll_once(&mut pop), Poll::Pending);

        let mut push = ch.push(7);
        assert_eq!(poll_once(&mut push), Poll::Ready(Ok(())));
        assert_eq!(poll_once(&mut pop), Poll::Ready(Some(7)));
    }

    #[test]
    fn rendezvous_at_zero_capacity() {
        let ch: Channel<i32> = Channel::new(0);
        let mut push = ch.push(9);
        assert_eq!(poll_once(&mut push), Poll::Pending);
        let mut pop = ch.pop();
        assert_eq!(poll_once(&mut pop), Poll::Ready(Some(9)));
        assert_eq!(poll_once(&mut push), Poll::Ready(Ok(())));
    }

    #[test]
    fn close_drains_then_returns_none() {
        let ch = Channel::new(4);
        let mut push = ch.push(1);
        assert_eq!(poll_once(&mut push), Poll::Ready(Ok(())));
        ch.push_close();

        let mut pop = ch.pop();
        assert_eq!(poll_once(&mut pop), Poll::Ready(Some(1)));
        let mut pop2 = ch.pop();
        assert_eq!(poll_once(&mut pop2), Poll::Ready(None));
    }

    #[test]
    fn push_after_close_fails() {
        let ch: Channel<i32> = Channel::new(4);
        ch.close();
        let mut push = ch.push(1);
        assert_eq!(poll_once(&mut push), Poll::Ready(Err(ChannelClosed)));
    }

    #[test]
    fn close_wakes_pending_receiver_with_none() {
        let ch: Channel<i32> = Channel::new(0);
        let mut pop = ch.pop();
        assert_eq!(poll_once(&mut pop), Poll::Pending);
        ch.close();
        assert_eq!(poll_once(&mut pop), Poll::Ready(None));
    }

    #[test]
    fn close_wakes_pending_sender_with_closed_error() {
        let ch: Channel<i32> = Channel::new(0);
        let mut push = ch.push(1);
        assert_eq!(poll_once(&mut push), Poll::Pending);
        ch.close();
        assert_eq!(poll_once(&mut push), Poll::Ready(Err(ChannelClosed)));
    }

    #[test]
    fn close_is_idempotent() {
        let ch: Channel<i32> = Channel::new(4);
        ch.close();
        assert!(ch.is_closed());
        ch.close();
        assert!(ch.is_closed());
    }

    #[test]
    fn clone_shares_state() {
        let ch = Channel::new(4);
        let ch2 = ch.clone();
        let mut push = ch.push(5);
        assert_eq!(poll_once(&mut push), Poll::Ready(Ok(())));
        let mut pop = ch2.pop();
        assert_eq!(poll_once(&mut pop), Poll::Ready(Some(5)));
    }
}
