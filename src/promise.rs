//! Single-assignment deferred results.
//!
//! A [`Promise`] starts pending and moves exactly once into one of three
//! terminal states: completed with a value, cancelled, or failed with an
//! error. Every later transition attempt reports
//! [`Error::InvalidState`](crate::Error::InvalidState) and leaves the stored
//! outcome untouched.
//!
//! Observers attach either as done-callbacks or by awaiting the [`Wait`]
//! future. Callbacks are never invoked synchronously from the resolving
//! call. They are handed to the event loop and run on a later scheduling
//! pass, so a resolver's own state is fully settled before any observer
//! sees the outcome.

use crate::error::{Error, Failure};
use crate::sched::{EventLoop, context};

use std::cell::{Cell, RefCell};
use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;
use std::task::{Context, Poll, Waker};

use log::trace;

type Callback<T> = Box<dyn FnOnce(&Promise<T>)>;

enum State<T: Clone + 'static> {
    Pending {
        callbacks: Vec<(CallbackId, Callback<T>)>,
        wakers: Vec<Waker>,
    },
    Cancelled,
    Failed(Failure),
    Completed(T),
}

impl<T: Clone + 'static> State<T> {
    fn is_pending(&self) -> bool {
        matches!(self, State::Pending { .. })
    }
}

/// Token identifying a registered done-callback, for later removal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallbackId(u64);

struct Inner<T: Clone + 'static> {
    state: RefCell<State<T>>,
    next_id: Cell<u64>,
    sched: EventLoop,
}

/// Shared single-assignment cell for a value that arrives later.
///
/// Clones share one underlying cell; resolving any clone resolves them all.
/// The value type must be `Clone` because a resolved promise broadcasts its
/// value to every observer.
///
/// # Example
/// ```ignore
/// let promise = event_loop.promise::<i32>();
/// promise.add_done_callback(|done| println!("{:?}", done.result()));
/// promise.set_result(42)?;
/// ```
pub struct Promise<T: Clone + 'static> {
    inner: Rc<Inner<T>>,
}

impl<T: Clone + 'static> Clone for Promise<T> {
    fn clone(&self) -> Self {
        Promise {
            inner: self.inner.clone(),
        }
    }
}

impl<T: Clone + 'static> Promise<T> {
    pub(crate) fn new(sched: EventLoop) -> Self {
        Promise {
            inner: Rc::new(Inner {
                state: RefCell::new(State::Pending {
                    callbacks: Vec::new(),
                    wakers: Vec::new(),
                }),
                next_id: Cell::new(0),
                sched,
            }),
        }
    }

    /// Whether the promise has reached a terminal state.
    pub fn done(&self) -> bool {
        !self.inner.state.borrow().is_pending()
    }

    /// Whether the promise ended up cancelled.
    pub fn cancelled(&self) -> bool {
        matches!(*self.inner.state.borrow(), State::Cancelled)
    }

    /// Completes the promise with `value`.
    ///
    /// # Returns
    /// `Err(Error::InvalidState)` when the promise is already resolved.
    pub fn set_result(&self, value: T) -> Result<(), Error> {
        self.finish(State::Completed(value))
    }

    /// Fails the promise with `failure`.
    ///
    /// # Returns
    /// `Err(Error::InvalidState)` when the promise is already resolved.
    pub fn set_exception(&self, failure: Failure) -> Result<(), Error> {
        self.finish(State::Failed(failure))
    }

    /// Cancels the promise.
    ///
    /// # Returns
    /// `true` if this call performed the cancellation, `false` when the
    /// promise was already resolved.
    pub fn cancel(&self) -> bool {
        self.finish(State::Cancelled).is_ok()
    }

    /// Reads the resolved outcome.
    ///
    /// # Returns
    /// - `Ok(value)` for a completed promise
    /// - `Err(Error::Cancelled)` for a cancelled one
    /// - `Err(Error::Failed(_))` replaying the stored failure
    /// - `Err(Error::InvalidState)` while still pending
    pub fn result(&self) -> Result<T, Error> {
        match &*self.inner.state.borrow() {
            State::Pending { .. } => Err(Error::InvalidState),
            State::Cancelled => Err(Error::Cancelled),
            State::Failed(failure) => Err(Error::Failed(failure.clone())),
            State::Completed(value) => Ok(value.clone()),
        }
    }

    /// Registers `callback` to run once the promise resolves.
    ///
    /// The callback is never invoked from this call, even when the promise
    /// is already done: it is scheduled onto the event loop and runs on a
    /// later scheduling pass, receiving the resolved promise.
    ///
    /// # Returns
    /// A [`CallbackId`] usable with [`Promise::remove_done_callback`].
    pub fn add_done_callback<F>(&self, callback: F) -> CallbackId
    where
        F: FnOnce(&Promise<T>) + 'static,
    {
        let id = CallbackId(self.inner.next_id.get());
        self.inner.next_id.set(id.0 + 1);

        let mut state = self.inner.state.borrow_mut();
        match &mut *state {
            State::Pending { callbacks, .. } => {
                callbacks.push((id, Box::new(callback)));
            }
            _ => {
                drop(state);
                let promise = self.clone();
                self.inner
                    .sched
                    .defer(Box::new(move || callback(&promise)));
            }
        }
        id
    }

    /// Unregisters a callback added with [`Promise::add_done_callback`].
    ///
    /// # Returns
    /// `true` if the callback was still registered and is now removed.
    pub fn remove_done_callback(&self, id: CallbackId) -> bool {
        let mut state = self.inner.state.borrow_mut();
        match &mut *state {
            State::Pending { callbacks, .. } => {
                let before = callbacks.len();
                callbacks.retain(|(registered, _)| *registered != id);
                callbacks.len() != before
            }
            _ => false,
        }
    }

    /// Returns a future suspending the caller until the promise resolves.
    pub fn wait(&self) -> Wait<T> {
        Wait {
            promise: self.clone(),
        }
    }

    // The single transition point. Swaps the pending state for `next`, then
    // wakes awaiting tasks and defers the registered callbacks with the
    // borrow already released.
    fn finish(&self, next: State<T>) -> Result<(), Error> {
        let (callbacks, wakers) = {
            let mut state = self.inner.state.borrow_mut();
            let State::Pending { callbacks, wakers } = &mut *state else {
                return Err(Error::InvalidState);
            };
            let callbacks = std::mem::take(callbacks);
            let wakers = std::mem::take(wakers);
            *state = next;
            (callbacks, wakers)
        };

        trace!(
            "promise resolved, waking {} waiter(s), deferring {} callback(s)",
            wakers.len(),
            callbacks.len()
        );
        for waker in wakers {
            waker.wake();
        }
        for (_, callback) in callbacks {
            let promise = self.clone();
            self.inner
                .sched
                .defer(Box::new(move || callback(&promise)));
        }
        Ok(())
    }
}

/// Leaf future suspending a task until its promise resolves.
///
/// The poll also surfaces an injected task cancellation: a task whose
/// cancellation was requested observes `Err(Error::Cancelled)` from its next
/// await instead of suspending, and may catch it to clean up.
pub struct Wait<T: Clone + 'static> {
    promise: Promise<T>,
}

impl<T: Clone + 'static> Future for Wait<T> {
    type Output = Result<T, Error>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        if context::cancelling() {
            return Poll::Ready(Err(Error::Cancelled));
        }
        let mut state = self.promise.inner.state.borrow_mut();
        match &mut *state {
            State::Pending { wakers, .. } => {
                wakers.push(cx.waker().clone());
                Poll::Pending
            }
            _ => {
                drop(state);
                Poll::Ready(self.promise.result())
            }
        }
    }
}
