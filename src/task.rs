//! Cooperative task wrapper driving a suspendable computation.
//!
//! A task wraps a boxed future and a [`Promise`] for its eventual outcome.
//! The event loop steps a task by polling its future exactly once per
//! scheduling pass; the custom waker installed for the poll re-queues the
//! task when the promise it awaits resolves.
//!
//! # Completion
//!
//! A poll returning `Ready` drives the task's own promise into the matching
//! terminal state:
//!
//! - `Ok(value)` completes the promise
//! - `Err(Error::Cancelled)` cancels it (the injected cancellation signal
//!   propagated out of the computation)
//! - any other error fails it
//!
//! Failures never escape a step and never crash the loop; they only become
//! visible when something reads or awaits the task's promise.
//!
//! # Cancellation
//!
//! [`Task::cancel`] is advisory: it marks the task as cancelling and
//! re-queues it. The computation observes the cancellation as an
//! `Err(Error::Cancelled)` from its next await, and may catch it to run
//! cleanup or even complete normally instead of unwinding.

use crate::error::Error;
use crate::promise::{Promise, Wait};
use crate::sched::{EventLoop, context, make_waker};

use std::cell::{Cell, RefCell};
use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;
use std::sync::Arc;
use std::task::{Context, Poll};

use log::debug;

/// Trait for type-erased task cells stored in the ready queue.
pub(crate) trait Runnable {
    /// Steps the task once.
    fn run(self: Rc<Self>);

    /// Re-queues the task for the next scheduling pass, at most once.
    fn schedule(self: Rc<Self>);
}

type BoxedComputation<T> = Pin<Box<dyn Future<Output = Result<T, Error>> + 'static>>;

pub(crate) struct TaskCore<T: Clone + 'static> {
    id: u64,
    future: RefCell<Option<BoxedComputation<T>>>,
    promise: Promise<T>,
    cancelling: Rc<Cell<bool>>,
    started: Cell<bool>,
    queued: Cell<bool>,
    sched: EventLoop,
}

impl<T: Clone + 'static> TaskCore<T> {
    fn cancel(self: &Rc<Self>) -> bool {
        if self.promise.done() {
            return false;
        }
        // Flag first, then nudge. The guard keeps repeated cancels (or a task
        // cancelling itself mid-step) from queueing endlessly.
        if !self.cancelling.get() {
            self.cancelling.set(true);
            debug!("task cancellation requested");
            self.clone().schedule();
        }
        true
    }
}

impl<T: Clone + 'static> Runnable for TaskCore<T> {
    fn run(self: Rc<Self>) {
        self.queued.set(false);
        if self.promise.done() {
            self.sched.forget_task(self.id);
            return;
        }

        // Cancelled before its first step: the computation never executes.
        if self.cancelling.get() && !self.started.get() {
            self.future.borrow_mut().take();
            self.promise.cancel();
            self.sched.forget_task(self.id);
            return;
        }
        self.started.set(true);

        let waker = make_waker(self.id, self.sched.injector());
        let mut cx = Context::from_waker(&waker);
        let _step = context::enter(self.cancelling.clone());

        let mut slot = self.future.borrow_mut();
        let Some(future) = slot.as_mut() else {
            return;
        };
        match future.as_mut().poll(&mut cx) {
            Poll::Pending => {}
            Poll::Ready(outcome) => {
                slot.take();
                drop(slot);
                // The promise is owned by this task and still pending here,
                // so these transitions cannot report InvalidState unless the
                // computation resolved its own promise by hand; in that case
                // the manual resolution wins.
                match outcome {
                    Ok(value) => {
                        let _ = self.promise.set_result(value);
                    }
                    Err(Error::Cancelled) => {
                        self.promise.cancel();
                    }
                    Err(Error::Failed(failure)) => {
                        let _ = self.promise.set_exception(failure);
                    }
                    Err(other) => {
                        let _ = self.promise.set_exception(Arc::new(other));
                    }
                }
                self.sched.forget_task(self.id);
            }
        }
    }

    fn schedule(self: Rc<Self>) {
        if self.queued.replace(true) {
            return;
        }
        let sched = self.sched.clone();
        sched.enqueue(self);
    }
}

/// Handle to a cooperative unit of work created by
/// [`EventLoop::create_task`](crate::EventLoop::create_task).
///
/// The handle exposes the task's own promise, so callers can await or read
/// the eventual outcome even after the scheduler has dropped the task from
/// its live set. Cloning the handle does not duplicate the task.
pub struct Task<T: Clone + 'static> {
    core: Rc<TaskCore<T>>,
}

impl<T: Clone + 'static> Clone for Task<T> {
    fn clone(&self) -> Self {
        Task {
            core: self.core.clone(),
        }
    }
}

impl<T: Clone + 'static> Task<T> {
    pub(crate) fn new<F>(sched: EventLoop, future: F) -> Self
    where
        F: Future<Output = Result<T, Error>> + 'static,
    {
        let promise = Promise::new(sched.clone());
        let id = sched.next_task_id();
        let core = Rc::new(TaskCore {
            id,
            future: RefCell::new(Some(Box::pin(future))),
            promise,
            cancelling: Rc::new(Cell::new(false)),
            started: Cell::new(false),
            queued: Cell::new(false),
            sched,
        });
        core.sched.register_task(id, core.clone());
        Task { core }
    }

    pub(crate) fn core(&self) -> Rc<TaskCore<T>> {
        self.core.clone()
    }

    /// Requests cancellation of the task.
    ///
    /// Returns `false` when the task is already done. Otherwise the task is
    /// marked cancelling and re-queued; it observes the cancellation at its
    /// next step and eventually reaches a terminal state. Idempotent.
    pub fn cancel(&self) -> bool {
        self.core.cancel()
    }

    /// The task's own promise for its eventual outcome.
    pub fn promise(&self) -> Promise<T> {
        self.core.promise.clone()
    }

    /// Suspends until the task reaches a terminal state.
    pub fn wait(&self) -> Wait<T> {
        self.core.promise.wait()
    }

    /// Whether the task has completed, failed or been cancelled.
    pub fn done(&self) -> bool {
        self.core.promise.done()
    }

    /// Whether the task ended up cancelled.
    pub fn cancelled(&self) -> bool {
        self.core.promise.cancelled()
    }

    /// Reads the task's result; see [`Promise::result`].
    pub fn result(&self) -> Result<T, Error> {
        self.core.promise.result()
    }
}

/// Cancellable handle returned by
/// [`EventLoop::call_soon`](crate::EventLoop::call_soon).
pub struct Handle {
    task: Task<()>,
}

impl Handle {
    pub(crate) fn new(task: Task<()>) -> Self {
        Handle { task }
    }

    /// Cancels the scheduled callback if it has not run yet.
    pub fn cancel(&self) {
        self.task.cancel();
    }

    /// Whether the callback was cancelled before running.
    pub fn cancelled(&self) -> bool {
        self.task.cancelled()
    }
}
