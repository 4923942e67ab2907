//! Waker implementation that re-queues tasks on wake-up.
//!
//! Implements the standard Rust task waking protocol over the loop's
//! injector using `RawWaker` and `RawWakerVTable`. Waking never steps a
//! task; it records the task's id with the [`Injector`], and the loop maps
//! the id back to the task at its next pass boundary.
//!
//! A `Waker` is `Send + Sync` by contract: a computation may clone the
//! waker from its context and hand it to another thread. The wake target
//! therefore lives behind an `Arc` and carries no loop-side state, only the
//! task id and the thread-safe injector. A wake arriving while the loop is
//! blocked in the terminal read fires the wake signal like any other
//! injection.

use crate::sched::remote::Injector;

use std::sync::Arc;
use std::task::{RawWaker, RawWakerVTable, Waker};

/// Wake target identifying one task to the loop's injector.
pub(crate) struct TaskWaker {
    id: u64,
    injector: Arc<Injector>,
}

impl TaskWaker {
    fn wake(&self) {
        self.injector.wake_task(self.id);
    }

    fn clone_raw(ptr: *const ()) -> RawWaker {
        unsafe {
            Arc::increment_strong_count(ptr as *const TaskWaker);
        }
        RawWaker::new(ptr, &Self::VTABLE)
    }

    fn wake_raw(ptr: *const ()) {
        let waker = unsafe { Arc::from_raw(ptr as *const TaskWaker) };
        waker.wake();
    }

    fn wake_by_ref_raw(ptr: *const ()) {
        let waker = unsafe { &*(ptr as *const TaskWaker) };
        waker.wake();
    }

    fn drop_raw(ptr: *const ()) {
        unsafe {
            drop(Arc::from_raw(ptr as *const TaskWaker));
        }
    }

    const VTABLE: RawWakerVTable = RawWakerVTable::new(
        Self::clone_raw,
        Self::wake_raw,
        Self::wake_by_ref_raw,
        Self::drop_raw,
    );
}

/// Creates a `Waker` that re-queues the task registered under `id`.
pub(crate) fn make_waker(id: u64, injector: Arc<Injector>) -> Waker {
    let waker = Arc::new(TaskWaker { id, injector });
    let raw = RawWaker::new(Arc::into_raw(waker) as *const (), &TaskWaker::VTABLE);
    unsafe { Waker::from_raw(raw) }
}
