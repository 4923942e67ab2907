//! Thread-local cancellation context for the task currently being stepped.
//!
//! The leaf [`Wait`](crate::Wait) future has no reference to the task polling
//! it, yet an injected cancellation must surface at exactly that await point.
//! The loop therefore publishes the current task's cancelling flag in
//! thread-local storage for the duration of each step; the previous value is
//! restored when the step's guard drops.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

thread_local! {
    static CURRENT_CANCEL: RefCell<Option<Rc<Cell<bool>>>> = const { RefCell::new(None) };
}

/// Restores the previous cancellation flag when dropped.
pub(crate) struct StepGuard {
    previous: Option<Rc<Cell<bool>>>,
}

impl Drop for StepGuard {
    fn drop(&mut self) {
        CURRENT_CANCEL.with(|current| {
            *current.borrow_mut() = self.previous.take();
        });
    }
}

/// Enters a task step, publishing its cancelling flag.
pub(crate) fn enter(flag: Rc<Cell<bool>>) -> StepGuard {
    let previous = CURRENT_CANCEL.with(|current| current.borrow_mut().replace(flag));
    StepGuard { previous }
}

/// Whether the task currently being stepped has a pending cancellation.
///
/// Returns `false` outside of a task step.
pub(crate) fn cancelling() -> bool {
    CURRENT_CANCEL.with(|current| {
        current
            .borrow()
            .as_ref()
            .map(|flag| flag.get())
            .unwrap_or(false)
    })
}
