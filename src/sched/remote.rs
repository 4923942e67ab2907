//! Cross-thread work injection and the self-wake signal.
//!
//! The loop itself is single-threaded, but external producers such as signal
//! handlers and native threads need a way to schedule work without waiting
//! for the next keypress. They push `Send` callbacks into the [`Injector`],
//! and cloned task wakers record woken task ids there; the loop drains both
//! at every pass boundary. If the loop is blocked inside the terminal read
//! at that moment, the producer fires a process self-signal whose no-op
//! handler is installed without `SA_RESTART`, so the blocking `read(2)`
//! returns `EINTR` and the loop comes back around.
//!
//! The signal is fire-and-forget and carries no payload; it only perturbs
//! the blocking read, never touches shared data.

use crate::sched::EventLoop;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, Once};

use log::trace;

/// Signal used to interrupt a blocked terminal read.
pub(crate) const WAKE_SIGNAL: libc::c_int = libc::SIGUSR1;

// Loop-side state lives behind `Rc` and cannot cross threads, so injected
// callbacks receive the loop handle at invocation time instead of capturing
// it.
pub(crate) type RemoteCallback = Box<dyn FnOnce(&EventLoop) + Send + 'static>;

struct InjectedEntry {
    callback: RemoteCallback,
    cancelled: Arc<AtomicBool>,
}

/// Shared queue of callbacks and task wake-ups injected from outside the
/// loop's scheduling pass.
pub(crate) struct Injector {
    entries: Mutex<Vec<InjectedEntry>>,
    woken: Mutex<Vec<u64>>,
    waiting: AtomicBool,
    pid: libc::pid_t,
}

impl Injector {
    pub(crate) fn new() -> Self {
        Injector {
            entries: Mutex::new(Vec::new()),
            woken: Mutex::new(Vec::new()),
            waiting: AtomicBool::new(false),
            pid: unsafe { libc::getpid() },
        }
    }

    /// Marks whether the loop is currently blocked inside the terminal read.
    pub(crate) fn set_waiting(&self, waiting: bool) {
        self.waiting.store(waiting, Ordering::SeqCst);
    }

    /// Whether any injected work is waiting to be drained.
    ///
    /// The loop checks this after raising the waiting flag and before
    /// issuing the blocking read; combined with producers pushing before
    /// they test the flag, one side always observes the other.
    pub(crate) fn has_pending(&self) -> bool {
        let has_woken = !self
            .woken
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .is_empty();
        has_woken
            || !self
                .entries
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .is_empty()
    }

    /// Records that the task registered under `id` can make progress.
    pub(crate) fn wake_task(&self, id: u64) {
        self.woken.lock().unwrap_or_else(|e| e.into_inner()).push(id);
        self.nudge();
    }

    /// Removes and returns the ids of all tasks woken since the last drain.
    pub(crate) fn take_woken(&self) -> Vec<u64> {
        std::mem::take(&mut *self.woken.lock().unwrap_or_else(|e| e.into_inner()))
    }

    /// Removes and returns all pending, non-cancelled callbacks.
    pub(crate) fn drain(&self) -> Vec<RemoteCallback> {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries
            .drain(..)
            .filter(|entry| !entry.cancelled.load(Ordering::SeqCst))
            .map(|entry| entry.callback)
            .collect()
    }

    fn push(&self, callback: RemoteCallback) -> RemoteHandle {
        let cancelled = Arc::new(AtomicBool::new(false));
        {
            let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
            entries.push(InjectedEntry {
                callback,
                cancelled: cancelled.clone(),
            });
        }
        self.nudge();
        RemoteHandle { cancelled }
    }

    fn nudge(&self) {
        if self.waiting.load(Ordering::SeqCst) {
            trace!("waking blocked terminal read");
            unsafe {
                libc::kill(self.pid, WAKE_SIGNAL);
            }
        }
    }
}

/// Cloneable, `Send` handle for scheduling work onto the loop from other
/// threads.
///
/// Obtained from [`EventLoop::remote`](crate::EventLoop::remote). Callbacks
/// run as ordinary zero-suspension tasks on a subsequent scheduling pass.
#[derive(Clone)]
pub struct Remote {
    injector: Arc<Injector>,
}

impl Remote {
    pub(crate) fn new(injector: Arc<Injector>) -> Self {
        Remote { injector }
    }

    /// Schedules `callback` on the loop and wakes it if it is blocked in the
    /// terminal read.
    ///
    /// The callback runs on the loop's thread as an ordinary task and is
    /// handed the loop itself, so it can resolve promises, create tasks or
    /// stop the loop.
    pub fn call_soon<F>(&self, callback: F) -> RemoteHandle
    where
        F: FnOnce(&EventLoop) + Send + 'static,
    {
        self.injector.push(Box::new(callback))
    }
}

/// Cancellable handle for a remotely injected callback.
pub struct RemoteHandle {
    cancelled: Arc<AtomicBool>,
}

impl RemoteHandle {
    /// Cancels the callback if the loop has not picked it up yet.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    /// Whether the callback was cancelled.
    pub fn cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// Installs the no-op handler for [`WAKE_SIGNAL`] exactly once.
///
/// `sa_flags` deliberately omits `SA_RESTART`: the whole point is for the
/// blocking read to return `EINTR` instead of resuming transparently.
pub(crate) fn install_wake_handler() {
    static INSTALLED: Once = Once::new();
    INSTALLED.call_once(|| unsafe {
        let handler: extern "C" fn(libc::c_int) = noop_handler;
        let mut action: libc::sigaction = std::mem::zeroed();
        action.sa_sigaction = handler as usize;
        action.sa_flags = 0;
        libc::sigemptyset(&mut action.sa_mask);
        libc::sigaction(WAKE_SIGNAL, &action, std::ptr::null_mut());
    });
}

extern "C" fn noop_handler(_signal: libc::c_int) {}
