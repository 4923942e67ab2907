//! The cooperative scheduler loop and the terminal input bridge.
//!
//! [`EventLoop`] owns the ready queue, the single pending "next key" promise
//! and the terminal console. One scheduling pass drains externally injected
//! callbacks and wake-ups, steps every currently ready task exactly once,
//! and performs the one blocking operation, reading a single input unit from
//! the terminal, only when nothing was ready. That read is the loop's idle
//! mechanism; the scheduler never busy-polls.
//!
//! This discipline is correct because there is exactly one blocking
//! resource. Supporting additional blocking sources would require a real
//! I/O multiplexer, which is out of scope for this crate.

use crate::error::Error;
use crate::promise::{Promise, Wait};
use crate::sched::remote::{self, Injector, Remote, RemoteHandle};
use crate::task::{Handle, Runnable, Task};
use crate::term::{Cell as ScreenCell, Console};

use std::cell::{Cell, RefCell};
use std::collections::{HashMap, VecDeque};
use std::future::Future;
use std::rc::Rc;
use std::sync::Arc;

use log::{debug, trace, warn};

pub(crate) struct Shared {
    ready: RefCell<VecDeque<Rc<dyn Runnable>>>,
    // Live tasks by id, so wake-ups recorded in the injector can be mapped
    // back to their task on the loop's own thread.
    tasks: RefCell<HashMap<u64, Rc<dyn Runnable>>>,
    next_task: Cell<u64>,
    pending_input: RefCell<Option<Promise<i32>>>,
    // Keys read while no getch promise was pending, kept for later callers.
    stray_input: RefCell<VecDeque<i32>>,
    stopping: Cell<bool>,
    console: RefCell<Box<dyn Console>>,
    injector: Arc<Injector>,
}

impl Drop for Shared {
    fn drop(&mut self) {
        // The terminal must never stay in raw mode, however the loop exits.
        let _ = self.console.get_mut().close();
    }
}

/// Single-threaded cooperative scheduler driven by blocking terminal input.
///
/// `EventLoop` is a cheap clone-able handle; application coroutines capture
/// their own clone instead of reaching for ambient global state. All clones
/// share one ready queue, one console and one pending-input slot.
///
/// # Example
/// ```ignore
/// let event_loop = EventLoop::new();
/// let inner = event_loop.clone();
/// let result = event_loop.run(async move {
///     let key = inner.getch().await?;
///     Ok(key)
/// })?;
/// ```
#[derive(Clone)]
pub struct EventLoop {
    shared: Rc<Shared>,
}

impl EventLoop {
    /// Creates a loop driving the real terminal.
    ///
    /// The terminal is not touched until [`EventLoop::open`] (or
    /// [`EventLoop::run`]) is called.
    pub fn new() -> Self {
        crate::builder::LoopBuilder::new().build()
    }

    pub(crate) fn with_console(console: Box<dyn Console>) -> Self {
        remote::install_wake_handler();
        EventLoop {
            shared: Rc::new(Shared {
                ready: RefCell::new(VecDeque::new()),
                tasks: RefCell::new(HashMap::new()),
                next_task: Cell::new(0),
                pending_input: RefCell::new(None),
                stray_input: RefCell::new(VecDeque::new()),
                stopping: Cell::new(false),
                console: RefCell::new(console),
                injector: Arc::new(Injector::new()),
            }),
        }
    }

    /// Creates a fresh pending promise owned by this loop.
    pub fn promise<T: Clone + 'static>(&self) -> Promise<T> {
        Promise::new(self.clone())
    }

    /// Wraps `future` in a cooperative task and makes it eligible for the
    /// next ready-scan.
    pub fn create_task<T, F>(&self, future: F) -> Task<T>
    where
        T: Clone + 'static,
        F: Future<Output = Result<T, Error>> + 'static,
    {
        let task = Task::new(self.clone(), future);
        debug!("task created");
        task.core().schedule();
        task
    }

    /// Schedules `callback` to run on a later scheduling pass.
    ///
    /// The callback is wrapped in a zero-suspension task, so it is stepped
    /// like any other ready task and never invoked synchronously.
    ///
    /// # Returns
    /// A [`Handle`] that can cancel the callback before it runs.
    pub fn call_soon<F>(&self, callback: F) -> Handle
    where
        F: FnOnce() + 'static,
    {
        let task = self.create_task(async move {
            callback();
            Ok(())
        });
        Handle::new(task)
    }

    /// Like [`EventLoop::call_soon`], but safe to call while the loop might
    /// be blocked: the callback is routed through the cross-thread injector
    /// and a wake signal interrupts an in-progress terminal read.
    ///
    /// The callback receives the loop handle when it runs on the loop's
    /// thread, since loop-side state cannot be captured across threads.
    pub fn call_soon_threadsafe<F>(&self, callback: F) -> RemoteHandle
    where
        F: FnOnce(&EventLoop) + Send + 'static,
    {
        self.remote().call_soon(callback)
    }

    /// Returns a `Send + Clone` handle for scheduling work from other
    /// threads or signal handlers.
    pub fn remote(&self) -> Remote {
        Remote::new(self.shared.injector.clone())
    }

    /// Requests the loop to stop at the next pass boundary.
    ///
    /// Not preemptive: the pass currently in progress completes first.
    pub fn stop(&self) {
        debug!("stop requested");
        self.shared.stopping.set(true);
    }

    /// Runs scheduling passes until `target` is done or a stop is requested.
    ///
    /// # Returns
    /// - `Ok(Some(value))` with the target's value once it completes
    /// - `Ok(None)` if [`EventLoop::stop`] took effect first
    /// - `Err(_)` propagating the target's failure or cancellation — the one
    ///   place a task failure is allowed to escape the scheduler.
    pub fn run_until_complete<T: Clone + 'static>(
        &self,
        target: &Promise<T>,
    ) -> Result<Option<T>, Error> {
        let outcome = loop {
            if target.done() {
                break target.result().map(Some);
            }
            if self.shared.stopping.get() {
                break Ok(None);
            }
            self.drain_remote();
            let stepped = self.step_ready();
            if !stepped {
                self.block_for_input();
            }
        };
        self.shared.stopping.set(false);
        outcome
    }

    /// Runs until [`EventLoop::stop`] is called.
    pub fn run_forever(&self) -> Result<(), Error> {
        let never: Promise<()> = self.promise();
        self.run_until_complete(&never).map(|_| ())
    }

    /// Convenience entry point: opens the terminal, runs `future` to
    /// completion and releases the terminal on every exit path.
    pub fn run<T, F>(&self, future: F) -> Result<Option<T>, Error>
    where
        T: Clone + 'static,
        F: Future<Output = Result<T, Error>> + 'static,
    {
        self.open()?;
        let task = self.create_task(future);
        let outcome = self.run_until_complete(&task.promise());
        let closed = self.close();
        let value = outcome?;
        closed?;
        Ok(value)
    }

    /// Suspends until the next terminal input unit arrives.
    ///
    /// All coroutines calling this before the next key resolves share a
    /// single pending promise: the value is broadcast to every caller, and
    /// the underlying blocking read is issued at most once per resolved key.
    /// A key that was read while nobody was waiting is delivered first.
    pub fn getch(&self) -> Wait<i32> {
        let stray = self.shared.stray_input.borrow_mut().pop_front();
        if let Some(code) = stray {
            let promise = Promise::new(self.clone());
            let _ = promise.set_result(code);
            return promise.wait();
        }
        let mut slot = self.shared.pending_input.borrow_mut();
        let promise = slot
            .get_or_insert_with(|| Promise::new(self.clone()))
            .clone();
        drop(slot);
        promise.wait()
    }

    /// Suspends until a later scheduling pass.
    ///
    /// Useful for explicitly yielding control without waiting on input.
    pub fn tick(&self) -> Wait<()> {
        let promise: Promise<()> = self.promise();
        let resolver = promise.clone();
        let _ = self.call_soon(move || {
            let _ = resolver.set_result(());
        });
        promise.wait()
    }

    /// Enables the terminal's raw input mode. Idempotent.
    pub fn open(&self) -> Result<(), Error> {
        self.shared.console.borrow_mut().open()?;
        Ok(())
    }

    /// Restores the terminal. Safe to call repeatedly or when never opened.
    pub fn close(&self) -> Result<(), Error> {
        self.shared.console.borrow_mut().close()?;
        Ok(())
    }

    /// Whether the terminal has been released (or never acquired).
    pub fn is_closed(&self) -> bool {
        !self.shared.console.borrow().is_open()
    }

    /// Buffers screen cells for the next flush.
    pub fn render(&self, cells: &[ScreenCell]) {
        self.shared.console.borrow_mut().render(cells);
    }

    /// Pushes buffered cells to the physical display.
    pub fn flush(&self) -> Result<(), Error> {
        self.shared.console.borrow_mut().flush()?;
        Ok(())
    }

    /// Schedules an already boxed callback; used for deferred observer
    /// invocation.
    pub(crate) fn defer(&self, callback: Box<dyn FnOnce()>) {
        let _ = self.call_soon(move || callback());
    }

    pub(crate) fn enqueue(&self, runnable: Rc<dyn Runnable>) {
        self.shared.ready.borrow_mut().push_back(runnable);
    }

    pub(crate) fn injector(&self) -> Arc<Injector> {
        self.shared.injector.clone()
    }

    pub(crate) fn next_task_id(&self) -> u64 {
        let id = self.shared.next_task.get();
        self.shared.next_task.set(id + 1);
        id
    }

    /// Makes a task reachable by the wake-ups its wakers record.
    pub(crate) fn register_task(&self, id: u64, runnable: Rc<dyn Runnable>) {
        self.shared.tasks.borrow_mut().insert(id, runnable);
    }

    /// Drops a finished task from the wake-up registry; later wake-ups for
    /// its id are ignored.
    pub(crate) fn forget_task(&self, id: u64) {
        self.shared.tasks.borrow_mut().remove(&id);
    }

    // Moves externally injected callbacks and recorded wake-ups onto the
    // ready queue so they run within the pass that drained them.
    fn drain_remote(&self) {
        for callback in self.shared.injector.drain() {
            let event_loop = self.clone();
            let _ = self.call_soon(move || callback(&event_loop));
        }
        for id in self.shared.injector.take_woken() {
            let runnable = self.shared.tasks.borrow().get(&id).cloned();
            if let Some(runnable) = runnable {
                runnable.schedule();
            }
        }
    }

    // Steps every task that was ready at the start of this pass exactly
    // once. Tasks woken while stepping run on the next pass.
    fn step_ready(&self) -> bool {
        let batch: Vec<Rc<dyn Runnable>> = {
            let mut ready = self.shared.ready.borrow_mut();
            ready.drain(..).collect()
        };
        if batch.is_empty() {
            return false;
        }
        trace!("stepping {} ready task(s)", batch.len());
        for runnable in batch {
            runnable.run();
        }
        true
    }

    // The loop's only blocking point. Flushes pending output first so the
    // display is current while we wait, then reads one input unit and
    // resolves the shared pending-input promise with it. An interrupted
    // read (wake signal) resolves nothing and leaves the slot pending.
    fn block_for_input(&self) {
        {
            let mut console = self.shared.console.borrow_mut();
            if let Err(error) = console.flush() {
                warn!("flush before blocking read failed: {error}");
            }
        }

        self.shared.injector.set_waiting(true);
        // Work injected after the last drain but before the flag was raised
        // would otherwise leave us blocked with runnable tasks outstanding.
        if self.shared.injector.has_pending() {
            self.shared.injector.set_waiting(false);
            return;
        }
        let read = self.shared.console.borrow_mut().read_key();
        self.shared.injector.set_waiting(false);

        match read {
            Ok(Some(code)) => {
                trace!("input unit {code}");
                let pending = self.shared.pending_input.borrow_mut().take();
                match pending {
                    Some(promise) => {
                        let _ = promise.set_result(code);
                    }
                    None => {
                        // Nobody asked yet; keep the key for the next getch.
                        self.shared.stray_input.borrow_mut().push_back(code);
                    }
                }
            }
            Ok(None) => {
                trace!("blocking read interrupted");
            }
            Err(error) => {
                warn!("terminal read failed: {error}");
                let pending = self.shared.pending_input.borrow_mut().take();
                if let Some(promise) = pending {
                    let _ = promise.set_exception(Arc::new(error));
                }
            }
        }
    }
}

impl Default for EventLoop {
    fn default() -> Self {
        Self::new()
    }
}
