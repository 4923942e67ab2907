//! Fluent builder for EventLoop construction.

use crate::sched::EventLoop;
use crate::term::{Console, TtyConsole};

/// Builder for constructing [`EventLoop`] instances.
///
/// The only configurable piece today is the console implementation, which
/// tests replace with scripted input.
///
/// # Example
/// ```ignore
/// let event_loop = LoopBuilder::new().build();
/// ```
pub struct LoopBuilder {
    console: Option<Box<dyn Console>>,
}

impl LoopBuilder {
    pub fn new() -> Self {
        LoopBuilder { console: None }
    }

    /// Uses `console` instead of the process's controlling terminal.
    pub fn console(mut self, console: Box<dyn Console>) -> Self {
        self.console = Some(console);
        self
    }

    /// Builds the event loop.
    ///
    /// Falls back to a [`TtyConsole`] when no console was supplied. The
    /// terminal itself is only acquired later, by `EventLoop::open`.
    pub fn build(self) -> EventLoop {
        let console = self
            .console
            .unwrap_or_else(|| Box::new(TtyConsole::new()));
        EventLoop::with_console(console)
    }
}

impl Default for LoopBuilder {
    fn default() -> Self {
        Self::new()
    }
}
