//! Minimal cooperative scheduler layered over blocking terminal input.
//!
//! This crate reimplements the core primitives of an async runtime for one
//! specific integration problem: a blocking single-key terminal read that
//! cannot participate in standard asynchronous I/O. Many cooperative
//! consumers share that one blocking source, and the loop blocks only when
//! no task can make progress.
//!
//! # Architecture
//!
//! - **Promise**: single-assignment deferred result with observer
//!   callbacks. The base unit of suspension.
//! - **Task**: wraps an `async` computation and is stepped once per
//!   scheduling pass. Completion, failure and cancellation propagate into
//!   its own promise.
//! - **EventLoop**: owns the ready queue and the shared pending-input slot.
//!   It steps every ready task and blocks in the terminal read only when
//!   nothing was ready.
//! - **Console**: the terminal facility boundary (raw mode, blocking key
//!   read, buffered rendering).
//! - **Typeahead**: buffered key input with a replay-limit guard for
//!   key-mapping expansions.
//!
//! Scheduling is strictly single-threaded. The only cross-thread influences
//! are [`Remote`], which injects callbacks, and cloned task wakers. Both
//! interrupt a blocked read via a process self-signal.

mod builder;
mod error;
mod promise;
mod sched;
mod task;
pub mod term;
mod typeahead;

pub use builder::LoopBuilder;
pub use error::{Error, Failure};
pub use promise::{CallbackId, Promise, Wait};
pub use sched::{EventLoop, Remote, RemoteHandle};
pub use task::{Handle, Task};
pub use typeahead::{DEFAULT_REPLAY_LIMIT, Entry, Typeahead};
