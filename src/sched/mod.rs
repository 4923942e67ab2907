//! Scheduler subsystem modules.

pub(crate) mod context;
mod core;
pub(crate) mod remote;
pub(crate) mod waker;

pub use core::EventLoop;
pub use remote::{Remote, RemoteHandle};
pub(crate) use waker::make_waker;
