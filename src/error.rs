//! Error types shared across the scheduler.
//!
//! Failures are stored behind an `Arc` so a single failed promise can hand
//! the same underlying error to every observer, mirroring how completed
//! values are broadcast by clone.

use std::io;
use std::sync::Arc;

use thiserror::Error;

/// Shared, cloneable failure payload carried by failed promises.
pub type Failure = Arc<dyn std::error::Error + Send + Sync + 'static>;

/// Errors surfaced by promises, tasks and the event loop.
#[derive(Debug, Clone, Error)]
pub enum Error {
    /// The operation is not legal in the promise's current state, e.g.
    /// resolving an already resolved promise or reading a pending one.
    #[error("operation invalid for the current promise state")]
    InvalidState,

    /// The awaited promise or task was cancelled.
    #[error("cancelled")]
    Cancelled,

    /// The awaited promise or task failed; the original error is attached.
    #[error("failed: {0}")]
    Failed(Failure),

    /// Buffered input was replayed more than `limit` times without any real
    /// key arriving, indicating a key-mapping expansion loop.
    #[error("replay limit of {0} exceeded without real input")]
    ReplayLimit(usize),
}

impl Error {
    /// Wraps an arbitrary error into the failure variant.
    pub fn failed<E>(error: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Error::Failed(Arc::new(error))
    }
}

impl From<io::Error> for Error {
    fn from(error: io::Error) -> Self {
        Error::failed(error)
    }
}
