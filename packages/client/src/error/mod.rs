//! Engine error taxonomy
//!
//! Every failure the engine can report to a caller, as one closed enum.
//! Allocation and registry errors surface synchronously at the call site;
//! mid-stream buffer failures are recorded on the slot and surface through
//! the normal completion event instead.

use crate::pool::Handle;

/// A Result alias where the Err case is [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

/// Errors reported by the request engine.
#[derive(Debug, Clone, thiserror::Error)]
pub enum Error {
    /// Every slot in the fixed-capacity pool is occupied.
    #[error("request pool exhausted ({capacity} slots in flight)")]
    PoolExhausted { capacity: usize },

    /// A response buffer could not be reallocated mid-stream. The slot is
    /// force-completed; bytes buffered before the failure stay readable.
    #[error("response buffer reallocation failed at {capacity} bytes")]
    BufferAllocationFailure { capacity: usize },

    /// The persistent buffer table is at its hard id ceiling.
    #[error("persistent buffer table full ({limit} entries)")]
    RegistryFull { limit: usize },

    /// The handle is out of range, or its slot was freed and reused.
    #[error("invalid or stale request handle {0}")]
    InvalidHandle(Handle),

    /// The persistent buffer id does not name a registered buffer.
    #[error("persistent buffer id {0} is not registered")]
    UnknownPersistentBuffer(usize),

    /// The submission URL is empty or failed to parse.
    #[error("invalid request URL: {0}")]
    InvalidUrl(String),

    /// POST submissions require a non-empty body.
    #[error("request body must not be empty")]
    EmptyBody,

    /// The transport collaborator refused or aborted the exchange.
    #[error("transport error: {0}")]
    Transport(#[from] crate::transport::TransportError),
}

impl Error {
    /// Create a new `InvalidUrl` error.
    pub fn invalid_url(msg: impl Into<String>) -> Self {
        Self::InvalidUrl(msg.into())
    }
}
