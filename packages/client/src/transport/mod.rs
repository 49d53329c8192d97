//! Transport collaborator contract
//!
//! The engine delegates all wire-level work (DNS, TCP, TLS, HTTP framing) to
//! an external transport. The transport's obligations are small: start an
//! exchange, answer non-blocking status queries, and stream body bytes into
//! the [`BodySink`] it was handed. Nothing here may block the polling
//! thread.

use std::sync::Arc;

use bytes::Bytes;
use http::{HeaderMap, Method};
use url::Url;

use crate::buffer::WriteOutcome;
use crate::error::Error;
use crate::pool::Handle;
use crate::pool::slot::SlotShared;

/// Errors a transport may report when starting or running an exchange.
#[derive(Debug, Clone, thiserror::Error)]
pub enum TransportError {
    /// The transport refused to start the exchange.
    #[error("transport rejected the request: {0}")]
    Rejected(String),
    /// The exchange died after starting.
    #[error("transport exchange failed: {0}")]
    Failed(String),
}

impl TransportError {
    /// Create a new `Rejected` error.
    pub fn rejected(msg: impl Into<String>) -> Self {
        Self::Rejected(msg.into())
    }

    /// Create a new `Failed` error.
    pub fn failed(msg: impl Into<String>) -> Self {
        Self::Failed(msg.into())
    }
}

/// Everything the transport needs to start an exchange.
#[derive(Debug, Clone)]
pub struct ExchangeParts {
    pub method: Method,
    pub url: Url,
    pub headers: HeaderMap,
    pub body: Option<Bytes>,
}

/// One in-flight exchange owned by a request slot.
///
/// All queries must return promptly; the poller calls them on every tick.
pub trait Exchange: Send {
    /// Last known status code, once the transport has one.
    fn status(&self) -> Option<u16>;

    /// Look up a response header by (case-insensitive) name.
    fn header(&self, name: &str) -> Option<String>;

    /// Walk the response headers; the visitor returns `false` to stop.
    fn visit_headers(&self, visitor: &mut dyn FnMut(&str, &str) -> bool);

    /// Whether the response body has been fully delivered.
    fn is_complete(&self) -> bool;

    /// Tear the exchange down. Called on completion, cancellation, and
    /// shutdown; must be idempotent.
    fn close(&mut self);
}

/// The asynchronous HTTP engine the pool delegates to.
pub trait Transport: Send + Sync {
    /// Begin an exchange, delivering response body bytes into `sink` as they
    /// arrive (from any thread).
    fn exchange(
        &self,
        parts: ExchangeParts,
        sink: BodySink,
    ) -> Result<Box<dyn Exchange>, TransportError>;
}

/// Streaming-write handle bound to one request slot.
///
/// The transport calls [`BodySink::write`] as body data arrives. The return
/// value is the number of bytes accepted; a short count tells the transport
/// to stop delivering body data for this request (the buffer is full under a
/// fixed policy, or growth failed, or the request was cancelled).
pub struct BodySink {
    slot: Arc<SlotShared>,
}

impl BodySink {
    pub(crate) fn new(slot: Arc<SlotShared>) -> Self {
        Self { slot }
    }

    /// The handle of the request this sink feeds.
    #[must_use]
    pub fn handle(&self) -> Handle {
        self.slot.handle
    }

    /// Append body bytes to the request's buffer, applying its growth
    /// policy. Returns the number of bytes accepted.
    pub fn write(&self, src: &[u8]) -> usize {
        let mut core = self.slot.lock();
        if core.closed || core.complete || core.failure.is_some() {
            return 0;
        }
        // the first body byte means the response headers are in
        core.headers_done = true;
        let handle = self.slot.handle;
        let url = &self.slot.url;
        let flush = core.flush.clone();
        let outcome = core.buffer.write(src, &mut |payload| {
            if let Some(sink) = flush.as_deref() {
                sink.on_flush(handle, url, payload);
            }
        });
        match outcome {
            WriteOutcome::Accepted(accepted) => {
                core.bytes_read += accepted as u64;
                tracing::trace!(%handle, accepted, total = core.bytes_read, "body bytes buffered");
                accepted
            }
            WriteOutcome::GrowFailed { accepted } => {
                core.bytes_read += accepted as u64;
                core.failure = Some(Error::BufferAllocationFailure {
                    capacity: core.buffer.capacity(),
                });
                core.complete = true;
                tracing::warn!(%handle, "buffer growth failed; request force-completed");
                accepted
            }
        }
    }
}

impl std::fmt::Debug for BodySink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BodySink")
            .field("handle", &self.slot.handle)
            .finish()
    }
}
