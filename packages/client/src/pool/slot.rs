//! Request slots
//!
//! One occupied entry of the request pool: stable identity, the transport
//! exchange it exclusively owns, its response buffer, and the status fields
//! the poller advances. The mutable portion sits behind a per-slot lock so
//! transport writers and caller-side readers on different slots never
//! serialize against each other.

use std::any::Any;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;

use url::Url;

use crate::buffer::BodyBuffer;
use crate::buffer::flush::FlushSink;
use crate::error::Error;
use crate::transport::Exchange;

/// Public identifier for a pool slot.
///
/// The index addresses the slot; the generation is bumped every time the
/// slot is freed, so a handle kept across a free/reuse cycle is detectably
/// stale instead of silently aliasing the next request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize)]
pub struct Handle {
    index: u32,
    generation: u32,
}

impl Handle {
    pub(crate) fn new(index: u32, generation: u32) -> Self {
        Self { index, generation }
    }

    /// Slot index within the pool.
    #[must_use]
    pub fn index(&self) -> usize {
        self.index as usize
    }

    /// Occupancy generation of the slot this handle was issued for.
    #[must_use]
    pub fn generation(&self) -> u32 {
        self.generation
    }
}

impl fmt::Display for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.index, self.generation)
    }
}

/// Immutable identity of an occupied slot plus its locked mutable state.
pub(crate) struct SlotShared {
    pub(crate) handle: Handle,
    pub(crate) url: Url,
    pub(crate) started_at: Instant,
    core: Mutex<SlotCore>,
}

impl SlotShared {
    pub(crate) fn new(
        handle: Handle,
        url: Url,
        buffer: BodyBuffer,
        flush: Option<Arc<dyn FlushSink>>,
        user: Option<Box<dyn Any + Send>>,
    ) -> Arc<Self> {
        Arc::new(Self {
            handle,
            url,
            started_at: Instant::now(),
            core: Mutex::new(SlotCore {
                exchange: None,
                buffer,
                status: 0,
                bytes_read: 0,
                content_length: None,
                mime: None,
                headers_done: false,
                complete: false,
                released: false,
                closed: false,
                failure: None,
                flush,
                user,
            }),
        })
    }

    pub(crate) fn lock(&self) -> MutexGuard<'_, SlotCore> {
        self.core.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// The lock-guarded state of one request.
pub(crate) struct SlotCore {
    /// Transport-side handle for the exchange; exclusively owned here.
    pub(crate) exchange: Option<Box<dyn Exchange>>,
    pub(crate) buffer: BodyBuffer,
    /// Last observed status code; 0 until known.
    pub(crate) status: u16,
    /// Cumulative body bytes accepted, across all reallocations and flushes.
    pub(crate) bytes_read: u64,
    /// Learned from a Content-Length header; never invented.
    pub(crate) content_length: Option<u64>,
    /// Learned from a Content-Type header.
    pub(crate) mime: Option<String>,
    pub(crate) headers_done: bool,
    pub(crate) complete: bool,
    pub(crate) released: bool,
    /// Set when the slot is torn down; streaming writes arriving after this
    /// are rejected.
    pub(crate) closed: bool,
    /// Mid-stream buffer failure recorded for the completion event.
    pub(crate) failure: Option<Error>,
    pub(crate) flush: Option<Arc<dyn FlushSink>>,
    pub(crate) user: Option<Box<dyn Any + Send>>,
}

impl SlotCore {
    /// Close out the slot: reject further writes, tear down the exchange,
    /// release the buffer.
    pub(crate) fn teardown(&mut self) {
        self.closed = true;
        if let Some(mut exchange) = self.exchange.take() {
            exchange.close();
        }
        self.buffer.retire();
        self.user = None;
    }
}
