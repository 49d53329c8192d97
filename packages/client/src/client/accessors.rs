//! Per-request accessors
//!
//! Every accessor validates the handle against the pool (stale handles fail
//! with `InvalidHandle`) and takes only the slot's own lock.

use std::any::Any;
use std::sync::Arc;

use bytes::Bytes;
use url::Url;

use crate::error::{Error, Result};
use crate::pool::Handle;
use crate::pool::slot::SlotShared;
use crate::telemetry::TransferMetrics;

use super::FytchClient;
use super::lock;

impl FytchClient {
    fn slot(&self, handle: Handle) -> Result<Arc<SlotShared>> {
        self.pool.resolve(handle)
    }

    /// Whether the exchange has finished (successfully or not).
    pub fn is_complete(&self, handle: Handle) -> Result<bool> {
        Ok(self.slot(handle)?.lock().complete)
    }

    /// Mark the request finished on the caller's side. Once the exchange is
    /// also complete, the slot is reclaimed on the next tick. Safe to repeat.
    pub fn release(&self, handle: Handle) -> Result<()> {
        self.slot(handle)?.lock().released = true;
        Ok(())
    }

    /// Last observed status code; 0 until the transport reports one.
    pub fn status(&self, handle: Handle) -> Result<u16> {
        Ok(self.slot(handle)?.lock().status)
    }

    /// The URL the request was submitted with.
    pub fn url(&self, handle: Handle) -> Result<Url> {
        Ok(self.slot(handle)?.url.clone())
    }

    /// Look up a response header by name.
    pub fn header(&self, handle: Handle, name: &str) -> Result<Option<String>> {
        let slot = self.slot(handle)?;
        let core = slot.lock();
        Ok(core.exchange.as_ref().and_then(|ex| ex.header(name)))
    }

    /// Walk the response headers; return `false` from the visitor to stop.
    pub fn visit_headers(
        &self,
        handle: Handle,
        visitor: &mut dyn FnMut(&str, &str) -> bool,
    ) -> Result<()> {
        let slot = self.slot(handle)?;
        let core = slot.lock();
        if let Some(exchange) = core.exchange.as_ref() {
            exchange.visit_headers(visitor);
        }
        Ok(())
    }

    /// Cumulative body bytes buffered, across all reallocations and flushes.
    pub fn body_len(&self, handle: Handle) -> Result<u64> {
        Ok(self.slot(handle)?.lock().bytes_read)
    }

    /// Body size learned from the response headers, if any.
    pub fn content_length(&self, handle: Handle) -> Result<Option<u64>> {
        Ok(self.slot(handle)?.lock().content_length)
    }

    /// Media type learned from the response headers, if any.
    pub fn mime(&self, handle: Handle) -> Result<Option<String>> {
        Ok(self.slot(handle)?.lock().mime.clone())
    }

    /// Copy out up to `max` bytes from the front of the buffered body.
    pub fn read_body(&self, handle: Handle, max: usize) -> Result<Bytes> {
        let slot = self.slot(handle)?;
        let core = slot.lock();
        Ok(core.buffer.read(max))
    }

    /// Detached copy of everything currently buffered.
    pub fn body_snapshot(&self, handle: Handle) -> Result<Bytes> {
        let slot = self.slot(handle)?;
        let core = slot.lock();
        Ok(core.buffer.snapshot())
    }

    /// Attach opaque caller data to the request.
    pub fn set_user_data(&self, handle: Handle, data: Box<dyn Any + Send>) -> Result<()> {
        self.slot(handle)?.lock().user = Some(data);
        Ok(())
    }

    /// Detach and return the caller data, if any.
    pub fn take_user_data(&self, handle: Handle) -> Result<Option<Box<dyn Any + Send>>> {
        Ok(self.slot(handle)?.lock().user.take())
    }

    /// The buffer failure recorded on the slot, if streaming was cut short.
    pub fn error(&self, handle: Handle) -> Result<Option<Error>> {
        Ok(self.slot(handle)?.lock().failure.clone())
    }

    /// Metrics for this transfer from the last recompute, if metrics are
    /// enabled and the handle is current.
    pub fn metrics(&self, handle: Handle) -> Option<TransferMetrics> {
        lock(&self.metrics).get(handle).cloned()
    }

    /// Whether a current metrics entry exists for this handle.
    pub fn has_metrics(&self, handle: Handle) -> bool {
        lock(&self.metrics).get(handle).is_some()
    }
}
