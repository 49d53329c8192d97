//! Flush callbacks for reuse-with-flush buffers
//!
//! When a [`super::BufferPlan::ReuseWithFlush`] buffer fills, its contents
//! are handed to a [`FlushSink`] before the write cursor rewinds. The sink
//! must consume (or copy) the payload before returning; the storage is about
//! to be overwritten.

use std::io::Write;
use std::sync::Mutex;

use url::Url;

use crate::pool::Handle;

/// Receives full-buffer payloads from streaming requests.
///
/// Invoked on the transport's delivery thread while the request's slot lock
/// is held: implementations must not call back into the engine for the same
/// handle.
pub trait FlushSink: Send + Sync {
    fn on_flush(&self, handle: Handle, url: &Url, payload: &[u8]);
}

/// Drains flushed payloads into any [`std::io::Write`].
pub struct WriterFlush<W: Write + Send> {
    writer: Mutex<W>,
}

impl<W: Write + Send> WriterFlush<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer: Mutex::new(writer),
        }
    }

    /// Recover the wrapped writer, e.g. to flush and close it.
    pub fn into_inner(self) -> W {
        self.writer
            .into_inner()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

impl<W: Write + Send> FlushSink for WriterFlush<W> {
    fn on_flush(&self, handle: Handle, url: &Url, payload: &[u8]) {
        let mut writer = self
            .writer
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        if let Err(e) = writer.write_all(payload) {
            tracing::warn!(%handle, %url, error = %e, "flush sink write failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writer_flush_appends_payloads() {
        let sink = WriterFlush::new(Vec::new());
        let url = Url::parse("http://example.com/a").unwrap();
        let handle = Handle::new(0, 0);
        sink.on_flush(handle, &url, b"abc");
        sink.on_flush(handle, &url, b"def");
        assert_eq!(sink.into_inner(), b"abcdef");
    }
}
