//! Request event layer
//!
//! After the poller refreshes a slot, its observable fields are diffed
//! against the last snapshot the caller saw and one typed event fires per
//! changed field, in a fixed order. Change detection, not polling frequency,
//! gates delivery: ticking twice with nothing new fires nothing.

use bytes::Bytes;
use url::Url;

use crate::pool::Handle;
use crate::pool::slot::SlotShared;

/// Events delivered to the caller's [`EventSink`].
///
/// For one slot in one tick, the firing order is fixed: `StatusChanged`,
/// `HeadersReady`, `LengthKnown`, `MimeKnown`, `BodyRead`, `Completed`.
/// `Started` fires exactly once, synchronously, at submission time.
pub enum RequestEvent<'a> {
    /// The request was accepted into the pool.
    Started { handle: Handle, url: &'a Url },
    /// The status code changed.
    StatusChanged {
        handle: Handle,
        url: &'a Url,
        status: u16,
    },
    /// All response headers are in; `headers` reads them live.
    HeadersReady {
        handle: Handle,
        url: &'a Url,
        status: u16,
        headers: HeaderAccessor<'a>,
    },
    /// The body's total size was learned from the response headers.
    LengthKnown {
        handle: Handle,
        url: &'a Url,
        content_length: u64,
    },
    /// The body's media type was learned from the response headers.
    MimeKnown {
        handle: Handle,
        url: &'a Url,
        mime: &'a str,
    },
    /// More body bytes were buffered.
    BodyRead {
        handle: Handle,
        url: &'a Url,
        bytes_read: u64,
    },
    /// The exchange finished (successfully or not). Carries a detached
    /// snapshot of the buffered body. The slot is auto-released and will be
    /// reclaimed on the next tick.
    Completed {
        handle: Handle,
        url: &'a Url,
        status: u16,
        body: Bytes,
    },
}

impl RequestEvent<'_> {
    /// The handle this event concerns.
    #[must_use]
    pub fn handle(&self) -> Handle {
        match self {
            RequestEvent::Started { handle, .. }
            | RequestEvent::StatusChanged { handle, .. }
            | RequestEvent::HeadersReady { handle, .. }
            | RequestEvent::LengthKnown { handle, .. }
            | RequestEvent::MimeKnown { handle, .. }
            | RequestEvent::BodyRead { handle, .. }
            | RequestEvent::Completed { handle, .. } => *handle,
        }
    }

    /// Short name of the event kind.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            RequestEvent::Started { .. } => "started",
            RequestEvent::StatusChanged { .. } => "status",
            RequestEvent::HeadersReady { .. } => "headers",
            RequestEvent::LengthKnown { .. } => "length",
            RequestEvent::MimeKnown { .. } => "mime",
            RequestEvent::BodyRead { .. } => "read",
            RequestEvent::Completed { .. } => "complete",
        }
    }
}

/// Live response-header lookup bound to one request.
pub struct HeaderAccessor<'a> {
    slot: &'a SlotShared,
}

impl HeaderAccessor<'_> {
    /// Look up a header by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<String> {
        let core = self.slot.lock();
        core.exchange.as_ref().and_then(|ex| ex.header(name))
    }

    /// Walk all response headers; return `false` from the visitor to stop.
    pub fn visit(&self, visitor: &mut dyn FnMut(&str, &str) -> bool) {
        let core = self.slot.lock();
        if let Some(exchange) = core.exchange.as_ref() {
            exchange.visit_headers(visitor);
        }
    }
}

/// Receives request events. Handlers run synchronously on the polling
/// thread, one slot at a time, and must not re-enter `tick()`.
pub trait EventSink: Send {
    fn on_event(&mut self, event: RequestEvent<'_>);
}

impl<F: FnMut(RequestEvent<'_>) + Send> EventSink for F {
    fn on_event(&mut self, event: RequestEvent<'_>) {
        self(event);
    }
}

/// The caller-visible fields of a slot as of the previous tick.
#[derive(Debug, Default, Clone)]
pub(crate) struct SlotSnapshot {
    pub(crate) status: u16,
    pub(crate) headers_done: bool,
    pub(crate) content_length: Option<u64>,
    pub(crate) mime: Option<String>,
    pub(crate) bytes_read: u64,
    pub(crate) complete: bool,
}

/// Fields observed under the slot lock during the current tick.
#[derive(Debug, Clone)]
pub(crate) struct Observed {
    pub(crate) status: u16,
    pub(crate) headers_done: bool,
    pub(crate) content_length: Option<u64>,
    pub(crate) mime: Option<String>,
    pub(crate) bytes_read: u64,
    pub(crate) complete: bool,
}

/// Per-slot snapshots plus the caller's sink.
pub(crate) struct EventLayer {
    sink: Option<Box<dyn EventSink>>,
    snapshots: Vec<Option<SlotSnapshot>>,
}

impl EventLayer {
    pub(crate) fn new(capacity: usize) -> Self {
        let mut snapshots = Vec::with_capacity(capacity);
        snapshots.resize_with(capacity, || None);
        Self {
            sink: None,
            snapshots,
        }
    }

    pub(crate) fn set_sink(&mut self, sink: Box<dyn EventSink>) {
        self.sink = Some(sink);
    }

    pub(crate) fn clear_sink(&mut self) {
        self.sink = None;
    }

    /// Start tracking a freshly allocated slot and fire `Started`.
    pub(crate) fn started(&mut self, slot: &SlotShared) {
        if let Some(snapshot) = self.snapshots.get_mut(slot.handle.index()) {
            *snapshot = Some(SlotSnapshot::default());
        }
        if let Some(sink) = self.sink.as_mut() {
            sink.on_event(RequestEvent::Started {
                handle: slot.handle,
                url: &slot.url,
            });
        }
    }

    /// Forget a reclaimed slot.
    pub(crate) fn drop_slot(&mut self, index: usize) {
        if let Some(snapshot) = self.snapshots.get_mut(index) {
            *snapshot = None;
        }
    }

    /// Diff `observed` against the slot's snapshot and fire events for the
    /// changed fields, in the fixed order. Returns whether `Completed` fired
    /// (the caller then auto-releases the slot).
    pub(crate) fn dispatch(&mut self, slot: &SlotShared, observed: &Observed) -> bool {
        let handle = slot.handle;
        let index = handle.index();
        let Some(Some(snapshot)) = self.snapshots.get_mut(index) else {
            return false;
        };
        let previous = snapshot.clone();
        *snapshot = SlotSnapshot {
            status: observed.status,
            headers_done: observed.headers_done,
            content_length: observed.content_length,
            mime: observed.mime.clone(),
            bytes_read: observed.bytes_read,
            complete: observed.complete,
        };
        let completed = observed.complete && !previous.complete;
        let Some(sink) = self.sink.as_mut() else {
            return completed;
        };
        let url = &slot.url;
        if observed.status != previous.status {
            sink.on_event(RequestEvent::StatusChanged {
                handle,
                url,
                status: observed.status,
            });
        }
        if observed.headers_done && !previous.headers_done {
            sink.on_event(RequestEvent::HeadersReady {
                handle,
                url,
                status: observed.status,
                headers: HeaderAccessor { slot },
            });
        }
        if observed.content_length != previous.content_length {
            if let Some(content_length) = observed.content_length {
                sink.on_event(RequestEvent::LengthKnown {
                    handle,
                    url,
                    content_length,
                });
            }
        }
        if observed.mime != previous.mime {
            if let Some(mime) = observed.mime.as_deref() {
                sink.on_event(RequestEvent::MimeKnown { handle, url, mime });
            }
        }
        if observed.bytes_read != previous.bytes_read {
            sink.on_event(RequestEvent::BodyRead {
                handle,
                url,
                bytes_read: observed.bytes_read,
            });
        }
        if completed {
            let body = slot.lock().buffer.snapshot();
            sink.on_event(RequestEvent::Completed {
                handle,
                url,
                status: observed.status,
                body,
            });
        }
        completed
    }
}
