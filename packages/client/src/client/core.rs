//! Client construction and request submission

use std::any::Any;
use std::sync::{Arc, Mutex};

use bytes::Bytes;
use http::{HeaderMap, HeaderValue, Method, header};
use url::Url;

use crate::buffer::flush::FlushSink;
use crate::buffer::registry::{PersistentBufferRegistry, SharedBuffer};
use crate::buffer::{BodyBuffer, BufferPlan, ByteLedger, GrowthPolicy};
use crate::config::PoolConfig;
use crate::error::{Error, Result};
use crate::events::{EventLayer, EventSink};
use crate::pool::{Handle, RequestPool};
use crate::telemetry::{MetricsTable, PoolStats};
use crate::transport::{BodySink, ExchangeParts, Transport};

use super::lock;

/// One request, ready to hand to [`FytchClient::submit`].
pub struct Submission {
    pub method: Method,
    pub url: String,
    pub headers: HeaderMap,
    pub body: Option<Bytes>,
    pub plan: BufferPlan,
    /// Per-request flush sink; falls back to the pool-wide default.
    pub flush: Option<Arc<dyn FlushSink>>,
    /// Opaque caller data, retrievable through `take_user_data`.
    pub user: Option<Box<dyn Any + Send>>,
}

impl Submission {
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: HeaderMap::new(),
            body: None,
            plan: BufferPlan::Default,
            flush: None,
            user: None,
        }
    }
}

/// The pooled, polled request engine.
///
/// All wire-level work is delegated to the [`Transport`] supplied at
/// construction; the client owns the slot pool, the response buffers, the
/// event layer, and the metrics table. One caller thread drives the whole
/// engine through [`FytchClient::tick`].
pub struct FytchClient {
    pub(super) config: PoolConfig,
    transport: Arc<dyn Transport>,
    pub(super) pool: RequestPool,
    registry: Mutex<PersistentBufferRegistry>,
    pub(super) events: Mutex<EventLayer>,
    pub(super) metrics: Mutex<MetricsTable>,
    pub(super) ledger: Arc<ByteLedger>,
    default_flush: Mutex<Option<Arc<dyn FlushSink>>>,
}

impl FytchClient {
    /// Create a client with the default configuration.
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self::with_config(PoolConfig::default(), transport)
    }

    /// Create a client with a custom configuration.
    pub fn with_config(config: PoolConfig, transport: Arc<dyn Transport>) -> Self {
        let ledger = Arc::new(ByteLedger::new());
        Self {
            pool: RequestPool::new(config.capacity),
            registry: Mutex::new(PersistentBufferRegistry::new(Arc::clone(&ledger))),
            events: Mutex::new(EventLayer::new(config.capacity)),
            metrics: Mutex::new(MetricsTable::new(config.capacity)),
            ledger,
            default_flush: Mutex::new(None),
            transport,
            config,
        }
    }

    /// Current configuration.
    #[inline]
    pub fn config(&self) -> &PoolConfig {
        &self.config
    }

    /// Install the sink that receives request events.
    pub fn set_event_sink(&self, sink: Box<dyn EventSink>) {
        lock(&self.events).set_sink(sink);
    }

    /// Remove the event sink; events are silently dropped until a new one is
    /// installed.
    pub fn clear_event_sink(&self) {
        lock(&self.events).clear_sink();
    }

    /// Set the flush sink used by reuse-with-flush requests that do not
    /// bring their own.
    pub fn set_default_flush(&self, sink: Option<Arc<dyn FlushSink>>) {
        *lock(&self.default_flush) = sink;
    }

    /// Submit a GET request.
    pub fn get(&self, url: impl Into<String>, plan: BufferPlan, headers: HeaderMap) -> Result<Handle> {
        let mut submission = Submission::new(Method::GET, url);
        submission.headers = headers;
        submission.plan = plan;
        self.submit(submission)
    }

    /// Submit a POST request. The body must be non-empty.
    pub fn post(
        &self,
        url: impl Into<String>,
        plan: BufferPlan,
        headers: HeaderMap,
        body: impl Into<Bytes>,
    ) -> Result<Handle> {
        let mut submission = Submission::new(Method::POST, url);
        submission.headers = headers;
        submission.plan = plan;
        submission.body = Some(body.into());
        self.submit(submission)
    }

    /// Submit a HEAD request.
    pub fn head(&self, url: impl Into<String>, plan: BufferPlan, headers: HeaderMap) -> Result<Handle> {
        let mut submission = Submission::new(Method::HEAD, url);
        submission.headers = headers;
        submission.plan = plan;
        self.submit(submission)
    }

    /// Submit a request: claim a slot, set up its buffer, start the
    /// transport exchange, and fire `Started`.
    pub fn submit(&self, submission: Submission) -> Result<Handle> {
        let Submission {
            method,
            url,
            mut headers,
            body,
            plan,
            flush,
            user,
        } = submission;
        if url.is_empty() {
            return Err(Error::invalid_url("empty URL"));
        }
        let url = Url::parse(&url).map_err(|e| Error::InvalidUrl(format!("{url}: {e}")))?;
        let body = body.filter(|b| !b.is_empty());
        if method == Method::POST && body.is_none() {
            return Err(Error::EmptyBody);
        }
        if !headers.contains_key(header::ACCEPT) {
            headers.insert(header::ACCEPT, HeaderValue::from_static("*/*"));
        }
        let buffer = self.build_buffer(plan)?;
        let flush = flush.or_else(|| lock(&self.default_flush).clone());
        let slot = self.pool.allocate(url.clone(), buffer, flush, user)?;
        let handle = slot.handle;
        let sink = BodySink::new(Arc::clone(&slot));
        let parts = ExchangeParts {
            method,
            url,
            headers,
            body,
        };
        match self.transport.exchange(parts, sink) {
            Ok(exchange) => slot.lock().exchange = Some(exchange),
            Err(e) => {
                if let Some(slot) = self.pool.free(handle) {
                    slot.lock().teardown();
                }
                return Err(Error::Transport(e));
            }
        }
        lock(&self.events).started(&slot);
        Ok(handle)
    }

    /// Cancel a request without waiting for completion: close the exchange
    /// and clear the slot immediately.
    pub fn cancel(&self, handle: Handle) -> Result<()> {
        let Some(slot) = self.pool.free(handle) else {
            return Err(Error::InvalidHandle(handle));
        };
        tracing::warn!(%handle, url = %slot.url, "request cancelled");
        slot.lock().teardown();
        lock(&self.events).drop_slot(handle.index());
        lock(&self.metrics).clear_slot(handle.index());
        Ok(())
    }

    /// Number of occupied pool slots.
    pub fn count(&self) -> usize {
        self.pool.count()
    }

    /// Snapshot of pool occupancy and buffer accounting.
    pub fn stats(&self) -> PoolStats {
        let slots = self.pool.snapshot();
        let requests = slots.len();
        let active = slots.iter().filter(|s| !s.lock().complete).count();
        PoolStats {
            requests,
            active,
            max: self.pool.capacity(),
            buffer_bytes: self.ledger.current(),
        }
    }

    /// Grow the persistent buffer table to at least `n` entries.
    pub fn ensure_persistent_buffers(&self, n: usize) {
        lock(&self.registry).ensure_capacity(n);
    }

    /// Register a persistent buffer the engine allocates and owns.
    pub fn add_persistent_buffer(&self, size: usize) -> Result<usize> {
        lock(&self.registry).add(size)
    }

    /// Register caller-held storage as a persistent buffer. The engine never
    /// frees it.
    pub fn add_foreign_buffer(&self, buffer: SharedBuffer) -> Result<usize> {
        lock(&self.registry).add_foreign(buffer)
    }

    /// Reopen a persistent buffer id. A request still borrowing the storage
    /// keeps it alive through its own reference.
    pub fn remove_persistent_buffer(&self, id: usize) -> Result<()> {
        lock(&self.registry).remove(id)
    }

    fn build_buffer(&self, plan: BufferPlan) -> Result<BodyBuffer> {
        let ledger = Arc::clone(&self.ledger);
        match plan {
            BufferPlan::Default => {
                BodyBuffer::owned(self.config.read_buffer_size, GrowthPolicy::Unbounded, ledger)
            }
            BufferPlan::Grow { initial } => {
                BodyBuffer::owned(initial, GrowthPolicy::Unbounded, ledger)
            }
            BufferPlan::GrowBounded { initial, limit } => {
                BodyBuffer::owned(initial, GrowthPolicy::Bounded { limit }, ledger)
            }
            BufferPlan::Fixed { capacity } => {
                BodyBuffer::owned(capacity, GrowthPolicy::Fixed, ledger)
            }
            BufferPlan::ReuseWithFlush { capacity } => {
                BodyBuffer::owned(capacity, GrowthPolicy::ReuseWithFlush, ledger)
            }
            BufferPlan::Persistent { id } => {
                let shared = lock(&self.registry).attach(id)?;
                Ok(BodyBuffer::shared(shared, ledger))
            }
        }
    }
}

impl std::fmt::Debug for FytchClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FytchClient")
            .field("capacity", &self.pool.capacity())
            .field("occupied", &self.pool.count())
            .field("buffer_bytes", &self.ledger.current())
            .finish()
    }
}
