//! # Fytch request engine
//!
//! A bounded pool of concurrently in-flight HTTP requests, polled to
//! completion by a caller-driven update loop. Wire-level work (DNS, TCP,
//! TLS, HTTP framing) is delegated to a pluggable [`Transport`]; this crate
//! owns everything around it:
//!
//! - the fixed-capacity slot pool with generation-checked handles
//! - per-request response buffers with pluggable growth policies
//!   (grow-unbounded, grow-bounded, fixed, reuse-with-flush, persistent)
//! - a registry of persistent buffers shared across requests
//! - the tick-driven polling state machine
//! - a typed event layer (start, status, headers, length, mime, read,
//!   complete) gated by field-level change detection
//! - per-transfer throughput and ETA metrics
//!
//! Nothing here blocks: `tick()` returns promptly, and the transport streams
//! body bytes into per-slot buffers through a [`BodySink`] from its own
//! threads.
//!
//! ## Usage
//!
//! ```no_run
//! use std::sync::Arc;
//! use fytch_client::{BufferPlan, FytchClient, RequestEvent, Transport};
//!
//! fn run(transport: Arc<dyn Transport>) -> fytch_client::Result<()> {
//!     let client = FytchClient::new(transport);
//!     client.set_event_sink(Box::new(|event: RequestEvent<'_>| {
//!         if let RequestEvent::Completed { url, status, body, .. } = event {
//!             println!("{url} -> {status} ({} bytes)", body.len());
//!         }
//!     }));
//!     client.get(
//!         "https://example.com/data.bin",
//!         BufferPlan::Default,
//!         http::HeaderMap::new(),
//!     )?;
//!     loop {
//!         client.tick();
//!         if client.count() == 0 {
//!             break;
//!         }
//!     }
//!     Ok(())
//! }
//! ```

#![deny(unsafe_code)]
#![warn(clippy::all)]

pub mod buffer;
pub mod client;
pub mod config;
pub mod error;
pub mod events;
pub mod pool;
pub mod telemetry;
pub mod transport;

pub use buffer::flush::{FlushSink, WriterFlush};
pub use buffer::registry::{MAX_PERSISTENT_BUFFERS, SharedBuffer};
pub use buffer::{BufferPlan, ByteLedger, GrowthPolicy};
pub use client::{FytchClient, Submission};
pub use config::PoolConfig;
pub use error::{Error, Result};
pub use events::{EventSink, HeaderAccessor, RequestEvent};
pub use pool::Handle;
pub use telemetry::{PoolStats, TransferMetrics};
pub use transport::{BodySink, Exchange, ExchangeParts, Transport, TransportError};
