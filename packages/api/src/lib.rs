//! # Fytch public API
//!
//! Bounded pool of polled HTTP requests with fluent submission, typed event
//! callbacks, and per-transfer progress metrics. The engine lives in
//! `fytch_client`; this crate is the caller-facing surface.
//!
//! ```no_run
//! use std::sync::Arc;
//! use fytch::{BufferPlan, Fytch, FytchClient, Transport};
//!
//! fn fetch(transport: Arc<dyn Transport>) -> fytch::Result<()> {
//!     let client = FytchClient::new(transport);
//!     let handle = Fytch::get("https://example.com/archive.zip")
//!         .header("user-agent", "fytch")
//!         .plan(BufferPlan::GrowBounded { initial: 16_384, limit: 1_048_576 })
//!         .submit(&client)?;
//!     while !client.is_complete(handle)? {
//!         client.tick();
//!     }
//!     println!("{} bytes", client.body_len(handle)?);
//!     Ok(())
//! }
//! ```

#![deny(unsafe_code)]
#![warn(clippy::all, clippy::pedantic)]

pub mod builder;

pub use builder::RequestBuilder;

// Re-export the engine surface from the client package
pub use fytch_client::{
    BodySink, BufferPlan, Error, EventSink, Exchange, ExchangeParts, FlushSink, FytchClient,
    Handle, HeaderAccessor, PoolConfig, PoolStats, RequestEvent, Result, SharedBuffer, Submission,
    TransferMetrics, Transport, TransportError, WriterFlush,
};

// Foundation types callers meet in sink and transport signatures
pub use bytes::Bytes;
pub use url::Url;

/// Main entry point providing static builder constructors
pub struct Fytch;

impl Fytch {
    /// Start building a GET request
    ///
    /// Shorthand for `RequestBuilder::get(url)`
    pub fn get(url: impl Into<String>) -> RequestBuilder {
        RequestBuilder::get(url)
    }

    /// Start building a POST request
    ///
    /// Shorthand for `RequestBuilder::post(url)`
    pub fn post(url: impl Into<String>) -> RequestBuilder {
        RequestBuilder::post(url)
    }

    /// Start building a HEAD request
    ///
    /// Shorthand for `RequestBuilder::head(url)`
    pub fn head(url: impl Into<String>) -> RequestBuilder {
        RequestBuilder::head(url)
    }
}

/// Start building a GET request
pub fn get(url: impl Into<String>) -> RequestBuilder {
    RequestBuilder::get(url)
}

/// Start building a POST request
pub fn post(url: impl Into<String>) -> RequestBuilder {
    RequestBuilder::post(url)
}

/// Start building a HEAD request
pub fn head(url: impl Into<String>) -> RequestBuilder {
    RequestBuilder::head(url)
}
