//! Fluent request construction
//!
//! A [`RequestBuilder`] accumulates method, headers, body, buffer plan, and
//! callbacks, then hands a finished submission to the engine. Building
//! performs no I/O; everything happens at `submit`.

pub mod body;
pub mod core;
pub mod headers;

pub use self::core::RequestBuilder;
