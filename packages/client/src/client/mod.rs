//! The request engine client
//!
//! [`FytchClient`] ties the pool, the buffer registry, the event layer, and
//! the metrics table together behind the caller-facing surface: submit,
//! tick, inspect, release.

mod accessors;
mod core;
mod update;

pub use self::core::{FytchClient, Submission};

use std::sync::{Mutex, MutexGuard, PoisonError};

pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
