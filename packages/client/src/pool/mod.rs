//! The bounded request pool
//!
//! A fixed-size table of request slots. Slot lifecycle (allocate, resolve,
//! free) runs under one pool-level lock; everything inside a slot is guarded
//! by that slot's own lock. Allocation scans lowest-index-first, so handle
//! reuse is deterministic.

pub(crate) mod slot;

pub use self::slot::Handle;

use std::any::Any;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use url::Url;

use crate::buffer::BodyBuffer;
use crate::buffer::flush::FlushSink;
use crate::error::{Error, Result};
use self::slot::SlotShared;

struct PoolEntry {
    generation: u32,
    slot: Option<Arc<SlotShared>>,
}

/// Fixed-capacity table of in-flight requests.
pub(crate) struct RequestPool {
    entries: Mutex<Vec<PoolEntry>>,
    capacity: usize,
}

impl RequestPool {
    pub(crate) fn new(capacity: usize) -> Self {
        let mut entries = Vec::with_capacity(capacity);
        for _ in 0..capacity {
            entries.push(PoolEntry {
                generation: 0,
                slot: None,
            });
        }
        Self {
            entries: Mutex::new(entries),
            capacity,
        }
    }

    pub(crate) fn capacity(&self) -> usize {
        self.capacity
    }

    /// Claim the lowest free index and install a new slot there. The buffer
    /// is handed over here so the slot becomes visible fully formed.
    pub(crate) fn allocate(
        &self,
        url: Url,
        buffer: BodyBuffer,
        flush: Option<Arc<dyn FlushSink>>,
        user: Option<Box<dyn Any + Send>>,
    ) -> Result<Arc<SlotShared>> {
        let mut entries = self.lock_entries();
        let Some(index) = entries.iter().position(|e| e.slot.is_none()) else {
            return Err(Error::PoolExhausted {
                capacity: self.capacity,
            });
        };
        let handle = Handle::new(index as u32, entries[index].generation);
        let slot = SlotShared::new(handle, url, buffer, flush, user);
        entries[index].slot = Some(Arc::clone(&slot));
        tracing::debug!(%handle, url = %slot.url, "request slot allocated");
        Ok(slot)
    }

    /// Look up a live slot, rejecting out-of-range and stale handles.
    pub(crate) fn resolve(&self, handle: Handle) -> Result<Arc<SlotShared>> {
        let entries = self.lock_entries();
        entries
            .get(handle.index())
            .filter(|e| e.generation == handle.generation())
            .and_then(|e| e.slot.clone())
            .ok_or(Error::InvalidHandle(handle))
    }

    /// Remove a slot from the table and bump its generation. Returns the
    /// detached slot so the caller can tear it down outside the pool lock;
    /// `None` if the handle was already stale.
    pub(crate) fn free(&self, handle: Handle) -> Option<Arc<SlotShared>> {
        let detached = {
            let mut entries = self.lock_entries();
            let entry = entries.get_mut(handle.index())?;
            if entry.generation != handle.generation() {
                return None;
            }
            let slot = entry.slot.take()?;
            entry.generation += 1;
            slot
        };
        tracing::debug!(%handle, "request slot freed");
        Some(detached)
    }

    /// Number of occupied slots.
    pub(crate) fn count(&self) -> usize {
        self.lock_entries()
            .iter()
            .filter(|e| e.slot.is_some())
            .count()
    }

    /// Occupied slots in index order, detached from the pool lock so the
    /// caller can take per-slot locks and run callbacks freely.
    pub(crate) fn snapshot(&self) -> Vec<Arc<SlotShared>> {
        self.lock_entries()
            .iter()
            .filter_map(|e| e.slot.clone())
            .collect()
    }

    fn lock_entries(&self) -> MutexGuard<'_, Vec<PoolEntry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
