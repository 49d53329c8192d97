//! Persistent buffer registry
//!
//! A sparse, id-indexed table of response buffers that outlive any single
//! request. Entries are either owned by the registry or foreign (storage the
//! caller created and also holds); foreign storage is never freed here.
//! Requests borrow an entry by id at submission time and write into it in
//! place of a private buffer.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use bytes::Bytes;

use crate::error::{Error, Result};

use super::ByteLedger;

/// Hard ceiling on the registry id space.
pub const MAX_PERSISTENT_BUFFERS: usize = 65_536;

/// Table size after the first growth from empty.
const FIRST_GROWTH: usize = 128;

/// Reference-counted byte storage shared between the registry, the caller,
/// and at most one request at a time.
#[derive(Clone)]
pub struct SharedBuffer {
    inner: Arc<SharedInner>,
}

struct SharedInner {
    capacity: usize,
    data: Mutex<Vec<u8>>,
}

impl SharedBuffer {
    /// Allocate storage for `capacity` bytes.
    ///
    /// # Errors
    ///
    /// Returns [`Error::BufferAllocationFailure`] if the allocation fails.
    pub fn with_capacity(capacity: usize) -> Result<Self> {
        let mut data = Vec::new();
        if data.try_reserve_exact(capacity).is_err() {
            return Err(Error::BufferAllocationFailure { capacity });
        }
        Ok(Self {
            inner: Arc::new(SharedInner {
                capacity,
                data: Mutex::new(data),
            }),
        })
    }

    /// Fixed capacity set at creation time.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.inner.capacity
    }

    /// Bytes currently written.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Detached copy of the current contents.
    #[must_use]
    pub fn contents(&self) -> Bytes {
        Bytes::copy_from_slice(&self.lock())
    }

    pub(crate) fn lock(&self) -> MutexGuard<'_, Vec<u8>> {
        self.inner.data.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn clear(&self) {
        self.lock().clear();
    }
}

impl std::fmt::Debug for SharedBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedBuffer")
            .field("capacity", &self.capacity())
            .field("len", &self.len())
            .finish()
    }
}

enum Entry {
    Open,
    Owned(SharedBuffer),
    Foreign(SharedBuffer),
}

impl Entry {
    fn is_open(&self) -> bool {
        matches!(self, Entry::Open)
    }
}

/// The registry table. Ids are indices; removal reopens an id for reuse.
pub(crate) struct PersistentBufferRegistry {
    entries: Vec<Entry>,
    ledger: Arc<ByteLedger>,
}

impl PersistentBufferRegistry {
    pub(crate) fn new(ledger: Arc<ByteLedger>) -> Self {
        Self {
            entries: Vec::new(),
            ledger,
        }
    }

    /// Grow the table to hold at least `n` entries, clamped to the id
    /// ceiling. New entries start open.
    pub(crate) fn ensure_capacity(&mut self, n: usize) {
        let n = n.min(MAX_PERSISTENT_BUFFERS);
        while self.entries.len() < n {
            self.entries.push(Entry::Open);
        }
    }

    /// Register a buffer the registry allocates and owns.
    pub(crate) fn add(&mut self, size: usize) -> Result<usize> {
        let id = self.claim_slot()?;
        let buffer = SharedBuffer::with_capacity(size)?;
        self.ledger.add(size as u64);
        self.entries[id] = Entry::Owned(buffer);
        tracing::debug!(id, size, "persistent buffer registered");
        Ok(id)
    }

    /// Register caller-held storage. The registry keeps a reference but
    /// never accounts for or frees it.
    pub(crate) fn add_foreign(&mut self, buffer: SharedBuffer) -> Result<usize> {
        let id = self.claim_slot()?;
        self.entries[id] = Entry::Foreign(buffer);
        tracing::debug!(id, "foreign persistent buffer registered");
        Ok(id)
    }

    /// Reopen an id. Owned storage is released; foreign storage is only
    /// forgotten. A request still borrowing the buffer keeps its own
    /// reference alive.
    pub(crate) fn remove(&mut self, id: usize) -> Result<()> {
        match self.entries.get_mut(id) {
            None | Some(Entry::Open) => Err(Error::UnknownPersistentBuffer(id)),
            Some(entry @ Entry::Owned(_)) => {
                if let Entry::Owned(buffer) = std::mem::replace(entry, Entry::Open) {
                    self.ledger.sub(buffer.capacity() as u64);
                }
                tracing::debug!(id, "persistent buffer released");
                Ok(())
            }
            Some(entry @ Entry::Foreign(_)) => {
                *entry = Entry::Open;
                tracing::debug!(id, "foreign persistent buffer detached");
                Ok(())
            }
        }
    }

    /// Borrow the buffer registered under `id` for a new request.
    pub(crate) fn attach(&self, id: usize) -> Result<SharedBuffer> {
        match self.entries.get(id) {
            Some(Entry::Owned(buffer) | Entry::Foreign(buffer)) => Ok(buffer.clone()),
            _ => Err(Error::UnknownPersistentBuffer(id)),
        }
    }

    /// Number of ids currently registered (owned or foreign).
    pub(crate) fn in_use(&self) -> usize {
        self.entries.iter().filter(|e| !e.is_open()).count()
    }

    fn claim_slot(&mut self) -> Result<usize> {
        if let Some(id) = self.entries.iter().position(Entry::is_open) {
            return Ok(id);
        }
        if self.entries.len() >= MAX_PERSISTENT_BUFFERS {
            return Err(Error::RegistryFull {
                limit: MAX_PERSISTENT_BUFFERS,
            });
        }
        let id = self.entries.len();
        let grown = if self.entries.is_empty() {
            FIRST_GROWTH
        } else {
            (self.entries.len() * 2).min(MAX_PERSISTENT_BUFFERS)
        };
        self.ensure_capacity(grown);
        Ok(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> (PersistentBufferRegistry, Arc<ByteLedger>) {
        let ledger = Arc::new(ByteLedger::new());
        (PersistentBufferRegistry::new(Arc::clone(&ledger)), ledger)
    }

    #[test]
    fn empty_registry_grows_on_first_add() {
        let (mut reg, ledger) = registry();
        let id = reg.add(100).unwrap();
        assert_eq!(id, 0);
        assert_eq!(reg.entries.len(), FIRST_GROWTH);
        assert_eq!(ledger.current(), 100);
    }

    #[test]
    fn foreign_removal_keeps_caller_storage_alive() {
        let (mut reg, ledger) = registry();
        let shared = SharedBuffer::with_capacity(100).unwrap();
        shared.lock().extend_from_slice(b"kept");
        let id = reg.add_foreign(shared.clone()).unwrap();
        assert_eq!(id, 0);
        assert_eq!(ledger.current(), 0);
        reg.remove(id).unwrap();
        assert_eq!(shared.contents(), Bytes::from_static(b"kept"));
        assert_eq!(reg.in_use(), 0);
    }

    #[test]
    fn removed_ids_are_reused_lowest_first() {
        let (mut reg, _) = registry();
        let a = reg.add(8).unwrap();
        let b = reg.add(8).unwrap();
        assert_eq!((a, b), (0, 1));
        reg.remove(a).unwrap();
        assert_eq!(reg.add(8).unwrap(), 0);
    }

    #[test]
    fn remove_of_open_or_out_of_range_id_is_rejected() {
        let (mut reg, _) = registry();
        assert!(matches!(
            reg.remove(3),
            Err(Error::UnknownPersistentBuffer(3))
        ));
        let id = reg.add(8).unwrap();
        reg.remove(id).unwrap();
        assert!(matches!(
            reg.remove(id),
            Err(Error::UnknownPersistentBuffer(0))
        ));
    }

    #[test]
    fn owned_removal_settles_the_ledger() {
        let (mut reg, ledger) = registry();
        let id = reg.add(4096).unwrap();
        assert_eq!(ledger.current(), 4096);
        reg.remove(id).unwrap();
        assert_eq!(ledger.current(), 0);
    }

    #[test]
    fn table_growth_doubles_and_respects_the_ceiling() {
        let (mut reg, _) = registry();
        reg.ensure_capacity(MAX_PERSISTENT_BUFFERS + 1);
        assert_eq!(reg.entries.len(), MAX_PERSISTENT_BUFFERS);
        for entry in &mut reg.entries {
            *entry = Entry::Foreign(SharedBuffer::with_capacity(0).unwrap());
        }
        assert!(matches!(reg.add(1), Err(Error::RegistryFull { .. })));
    }

    #[test]
    fn attach_rejects_open_ids() {
        let (mut reg, _) = registry();
        reg.ensure_capacity(4);
        assert!(reg.attach(2).is_err());
        let id = reg.add(16).unwrap();
        assert_eq!(reg.attach(id).unwrap().capacity(), 16);
    }
}
