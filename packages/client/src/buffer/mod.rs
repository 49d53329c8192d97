//! Response buffer management
//!
//! Every in-flight request owns (or borrows) one [`BodyBuffer`] that body
//! bytes stream into. The buffer's [`GrowthPolicy`] decides what happens when
//! the write cursor reaches capacity: stop accepting, flush and rewind, or
//! reallocate. All growth is fallible; a failed reallocation force-completes
//! the owning request instead of aborting the process.

pub mod flush;
pub mod registry;

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use bytes::Bytes;

use crate::error::{Error, Result};
use self::registry::SharedBuffer;

/// Global accounting of allocated response-buffer bytes, shared by the pool
/// and the persistent buffer registry.
#[derive(Debug, Default)]
pub struct ByteLedger(AtomicU64);

impl ByteLedger {
    /// Create an empty ledger.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn add(&self, bytes: u64) {
        self.0.fetch_add(bytes, Ordering::Relaxed);
    }

    pub(crate) fn sub(&self, bytes: u64) {
        self.0.fetch_sub(bytes, Ordering::Relaxed);
    }

    /// Currently accounted buffer bytes.
    #[must_use]
    pub fn current(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }
}

/// Buffer behavior requested at submission time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BufferPlan {
    /// Grow without bound, starting from the pool's configured read buffer
    /// size.
    #[default]
    Default,
    /// Grow without bound from an explicit initial capacity.
    Grow { initial: usize },
    /// Double up to `limit`, then grow by `limit`-sized increments.
    GrowBounded { initial: usize, limit: usize },
    /// Never grow; stop accepting body bytes once full.
    Fixed { capacity: usize },
    /// Flush through the request's [`flush::FlushSink`] and rewind whenever
    /// the buffer fills.
    ReuseWithFlush { capacity: usize },
    /// Borrow a registered persistent buffer instead of allocating one.
    Persistent { id: usize },
}

/// How a buffer reacts to its write cursor reaching capacity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GrowthPolicy {
    /// Double the capacity each time the buffer fills.
    Unbounded,
    /// Double while below `limit` (capped at `limit`), then grow by exactly
    /// `limit` per step.
    Bounded { limit: usize },
    /// Accept no further bytes once full.
    Fixed,
    /// Hand the full buffer to the flush callback, rewind, keep accepting.
    ReuseWithFlush,
    /// Registry-shared storage; behaves as [`GrowthPolicy::Fixed`]. The
    /// registry, not the request, controls the storage's lifetime.
    Persistent,
}

/// Outcome of one streaming write into a buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum WriteOutcome {
    /// Bytes consumed. A count short of the input length tells the transport
    /// to stop delivering body data for this request.
    Accepted(usize),
    /// Reallocation failed after consuming `accepted` bytes; the buffer is
    /// closed for writing.
    GrowFailed { accepted: usize },
}

enum Storage {
    Owned(Vec<u8>),
    Shared(SharedBuffer),
}

/// A single request's response buffer: contiguous storage, a write cursor
/// (the storage length), and a logical capacity governed by the growth
/// policy.
pub(crate) struct BodyBuffer {
    storage: Storage,
    policy: GrowthPolicy,
    capacity: usize,
    ledger: Arc<ByteLedger>,
    retired: bool,
}

impl BodyBuffer {
    /// Allocate a privately owned buffer.
    pub(crate) fn owned(
        initial: usize,
        policy: GrowthPolicy,
        ledger: Arc<ByteLedger>,
    ) -> Result<Self> {
        // zero-size growable buffers would never make progress
        let capacity = initial.max(1);
        let mut data = Vec::new();
        if data.try_reserve_exact(capacity).is_err() {
            return Err(Error::BufferAllocationFailure { capacity });
        }
        ledger.add(capacity as u64);
        Ok(Self {
            storage: Storage::Owned(data),
            policy,
            capacity,
            ledger,
            retired: false,
        })
    }

    /// Borrow registry-shared storage. The write cursor rewinds to zero so
    /// the new request overwrites whatever a previous tenant left behind.
    pub(crate) fn shared(buffer: SharedBuffer, ledger: Arc<ByteLedger>) -> Self {
        buffer.clear();
        let capacity = buffer.capacity();
        Self {
            storage: Storage::Shared(buffer),
            policy: GrowthPolicy::Persistent,
            capacity,
            ledger,
            retired: false,
        }
    }

    pub(crate) fn policy(&self) -> GrowthPolicy {
        self.policy
    }

    pub(crate) fn capacity(&self) -> usize {
        self.capacity
    }

    pub(crate) fn len(&self) -> usize {
        match &self.storage {
            Storage::Owned(data) => data.len(),
            Storage::Shared(shared) => shared.len(),
        }
    }

    /// Append `src`, splitting the copy at capacity boundaries and applying
    /// the growth policy whenever the cursor reaches capacity. `on_full`
    /// receives the full buffer contents before a flush-and-rewind.
    pub(crate) fn write(
        &mut self,
        src: &[u8],
        on_full: &mut dyn FnMut(&[u8]),
    ) -> WriteOutcome {
        if self.retired {
            return WriteOutcome::Accepted(0);
        }
        let policy = self.policy;
        let capacity = &mut self.capacity;
        let ledger = &self.ledger;
        match &mut self.storage {
            Storage::Owned(data) => write_loop(data, capacity, policy, ledger, src, on_full),
            Storage::Shared(shared) => {
                let mut data = shared.lock();
                write_loop(&mut data, capacity, policy, ledger, src, on_full)
            }
        }
    }

    /// Copy out up to `max` bytes from the front of the buffered content.
    pub(crate) fn read(&self, max: usize) -> Bytes {
        match &self.storage {
            Storage::Owned(data) => Bytes::copy_from_slice(&data[..max.min(data.len())]),
            Storage::Shared(shared) => {
                let data = shared.lock();
                Bytes::copy_from_slice(&data[..max.min(data.len())])
            }
        }
    }

    /// Detached copy of the full buffered content.
    pub(crate) fn snapshot(&self) -> Bytes {
        self.read(usize::MAX)
    }

    /// Release owned storage and settle the ledger. Shared storage stays
    /// alive with the registry (and any caller clones). Idempotent.
    pub(crate) fn retire(&mut self) {
        if self.retired {
            return;
        }
        if matches!(self.storage, Storage::Owned(_)) {
            self.ledger.sub(self.capacity as u64);
            self.storage = Storage::Owned(Vec::new());
        }
        self.capacity = 0;
        self.retired = true;
    }
}

impl Drop for BodyBuffer {
    fn drop(&mut self) {
        self.retire();
    }
}

fn write_loop(
    data: &mut Vec<u8>,
    capacity: &mut usize,
    policy: GrowthPolicy,
    ledger: &ByteLedger,
    src: &[u8],
    on_full: &mut dyn FnMut(&[u8]),
) -> WriteOutcome {
    let mut written = 0;
    while written < src.len() {
        let room = *capacity - data.len();
        let take = room.min(src.len() - written);
        data.extend_from_slice(&src[written..written + take]);
        written += take;
        if data.len() < *capacity {
            continue;
        }
        let target = match policy {
            GrowthPolicy::Fixed | GrowthPolicy::Persistent => return WriteOutcome::Accepted(written),
            GrowthPolicy::ReuseWithFlush => {
                on_full(data.as_slice());
                data.clear();
                continue;
            }
            GrowthPolicy::Unbounded => *capacity * 2,
            GrowthPolicy::Bounded { limit } => {
                if *capacity < limit {
                    (*capacity * 2).min(limit)
                } else {
                    *capacity + limit
                }
            }
        };
        if data.try_reserve_exact(target - data.len()).is_err() {
            tracing::warn!(capacity = target, "response buffer growth failed");
            return WriteOutcome::GrowFailed { accepted: written };
        }
        ledger.add((target - *capacity) as u64);
        tracing::trace!(from = *capacity, to = target, "response buffer grown");
        *capacity = target;
    }
    WriteOutcome::Accepted(written)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ledger() -> Arc<ByteLedger> {
        Arc::new(ByteLedger::new())
    }

    fn no_flush() -> impl FnMut(&[u8]) {
        |_: &[u8]| {}
    }

    #[test]
    fn fixed_buffer_stops_at_capacity() {
        let mut buf = BodyBuffer::owned(1024, GrowthPolicy::Fixed, ledger()).unwrap();
        let outcome = buf.write(&[0xAB; 2048], &mut no_flush());
        assert_eq!(outcome, WriteOutcome::Accepted(1024));
        assert_eq!(buf.len(), 1024);
        assert_eq!(buf.capacity(), 1024);
        // a closed-out buffer accepts nothing further
        let outcome = buf.write(&[0xCD; 16], &mut no_flush());
        assert_eq!(outcome, WriteOutcome::Accepted(0));
    }

    #[test]
    fn unbounded_buffer_doubles_once_for_modest_overflow() {
        let ledger = ledger();
        let mut buf =
            BodyBuffer::owned(16_384, GrowthPolicy::Unbounded, Arc::clone(&ledger)).unwrap();
        let outcome = buf.write(&vec![7u8; 20_000], &mut no_flush());
        assert_eq!(outcome, WriteOutcome::Accepted(20_000));
        assert_eq!(buf.capacity(), 32_768);
        assert_eq!(ledger.current(), 32_768);
    }

    #[test]
    fn unbounded_capacity_after_n_growths_is_exact() {
        let mut buf = BodyBuffer::owned(16, GrowthPolicy::Unbounded, ledger()).unwrap();
        buf.write(&[1u8; 100], &mut no_flush());
        // 16 -> 32 -> 64 -> 128: initial * 2^3
        assert_eq!(buf.capacity(), 128);
        assert_eq!(buf.len(), 100);
    }

    #[test]
    fn bounded_buffer_doubles_to_limit_then_steps_by_limit() {
        let mut buf =
            BodyBuffer::owned(16, GrowthPolicy::Bounded { limit: 48 }, ledger()).unwrap();
        let mut capacities = Vec::new();
        for _ in 0..5 {
            let len = buf.len();
            buf.write(&vec![0u8; buf.capacity() - len + 1], &mut no_flush());
            capacities.push(buf.capacity());
        }
        // 16 -> 32 -> 48 (capped), then +48 per step
        assert_eq!(capacities, vec![32, 48, 96, 144, 192]);
    }

    #[test]
    fn reuse_with_flush_rewinds_and_keeps_accepting() {
        let mut flushed: Vec<Vec<u8>> = Vec::new();
        let mut buf = BodyBuffer::owned(8, GrowthPolicy::ReuseWithFlush, ledger()).unwrap();
        let outcome = buf.write(&[9u8; 20], &mut |payload| flushed.push(payload.to_vec()));
        assert_eq!(outcome, WriteOutcome::Accepted(20));
        assert_eq!(flushed.len(), 2);
        assert!(flushed.iter().all(|p| p.len() == 8));
        // the tail stays buffered
        assert_eq!(buf.len(), 4);
        assert_eq!(buf.capacity(), 8);
    }

    #[test]
    fn split_copy_across_capacity_boundary_loses_nothing() {
        let mut flushed = Vec::new();
        let mut buf = BodyBuffer::owned(4, GrowthPolicy::ReuseWithFlush, ledger()).unwrap();
        let payload: Vec<u8> = (0u8..10).collect();
        buf.write(&payload, &mut |p: &[u8]| flushed.extend_from_slice(p));
        let mut seen = flushed.clone();
        seen.extend_from_slice(&buf.snapshot());
        assert_eq!(seen, payload);
    }

    #[test]
    fn retire_settles_the_ledger() {
        let ledger = ledger();
        let mut buf = BodyBuffer::owned(512, GrowthPolicy::Fixed, Arc::clone(&ledger)).unwrap();
        assert_eq!(ledger.current(), 512);
        buf.retire();
        assert_eq!(ledger.current(), 0);
        // idempotent
        buf.retire();
        assert_eq!(ledger.current(), 0);
    }

    #[test]
    fn drop_settles_the_ledger() {
        let ledger = ledger();
        {
            let _buf =
                BodyBuffer::owned(256, GrowthPolicy::Unbounded, Arc::clone(&ledger)).unwrap();
            assert_eq!(ledger.current(), 256);
        }
        assert_eq!(ledger.current(), 0);
    }

    #[test]
    fn shared_buffer_behaves_as_fixed_and_leaves_ledger_alone() {
        let ledger = ledger();
        let shared = SharedBuffer::with_capacity(16).unwrap();
        let mut buf = BodyBuffer::shared(shared.clone(), Arc::clone(&ledger));
        assert_eq!(buf.policy(), GrowthPolicy::Persistent);
        let outcome = buf.write(&[3u8; 64], &mut no_flush());
        assert_eq!(outcome, WriteOutcome::Accepted(16));
        assert_eq!(ledger.current(), 0);
        // the caller's clone observes what the request wrote
        assert_eq!(shared.contents(), Bytes::from_static(&[3u8; 16]));
        buf.retire();
        assert_eq!(shared.len(), 16);
    }
}
