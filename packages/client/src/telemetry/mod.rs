//! Pool statistics and per-transfer metrics
//!
//! `PoolStats` is the cheap always-available counter snapshot. The
//! per-transfer table is recomputed wholesale on every tick when metrics are
//! enabled, independent of the event stream.

use std::time::Duration;

use crate::pool::Handle;

/// Point-in-time view of the pool.
#[derive(Debug, Clone, serde::Serialize)]
pub struct PoolStats {
    /// Occupied slots.
    pub requests: usize,
    /// Occupied slots whose exchange has not completed.
    pub active: usize,
    /// Pool capacity.
    pub max: usize,
    /// Allocated response-buffer bytes across the pool and the registry.
    pub buffer_bytes: u64,
}

/// Progress metrics for one in-flight transfer.
#[derive(Debug, Clone, serde::Serialize)]
pub struct TransferMetrics {
    pub handle: Handle,
    pub url: String,
    pub mime: Option<String>,
    /// Seconds since submission.
    pub elapsed_secs: f64,
    /// Body bytes buffered so far.
    pub bytes_read: u64,
    /// Total body size, when a Content-Length header provided one.
    pub total_bytes: Option<u64>,
    /// Observed throughput; 0 until any bytes arrive.
    pub bytes_per_second: f64,
    /// Estimated seconds remaining; 0 when the rate or total is unknown.
    pub eta_secs: f64,
}

impl TransferMetrics {
    pub(crate) fn compute(
        handle: Handle,
        url: String,
        mime: Option<String>,
        elapsed: Duration,
        bytes_read: u64,
        total_bytes: Option<u64>,
    ) -> Self {
        let elapsed_secs = elapsed.as_secs_f64();
        // Precision loss acceptable for progress reporting
        #[allow(clippy::cast_precision_loss)]
        let bytes_per_second = if bytes_read > 0 && elapsed_secs > 0.0 {
            bytes_read as f64 / elapsed_secs
        } else {
            0.0
        };
        #[allow(clippy::cast_precision_loss)]
        let eta_secs = match total_bytes {
            Some(total) if total > bytes_read && bytes_per_second > 0.0 => {
                (total - bytes_read) as f64 / bytes_per_second
            }
            _ => 0.0,
        };
        Self {
            handle,
            url,
            mime,
            elapsed_secs,
            bytes_read,
            total_bytes,
            bytes_per_second,
            eta_secs,
        }
    }
}

/// Slot-indexed metrics table, rebuilt each tick.
pub(crate) struct MetricsTable {
    entries: Vec<Option<TransferMetrics>>,
}

impl MetricsTable {
    pub(crate) fn new(capacity: usize) -> Self {
        let mut entries = Vec::with_capacity(capacity);
        entries.resize_with(capacity, || None);
        Self { entries }
    }

    /// Drop every entry ahead of a recompute.
    pub(crate) fn reset(&mut self) {
        for entry in &mut self.entries {
            *entry = None;
        }
    }

    pub(crate) fn set(&mut self, metrics: TransferMetrics) {
        let index = metrics.handle.index();
        if let Some(entry) = self.entries.get_mut(index) {
            *entry = Some(metrics);
        }
    }

    pub(crate) fn clear_slot(&mut self, index: usize) {
        if let Some(entry) = self.entries.get_mut(index) {
            *entry = None;
        }
    }

    /// The entry for `handle`, if it is current.
    pub(crate) fn get(&self, handle: Handle) -> Option<&TransferMetrics> {
        self.entries
            .get(handle.index())
            .and_then(Option::as_ref)
            .filter(|m| m.handle == handle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rate_and_eta_from_known_totals() {
        let m = TransferMetrics::compute(
            Handle::new(0, 0),
            "http://example.com/f".into(),
            Some("application/octet-stream".into()),
            Duration::from_secs(2),
            1000,
            Some(3000),
        );
        assert!((m.bytes_per_second - 500.0).abs() < f64::EPSILON);
        assert!((m.eta_secs - 4.0).abs() < f64::EPSILON);
        assert!((m.elapsed_secs - 2.0).abs() < f64::EPSILON);
    }

    #[test]
    fn no_bytes_means_zero_rate_and_eta() {
        let m = TransferMetrics::compute(
            Handle::new(1, 0),
            "http://example.com/".into(),
            None,
            Duration::from_secs(5),
            0,
            Some(1000),
        );
        assert_eq!(m.bytes_per_second, 0.0);
        assert_eq!(m.eta_secs, 0.0);
    }

    #[test]
    fn unknown_total_means_zero_eta() {
        let m = TransferMetrics::compute(
            Handle::new(1, 0),
            "http://example.com/".into(),
            None,
            Duration::from_secs(1),
            512,
            None,
        );
        assert!(m.bytes_per_second > 0.0);
        assert_eq!(m.eta_secs, 0.0);
    }

    #[test]
    fn stale_handles_read_nothing_from_the_table() {
        let mut table = MetricsTable::new(4);
        let live = Handle::new(2, 1);
        table.set(TransferMetrics::compute(
            live,
            "http://example.com/".into(),
            None,
            Duration::from_secs(1),
            10,
            None,
        ));
        assert!(table.get(live).is_some());
        assert!(table.get(Handle::new(2, 0)).is_none());
        assert!(table.get(Handle::new(3, 1)).is_none());
    }
}
