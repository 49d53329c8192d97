//! The per-tick update loop
//!
//! One caller thread advances every occupied slot once per call: reclaim
//! finished slots, refresh status and header-derived fields from the
//! transport, then let the event layer diff and fire. Event handlers run
//! synchronously in slot order and must not re-enter `tick()`.

use crate::events::Observed;
use crate::pool::Handle;
use crate::telemetry::TransferMetrics;

use super::FytchClient;
use super::lock;

enum Step {
    Reclaim,
    Observe(Observed),
}

impl FytchClient {
    /// Advance every in-flight request one step.
    pub fn tick(&self) {
        for slot in self.pool.snapshot() {
            let handle = slot.handle;
            let step = {
                let mut core = slot.lock();
                if core.complete && core.released {
                    Step::Reclaim
                } else {
                    if let Some(exchange) = core.exchange.as_ref() {
                        let status = exchange.status();
                        // header-derived fields become meaningful once body
                        // bytes have started arriving
                        let content_length = if core.headers_done && core.content_length.is_none() {
                            exchange
                                .header("content-length")
                                .and_then(|v| v.trim().parse().ok())
                        } else {
                            None
                        };
                        let mime = if core.headers_done && core.mime.is_none() {
                            exchange.header("content-type")
                        } else {
                            None
                        };
                        let is_complete = exchange.is_complete();

                        if let Some(status) = status {
                            core.status = status;
                        }
                        if content_length.is_some() {
                            core.content_length = content_length;
                        }
                        if mime.is_some() {
                            core.mime = mime;
                        }
                        if is_complete {
                            core.complete = true;
                        }
                    }
                    Step::Observe(Observed {
                        status: core.status,
                        headers_done: core.headers_done,
                        content_length: core.content_length,
                        mime: core.mime.clone(),
                        bytes_read: core.bytes_read,
                        complete: core.complete,
                    })
                }
            };
            match step {
                Step::Reclaim => self.reclaim(handle),
                Step::Observe(observed) => {
                    let completed = lock(&self.events).dispatch(&slot, &observed);
                    if completed {
                        slot.lock().released = true;
                        tracing::trace!(%handle, "request auto-released after completion");
                    }
                }
            }
        }
        if self.config.metrics {
            self.recompute_metrics();
        }
        if let Some(delay) = self.config.tick_delay {
            std::thread::sleep(delay);
        }
    }

    /// Tear down every slot: finished or not, the exchange is closed and the
    /// pool emptied.
    pub fn shutdown(&self) {
        for slot in self.pool.snapshot() {
            let handle = slot.handle;
            if let Some(slot) = self.pool.free(handle) {
                slot.lock().teardown();
            }
            lock(&self.events).drop_slot(handle.index());
        }
        lock(&self.metrics).reset();
        tracing::debug!("request pool shut down");
    }

    fn reclaim(&self, handle: Handle) {
        if let Some(slot) = self.pool.free(handle) {
            slot.lock().teardown();
        }
        lock(&self.events).drop_slot(handle.index());
        lock(&self.metrics).clear_slot(handle.index());
    }

    fn recompute_metrics(&self) {
        let mut table = lock(&self.metrics);
        table.reset();
        for slot in self.pool.snapshot() {
            let (mime, bytes_read, total_bytes) = {
                let core = slot.lock();
                (core.mime.clone(), core.bytes_read, core.content_length)
            };
            table.set(TransferMetrics::compute(
                slot.handle,
                slot.url.to_string(),
                mime,
                slot.started_at.elapsed(),
                bytes_read,
                total_bytes,
            ));
        }
    }
}
