//! Async dashboard orchestrator.
//!
//! Receives filter changes over an `mpsc` channel, recomputes the KPI bundle
//! for the newest one on the blocking pool and sends the result back as a
//! [`DashboardUpdate`]. The store is shared read-only through an `Arc`; no
//! derived data is kept between events.

use std::sync::Arc;

use kpi_core::models::FilterSpec;
use kpi_data::assembler::KpiBundle;
use kpi_data::pipeline::compute_kpis;
use kpi_data::store::TransactionStore;
use tokio::sync::mpsc;

// ── Public types ──────────────────────────────────────────────────────────────

/// One recomputed bundle forwarded to the presentation layer.
#[derive(Debug, Clone)]
pub struct DashboardUpdate {
    /// KPIs for the filter that was applied.
    pub bundle: KpiBundle,
    /// 1-based number of the pass since the loop started.
    pub sequence: u64,
    /// Queued filter events dropped in favour of the newer one.
    pub superseded: usize,
}

// ── DashboardOrchestrator ─────────────────────────────────────────────────────

/// Background recomputation loop.
///
/// Call [`DashboardOrchestrator::start`] to spawn the loop and obtain the
/// channel endpoints.
pub struct DashboardOrchestrator {
    store: Arc<TransactionStore>,
    /// Capacity of both channels.
    buffer: usize,
}

impl DashboardOrchestrator {
    pub fn new(store: Arc<TransactionStore>) -> Self {
        Self { store, buffer: 16 }
    }

    /// Override the channel capacity (minimum 1).
    pub fn with_buffer(mut self, buffer: usize) -> Self {
        self.buffer = buffer.max(1);
        self
    }

    /// Start the loop in a tokio task.
    ///
    /// Returns:
    /// - the `Sender` to push filter changes into; dropping it ends the loop,
    /// - the `Receiver` of [`DashboardUpdate`]s,
    /// - a [`DashboardHandle`] to abort or await the loop.
    pub fn start(
        self,
    ) -> (
        mpsc::Sender<FilterSpec>,
        mpsc::Receiver<DashboardUpdate>,
        DashboardHandle,
    ) {
        let (event_tx, event_rx) = mpsc::channel(self.buffer);
        let (update_tx, update_rx) = mpsc::channel(self.buffer);

        let handle = tokio::spawn(async move {
            self.event_loop(event_rx, update_tx).await;
        });

        (event_tx, update_rx, DashboardHandle { handle })
    }

    // ── Private implementation ────────────────────────────────────────────

    /// Runs until the event channel closes or the update receiver is dropped.
    async fn event_loop(
        self,
        mut events: mpsc::Receiver<FilterSpec>,
        updates: mpsc::Sender<DashboardUpdate>,
    ) {
        let mut sequence = 0u64;

        while let Some(mut filter) = events.recv().await {
            // Only the newest queued filter matters.
            let mut superseded = 0usize;
            while let Ok(newer) = events.try_recv() {
                filter = newer;
                superseded += 1;
            }
            if superseded > 0 {
                tracing::debug!(superseded, "dropped stale filter events");
            }

            let store = Arc::clone(&self.store);
            let bundle =
                match tokio::task::spawn_blocking(move || compute_kpis(&store, &filter)).await {
                    Ok(bundle) => bundle,
                    Err(e) => {
                        tracing::warn!(error = %e, "kpi pass failed; waiting for next filter");
                        continue;
                    }
                };

            sequence += 1;
            let update = DashboardUpdate {
                bundle,
                sequence,
                superseded,
            };
            if updates.send(update).await.is_err() {
                tracing::debug!("update receiver dropped; exiting loop");
                return;
            }
        }

        tracing::debug!("filter channel closed; exiting loop");
    }
}

// ── DashboardHandle ───────────────────────────────────────────────────────────

/// A handle to the background recomputation task.
pub struct DashboardHandle {
    handle: tokio::task::JoinHandle<()>,
}

impl DashboardHandle {
    /// Immediately abort the loop.
    pub fn abort(&self) {
        self.handle.abort();
    }

    /// Wait for the loop to finish on its own.
    pub async fn join(self) {
        if let Err(e) = self.handle.await {
            if !e.is_cancelled() {
                tracing::warn!(error = %e, "dashboard loop ended abnormally");
            }
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
