//! Gateway daemon loop

use tokio_util::sync::CancellationToken;

use adbr_core::error::SnapshotError;
use adbr_core::snapshot::SnapshotStore;
use adbr_core::traits::{BridgeControl, DeviceEnumerator};
use adbr_core::types::ExposedDevice;

use crate::scheduler::Scheduler;
use crate::session::{PassReport, SessionReconciler};

/// Runs reconciliation passes until cancelled
pub struct GatewayDaemon<B, S> {
    reconciler: SessionReconciler<B, S>,
    scheduler: Scheduler,
}

impl<B, S> GatewayDaemon<B, S>
where
    B: DeviceEnumerator + BridgeControl,
    S: SnapshotStore<ExposedDevice>,
{
    pub fn new(reconciler: SessionReconciler<B, S>, scheduler: Scheduler) -> Self {
        Self {
            reconciler,
            scheduler,
        }
    }

    /// Run until `cancel` fires or the scheduler runs dry.
    ///
    /// Startup clears the snapshot and runs one pass immediately. Each tick
    /// runs one pass to completion before the next tick is taken. On exit
    /// every session is released and an empty snapshot is written.
    ///
    /// Only snapshot writes at startup and shutdown are fatal; a failed pass
    /// is logged and the loop carries on.
    pub async fn run(mut self, cancel: CancellationToken) -> Result<(), SnapshotError> {
        self.reconciler.reset_snapshot().await?;
        tracing::info!(
            "Gateway daemon started on {}, polling for devices",
            self.reconciler.settings().bind_address
        );

        self.run_pass().await;

        loop {
            tokio::select! {
                biased;

                _ = cancel.cancelled() => {
                    tracing::info!("Shutdown requested");
                    break;
                }

                tick = self.scheduler.tick() => {
                    let Some(tick) = tick else {
                        tracing::debug!("Scheduler closed");
                        break;
                    };
                    let report = self.run_pass().await;
                    if let Some(reply) = tick.reply {
                        let _ = reply.send(report);
                    }
                }
            }
        }

        self.reconciler.shutdown().await?;
        tracing::info!("Gateway daemon stopped");
        Ok(())
    }

    async fn run_pass(&mut self) -> Option<PassReport> {
        match self.reconciler.pass().await {
            Ok(report) => {
                if report.is_quiet() {
                    tracing::trace!("Pass complete, {} device(s) exposed", report.published);
                } else {
                    tracing::debug!(
                        "Pass complete: {} added, {} removed, {} failed, {} exposed",
                        report.added.len(),
                        report.removed.len(),
                        report.failed.len(),
                        report.published
                    );
                }
                Some(report)
            }
            Err(e) => {
                tracing::warn!("Reconciliation pass abandoned: {}", e);
                None
            }
        }
    }
}
