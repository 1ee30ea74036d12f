//! Timeout scheduler: expires pending evidence independently of new arrivals.
//!
//! Complementary actions that never complete are dropped here, silently. The
//! sweep runs through `FusionCorrelator::sweep`, which uses the same shard
//! locks as ingest.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info};

use mmi_fusion_core::CorrelatorCfg;

use crate::correlator::{FusionCorrelator, SweepReport};

/// Shortest allowed sweep period.
const MIN_SWEEP_INTERVAL: Duration = Duration::from_millis(1);

/// Periodic sweeper for a `FusionCorrelator`.
#[derive(Debug, Clone)]
pub struct TimeoutScheduler {
    correlator: Arc<FusionCorrelator>,
    period: Duration,
}

impl TimeoutScheduler {
    pub fn new(correlator: Arc<FusionCorrelator>, period: Duration) -> Self {
        Self {
            correlator,
            period: period.max(MIN_SWEEP_INTERVAL),
        }
    }

    pub fn from_cfg(correlator: Arc<FusionCorrelator>, cfg: &CorrelatorCfg) -> Self {
        Self::new(correlator, Duration::from_millis(cfg.sweep_interval_ms))
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    /// One sweep at the correlator clock's current instant.
    pub fn tick(&self) -> SweepReport {
        let report = self.correlator.sweep();
        if report.expired > 0 {
            debug!(expired = report.expired, released = report.released, at = %report.at, "timeout sweep");
        }
        report
    }

    /// Run `tick` every period on the current tokio runtime until the handle
    /// is shut down or dropped.
    pub fn spawn(self) -> SchedulerHandle {
        let (stop_tx, mut stop_rx) = oneshot::channel::<()>();

        let join = tokio::spawn(async move {
            info!(period_ms = self.period.as_millis() as u64, "timeout scheduler started");
            let mut ticker = interval(self.period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        self.tick();
                    }
                    // fires on explicit shutdown and when the handle is dropped
                    _ = &mut stop_rx => break,
                }
            }

            info!("timeout scheduler stopped");
        });

        SchedulerHandle { stop_tx, join }
    }
}

/// Owner of a running scheduler task. Dropping it stops the task.
#[derive(Debug)]
pub struct SchedulerHandle {
    stop_tx: oneshot::Sender<()>,
    join: JoinHandle<()>,
}

impl SchedulerHandle {
    /// Stop the sweeper and wait for it to exit.
    pub async fn shutdown(self) {
        let _ = self.stop_tx.send(());
        let _ = self.join.await;
    }

    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }
}
