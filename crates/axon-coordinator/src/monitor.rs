use crate::engine::{ActiveTable, CoordinatorConfig, HistoryList};
use crate::types::WorkflowStatus;
use chrono::Utc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Recurring background sweep that reclaims executions the run loop never
/// finalized in time and keeps the history list bounded.
///
/// Each cycle force-fails every active execution older than its configured
/// `max_duration` — independent of whether its run task is still executing
/// — moves it to history, then evicts the oldest history entries beyond
/// the cap. A cycle that cannot take the tables without waiting is skipped
/// and the next sweep is delayed by the backoff interval instead.
pub(crate) struct StuckWorkflowMonitor {
    active: ActiveTable,
    history: HistoryList,
    interval: Duration,
    backoff: Duration,
    max_history: usize,
}

/// Controls a running monitor task. Dropping the handle stops the sweep.
pub struct MonitorHandle {
    stop: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

impl MonitorHandle {
    /// Signal the monitor task to stop after its current cycle.
    pub fn stop(&self) {
        let _ = self.stop.send(true);
    }

    /// Wait for the monitor task to finish.
    pub async fn join(self) {
        let _ = self.handle.await;
    }
}

enum SweepOutcome {
    Swept { reclaimed: usize, evicted: usize },
    Contended,
}

impl StuckWorkflowMonitor {
    pub(crate) fn new(
        active: ActiveTable,
        history: HistoryList,
        config: CoordinatorConfig,
    ) -> Self {
        Self {
            active,
            history,
            interval: config.monitor_interval,
            backoff: config.monitor_backoff,
            max_history: config.max_history,
        }
    }

    /// Spawn the sweep loop.
    pub(crate) fn spawn(self) -> MonitorHandle {
        let (stop, mut stop_rx) = watch::channel(false);
        let handle = tokio::spawn(async move {
            loop {
                let delay = match self.sweep() {
                    SweepOutcome::Swept { reclaimed, evicted } => {
                        if reclaimed > 0 || evicted > 0 {
                            info!(reclaimed, evicted, "Stuck-workflow sweep finished");
                        }
                        self.interval
                    }
                    SweepOutcome::Contended => {
                        warn!("Stuck-workflow sweep skipped: tables busy, backing off");
                        self.backoff
                    }
                };
                tokio::select! {
                    _ = tokio::time::sleep(delay) => {}
                    changed = stop_rx.changed() => {
                        if changed.is_err() || *stop_rx.borrow() {
                            debug!("Stuck-workflow monitor stopping");
                            break;
                        }
                    }
                }
            }
        });
        MonitorHandle { stop, handle }
    }

    fn sweep(&self) -> SweepOutcome {
        let Ok(mut active) = self.active.try_write() else {
            return SweepOutcome::Contended;
        };
        let Ok(mut history) = self.history.try_write() else {
            return SweepOutcome::Contended;
        };

        let now = Utc::now();
        let overdue: Vec<Uuid> = active
            .values()
            .filter(|execution| execution.age_secs(now) > execution.config.max_duration as f64)
            .map(|execution| execution.id)
            .collect();
        let reclaimed = overdue.len();

        for id in overdue {
            if let Some(mut execution) = active.remove(&id) {
                warn!(
                    workflow_id = %id,
                    age_secs = execution.age_secs(now),
                    max_duration = execution.config.max_duration,
                    "Workflow exceeded maximum duration, force-failing"
                );
                execution.status = WorkflowStatus::Failed;
                execution.ended_at = Some(now);
                history.push(execution);
            }
        }

        let evicted = if history.len() > self.max_history {
            let excess = history.len() - self.max_history;
            history.drain(0..excess);
            excess
        } else {
            0
        };

        SweepOutcome::Swept { reclaimed, evicted }
    }
}
