//! Periodic pool maintenance: stale worker reaping, terminal-task
//! compaction, timeout sweeps, and MLFQ aging, each on its own clock as
//! described for the supervisor's monitor loop.

use std::time::Duration;

use taskpool_core::Pool;
use tokio::time::{interval, MissedTickBehavior};
use tracing::info;
use tokio_util::sync::CancellationToken;

use crate::process_mgr::WorkerPool;

pub struct HousekeepingIntervals {
    pub worker_check: Duration,
    pub cleanup: Duration,
    pub timeout_check: Duration,
}

impl Default for HousekeepingIntervals {
    fn default() -> Self {
        Self {
            worker_check: taskpool_core::config::WORKER_CHECK_INTERVAL,
            cleanup: taskpool_core::config::CLEANUP_INTERVAL,
            timeout_check: taskpool_core::config::TASK_TIMEOUT_CHECK_INTERVAL,
        }
    }
}

/// Run the housekeeping ticks until `cancel` fires. Exits after sending
/// a final termination pass to every worker.
pub async fn run(
    pool: Pool,
    mut workers: WorkerPool,
    intervals: HousekeepingIntervals,
    cancel: CancellationToken,
) {
    let mut worker_tick = interval(intervals.worker_check);
    worker_tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut cleanup_tick = interval(intervals.cleanup);
    cleanup_tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut timeout_tick = interval(intervals.timeout_check);
    timeout_tick.set_missed_tick_behavior(MissedTickBehavior::Delay);

    workers.spawn_missing();

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = worker_tick.tick() => {
                workers.reap_and_recover(&pool).await;
                workers.spawn_missing();
                let active = workers.count_responsive();
                info!(active_workers = active, "worker check");
                // Reconcile the pool's counter with what we actually observed;
                // workers report online/offline themselves too, but a crash
                // between those reports and the next reap would otherwise drift.
                let stats = pool.snapshot().await.stats;
                if stats.num_active_workers != active {
                    info!(reported = stats.num_active_workers, observed = active, "worker count drifted");
                }
            }
            _ = cleanup_tick.tick() => {
                let removed = pool.compact(taskpool_core::config::COMPLETED_TASK_MAX_AGE).await;
                if removed > 0 {
                    info!(removed, "compacted terminal tasks");
                }
            }
            _ = timeout_tick.tick() => {
                let touched = pool.check_timeouts().await;
                if touched > 0 {
                    info!(touched, "swept timed-out tasks");
                }
                pool.promote_aged().await;
            }
        }
    }

    info!("housekeeping shutting down, terminating workers");
    pool.shutdown().await;
    workers.terminate_all().await;
}
