//! Pool-wide defaults, mirrored from the reference scheduler's `config.h`.

use std::time::Duration;

/// Maximum number of task records the pool holds at once.
pub const MAX_TASKS: usize = 100;

/// Default number of worker processes the supervisor spawns.
pub const NUM_WORKERS: u32 = 3;

/// Default retry ceiling before a task is abandoned permanently.
pub const MAX_RETRIES: u32 = 3;

/// How often the supervisor reaps/respawns workers.
pub const WORKER_CHECK_INTERVAL: Duration = Duration::from_secs(5);

/// How often the supervisor compacts terminal tasks out of the pool.
pub const CLEANUP_INTERVAL: Duration = Duration::from_secs(60);

/// A completed/failed/timed-out task older than this is eligible for
/// compaction.
pub const COMPLETED_TASK_MAX_AGE: Duration = Duration::from_secs(300);

/// How often the supervisor sweeps for tasks that have exceeded their
/// `timeout`.
pub const TASK_TIMEOUT_CHECK_INTERVAL: Duration = Duration::from_secs(2);

/// Timeout applied to a submitted task that does not specify its own
/// (informational default surfaced by the CLI; `0`/`None` still means "no
/// timeout" at the pool level).
pub const DEFAULT_TASK_TIMEOUT_SECONDS: u64 = 300;

/// Runtime configuration for a [`crate::pool::Pool`].
#[derive(Debug, Clone)]
pub struct PoolConfig {
    pub capacity: usize,
    pub max_retries: u32,
    pub num_cpu_cores: usize,
    pub mlfq_time_slice_ms: u64,
}

impl PoolConfig {
    /// Build a config from environment variables, falling back to the
    /// documented defaults when unset.
    ///
    /// Recognized variables: `TASKPOOL_CAPACITY`, `TASKPOOL_MAX_RETRIES`,
    /// `TASKPOOL_MLFQ_TIME_SLICE_MS`.
    pub fn from_env() -> Self {
        let capacity = env_usize("TASKPOOL_CAPACITY", MAX_TASKS);
        let max_retries = env_u32("TASKPOOL_MAX_RETRIES", MAX_RETRIES);
        let mlfq_time_slice_ms =
            env_u64("TASKPOOL_MLFQ_TIME_SLICE_MS", crate::policy::mlfq::DEFAULT_TIME_SLICE_MS);
        let num_cpu_cores = detect_cpu_cores();
        Self {
            capacity,
            max_retries,
            num_cpu_cores,
            mlfq_time_slice_ms,
        }
    }
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            capacity: MAX_TASKS,
            max_retries: MAX_RETRIES,
            num_cpu_cores: detect_cpu_cores(),
            mlfq_time_slice_ms: crate::policy::mlfq::DEFAULT_TIME_SLICE_MS,
        }
    }
}

fn detect_cpu_cores() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

fn env_usize(name: &str, default: usize) -> usize {
    std::env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_u32(name: &str, default: u32) -> u32 {
    std::env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_u64(name: &str, default: u64) -> u64 {
    std::env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_uses_documented_constants() {
        let cfg = PoolConfig::default();
        assert_eq!(cfg.capacity, MAX_TASKS);
        assert_eq!(cfg.max_retries, MAX_RETRIES);
        assert!(cfg.num_cpu_cores >= 1);
    }
}
