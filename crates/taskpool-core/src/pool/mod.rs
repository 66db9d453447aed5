//! The shared task pool: the single piece of mutable state a supervisor
//! process owns and every worker reaches through IPC.
//!
//! This stands in for the reference implementation's POSIX shared-memory
//! segment guarded by a process-shared mutex/condvar. Here a coordinator
//! process (the supervisor binary) owns one [`Pool`], guarded by a
//! `tokio::sync::Mutex`, and wakes blocked callers with a `Notify` instead
//! of a condvar broadcast. Worker processes never see this type directly;
//! they talk to it over a Unix socket. See `DESIGN.md` for the rationale.

use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, Notify};

use crate::config::PoolConfig;
use crate::error::PoolError;
use crate::policy::{self, PolicyTunables};
use crate::task::{Algorithm, Task, TaskStatus, MAX_TASK_NAME_LEN};

/// Inputs to [`Pool::submit`].
#[derive(Debug, Clone)]
pub struct SubmitRequest {
    pub name: String,
    pub priority: crate::task::Priority,
    pub execution_time_ms: u64,
    pub gang_id: Option<i64>,
    pub lottery_tickets: Option<u32>,
    pub timeout: Option<StdDuration>,
    /// Interpreted as an offset from the submission instant, not an
    /// absolute timestamp.
    pub deadline_offset: Option<StdDuration>,
}

impl SubmitRequest {
    pub fn new(name: impl Into<String>, priority: crate::task::Priority, execution_time_ms: u64) -> Self {
        Self {
            name: name.into(),
            priority,
            execution_time_ms,
            gang_id: None,
            lottery_tickets: None,
            timeout: None,
            deadline_offset: None,
        }
    }
}

/// Point-in-time counters surfaced by `status`/`snapshot` commands.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoolStats {
    pub size: usize,
    pub capacity: usize,
    pub total_tasks: u64,
    pub completed_tasks: u64,
    pub failed_tasks: u64,
    pub num_active_workers: u32,
    pub algorithm: Algorithm,
}

/// Stats plus every task record, for the CLI's `status --verbose`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoolSnapshot {
    pub stats: PoolStats,
    pub tasks: Vec<Task>,
}

struct PoolInner {
    tasks: Vec<Task>,
    capacity: usize,
    next_task_id: u64,
    total_tasks: u64,
    completed_tasks: u64,
    failed_tasks: u64,
    num_active_workers: u32,
    max_retries: u32,
    algorithm: Algorithm,
    tunables: PolicyTunables,
    shutdown: bool,
}

impl PoolInner {
    fn index_of(&self, task_id: u64) -> Result<usize, PoolError> {
        self.tasks
            .iter()
            .position(|t| t.id == task_id)
            .ok_or(PoolError::NotFound(task_id))
    }
}

/// Shared, mutex-guarded task pool. Cloning a `Pool` is cheap -- it is a
/// handle around an `Arc` -- so every clone observes the same state.
#[derive(Clone)]
pub struct Pool {
    inner: Arc<Mutex<PoolInner>>,
    notify: Arc<Notify>,
}

impl Pool {
    pub fn new(config: PoolConfig) -> Self {
        let inner = PoolInner {
            tasks: Vec::with_capacity(config.capacity),
            capacity: config.capacity,
            next_task_id: 1,
            total_tasks: 0,
            completed_tasks: 0,
            failed_tasks: 0,
            num_active_workers: 0,
            max_retries: config.max_retries,
            algorithm: Algorithm::Priority,
            tunables: PolicyTunables {
                mlfq_time_slice_ms: config.mlfq_time_slice_ms,
                rr_last_index: None,
            },
            shutdown: false,
        };
        Pool {
            inner: Arc::new(Mutex::new(inner)),
            notify: Arc::new(Notify::new()),
        }
    }

    /// Add a new `Pending` task. Fails if the pool is at capacity or the
    /// name is too long; everything else about the request is trusted.
    pub async fn submit(&self, req: SubmitRequest) -> Result<u64, PoolError> {
        if req.name.len() > MAX_TASK_NAME_LEN {
            return Err(PoolError::NameTooLong(MAX_TASK_NAME_LEN));
        }
        let mut inner = self.inner.lock().await;
        if inner.tasks.len() >= inner.capacity {
            return Err(PoolError::QueueFull);
        }
        let id = inner.next_task_id;
        inner.next_task_id += 1;
        let now = Utc::now();
        let mut task = Task::new(id, req.name, req.priority, req.execution_time_ms, now);
        task.gang_id = req.gang_id;
        if let Some(tickets) = req.lottery_tickets {
            task.lottery_tickets = tickets;
        }
        task.timeout = req.timeout;
        task.deadline_time = req
            .deadline_offset
            .and_then(|d| chrono::Duration::from_std(d).ok())
            .map(|d| now + d);
        inner.tasks.push(task);
        inner.total_tasks += 1;
        drop(inner);
        self.notify.notify_waiters();
        Ok(id)
    }

    /// Block until a task is available or the pool is shutting down, then
    /// atomically transition it to `Running` and return a copy.
    ///
    /// Does not assign `worker_id` -- the caller does that in a second,
    /// short critical section via [`Pool::assign_worker`] once it knows
    /// which connection asked, mirroring the reference implementation's
    /// two-phase dequeue/assign.
    pub async fn select_next(&self) -> Option<Task> {
        loop {
            let notified = self.notify.notified();
            {
                let mut inner = self.inner.lock().await;
                if inner.shutdown {
                    return None;
                }
                if let Some(task) = Self::select_locked(&mut inner) {
                    return Some(task);
                }
            }
            notified.await;
        }
    }

    fn select_locked(inner: &mut PoolInner) -> Option<Task> {
        let algorithm = inner.algorithm;
        let mut tunables = inner.tunables;
        let idx = policy::select_index(algorithm, &mut inner.tasks, &mut tunables)?;
        inner.tunables = tunables;
        let now = Utc::now();
        let task = &mut inner.tasks[idx];
        task.status = TaskStatus::Running;
        task.start_time = Some(now);
        if algorithm == Algorithm::Mlfq {
            task.mlfq_level_start = now;
        }
        Some(task.clone())
    }

    /// Start every pending member of `gang_id`, up to `max`, in one
    /// critical section. Only meaningful under [`Algorithm::Gang`].
    pub async fn dequeue_gang(&self, gang_id: i64, max: usize) -> Vec<Task> {
        let mut inner = self.inner.lock().await;
        let indices = policy::gang::dequeue_members(&inner.tasks, gang_id, max);
        let now = Utc::now();
        let mut started = Vec::with_capacity(indices.len());
        for idx in indices {
            let task = &mut inner.tasks[idx];
            task.status = TaskStatus::Running;
            task.start_time = Some(now);
            started.push(task.clone());
        }
        started
    }

    pub async fn gang_size(&self, gang_id: i64) -> usize {
        let inner = self.inner.lock().await;
        policy::gang::gang_size(&inner.tasks, gang_id)
    }

    /// Record which worker picked up a `Running` task.
    pub async fn assign_worker(&self, task_id: u64, worker_id: u32) -> Result<(), PoolError> {
        let mut inner = self.inner.lock().await;
        let idx = inner.index_of(task_id)?;
        let task = &mut inner.tasks[idx];
        if task.status != TaskStatus::Running {
            return Err(PoolError::IllegalTransition {
                task_id,
                reason: format!("cannot assign a worker while status is {}", task.status),
            });
        }
        task.worker_id = Some(worker_id);
        Ok(())
    }

    /// A worker reports the outcome of a task it ran to completion. Only
    /// `Completed` and `Failed` are legal here; timeouts and crashes are
    /// reclaimed by the supervisor via [`Pool::check_timeouts`] and
    /// [`Pool::recover_orphans`] instead.
    pub async fn update_status(&self, task_id: u64, new_status: TaskStatus) -> Result<(), PoolError> {
        if !matches!(new_status, TaskStatus::Completed | TaskStatus::Failed) {
            return Err(PoolError::IllegalTransition {
                task_id,
                reason: format!("workers may only report completed or failed, not {new_status}"),
            });
        }
        let mut inner = self.inner.lock().await;
        let idx = inner.index_of(task_id)?;
        let task = &mut inner.tasks[idx];
        if task.status != TaskStatus::Running {
            return Err(PoolError::IllegalTransition {
                task_id,
                reason: format!("cannot report {new_status} from {}", task.status),
            });
        }
        task.status = new_status;
        task.end_time = Some(Utc::now());
        match new_status {
            TaskStatus::Completed => inner.completed_tasks += 1,
            TaskStatus::Failed => inner.failed_tasks += 1,
            _ => unreachable!("checked above"),
        }
        Ok(())
    }

    /// A worker posts incremental CPU time while a task runs (the chunked
    /// sleep execution model). This is also where MLFQ demotion happens.
    pub async fn report_progress(&self, task_id: u64, elapsed_ms: u64) -> Result<(), PoolError> {
        let mut inner = self.inner.lock().await;
        let algorithm = inner.algorithm;
        let time_slice_ms = inner.tunables.mlfq_time_slice_ms;
        let idx = inner.index_of(task_id)?;
        let task = &mut inner.tasks[idx];
        if task.status != TaskStatus::Running {
            return Err(PoolError::IllegalTransition {
                task_id,
                reason: format!("cannot report progress from {}", task.status),
            });
        }
        task.cpu_time_used_ms += elapsed_ms;
        task.remaining_time_ms = task.remaining_time_ms.saturating_sub(elapsed_ms);
        if algorithm == Algorithm::Mlfq {
            policy::mlfq::demote_if_expired(task, Utc::now(), time_slice_ms);
        }
        Ok(())
    }

    /// Cancel a still-`Pending` task. Running or already-terminal tasks
    /// cannot be cancelled this way.
    pub async fn cancel(&self, task_id: u64) -> Result<(), PoolError> {
        let mut inner = self.inner.lock().await;
        let idx = inner.index_of(task_id)?;
        let task = &mut inner.tasks[idx];
        if task.status != TaskStatus::Pending {
            return Err(PoolError::IllegalTransition {
                task_id,
                reason: format!("cannot cancel task in state {}", task.status),
            });
        }
        task.status = TaskStatus::Failed;
        task.end_time = Some(Utc::now());
        inner.failed_tasks += 1;
        Ok(())
    }

    fn retry_or_finalize(inner: &mut PoolInner, idx: usize, finalize_as: TaskStatus, now: DateTime<Utc>) {
        let max_retries = inner.max_retries;
        let task = &mut inner.tasks[idx];
        if task.retry_count < max_retries {
            task.retry_count += 1;
            task.status = TaskStatus::Pending;
            task.worker_id = None;
            task.start_time = None;
            task.end_time = None;
            task.remaining_time_ms = task.execution_time_ms;
            task.cpu_time_used_ms = 0;
            task.current_mlfq_level = task.priority;
            task.mlfq_level_start = now;
        } else {
            task.status = finalize_as;
            task.end_time = Some(now);
            inner.failed_tasks += 1;
        }
    }

    /// Sweep `Running` tasks past their `timeout`; retry if budget remains,
    /// otherwise finalize as `Timeout`. Returns how many were touched.
    pub async fn check_timeouts(&self) -> usize {
        let mut inner = self.inner.lock().await;
        let now = Utc::now();
        let hits: Vec<usize> = inner
            .tasks
            .iter()
            .enumerate()
            .filter_map(|(i, t)| {
                if t.status != TaskStatus::Running {
                    return None;
                }
                let timeout = t.timeout?;
                let start = t.start_time?;
                let elapsed = (now - start).to_std().unwrap_or_default();
                (elapsed > timeout).then_some(i)
            })
            .collect();
        let count = hits.len();
        for i in hits {
            Self::retry_or_finalize(&mut inner, i, TaskStatus::Timeout, now);
        }
        if count > 0 {
            drop(inner);
            self.notify.notify_waiters();
        }
        count
    }

    /// Reclaim every `Running` task assigned to a worker the supervisor
    /// has determined is dead. Retries if budget remains, otherwise
    /// finalizes as `Failed`.
    pub async fn recover_orphans(&self, dead_worker_id: u32) -> usize {
        let mut inner = self.inner.lock().await;
        let now = Utc::now();
        let hits: Vec<usize> = inner
            .tasks
            .iter()
            .enumerate()
            .filter(|(_, t)| t.status == TaskStatus::Running && t.worker_id == Some(dead_worker_id))
            .map(|(i, _)| i)
            .collect();
        let count = hits.len();
        for i in hits {
            Self::retry_or_finalize(&mut inner, i, TaskStatus::Failed, now);
        }
        if count > 0 {
            drop(inner);
            self.notify.notify_waiters();
        }
        count
    }

    /// Drop terminal tasks whose `end_time` is older than `max_age`,
    /// returning how many were removed. Keeps the pool's memory bounded
    /// under sustained load; ids are never reused.
    pub async fn compact(&self, max_age: StdDuration) -> usize {
        let mut inner = self.inner.lock().await;
        let now = Utc::now();
        let before = inner.tasks.len();
        inner.tasks.retain(|t| {
            if !t.status.is_terminal() {
                return true;
            }
            match t.end_time {
                Some(end) => (now - end).to_std().unwrap_or_default() < max_age,
                None => true,
            }
        });
        before - inner.tasks.len()
    }

    /// Promote pending tasks starved under MLFQ. A no-op under any other
    /// algorithm; cheap enough to call unconditionally from housekeeping.
    pub async fn promote_aged(&self) {
        let mut inner = self.inner.lock().await;
        policy::mlfq::age_promote(&mut inner.tasks, Utc::now());
    }

    pub async fn set_algorithm(&self, algorithm: Algorithm) {
        let mut inner = self.inner.lock().await;
        inner.algorithm = algorithm;
        inner.tunables.rr_last_index = None;
        drop(inner);
        self.notify.notify_waiters();
    }

    pub async fn algorithm(&self) -> Algorithm {
        self.inner.lock().await.algorithm
    }

    /// Register a freshly spawned worker process, returning the new
    /// active count.
    pub async fn worker_online(&self) -> u32 {
        let mut inner = self.inner.lock().await;
        inner.num_active_workers += 1;
        inner.num_active_workers
    }

    /// Unregister a worker that exited or was reaped.
    pub async fn worker_offline(&self) -> u32 {
        let mut inner = self.inner.lock().await;
        inner.num_active_workers = inner.num_active_workers.saturating_sub(1);
        inner.num_active_workers
    }

    pub async fn get(&self, task_id: u64) -> Option<Task> {
        let inner = self.inner.lock().await;
        inner.tasks.iter().find(|t| t.id == task_id).cloned()
    }

    pub async fn snapshot(&self) -> PoolSnapshot {
        let inner = self.inner.lock().await;
        PoolSnapshot {
            stats: PoolStats {
                size: inner.tasks.len(),
                capacity: inner.capacity,
                total_tasks: inner.total_tasks,
                completed_tasks: inner.completed_tasks,
                failed_tasks: inner.failed_tasks,
                num_active_workers: inner.num_active_workers,
                algorithm: inner.algorithm,
            },
            tasks: inner.tasks.clone(),
        }
    }

    /// Flip the shutdown flag and wake every call blocked in
    /// `select_next` so workers can exit cleanly.
    pub async fn shutdown(&self) {
        let mut inner = self.inner.lock().await;
        inner.shutdown = true;
        drop(inner);
        self.notify.notify_waiters();
    }

    pub async fn is_shutdown(&self) -> bool {
        self.inner.lock().await.shutdown
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::Priority;
    use std::time::Duration as StdDuration;

    fn pool_with_capacity(capacity: usize) -> Pool {
        Pool::new(PoolConfig {
            capacity,
            ..PoolConfig::default()
        })
    }

    #[tokio::test]
    async fn submit_assigns_sequential_ids() {
        let pool = pool_with_capacity(10);
        let a = pool
            .submit(SubmitRequest::new("a", Priority::Medium, 100))
            .await
            .unwrap();
        let b = pool
            .submit(SubmitRequest::new("b", Priority::Medium, 100))
            .await
            .unwrap();
        assert_eq!(b, a + 1);
    }

    #[tokio::test]
    async fn submit_enforces_capacity() {
        let pool = pool_with_capacity(1);
        pool.submit(SubmitRequest::new("a", Priority::Medium, 100))
            .await
            .unwrap();
        let err = pool
            .submit(SubmitRequest::new("b", Priority::Medium, 100))
            .await
            .unwrap_err();
        assert_eq!(err, PoolError::QueueFull);
    }

    #[tokio::test]
    async fn submit_rejects_oversized_name() {
        let pool = pool_with_capacity(10);
        let name = "x".repeat(MAX_TASK_NAME_LEN + 1);
        let err = pool
            .submit(SubmitRequest::new(name, Priority::Medium, 100))
            .await
            .unwrap_err();
        assert_eq!(err, PoolError::NameTooLong(MAX_TASK_NAME_LEN));
    }

    #[tokio::test]
    async fn select_next_picks_highest_priority_and_marks_running() {
        let pool = pool_with_capacity(10);
        pool.submit(SubmitRequest::new("low", Priority::Low, 100))
            .await
            .unwrap();
        let high = pool
            .submit(SubmitRequest::new("high", Priority::High, 100))
            .await
            .unwrap();
        let picked = pool.select_next().await.unwrap();
        assert_eq!(picked.id, high);
        assert_eq!(picked.status, TaskStatus::Running);
        assert!(picked.worker_id.is_none());
    }

    #[tokio::test]
    async fn select_next_blocks_until_a_task_is_submitted() {
        let pool = pool_with_capacity(10);
        let waiter = pool.clone();
        let handle = tokio::spawn(async move { waiter.select_next().await });
        tokio::time::sleep(StdDuration::from_millis(20)).await;
        assert!(!handle.is_finished());
        pool.submit(SubmitRequest::new("a", Priority::Medium, 100))
            .await
            .unwrap();
        let task = tokio::time::timeout(StdDuration::from_secs(1), handle)
            .await
            .expect("did not wake in time")
            .unwrap();
        assert_eq!(task.unwrap().name, "a");
    }

    #[tokio::test]
    async fn shutdown_unblocks_waiters_with_none() {
        let pool = pool_with_capacity(10);
        let waiter = pool.clone();
        let handle = tokio::spawn(async move { waiter.select_next().await });
        tokio::time::sleep(StdDuration::from_millis(20)).await;
        pool.shutdown().await;
        let task = tokio::time::timeout(StdDuration::from_secs(1), handle)
            .await
            .expect("did not wake in time")
            .unwrap();
        assert!(task.is_none());
    }

    #[tokio::test]
    async fn assign_worker_then_report_completion() {
        let pool = pool_with_capacity(10);
        let id = pool
            .submit(SubmitRequest::new("a", Priority::Medium, 100))
            .await
            .unwrap();
        pool.select_next().await.unwrap();
        pool.assign_worker(id, 1).await.unwrap();
        pool.update_status(id, TaskStatus::Completed).await.unwrap();
        let task = pool.get(id).await.unwrap();
        assert_eq!(task.status, TaskStatus::Completed);
        assert_eq!(task.worker_id, Some(1));
        assert!(task.end_time.is_some());

        let stats = pool.snapshot().await.stats;
        assert_eq!(stats.completed_tasks, 1);
    }

    #[tokio::test]
    async fn update_status_rejects_non_terminal_report() {
        let pool = pool_with_capacity(10);
        let id = pool
            .submit(SubmitRequest::new("a", Priority::Medium, 100))
            .await
            .unwrap();
        let err = pool.update_status(id, TaskStatus::Running).await.unwrap_err();
        assert!(matches!(err, PoolError::IllegalTransition { .. }));
    }

    #[tokio::test]
    async fn cancel_pending_task_marks_failed() {
        let pool = pool_with_capacity(10);
        let id = pool
            .submit(SubmitRequest::new("a", Priority::Medium, 100))
            .await
            .unwrap();
        pool.cancel(id).await.unwrap();
        let task = pool.get(id).await.unwrap();
        assert_eq!(task.status, TaskStatus::Failed);
    }

    #[tokio::test]
    async fn cancel_running_task_is_rejected() {
        let pool = pool_with_capacity(10);
        let id = pool
            .submit(SubmitRequest::new("a", Priority::Medium, 100))
            .await
            .unwrap();
        pool.select_next().await.unwrap();
        let err = pool.cancel(id).await.unwrap_err();
        assert!(matches!(err, PoolError::IllegalTransition { .. }));
    }

    #[tokio::test]
    async fn check_timeouts_retries_then_finalizes() {
        let pool = Pool::new(PoolConfig {
            capacity: 10,
            max_retries: 1,
            ..PoolConfig::default()
        });
        let mut req = SubmitRequest::new("a", Priority::Medium, 100);
        req.timeout = Some(StdDuration::from_millis(10));
        let id = pool.submit(req).await.unwrap();
        pool.select_next().await.unwrap();
        tokio::time::sleep(StdDuration::from_millis(30)).await;

        assert_eq!(pool.check_timeouts().await, 1);
        let task = pool.get(id).await.unwrap();
        assert_eq!(task.status, TaskStatus::Pending);
        assert_eq!(task.retry_count, 1);

        pool.select_next().await.unwrap();
        tokio::time::sleep(StdDuration::from_millis(30)).await;
        assert_eq!(pool.check_timeouts().await, 1);
        let task = pool.get(id).await.unwrap();
        assert_eq!(task.status, TaskStatus::Timeout);
    }

    #[tokio::test]
    async fn recover_orphans_reclaims_dead_workers_tasks() {
        let pool = Pool::new(PoolConfig {
            capacity: 10,
            max_retries: 0,
            ..PoolConfig::default()
        });
        let id = pool
            .submit(SubmitRequest::new("a", Priority::Medium, 100))
            .await
            .unwrap();
        pool.select_next().await.unwrap();
        pool.assign_worker(id, 7).await.unwrap();

        assert_eq!(pool.recover_orphans(7).await, 1);
        let task = pool.get(id).await.unwrap();
        assert_eq!(task.status, TaskStatus::Failed);
    }

    #[tokio::test]
    async fn compact_drops_old_terminal_tasks_only() {
        let pool = pool_with_capacity(10);
        let id = pool
            .submit(SubmitRequest::new("a", Priority::Medium, 100))
            .await
            .unwrap();
        pool.cancel(id).await.unwrap();
        let removed = pool.compact(StdDuration::from_secs(0)).await;
        assert_eq!(removed, 1);
        assert!(pool.get(id).await.is_none());
    }

    #[tokio::test]
    async fn compact_keeps_pending_tasks() {
        let pool = pool_with_capacity(10);
        let id = pool
            .submit(SubmitRequest::new("a", Priority::Medium, 100))
            .await
            .unwrap();
        let removed = pool.compact(StdDuration::from_secs(0)).await;
        assert_eq!(removed, 0);
        assert!(pool.get(id).await.is_some());
    }

    #[tokio::test]
    async fn gang_dispatches_all_members_at_once() {
        let pool = pool_with_capacity(10);
        let mut a = SubmitRequest::new("a", Priority::Medium, 100);
        a.gang_id = Some(42);
        let mut b = SubmitRequest::new("b", Priority::Medium, 100);
        b.gang_id = Some(42);
        pool.submit(a).await.unwrap();
        pool.submit(b).await.unwrap();

        assert_eq!(pool.gang_size(42).await, 2);
        let started = pool.dequeue_gang(42, 10).await;
        assert_eq!(started.len(), 2);
        assert!(started.iter().all(|t| t.status == TaskStatus::Running));
    }
}
