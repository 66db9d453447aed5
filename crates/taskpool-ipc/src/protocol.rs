//! Wire types exchanged between the supervisor and its worker/CLI clients.
//!
//! Every message is a JSON object framed by [`crate::codec`]. Requests and
//! responses are plain enums rather than a request/response pair per verb;
//! this keeps the connection handler in `taskpool-supervisor` to a single
//! `match` and keeps new operations a one-line addition on both ends.

use serde::{Deserialize, Serialize};
use taskpool_core::{Algorithm, PoolError, PoolSnapshot, PoolStats, Priority, Task, TaskStatus};

/// A request sent to the supervisor over the control socket.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Request {
    /// Submit a new task. `deadline_seconds` is an offset from now, per
    /// the external submission contract.
    Submit {
        name: String,
        priority: Priority,
        execution_time_ms: u64,
        gang_id: Option<i64>,
        lottery_tickets: Option<u32>,
        timeout_seconds: Option<u64>,
        deadline_seconds: Option<u64>,
    },
    Cancel {
        task_id: u64,
    },
    SetAlgorithm {
        algorithm: Algorithm,
    },
    Snapshot,
    Status,

    /// Block until a task is selected, or the pool shuts down. Sent by a
    /// worker's dispatch loop.
    SelectNext,
    AssignWorker {
        task_id: u64,
        worker_id: u32,
    },
    ReportProgress {
        task_id: u64,
        elapsed_ms: u64,
    },
    UpdateStatus {
        task_id: u64,
        status: TaskStatus,
    },
    WorkerOnline,
    WorkerOffline,

    /// Start every pending member of `gang_id`, up to `max`, in one
    /// critical section. Sent by a worker that just drew a gang task via
    /// `SelectNext`, to bring the rest of that gang up together.
    DequeueGang {
        gang_id: i64,
        max: usize,
    },
}

/// A response returned by the supervisor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Response {
    Submitted { task_id: u64 },
    Cancelled,
    AlgorithmSet,
    Snapshot(PoolSnapshot),
    Status(PoolStats),
    NextTask(Option<Task>),
    Assigned,
    ProgressRecorded,
    StatusUpdated,
    WorkerOnline { active_workers: u32 },
    WorkerOffline { active_workers: u32 },
    GangDequeued(Vec<Task>),
    Error(PoolError),
}
