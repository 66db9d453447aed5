//! A thin async client over the control socket, shared by the worker and
//! CLI binaries so neither hand-rolls request/response matching.

use std::path::Path;

use anyhow::{anyhow, Context};
use taskpool_core::{Algorithm, PoolError, PoolSnapshot, PoolStats, Priority, Task, TaskStatus};
use tokio::net::UnixStream;

use crate::codec::MessageStream;
use crate::protocol::{Request, Response};

pub struct Client {
    stream: MessageStream<UnixStream>,
}

impl Client {
    pub async fn connect(socket_path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let conn = UnixStream::connect(socket_path.as_ref())
            .await
            .with_context(|| format!("connecting to {}", socket_path.as_ref().display()))?;
        Ok(Self {
            stream: MessageStream::new(conn),
        })
    }

    async fn roundtrip(&mut self, req: Request) -> anyhow::Result<Response> {
        self.stream.send_request(&req).await?;
        self.stream
            .recv_response()
            .await?
            .ok_or_else(|| anyhow!("supervisor closed the connection"))
    }

    #[allow(clippy::too_many_arguments)]
    pub async fn submit(
        &mut self,
        name: String,
        priority: Priority,
        execution_time_ms: u64,
        gang_id: Option<i64>,
        lottery_tickets: Option<u32>,
        timeout_seconds: Option<u64>,
        deadline_seconds: Option<u64>,
    ) -> anyhow::Result<Result<u64, PoolError>> {
        let req = Request::Submit {
            name,
            priority,
            execution_time_ms,
            gang_id,
            lottery_tickets,
            timeout_seconds,
            deadline_seconds,
        };
        match self.roundtrip(req).await? {
            Response::Submitted { task_id } => Ok(Ok(task_id)),
            Response::Error(e) => Ok(Err(e)),
            other => Err(unexpected("Submitted", other)),
        }
    }

    pub async fn cancel(&mut self, task_id: u64) -> anyhow::Result<Result<(), PoolError>> {
        match self.roundtrip(Request::Cancel { task_id }).await? {
            Response::Cancelled => Ok(Ok(())),
            Response::Error(e) => Ok(Err(e)),
            other => Err(unexpected("Cancelled", other)),
        }
    }

    pub async fn set_algorithm(&mut self, algorithm: Algorithm) -> anyhow::Result<()> {
        match self.roundtrip(Request::SetAlgorithm { algorithm }).await? {
            Response::AlgorithmSet => Ok(()),
            other => Err(unexpected("AlgorithmSet", other)),
        }
    }

    pub async fn snapshot(&mut self) -> anyhow::Result<PoolSnapshot> {
        match self.roundtrip(Request::Snapshot).await? {
            Response::Snapshot(snap) => Ok(snap),
            other => Err(unexpected("Snapshot", other)),
        }
    }

    pub async fn status(&mut self) -> anyhow::Result<PoolStats> {
        match self.roundtrip(Request::Status).await? {
            Response::Status(stats) => Ok(stats),
            other => Err(unexpected("Status", other)),
        }
    }

    /// Block until a task is selected, or `None` once the pool shuts down.
    pub async fn select_next(&mut self) -> anyhow::Result<Option<Task>> {
        match self.roundtrip(Request::SelectNext).await? {
            Response::NextTask(task) => Ok(task),
            other => Err(unexpected("NextTask", other)),
        }
    }

    pub async fn assign_worker(&mut self, task_id: u64, worker_id: u32) -> anyhow::Result<Result<(), PoolError>> {
        match self
            .roundtrip(Request::AssignWorker { task_id, worker_id })
            .await?
        {
            Response::Assigned => Ok(Ok(())),
            Response::Error(e) => Ok(Err(e)),
            other => Err(unexpected("Assigned", other)),
        }
    }

    pub async fn report_progress(&mut self, task_id: u64, elapsed_ms: u64) -> anyhow::Result<Result<(), PoolError>> {
        match self
            .roundtrip(Request::ReportProgress { task_id, elapsed_ms })
            .await?
        {
            Response::ProgressRecorded => Ok(Ok(())),
            Response::Error(e) => Ok(Err(e)),
            other => Err(unexpected("ProgressRecorded", other)),
        }
    }

    pub async fn update_status(&mut self, task_id: u64, status: TaskStatus) -> anyhow::Result<Result<(), PoolError>> {
        match self.roundtrip(Request::UpdateStatus { task_id, status }).await? {
            Response::StatusUpdated => Ok(Ok(())),
            Response::Error(e) => Ok(Err(e)),
            other => Err(unexpected("StatusUpdated", other)),
        }
    }

    pub async fn worker_online(&mut self) -> anyhow::Result<u32> {
        match self.roundtrip(Request::WorkerOnline).await? {
            Response::WorkerOnline { active_workers } => Ok(active_workers),
            other => Err(unexpected("WorkerOnline", other)),
        }
    }

    pub async fn worker_offline(&mut self) -> anyhow::Result<u32> {
        match self.roundtrip(Request::WorkerOffline).await? {
            Response::WorkerOffline { active_workers } => Ok(active_workers),
            other => Err(unexpected("WorkerOffline", other)),
        }
    }

    /// Start every pending member of `gang_id`, up to `max`, in one
    /// critical section on the supervisor side.
    pub async fn dequeue_gang(&mut self, gang_id: i64, max: usize) -> anyhow::Result<Vec<Task>> {
        match self.roundtrip(Request::DequeueGang { gang_id, max }).await? {
            Response::GangDequeued(tasks) => Ok(tasks),
            other => Err(unexpected("GangDequeued", other)),
        }
    }
}

fn unexpected(expected: &str, got: Response) -> anyhow::Error {
    anyhow!("expected {expected} response, got {got:?}")
}
