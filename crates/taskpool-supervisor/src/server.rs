//! The Unix-domain control socket: accepts worker and CLI connections and
//! dispatches each request against the shared pool.

use std::path::Path;

use taskpool_core::{Pool, SubmitRequest};
use taskpool_ipc::protocol::{Request, Response};
use taskpool_ipc::MessageStream;
use tokio::net::{UnixListener, UnixStream};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

pub async fn run(listener: UnixListener, pool: Pool, cancel: CancellationToken) {
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            accepted = listener.accept() => {
                match accepted {
                    Ok((stream, _addr)) => {
                        let pool = pool.clone();
                        let cancel = cancel.clone();
                        tokio::spawn(async move { handle_connection(stream, pool, cancel).await });
                    }
                    Err(e) => warn!(error = %e, "failed to accept connection"),
                }
            }
        }
    }
}

async fn handle_connection(stream: UnixStream, pool: Pool, cancel: CancellationToken) {
    let mut conn = MessageStream::new(stream);
    loop {
        let req = tokio::select! {
            _ = cancel.cancelled() => break,
            req = conn.recv_request() => req,
        };
        let req = match req {
            Ok(Some(req)) => req,
            Ok(None) => break,
            Err(e) => {
                debug!(error = %e, "malformed request, closing connection");
                break;
            }
        };
        let resp = dispatch(&pool, req).await;
        if let Err(e) = conn.send_response(&resp).await {
            debug!(error = %e, "failed to send response, closing connection");
            break;
        }
    }
}

async fn dispatch(pool: &Pool, req: Request) -> Response {
    match req {
        Request::Submit {
            name,
            priority,
            execution_time_ms,
            gang_id,
            lottery_tickets,
            timeout_seconds,
            deadline_seconds,
        } => {
            let mut sub = SubmitRequest::new(name, priority, execution_time_ms);
            sub.gang_id = gang_id;
            sub.lottery_tickets = lottery_tickets;
            sub.timeout = timeout_seconds.map(std::time::Duration::from_secs);
            sub.deadline_offset = deadline_seconds.map(std::time::Duration::from_secs);
            match pool.submit(sub).await {
                Ok(task_id) => Response::Submitted { task_id },
                Err(e) => Response::Error(e),
            }
        }
        Request::Cancel { task_id } => match pool.cancel(task_id).await {
            Ok(()) => Response::Cancelled,
            Err(e) => Response::Error(e),
        },
        Request::SetAlgorithm { algorithm } => {
            pool.set_algorithm(algorithm).await;
            Response::AlgorithmSet
        }
        Request::Snapshot => Response::Snapshot(pool.snapshot().await),
        Request::Status => Response::Status(pool.snapshot().await.stats),
        Request::SelectNext => Response::NextTask(pool.select_next().await),
        Request::AssignWorker { task_id, worker_id } => {
            match pool.assign_worker(task_id, worker_id).await {
                Ok(()) => Response::Assigned,
                Err(e) => Response::Error(e),
            }
        }
        Request::ReportProgress { task_id, elapsed_ms } => {
            match pool.report_progress(task_id, elapsed_ms).await {
                Ok(()) => Response::ProgressRecorded,
                Err(e) => Response::Error(e),
            }
        }
        Request::UpdateStatus { task_id, status } => match pool.update_status(task_id, status).await {
            Ok(()) => Response::StatusUpdated,
            Err(e) => Response::Error(e),
        },
        Request::WorkerOnline => Response::WorkerOnline {
            active_workers: pool.worker_online().await,
        },
        Request::WorkerOffline => Response::WorkerOffline {
            active_workers: pool.worker_offline().await,
        },
        Request::DequeueGang { gang_id, max } => Response::GangDequeued(pool.dequeue_gang(gang_id, max).await),
    }
}

pub fn bind(socket_path: &Path) -> std::io::Result<UnixListener> {
    if socket_path.exists() {
        std::fs::remove_file(socket_path)?;
    }
    if let Some(parent) = socket_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    UnixListener::bind(socket_path)
}
