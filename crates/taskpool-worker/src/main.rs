//! A task pool worker: an independent process that repeatedly asks the
//! supervisor for work, executes it, and reports the outcome.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use taskpool_core::{Task, TaskStatus};
use taskpool_ipc::{Client, IpcConfig};
use tracing::{error, info, warn};

/// Sleep chunk size for task execution, matching the reference
/// implementation's 100ms polling granularity.
const EXECUTION_CHUNK_MS: u64 = 100;

#[derive(Parser)]
#[command(name = "taskpool-worker", about = "Executes tasks drawn from the supervisor's pool")]
struct Cli {
    /// This worker's identity, assigned by the supervisor.
    #[arg(long)]
    worker_id: u32,

    /// Path to the supervisor's control socket (overrides
    /// TASKPOOL_RUNTIME_DIR).
    #[arg(long)]
    socket: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    if let Err(e) = run().await {
        error!(error = %e, "worker exiting due to fatal error");
        eprintln!("{e:#}");
        std::process::exit(1);
    }
    Ok(())
}

async fn run() -> Result<()> {
    let cli = Cli::parse();
    let socket_path = match cli.socket {
        Some(path) => path,
        None => IpcConfig::from_env().socket_path(),
    };

    info!(worker_id = cli.worker_id, pid = std::process::id(), "worker starting");

    let shutdown = Arc::new(AtomicBool::new(false));
    install_signal_handlers(Arc::clone(&shutdown));

    let mut client = Client::connect(&socket_path)
        .await
        .with_context(|| format!("attaching to pool at {}", socket_path.display()))?;
    client.worker_online().await?;

    main_loop(&mut client, &socket_path, cli.worker_id, &shutdown).await;

    client.worker_offline().await.ok();
    info!(worker_id = cli.worker_id, "worker shutting down");
    Ok(())
}

/// Mirrors the reference worker's loop: block for work, mark it assigned,
/// then hand execution off to a detached task so this loop stays
/// responsive and can keep pulling further work concurrently.
async fn main_loop(client: &mut Client, socket_path: &PathBuf, worker_id: u32, shutdown: &Arc<AtomicBool>) {
    loop {
        if shutdown.load(Ordering::SeqCst) {
            break;
        }
        let task = match client.select_next().await {
            Ok(Some(task)) => task,
            Ok(None) => break, // pool is shutting down
            Err(e) => {
                error!(error = %e, "lost connection to supervisor");
                break;
            }
        };

        assign_and_spawn(client, socket_path, worker_id, task.clone(), shutdown).await;

        // A gang task must start together with the rest of its gang. The
        // policy layer only ever hands `select_next` one member at a time,
        // so bring the rest of this gang up in the same critical section
        // before this worker goes back to pulling further work.
        if let Some(gang_id) = task.gang_id {
            match client.dequeue_gang(gang_id, usize::MAX).await {
                Ok(members) => {
                    for member in members {
                        assign_and_spawn(client, socket_path, worker_id, member, shutdown).await;
                    }
                }
                Err(e) => warn!(gang_id, error = %e, "failed to dequeue remaining gang members"),
            }
        }
    }
}

async fn assign_and_spawn(client: &mut Client, socket_path: &PathBuf, worker_id: u32, task: Task, shutdown: &Arc<AtomicBool>) {
    match client.assign_worker(task.id, worker_id).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => warn!(task_id = task.id, error = %e, "supervisor rejected worker assignment"),
        Err(e) => warn!(task_id = task.id, error = %e, "failed to record worker assignment"),
    }

    let socket_path = socket_path.clone();
    let shutdown = Arc::clone(shutdown);
    tokio::spawn(async move {
        execute(task, worker_id, &socket_path, &shutdown).await;
    });
}

/// Run a task's nominal duration in 100ms chunks, posting progress (and
/// letting MLFQ demotion apply) after each chunk. Exits silently without
/// publishing a terminal state if shutdown is observed mid-execution --
/// the supervisor reclaims it as an orphan once this process exits.
async fn execute(task: Task, worker_id: u32, socket_path: &PathBuf, shutdown: &Arc<AtomicBool>) {
    let mut conn = match Client::connect(socket_path).await {
        Ok(c) => c,
        Err(e) => {
            error!(task_id = task.id, error = %e, "failed to open reporting connection");
            return;
        }
    };

    let mut remaining_ms = task.execution_time_ms;
    while remaining_ms > 0 {
        if shutdown.load(Ordering::SeqCst) {
            info!(task_id = task.id, worker_id, "shutdown mid-execution, abandoning task");
            return;
        }
        let chunk = remaining_ms.min(EXECUTION_CHUNK_MS);
        tokio::time::sleep(Duration::from_millis(chunk)).await;
        remaining_ms -= chunk;

        if let Err(e) = conn.report_progress(task.id, chunk).await {
            warn!(task_id = task.id, error = %e, "failed to report progress");
        }
    }

    match conn.update_status(task.id, TaskStatus::Completed).await {
        Ok(Ok(())) => info!(task_id = task.id, worker_id, "task completed"),
        Ok(Err(e)) => warn!(task_id = task.id, error = %e, "supervisor rejected completion report"),
        Err(e) => error!(task_id = task.id, error = %e, "failed to report completion"),
    }
}

fn install_signal_handlers(shutdown: Arc<AtomicBool>) {
    let ctrl_c_flag = Arc::clone(&shutdown);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            ctrl_c_flag.store(true, Ordering::SeqCst);
        }
    });

    #[cfg(unix)]
    {
        tokio::spawn(async move {
            let Ok(mut term) = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            else {
                return;
            };
            term.recv().await;
            shutdown.store(true, Ordering::SeqCst);
        });
    }
}
