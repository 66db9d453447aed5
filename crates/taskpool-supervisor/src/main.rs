mod housekeeping;
mod process_mgr;
mod server;

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use taskpool_core::config::{PoolConfig, NUM_WORKERS};
use taskpool_core::Pool;
use taskpool_ipc::IpcConfig;
use tokio_util::sync::CancellationToken;

use housekeeping::HousekeepingIntervals;
use process_mgr::WorkerPool;

#[derive(Parser)]
#[command(name = "taskpool-supervisor", about = "Owns the task pool and supervises workers")]
struct Cli {
    /// Number of worker processes to maintain.
    #[arg(long, default_value_t = NUM_WORKERS)]
    num_workers: u32,

    /// Directory holding the control socket and PID file (overrides
    /// TASKPOOL_RUNTIME_DIR).
    #[arg(long)]
    runtime_dir: Option<PathBuf>,

    /// Path to the `taskpool-worker` binary. Defaults to a sibling of
    /// this executable.
    #[arg(long)]
    worker_bin: Option<PathBuf>,
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
        tracing::error!(error = %e, "supervisor exiting due to initialization failure");
        eprintln!("{e:#}");
        std::process::exit(1);
    }
    Ok(())
}

async fn run() -> Result<()> {
    let cli = Cli::parse();

    let ipc_config = match &cli.runtime_dir {
        Some(dir) => IpcConfig::new(dir.clone()),
        None => IpcConfig::from_env(),
    };
    let socket_path = ipc_config.socket_path();
    let pid_path = ipc_config.pid_path();

    let worker_bin = cli
        .worker_bin
        .or_else(default_worker_bin)
        .context("could not locate taskpool-worker binary; pass --worker-bin")?;

    let listener = server::bind(&socket_path)
        .with_context(|| format!("binding control socket at {}", socket_path.display()))?;
    write_pid_file(&pid_path)?;

    let pool = Pool::new(PoolConfig::from_env());
    let workers = WorkerPool::new(worker_bin, socket_path.clone(), cli.num_workers);

    tracing::info!(
        pid = std::process::id(),
        num_workers = cli.num_workers,
        socket = %socket_path.display(),
        "supervisor starting"
    );

    let cancel = CancellationToken::new();
    install_signal_handlers(cancel.clone());

    let server_task = tokio::spawn(server::run(listener, pool.clone(), cancel.clone()));
    housekeeping::run(pool, workers, HousekeepingIntervals::default(), cancel).await;
    let _ = server_task.await;

    let _ = std::fs::remove_file(&pid_path);
    let _ = std::fs::remove_file(&socket_path);

    tracing::info!("supervisor shut down cleanly");
    Ok(())
}

fn default_worker_bin() -> Option<PathBuf> {
    let exe = std::env::current_exe().ok()?;
    let dir = exe.parent()?;
    let candidate = dir.join(format!("taskpool-worker{}", std::env::consts::EXE_SUFFIX));
    candidate.exists().then_some(candidate)
}

fn write_pid_file(path: &PathBuf) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, format!("{}\n", std::process::id()))
        .with_context(|| format!("writing PID file at {}", path.display()))
}

/// Install Ctrl+C / SIGTERM handling: the first signal requests graceful
/// shutdown, a second forces an immediate exit.
fn install_signal_handlers(cancel: CancellationToken) {
    let got_first = Arc::new(AtomicBool::new(false));

    let cancel_ctrl_c = cancel.clone();
    let got_first_ctrl_c = Arc::clone(&got_first);
    tokio::spawn(async move {
        loop {
            if tokio::signal::ctrl_c().await.is_err() {
                return;
            }
            if got_first_ctrl_c.swap(true, Ordering::SeqCst) {
                eprintln!("\nForce exit.");
                std::process::exit(130);
            }
            eprintln!("\nShutting down gracefully (Ctrl+C again to force)...");
            cancel_ctrl_c.cancel();
        }
    });

    #[cfg(unix)]
    {
        let cancel_term = cancel.clone();
        tokio::spawn(async move {
            let Ok(mut term) = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            else {
                return;
            };
            term.recv().await;
            cancel_term.cancel();
        });
    }
}
