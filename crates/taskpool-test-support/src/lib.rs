//! Shared fixtures for tests that exercise the task pool.
//!
//! Most behavioral tests only need an in-process [`taskpool_core::Pool`]
//! (see [`test_pool`]); tests of the supervisor/worker process contract
//! itself use [`Cluster`] to run real child processes against a
//! throwaway runtime directory.

use std::path::PathBuf;
use std::process::Stdio;

use anyhow::{Context, Result};
use taskpool_core::config::PoolConfig;
use taskpool_core::Pool;
use taskpool_ipc::IpcConfig;
use tempfile::TempDir;
use tokio::process::{Child, Command};

/// An in-process pool with a small capacity, suitable for most policy and
/// lifecycle tests.
pub fn test_pool(capacity: usize) -> Pool {
    Pool::new(PoolConfig {
        capacity,
        ..PoolConfig::default()
    })
}

pub fn test_pool_with_retries(capacity: usize, max_retries: u32) -> Pool {
    Pool::new(PoolConfig {
        capacity,
        max_retries,
        ..PoolConfig::default()
    })
}

/// A running supervisor (and its workers) rooted at a temporary runtime
/// directory, for tests that exercise the real process/IPC surface
/// rather than the in-process [`Pool`] directly.
pub struct Cluster {
    _runtime_dir: TempDir,
    ipc_config: IpcConfig,
    supervisor: Child,
}

impl Cluster {
    pub async fn spawn(num_workers: u32) -> Result<Self> {
        let runtime_dir = tempfile::tempdir().context("creating temporary runtime dir")?;
        let ipc_config = IpcConfig::new(runtime_dir.path().to_path_buf());

        let supervisor_bin: PathBuf = env_bin("taskpool-supervisor")?;
        let worker_bin: PathBuf = env_bin("taskpool-worker")?;

        let supervisor = Command::new(supervisor_bin)
            .arg("--num-workers")
            .arg(num_workers.to_string())
            .arg("--runtime-dir")
            .arg(runtime_dir.path())
            .arg("--worker-bin")
            .arg(worker_bin)
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .context("spawning taskpool-supervisor")?;

        let socket_path = ipc_config.socket_path();
        wait_for_socket(&socket_path).await?;

        Ok(Self {
            _runtime_dir: runtime_dir,
            ipc_config,
            supervisor,
        })
    }

    pub fn socket_path(&self) -> PathBuf {
        self.ipc_config.socket_path()
    }

    pub async fn client(&self) -> Result<taskpool_ipc::Client> {
        taskpool_ipc::Client::connect(self.socket_path()).await
    }

    pub async fn shutdown(mut self) -> Result<()> {
        #[cfg(unix)]
        if let Some(pid) = self.supervisor.id() {
            unsafe {
                libc::kill(pid as libc::pid_t, libc::SIGTERM);
            }
        }
        self.supervisor.wait().await?;
        Ok(())
    }
}

/// Locate a workspace binary by package name.
///
/// `CARGO_BIN_EXE_<name>` is only populated for binary targets of the
/// *same* package as the test, so a cross-package harness like this one
/// goes through `assert_cmd`, which knows how to find another
/// workspace member's binary in the shared target directory.
fn env_bin(name: &str) -> Result<PathBuf> {
    let cmd = assert_cmd::Command::cargo_bin(name)
        .with_context(|| format!("locating {name} binary; run `cargo build --workspace` first"))?;
    Ok(PathBuf::from(cmd.get_program()))
}

async fn wait_for_socket(path: &std::path::Path) -> Result<()> {
    for _ in 0..100 {
        if path.exists() {
            return Ok(());
        }
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
    }
    anyhow::bail!("supervisor did not create {} in time", path.display());
}
