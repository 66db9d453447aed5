//! Spawns and reaps worker child processes, and tells the supervisor's
//! pool about crashes so it can reclaim orphaned tasks.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use taskpool_core::Pool;
use tokio::process::{Child, Command};
use tracing::{info, warn};

/// One tracked worker slot. `None` means the slot needs (re)spawning.
struct Slot {
    worker_id: u32,
    child: Option<Child>,
}

pub struct WorkerPool {
    worker_bin: PathBuf,
    socket_path: PathBuf,
    slots: Vec<Slot>,
}

impl WorkerPool {
    pub fn new(worker_bin: PathBuf, socket_path: PathBuf, num_workers: u32) -> Self {
        let slots = (0..num_workers)
            .map(|worker_id| Slot {
                worker_id,
                child: None,
            })
            .collect();
        Self {
            worker_bin,
            socket_path,
            slots,
        }
    }

    /// Spawn every slot that doesn't currently have a live child.
    pub fn spawn_missing(&mut self) {
        for slot in &mut self.slots {
            if slot.child.is_some() {
                continue;
            }
            match spawn_one(&self.worker_bin, &self.socket_path, slot.worker_id) {
                Ok(child) => {
                    info!(worker_id = slot.worker_id, pid = ?child.id(), "spawned worker");
                    slot.child = Some(child);
                }
                Err(e) => {
                    warn!(worker_id = slot.worker_id, error = %e, "failed to spawn worker");
                }
            }
        }
    }

    /// Non-blocking reap of every slot; any that exited get
    /// `recover_orphans` called against them and are cleared so the next
    /// `spawn_missing` respawns them.
    pub async fn reap_and_recover(&mut self, pool: &Pool) {
        for slot in &mut self.slots {
            let Some(child) = slot.child.as_mut() else {
                continue;
            };
            match child.try_wait() {
                Ok(Some(status)) => {
                    warn!(worker_id = slot.worker_id, status = %status, "worker exited");
                    slot.child = None;
                    let recovered = pool.recover_orphans(slot.worker_id).await;
                    if recovered > 0 {
                        info!(worker_id = slot.worker_id, recovered, "reclaimed orphaned tasks");
                    }
                }
                Ok(None) => {}
                Err(e) => {
                    warn!(worker_id = slot.worker_id, error = %e, "failed to poll worker status");
                }
            }
        }
    }

    /// Count slots whose process answers a signal-0 liveness probe.
    pub fn count_responsive(&self) -> u32 {
        self.slots
            .iter()
            .filter(|s| s.child.as_ref().is_some_and(|c| is_alive(c)))
            .count() as u32
    }

    /// Send SIGTERM to every live child and wait for it to exit.
    pub async fn terminate_all(&mut self) {
        for slot in &mut self.slots {
            if let Some(child) = slot.child.as_mut() {
                terminate(child);
            }
        }
        for slot in &mut self.slots {
            if let Some(mut child) = slot.child.take() {
                let _ = child.wait().await;
            }
        }
    }
}

fn spawn_one(worker_bin: &Path, socket_path: &Path, worker_id: u32) -> Result<Child> {
    Command::new(worker_bin)
        .arg("--worker-id")
        .arg(worker_id.to_string())
        .arg("--socket")
        .arg(socket_path)
        .kill_on_drop(true)
        .spawn()
        .with_context(|| format!("spawning {}", worker_bin.display()))
}

#[cfg(unix)]
fn is_alive(child: &Child) -> bool {
    match child.id() {
        Some(pid) => unsafe { libc::kill(pid as libc::pid_t, 0) == 0 },
        None => false,
    }
}

#[cfg(not(unix))]
fn is_alive(child: &Child) -> bool {
    child.id().is_some()
}

#[cfg(unix)]
fn terminate(child: &mut Child) {
    if let Some(pid) = child.id() {
        unsafe {
            libc::kill(pid as libc::pid_t, libc::SIGTERM);
        }
    }
}

#[cfg(not(unix))]
fn terminate(child: &mut Child) {
    child.start_kill().ok();
}
