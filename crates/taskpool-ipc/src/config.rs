//! Where the supervisor's control socket and PID file live.
//!
//! Reads from the `TASKPOOL_RUNTIME_DIR` environment variable, falling
//! back to the user's runtime/cache directory when unset, following the
//! same env-var-with-fallback convention used for config elsewhere in
//! this workspace.

use std::env;
use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct IpcConfig {
    pub runtime_dir: PathBuf,
}

impl IpcConfig {
    pub fn from_env() -> Self {
        let runtime_dir = env::var("TASKPOOL_RUNTIME_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| Self::default_runtime_dir());
        Self { runtime_dir }
    }

    pub fn new(runtime_dir: impl Into<PathBuf>) -> Self {
        Self {
            runtime_dir: runtime_dir.into(),
        }
    }

    fn default_runtime_dir() -> PathBuf {
        dirs::runtime_dir()
            .or_else(dirs::cache_dir)
            .unwrap_or_else(env::temp_dir)
            .join("taskpool")
    }

    pub fn socket_path(&self) -> PathBuf {
        self.runtime_dir.join("supervisor.sock")
    }

    pub fn pid_path(&self) -> PathBuf {
        self.runtime_dir.join("supervisor.pid")
    }
}

impl Default for IpcConfig {
    fn default() -> Self {
        Self::from_env()
    }
}
