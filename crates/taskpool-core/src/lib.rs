//! Domain logic for the task pool: task records, selection policies, and
//! the pool itself. No process or IPC concerns live here -- see
//! `taskpool-ipc`, `taskpool-supervisor`, and `taskpool-worker`.

pub mod config;
pub mod error;
pub mod policy;
pub mod pool;
pub mod task;

pub use error::PoolError;
pub use pool::{Pool, PoolSnapshot, PoolStats, SubmitRequest};
pub use task::{Algorithm, Priority, Task, TaskStatus};
