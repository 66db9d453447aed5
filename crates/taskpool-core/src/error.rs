//! Error kinds surfaced by pool operations.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors a caller of [`crate::pool::Pool`] can observe.
///
/// Worker crashes and task timeouts are *not* represented here: they are
/// handled internally by [`crate::pool::Pool::recover_orphans`] and
/// [`crate::pool::Pool::check_timeouts`] and never surface as an API error.
#[derive(Debug, Error, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PoolError {
    #[error("pool is at capacity")]
    QueueFull,

    #[error("task {0} not found")]
    NotFound(u64),

    #[error("task name exceeds {0} bytes")]
    NameTooLong(usize),

    #[error("illegal transition for task {task_id}: {reason}")]
    IllegalTransition { task_id: u64, reason: String },
}
