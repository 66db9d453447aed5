//! Selection policies: pure functions from pool state to the index of the
//! next task to run.
//!
//! Every policy scans only `Pending` tasks and ties break on array position
//! (i.e. earliest-submitted wins among equal scores), except [`lottery`]
//! which is random by construction. None of these functions take a lock --
//! the caller ([`crate::pool::Pool::select_next`]) holds it for the whole
//! scan-and-transition.

pub mod edf;
pub mod fifo;
pub mod gang;
pub mod lottery;
pub mod mlfq;
pub mod priority;
pub mod round_robin;
pub mod sjf;
pub mod srtf;

use crate::task::{Algorithm, Task};

/// Per-algorithm tunables that live on the pool rather than on a task.
#[derive(Debug, Clone, Copy, Default)]
pub struct PolicyTunables {
    pub mlfq_time_slice_ms: u64,
    pub rr_last_index: Option<usize>,
}

impl PolicyTunables {
    pub fn new() -> Self {
        Self {
            mlfq_time_slice_ms: mlfq::DEFAULT_TIME_SLICE_MS,
            rr_last_index: None,
        }
    }
}

/// Select the index of the next task to dispatch under `algorithm`.
///
/// `gang` selection is intentionally excluded here: dispatching a gang
/// moves more than one task at once, so it has its own entry point
/// ([`gang::dequeue_members`]) called directly by the pool.
pub fn select_index(algorithm: Algorithm, tasks: &mut [Task], tunables: &mut PolicyTunables) -> Option<usize> {
    match algorithm {
        Algorithm::Priority => priority::select(tasks),
        Algorithm::Edf => edf::select(tasks),
        Algorithm::Mlfq => mlfq::select(tasks),
        Algorithm::Gang => gang::select_any(tasks),
        Algorithm::RoundRobin => {
            let picked = round_robin::select(tasks, tunables.rr_last_index);
            if let Some(idx) = picked {
                tunables.rr_last_index = Some(idx);
            }
            picked
        }
        Algorithm::Sjf => sjf::select(tasks),
        Algorithm::Fifo => fifo::select(tasks),
        Algorithm::Lottery => lottery::select(tasks, &mut rand::rng()),
        Algorithm::Srtf => srtf::select(tasks),
    }
}
