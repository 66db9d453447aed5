//! SRTF: shortest remaining time first.

use crate::task::{Task, TaskStatus};

/// Select the pending task with the least `remaining_time_ms`, lazily
/// reinitializing it from `execution_time_ms` when observed at zero.
pub fn select(tasks: &mut [Task]) -> Option<usize> {
    for t in tasks.iter_mut() {
        if t.status == TaskStatus::Pending && t.remaining_time_ms == 0 {
            t.remaining_time_ms = t.execution_time_ms;
        }
    }

    let mut best: Option<(usize, u64)> = None;
    for (i, t) in tasks.iter().enumerate() {
        if t.status != TaskStatus::Pending {
            continue;
        }
        match best {
            Some((_, score)) if t.remaining_time_ms >= score => {}
            _ => best = Some((i, t.remaining_time_ms)),
        }
    }
    best.map(|(i, _)| i)
}
