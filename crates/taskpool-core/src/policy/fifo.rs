//! FIFO / FCFS: oldest `creation_time` first.

use chrono::{DateTime, Utc};

use crate::task::{Task, TaskStatus};

pub fn select(tasks: &[Task]) -> Option<usize> {
    let mut best: Option<(usize, DateTime<Utc>)> = None;
    for (i, t) in tasks.iter().enumerate() {
        if t.status != TaskStatus::Pending {
            continue;
        }
        match best {
            Some((_, score)) if t.creation_time >= score => {}
            _ => best = Some((i, t.creation_time)),
        }
    }
    best.map(|(i, _)| i)
}
