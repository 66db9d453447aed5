//! EDF: earliest deadline first. Tasks without a deadline score as +infinity
//! and are only picked when nothing with a deadline is pending.

use chrono::{DateTime, Utc};

use crate::task::{Task, TaskStatus};

pub fn select(tasks: &[Task]) -> Option<usize> {
    let mut best: Option<(usize, Option<DateTime<Utc>>)> = None;
    for (i, t) in tasks.iter().enumerate() {
        if t.status != TaskStatus::Pending {
            continue;
        }
        let score = t.deadline_time;
        let better = match best {
            None => true,
            Some((_, best_score)) => match (score, best_score) {
                (Some(s), Some(b)) => s < b,
                (Some(_), None) => true,
                (None, _) => false,
            },
        };
        if better {
            best = Some((i, score));
        }
    }
    best.map(|(i, _)| i)
}
