//! MLFQ: multi-level feedback queue. Selection picks the lowest
//! `current_mlfq_level` (most urgent); demotion and promotion are applied
//! separately as CPU time and wait time accrue.

use chrono::{DateTime, Utc};

use crate::task::{Priority, Task, TaskStatus};

/// Default time slice before a running task is demoted a level.
pub const DEFAULT_TIME_SLICE_MS: u64 = 1_000;

/// Age, in seconds, a pending task must wait at its current level before
/// it is promoted one level. This is a REDESIGN addition: the reference
/// implementation never promotes, so a task demoted to LOW under
/// sustained load could starve forever. Promotion is documented here and
/// applied by [`age_promote`], called by the pool's housekeeping sweep.
pub const PROMOTION_AGE_SECONDS: i64 = 10;

pub fn select(tasks: &[Task]) -> Option<usize> {
    let mut best: Option<(usize, Priority)> = None;
    for (i, t) in tasks.iter().enumerate() {
        if t.status != TaskStatus::Pending {
            continue;
        }
        match best {
            Some((_, score)) if t.current_mlfq_level >= score => {}
            _ => best = Some((i, t.current_mlfq_level)),
        }
    }
    best.map(|(i, _)| i)
}

/// Demote a running task one level if it has used up its slice at the
/// current level. Called by the worker as it reports CPU time progress.
/// A no-op once the task is already at `Low`.
pub fn demote_if_expired(task: &mut Task, now: DateTime<Utc>, time_slice_ms: u64) {
    let in_level_ms = (now - task.mlfq_level_start).num_milliseconds().max(0) as u64;
    if in_level_ms > time_slice_ms {
        if let Some(next) = task.current_mlfq_level.demote() {
            task.current_mlfq_level = next;
            task.mlfq_level_start = now;
        }
    }
}

/// Promote any pending task that has waited at its current level longer
/// than [`PROMOTION_AGE_SECONDS`], one level at a time. Documented
/// REDESIGN: the source has no analogous aging rule.
pub fn age_promote(tasks: &mut [Task], now: DateTime<Utc>) {
    for t in tasks.iter_mut() {
        if t.status != TaskStatus::Pending {
            continue;
        }
        let waited = (now - t.mlfq_level_start).num_seconds();
        if waited >= PROMOTION_AGE_SECONDS {
            if let Some(next) = t.current_mlfq_level.promote() {
                t.current_mlfq_level = next;
                t.mlfq_level_start = now;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration as ChronoDuration;

    fn pending_at_level(id: u64, level: Priority) -> Task {
        let mut t = Task::new(id, format!("t{id}"), Priority::Low, 100, Utc::now());
        t.current_mlfq_level = level;
        t
    }

    #[test]
    fn picks_lowest_level() {
        let tasks = vec![
            pending_at_level(1, Priority::Low),
            pending_at_level(2, Priority::High),
        ];
        assert_eq!(select(&tasks), Some(1));
    }

    #[test]
    fn demote_moves_down_one_level() {
        let mut t = pending_at_level(1, Priority::High);
        t.mlfq_level_start = Utc::now() - ChronoDuration::milliseconds(2000);
        demote_if_expired(&mut t, Utc::now(), 1_000);
        assert_eq!(t.current_mlfq_level, Priority::Medium);
    }

    #[test]
    fn demote_stops_at_low() {
        let mut t = pending_at_level(1, Priority::Low);
        t.mlfq_level_start = Utc::now() - ChronoDuration::milliseconds(5000);
        demote_if_expired(&mut t, Utc::now(), 1_000);
        assert_eq!(t.current_mlfq_level, Priority::Low);
    }

    #[test]
    fn demote_no_op_within_slice() {
        let mut t = pending_at_level(1, Priority::High);
        demote_if_expired(&mut t, Utc::now(), 1_000);
        assert_eq!(t.current_mlfq_level, Priority::High);
    }

    #[test]
    fn age_promote_lifts_starved_task() {
        let mut tasks = vec![pending_at_level(1, Priority::Low)];
        tasks[0].mlfq_level_start = Utc::now() - ChronoDuration::seconds(20);
        age_promote(&mut tasks, Utc::now());
        assert_eq!(tasks[0].current_mlfq_level, Priority::Medium);
    }
}
