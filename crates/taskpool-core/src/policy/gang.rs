//! GANG: a set of tasks sharing `gang_id` that must be dispatched together.
//!
//! Selection for `select_index` just hands back the first pending task
//! (array order); actually starting a gang together is a distinct
//! operation ([`dequeue_members`]) because it transitions more than one
//! record per call. A worker that draws a gang task via `select_next`
//! calls back through `Pool::dequeue_gang` (wired over IPC as
//! `Request::DequeueGang`) to bring the rest of the gang up at once.

use crate::task::{Task, TaskStatus};

/// First pending task in array order, used as a fallback when the pool is
/// asked for a single task under the gang policy.
pub fn select_any(tasks: &[Task]) -> Option<usize> {
    tasks.iter().position(|t| t.status == TaskStatus::Pending)
}

/// Count pending tasks in gang `gang_id`.
pub fn gang_size(tasks: &[Task], gang_id: i64) -> usize {
    tasks
        .iter()
        .filter(|t| t.status == TaskStatus::Pending && t.gang_id == Some(gang_id))
        .count()
}

/// Indices, in array order, of up to `max` pending members of `gang_id`.
///
/// A partial result (fewer than `max`) is expected when the gang has fewer
/// members than requested; the caller starts whichever are returned.
pub fn dequeue_members(tasks: &[Task], gang_id: i64, max: usize) -> Vec<usize> {
    tasks
        .iter()
        .enumerate()
        .filter(|(_, t)| t.status == TaskStatus::Pending && t.gang_id == Some(gang_id))
        .take(max)
        .map(|(i, _)| i)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::Priority;
    use chrono::Utc;

    fn pending_in_gang(id: u64, gang_id: i64) -> Task {
        let mut t = Task::new(id, format!("t{id}"), Priority::Medium, 100, Utc::now());
        t.gang_id = Some(gang_id);
        t
    }

    #[test]
    fn gang_size_counts_only_pending_matching_gang() {
        let mut tasks = vec![pending_in_gang(1, 7), pending_in_gang(2, 7), pending_in_gang(3, 8)];
        tasks[1].status = TaskStatus::Running;
        assert_eq!(gang_size(&tasks, 7), 1);
        assert_eq!(gang_size(&tasks, 8), 1);
        assert_eq!(gang_size(&tasks, 99), 0);
    }

    #[test]
    fn dequeue_members_caps_at_max() {
        let tasks = vec![
            pending_in_gang(1, 7),
            pending_in_gang(2, 7),
            pending_in_gang(3, 7),
        ];
        let members = dequeue_members(&tasks, 7, 2);
        assert_eq!(members, vec![0, 1]);
    }

    #[test]
    fn dequeue_members_partial_when_fewer_exist() {
        let tasks = vec![pending_in_gang(1, 7)];
        let members = dequeue_members(&tasks, 7, 5);
        assert_eq!(members, vec![0]);
    }

    #[test]
    fn select_any_picks_first_pending() {
        let mut tasks = vec![pending_in_gang(1, 7), pending_in_gang(2, 8)];
        tasks[0].status = TaskStatus::Running;
        assert_eq!(select_any(&tasks), Some(1));
    }
}
