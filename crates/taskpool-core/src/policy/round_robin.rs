//! ROUND_ROBIN: circular scan starting just after the last dispatched
//! array position.

use crate::task::{Task, TaskStatus};

/// `last_index` is the index selected on the previous call (valid only
/// while `tasks.len()` is stable under the pool mutex, per the pool's
/// contract). Returns the new index to store back as `last_index`.
pub fn select(tasks: &[Task], last_index: Option<usize>) -> Option<usize> {
    if tasks.is_empty() {
        return None;
    }
    let start = last_index.map(|i| (i + 1) % tasks.len()).unwrap_or(0);
    for offset in 0..tasks.len() {
        let idx = (start + offset) % tasks.len();
        if tasks[idx].status == TaskStatus::Pending {
            return Some(idx);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::Priority;
    use chrono::Utc;

    fn pending(id: u64) -> Task {
        Task::new(id, format!("t{id}"), Priority::Medium, 100, Utc::now())
    }

    #[test]
    fn first_call_starts_at_zero() {
        let tasks = vec![pending(1), pending(2), pending(3)];
        assert_eq!(select(&tasks, None), Some(0));
    }

    #[test]
    fn wraps_around() {
        let tasks = vec![pending(1), pending(2), pending(3)];
        assert_eq!(select(&tasks, Some(2)), Some(0));
    }

    #[test]
    fn skips_non_pending_continuing_the_scan() {
        let mut tasks = vec![pending(1), pending(2), pending(3)];
        tasks[1].status = TaskStatus::Running;
        assert_eq!(select(&tasks, Some(0)), Some(2));
    }

    #[test]
    fn empty_is_none() {
        assert_eq!(select(&[], None), None);
    }
}
