//! PRIORITY: minimise the numeric priority value (HIGH=0 wins).

use crate::task::{Task, TaskStatus};

pub fn select(tasks: &[Task]) -> Option<usize> {
    let mut best: Option<(usize, crate::task::Priority)> = None;
    for (i, t) in tasks.iter().enumerate() {
        if t.status != TaskStatus::Pending {
            continue;
        }
        match best {
            Some((_, score)) if t.priority >= score => {}
            _ => best = Some((i, t.priority)),
        }
    }
    best.map(|(i, _)| i)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::Priority;
    use chrono::Utc;

    fn pending(id: u64, priority: Priority) -> Task {
        Task::new(id, format!("t{id}"), priority, 100, Utc::now())
    }

    #[test]
    fn picks_highest_urgency() {
        let tasks = vec![
            pending(1, Priority::Low),
            pending(2, Priority::High),
            pending(3, Priority::Medium),
        ];
        assert_eq!(select(&tasks), Some(1));
    }

    #[test]
    fn ties_break_on_array_order() {
        let tasks = vec![pending(1, Priority::High), pending(2, Priority::High)];
        assert_eq!(select(&tasks), Some(0));
    }

    #[test]
    fn skips_non_pending() {
        let mut tasks = vec![pending(1, Priority::High)];
        tasks[0].status = crate::task::TaskStatus::Running;
        assert_eq!(select(&tasks), None);
    }

    #[test]
    fn empty_returns_none() {
        assert_eq!(select(&[]), None);
    }
}
