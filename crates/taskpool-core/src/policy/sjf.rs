//! SJF: shortest job first, by nominal `execution_time_ms`.

use crate::task::{Task, TaskStatus};

pub fn select(tasks: &[Task]) -> Option<usize> {
    let mut best: Option<(usize, u64)> = None;
    for (i, t) in tasks.iter().enumerate() {
        if t.status != TaskStatus::Pending {
            continue;
        }
        match best {
            Some((_, score)) if t.execution_time_ms >= score => {}
            _ => best = Some((i, t.execution_time_ms)),
        }
    }
    best.map(|(i, _)| i)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::Priority;
    use chrono::Utc;

    fn pending_with_duration(id: u64, ms: u64) -> Task {
        Task::new(id, format!("t{id}"), Priority::Medium, ms, Utc::now())
    }

    #[test]
    fn picks_shortest() {
        let tasks = vec![
            pending_with_duration(1, 500),
            pending_with_duration(2, 50),
            pending_with_duration(3, 200),
        ];
        assert_eq!(select(&tasks), Some(1));
    }

    #[test]
    fn ties_break_on_array_order() {
        let tasks = vec![pending_with_duration(1, 100), pending_with_duration(2, 100)];
        assert_eq!(select(&tasks), Some(0));
    }
}
