//! LOTTERY: weighted random selection over `lottery_tickets`.
//!
//! Sum the tickets of every pending task, draw a uniform integer in
//! `[0, sum)`, then scan in array order accumulating tickets; the first
//! task whose cumulative sum strictly exceeds the draw wins.

use rand::Rng;

use crate::task::{Task, TaskStatus};

pub fn select(tasks: &[Task], rng: &mut impl Rng) -> Option<usize> {
    let total: u64 = tasks
        .iter()
        .filter(|t| t.status == TaskStatus::Pending)
        .map(|t| t.lottery_tickets as u64)
        .sum();
    if total == 0 {
        return None;
    }
    let draw = rng.random_range(0..total);
    select_with_draw(tasks, draw)
}

/// Deterministic core used by [`select`] and tests: pick the task whose
/// cumulative ticket count first exceeds `draw`.
pub fn select_with_draw(tasks: &[Task], draw: u64) -> Option<usize> {
    let mut cumulative: u64 = 0;
    for (i, t) in tasks.iter().enumerate() {
        if t.status != TaskStatus::Pending {
            continue;
        }
        cumulative += t.lottery_tickets as u64;
        if cumulative > draw {
            return Some(i);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::Priority;
    use chrono::Utc;

    fn pending_with_tickets(id: u64, tickets: u32) -> Task {
        let mut t = Task::new(id, format!("t{id}"), Priority::Medium, 100, Utc::now());
        t.lottery_tickets = tickets;
        t
    }

    #[test]
    fn draw_zero_picks_first_holder() {
        let tasks = vec![pending_with_tickets(1, 10), pending_with_tickets(2, 10)];
        assert_eq!(select_with_draw(&tasks, 0), Some(0));
    }

    #[test]
    fn draw_at_boundary_picks_second_holder() {
        let tasks = vec![pending_with_tickets(1, 10), pending_with_tickets(2, 10)];
        assert_eq!(select_with_draw(&tasks, 10), Some(1));
        assert_eq!(select_with_draw(&tasks, 19), Some(1));
    }

    #[test]
    fn no_pending_returns_none() {
        let mut tasks = vec![pending_with_tickets(1, 10)];
        tasks[0].status = TaskStatus::Running;
        assert_eq!(select(&tasks, &mut rand::rng()), None);
    }
}
