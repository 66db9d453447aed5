//! Task record: the value type carried through the pool and every policy.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Maximum length, in bytes, of a task's `name`.
pub const MAX_TASK_NAME_LEN: usize = 256;

/// Default number of lottery tickets assigned to a task that does not
/// specify its own.
pub const DEFAULT_LOTTERY_TICKETS: u32 = 10;

/// Default retry ceiling for a task that exhausts its attempts.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Urgency class. Lower numeric value is more urgent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    High = 0,
    Medium = 1,
    Low = 2,
}

impl Priority {
    /// One level less urgent than `self`, or `None` if already `Low`.
    pub fn demote(self) -> Option<Priority> {
        match self {
            Priority::High => Some(Priority::Medium),
            Priority::Medium => Some(Priority::Low),
            Priority::Low => None,
        }
    }

    /// One level more urgent than `self`, or `None` if already `High`.
    pub fn promote(self) -> Option<Priority> {
        match self {
            Priority::High => None,
            Priority::Medium => Some(Priority::High),
            Priority::Low => Some(Priority::Medium),
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Priority::High => "high",
            Priority::Medium => "medium",
            Priority::Low => "low",
        };
        f.write_str(s)
    }
}

impl FromStr for Priority {
    type Err = PriorityParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "high" => Ok(Priority::High),
            "medium" => Ok(Priority::Medium),
            "low" => Ok(Priority::Low),
            other => Err(PriorityParseError(other.to_owned())),
        }
    }
}

/// Error returned when parsing an invalid [`Priority`] string.
#[derive(Debug, Clone)]
pub struct PriorityParseError(pub String);

impl fmt::Display for PriorityParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid priority: {:?}", self.0)
    }
}

impl std::error::Error for PriorityParseError {}

/// Lifecycle state of a task.
///
/// ```text
/// Pending ──dequeue──▶ Running ──success──▶ Completed (terminal)
///                          │
///                          ├─ failure ───────▶ Failed (terminal)
///                          ├─ timeout, retries left ─▶ Pending (retry_count += 1)
///                          ├─ timeout, no retries ──▶ Timeout (terminal)
///                          └─ crash, retries left ──▶ Pending
///                             crash, no retries ─────▶ Failed
/// ```
/// Pending may also go straight to Failed via explicit cancellation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Timeout,
}

impl TaskStatus {
    /// Terminal statuses never transition out except the cancel-of-pending
    /// special case, which only ever applies to `Pending`.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            TaskStatus::Completed | TaskStatus::Failed | TaskStatus::Timeout
        )
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TaskStatus::Pending => "pending",
            TaskStatus::Running => "running",
            TaskStatus::Completed => "completed",
            TaskStatus::Failed => "failed",
            TaskStatus::Timeout => "timeout",
        };
        f.write_str(s)
    }
}

impl FromStr for TaskStatus {
    type Err = TaskStatusParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(TaskStatus::Pending),
            "running" => Ok(TaskStatus::Running),
            "completed" => Ok(TaskStatus::Completed),
            "failed" => Ok(TaskStatus::Failed),
            "timeout" => Ok(TaskStatus::Timeout),
            other => Err(TaskStatusParseError(other.to_owned())),
        }
    }
}

/// Error returned when parsing an invalid [`TaskStatus`] string.
#[derive(Debug, Clone)]
pub struct TaskStatusParseError(pub String);

impl fmt::Display for TaskStatusParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid task status: {:?}", self.0)
    }
}

impl std::error::Error for TaskStatusParseError {}

/// The nine interchangeable selection disciplines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Algorithm {
    Priority,
    Edf,
    Mlfq,
    Gang,
    RoundRobin,
    Sjf,
    Fifo,
    Lottery,
    Srtf,
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Algorithm::Priority => "priority",
            Algorithm::Edf => "edf",
            Algorithm::Mlfq => "mlfq",
            Algorithm::Gang => "gang",
            Algorithm::RoundRobin => "round_robin",
            Algorithm::Sjf => "sjf",
            Algorithm::Fifo => "fifo",
            Algorithm::Lottery => "lottery",
            Algorithm::Srtf => "srtf",
        };
        f.write_str(s)
    }
}

impl FromStr for Algorithm {
    type Err = AlgorithmParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "PRIORITY" => Ok(Algorithm::Priority),
            "EDF" => Ok(Algorithm::Edf),
            "MLFQ" => Ok(Algorithm::Mlfq),
            "GANG" => Ok(Algorithm::Gang),
            "ROUND_ROBIN" | "RR" => Ok(Algorithm::RoundRobin),
            "SJF" => Ok(Algorithm::Sjf),
            "FIFO" | "FCFS" => Ok(Algorithm::Fifo),
            "LOTTERY" => Ok(Algorithm::Lottery),
            "SRTF" => Ok(Algorithm::Srtf),
            other => Err(AlgorithmParseError(other.to_owned())),
        }
    }
}

/// Error returned when parsing an invalid [`Algorithm`] string.
#[derive(Debug, Clone)]
pub struct AlgorithmParseError(pub String);

impl fmt::Display for AlgorithmParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid scheduling algorithm: {:?}", self.0)
    }
}

impl std::error::Error for AlgorithmParseError {}

/// A unit of work known to the pool.
///
/// Created in [`TaskStatus::Pending`] by [`crate::pool::Pool::submit`];
/// every other field is mutable scheduling state updated in place while
/// the task's identity (`id`, `name`) never changes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: u64,
    pub name: String,
    pub priority: Priority,
    pub status: TaskStatus,

    /// Gang this task belongs to, if any. Tasks sharing a `gang_id` are
    /// dispatched together under the gang policy.
    pub gang_id: Option<i64>,
    pub lottery_tickets: u32,

    pub execution_time_ms: u64,
    pub timeout: Option<Duration>,
    pub deadline_time: Option<DateTime<Utc>>,

    pub creation_time: DateTime<Utc>,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,

    pub worker_id: Option<u32>,
    pub retry_count: u32,

    /// Time left to run, in milliseconds. Used by SRTF; lazily
    /// reinitialized to `execution_time_ms` when observed at zero while
    /// pending.
    pub remaining_time_ms: u64,

    /// Effective priority under MLFQ; demotes as CPU time accrues.
    pub current_mlfq_level: Priority,
    pub mlfq_level_start: DateTime<Utc>,
    pub cpu_time_used_ms: u64,
}

impl Task {
    /// Construct a fresh `Pending` task. `id` and `creation_time` are
    /// assigned by the caller (normally [`crate::pool::Pool::submit`]).
    pub fn new(
        id: u64,
        name: String,
        priority: Priority,
        execution_time_ms: u64,
        creation_time: DateTime<Utc>,
    ) -> Self {
        Task {
            id,
            name,
            priority,
            status: TaskStatus::Pending,
            gang_id: None,
            lottery_tickets: DEFAULT_LOTTERY_TICKETS,
            execution_time_ms,
            timeout: None,
            deadline_time: None,
            creation_time,
            start_time: None,
            end_time: None,
            worker_id: None,
            retry_count: 0,
            remaining_time_ms: execution_time_ms,
            current_mlfq_level: priority,
            mlfq_level_start: creation_time,
            cpu_time_used_ms: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn priority_display_roundtrip() {
        for p in [Priority::High, Priority::Medium, Priority::Low] {
            let s = p.to_string();
            let parsed: Priority = s.parse().expect("should parse");
            assert_eq!(p, parsed);
        }
    }

    #[test]
    fn priority_ordering_is_numeric() {
        assert!(Priority::High < Priority::Medium);
        assert!(Priority::Medium < Priority::Low);
    }

    #[test]
    fn priority_case_insensitive() {
        assert_eq!("HIGH".parse::<Priority>().unwrap(), Priority::High);
        assert_eq!("High".parse::<Priority>().unwrap(), Priority::High);
    }

    #[test]
    fn priority_invalid() {
        assert!("urgent".parse::<Priority>().is_err());
    }

    #[test]
    fn task_status_display_roundtrip() {
        for s in [
            TaskStatus::Pending,
            TaskStatus::Running,
            TaskStatus::Completed,
            TaskStatus::Failed,
            TaskStatus::Timeout,
        ] {
            let text = s.to_string();
            let parsed: TaskStatus = text.parse().expect("should parse");
            assert_eq!(s, parsed);
        }
    }

    #[test]
    fn task_status_terminal() {
        assert!(TaskStatus::Completed.is_terminal());
        assert!(TaskStatus::Failed.is_terminal());
        assert!(TaskStatus::Timeout.is_terminal());
        assert!(!TaskStatus::Pending.is_terminal());
        assert!(!TaskStatus::Running.is_terminal());
    }

    #[test]
    fn algorithm_aliases() {
        assert_eq!("RR".parse::<Algorithm>().unwrap(), Algorithm::RoundRobin);
        assert_eq!("FCFS".parse::<Algorithm>().unwrap(), Algorithm::Fifo);
        assert_eq!(
            "round_robin".parse::<Algorithm>().unwrap(),
            Algorithm::RoundRobin
        );
    }

    #[test]
    fn algorithm_invalid() {
        assert!("bogus".parse::<Algorithm>().is_err());
    }

    #[test]
    fn priority_demote_and_promote() {
        assert_eq!(Priority::High.demote(), Some(Priority::Medium));
        assert_eq!(Priority::Low.demote(), None);
        assert_eq!(Priority::Low.promote(), Some(Priority::Medium));
        assert_eq!(Priority::High.promote(), None);
    }

    #[test]
    fn new_task_defaults() {
        let now = Utc::now();
        let t = Task::new(1, "build".to_string(), Priority::Medium, 500, now);
        assert_eq!(t.status, TaskStatus::Pending);
        assert_eq!(t.remaining_time_ms, 500);
        assert_eq!(t.current_mlfq_level, Priority::Medium);
        assert_eq!(t.lottery_tickets, DEFAULT_LOTTERY_TICKETS);
        assert!(t.worker_id.is_none());
        assert!(t.gang_id.is_none());
    }
}
