//! The task collection and the date/text helpers shared by every view.
//!
//! `Database` is the entire persisted state: one JSON array of tasks, read and
//! written as a whole by a [`crate::store::TaskStore`].

use std::collections::HashSet;

use chrono::{Local, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::fields::*;
use crate::task::{NewTask, Task};

/// Timestamp format for `created_at` / `completed_at`.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M";

/// In-memory copy of the remote task document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Database {
    pub tasks: Vec<Task>,
}

impl Database {
    pub fn new(tasks: Vec<Task>) -> Self {
        Database { tasks }
    }

    /// Parse a downloaded document.
    pub fn from_json(bytes: &[u8]) -> serde_json::Result<Self> {
        serde_json::from_slice(bytes)
    }

    /// Serialize for upload: pretty printed, non-ASCII kept as is.
    pub fn to_json(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec_pretty(self)
    }

    /// Generate the next available task ID.
    pub fn next_id(&self) -> u64 {
        self.tasks.iter().map(|t| t.id).max().unwrap_or(0) + 1
    }

    /// Get a mutable reference to a task by ID.
    pub fn get_mut(&mut self, id: u64) -> Option<&mut Task> {
        self.tasks.iter_mut().find(|t| t.id == id)
    }

    /// Open (not done) tasks in collection order.
    pub fn open_tasks(&self) -> Vec<&Task> {
        self.tasks.iter().filter(|t| t.is_open()).collect()
    }

    pub fn done_count(&self) -> usize {
        self.tasks.iter().filter(|t| t.status == Status::Done).count()
    }

    /// IDs that occur more than once, in first-repeat order.
    pub fn duplicate_ids(&self) -> Vec<u64> {
        let mut seen = HashSet::new();
        let mut dups = Vec::new();
        for t in &self.tasks {
            if !seen.insert(t.id) && !dups.contains(&t.id) {
                dups.push(t.id);
            }
        }
        dups
    }

    /// Append a freshly ingested task and return its id.
    pub fn add(&mut self, new: NewTask, category: &str, created_at: String) -> u64 {
        let id = self.next_id();
        self.tasks.push(Task {
            id,
            name: new.name,
            detail: String::new(),
            cat: category.to_string(),
            dept: "—".to_string(),
            pri: new.pri,
            status: Status::Open,
            deadline: new.deadline,
            notes: "Added via bot".to_string(),
            checklist: Vec::new(),
            created_at,
            completed_at: None,
            extra: Default::default(),
        });
        id
    }
}

/// Today's date in local time.
pub fn today() -> NaiveDate {
    Local::now().date_naive()
}

/// Current local time in [`TIMESTAMP_FORMAT`].
pub fn now_stamp() -> String {
    Local::now().format(TIMESTAMP_FORMAT).to_string()
}

/// Signed days from `today` until an ISO `YYYY-MM-DD` deadline.
///
/// Negative means overdue. `None` for empty or unparsable input, which callers
/// must treat as "no deadline", never as zero.
pub fn deadline_days(deadline: &str, today: NaiveDate) -> Option<i64> {
    let deadline = deadline.trim();
    if deadline.is_empty() {
        return None;
    }
    let due = NaiveDate::parse_from_str(deadline, "%Y-%m-%d").ok()?;
    Some((due - today).num_days())
}

/// Remove characters that would open or close Markdown emphasis.
pub fn sanitize_markup(s: &str) -> String {
    s.chars().filter(|c| !matches!(c, '*' | '_' | '`')).collect()
}

/// Keep at most `width` characters.
pub fn truncate(s: &str, width: usize) -> String {
    s.chars().take(width).collect()
}
