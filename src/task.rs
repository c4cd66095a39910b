//! Task data structure and free-text ingestion.
//!
//! This module defines the `Task` record exactly as it is stored in the remote
//! JSON document, plus the parser that turns a chat message into a new task.

use serde::{Deserialize, Deserializer, Serialize};

use crate::fields::*;

/// Category shown for tasks stored without one.
pub const FALLBACK_CATEGORY: &str = "General";

/// A single to-do item.
///
/// Every field except `id` and `name` is optional in the stored document and
/// falls back to its default. Keys this struct does not know about are kept in
/// `extra` and written back unchanged.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Task {
    #[serde(default, deserialize_with = "lenient_id")]
    pub id: u64,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub name: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub detail: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub cat: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub dept: String,
    #[serde(default)]
    pub pri: Priority,
    #[serde(default)]
    pub status: Status,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub deadline: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub notes: String,
    #[serde(default, deserialize_with = "array_or_empty")]
    pub checklist: Vec<serde_json::Value>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub created_at: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl Task {
    pub fn is_open(&self) -> bool {
        self.status != Status::Done
    }

    /// Category used for grouping and display.
    pub fn category(&self) -> &str {
        if self.cat.trim().is_empty() {
            FALLBACK_CATEGORY
        } else {
            &self.cat
        }
    }
}

fn null_as_empty<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
    let raw = Option::<serde_json::Value>::deserialize(d)?;
    Ok(match raw {
        Some(serde_json::Value::String(s)) => s,
        Some(serde_json::Value::Null) | None => String::new(),
        Some(other) => other.to_string(),
    })
}

/// Numeric ids, including ones written as strings. Anything else reads as 0.
fn lenient_id<'de, D: Deserializer<'de>>(d: D) -> Result<u64, D::Error> {
    let raw = Option::<serde_json::Value>::deserialize(d)?;
    Ok(match raw {
        Some(serde_json::Value::Number(n)) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0 && *f >= 0.0).map(|f| f as u64))
            .unwrap_or(0),
        Some(serde_json::Value::String(s)) => s.trim().parse().unwrap_or(0),
        _ => 0,
    })
}

fn array_or_empty<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<serde_json::Value>, D::Error> {
    let raw = Option::<serde_json::Value>::deserialize(d)?;
    Ok(match raw {
        Some(serde_json::Value::Array(items)) => items,
        _ => Vec::new(),
    })
}

/// The user-supplied part of a task parsed from a chat message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTask {
    pub name: String,
    pub pri: Priority,
    /// Taken verbatim after the first `|`. Not validated here.
    pub deadline: String,
}

impl NewTask {
    /// Parse `[!|~] name [| deadline]`.
    ///
    /// `!` marks high priority, `~` low, no sigil mid. Returns `None` when no
    /// task name is left after stripping sigil and deadline.
    pub fn parse(text: &str) -> Option<Self> {
        let text = text.trim();
        let (pri, rest) = if let Some(rest) = text.strip_prefix('!') {
            (Priority::High, rest.trim())
        } else if let Some(rest) = text.strip_prefix('~') {
            (Priority::Low, rest.trim())
        } else {
            (Priority::Mid, text)
        };

        let (name, deadline) = match rest.split_once('|') {
            Some((name, deadline)) => (name.trim(), deadline.trim()),
            None => (rest, ""),
        };

        if name.is_empty() {
            return None;
        }
        Some(NewTask {
            name: name.to_string(),
            pri,
            deadline: deadline.to_string(),
        })
    }
}
