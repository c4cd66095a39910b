//! Enumerations and field types for task management.
//!
//! The task document is edited by hand and by other tools, so both enums parse
//! leniently: anything unrecognised falls back to the default variant instead of
//! failing the whole load.

use serde::{Deserialize, Deserializer, Serialize};

/// Priority classification for task importance.
#[derive(Debug, Clone, Copy, Default, Serialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum Priority {
    High,
    Mid,
    #[default]
    Low,
}

impl Priority {
    /// Parse a stored priority value. Unknown values map to `Low`.
    pub fn parse(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "high" => Priority::High,
            "mid" => Priority::Mid,
            _ => Priority::Low,
        }
    }

    /// Status-light icon used in every task rendering.
    pub fn icon(self) -> &'static str {
        match self {
            Priority::High => "🔴",
            Priority::Mid => "🟡",
            Priority::Low => "🟢",
        }
    }
}

impl<'de> Deserialize<'de> for Priority {
    fn deserialize<D: Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        let raw = Option::<serde_json::Value>::deserialize(d)?;
        Ok(raw
            .as_ref()
            .and_then(serde_json::Value::as_str)
            .map(Priority::parse)
            .unwrap_or_default())
    }
}

/// Task lifecycle status. Transitions only ever go towards `Done`.
#[derive(Debug, Clone, Copy, Default, Serialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum Status {
    #[default]
    Open,
    Wip,
    Done,
}

impl Status {
    /// Parse a stored status value. Unknown values map to `Open`.
    pub fn parse(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "wip" => Status::Wip,
            "done" => Status::Done,
            _ => Status::Open,
        }
    }
}

impl<'de> Deserialize<'de> for Status {
    fn deserialize<D: Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        let raw = Option::<serde_json::Value>::deserialize(d)?;
        Ok(raw
            .as_ref()
            .and_then(serde_json::Value::as_str)
            .map(Status::parse)
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_priority_falls_back_to_low() {
        let p: Priority = serde_json::from_str("\"urgent\"").unwrap();
        assert_eq!(p, Priority::Low);
        let p: Priority = serde_json::from_str("null").unwrap();
        assert_eq!(p, Priority::Low);
        let p: Priority = serde_json::from_str("3").unwrap();
        assert_eq!(p, Priority::Low);
        let p: Priority = serde_json::from_str("\"HIGH\"").unwrap();
        assert_eq!(p, Priority::High);
    }

    #[test]
    fn test_status_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&Status::Wip).unwrap(), "\"wip\"");
        assert_eq!(serde_json::to_string(&Priority::Mid).unwrap(), "\"mid\"");
        let s: Status = serde_json::from_str("\"paused\"").unwrap();
        assert_eq!(s, Status::Open);
    }
}
