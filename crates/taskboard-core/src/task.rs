use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use anyhow::anyhow;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    #[default]
    Normal,
    Urgent,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    #[default]
    Open,
    Done,
}

/// ANSI colour used for a badge cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BadgeColor {
    Red,
    Gray,
    Orange,
    Green,
}

impl BadgeColor {
    pub fn ansi_code(self) -> &'static str {
        match self {
            BadgeColor::Red => "31",
            BadgeColor::Gray => "90",
            BadgeColor::Orange => "33",
            BadgeColor::Green => "32",
        }
    }
}

impl Priority {
    pub fn as_str(self) -> &'static str {
        match self {
            Priority::Normal => "normal",
            Priority::Urgent => "urgent",
        }
    }

    pub fn badge(self) -> BadgeColor {
        match self {
            Priority::Urgent => BadgeColor::Red,
            Priority::Normal => BadgeColor::Gray,
        }
    }
}

impl Status {
    pub fn as_str(self) -> &'static str {
        match self {
            Status::Open => "open",
            Status::Done => "done",
        }
    }

    pub fn is_open(self) -> bool {
        self == Status::Open
    }

    pub fn badge(self) -> BadgeColor {
        match self {
            Status::Open => BadgeColor::Orange,
            Status::Done => BadgeColor::Green,
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Priority {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "normal" => Ok(Priority::Normal),
            "urgent" => Ok(Priority::Urgent),
            other => Err(anyhow!("invalid priority: {other} (expected normal or urgent)")),
        }
    }
}

impl FromStr for Status {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "open" => Ok(Status::Open),
            "done" => Ok(Status::Done),
            other => Err(anyhow!("invalid status: {other} (expected open or done)")),
        }
    }
}

/// A task record as the server returns it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Task {
    #[serde(rename = "_id")]
    pub id: String,

    #[serde(default)]
    pub name: String,

    #[serde(default)]
    pub priority: Priority,

    #[serde(default)]
    pub status: Status,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,

    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl Task {
    pub fn new_open(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            priority: Priority::Normal,
            status: Status::Open,
            due: None,
            owner: None,
            extra: BTreeMap::new(),
        }
    }
}

/// One page of the listing endpoint. `task_count` is the server total for the
/// filter, not the length of `tasks`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct TaskPage {
    #[serde(default)]
    pub tasks: Vec<Task>,

    #[serde(rename = "taskCount", default)]
    pub task_count: u64,
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};
    use serde_json::json;

    use super::{Priority, Status, Task, TaskPage};

    #[test]
    fn decodes_server_task_and_keeps_unknown_fields() {
        let raw = json!({
            "_id": "65f0",
            "name": "Ship release",
            "priority": "urgent",
            "status": "open",
            "due": "2026-10-20T00:00:00.000Z",
            "owner": "123",
            "__v": 0
        });

        let task: Task = serde_json::from_value(raw).expect("decode task");
        assert_eq!(task.id, "65f0");
        assert_eq!(task.priority, Priority::Urgent);
        assert!(task.status.is_open());
        assert_eq!(
            task.due,
            Some(Utc.with_ymd_and_hms(2026, 10, 20, 0, 0, 0).single().expect("valid date"))
        );
        assert_eq!(task.owner.as_deref(), Some("123"));
        assert_eq!(task.extra.get("__v"), Some(&json!(0)));

        let back = serde_json::to_value(&task).expect("encode task");
        assert_eq!(back["_id"], json!("65f0"));
        assert_eq!(back["__v"], json!(0));
    }

    #[test]
    fn page_count_is_independent_of_array_length() {
        let page: TaskPage = serde_json::from_value(json!({
            "tasks": [{"_id": "1", "name": "a", "priority": "normal", "status": "done"}],
            "taskCount": 42
        }))
        .expect("decode page");

        assert_eq!(page.tasks.len(), 1);
        assert_eq!(page.task_count, 42);
        assert_eq!(page.tasks[0].status, Status::Done);
    }

    #[test]
    fn parses_enums_case_insensitively() {
        assert_eq!("URGENT".parse::<Priority>().expect("priority"), Priority::Urgent);
        assert_eq!(" done ".parse::<Status>().expect("status"), Status::Done);
        assert!("later".parse::<Status>().is_err());
    }
}
