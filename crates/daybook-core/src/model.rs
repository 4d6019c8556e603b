use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::datetime::store_date_serde;

/// Task lifecycle state. This is the authoritative field; the legacy
/// `completed` bool on [`Task`] is written to match it and only consulted
/// when a stored document predates the status field.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Status {
    #[serde(rename = "Not Started")]
    NotStarted,
    #[serde(rename = "In Progress")]
    InProgress,
    Completed,
}

impl Status {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "not started" | "not-started" | "notstarted" | "todo" => Some(Self::NotStarted),
            "in progress" | "in-progress" | "inprogress" | "started" => Some(Self::InProgress),
            "completed" | "complete" | "done" => Some(Self::Completed),
            _ => None,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::NotStarted => "Not Started",
            Self::InProgress => "In Progress",
            Self::Completed => "Completed",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
pub enum Priority {
    Low,
    Medium,
    High,
}

impl Priority {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "low" | "l" => Some(Self::Low),
            "medium" | "med" | "m" => Some(Self::Medium),
            "high" | "h" => Some(Self::High),
            _ => None,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Low => "Low",
            Self::Medium => "Medium",
            Self::High => "High",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub uuid: Uuid,

    #[serde(default)]
    pub id: Option<u64>,

    pub text: String,

    #[serde(with = "store_date_serde")]
    pub start: DateTime<Utc>,

    #[serde(with = "store_date_serde")]
    pub end: DateTime<Utc>,

    #[serde(default)]
    pub project: Option<Uuid>,

    pub priority: Priority,

    #[serde(default)]
    pub status: Option<Status>,

    /// Legacy mirror of `status == Completed`; kept for documents written by
    /// older clients that stored the flag alone.
    #[serde(default)]
    pub completed: bool,

    #[serde(default)]
    pub completed_dates: BTreeSet<String>,

    #[serde(with = "store_date_serde")]
    pub entry: DateTime<Utc>,

    #[serde(with = "store_date_serde")]
    pub modified: DateTime<Utc>,

    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl Task {
    pub fn new(
        text: String,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        project: Uuid,
        now: DateTime<Utc>,
        id: u64,
    ) -> Self {
        Self {
            uuid: Uuid::new_v4(),
            id: Some(id),
            text,
            start,
            end,
            project: Some(project),
            priority: Priority::Medium,
            status: Some(Status::NotStarted),
            completed: false,
            completed_dates: BTreeSet::new(),
            entry: now,
            modified: now,
            extra: BTreeMap::new(),
        }
    }

    /// Effective lifecycle state, falling back to the legacy bool for
    /// documents that never stored a status.
    pub fn effective_status(&self) -> Status {
        match self.status {
            Some(status) => status,
            None if self.completed => Status::Completed,
            None => Status::NotStarted,
        }
    }

    /// Sets status and keeps the legacy flag in lockstep.
    pub fn set_status(&mut self, status: Status) {
        self.status = Some(status);
        self.completed = status == Status::Completed;
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Project {
    pub uuid: Uuid,

    #[serde(default)]
    pub id: Option<u64>,

    pub name: String,

    #[serde(with = "store_date_serde")]
    pub created: DateTime<Utc>,

    #[serde(default)]
    pub completed: Option<bool>,

    #[serde(default, with = "store_date_serde::option")]
    pub due: Option<DateTime<Utc>>,
}

impl Project {
    pub fn new(name: String, now: DateTime<Utc>, id: u64) -> Self {
        Self {
            uuid: Uuid::new_v4(),
            id: Some(id),
            name,
            created: now,
            completed: None,
            due: None,
        }
    }

    pub fn status_label(&self, now: DateTime<Utc>) -> &'static str {
        if self.completed.unwrap_or(false) {
            "Completed"
        } else if self.due.map(|due| due < now).unwrap_or(false) {
            "Overdue"
        } else {
            "Ongoing"
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    Income,
    Expense,
}

impl EntryKind {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "income" => Some(Self::Income),
            "expense" => Some(Self::Expense),
            _ => None,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Income => "income",
            Self::Expense => "expense",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BudgetItem {
    pub uuid: Uuid,

    #[serde(default)]
    pub id: Option<u64>,

    pub kind: EntryKind,

    pub amount: f64,

    pub description: String,

    #[serde(with = "store_date_serde")]
    pub date: DateTime<Utc>,

    /// None means a general entry not tied to any project.
    #[serde(default)]
    pub project: Option<Uuid>,

    #[serde(default)]
    pub category: String,

    #[serde(with = "store_date_serde")]
    pub created: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Note {
    pub uuid: Uuid,

    #[serde(default)]
    pub id: Option<u64>,

    pub title: String,

    #[serde(default)]
    pub content: String,

    #[serde(with = "store_date_serde")]
    pub modified: DateTime<Utc>,
}

impl Note {
    pub fn new(title: String, content: String, now: DateTime<Utc>, id: u64) -> Self {
        Self {
            uuid: Uuid::new_v4(),
            id: Some(id),
            title,
            content,
            modified: now,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FocusSession {
    pub uuid: Uuid,

    #[serde(with = "store_date_serde")]
    pub date: DateTime<Utc>,

    pub minutes: u32,

    #[serde(default)]
    pub project: Option<Uuid>,

    pub completed: bool,
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use uuid::Uuid;

    use super::{Status, Task};

    #[test]
    fn status_serializes_with_original_labels() {
        let json = serde_json::to_string(&Status::NotStarted).expect("serialize");
        assert_eq!(json, "\"Not Started\"");
        let back: Status = serde_json::from_str("\"In Progress\"").expect("deserialize");
        assert_eq!(back, Status::InProgress);
    }

    #[test]
    fn legacy_completed_flag_backfills_missing_status() {
        let now = Utc::now();
        let mut task = Task::new("x".into(), now, now, Uuid::new_v4(), now, 1);
        task.status = None;
        task.completed = true;
        assert_eq!(task.effective_status(), Status::Completed);

        task.completed = false;
        assert_eq!(task.effective_status(), Status::NotStarted);
    }

    #[test]
    fn set_status_keeps_flag_in_lockstep() {
        let now = Utc::now();
        let mut task = Task::new("x".into(), now, now, Uuid::new_v4(), now, 1);
        task.set_status(Status::Completed);
        assert!(task.completed);
        task.set_status(Status::InProgress);
        assert!(!task.completed);
    }
}
