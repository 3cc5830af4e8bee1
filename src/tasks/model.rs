use std::str::FromStr;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

/// One unit of work owned by a user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: String,
    pub description: String,
    pub is_completed: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(
        default,
        with = "time::serde::rfc3339::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub completed_at: Option<OffsetDateTime>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_editing: Option<bool>,
}

impl Task {
    pub fn new(description: String, now: OffsetDateTime) -> Self {
        Self {
            id: new_task_id(),
            description,
            is_completed: false,
            created_at: now,
            completed_at: None,
            is_editing: Some(false),
        }
    }

    pub fn is_editing(&self) -> bool {
        self.is_editing.unwrap_or(false)
    }

    /// Merge `patch` into the task and re-derive `completed_at`.
    ///
    /// `completed_at` is kept (patch value, then the existing one, then `now`)
    /// only while the merged task is completed; otherwise it is cleared no
    /// matter what the patch carried.
    pub fn apply(&mut self, patch: TaskPatch, now: OffsetDateTime) {
        if let Some(description) = patch.description {
            self.description = description;
        }
        if let Some(is_completed) = patch.is_completed {
            self.is_completed = is_completed;
        }
        if let Some(is_editing) = patch.is_editing {
            self.is_editing = Some(is_editing);
        }
        self.completed_at = if self.is_completed {
            Some(patch.completed_at.or(self.completed_at).unwrap_or(now))
        } else {
            None
        };
    }
}

/// 32 lowercase hex chars, random.
pub fn new_task_id() -> String {
    Uuid::new_v4().simple().to_string()
}

pub fn is_blank(description: &str) -> bool {
    description.trim().is_empty()
}

/// Partial update for a task. `id` and `created_at` are not patchable.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskPatch {
    pub description: Option<String>,
    pub is_completed: Option<bool>,
    pub completed_at: Option<OffsetDateTime>,
    pub is_editing: Option<bool>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum View {
    #[default]
    All,
    Active,
    Completed,
}

impl View {
    /// Missing or unknown selectors render as `all`.
    pub fn parse_lenient(raw: Option<&str>) -> Self {
        raw.and_then(|v| v.parse().ok()).unwrap_or_default()
    }
}

impl FromStr for View {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "all" => Ok(View::All),
            "active" => Ok(View::Active),
            "completed" => Ok(View::Completed),
            other => anyhow::bail!("unknown view `{}`", other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    fn task() -> Task {
        Task::new("Buy milk".into(), datetime!(2024-01-01 10:00 UTC))
    }

    #[test]
    fn new_task_is_active_without_completed_at() {
        let t = task();
        assert!(!t.is_completed);
        assert_eq!(t.completed_at, None);
        assert_eq!(t.id.len(), 32);
        assert!(t.id.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn completing_keeps_supplied_timestamp() {
        let mut t = task();
        let at = datetime!(2024-01-02 08:30 UTC);
        t.apply(
            TaskPatch {
                is_completed: Some(true),
                completed_at: Some(at),
                ..Default::default()
            },
            datetime!(2024-01-03 00:00 UTC),
        );
        assert_eq!(t.completed_at, Some(at));
    }

    #[test]
    fn completing_without_timestamp_uses_now() {
        let mut t = task();
        let now = datetime!(2024-01-03 00:00 UTC);
        t.apply(
            TaskPatch {
                is_completed: Some(true),
                ..Default::default()
            },
            now,
        );
        assert_eq!(t.completed_at, Some(now));
    }

    #[test]
    fn uncompleting_forces_completed_at_clear() {
        let mut t = task();
        let now = datetime!(2024-01-03 00:00 UTC);
        t.apply(
            TaskPatch {
                is_completed: Some(true),
                completed_at: Some(now),
                ..Default::default()
            },
            now,
        );
        t.apply(
            TaskPatch {
                is_completed: Some(false),
                completed_at: Some(now),
                ..Default::default()
            },
            now,
        );
        assert!(!t.is_completed);
        assert_eq!(t.completed_at, None);
    }

    #[test]
    fn json_uses_camel_case_and_omits_completed_at() {
        let json = serde_json::to_value(task()).unwrap();
        assert_eq!(json["isCompleted"], false);
        assert_eq!(json["createdAt"], "2024-01-01T10:00:00Z");
        assert!(json.get("completedAt").is_none());
    }

    #[test]
    fn view_parsing_falls_back_to_all() {
        assert_eq!(View::parse_lenient(Some("active")), View::Active);
        assert_eq!(View::parse_lenient(Some("Completed")), View::Completed);
        assert_eq!(View::parse_lenient(Some("bogus")), View::All);
        assert_eq!(View::parse_lenient(None), View::All);
    }
}
