use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::target::Target;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    InProgress,
    Completed,
    Blocked,
    Cancelled,
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::InProgress => write!(f, "in_progress"),
            Self::Completed => write!(f, "completed"),
            Self::Blocked => write!(f, "blocked"),
            Self::Cancelled => write!(f, "cancelled"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskPriority {
    Low,
    Medium,
    High,
    Critical,
}

/// A task assigned to an agent. Persisted as one JSON document per task
/// under the state directory; the wire format below is stable and shared
/// with external tooling, so field names and shapes must not drift.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskAssignment {
    pub task_id: String,
    /// Target of the agent the task is routed to, `session:window`.
    pub agent_id: Target,
    pub status: TaskStatus,
    pub priority: TaskPriority,
    pub estimated_hours: Option<u32>,
    pub actual_hours: Option<u32>,
    pub progress_percentage: Option<u8>,
    pub completion_notes: Option<String>,
    pub blockers: Vec<String>,
    pub tags: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub previous_status: Option<String>,
}

impl TaskAssignment {
    pub fn new(task_id: String, agent_id: Target, priority: TaskPriority) -> Self {
        let now = Utc::now();
        Self {
            task_id,
            agent_id,
            status: TaskStatus::Pending,
            priority,
            estimated_hours: None,
            actual_hours: None,
            progress_percentage: None,
            completion_notes: None,
            blockers: vec![],
            tags: vec![],
            created_at: now,
            updated_at: now,
            previous_status: None,
        }
    }

    /// Transition to a new status, recording the old one and bumping
    /// `updated_at`.
    pub fn transition(&mut self, status: TaskStatus) {
        self.previous_status = Some(self.status.to_string());
        self.status = status;
        self.updated_at = Utc::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_task() -> TaskAssignment {
        TaskAssignment::new(
            "task-42".into(),
            Target::parse("proj:3").unwrap(),
            TaskPriority::High,
        )
    }

    #[test]
    fn test_new_defaults() {
        let t = make_task();
        assert_eq!(t.status, TaskStatus::Pending);
        assert!(t.previous_status.is_none());
        assert!(t.blockers.is_empty());
        assert_eq!(t.created_at, t.updated_at);
    }

    #[test]
    fn test_transition_records_previous() {
        let mut t = make_task();
        t.transition(TaskStatus::InProgress);
        assert_eq!(t.status, TaskStatus::InProgress);
        assert_eq!(t.previous_status.as_deref(), Some("pending"));
        assert!(t.updated_at >= t.created_at);

        t.transition(TaskStatus::Blocked);
        assert_eq!(t.previous_status.as_deref(), Some("in_progress"));
    }

    #[test]
    fn test_wire_format_field_names() {
        let t = make_task();
        let json = serde_json::to_value(&t).unwrap();
        let obj = json.as_object().unwrap();
        for key in [
            "task_id",
            "agent_id",
            "status",
            "priority",
            "estimated_hours",
            "actual_hours",
            "progress_percentage",
            "completion_notes",
            "blockers",
            "tags",
            "created_at",
            "updated_at",
            "previous_status",
        ] {
            assert!(obj.contains_key(key), "missing key {key}");
        }
        assert_eq!(obj["status"], "pending");
        assert_eq!(obj["priority"], "high");
        assert_eq!(obj["agent_id"], "proj:3");
        assert!(obj["estimated_hours"].is_null());
    }

    #[test]
    fn test_deserialize_external_document() {
        let doc = r#"{
            "task_id": "t-1",
            "agent_id": "team:2",
            "status": "in_progress",
            "priority": "critical",
            "estimated_hours": 4,
            "actual_hours": null,
            "progress_percentage": 50,
            "completion_notes": null,
            "blockers": ["waiting on API keys"],
            "tags": ["backend"],
            "created_at": "2025-01-03T10:00:00Z",
            "updated_at": "2025-01-03T12:30:00Z",
            "previous_status": "pending"
        }"#;
        let t: TaskAssignment = serde_json::from_str(doc).unwrap();
        assert_eq!(t.status, TaskStatus::InProgress);
        assert_eq!(t.priority, TaskPriority::Critical);
        assert_eq!(t.agent_id, Target::parse("team:2").unwrap());
        assert_eq!(t.progress_percentage, Some(50));
        assert_eq!(t.blockers.len(), 1);
    }
}
