use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::target::Target;

/// Role of an agent, derived from its window name. Window names carry
/// semantic intent via the `Claude-<role>` convention.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    Pm,
    Orchestrator,
    Frontend,
    Backend,
    Qa,
    DevOps,
    Reviewer,
    Writer,
    Database,
    Developer,
}

/// Substring lookup table, checked in order; first match wins.
const ROLE_TABLE: &[(&[&str], Role)] = &[
    (&["pm", "project-manager", "manager"], Role::Pm),
    (&["orchestrator", "orc"], Role::Orchestrator),
    (&["frontend"], Role::Frontend),
    (&["backend"], Role::Backend),
    (&["qa", "test"], Role::Qa),
    (&["devops", "ops"], Role::DevOps),
    (&["reviewer", "review"], Role::Reviewer),
    (&["docs", "writer", "documentation"], Role::Writer),
    (&["db", "database", "data"], Role::Database),
];

impl Role {
    /// Derive a role from a window name (case-insensitive substring match).
    /// Anything unrecognized is a plain Developer.
    pub fn from_window_name(window_name: &str) -> Role {
        let name = window_name.to_lowercase();
        for (needles, role) in ROLE_TABLE {
            if needles.iter().any(|n| name.contains(n)) {
                return *role;
            }
        }
        Role::Developer
    }

    /// Parse a role keyword as supplied on the command line or in a team
    /// spec (e.g. `pm`, `qa`, `backend`).
    pub fn parse_keyword(s: &str) -> Option<Role> {
        match s.to_lowercase().as_str() {
            "pm" | "project-manager" => Some(Role::Pm),
            "orchestrator" | "orc" => Some(Role::Orchestrator),
            "frontend" => Some(Role::Frontend),
            "backend" => Some(Role::Backend),
            "qa" | "test" => Some(Role::Qa),
            "devops" => Some(Role::DevOps),
            "reviewer" => Some(Role::Reviewer),
            "docs" | "writer" => Some(Role::Writer),
            "db" | "database" => Some(Role::Database),
            "developer" | "dev" => Some(Role::Developer),
            _ => None,
        }
    }

    /// Only PM and Orchestrator must be unique within a session.
    pub fn is_unique_per_session(&self) -> bool {
        matches!(self, Role::Pm | Role::Orchestrator)
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pm => write!(f, "PM"),
            Self::Orchestrator => write!(f, "Orchestrator"),
            Self::Frontend => write!(f, "Frontend"),
            Self::Backend => write!(f, "Backend"),
            Self::Qa => write!(f, "QA"),
            Self::DevOps => write!(f, "DevOps"),
            Self::Reviewer => write!(f, "Reviewer"),
            Self::Writer => write!(f, "Writer"),
            Self::Database => write!(f, "Database"),
            Self::Developer => write!(f, "Developer"),
        }
    }
}

/// Logical state of an agent pane as inferred from snapshots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AgentState {
    /// Pane content changed meaningfully, or a working indicator is shown.
    Active,
    /// Claude interface present, no activity.
    Idle,
    /// Claude interface present but never briefed.
    Fresh,
    /// Text sitting in the input box, not submitted.
    MessageQueued,
    /// Interface gone, shell prompt visible.
    Crashed,
    /// Interface gone, not a shell prompt.
    Error,
    /// Capture failed.
    Unknown,
}

impl std::fmt::Display for AgentState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Active => write!(f, "Active"),
            Self::Idle => write!(f, "Idle"),
            Self::Fresh => write!(f, "Fresh"),
            Self::MessageQueued => write!(f, "MessageQueued"),
            Self::Crashed => write!(f, "Crashed"),
            Self::Error => write!(f, "Error"),
            Self::Unknown => write!(f, "Unknown"),
        }
    }
}

/// One discovered agent: a Claude process attached to one tmux window.
/// Agents are not persisted; they are rediscovered on every scan.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentStatus {
    pub target: Target,
    pub role: Role,
    pub window_name: String,
    pub state: AgentState,
    /// Last `pane_activity` as reported by tmux, when known.
    pub last_activity: Option<DateTime<Utc>>,
}

/// Window-name filter for the fast discovery path: does this window look
/// like it hosts an agent at all?
pub fn is_agent_window(window_name: &str) -> bool {
    const KEYWORDS: &[&str] = &[
        "claude",
        "pm",
        "developer",
        "qa",
        "devops",
        "reviewer",
        "backend",
        "frontend",
    ];
    let name = window_name.to_lowercase();
    KEYWORDS.iter().any(|k| name.contains(k))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_from_window_name() {
        assert_eq!(Role::from_window_name("Claude-pm"), Role::Pm);
        assert_eq!(Role::from_window_name("Claude-project-manager"), Role::Pm);
        assert_eq!(Role::from_window_name("Claude-orchestrator"), Role::Orchestrator);
        assert_eq!(Role::from_window_name("Claude-frontend-dev-1"), Role::Frontend);
        assert_eq!(Role::from_window_name("Claude-backend"), Role::Backend);
        assert_eq!(Role::from_window_name("Claude-qa-2"), Role::Qa);
        assert_eq!(Role::from_window_name("integration-test"), Role::Qa);
        assert_eq!(Role::from_window_name("Claude-devops"), Role::DevOps);
        assert_eq!(Role::from_window_name("Claude-reviewer"), Role::Reviewer);
        assert_eq!(Role::from_window_name("Claude-docs"), Role::Writer);
        assert_eq!(Role::from_window_name("Claude-database"), Role::Database);
        assert_eq!(Role::from_window_name("Claude-something"), Role::Developer);
    }

    #[test]
    fn test_role_first_match_wins() {
        // "pm" appears before "backend" in the table, so a window named
        // for both resolves to PM.
        assert_eq!(Role::from_window_name("Claude-pm-backend"), Role::Pm);
        // "orc" beats "frontend" for the same reason.
        assert_eq!(Role::from_window_name("orc-frontend"), Role::Orchestrator);
    }

    #[test]
    fn test_role_case_insensitive() {
        assert_eq!(Role::from_window_name("CLAUDE-PM"), Role::Pm);
        assert_eq!(Role::from_window_name("Claude-QA"), Role::Qa);
    }

    #[test]
    fn test_role_uniqueness() {
        assert!(Role::Pm.is_unique_per_session());
        assert!(Role::Orchestrator.is_unique_per_session());
        assert!(!Role::Developer.is_unique_per_session());
        assert!(!Role::Qa.is_unique_per_session());
    }

    #[test]
    fn test_parse_keyword() {
        assert_eq!(Role::parse_keyword("pm"), Some(Role::Pm));
        assert_eq!(Role::parse_keyword("DevOps"), Some(Role::DevOps));
        assert_eq!(Role::parse_keyword("dev"), Some(Role::Developer));
        assert_eq!(Role::parse_keyword("wizard"), None);
    }

    #[test]
    fn test_is_agent_window() {
        assert!(is_agent_window("Claude-pm"));
        assert!(is_agent_window("backend-dev"));
        assert!(is_agent_window("QA-runner"));
        assert!(!is_agent_window("bash"));
        assert!(!is_agent_window("vim"));
        assert!(!is_agent_window("server-logs"));
    }
}
