use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::agent::Role;
use crate::domain::target::{Target, is_valid_session_name};
use crate::error::ConfigError;

pub const MAX_TEAM_SIZE: usize = 20;
pub const MAX_MEMBER_BRIEFING_CHARS: usize = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CoordinationStrategy {
    HubAndSpoke,
    PeerToPeer,
    Hierarchical,
}

impl CoordinationStrategy {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "hub_and_spoke" => Some(Self::HubAndSpoke),
            "peer_to_peer" => Some(Self::PeerToPeer),
            "hierarchical" => Some(Self::Hierarchical),
            _ => None,
        }
    }
}

impl std::fmt::Display for CoordinationStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::HubAndSpoke => write!(f, "hub_and_spoke"),
            Self::PeerToPeer => write!(f, "peer_to_peer"),
            Self::Hierarchical => write!(f, "hierarchical"),
        }
    }
}

/// One role slot in a team spec: spawn `count` agents of `role`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TeamMemberSpec {
    pub role: Role,
    pub count: usize,
    pub briefing: Option<String>,
    #[serde(default)]
    pub skills: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TeamSpec {
    pub team_name: String,
    pub members: Vec<TeamMemberSpec>,
    pub project_path: Option<String>,
    pub strategy: CoordinationStrategy,
}

impl TeamSpec {
    /// Validate name, member counts, and total size before any tmux call.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !is_valid_session_name(&self.team_name) {
            return Err(ConfigError::InvalidTeamName(self.team_name.clone()));
        }

        let total: usize = self.members.iter().map(|m| m.count).sum();
        if total < 1 || total > MAX_TEAM_SIZE {
            return Err(ConfigError::InvalidTeamSize(total));
        }

        for member in &self.members {
            if member.count == 0 {
                return Err(ConfigError::InvalidTeamSize(0));
            }
            if let Some(ref briefing) = member.briefing {
                if briefing.chars().count() > MAX_MEMBER_BRIEFING_CHARS {
                    return Err(ConfigError::BriefingTooLong {
                        role: member.role.to_string(),
                        max: MAX_MEMBER_BRIEFING_CHARS,
                    });
                }
            }
        }

        Ok(())
    }
}

/// A successfully spawned team member.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TeamAgent {
    pub role: Role,
    pub target: Target,
    pub window_name: String,
}

/// Outcome of a team deployment. On failure the agents spawned before
/// the error are reported; nothing is rolled back.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TeamResult {
    pub success: bool,
    pub team_name: String,
    pub created_agents: Vec<TeamAgent>,
    pub metadata: Option<TeamMetadata>,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TeamMetadata {
    pub team_name: String,
    pub project_path: Option<String>,
    pub strategy: CoordinationStrategy,
    pub total_agents: usize,
    pub created_at: DateTime<Utc>,
    /// hub_and_spoke only: the PM if one was spawned, else the first agent.
    pub hub: Option<Target>,
}

impl TeamMetadata {
    pub fn build(
        spec: &TeamSpec,
        created_agents: &[TeamAgent],
        created_at: DateTime<Utc>,
    ) -> Self {
        let hub = match spec.strategy {
            CoordinationStrategy::HubAndSpoke => select_hub(created_agents),
            _ => None,
        };
        Self {
            team_name: spec.team_name.clone(),
            project_path: spec.project_path.clone(),
            strategy: spec.strategy,
            total_agents: created_agents.len(),
            created_at,
            hub,
        }
    }
}

/// Hub selection: the PM agent if present, otherwise the first spawned.
pub fn select_hub(agents: &[TeamAgent]) -> Option<Target> {
    agents
        .iter()
        .find(|a| a.role == Role::Pm)
        .or_else(|| agents.first())
        .map(|a| a.target.clone())
}

/// Window name for the n-th member of a role: `Claude-<role>-<n>`.
pub fn member_window_name(role: Role, ordinal: usize) -> String {
    let keyword = match role {
        Role::Pm => "pm",
        Role::Orchestrator => "orchestrator",
        Role::Frontend => "frontend",
        Role::Backend => "backend",
        Role::Qa => "qa",
        Role::DevOps => "devops",
        Role::Reviewer => "reviewer",
        Role::Writer => "docs",
        Role::Database => "db",
        Role::Developer => "developer",
    };
    format!("Claude-{keyword}-{ordinal}")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec_with(members: Vec<TeamMemberSpec>) -> TeamSpec {
        TeamSpec {
            team_name: "alpha".into(),
            members,
            project_path: None,
            strategy: CoordinationStrategy::HubAndSpoke,
        }
    }

    fn member(role: Role, count: usize) -> TeamMemberSpec {
        TeamMemberSpec {
            role,
            count,
            briefing: None,
            skills: vec![],
        }
    }

    #[test]
    fn test_validate_size_bounds() {
        assert!(spec_with(vec![member(Role::Developer, 1)]).validate().is_ok());
        assert!(spec_with(vec![member(Role::Developer, 20)]).validate().is_ok());

        let err = spec_with(vec![]).validate().unwrap_err();
        assert!(matches!(err, ConfigError::InvalidTeamSize(0)));

        let err = spec_with(vec![member(Role::Developer, 21)])
            .validate()
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidTeamSize(21)));

        // Counts across members sum toward the limit.
        let err = spec_with(vec![member(Role::Pm, 1), member(Role::Developer, 20)])
            .validate()
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidTeamSize(21)));
    }

    #[test]
    fn test_validate_team_name() {
        let mut spec = spec_with(vec![member(Role::Developer, 1)]);
        spec.team_name = "bad name!".into();
        assert!(spec.validate().is_err());

        spec.team_name = "good_name-2".into();
        assert!(spec.validate().is_ok());
    }

    #[test]
    fn test_validate_briefing_length() {
        let mut m = member(Role::Qa, 1);
        m.briefing = Some("x".repeat(MAX_MEMBER_BRIEFING_CHARS + 1));
        assert!(spec_with(vec![m]).validate().is_err());
    }

    #[test]
    fn test_strategy_parse() {
        assert_eq!(
            CoordinationStrategy::parse("hub_and_spoke"),
            Some(CoordinationStrategy::HubAndSpoke)
        );
        assert_eq!(
            CoordinationStrategy::parse("peer_to_peer"),
            Some(CoordinationStrategy::PeerToPeer)
        );
        assert_eq!(CoordinationStrategy::parse("star"), None);
    }

    #[test]
    fn test_hub_prefers_pm() {
        let agents = vec![
            TeamAgent {
                role: Role::Developer,
                target: Target::new("alpha", 0),
                window_name: "Claude-developer-1".into(),
            },
            TeamAgent {
                role: Role::Pm,
                target: Target::new("alpha", 1),
                window_name: "Claude-pm-1".into(),
            },
        ];
        assert_eq!(select_hub(&agents), Some(Target::new("alpha", 1)));
    }

    #[test]
    fn test_hub_falls_back_to_first() {
        let agents = vec![
            TeamAgent {
                role: Role::Qa,
                target: Target::new("alpha", 0),
                window_name: "Claude-qa-1".into(),
            },
            TeamAgent {
                role: Role::Developer,
                target: Target::new("alpha", 1),
                window_name: "Claude-developer-1".into(),
            },
        ];
        assert_eq!(select_hub(&agents), Some(Target::new("alpha", 0)));
        assert_eq!(select_hub(&[]), None);
    }

    #[test]
    fn test_member_window_name() {
        assert_eq!(member_window_name(Role::Backend, 2), "Claude-backend-2");
        assert_eq!(member_window_name(Role::Pm, 1), "Claude-pm-1");
    }
}
