use crate::config::Config;
use crate::domain::agent::Role;
use crate::domain::team::{
    CoordinationStrategy, TeamAgent, TeamMemberSpec, TeamMetadata, TeamResult, TeamSpec,
    member_window_name,
};
use crate::error::{ConfigError, OrcError};
use crate::infra::cache::FleetCache;
use crate::infra::messaging::{self, BroadcastOptions, BroadcastScope};
use crate::infra::tmux::TmuxDriver;
use tracing::{info, warn};

/// `team deploy`: spawn a whole team into one session. The first member
/// creates the session; the rest append windows. On a mid-deploy
/// failure the agents already spawned are reported alongside the first
/// error; nothing is rolled back.
pub async fn deploy(
    cache: &FleetCache,
    team_name: &str,
    member_args: &[String],
    strategy_str: &str,
    project_path: Option<&str>,
    json: bool,
    config: &Config,
) -> Result<(), OrcError> {
    let strategy = CoordinationStrategy::parse(strategy_str)
        .ok_or_else(|| OrcError::User(format!("unknown coordination strategy '{strategy_str}'")))?;

    let members = parse_members(member_args)?;
    let spec = TeamSpec {
        team_name: team_name.to_string(),
        members,
        project_path: project_path.map(String::from),
        strategy,
    };
    spec.validate()?;

    if TmuxDriver::has_session(&spec.team_name).await? {
        return Err(OrcError::User(format!(
            "team '{}' already exists",
            spec.team_name
        )));
    }

    let result = deploy_team(cache, &spec, config).await;

    if json {
        if result.success {
            super::emit_json(&result);
        } else {
            let error = result.error.clone().unwrap_or_default();
            super::emit_json_failure(Some(&result), &error);
        }
    } else {
        println!(
            "Team '{}' ({} strategy): {} agent(s) spawned",
            result.team_name,
            spec.strategy,
            result.created_agents.len()
        );
        for agent in &result.created_agents {
            println!("  {} {} ({})", agent.target, agent.role, agent.window_name);
        }
        if let Some(meta) = &result.metadata {
            if let Some(hub) = &meta.hub {
                println!("  hub: {hub}");
            }
        }
        if let Some(error) = &result.error {
            println!("Deployment incomplete: {error}");
        }
    }
    Ok(())
}

async fn deploy_team(cache: &FleetCache, spec: &TeamSpec, config: &Config) -> TeamResult {
    let mut created: Vec<TeamAgent> = vec![];
    let mut role_counts: std::collections::HashMap<Role, usize> = std::collections::HashMap::new();

    for member in &spec.members {
        for _ in 0..member.count {
            let ordinal = role_counts
                .entry(member.role)
                .and_modify(|c| *c += 1)
                .or_insert(1);
            let window_name = member_window_name(member.role, *ordinal);
            let briefing = member
                .briefing
                .clone()
                .unwrap_or_else(|| default_briefing(member.role, &spec.team_name, &member.skills));

            let spawned = super::spawn::spawn_into_session(
                cache,
                &spec.team_name,
                &window_name,
                member.role,
                &briefing,
                spec.project_path.as_deref(),
                None,
                config,
            )
            .await;

            match spawned {
                Ok(target) => {
                    info!(target = %target, window = %window_name, "team member spawned");
                    created.push(TeamAgent {
                        role: member.role,
                        target,
                        window_name,
                    });
                }
                Err(e) => {
                    warn!(window = %window_name, error = %e, "team member spawn failed");
                    return TeamResult {
                        success: false,
                        team_name: spec.team_name.clone(),
                        created_agents: created,
                        metadata: None,
                        error: Some(e.to_string()),
                    };
                }
            }
        }
    }

    let metadata = TeamMetadata::build(spec, &created, chrono::Utc::now());
    TeamResult {
        success: true,
        team_name: spec.team_name.clone(),
        created_agents: created,
        metadata: Some(metadata),
        error: None,
    }
}

/// `team status`: session membership and fast-path states.
pub async fn status(cache: &FleetCache, session: &str, json: bool) -> Result<(), OrcError> {
    if !TmuxDriver::has_session(session).await? {
        return Err(crate::error::StateError::SessionNotFound(session.to_string()).into());
    }

    let agents = cache.discover_agents().await?;
    let members: Vec<_> = agents
        .into_iter()
        .filter(|a| a.target.session == session)
        .collect();

    if json {
        super::emit_json(&members);
        return Ok(());
    }

    println!("Team '{session}': {} agent(s)", members.len());
    for agent in &members {
        println!("  {}  [{}]  {}", agent.target, agent.role, agent.state);
    }
    Ok(())
}

/// `team broadcast`: message a scope of agents.
#[allow(clippy::too_many_arguments)]
pub async fn broadcast(
    cache: &FleetCache,
    message: &str,
    session: Option<&str>,
    all_sessions: bool,
    role: Option<&str>,
    session_filter: Option<&str>,
    exclude: &[String],
    urgent: bool,
    json: bool,
    config: &Config,
) -> Result<(), OrcError> {
    let scope = match (session, all_sessions, role, session_filter) {
        (Some(s), false, None, None) => BroadcastScope::Session(s.to_string()),
        (None, true, None, None) => BroadcastScope::AllSessions,
        (None, false, Some(r), None) => {
            let role = Role::parse_keyword(r)
                .ok_or_else(|| ConfigError::InvalidRole(r.to_string()))?;
            BroadcastScope::Role(role)
        }
        (None, false, None, Some(pat)) => BroadcastScope::SessionFilter(pat.to_string()),
        (None, false, None, None) => BroadcastScope::AllSessions,
        _ => {
            return Err(OrcError::User(
                "choose one of --session, --all-sessions, --role, --session-filter".into(),
            ));
        }
    };

    let mut opts = BroadcastOptions {
        urgent,
        ..Default::default()
    };
    for t in exclude {
        opts.exclude.push(crate::domain::target::Target::parse(t)?);
    }

    let report = messaging::broadcast(cache, &scope, message, &opts, config).await?;

    if json {
        super::emit_json(&report);
    } else {
        println!(
            "Broadcast delivered to {} agent(s), {} failed",
            report.sent.len(),
            report.failed.len()
        );
        for target in &report.failed {
            println!("  failed: {target}");
        }
    }
    Ok(())
}

/// Parse `role:count` member arguments (count defaults to 1).
fn parse_members(args: &[String]) -> Result<Vec<TeamMemberSpec>, OrcError> {
    if args.is_empty() {
        return Err(ConfigError::InvalidTeamSize(0).into());
    }

    let mut members = vec![];
    for arg in args {
        let (role_str, count_str) = match arg.split_once(':') {
            Some((r, c)) => (r, Some(c)),
            None => (arg.as_str(), None),
        };
        let role = Role::parse_keyword(role_str)
            .ok_or_else(|| ConfigError::InvalidRole(role_str.to_string()))?;
        let count: usize = match count_str {
            Some(c) => c
                .parse()
                .map_err(|_| OrcError::User(format!("invalid member count in '{arg}'")))?,
            None => 1,
        };
        members.push(TeamMemberSpec {
            role,
            count,
            briefing: None,
            skills: vec![],
        });
    }
    Ok(members)
}

fn default_briefing(role: Role, team_name: &str, skills: &[String]) -> String {
    let mut briefing = format!(
        "You are the {role} agent for team '{team_name}'. Work from your \
         window of the '{team_name}' tmux session. Report progress and \
         blockers to the PM of this session; wait for task assignments \
         before starting work."
    );
    if !skills.is_empty() {
        briefing.push_str(&format!("\n\nRelevant skills: {}.", skills.join(", ")));
    }
    briefing
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_members() {
        let members =
            parse_members(&["pm:1".to_string(), "developer:2".to_string(), "qa".to_string()])
                .unwrap();
        assert_eq!(members.len(), 3);
        assert_eq!(members[0].role, Role::Pm);
        assert_eq!(members[0].count, 1);
        assert_eq!(members[1].role, Role::Developer);
        assert_eq!(members[1].count, 2);
        assert_eq!(members[2].count, 1);
    }

    #[test]
    fn test_parse_members_rejects_unknown_role() {
        assert!(parse_members(&["wizard:1".to_string()]).is_err());
        assert!(parse_members(&["pm:x".to_string()]).is_err());
        assert!(parse_members(&[]).is_err());
    }

    #[test]
    fn test_default_briefing_mentions_team_and_role() {
        let b = default_briefing(Role::Backend, "alpha", &["sql".to_string()]);
        assert!(b.contains("Backend"));
        assert!(b.contains("alpha"));
        assert!(b.contains("sql"));
    }
}
