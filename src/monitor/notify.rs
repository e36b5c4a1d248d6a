use crate::domain::agent::{AgentState, Role};
use crate::domain::target::Target;
use std::collections::BTreeMap;

/// Per-agent outcome of one monitor tick, after scratch-state
/// reconciliation.
#[derive(Debug, Clone)]
pub struct TickAgent {
    pub target: Target,
    pub role: Role,
    pub state: AgentState,
    /// Idle-cycle accounting has crossed the reporting threshold.
    pub reported_idle: bool,
}

/// A message planned for delivery to a session's PM.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub recipient: Target,
    pub body: String,
}

/// Assemble the per-session alerts for one tick.
///
/// Returns the notifications in deterministic order (session name, then
/// target) plus the sessions that had trouble but no PM to tell. The
/// recipient PM never appears in its own alert, and a session whose only
/// troubled agent is its PM produces nothing.
pub fn plan_notifications(agents: &[TickAgent]) -> (Vec<Notification>, Vec<String>) {
    let mut by_session: BTreeMap<&str, Vec<&TickAgent>> = BTreeMap::new();
    for agent in agents {
        by_session
            .entry(agent.target.session.as_str())
            .or_default()
            .push(agent);
    }

    let mut notifications = vec![];
    let mut orphaned_sessions = vec![];

    for (session, mut members) in by_session {
        members.sort_by(|a, b| a.target.cmp(&b.target));

        let pm = members
            .iter()
            .find(|a| a.role == Role::Pm)
            .map(|a| a.target.clone());

        let mut crashed: Vec<&TickAgent> = members
            .iter()
            .copied()
            .filter(|a| a.state == AgentState::Crashed)
            .collect();
        let mut idle: Vec<&TickAgent> = members
            .iter()
            .copied()
            .filter(|a| a.state != AgentState::Crashed && a.reported_idle)
            .collect();

        if crashed.is_empty() && idle.is_empty() {
            continue;
        }

        let Some(pm_target) = pm else {
            orphaned_sessions.push(session.to_string());
            continue;
        };

        // Self-notification guard: the PM never hears about itself.
        crashed.retain(|a| a.target != pm_target);
        idle.retain(|a| a.target != pm_target);
        if crashed.is_empty() && idle.is_empty() {
            continue;
        }

        notifications.push(Notification {
            recipient: pm_target,
            body: build_alert(&crashed, &idle),
        });
    }

    (notifications, orphaned_sessions)
}

fn build_alert(crashed: &[&TickAgent], idle: &[&TickAgent]) -> String {
    let mut body = String::from("⚠️ Agent Status Alert:\n");

    if !crashed.is_empty() {
        body.push_str("\n🔴 CRASHED AGENTS:\n");
        for agent in crashed {
            body.push_str(&format!("  • {} ({})\n", agent.role, agent.target));
        }
    }

    if !idle.is_empty() {
        body.push_str("\n🟡 IDLE AGENTS:\n");
        for agent in idle {
            body.push_str(&format!("  • {} ({})\n", agent.role, agent.target));
        }
    }

    body.push_str("\nPlease investigate and take action.");
    body
}

#[cfg(test)]
mod tests {
    use super::*;

    fn agent(target: &str, role: Role, state: AgentState, reported_idle: bool) -> TickAgent {
        TickAgent {
            target: Target::parse(target).unwrap(),
            role,
            state,
            reported_idle,
        }
    }

    #[test]
    fn test_idle_agent_routes_to_pm() {
        let agents = vec![
            agent("proj:1", Role::Pm, AgentState::Active, false),
            agent("proj:2", Role::Backend, AgentState::Idle, true),
        ];
        let (notifications, orphaned) = plan_notifications(&agents);
        assert_eq!(notifications.len(), 1);
        assert!(orphaned.is_empty());

        let n = &notifications[0];
        assert_eq!(n.recipient, Target::parse("proj:1").unwrap());
        assert!(n.body.contains("⚠️ Agent Status Alert"));
        assert!(n.body.contains("🟡 IDLE AGENTS"));
        assert!(n.body.contains("proj:2"));
        assert!(!n.body.contains("🔴 CRASHED AGENTS"));
    }

    #[test]
    fn test_crashed_section() {
        let agents = vec![
            agent("proj:1", Role::Pm, AgentState::Active, false),
            agent("proj:3", Role::Qa, AgentState::Crashed, false),
        ];
        let (notifications, _) = plan_notifications(&agents);
        let body = &notifications[0].body;
        assert!(body.contains("🔴 CRASHED AGENTS:\n  • QA (proj:3)"));
        assert!(!body.contains("🟡 IDLE AGENTS"));
        assert!(body.ends_with("Please investigate and take action."));
    }

    #[test]
    fn test_no_pm_drops_notification() {
        let agents = vec![
            agent("proj:2", Role::Backend, AgentState::Crashed, false),
            agent("proj:3", Role::Qa, AgentState::Idle, true),
        ];
        let (notifications, orphaned) = plan_notifications(&agents);
        assert!(notifications.is_empty());
        assert_eq!(orphaned, vec!["proj".to_string()]);
    }

    #[test]
    fn test_self_notification_guard() {
        // Only the PM itself is idle: nothing may be sent.
        let agents = vec![agent("proj:1", Role::Pm, AgentState::Idle, true)];
        let (notifications, orphaned) = plan_notifications(&agents);
        assert!(notifications.is_empty());
        assert!(orphaned.is_empty());

        // PM idle alongside another idle agent: alert mentions only the
        // other agent.
        let agents = vec![
            agent("proj:1", Role::Pm, AgentState::Idle, true),
            agent("proj:2", Role::Developer, AgentState::Idle, true),
        ];
        let (notifications, _) = plan_notifications(&agents);
        assert_eq!(notifications.len(), 1);
        assert!(!notifications[0].body.contains("proj:1"));
        assert!(notifications[0].body.contains("proj:2"));
    }

    #[test]
    fn test_healthy_fleet_is_silent() {
        let agents = vec![
            agent("proj:1", Role::Pm, AgentState::Active, false),
            agent("proj:2", Role::Backend, AgentState::Active, false),
        ];
        let (notifications, orphaned) = plan_notifications(&agents);
        assert!(notifications.is_empty());
        assert!(orphaned.is_empty());
    }

    #[test]
    fn test_deterministic_ordering() {
        let agents = vec![
            agent("zeta:1", Role::Pm, AgentState::Active, false),
            agent("zeta:4", Role::Qa, AgentState::Crashed, false),
            agent("alpha:1", Role::Pm, AgentState::Active, false),
            agent("alpha:9", Role::Backend, AgentState::Idle, true),
            agent("alpha:3", Role::Frontend, AgentState::Idle, true),
        ];
        let (notifications, _) = plan_notifications(&agents);
        assert_eq!(notifications.len(), 2);
        // Sessions in ascending name order.
        assert_eq!(notifications[0].recipient.session, "alpha");
        assert_eq!(notifications[1].recipient.session, "zeta");
        // Targets ascending within an alert body.
        let body = &notifications[0].body;
        let pos3 = body.find("alpha:3").unwrap();
        let pos9 = body.find("alpha:9").unwrap();
        assert!(pos3 < pos9);
    }

    #[test]
    fn test_crashed_agent_not_double_reported_as_idle() {
        let agents = vec![
            agent("proj:1", Role::Pm, AgentState::Active, false),
            agent("proj:2", Role::Backend, AgentState::Crashed, true),
        ];
        let (notifications, _) = plan_notifications(&agents);
        let body = &notifications[0].body;
        assert!(body.contains("🔴 CRASHED AGENTS"));
        assert!(!body.contains("🟡 IDLE AGENTS"));
    }
}
