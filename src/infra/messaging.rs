use crate::config::Config;
use crate::domain::agent::{AgentStatus, Role};
use crate::domain::target::Target;
use crate::error::ProtocolError;
use crate::infra::cache::FleetCache;
use crate::infra::tmux::TmuxDriver;
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, warn};

pub const URGENT_PREFIX: &str = "🚨 URGENT: ";

/// Which agents a broadcast addresses.
#[derive(Debug, Clone)]
pub enum BroadcastScope {
    /// Every agent in one session.
    Session(String),
    /// Every agent everywhere.
    AllSessions,
    /// Every agent of one role, across all sessions.
    Role(Role),
    /// Agents whose session name contains the given pattern.
    SessionFilter(String),
}

#[derive(Debug, Clone, Default)]
pub struct BroadcastOptions {
    pub exclude: Vec<Target>,
    pub urgent: bool,
}

/// Per-target delivery outcome of a broadcast. Delivery is best-effort;
/// both lists are always reported.
#[derive(Debug, Clone, Default, Serialize)]
pub struct BroadcastReport {
    pub sent: Vec<Target>,
    pub failed: Vec<Target>,
}

/// Deliver `text` into an agent's input box and submit it.
///
/// The sequence is: clear the input line (`C-u`), send the entire text
/// as one literal keystroke payload, then press Enter. The payload is
/// never chunked — tmux accepts multi-kilobyte literal sends atomically,
/// and splitting fragments the conversation on the agent's side. A
/// short pause between steps lets the REPL finish its input-mode
/// transitions.
pub async fn send_message_checked(
    target: &Target,
    text: &str,
    config: &Config,
) -> Result<(), ProtocolError> {
    let delay = Duration::from_millis(config.send_delay_ms);
    let fail = |step: &'static str| ProtocolError::MessageSendFailed {
        target: target.to_string(),
        step,
    };

    let session_ok = TmuxDriver::has_session(&target.session)
        .await
        .unwrap_or(false);
    if !session_ok {
        return Err(fail("session-check"));
    }

    debug!(target = %target, chars = text.len(), "sending message");

    TmuxDriver::press_ctrl_u(target)
        .await
        .map_err(|_| fail("clear"))?;
    tokio::time::sleep(delay).await;

    TmuxDriver::send_keys(target, text, true)
        .await
        .map_err(|_| fail("text"))?;
    tokio::time::sleep(delay).await;

    TmuxDriver::press_enter(target).await.map_err(|_| fail("enter"))?;

    Ok(())
}

/// Bool form used by callers that only branch on delivery.
pub async fn send_message(target: &Target, text: &str, config: &Config) -> bool {
    match send_message_checked(target, text, config).await {
        Ok(()) => true,
        Err(e) => {
            warn!(error = %e, "message delivery failed");
            false
        }
    }
}

/// Fan a message out to every agent the scope selects.
pub async fn broadcast(
    cache: &FleetCache,
    scope: &BroadcastScope,
    text: &str,
    opts: &BroadcastOptions,
    config: &Config,
) -> Result<BroadcastReport, crate::error::OrcError> {
    let agents = cache.discover_agents().await?;
    let recipients = select_recipients(&agents, scope, &opts.exclude);

    let payload = if opts.urgent {
        format!("{URGENT_PREFIX}{text}")
    } else {
        text.to_string()
    };

    let mut report = BroadcastReport::default();
    for target in recipients {
        if send_message(&target, &payload, config).await {
            report.sent.push(target);
        } else {
            report.failed.push(target);
        }
    }
    Ok(report)
}

/// Pure scope filter, ordered by session then target for deterministic
/// delivery.
pub fn select_recipients(
    agents: &[AgentStatus],
    scope: &BroadcastScope,
    exclude: &[Target],
) -> Vec<Target> {
    let mut targets: Vec<Target> = agents
        .iter()
        .filter(|a| match scope {
            BroadcastScope::Session(s) => a.target.session == *s,
            BroadcastScope::AllSessions => true,
            BroadcastScope::Role(r) => a.role == *r,
            BroadcastScope::SessionFilter(pat) => a.target.session.contains(pat.as_str()),
        })
        .map(|a| a.target.clone())
        .filter(|t| !exclude.contains(t))
        .collect();
    targets.sort();
    targets.dedup();
    targets
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::agent::AgentState;

    fn agent(target: &str, role: Role) -> AgentStatus {
        AgentStatus {
            target: Target::parse(target).unwrap(),
            role,
            window_name: format!("Claude-{role}"),
            state: AgentState::Idle,
            last_activity: None,
        }
    }

    fn fleet() -> Vec<AgentStatus> {
        vec![
            agent("a:1", Role::Pm),
            agent("a:2", Role::Backend),
            agent("b:1", Role::Pm),
            agent("b:3", Role::Qa),
            agent("c:1", Role::Pm),
            agent("team-x:0", Role::Developer),
        ]
    }

    #[test]
    fn test_scope_session() {
        let got = select_recipients(&fleet(), &BroadcastScope::Session("a".into()), &[]);
        assert_eq!(got, vec![Target::parse("a:1").unwrap(), Target::parse("a:2").unwrap()]);
    }

    #[test]
    fn test_scope_all_sessions() {
        let got = select_recipients(&fleet(), &BroadcastScope::AllSessions, &[]);
        assert_eq!(got.len(), 6);
    }

    #[test]
    fn test_scope_role_pm_across_sessions() {
        let got = select_recipients(&fleet(), &BroadcastScope::Role(Role::Pm), &[]);
        let strs: Vec<String> = got.iter().map(|t| t.to_string()).collect();
        assert_eq!(strs, ["a:1", "b:1", "c:1"]);
    }

    #[test]
    fn test_scope_session_filter() {
        let got = select_recipients(&fleet(), &BroadcastScope::SessionFilter("team".into()), &[]);
        assert_eq!(got, vec![Target::parse("team-x:0").unwrap()]);
    }

    #[test]
    fn test_exclusions() {
        let exclude = vec![Target::parse("b:1").unwrap()];
        let got = select_recipients(&fleet(), &BroadcastScope::Role(Role::Pm), &exclude);
        let strs: Vec<String> = got.iter().map(|t| t.to_string()).collect();
        assert_eq!(strs, ["a:1", "c:1"]);
    }

    #[test]
    fn test_urgent_prefix_constant() {
        assert!(URGENT_PREFIX.starts_with("🚨"));
    }
}
