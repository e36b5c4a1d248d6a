use crate::config::Config;
use crate::domain::agent::{AgentState, AgentStatus};
use crate::domain::target::Target;
use crate::error::{OrcError, StateError};
use crate::infra::cache::FleetCache;
use crate::infra::messaging::{self, URGENT_PREFIX};
use crate::infra::tmux::TmuxDriver;
use crate::monitor;
use crate::monitor::classifier::{classify, take_snapshots};
use std::time::Duration;
use tracing::info;

/// `agent list`: the fast discovery path. Status here comes from pane
/// activity timestamps, which is cheap and good enough for a listing;
/// `agent status` is the authoritative check.
pub async fn list(cache: &FleetCache, json: bool) -> Result<(), OrcError> {
    let agents = cache.discover_agents().await?;

    if json {
        super::emit_json(&agents);
        return Ok(());
    }

    if agents.is_empty() {
        println!("No agents found. Spawn one with `tmux-orc spawn agent`.");
        return Ok(());
    }

    println!("{} agent(s):", agents.len());
    for agent in &agents {
        println!(
            "  {} {}  [{}]  {}",
            state_icon(agent.state),
            agent.target,
            agent.role,
            agent.window_name,
        );
    }
    Ok(())
}

/// `agent status`: snapshot classification, either for one target or
/// the whole fleet.
pub async fn status(
    cache: &FleetCache,
    target_str: Option<&str>,
    json: bool,
    config: &Config,
) -> Result<(), OrcError> {
    let agents: Vec<AgentStatus> = match target_str {
        Some(s) => {
            let target = Target::parse(s)?;
            let snapshots = take_snapshots(
                &target,
                config.snapshot_count,
                Duration::from_millis(config.snapshot_interval_ms),
                config.capture_lines,
            )
            .await
            .unwrap_or_default();
            let state = classify(&snapshots);

            let discovered = cache.discover_agents().await?;
            let known = discovered.into_iter().find(|a| a.target == target);
            match known {
                Some(agent) => vec![AgentStatus { state, ..agent }],
                None => return Err(StateError::AgentUnreachable(target.to_string()).into()),
            }
        }
        None => monitor::deep_discover(cache, config).await?,
    };

    if json {
        super::emit_json(&agents);
        return Ok(());
    }

    for agent in &agents {
        println!(
            "{} {}  [{}]  {}",
            state_icon(agent.state),
            agent.target,
            agent.role,
            agent.state,
        );
    }
    if agents.is_empty() {
        println!("No agents found.");
    }
    Ok(())
}

/// `agent send`: deliver one message to one agent.
pub async fn send(
    target_str: &str,
    message: &str,
    urgent: bool,
    json: bool,
    config: &Config,
) -> Result<(), OrcError> {
    let target = Target::parse(target_str)?;
    let payload = if urgent {
        format!("{URGENT_PREFIX}{message}")
    } else {
        message.to_string()
    };

    messaging::send_message_checked(&target, &payload, config).await?;

    if json {
        super::emit_json(serde_json::json!({
            "target": target,
            "chars": payload.len(),
        }));
    } else {
        println!("Message sent to {target}");
    }
    Ok(())
}

/// `agent kill`: remove one agent's window.
pub async fn kill(cache: &FleetCache, target_str: &str, json: bool) -> Result<(), OrcError> {
    let target = Target::parse(target_str)?;
    cache.kill_window(&target).await?;

    if json {
        super::emit_json(serde_json::json!({ "killed": target }));
    } else {
        println!("Killed agent at {target}");
    }
    Ok(())
}

/// `agent restart`: kill the window, recreate it under the same name,
/// relaunch Claude, and re-brief. The window lands at a new appended
/// index; the old index is never reused.
pub async fn restart(
    cache: &FleetCache,
    target_str: &str,
    briefing: Option<&str>,
    json: bool,
    config: &Config,
) -> Result<(), OrcError> {
    let target = Target::parse(target_str)?;

    if !TmuxDriver::has_session(&target.session).await? {
        return Err(StateError::SessionNotFound(target.session.clone()).into());
    }
    let windows = cache.list_windows(&target.session).await?;
    let window = windows
        .into_iter()
        .find(|w| w.index == target.window)
        .ok_or_else(|| StateError::WindowNotFound(target.to_string()))?;

    info!(target = %target, window = %window.name, "restarting agent");
    cache.kill_window(&target).await?;

    let index = cache
        .create_window(&target.session, &window.name, None)
        .await?;
    let new_target = Target::new(target.session.clone(), index);

    let launch = crate::infra::claude::launch_command(&config.claude_command, None)?;
    TmuxDriver::send_keys(&new_target, &launch, true).await?;
    TmuxDriver::press_enter(&new_target).await?;
    tokio::time::sleep(Duration::from_secs(3)).await;
    super::spawn::wait_for_interface(&new_target, config).await?;

    if let Some(text) = briefing {
        messaging::send_message_checked(&new_target, text, config).await?;
    }

    if json {
        super::emit_json(serde_json::json!({
            "old_target": target,
            "new_target": new_target,
            "window_name": window.name,
            "briefed": briefing.is_some(),
        }));
    } else {
        println!("Agent restarted: {target} -> {new_target} ({})", window.name);
    }
    Ok(())
}

/// `agent kill-all`: remove every agent window across all sessions.
/// Sessions themselves are left alone.
pub async fn kill_all(cache: &FleetCache, json: bool) -> Result<(), OrcError> {
    let agents = cache.discover_agents().await?;

    let mut killed = vec![];
    let mut failed = vec![];
    let mut first_err: Option<OrcError> = None;
    for agent in agents {
        match cache.kill_window(&agent.target).await {
            Ok(()) => killed.push(agent.target),
            Err(e) => {
                if first_err.is_none() {
                    first_err = Some(e.into());
                }
                failed.push(agent.target);
            }
        }
    }

    if json {
        super::emit_json(serde_json::json!({
            "killed": killed,
            "failed": failed,
        }));
    } else {
        println!("Killed {} agent(s)", killed.len());
        for target in &failed {
            println!("  failed to kill {target}");
        }
    }

    match first_err {
        Some(e) => Err(e),
        None => Ok(()),
    }
}

fn state_icon(state: AgentState) -> &'static str {
    match state {
        AgentState::Active => "●",
        AgentState::Idle => "○",
        AgentState::Fresh => "◌",
        AgentState::MessageQueued => "◐",
        AgentState::Crashed => "✗",
        AgentState::Error => "!",
        AgentState::Unknown => "?",
    }
}
