use crate::domain::agent::is_agent_window;
use crate::error::{OrcError, StateError};
use crate::infra::cache::FleetCache;
use crate::infra::tmux::TmuxDriver;
use chrono::DateTime;

/// `session list`: all tmux sessions with window and agent counts.
pub async fn list(cache: &FleetCache, json: bool) -> Result<(), OrcError> {
    let sessions = cache.list_sessions().await?;

    let mut rows = vec![];
    for session in &sessions {
        let windows = cache.list_windows(&session.name).await.unwrap_or_default();
        let agent_count = windows.iter().filter(|w| is_agent_window(&w.name)).count();
        rows.push(serde_json::json!({
            "name": session.name,
            "created": DateTime::from_timestamp(session.created, 0),
            "attached": session.attached,
            "windows": windows.len(),
            "agents": agent_count,
        }));
    }

    if json {
        super::emit_json(rows);
        return Ok(());
    }

    if sessions.is_empty() {
        println!("No tmux sessions.");
        return Ok(());
    }

    println!("{} session(s):", sessions.len());
    for row in &rows {
        println!(
            "  {} {}  {} window(s), {} agent(s)",
            if row["attached"].as_bool().unwrap_or(false) {
                "●"
            } else {
                "○"
            },
            row["name"].as_str().unwrap_or(""),
            row["windows"],
            row["agents"],
        );
    }
    Ok(())
}

/// `session attach`: replace this terminal with a tmux client.
pub async fn attach(session: &str) -> Result<(), OrcError> {
    if !TmuxDriver::has_session(session).await? {
        return Err(StateError::SessionNotFound(session.to_string()).into());
    }
    TmuxDriver::attach(session)?;
    Ok(())
}

/// `session kill`: destroy a session and every agent in it.
pub async fn kill(cache: &FleetCache, session: &str, json: bool) -> Result<(), OrcError> {
    if !TmuxDriver::has_session(session).await? {
        return Err(StateError::SessionNotFound(session.to_string()).into());
    }
    cache.kill_session(session).await?;

    if json {
        super::emit_json(serde_json::json!({ "killed": session }));
    } else {
        println!("Session '{session}' killed.");
    }
    Ok(())
}
