use crate::error::ConfigError;

/// Check if the claude CLI is available.
pub fn is_available() -> bool {
    which::which("claude").is_ok()
}

/// Profile names ride into a command line, so they are held to a strict
/// charset and length before being accepted.
pub fn validate_profile(profile: &str) -> Result<(), ConfigError> {
    let ok = !profile.is_empty()
        && profile.len() <= 50
        && profile
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if ok { Ok(()) } else { Err(ConfigError::InvalidProfile) }
}

/// Shell line typed into a fresh pane to start an agent. Agents always
/// run with permissions skipped; they live inside tmux where a human
/// can intervene.
pub fn launch_command(claude_bin: &str, profile: Option<&str>) -> Result<String, ConfigError> {
    let mut parts = vec![claude_bin.to_string()];
    if let Some(p) = profile {
        validate_profile(p)?;
        parts.push("--profile".into());
        parts.push(p.into());
    }
    parts.push("--dangerously-skip-permissions".into());
    Ok(parts.join(" "))
}

/// Argv form of the same invocation, for launching claude directly
/// rather than through a pane.
pub fn launch_argv(claude_bin: &str, profile: Option<&str>) -> Result<Vec<String>, ConfigError> {
    let mut argv = vec![claude_bin.to_string()];
    if let Some(p) = profile {
        validate_profile(p)?;
        argv.push("--profile".into());
        argv.push(p.into());
    }
    argv.push("--dangerously-skip-permissions".into());
    Ok(argv)
}
