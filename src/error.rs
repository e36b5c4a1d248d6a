use std::path::PathBuf;
use thiserror::Error;

use crate::domain::agent::Role;

/// Failures surfaced by the tmux driver. Every driver operation returns
/// one of these; nothing above the driver ever shells out directly.
#[derive(Error, Debug)]
pub enum TmuxError {
    #[error("tmux server unavailable")]
    Unavailable,

    #[error("tmux {op} timed out")]
    Timeout { op: &'static str },

    #[error("tmux {op} exited with {code}: {stderr}")]
    NonZeroExit {
        op: &'static str,
        code: i32,
        stderr: String,
    },

    #[error("invalid tmux input: {0}")]
    InvalidInput(String),
}

#[derive(Error, Debug)]
pub enum StateError {
    #[error("session not found: {0}")]
    SessionNotFound(String),

    #[error("window not found: {0}")]
    WindowNotFound(String),

    #[error("session already has a {0} agent")]
    RoleConflict(Role),

    #[error("agent unreachable: {0}")]
    AgentUnreachable(String),
}

#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("Claude interface not detected in {0} after startup polling")]
    ClaudeInterfaceNotDetected(String),

    #[error("message send to {target} failed at step {step}")]
    MessageSendFailed { target: String, step: &'static str },
}

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("corrupt document: {0}")]
    Corrupt(PathBuf),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("invalid store key: {0}")]
    InvalidKey(String),

    #[error("I/O failed for {path}: {reason}")]
    IoFailed { path: PathBuf, reason: String },
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("invalid target '{0}': expected session:window")]
    InvalidTarget(String),

    #[error("invalid role: {0}")]
    InvalidRole(String),

    #[error("invalid profile name: must match [A-Za-z0-9_-]{{1,50}}")]
    InvalidProfile,

    #[error("invalid team size {0}: must be between 1 and 20")]
    InvalidTeamSize(usize),

    #[error("invalid team name '{0}': only alphanumerics, hyphens, and underscores")]
    InvalidTeamName(String),

    #[error("briefing for {role} exceeds {max} characters")]
    BriefingTooLong { role: String, max: usize },
}

/// Top-level error for every fallible operation in the crate.
#[derive(Error, Debug)]
pub enum OrcError {
    #[error(transparent)]
    Tmux(#[from] TmuxError),

    #[error(transparent)]
    State(#[from] StateError),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("config file error: {0}")]
    ConfigFile(String),

    #[error("context '{0}' not found")]
    ContextNotFound(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("tmux not installed. Install with: apt install tmux / brew install tmux")]
    TmuxNotInstalled,

    #[error("claude CLI not found. Install from: https://claude.ai/code")]
    ClaudeNotInstalled,

    #[error("{0}")]
    User(String),
}

impl OrcError {
    /// CLI exit code: 0 success, 1 user error, 2 tmux unavailable,
    /// 3 internal error.
    pub fn exit_code(&self) -> i32 {
        match self {
            OrcError::Tmux(TmuxError::Unavailable) | OrcError::TmuxNotInstalled => 2,
            OrcError::Tmux(TmuxError::InvalidInput(_))
            | OrcError::Config(_)
            | OrcError::ConfigFile(_)
            | OrcError::ContextNotFound(_)
            | OrcError::State(StateError::SessionNotFound(_))
            | OrcError::State(StateError::WindowNotFound(_))
            | OrcError::State(StateError::RoleConflict(_))
            | OrcError::ClaudeNotInstalled
            | OrcError::User(_) => 1,
            _ => 3,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes() {
        assert_eq!(OrcError::from(TmuxError::Unavailable).exit_code(), 2);
        assert_eq!(OrcError::TmuxNotInstalled.exit_code(), 2);
        assert_eq!(OrcError::from(ConfigError::InvalidProfile).exit_code(), 1);
        assert_eq!(
            OrcError::from(StateError::SessionNotFound("x".into())).exit_code(),
            1
        );
        assert_eq!(
            OrcError::from(ProtocolError::ClaudeInterfaceNotDetected("a:1".into())).exit_code(),
            3
        );
        assert_eq!(
            OrcError::from(TmuxError::NonZeroExit {
                op: "list-sessions",
                code: 1,
                stderr: String::new(),
            })
            .exit_code(),
            3
        );
    }

    #[test]
    fn test_display_messages() {
        let e = TmuxError::Timeout { op: "capture-pane" };
        assert_eq!(e.to_string(), "tmux capture-pane timed out");

        let e = ConfigError::InvalidTeamSize(21);
        assert!(e.to_string().contains("21"));

        let e = ProtocolError::MessageSendFailed {
            target: "proj:1".into(),
            step: "enter",
        };
        assert!(e.to_string().contains("proj:1"));
        assert!(e.to_string().contains("enter"));
    }
}
