use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Addressable location of an agent pane: `session:window` or
/// `session:window.pane`. Window and pane are tmux indices, not names,
/// so a Target stays valid for the lifetime of its window.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Target {
    pub session: String,
    pub window: u32,
    pub pane: Option<u32>,
}

impl Target {
    pub fn new(session: impl Into<String>, window: u32) -> Self {
        Self {
            session: session.into(),
            window,
            pane: None,
        }
    }

    pub fn parse(s: &str) -> Result<Self, ConfigError> {
        let invalid = || ConfigError::InvalidTarget(s.to_string());

        let mut parts = s.splitn(2, ':');
        let session = parts.next().ok_or_else(invalid)?;
        let rest = parts.next().ok_or_else(invalid)?;

        if session.trim().is_empty() || rest.trim().is_empty() || rest.contains(':') {
            return Err(invalid());
        }
        if !is_valid_session_name(session) {
            return Err(invalid());
        }

        let (window_part, pane_part) = match rest.split_once('.') {
            Some((w, p)) => (w, Some(p)),
            None => (rest, None),
        };

        let window: u32 = window_part.parse().map_err(|_| invalid())?;
        let pane = match pane_part {
            Some(p) => Some(p.parse().map_err(|_| invalid())?),
            None => None,
        };

        Ok(Self {
            session: session.to_string(),
            window,
            pane,
        })
    }
}

/// Session names are restricted to `[A-Za-z0-9_-]` so they can never
/// carry tmux target syntax or shell metacharacters.
pub fn is_valid_session_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.pane {
            Some(p) => write!(f, "{}:{}.{}", self.session, self.window, p),
            None => write!(f, "{}:{}", self.session, self.window),
        }
    }
}

impl FromStr for Target {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Target::parse(s)
    }
}

impl TryFrom<String> for Target {
    type Error = ConfigError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Target::parse(&s)
    }
}

impl From<Target> for String {
    fn from(t: Target) -> String {
        t.to_string()
    }
}
