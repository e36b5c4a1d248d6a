use crate::domain::target::{Target, is_valid_session_name};
use crate::error::TmuxError;
use std::process::Output;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, warn};

/// All tmux operations. Shells out to the `tmux` CLI with argv-style
/// arguments only; no shell is ever involved. Every operation validates
/// its inputs and runs under a per-operation timeout.
pub struct TmuxDriver;

/// One session as reported by `list-sessions`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionInfo {
    pub name: String,
    /// Unix creation timestamp.
    pub created: i64,
    pub attached: bool,
}

/// One window as reported by `list-windows`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WindowInfo {
    pub index: u32,
    pub name: String,
    pub active: bool,
}

/// One row of the whole-fleet `list-panes -a` scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaneInfo {
    pub session: String,
    pub window_index: u32,
    pub window_name: String,
    /// `#{pane_activity}` unix timestamp; None when unparseable.
    pub activity: Option<i64>,
}

impl TmuxDriver {
    /// Check if tmux is installed at all.
    pub fn is_available() -> bool {
        which::which("tmux").is_ok()
    }

    /// Check if a tmux session exists.
    pub async fn has_session(name: &str) -> Result<bool, TmuxError> {
        validate_session_name(name)?;
        let output = run_tmux(
            "has-session",
            &["has-session", "-t", name],
            Duration::from_secs(1),
        )
        .await?;
        Ok(output.status.success())
    }

    /// Create a new detached session. Fails if the name is taken.
    pub async fn create_session(
        name: &str,
        first_window_name: Option<&str>,
        cwd: Option<&str>,
    ) -> Result<(), TmuxError> {
        validate_session_name(name)?;
        if Self::has_session(name).await? {
            return Err(TmuxError::InvalidInput(format!(
                "session '{name}' already exists"
            )));
        }

        let mut args = vec!["new-session", "-d", "-s", name];
        let sanitized;
        if let Some(window_name) = first_window_name {
            sanitized = sanitize_window_name(window_name);
            args.extend(["-n", &sanitized]);
        }
        if let Some(dir) = cwd {
            args.extend(["-c", dir]);
        }

        debug!(session = name, "creating tmux session");
        run_tmux_checked("new-session", &args, Duration::from_secs(5)).await?;

        // Window indices must stay stable for the lifetime of the session:
        // a renumbering server option would reuse indices after a kill.
        let _ = run_tmux(
            "set-option",
            &["set-option", "-t", name, "renumber-windows", "off"],
            Duration::from_secs(2),
        )
        .await;

        Ok(())
    }

    /// Create a window appended after the session's highest index, never
    /// filling a hole left by a killed window. Returns the new index.
    pub async fn create_window(
        session: &str,
        name: &str,
        cwd: Option<&str>,
    ) -> Result<u32, TmuxError> {
        validate_session_name(session)?;
        let window_name = sanitize_window_name(name);
        let after_last = format!("{session}:$");

        let mut args = vec![
            "new-window",
            "-d",
            "-a",
            "-t",
            &after_last,
            "-n",
            &window_name,
            "-P",
            "-F",
            "#{window_index}",
        ];
        if let Some(dir) = cwd {
            args.extend(["-c", dir]);
        }

        let stdout = run_tmux_output("new-window", &args, Duration::from_secs(3)).await?;
        stdout.trim().parse().map_err(|_| TmuxError::NonZeroExit {
            op: "new-window",
            code: 0,
            stderr: format!("unparseable window index: {stdout:?}"),
        })
    }

    /// List all sessions. An absent tmux server means no sessions.
    pub async fn list_sessions() -> Result<Vec<SessionInfo>, TmuxError> {
        let output = run_tmux(
            "list-sessions",
            &[
                "list-sessions",
                "-F",
                "#{session_name}:#{session_created}:#{session_attached}",
            ],
            Duration::from_secs(3),
        )
        .await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            if stderr.contains("no server running") || stderr.contains("No such file") {
                return Ok(vec![]);
            }
            return Err(non_zero("list-sessions", &output));
        }

        Ok(parse_sessions(&String::from_utf8_lossy(&output.stdout)))
    }

    /// List the windows of one session, ordered by index.
    pub async fn list_windows(session: &str) -> Result<Vec<WindowInfo>, TmuxError> {
        validate_session_name(session)?;
        let stdout = run_tmux_output(
            "list-windows",
            &[
                "list-windows",
                "-t",
                session,
                "-F",
                "#{window_index}:#{window_name}:#{window_active}",
            ],
            Duration::from_secs(2),
        )
        .await?;
        Ok(parse_windows(&stdout))
    }

    /// One-shot fleet scan: every pane of every session with its last
    /// activity timestamp.
    pub async fn list_panes_all() -> Result<Vec<PaneInfo>, TmuxError> {
        let output = run_tmux(
            "list-panes",
            &[
                "list-panes",
                "-a",
                "-F",
                "#{session_name}|#{window_index}|#{window_name}|#{pane_activity}",
            ],
            Duration::from_secs(2),
        )
        .await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            if stderr.contains("no server running") {
                return Ok(vec![]);
            }
            return Err(non_zero("list-panes", &output));
        }

        Ok(parse_panes(&String::from_utf8_lossy(&output.stdout)))
    }

    /// Capture the last `lines` lines of a pane. A timed-out capture
    /// yields an empty string rather than an error so one slow pane
    /// cannot abort a monitoring pass.
    pub async fn capture_pane(target: &Target, lines: u32) -> Result<String, TmuxError> {
        let target_str = target.to_string();
        let start = format!("-{lines}");
        let result = run_tmux(
            "capture-pane",
            &["capture-pane", "-t", &target_str, "-p", "-S", &start],
            Duration::from_secs(2),
        )
        .await;

        match result {
            Ok(output) if output.status.success() => {
                Ok(String::from_utf8_lossy(&output.stdout).into_owned())
            }
            Ok(output) => Err(non_zero("capture-pane", &output)),
            Err(TmuxError::Timeout { .. }) => Ok(String::new()),
            Err(e) => Err(e),
        }
    }

    /// Send keys to a pane. `literal` passes `-l` so the payload is
    /// typed verbatim instead of being interpreted as key names.
    pub async fn send_keys(target: &Target, keys: &str, literal: bool) -> Result<(), TmuxError> {
        validate_keys(keys)?;
        let target_str = target.to_string();
        let mut args = vec!["send-keys", "-t", target_str.as_str()];
        if literal {
            args.push("-l");
        }
        args.push(keys);
        run_tmux_checked("send-keys", &args, Duration::from_secs(2)).await
    }

    /// Press Enter in the target pane.
    pub async fn press_enter(target: &Target) -> Result<(), TmuxError> {
        Self::send_keys(target, "Enter", false).await
    }

    /// Press Ctrl+U (clear input line) in the target pane.
    pub async fn press_ctrl_u(target: &Target) -> Result<(), TmuxError> {
        Self::send_keys(target, "C-u", false).await
    }

    pub async fn kill_window(target: &Target) -> Result<(), TmuxError> {
        warn!(target = %target, "killing tmux window");
        let target_str = target.to_string();
        run_tmux_checked(
            "kill-window",
            &["kill-window", "-t", &target_str],
            Duration::from_secs(2),
        )
        .await
    }

    pub async fn kill_session(name: &str) -> Result<(), TmuxError> {
        validate_session_name(name)?;
        warn!(session = name, "killing tmux session");
        run_tmux_checked(
            "kill-session",
            &["kill-session", "-t", name],
            Duration::from_secs(2),
        )
        .await
    }

    /// Attach to a session, replacing the current terminal.
    pub fn attach(session: &str) -> Result<(), TmuxError> {
        validate_session_name(session)?;
        let status = std::process::Command::new("tmux")
            .args(["attach-session", "-t", session])
            .status()
            .map_err(|_| TmuxError::Unavailable)?;
        if !status.success() {
            return Err(TmuxError::NonZeroExit {
                op: "attach-session",
                code: status.code().unwrap_or(-1),
                stderr: String::new(),
            });
        }
        Ok(())
    }
}

// ---- validation ----

fn validate_input(value: &str, field: &str) -> Result<(), TmuxError> {
    if value.contains('\0') {
        return Err(TmuxError::InvalidInput(format!(
            "{field} contains null byte"
        )));
    }
    Ok(())
}

fn validate_session_name(name: &str) -> Result<(), TmuxError> {
    validate_input(name, "session name")?;
    if name.trim().is_empty() {
        return Err(TmuxError::InvalidInput(
            "session name is empty or whitespace".into(),
        ));
    }
    if !is_valid_session_name(name) {
        return Err(TmuxError::InvalidInput(format!(
            "session name '{name}' contains forbidden characters"
        )));
    }
    Ok(())
}

fn validate_keys(keys: &str) -> Result<(), TmuxError> {
    validate_input(keys, "keys")
}

/// Replace characters that confuse tmux targets or shells with safe
/// equivalents. Falls back to `window` when nothing survives.
pub fn sanitize_window_name(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    for c in name.chars() {
        match c {
            '\0' => {}
            ':' | ';' | '|' => out.push('-'),
            '&' => out.push_str("and"),
            '<' => out.push_str("_lt_"),
            '>' => out.push_str("_gt_"),
            '(' | ')' | '{' | '}' | '[' | ']' | '$' | '`' | '\\' | '"' | '\'' => out.push('_'),
            c => out.push(c),
        }
    }
    let trimmed = out.trim();
    if trimmed.is_empty() {
        "window".to_string()
    } else {
        trimmed.to_string()
    }
}

// ---- parsing ----

fn parse_sessions(stdout: &str) -> Vec<SessionInfo> {
    stdout
        .lines()
        .filter(|l| !l.is_empty())
        .filter_map(|line| {
            let mut parts = line.splitn(3, ':');
            let name = parts.next()?;
            let created = parts.next().and_then(|s| s.parse().ok()).unwrap_or(0);
            let attached = parts.next().map(|s| s != "0").unwrap_or(false);
            Some(SessionInfo {
                name: name.to_string(),
                created,
                attached,
            })
        })
        .collect()
}

/// `index:name:active` — the name may itself contain colons, so the
/// index is taken from the front and the active flag from the back.
fn parse_windows(stdout: &str) -> Vec<WindowInfo> {
    stdout
        .lines()
        .filter(|l| !l.is_empty())
        .filter_map(|line| {
            let (index_part, rest) = line.split_once(':')?;
            let (name, active_part) = rest.rsplit_once(':')?;
            Some(WindowInfo {
                index: index_part.parse().ok()?,
                name: name.to_string(),
                active: active_part == "1",
            })
        })
        .collect()
}

fn parse_panes(stdout: &str) -> Vec<PaneInfo> {
    stdout
        .lines()
        .filter(|l| !l.is_empty() && l.contains('|'))
        .filter_map(|line| {
            let parts: Vec<&str> = line.split('|').collect();
            if parts.len() < 3 {
                return None;
            }
            Some(PaneInfo {
                session: parts[0].to_string(),
                window_index: parts[1].parse().ok()?,
                window_name: parts[2].to_string(),
                activity: parts.get(3).and_then(|s| s.parse().ok()),
            })
        })
        .collect()
}

// ---- subprocess helpers ----

async fn run_tmux(op: &'static str, args: &[&str], timeout: Duration) -> Result<Output, TmuxError> {
    let child = Command::new("tmux").args(args).kill_on_drop(true).output();

    match tokio::time::timeout(timeout, child).await {
        Ok(Ok(output)) => Ok(output),
        Ok(Err(e)) if e.kind() == std::io::ErrorKind::NotFound => Err(TmuxError::Unavailable),
        Ok(Err(e)) => Err(TmuxError::NonZeroExit {
            op,
            code: -1,
            stderr: e.to_string(),
        }),
        Err(_) => {
            warn!(op, ?args, "tmux command timed out");
            Err(TmuxError::Timeout { op })
        }
    }
}

async fn run_tmux_checked(
    op: &'static str,
    args: &[&str],
    timeout: Duration,
) -> Result<(), TmuxError> {
    let output = run_tmux(op, args, timeout).await?;
    if !output.status.success() {
        let err = non_zero(op, &output);
        warn!(op, ?args, error = %err, "tmux command failed");
        return Err(err);
    }
    Ok(())
}

async fn run_tmux_output(
    op: &'static str,
    args: &[&str],
    timeout: Duration,
) -> Result<String, TmuxError> {
    let output = run_tmux(op, args, timeout).await?;
    if !output.status.success() {
        return Err(non_zero(op, &output));
    }
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

fn non_zero(op: &'static str, output: &Output) -> TmuxError {
    TmuxError::NonZeroExit {
        op,
        code: output.status.code().unwrap_or(-1),
        stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
    }
}
