use crate::domain::agent::AgentState;
use crate::domain::target::Target;
use crate::error::TmuxError;
use crate::infra::tmux::TmuxDriver;
use std::time::Duration;

/// Markers that indicate the Claude REPL is running in a pane. Any one
/// of them counts; the box-drawing corners only count as a pair.
const INTERFACE_MARKERS: &[&str] = &[
    "│ >",
    "assistant:",
    "Human:",
    "? for shortcuts",
    "Bypassing Permissions",
    "@anthropic-ai/claude-code",
];

/// Lowercased spinner verbs shown next to the ellipsis while Claude works.
const WORKING_TOKENS: &[&str] = &["thinking", "pondering", "divining", "musing", "elucidating"];

/// Shell prompt suffixes that mark a crashed agent.
const PROMPT_SUFFIXES: &[char] = &['$', '#', '>', '%'];

pub fn is_claude_interface_present(content: &str) -> bool {
    INTERFACE_MARKERS.iter().any(|m| content.contains(m))
        || (content.contains("╭─") && content.contains("╰─"))
}

/// Classify an agent pane from a sequence of snapshots taken a few
/// hundred milliseconds apart. Deterministic and total: identical
/// snapshot sequences always produce identical states, and no input
/// errors.
pub fn classify(snapshots: &[String]) -> AgentState {
    let Some(current) = snapshots.last() else {
        return AgentState::Unknown;
    };

    if !is_claude_interface_present(current) {
        return classify_without_interface(current);
    }

    if has_queued_message(current) {
        return AgentState::MessageQueued;
    }

    // Interface up but no conversation turn yet: awaiting a briefing.
    if !current.contains("assistant:") && !current.contains("Human:") {
        return AgentState::Fresh;
    }

    // A single differing byte between adjacent snapshots is cursor
    // blink; anything more is real output movement.
    for pair in snapshots.windows(2) {
        if byte_difference(&pair[0], &pair[1]) > 1 {
            return AgentState::Active;
        }
    }

    if has_working_indicator(current) {
        return AgentState::Active;
    }

    AgentState::Idle
}

fn classify_without_interface(content: &str) -> AgentState {
    if content.trim().is_empty() {
        return AgentState::Unknown;
    }

    let last_lines: Vec<&str> = content
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect();
    let tail = &last_lines[last_lines.len().saturating_sub(5)..];

    if tail
        .iter()
        .any(|line| line.ends_with(PROMPT_SUFFIXES))
    {
        AgentState::Crashed
    } else {
        AgentState::Error
    }
}

/// Text sitting in the input box: the `│ >` glyph followed by visible
/// non-whitespace before the closing `╰─` border.
fn has_queued_message(content: &str) -> bool {
    let Some(prompt_at) = content.rfind("│ >") else {
        return false;
    };
    let after_prompt = &content[prompt_at + "│ >".len()..];
    let segment = match after_prompt.find("╰─") {
        Some(border_at) => &after_prompt[..border_at],
        None => return false,
    };
    segment
        .chars()
        .any(|c| !c.is_whitespace() && c != '│' && c != '╮' && c != '─')
}

fn has_working_indicator(content: &str) -> bool {
    let lower = content.to_lowercase();
    if lower.contains("compacting conversation") {
        return true;
    }
    content.contains('…') && WORKING_TOKENS.iter().any(|t| lower.contains(t))
}

/// Number of differing bytes between two snapshots: positional
/// mismatches over the common prefix plus the length difference.
fn byte_difference(a: &str, b: &str) -> usize {
    let a = a.as_bytes();
    let b = b.as_bytes();
    let mismatches = a.iter().zip(b.iter()).filter(|(x, y)| x != y).count();
    mismatches + a.len().abs_diff(b.len())
}

/// Take `count` snapshots of a pane, `interval` apart. Timed-out
/// captures come back as empty strings from the driver; real capture
/// failures propagate so the caller can mark the agent Unknown.
pub async fn take_snapshots(
    target: &Target,
    count: usize,
    interval: Duration,
    lines: u32,
) -> Result<Vec<String>, TmuxError> {
    let mut snapshots = Vec::with_capacity(count);
    for i in 0..count {
        snapshots.push(TmuxDriver::capture_pane(target, lines).await?);
        if i + 1 < count {
            tokio::time::sleep(interval).await;
        }
    }
    Ok(snapshots)
}

#[cfg(test)]
mod tests {
    use super::*;

    const IDLE_PANE: &str = "\
assistant: Done. The tests pass.\n\
╭──────────────────────────────╮\n\
│ >                            │\n\
╰──────────────────────────────╯\n\
  ? for shortcuts\n";

    fn snaps(contents: &[&str]) -> Vec<String> {
        contents.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_interface_markers() {
        assert!(is_claude_interface_present("│ > "));
        assert!(is_claude_interface_present("assistant: hello"));
        assert!(is_claude_interface_present("Human: hi"));
        assert!(is_claude_interface_present("press ? for shortcuts"));
        assert!(is_claude_interface_present("Bypassing Permissions"));
        assert!(is_claude_interface_present("@anthropic-ai/claude-code v1.0"));
        assert!(is_claude_interface_present("╭───╮\nstuff\n╰───╯"));
        // One corner alone is not the pair.
        assert!(!is_claude_interface_present("╭─── something"));
        assert!(!is_claude_interface_present("plain shell output"));
    }

    #[test]
    fn test_empty_capture_is_unknown() {
        assert_eq!(classify(&[]), AgentState::Unknown);
        assert_eq!(classify(&snaps(&["", "", "", ""])), AgentState::Unknown);
        assert_eq!(classify(&snaps(&["   \n  \n"])), AgentState::Unknown);
    }

    #[test]
    fn test_shell_prompt_is_crashed() {
        let pane = "some scrollback\nmore output\nuser@host:~$";
        assert_eq!(classify(&snaps(&[pane])), AgentState::Crashed);

        let pane = "logs\nroot@box:/app#";
        assert_eq!(classify(&snaps(&[pane])), AgentState::Crashed);

        let pane = "zsh hello\n%";
        assert_eq!(classify(&snaps(&[pane])), AgentState::Crashed);
    }

    #[test]
    fn test_prompt_beyond_last_five_lines_is_error() {
        // The prompt is buried more than 5 non-empty lines up.
        let pane = "user@host:~$\na\nb\nc\nd\ne\nf";
        assert_eq!(classify(&snaps(&[pane])), AgentState::Error);
    }

    #[test]
    fn test_no_interface_no_prompt_is_error() {
        let pane = "Traceback (most recent call last):\n  ValueError: boom";
        assert_eq!(classify(&snaps(&[pane])), AgentState::Error);
    }

    #[test]
    fn test_idle_interface() {
        assert_eq!(classify(&snaps(&[IDLE_PANE, IDLE_PANE])), AgentState::Idle);
    }

    #[test]
    fn test_fresh_interface_without_conversation() {
        let pane = "\
╭──────────────────────────────╮\n\
│ >                            │\n\
╰──────────────────────────────╯\n\
  ? for shortcuts\n";
        assert_eq!(classify(&snaps(&[pane, pane])), AgentState::Fresh);
    }

    #[test]
    fn test_queued_message() {
        let pane = "\
assistant: ready\n\
╭──────────────────────────────╮\n\
│ > fix the login bug          │\n\
╰──────────────────────────────╯\n";
        assert_eq!(classify(&snaps(&[pane, pane])), AgentState::MessageQueued);
    }

    #[test]
    fn test_queued_wins_over_activity() {
        let queued_a = "\
assistant: ready\n\
│ > draft reply                │\n\
╰──────────────────────────────╯\n";
        let queued_b = "\
assistant: ready now\n\
│ > draft reply longer         │\n\
╰──────────────────────────────╯\n";
        assert_eq!(
            classify(&snaps(&[queued_a, queued_b])),
            AgentState::MessageQueued
        );
    }

    #[test]
    fn test_activity_from_changed_content() {
        let a = format!("{IDLE_PANE}assistant: step one\n");
        let b = format!("{IDLE_PANE}assistant: step two done\n");
        assert_eq!(classify(&[a, b]), AgentState::Active);
    }

    #[test]
    fn test_cursor_blink_is_not_activity() {
        // Exactly one byte differs between snapshots.
        let a = format!("{IDLE_PANE}_");
        let b = format!("{IDLE_PANE} ");
        assert_eq!(classify(&[a, b]), AgentState::Idle);
    }

    #[test]
    fn test_appended_output_is_activity() {
        let a = IDLE_PANE.to_string();
        let b = format!("{IDLE_PANE}assistant: more\n");
        assert_eq!(classify(&[a, b]), AgentState::Active);
    }

    #[test]
    fn test_working_indicator_tokens() {
        for token in ["Thinking", "Pondering", "Divining", "Musing", "Elucidating"] {
            let pane = format!("{IDLE_PANE}✳ {token}… (3s)\n");
            assert_eq!(
                classify(&[pane.clone(), pane]),
                AgentState::Active,
                "token {token}"
            );
        }
    }

    #[test]
    fn test_ellipsis_without_token_is_not_working() {
        let pane = format!("{IDLE_PANE}loading…\n");
        assert_eq!(classify(&[pane.clone(), pane]), AgentState::Idle);
    }

    #[test]
    fn test_compacting_conversation_is_active() {
        let pane = format!("{IDLE_PANE}Compacting conversation\n");
        assert_eq!(classify(&[pane.clone(), pane]), AgentState::Active);
    }

    #[test]
    fn test_classify_is_deterministic() {
        let seq = snaps(&[IDLE_PANE, IDLE_PANE, IDLE_PANE, IDLE_PANE]);
        let first = classify(&seq);
        for _ in 0..10 {
            assert_eq!(classify(&seq), first);
        }
    }

    #[test]
    fn test_byte_difference() {
        assert_eq!(byte_difference("abc", "abc"), 0);
        assert_eq!(byte_difference("abc", "abd"), 1);
        assert_eq!(byte_difference("abc", "xyz"), 3);
        assert_eq!(byte_difference("abc", "abcdef"), 3);
        assert_eq!(byte_difference("", "ab"), 2);
    }
}
