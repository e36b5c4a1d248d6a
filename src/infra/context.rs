use crate::config::Config;
use crate::error::OrcError;
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Built-in briefing for project managers. A file named `pm.md` in the
/// contexts directory overrides it.
const PM_CONTEXT: &str = "\
# Project Manager

You are the Project Manager for this tmux session. You coordinate a team
of Claude agents, each running in its own window of this session.

## Responsibilities

- Break incoming work into tasks and assign each to one agent with
  `tmux-orc agent send <session:window> \"<task>\"`.
- Track progress. Idle and crashed agents are reported to you by the
  monitor; re-task or restart them promptly.
- Enforce quality: an agent's work is done only when its tests pass and
  its changes are reviewed.
- Escalate blockers you cannot resolve to the orchestrator.

## Operating rules

- One agent per window; check `tmux-orc agent list` before spawning.
- Keep messages to agents short and specific. Include acceptance
  criteria.
- Never kill a window without capturing its state first.
";

/// Built-in briefing for the orchestrator role.
const ORCHESTRATOR_CONTEXT: &str = "\
# Orchestrator

You are the Orchestrator: the human-facing root agent. You create and
supervise project teams; you do not implement tasks yourself.

## Responsibilities

- Turn feature requests into team compositions and deploy them with
  `tmux-orc team deploy`.
- Spawn one PM per project session (`tmux-orc spawn pm --session ...`)
  and delegate coordination to it.
- Review PM escalations and make scope and priority calls.
- Keep the fleet healthy: start the monitor daemon and act on its
  reports.

## Operating rules

- Communicate with PMs, not with individual workers.
- Prefer extending an existing team over creating a parallel one.
";

/// Load the briefing markdown for a role. Files under the contexts
/// directory win over the embedded defaults; a role with neither is an
/// error surfaced to the caller.
pub fn load_context(role: &str, config: &Config) -> Result<String, OrcError> {
    let path = config.contexts_dir().join(format!("{role}.md"));
    if path.exists() {
        return std::fs::read_to_string(&path).map_err(OrcError::Io);
    }

    match role {
        "pm" => Ok(PM_CONTEXT.to_string()),
        "orchestrator" => Ok(ORCHESTRATOR_CONTEXT.to_string()),
        _ => Err(OrcError::ContextNotFound(role.to_string())),
    }
}

/// Every role with a briefing available: files on disk plus the
/// embedded defaults. Values are the source path, or None for built-ins.
pub fn available_contexts(config: &Config) -> BTreeMap<String, Option<PathBuf>> {
    let mut contexts: BTreeMap<String, Option<PathBuf>> = BTreeMap::new();
    contexts.insert("orchestrator".into(), None);
    contexts.insert("pm".into(), None);

    let dir = config.contexts_dir();
    if let Ok(entries) = std::fs::read_dir(&dir) {
        for entry in entries.flatten() {
            let path = entry.path();
            if path.extension().is_some_and(|e| e == "md") {
                if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                    contexts.insert(stem.to_string(), Some(path.clone()));
                }
            }
        }
    }

    contexts
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_with_contexts(dir: &std::path::Path) -> Config {
        Config {
            contexts_dir: Some(dir.to_path_buf()),
            ..Default::default()
        }
    }

    #[test]
    fn test_embedded_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_with_contexts(dir.path());

        let pm = load_context("pm", &config).unwrap();
        assert!(pm.contains("Project Manager"));

        let orc = load_context("orchestrator", &config).unwrap();
        assert!(orc.contains("Orchestrator"));
    }

    #[test]
    fn test_missing_role_errors() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_with_contexts(dir.path());
        let err = load_context("wizard", &config).unwrap_err();
        assert!(matches!(err, OrcError::ContextNotFound(_)));
    }

    #[test]
    fn test_file_overrides_builtin() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("pm.md"), "custom pm briefing").unwrap();
        let config = config_with_contexts(dir.path());
        assert_eq!(load_context("pm", &config).unwrap(), "custom pm briefing");
    }

    #[test]
    fn test_available_contexts_merges_dir_and_builtins() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("researcher.md"), "r").unwrap();
        std::fs::write(dir.path().join("notes.txt"), "not a context").unwrap();
        let config = config_with_contexts(dir.path());

        let contexts = available_contexts(&config);
        assert!(contexts.contains_key("pm"));
        assert!(contexts.contains_key("orchestrator"));
        assert!(contexts.contains_key("researcher"));
        assert!(!contexts.contains_key("notes"));
    }
}
