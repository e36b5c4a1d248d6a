use crate::error::OrcError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Global config: ~/.config/tmux-orc/config.toml
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Monitor tick interval in seconds. Values below 5 are clamped up.
    pub monitor_interval_secs: u64,
    /// Bounded concurrency for tmux subprocess calls during monitoring.
    /// tmux throughput degrades above ~10 concurrent clients.
    pub max_concurrent_checks: usize,
    /// TTL for memoized session/window/agent listings.
    pub cache_ttl_secs: f64,
    /// Extended TTL used by whole-fleet listings.
    pub extended_cache_ttl_secs: f64,
    /// Pause between the clear/text/Enter steps of a message send.
    pub send_delay_ms: u64,
    /// Snapshots taken per classification.
    pub snapshot_count: usize,
    /// Delay between snapshots.
    pub snapshot_interval_ms: u64,
    /// Scrollback lines captured per snapshot.
    pub capture_lines: u32,
    /// The Claude CLI binary to launch agents with.
    pub claude_command: String,
    /// Override for the per-user state directory (default ~/.tmux-orchestrator).
    pub state_dir: Option<PathBuf>,
    /// Override for the role-briefing contexts directory.
    pub contexts_dir: Option<PathBuf>,
}

pub const MIN_MONITOR_INTERVAL_SECS: u64 = 5;

impl Default for Config {
    fn default() -> Self {
        Self {
            monitor_interval_secs: 30,
            max_concurrent_checks: 10,
            cache_ttl_secs: 5.0,
            extended_cache_ttl_secs: 10.0,
            send_delay_ms: 500,
            snapshot_count: 4,
            snapshot_interval_ms: 300,
            capture_lines: 50,
            claude_command: "claude".into(),
            state_dir: None,
            contexts_dir: None,
        }
    }
}

impl Config {
    pub fn monitor_interval_secs(&self) -> u64 {
        self.monitor_interval_secs.max(MIN_MONITOR_INTERVAL_SECS)
    }

    /// Per-user state directory: tasks, assignments, logs, PID file.
    pub fn state_dir(&self) -> PathBuf {
        self.state_dir.clone().unwrap_or_else(|| {
            dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".tmux-orchestrator")
        })
    }

    pub fn tasks_dir(&self) -> PathBuf {
        self.state_dir().join("tasks")
    }

    pub fn assignments_dir(&self) -> PathBuf {
        self.state_dir().join("assignments")
    }

    pub fn quality_checks_dir(&self) -> PathBuf {
        self.state_dir().join("quality_checks")
    }

    pub fn logs_dir(&self) -> PathBuf {
        self.state_dir().join("logs")
    }

    pub fn monitor_pid_file(&self) -> PathBuf {
        self.state_dir().join("enhanced-monitor.pid")
    }

    pub fn monitor_log_file(&self) -> PathBuf {
        self.logs_dir().join("enhanced-monitor.log")
    }

    pub fn contexts_dir(&self) -> PathBuf {
        self.contexts_dir
            .clone()
            .unwrap_or_else(|| global_config_dir().join("contexts"))
    }
}

/// Load configuration, falling back to defaults when no file exists.
pub fn load_config() -> Result<Config, OrcError> {
    load_config_from(&global_config_dir().join("config.toml"))
}

pub fn load_config_from(path: &Path) -> Result<Config, OrcError> {
    if path.exists() {
        let content = std::fs::read_to_string(path)
            .map_err(|e| OrcError::ConfigFile(format!("failed to read {}: {e}", path.display())))?;
        let config = toml::from_str(&content)
            .map_err(|e| OrcError::ConfigFile(format!("failed to parse {}: {e}", path.display())))?;
        Ok(config)
    } else {
        Ok(Config::default())
    }
}

pub fn global_config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("~/.config"))
        .join("tmux-orc")
}

/// TMUX_ORC_DEBUG truthy → verbose logging.
pub fn debug_enabled() -> bool {
    matches!(
        std::env::var("TMUX_ORC_DEBUG")
            .unwrap_or_default()
            .to_lowercase()
            .as_str(),
        "true" | "1" | "yes"
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let c = Config::default();
        assert_eq!(c.monitor_interval_secs(), 30);
        assert_eq!(c.max_concurrent_checks, 10);
        assert_eq!(c.cache_ttl_secs, 5.0);
        assert_eq!(c.send_delay_ms, 500);
        assert_eq!(c.snapshot_count, 4);
    }

    #[test]
    fn test_interval_clamped_to_minimum() {
        let c = Config {
            monitor_interval_secs: 1,
            ..Default::default()
        };
        assert_eq!(c.monitor_interval_secs(), 5);
    }

    #[test]
    fn test_partial_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let mut f = std::fs::File::create(&path).unwrap();
        writeln!(f, "monitor_interval_secs = 60").unwrap();
        writeln!(f, "max_concurrent_checks = 4").unwrap();

        let c = load_config_from(&path).unwrap();
        assert_eq!(c.monitor_interval_secs(), 60);
        assert_eq!(c.max_concurrent_checks, 4);
        // Unspecified fields keep their defaults.
        assert_eq!(c.send_delay_ms, 500);
    }

    #[test]
    fn test_missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let c = load_config_from(&dir.path().join("nope.toml")).unwrap();
        assert_eq!(c.max_concurrent_checks, 10);
    }

    #[test]
    fn test_state_dir_override() {
        let c = Config {
            state_dir: Some(PathBuf::from("/tmp/orc-test")),
            ..Default::default()
        };
        assert_eq!(c.monitor_pid_file(), PathBuf::from("/tmp/orc-test/enhanced-monitor.pid"));
        assert_eq!(
            c.monitor_log_file(),
            PathBuf::from("/tmp/orc-test/logs/enhanced-monitor.log")
        );
        assert_eq!(c.tasks_dir(), PathBuf::from("/tmp/orc-test/tasks"));
    }
}
