use crate::config::Config;
use crate::domain::agent::{AgentState, AgentStatus, Role, is_agent_window};
use crate::domain::target::Target;
use crate::error::TmuxError;
use crate::infra::tmux::{PaneInfo, SessionInfo, TmuxDriver, WindowInfo};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Mutex;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Panes with activity newer than this are reported Active by the fast
/// discovery path.
pub const ACTIVITY_THRESHOLD_SECS: i64 = 300;

/// TTL-bounded memoization table. Entries older than the TTL passed to
/// `get` are treated as absent. Reads take a cloned snapshot; the mutex
/// is never held across an await.
pub struct TtlCache<K, V> {
    entries: Mutex<HashMap<K, (Instant, V)>>,
}

impl<K: Eq + Hash + Clone, V: Clone> TtlCache<K, V> {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn get(&self, key: &K, ttl: Duration) -> Option<V> {
        let entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        let (written, value) = entries.get(key)?;
        if written.elapsed() < ttl {
            Some(value.clone())
        } else {
            None
        }
    }

    /// Fetch regardless of freshness, for read paths that prefer stale
    /// data over nothing when tmux times out.
    pub fn get_stale(&self, key: &K) -> Option<V> {
        let entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.get(key).map(|(_, v)| v.clone())
    }

    pub fn put(&self, key: K, value: V) {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.insert(key, (Instant::now(), value));
    }

    pub fn clear(&self) {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.clear();
    }
}

impl<K: Eq + Hash + Clone, V: Clone> Default for TtlCache<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

/// Cached view of the tmux fleet. Wraps the driver with TTL memoization
/// for the read paths and whole-cache invalidation on every write.
pub struct FleetCache {
    ttl: Duration,
    /// Whole-fleet listings tolerate more staleness.
    extended_ttl: Duration,
    sessions: TtlCache<(), Vec<SessionInfo>>,
    windows: TtlCache<String, Vec<WindowInfo>>,
    agents: TtlCache<(), Vec<AgentStatus>>,
}

impl FleetCache {
    pub fn new(config: &Config) -> Self {
        Self {
            ttl: Duration::from_secs_f64(config.cache_ttl_secs),
            extended_ttl: Duration::from_secs_f64(config.extended_cache_ttl_secs),
            sessions: TtlCache::new(),
            windows: TtlCache::new(),
            agents: TtlCache::new(),
        }
    }

    /// Drop every memoized value. Called after any mutation of the fleet.
    pub fn invalidate(&self) {
        self.sessions.clear();
        self.windows.clear();
        self.agents.clear();
    }

    pub async fn list_sessions(&self) -> Result<Vec<SessionInfo>, TmuxError> {
        if let Some(cached) = self.sessions.get(&(), self.ttl) {
            debug!("using cached session list");
            return Ok(cached);
        }
        match TmuxDriver::list_sessions().await {
            Ok(sessions) => {
                self.sessions.put((), sessions.clone());
                Ok(sessions)
            }
            // A timed-out read is served from stale cache, or as empty.
            Err(TmuxError::Timeout { .. }) => {
                warn!("list-sessions timed out, serving stale data");
                Ok(self.sessions.get_stale(&()).unwrap_or_default())
            }
            Err(e) => Err(e),
        }
    }

    pub async fn list_windows(&self, session: &str) -> Result<Vec<WindowInfo>, TmuxError> {
        let key = session.to_string();
        if let Some(cached) = self.windows.get(&key, self.ttl) {
            return Ok(cached);
        }
        match TmuxDriver::list_windows(session).await {
            Ok(windows) => {
                self.windows.put(key, windows.clone());
                Ok(windows)
            }
            Err(TmuxError::Timeout { .. }) => {
                warn!(session, "list-windows timed out, serving stale data");
                Ok(self.windows.get_stale(&key).unwrap_or_default())
            }
            Err(e) => Err(e),
        }
    }

    /// Fast fleet discovery off a single `list-panes -a` scan. Status is
    /// derived purely from the pane activity timestamp, which makes this
    /// path authoritative for list/status UIs only; the monitor uses
    /// snapshot classification instead.
    pub async fn discover_agents(&self) -> Result<Vec<AgentStatus>, TmuxError> {
        if let Some(cached) = self.agents.get(&(), self.extended_ttl) {
            debug!("using cached agent list");
            return Ok(cached);
        }

        let agents = match TmuxDriver::list_panes_all().await {
            Ok(panes) => fast_agents_from_panes(&panes, Utc::now().timestamp()),
            Err(e) => {
                warn!(error = %e, "fleet scan failed, falling back to per-session listing");
                self.discover_agents_fallback().await?
            }
        };

        self.agents.put((), agents.clone());
        Ok(agents)
    }

    /// Fallback discovery when the one-shot scan fails: iterate sessions
    /// and windows. No activity data is available here, so states are
    /// Unknown. Any per-session failure aborts the scan; the cache is
    /// never fed a partial fleet.
    async fn discover_agents_fallback(&self) -> Result<Vec<AgentStatus>, TmuxError> {
        let mut agents = vec![];
        for session in self.list_sessions().await? {
            let windows = self.list_windows(&session.name).await?;
            for window in windows {
                if is_agent_window(&window.name) {
                    agents.push(AgentStatus {
                        target: Target::new(session.name.clone(), window.index),
                        role: Role::from_window_name(&window.name),
                        window_name: window.name,
                        state: AgentState::Unknown,
                        last_activity: None,
                    });
                }
            }
        }
        Ok(agents)
    }

    // Mutations go through the cache so the memoized listings can never
    // outlive the fleet state they describe.

    pub async fn create_session(
        &self,
        name: &str,
        first_window_name: Option<&str>,
        cwd: Option<&str>,
    ) -> Result<(), TmuxError> {
        let result = TmuxDriver::create_session(name, first_window_name, cwd).await;
        self.invalidate();
        result
    }

    pub async fn create_window(
        &self,
        session: &str,
        name: &str,
        cwd: Option<&str>,
    ) -> Result<u32, TmuxError> {
        let result = TmuxDriver::create_window(session, name, cwd).await;
        self.invalidate();
        result
    }

    pub async fn kill_window(&self, target: &Target) -> Result<(), TmuxError> {
        let result = TmuxDriver::kill_window(target).await;
        self.invalidate();
        result
    }

    pub async fn kill_session(&self, name: &str) -> Result<(), TmuxError> {
        let result = TmuxDriver::kill_session(name).await;
        self.invalidate();
        result
    }
}

/// Pure core of the fast discovery path: filter agent windows and derive
/// Active/Idle from the activity timestamp against a 300s threshold.
/// The scan is per-pane, so split windows are collapsed to one agent
/// (first pane wins).
pub fn fast_agents_from_panes(panes: &[PaneInfo], now_unix: i64) -> Vec<AgentStatus> {
    let mut seen: std::collections::HashSet<Target> = std::collections::HashSet::new();
    panes
        .iter()
        .filter(|p| is_agent_window(&p.window_name))
        .filter_map(|p| {
            let target = Target::new(p.session.clone(), p.window_index);
            if !seen.insert(target.clone()) {
                return None;
            }
            let (state, last_activity) = match p.activity {
                Some(ts) => {
                    let state = if now_unix - ts < ACTIVITY_THRESHOLD_SECS {
                        AgentState::Active
                    } else {
                        AgentState::Idle
                    };
                    (state, DateTime::from_timestamp(ts, 0))
                }
                None => (AgentState::Unknown, None),
            };
            Some(AgentStatus {
                target,
                role: Role::from_window_name(&p.window_name),
                window_name: p.window_name.clone(),
                state,
                last_activity,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pane(session: &str, index: u32, name: &str, activity: Option<i64>) -> PaneInfo {
        PaneInfo {
            session: session.into(),
            window_index: index,
            window_name: name.into(),
            activity,
        }
    }

    #[test]
    fn test_ttl_cache_fresh_and_expired() {
        let cache: TtlCache<String, u32> = TtlCache::new();
        cache.put("a".into(), 1);
        assert_eq!(cache.get(&"a".into(), Duration::from_secs(60)), Some(1));
        // A zero TTL makes every entry stale.
        assert_eq!(cache.get(&"a".into(), Duration::ZERO), None);
        // But the stale value is still reachable explicitly.
        assert_eq!(cache.get_stale(&"a".into()), Some(1));
    }

    #[test]
    fn test_ttl_cache_clear() {
        let cache: TtlCache<(), u32> = TtlCache::new();
        cache.put((), 7);
        cache.clear();
        assert_eq!(cache.get(&(), Duration::from_secs(60)), None);
        assert_eq!(cache.get_stale(&()), None);
    }

    #[test]
    fn test_fast_agents_filters_non_agent_windows() {
        let now = 1_714_000_000;
        let panes = vec![
            pane("proj", 0, "Claude-pm", Some(now - 10)),
            pane("proj", 1, "bash", Some(now - 10)),
            pane("proj", 2, "vim", Some(now)),
        ];
        let agents = fast_agents_from_panes(&panes, now);
        assert_eq!(agents.len(), 1);
        assert_eq!(agents[0].target, Target::new("proj", 0));
        assert_eq!(agents[0].role, Role::Pm);
    }

    #[test]
    fn test_fast_agents_activity_threshold() {
        let now = 1_714_000_000;
        let panes = vec![
            pane("a", 0, "Claude-backend", Some(now - 299)),
            pane("a", 1, "Claude-frontend", Some(now - 300)),
            pane("a", 2, "Claude-qa", None),
        ];
        let agents = fast_agents_from_panes(&panes, now);
        assert_eq!(agents[0].state, AgentState::Active);
        assert_eq!(agents[1].state, AgentState::Idle);
        assert_eq!(agents[2].state, AgentState::Unknown);
        assert!(agents[2].last_activity.is_none());
    }

    #[test]
    fn test_fast_agents_collapses_split_windows() {
        let now = 1_714_000_000;
        let panes = vec![
            pane("proj", 0, "Claude-pm", Some(now - 10)),
            pane("proj", 0, "Claude-pm", Some(now - 400)),
        ];
        let agents = fast_agents_from_panes(&panes, now);
        assert_eq!(agents.len(), 1);
        assert_eq!(agents[0].state, AgentState::Active);
    }

    #[test]
    fn test_fast_agents_roles() {
        let now = 0;
        let panes = vec![
            pane("a", 0, "Claude-pm", Some(0)),
            pane("a", 1, "Claude-developer-2", Some(0)),
            pane("b", 0, "frontend-dev", Some(0)),
        ];
        let agents = fast_agents_from_panes(&panes, now);
        assert_eq!(agents[0].role, Role::Pm);
        assert_eq!(agents[1].role, Role::Developer);
        assert_eq!(agents[2].role, Role::Frontend);
    }
}
