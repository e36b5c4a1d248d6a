pub mod classifier;
pub mod daemon;
pub mod notify;

use crate::config::Config;
use crate::domain::agent::{AgentState, AgentStatus};
use crate::error::OrcError;
use crate::infra::cache::FleetCache;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::debug;

/// Authoritative fleet discovery: membership from the fast scan, states
/// from the snapshot classifier. Slower than `FleetCache::discover_agents`
/// by design; use it where the state actually matters.
pub async fn deep_discover(
    cache: &FleetCache,
    config: &Config,
) -> Result<Vec<AgentStatus>, OrcError> {
    let agents = cache.discover_agents().await?;

    let semaphore = Arc::new(Semaphore::new(config.max_concurrent_checks));
    let snapshot_count = config.snapshot_count;
    let snapshot_interval = Duration::from_millis(config.snapshot_interval_ms);
    let capture_lines = config.capture_lines;

    let mut set = JoinSet::new();
    for agent in agents {
        let semaphore = semaphore.clone();
        set.spawn(async move {
            let _permit = semaphore.acquire_owned().await;
            let state = match classifier::take_snapshots(
                &agent.target,
                snapshot_count,
                snapshot_interval,
                capture_lines,
            )
            .await
            {
                Ok(snapshots) => classifier::classify(&snapshots),
                Err(e) => {
                    debug!(target = %agent.target, error = %e, "capture failed");
                    AgentState::Unknown
                }
            };
            AgentStatus { state, ..agent }
        });
    }

    let mut results = vec![];
    while let Some(joined) = set.join_next().await {
        if let Ok(status) = joined {
            results.push(status);
        }
    }
    results.sort_by(|a, b| a.target.cmp(&b.target));
    Ok(results)
}
