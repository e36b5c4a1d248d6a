use crate::config::Config;
use crate::domain::agent::{AgentState, Role};
use crate::domain::target::Target;
use crate::error::OrcError;
use crate::infra::cache::FleetCache;
use crate::infra::messaging;
use crate::monitor::classifier::{classify, take_snapshots};
use crate::monitor::notify::{TickAgent, plan_notifications};
use std::collections::{HashMap, HashSet};
use std::hash::{DefaultHasher, Hash, Hasher};
use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

/// Consecutive unchanged-content cycles before an agent is reported idle.
const IDLE_CYCLE_THRESHOLD: u32 = 3;
/// Wall-clock seconds without a content change before an agent is
/// reported idle regardless of cycle count.
const IDLE_SECS_THRESHOLD: u64 = 120;
/// A tick running longer than interval × this factor kills the daemon.
const WATCHDOG_FACTOR: u32 = 4;
/// Scratch state is purged after a target misses this many scans.
const PURGE_MISSED_SCANS: u32 = 2;
/// Waiting longer than this for a worker slot means the pool is saturated.
const BACKPRESSURE_WARN: Duration = Duration::from_secs(1);
/// Session creation timestamps this far in the future mean the clock is
/// unusable for activity math.
const CLOCK_SKEW_LIMIT_SECS: i64 = 24 * 60 * 60;

/// Per-target scratch owned by the daemon between ticks.
#[derive(Debug)]
struct AgentScratch {
    last_hash: u64,
    last_change_at: Instant,
    idle_cycles: u32,
    missed_scans: u32,
}

/// Idle-cycle accounting across ticks. Pure with respect to time: the
/// caller supplies `now`.
#[derive(Debug, Default)]
pub struct ScratchTable {
    entries: HashMap<Target, AgentScratch>,
}

impl ScratchTable {
    /// Fold one observation into the table and decide whether the agent
    /// is reported idle this tick.
    pub fn observe(
        &mut self,
        target: &Target,
        role: Role,
        state: AgentState,
        content_hash: u64,
        now: Instant,
    ) -> TickAgent {
        use std::collections::hash_map::Entry;
        let entry = match self.entries.entry(target.clone()) {
            Entry::Vacant(vacant) => {
                // First sighting establishes the baseline; there is no
                // previous snapshot to have stayed unchanged from.
                vacant.insert(AgentScratch {
                    last_hash: content_hash,
                    last_change_at: now,
                    idle_cycles: 0,
                    missed_scans: 0,
                });
                return TickAgent {
                    target: target.clone(),
                    role,
                    state,
                    reported_idle: false,
                };
            }
            Entry::Occupied(occupied) => occupied.into_mut(),
        };
        entry.missed_scans = 0;

        if entry.last_hash != content_hash {
            entry.last_hash = content_hash;
            entry.last_change_at = now;
            entry.idle_cycles = 0;
        } else {
            entry.idle_cycles += 1;
        }

        let stale_for = now.duration_since(entry.last_change_at);
        let reported_idle = state == AgentState::Idle
            && (entry.idle_cycles >= IDLE_CYCLE_THRESHOLD
                || stale_for > Duration::from_secs(IDLE_SECS_THRESHOLD));

        TickAgent {
            target: target.clone(),
            role,
            state,
            reported_idle,
        }
    }

    /// Account a scan's membership: targets absent from `seen` for two
    /// consecutive scans are forgotten.
    pub fn sweep(&mut self, seen: &HashSet<Target>) {
        self.entries.retain(|target, entry| {
            if seen.contains(target) {
                true
            } else {
                entry.missed_scans += 1;
                entry.missed_scans < PURGE_MISSED_SCANS
            }
        });
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// The monitoring daemon: discovers agents every tick, classifies them
/// concurrently, and alerts each session's PM about idle or crashed
/// members.
pub struct MonitorDaemon {
    config: Config,
    cache: FleetCache,
    scratch: ScratchTable,
}

impl MonitorDaemon {
    pub fn new(config: Config) -> Self {
        let cache = FleetCache::new(&config);
        Self {
            config,
            cache,
            scratch: ScratchTable::default(),
        }
    }

    /// Main daemon loop. Blocks until SIGTERM/SIGINT; a second signal
    /// exits immediately.
    pub async fn run(mut self) -> Result<(), OrcError> {
        let interval = Duration::from_secs(self.config.monitor_interval_secs());
        let pid_file = self.config.monitor_pid_file();

        write_pid_file(&pid_file)?;
        check_clock_sanity(&self.cache).await?;

        let shutdown = Arc::new(AtomicBool::new(false));
        spawn_signal_task(shutdown.clone());

        info!(
            pid = std::process::id(),
            interval_secs = interval.as_secs(),
            pool = self.config.max_concurrent_checks,
            "monitor daemon started"
        );

        let mut cycle: u64 = 0;
        while !shutdown.load(Ordering::SeqCst) {
            cycle += 1;
            let tick_started = Instant::now();

            let watchdog = interval * WATCHDOG_FACTOR;
            match tokio::time::timeout(watchdog, self.tick(cycle, &shutdown)).await {
                Ok(checked) => {
                    debug!(
                        cycle,
                        checked,
                        elapsed_ms = tick_started.elapsed().as_millis() as u64,
                        "tick complete"
                    );
                }
                Err(_) => {
                    error!(cycle, "tick exceeded watchdog limit, terminating");
                    let _ = std::fs::remove_file(&pid_file);
                    std::process::exit(3);
                }
            }

            if shutdown.load(Ordering::SeqCst) {
                break;
            }

            // Drift within the tick subtracts from the sleep so cadence
            // holds at N × interval over N ticks.
            let sleep_for = interval.saturating_sub(tick_started.elapsed());
            let slept = tokio::time::sleep(sleep_for);
            tokio::pin!(slept);
            loop {
                if shutdown.load(Ordering::SeqCst) {
                    break;
                }
                tokio::select! {
                    _ = &mut slept => break,
                    _ = tokio::time::sleep(Duration::from_millis(200)) => {}
                }
            }
        }

        info!("monitor daemon shutting down");
        let _ = std::fs::remove_file(&pid_file);
        Ok(())
    }

    /// One monitoring cycle. Returns the number of agents checked.
    async fn tick(&mut self, cycle: u64, shutdown: &AtomicBool) -> usize {
        // Fast path for membership only; authoritative states come from
        // the snapshot classifier below.
        let agents = match self.cache.discover_agents().await {
            Ok(agents) => agents,
            Err(e) => {
                warn!(cycle, error = %e, "agent discovery failed, skipping tick");
                return 0;
            }
        };

        if agents.is_empty() {
            debug!(cycle, "no agents found");
            self.scratch.sweep(&HashSet::new());
            return 0;
        }
        debug!(
            cycle,
            discovered = agents.len(),
            tracked = self.scratch.len(),
            "classifying fleet"
        );

        let classified = self.classify_batch(&agents).await;
        let now = Instant::now();

        let seen: HashSet<Target> = classified.iter().map(|(t, ..)| t.clone()).collect();
        let mut tick_agents: Vec<TickAgent> = classified
            .into_iter()
            .map(|(target, role, state, hash)| {
                self.scratch.observe(&target, role, state, hash, now)
            })
            .collect();
        self.scratch.sweep(&seen);
        tick_agents.sort_by(|a, b| a.target.cmp(&b.target));

        // Graceful shutdown finishes the classification batch but never
        // dispatches.
        if shutdown.load(Ordering::SeqCst) {
            return tick_agents.len();
        }

        let (notifications, orphaned) = plan_notifications(&tick_agents);
        for session in orphaned {
            warn!(cycle, session = %session, "troubled agents but no PM to notify");
        }
        for notification in notifications {
            if messaging::send_message(&notification.recipient, &notification.body, &self.config)
                .await
            {
                info!(cycle, pm = %notification.recipient, "alert delivered");
            } else {
                // Retried on the next tick if the state still qualifies.
                warn!(cycle, pm = %notification.recipient, "alert delivery failed");
            }
        }

        tick_agents.len()
    }

    /// Classify every agent with bounded concurrency. A capture failure
    /// marks that agent Unknown for the tick and never aborts the batch.
    async fn classify_batch(
        &self,
        agents: &[crate::domain::agent::AgentStatus],
    ) -> Vec<(Target, Role, AgentState, u64)> {
        let semaphore = Arc::new(Semaphore::new(self.config.max_concurrent_checks));
        let snapshot_count = self.config.snapshot_count;
        let snapshot_interval = Duration::from_millis(self.config.snapshot_interval_ms);
        let capture_lines = self.config.capture_lines;

        let mut set = JoinSet::new();
        for agent in agents {
            let target = agent.target.clone();
            let role = agent.role;
            let semaphore = semaphore.clone();
            set.spawn(async move {
                let wait_started = Instant::now();
                let _permit = semaphore.acquire_owned().await;
                if wait_started.elapsed() > BACKPRESSURE_WARN {
                    warn!(target = %target, "worker pool saturated, tick may overrun");
                }

                match take_snapshots(&target, snapshot_count, snapshot_interval, capture_lines)
                    .await
                {
                    Ok(snapshots) => {
                        let state = classify(&snapshots);
                        let hash = content_hash(snapshots.last().map(String::as_str).unwrap_or(""));
                        (target, role, state, hash)
                    }
                    Err(e) => {
                        debug!(target = %target, error = %e, "capture failed");
                        (target, role, AgentState::Unknown, 0)
                    }
                }
            });
        }

        let mut results = vec![];
        while let Some(joined) = set.join_next().await {
            match joined {
                Ok(result) => results.push(result),
                Err(e) => warn!(error = %e, "classification task panicked"),
            }
        }
        results
    }
}

fn content_hash(content: &str) -> u64 {
    let mut hasher = DefaultHasher::new();
    content.hash(&mut hasher);
    hasher.finish()
}

/// Exclusively create the PID file. A live PID in an existing file means
/// another daemon owns the fleet; a dead one is cleaned up. A missing
/// state directory is fatal.
fn write_pid_file(path: &Path) -> Result<(), OrcError> {
    let dir = path
        .parent()
        .ok_or_else(|| OrcError::User("PID file has no parent directory".into()))?;
    std::fs::create_dir_all(dir)?;

    for _ in 0..2 {
        match std::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(path)
        {
            Ok(mut file) => {
                write!(file, "{}", std::process::id())?;
                return Ok(());
            }
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                match read_pid_file(path) {
                    Some(pid) if pid_alive(pid) => {
                        return Err(OrcError::User(format!(
                            "monitor already running (pid {pid})"
                        )));
                    }
                    _ => {
                        warn!(path = %path.display(), "removing stale PID file");
                        std::fs::remove_file(path)?;
                    }
                }
            }
            Err(e) => return Err(e.into()),
        }
    }
    Err(OrcError::User("could not claim PID file".into()))
}

pub fn read_pid_file(path: &Path) -> Option<i32> {
    std::fs::read_to_string(path)
        .ok()?
        .trim()
        .parse()
        .ok()
}

/// Signal-0 existence probe.
pub fn pid_alive(pid: i32) -> bool {
    unsafe { libc::kill(pid, 0) == 0 }
}

/// Activity math is meaningless if session creation timestamps sit more
/// than a day in the future; refuse to start on such a clock.
async fn check_clock_sanity(cache: &FleetCache) -> Result<(), OrcError> {
    let now = chrono::Utc::now().timestamp();
    for session in cache.list_sessions().await? {
        if session.created - now > CLOCK_SKEW_LIMIT_SECS {
            return Err(OrcError::User(format!(
                "clock skew detected: session '{}' created {}s in the future",
                session.name,
                session.created - now
            )));
        }
    }
    Ok(())
}

/// First signal requests graceful shutdown; the second exits on the spot.
fn spawn_signal_task(shutdown: Arc<AtomicBool>) {
    tokio::spawn(async move {
        use tokio::signal::unix::{SignalKind, signal};
        let mut sigterm = match signal(SignalKind::terminate()) {
            Ok(s) => s,
            Err(e) => {
                error!(error = %e, "failed to install SIGTERM handler");
                return;
            }
        };
        let mut sigint = match signal(SignalKind::interrupt()) {
            Ok(s) => s,
            Err(e) => {
                error!(error = %e, "failed to install SIGINT handler");
                return;
            }
        };

        tokio::select! {
            _ = sigterm.recv() => {}
            _ = sigint.recv() => {}
        }
        info!("shutdown signal received, finishing current batch");
        shutdown.store(true, Ordering::SeqCst);

        tokio::select! {
            _ = sigterm.recv() => {}
            _ = sigint.recv() => {}
        }
        warn!("second signal, exiting immediately");
        std::process::exit(1);
    });
}
