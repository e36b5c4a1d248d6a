use crate::config::Config;
use crate::error::OrcError;
use crate::monitor::daemon::{MonitorDaemon, pid_alive, read_pid_file};
use std::time::Duration;
use tracing::info;

/// `monitor start`: launch the daemon as a detached child process
/// re-executing this binary with the hidden `monitor run` command. The
/// child claims the PID file itself.
pub async fn start(interval: Option<u64>, json: bool, config: &Config) -> Result<(), OrcError> {
    let pid_file = config.monitor_pid_file();
    if let Some(pid) = read_pid_file(&pid_file) {
        if pid_alive(pid) {
            return Err(OrcError::User(format!(
                "monitor already running (pid {pid})"
            )));
        }
    }

    std::fs::create_dir_all(config.logs_dir())?;

    let exe = std::env::current_exe()?;
    let interval = interval.unwrap_or(config.monitor_interval_secs());

    let mut cmd = std::process::Command::new(exe);
    cmd.args(["monitor", "run", "--interval", &interval.to_string()])
        .stdin(std::process::Stdio::null())
        .stdout(std::process::Stdio::null())
        .stderr(std::process::Stdio::null());
    #[cfg(unix)]
    {
        use std::os::unix::process::CommandExt;
        cmd.process_group(0);
    }
    let child = cmd.spawn()?;

    // Give the child a moment to claim the PID file so we can report
    // failure-to-start here rather than silently.
    tokio::time::sleep(Duration::from_millis(800)).await;
    let running = read_pid_file(&pid_file).map(pid_alive).unwrap_or(false);
    if !running {
        return Err(OrcError::User(
            "monitor failed to start; check the monitor log".into(),
        ));
    }

    if json {
        super::emit_json(serde_json::json!({
            "pid": child.id(),
            "interval_secs": interval,
            "log_file": config.monitor_log_file(),
        }));
    } else {
        println!("Monitor started (pid {}, interval {interval}s)", child.id());
        println!("  log: {}", config.monitor_log_file().display());
    }
    Ok(())
}

/// Hidden `monitor run`: the daemon loop itself, in the foreground of
/// this process.
pub async fn run(interval: Option<u64>, config: &Config) -> Result<(), OrcError> {
    let mut config = config.clone();
    if let Some(secs) = interval {
        config.monitor_interval_secs = secs;
    }
    info!(interval = config.monitor_interval_secs(), "monitor run");
    MonitorDaemon::new(config).run().await
}

/// `monitor stop`: SIGTERM the daemon named in the PID file and wait
/// for it to clean up.
pub async fn stop(json: bool, config: &Config) -> Result<(), OrcError> {
    let pid_file = config.monitor_pid_file();
    let Some(pid) = read_pid_file(&pid_file) else {
        return Err(OrcError::User("monitor is not running".into()));
    };
    if !pid_alive(pid) {
        // Stale file from an unclean shutdown.
        let _ = std::fs::remove_file(&pid_file);
        return Err(OrcError::User("monitor is not running".into()));
    }

    unsafe {
        libc::kill(pid, libc::SIGTERM);
    }

    // Graceful shutdown finishes the in-flight batch; allow for that.
    for _ in 0..50 {
        if !pid_alive(pid) {
            break;
        }
        tokio::time::sleep(Duration::from_millis(200)).await;
    }

    let stopped = !pid_alive(pid);
    if !stopped {
        return Err(OrcError::User(format!(
            "monitor (pid {pid}) did not exit after SIGTERM"
        )));
    }

    if json {
        super::emit_json(serde_json::json!({ "stopped_pid": pid }));
    } else {
        println!("Monitor stopped (pid {pid})");
    }
    Ok(())
}

/// `monitor status`: PID liveness plus where the log lives.
pub async fn status(json: bool, config: &Config) -> Result<(), OrcError> {
    let pid_file = config.monitor_pid_file();
    let pid = read_pid_file(&pid_file);
    let running = pid.map(pid_alive).unwrap_or(false);

    if json {
        super::emit_json(serde_json::json!({
            "running": running,
            "pid": if running { pid } else { None },
            "log_file": config.monitor_log_file(),
        }));
    } else if running {
        println!("Monitor running (pid {})", pid.unwrap_or_default());
        println!("  log: {}", config.monitor_log_file().display());
    } else {
        println!("Monitor not running");
    }
    Ok(())
}
