use crate::config::Config;
use crate::domain::agent::Role;
use crate::domain::target::Target;
use crate::error::{OrcError, ProtocolError, StateError};
use crate::infra::cache::FleetCache;
use crate::infra::tmux::{TmuxDriver, sanitize_window_name};
use crate::infra::{claude, context, messaging, terminal};
use serde::Serialize;
use std::io::Write as _;
use std::time::Duration;
use tracing::{debug, info};

/// Settle time after typing the claude launch command before the first
/// interface poll.
const STARTUP_DELAY: Duration = Duration::from_secs(3);
/// Interface polling after startup: attempts and spacing.
const INTERFACE_POLLS: u32 = 5;
const INTERFACE_POLL_DELAY: Duration = Duration::from_secs(1);

#[derive(Debug, Serialize)]
struct SpawnReport {
    role: String,
    target: Target,
    window_name: String,
    briefed: bool,
}

/// `spawn pm`: ensure the session and a `Claude-pm` window exist, start
/// Claude, and deliver the standard PM briefing. The window index in the
/// requested target is deliberately ignored; windows are always appended.
pub async fn spawn_pm(
    cache: &FleetCache,
    target_str: &str,
    extend: Option<&str>,
    json: bool,
    config: &Config,
) -> Result<(), OrcError> {
    let requested = Target::parse(target_str)?;

    let mut briefing = context::load_context("pm", config)?;
    if let Some(extra) = extend {
        briefing.push_str("\n\n## Additional Instructions\n\n");
        briefing.push_str(extra);
    }

    let target = spawn_into_session(
        cache,
        &requested.session,
        "Claude-pm",
        Role::Pm,
        &briefing,
        None,
        None,
        config,
    )
    .await?;

    report(json, "PM", &target, "Claude-pm");
    Ok(())
}

/// `spawn agent`: a custom agent with a caller-supplied name and
/// briefing. Creates the session if absent.
pub async fn spawn_agent(
    cache: &FleetCache,
    name: &str,
    target_str: &str,
    briefing: &str,
    working_dir: Option<&str>,
    json: bool,
    config: &Config,
) -> Result<(), OrcError> {
    let requested = Target::parse(target_str)?;

    if let Some(dir) = working_dir {
        if !std::path::Path::new(dir).is_dir() {
            return Err(OrcError::User(format!(
                "working directory '{dir}' does not exist"
            )));
        }
    }

    let window_name = sanitize_window_name(&format!("Claude-{name}"));
    let role = Role::from_window_name(&window_name);

    let target = spawn_into_session(
        cache,
        &requested.session,
        &window_name,
        role,
        briefing,
        working_dir,
        None,
        config,
    )
    .await?;

    report(json, &role.to_string(), &target, &window_name);
    Ok(())
}

/// `spawn orc`: launch Claude as the orchestrator in a new terminal
/// window (or the current one with --no-gui).
pub async fn spawn_orc(
    profile: Option<&str>,
    terminal_pref: Option<&str>,
    no_launch: bool,
    no_gui: bool,
    json: bool,
    config: &Config,
) -> Result<(), OrcError> {
    if let Some(p) = profile {
        claude::validate_profile(p)?;
    }

    if no_gui {
        return spawn_orc_no_gui(profile, json, config);
    }

    let script = orc_startup_script(&config.claude_command, profile)?;
    let script_path = config.state_dir().join("orc-startup.sh");
    std::fs::create_dir_all(config.state_dir())?;
    terminal::write_startup_script(&script_path, &script)?;

    if no_launch {
        if json {
            super::emit_json(serde_json::json!({
                "script_path": script_path,
                "launched": false,
            }));
        } else {
            println!("Startup script created at: {}", script_path.display());
            println!("To launch manually, run: {}", script_path.display());
        }
        return Ok(());
    }

    if !claude::is_available() {
        return Err(OrcError::ClaudeNotInstalled);
    }
    let script_str = script_path.to_string_lossy();
    let cmd = terminal::detect_terminal(terminal_pref, &script_str).ok_or_else(|| {
        OrcError::User(
            "could not detect a terminal emulator; try --no-gui or --terminal <name>".into(),
        )
    })?;
    terminal::launch(&cmd)?;

    if json {
        super::emit_json(serde_json::json!({
            "script_path": script_path,
            "terminal": cmd.program,
            "launched": true,
        }));
    } else {
        println!("Orchestrator launching in {}...", cmd.program);
    }
    Ok(())
}

/// Run claude in the current terminal, feeding the orchestrator
/// instruction on stdin. Blocks until the session ends.
fn spawn_orc_no_gui(profile: Option<&str>, json: bool, config: &Config) -> Result<(), OrcError> {
    if !claude::is_available() {
        return Err(OrcError::ClaudeNotInstalled);
    }
    let argv = claude::launch_argv(&config.claude_command, profile)?;

    if !json {
        println!("Running orchestrator in current terminal...");
    }

    let mut child = std::process::Command::new(&argv[0])
        .args(&argv[1..])
        .stdin(std::process::Stdio::piped())
        .spawn()
        .map_err(|e| OrcError::User(format!("failed to launch claude: {e}")))?;

    if let Some(stdin) = child.stdin.as_mut() {
        stdin.write_all(ORC_INSTRUCTION.as_bytes())?;
    }
    child.wait()?;
    Ok(())
}

const ORC_INSTRUCTION: &str = "\
Welcome! You are being launched as the Tmux Orchestrator.

Please run the following command to load your orchestrator context:

tmux-orc context show orchestrator

This will provide your role, responsibilities, and workflow for managing
AI agent teams.
";

/// Bash startup script handed to the terminal emulator. The claude argv
/// is built from validated parts, so joining is injection-safe.
fn orc_startup_script(claude_bin: &str, profile: Option<&str>) -> Result<String, OrcError> {
    let argv = claude::launch_argv(claude_bin, profile)?;
    let claude_cmd = argv.join(" ");
    Ok(format!(
        "#!/bin/bash\n\
         # tmux-orc orchestrator startup\n\
         echo \"Starting Claude Code as Orchestrator...\"\n\
         sleep 1\n\
         INSTRUCTION_FILE=$(mktemp)\n\
         cat > \"$INSTRUCTION_FILE\" << 'EOF'\n\
         {ORC_INSTRUCTION}\n\
         EOF\n\
         {claude_cmd} \"$INSTRUCTION_FILE\"\n\
         rm -f \"$INSTRUCTION_FILE\"\n"
    ))
}

/// Shared spawn protocol for PM, team members, and custom agents:
/// session-if-absent, window always appended, claude launched, interface
/// verified, briefing delivered.
#[allow(clippy::too_many_arguments)]
pub async fn spawn_into_session(
    cache: &FleetCache,
    session: &str,
    window_name: &str,
    role: Role,
    briefing: &str,
    cwd: Option<&str>,
    profile: Option<&str>,
    config: &Config,
) -> Result<Target, OrcError> {
    if !claude::is_available() {
        return Err(OrcError::ClaudeNotInstalled);
    }
    let session_exists = TmuxDriver::has_session(session).await?;

    let target = if session_exists {
        ensure_role_unique(cache, session, role).await?;
        let index = cache.create_window(session, window_name, cwd).await?;
        Target::new(session, index)
    } else {
        cache
            .create_session(session, Some(window_name), cwd)
            .await?;
        Target::new(session, 0)
    };

    info!(target = %target, window = window_name, "starting claude");
    let launch = claude::launch_command(&config.claude_command, profile)?;
    TmuxDriver::send_keys(&target, &launch, true).await?;
    TmuxDriver::press_enter(&target).await?;

    tokio::time::sleep(STARTUP_DELAY).await;
    wait_for_interface(&target, config).await?;

    messaging::send_message_checked(&target, briefing, config).await?;
    Ok(target)
}

/// Poll the pane until the Claude interface shows up. Gives the REPL
/// five seconds beyond the startup delay before declaring failure.
pub async fn wait_for_interface(target: &Target, config: &Config) -> Result<(), OrcError> {
    for attempt in 1..=INTERFACE_POLLS {
        let content = TmuxDriver::capture_pane(target, config.capture_lines)
            .await
            .unwrap_or_default();
        if crate::monitor::classifier::is_claude_interface_present(&content) {
            debug!(target = %target, attempt, "claude interface detected");
            return Ok(());
        }
        if attempt < INTERFACE_POLLS {
            tokio::time::sleep(INTERFACE_POLL_DELAY).await;
        }
    }
    Err(ProtocolError::ClaudeInterfaceNotDetected(target.to_string()).into())
}

/// PM and Orchestrator are singleton roles within a session.
pub async fn ensure_role_unique(
    cache: &FleetCache,
    session: &str,
    role: Role,
) -> Result<(), OrcError> {
    if !role.is_unique_per_session() {
        return Ok(());
    }
    let windows = cache.list_windows(session).await?;
    for window in windows {
        if Role::from_window_name(&window.name) == role {
            return Err(StateError::RoleConflict(role).into());
        }
    }
    Ok(())
}

fn report(json: bool, role: &str, target: &Target, window_name: &str) {
    if json {
        super::emit_json(SpawnReport {
            role: role.to_string(),
            target: target.clone(),
            window_name: window_name.to_string(),
            briefed: true,
        });
    } else {
        println!("Spawned {role} agent at {target} ({window_name})");
    }
}
