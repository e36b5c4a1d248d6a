mod cli;
mod commands;
mod config;
mod domain;
mod error;
mod infra;
mod monitor;

use clap::Parser;
use cli::{
    AgentSubcommand, Cli, Commands, ContextSubcommand, MonitorSubcommand, SessionSubcommand,
    SpawnSubcommand, TaskSubcommand, TeamSubcommand,
};
use error::OrcError;
use infra::cache::FleetCache;
use tracing::info;

fn main() {
    let cli = Cli::parse();
    let json = cli.json;

    // The monitor daemon runs on a single-threaded cooperative
    // scheduler; its bounded concurrency comes from the worker-pool
    // semaphore, not from OS threads. Every other command gets the
    // default runtime.
    let is_daemon = matches!(
        cli.command,
        Commands::Monitor {
            action: MonitorSubcommand::Run { .. }
        }
    );
    let runtime = if is_daemon {
        tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
    } else {
        tokio::runtime::Runtime::new()
    };
    let runtime = match runtime {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("Error: failed to start runtime: {e}");
            std::process::exit(3);
        }
    };

    match runtime.block_on(run(cli, is_daemon)) {
        Ok(()) => {}
        Err(e) => {
            if json {
                commands::emit_json_failure::<()>(None, &e.to_string());
            } else {
                eprintln!("Error: {e}");
            }
            std::process::exit(e.exit_code());
        }
    }
}

async fn run(cli: Cli, is_daemon: bool) -> Result<(), OrcError> {
    let config = config::load_config()?;

    // The daemon logs to its own file; everything else shares the CLI log.
    let _guard = init_tracing(&config, is_daemon);

    // Context browsing works without a tmux install; everything else
    // drives the tmux server.
    if !matches!(cli.command, Commands::Context { .. }) {
        preflight_checks()?;
    }

    info!(command = ?cli.command, "tmux-orc started");

    let cache = FleetCache::new(&config);
    let json = cli.json;

    match cli.command {
        Commands::Spawn { what } => match what {
            SpawnSubcommand::Orc {
                profile,
                terminal,
                no_launch,
                no_gui,
            } => {
                commands::spawn::spawn_orc(
                    profile.as_deref(),
                    Some(terminal.as_str()),
                    no_launch,
                    no_gui,
                    json,
                    &config,
                )
                .await?;
            }
            SpawnSubcommand::Pm { session, extend } => {
                commands::spawn::spawn_pm(&cache, &session, extend.as_deref(), json, &config)
                    .await?;
            }
            SpawnSubcommand::Agent {
                name,
                target,
                briefing,
                working_dir,
            } => {
                commands::spawn::spawn_agent(
                    &cache,
                    &name,
                    &target,
                    &briefing,
                    working_dir.as_deref(),
                    json,
                    &config,
                )
                .await?;
            }
        },

        Commands::Agent { action } => match action {
            AgentSubcommand::List => commands::agent::list(&cache, json).await?,
            AgentSubcommand::Status { target } => {
                commands::agent::status(&cache, target.as_deref(), json, &config).await?;
            }
            AgentSubcommand::Send {
                target,
                message,
                urgent,
            } => commands::agent::send(&target, &message, urgent, json, &config).await?,
            AgentSubcommand::Kill { target } => {
                commands::agent::kill(&cache, &target, json).await?;
            }
            AgentSubcommand::Restart { target, briefing } => {
                commands::agent::restart(&cache, &target, briefing.as_deref(), json, &config)
                    .await?;
            }
            AgentSubcommand::KillAll => commands::agent::kill_all(&cache, json).await?,
        },

        Commands::Team { action } => match action {
            TeamSubcommand::Deploy {
                name,
                members,
                strategy,
                project_path,
            } => {
                commands::team::deploy(
                    &cache,
                    &name,
                    &members,
                    &strategy,
                    project_path.as_deref(),
                    json,
                    &config,
                )
                .await?;
            }
            TeamSubcommand::Status { session } => {
                commands::team::status(&cache, &session, json).await?;
            }
            TeamSubcommand::Broadcast {
                message,
                session,
                all_sessions,
                role,
                session_filter,
                exclude,
                urgent,
            } => {
                commands::team::broadcast(
                    &cache,
                    &message,
                    session.as_deref(),
                    all_sessions,
                    role.as_deref(),
                    session_filter.as_deref(),
                    &exclude,
                    urgent,
                    json,
                    &config,
                )
                .await?;
            }
        },

        Commands::Monitor { action } => match action {
            MonitorSubcommand::Start { interval } => {
                commands::monitor::start(interval, json, &config).await?;
            }
            MonitorSubcommand::Run { interval } => {
                commands::monitor::run(interval, &config).await?;
            }
            MonitorSubcommand::Stop => commands::monitor::stop(json, &config).await?,
            MonitorSubcommand::Status => commands::monitor::status(json, &config).await?,
        },

        Commands::Session { action } => match action {
            SessionSubcommand::List => commands::session::list(&cache, json).await?,
            SessionSubcommand::Attach { session } => {
                commands::session::attach(&session).await?;
            }
            SessionSubcommand::Kill { session } => {
                commands::session::kill(&cache, &session, json).await?;
            }
        },

        Commands::Context { action } => match action {
            ContextSubcommand::Show { role } => commands::context::show(&role, json, &config)?,
            ContextSubcommand::List => commands::context::list(json, &config)?,
        },

        Commands::Task { action } => match action {
            TaskSubcommand::Assign {
                target,
                description,
                priority,
                task_id,
            } => {
                commands::task::assign(
                    &target,
                    &description,
                    &priority,
                    task_id.as_deref(),
                    json,
                    &config,
                )
                .await?;
            }
            TaskSubcommand::Status {
                task_id,
                status,
                notes,
            } => {
                commands::task::set_status(&task_id, &status, notes.as_deref(), json, &config)
                    .await?;
            }
            TaskSubcommand::Show { task_id } => {
                commands::task::show(&task_id, json, &config).await?;
            }
            TaskSubcommand::List => commands::task::list(json, &config).await?,
        },
    }

    Ok(())
}

fn preflight_checks() -> Result<(), OrcError> {
    if !infra::tmux::TmuxDriver::is_available() {
        return Err(OrcError::TmuxNotInstalled);
    }
    Ok(())
}

/// Initialize tracing with a file appender under the state directory.
/// Returns a guard that must be held for the lifetime of the program
/// (dropping it flushes the writer).
fn init_tracing(
    config: &config::Config,
    daemon: bool,
) -> Option<tracing_appender::non_blocking::WorkerGuard> {
    use tracing_subscriber::{EnvFilter, fmt};

    let logs_dir = config.logs_dir();
    if std::fs::create_dir_all(&logs_dir).is_err() {
        return None;
    }

    let file_name = if daemon {
        "enhanced-monitor.log"
    } else {
        "tmux-orc.log"
    };
    let file_appender = tracing_appender::rolling::never(&logs_dir, file_name);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let default_level = if config::debug_enabled() {
        "debug"
    } else {
        "info"
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    fmt()
        .with_env_filter(filter)
        .with_writer(non_blocking)
        .with_ansi(false)
        .with_target(true)
        .with_thread_ids(false)
        .init();

    Some(guard)
}
