use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "tmux-orc",
    version,
    about = "Claude Code agent fleet orchestrator for tmux"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Output responses as JSON envelopes
    #[arg(long, global = true)]
    pub json: bool,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Spawn orchestrators, project managers, and custom agents
    Spawn {
        #[command(subcommand)]
        what: SpawnSubcommand,
    },

    /// Inspect and control individual agents
    Agent {
        #[command(subcommand)]
        action: AgentSubcommand,
    },

    /// Deploy and coordinate agent teams
    Team {
        #[command(subcommand)]
        action: TeamSubcommand,
    },

    /// Control the monitoring daemon
    Monitor {
        #[command(subcommand)]
        action: MonitorSubcommand,
    },

    /// Inspect and attach to tmux sessions
    Session {
        #[command(subcommand)]
        action: SessionSubcommand,
    },

    /// Standardized role briefings
    Context {
        #[command(subcommand)]
        action: ContextSubcommand,
    },

    /// Track task assignments routed to agents
    Task {
        #[command(subcommand)]
        action: TaskSubcommand,
    },
}

#[derive(Debug, Subcommand)]
pub enum TaskSubcommand {
    /// Create a task, route it to an agent, and deliver it
    Assign {
        /// Agent target session:window
        target: String,

        /// Task description sent to the agent
        description: String,

        /// Priority: low, medium, high, critical
        #[arg(long, default_value = "medium")]
        priority: String,

        /// Explicit task id (defaults to a generated one)
        #[arg(long)]
        task_id: Option<String>,
    },

    /// Transition a task's status
    Status {
        task_id: String,

        /// New status: pending, in_progress, completed, blocked, cancelled
        status: String,

        /// Completion or progress notes
        #[arg(long)]
        notes: Option<String>,
    },

    /// Print one task document
    Show { task_id: String },

    /// List all tasks
    List,
}

#[derive(Debug, Subcommand)]
pub enum SpawnSubcommand {
    /// Launch Claude as the orchestrator in a new terminal
    Orc {
        /// Claude Code profile to use
        #[arg(long)]
        profile: Option<String>,

        /// Terminal emulator: auto, gnome-terminal, konsole, kitty, alacritty, xterm
        #[arg(long, default_value = "auto")]
        terminal: String,

        /// Create the startup script but don't launch a terminal
        #[arg(long)]
        no_launch: bool,

        /// Run in the current terminal (SSH/headless environments)
        #[arg(long)]
        no_gui: bool,
    },

    /// Spawn a Project Manager with the standard PM briefing
    Pm {
        /// Target session:window (the window index is ignored; windows
        /// are always appended)
        #[arg(long)]
        session: String,

        /// Additional project-specific instructions appended to the
        /// standard briefing
        #[arg(long)]
        extend: Option<String>,
    },

    /// Spawn a custom agent with its own briefing
    Agent {
        /// Agent name (becomes the Claude-<name> window)
        name: String,

        /// Target session:window
        target: String,

        /// Agent briefing / system prompt
        #[arg(long)]
        briefing: String,

        /// Working directory for the agent
        #[arg(long)]
        working_dir: Option<String>,
    },
}

#[derive(Debug, Subcommand)]
pub enum AgentSubcommand {
    /// List all agents (fast, activity-timestamp based)
    List,

    /// Classify agent state from pane snapshots (authoritative)
    Status {
        /// Specific agent target; omit for the whole fleet
        target: Option<String>,
    },

    /// Send a message to an agent's input box and submit it
    Send {
        target: String,
        message: String,

        /// Prefix the message as urgent
        #[arg(long)]
        urgent: bool,
    },

    /// Kill an agent's window
    Kill { target: String },

    /// Kill and respawn an agent in a fresh window
    Restart {
        target: String,

        /// Briefing to send after the restart
        #[arg(long)]
        briefing: Option<String>,
    },

    /// Kill every agent window across all sessions
    KillAll,
}

#[derive(Debug, Subcommand)]
pub enum TeamSubcommand {
    /// Deploy a team of agents into a new session
    Deploy {
        /// Team name (becomes the session name)
        name: String,

        /// Members as role or role:count (e.g. pm:1 developer:2 qa)
        #[arg(required = true)]
        members: Vec<String>,

        /// Coordination strategy: hub_and_spoke, peer_to_peer, hierarchical
        #[arg(long, default_value = "hub_and_spoke")]
        strategy: String,

        /// Project path used as each agent's working directory
        #[arg(long)]
        project_path: Option<String>,
    },

    /// Show a team session's members and states
    Status { session: String },

    /// Broadcast a message to a scope of agents
    Broadcast {
        message: String,

        /// Limit to one session
        #[arg(long)]
        session: Option<String>,

        /// Every agent in every session
        #[arg(long)]
        all_sessions: bool,

        /// Every agent of one role across sessions
        #[arg(long)]
        role: Option<String>,

        /// Sessions whose name contains this pattern
        #[arg(long)]
        session_filter: Option<String>,

        /// Targets to skip (repeatable)
        #[arg(long)]
        exclude: Vec<String>,

        /// Prefix the message as urgent
        #[arg(long)]
        urgent: bool,
    },
}

#[derive(Debug, Subcommand)]
pub enum MonitorSubcommand {
    /// Start the monitoring daemon in the background
    Start {
        /// Tick interval in seconds (minimum 5)
        #[arg(long)]
        interval: Option<u64>,
    },

    /// Run the daemon loop in the foreground (used internally by start)
    #[command(hide = true)]
    Run {
        #[arg(long)]
        interval: Option<u64>,
    },

    /// Stop the monitoring daemon
    Stop,

    /// Report whether the daemon is running
    Status,
}

#[derive(Debug, Subcommand)]
pub enum SessionSubcommand {
    /// List tmux sessions with window and agent counts
    List,

    /// Attach to a session (replaces this terminal)
    Attach { session: String },

    /// Kill a session and every agent in it
    Kill { session: String },
}

#[derive(Debug, Subcommand)]
pub enum ContextSubcommand {
    /// Print the briefing for a role
    Show { role: String },

    /// List roles with available briefings
    List,
}
