use crate::error::OrcError;
use std::path::Path;
use tracing::debug;

/// Terminal emulators we know how to hand a startup script, in probe
/// order. On macOS the system `open` launcher fronts iTerm/Terminal.
const LINUX_EMULATORS: &[&str] = &["gnome-terminal", "konsole", "kitty", "alacritty", "xterm"];

/// Resolved launch plan: a program plus the argv that makes it run the
/// script in a new window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TerminalCommand {
    pub program: String,
    pub args: Vec<String>,
}

/// Build the argv for a known emulator. Returns None for emulators we
/// have no launch recipe for.
pub fn argv_for(emulator: &str, script: &str) -> Option<TerminalCommand> {
    let (program, args): (&str, Vec<String>) = match emulator {
        "gnome-terminal" => ("gnome-terminal", vec!["--".into(), script.into()]),
        "konsole" => ("konsole", vec!["-e".into(), script.into()]),
        "kitty" => ("kitty", vec![script.into()]),
        "alacritty" => ("alacritty", vec!["-e".into(), script.into()]),
        "xterm" => ("xterm", vec!["-e".into(), script.into()]),
        "iterm" | "iTerm" => ("open", vec!["-a".into(), "iTerm".into(), script.into()]),
        "terminal" | "Terminal" => ("open", vec!["-a".into(), "Terminal".into(), script.into()]),
        _ => return None,
    };
    Some(TerminalCommand {
        program: program.to_string(),
        args,
    })
}

/// Pick a terminal emulator: the explicit preference if given, else the
/// first one installed on this platform.
pub fn detect_terminal(preference: Option<&str>, script: &str) -> Option<TerminalCommand> {
    if let Some(pref) = preference {
        if pref != "auto" {
            return argv_for(pref, script);
        }
    }

    if cfg!(target_os = "macos") {
        for app in ["iterm", "terminal"] {
            if let Some(cmd) = argv_for(app, script) {
                return Some(cmd);
            }
        }
        return None;
    }

    for emulator in LINUX_EMULATORS {
        if which::which(emulator).is_ok() {
            return argv_for(emulator, script);
        }
    }
    None
}

/// Launch the script in a new terminal window, detached from this
/// process.
pub fn launch(cmd: &TerminalCommand) -> Result<(), OrcError> {
    debug!(program = %cmd.program, args = ?cmd.args, "launching terminal");
    std::process::Command::new(&cmd.program)
        .args(&cmd.args)
        .stdin(std::process::Stdio::null())
        .stdout(std::process::Stdio::null())
        .stderr(std::process::Stdio::null())
        .spawn()?;
    Ok(())
}

/// Write an executable startup script to `path`.
pub fn write_startup_script(path: &Path, contents: &str) -> Result<(), OrcError> {
    std::fs::write(path, contents)?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o755))?;
    }
    Ok(())
}
