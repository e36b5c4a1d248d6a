use crate::config::Config;
use crate::error::OrcError;
use crate::infra::context::{available_contexts, load_context};

/// `context show`: print the briefing markdown for a role.
pub fn show(role: &str, json: bool, config: &Config) -> Result<(), OrcError> {
    let content = load_context(role, config)?;
    if json {
        super::emit_json(serde_json::json!({
            "role": role,
            "content": content,
        }));
    } else {
        println!("{content}");
    }
    Ok(())
}

/// `context list`: every role with a briefing available.
pub fn list(json: bool, config: &Config) -> Result<(), OrcError> {
    let contexts = available_contexts(config);

    if json {
        let rows: Vec<_> = contexts
            .iter()
            .map(|(role, path)| {
                serde_json::json!({
                    "role": role,
                    "source": path.as_ref().map(|p| p.display().to_string()),
                })
            })
            .collect();
        super::emit_json(rows);
        return Ok(());
    }

    println!("Available role contexts:");
    for (role, path) in &contexts {
        match path {
            Some(p) => println!("  {role:15} {}", p.display()),
            None => println!("  {role:15} (built-in)"),
        }
    }
    println!("\nUse `tmux-orc context show <role>` to view one.");
    Ok(())
}
