use crate::config::Config;
use crate::domain::target::Target;
use crate::domain::task::{TaskAssignment, TaskPriority, TaskStatus};
use crate::error::OrcError;
use crate::infra::messaging;
use crate::infra::store::{Assignment, TaskStore};
use uuid::Uuid;

/// `task assign`: create a task document, route it to an agent, and
/// deliver the work description into the agent's pane.
pub async fn assign(
    target_str: &str,
    description: &str,
    priority_str: &str,
    task_id: Option<&str>,
    json: bool,
    config: &Config,
) -> Result<(), OrcError> {
    let target = Target::parse(target_str)?;
    let priority = parse_priority(priority_str)?;
    let task_id = task_id
        .map(String::from)
        .unwrap_or_else(|| format!("task-{}", Uuid::new_v4()));

    let store = TaskStore::new(config);
    store.init().await?;

    let mut task = TaskAssignment::new(task_id.clone(), target.clone(), priority);
    store.save_task(&task).await?;
    store
        .save_assignment(&Assignment {
            task_id: task_id.clone(),
            agent_id: target.clone(),
        })
        .await?;

    let message = format!("[{task_id}] New task ({priority_str} priority): {description}");
    messaging::send_message_checked(&target, &message, config).await?;

    task.transition(TaskStatus::InProgress);
    store.save_task(&task).await?;

    if json {
        super::emit_json(&task);
    } else {
        println!("Task {task_id} assigned to {target}");
    }
    Ok(())
}

/// `task status`: transition a task's status, keeping the previous one.
pub async fn set_status(
    task_id: &str,
    status_str: &str,
    notes: Option<&str>,
    json: bool,
    config: &Config,
) -> Result<(), OrcError> {
    let status = parse_status(status_str)?;

    let store = TaskStore::new(config);
    let mut task = store.load_task(task_id).await?;
    task.transition(status);
    if let Some(text) = notes {
        task.completion_notes = Some(text.to_string());
    }
    store.save_task(&task).await?;

    if json {
        super::emit_json(&task);
    } else {
        println!(
            "Task {task_id}: {} -> {}",
            task.previous_status.as_deref().unwrap_or("-"),
            task.status
        );
    }
    Ok(())
}

/// `task show`: print one task document, flagging a routing record that
/// disagrees with the task's own agent id.
pub async fn show(task_id: &str, json: bool, config: &Config) -> Result<(), OrcError> {
    let store = TaskStore::new(config);
    let task = store.load_task(task_id).await?;
    let routing = store.load_assignment(task_id).await.ok();

    if json {
        super::emit_json(&task);
    } else {
        println!("{}", serde_json::to_string_pretty(&task)?);
        if let Some(assignment) = routing {
            if assignment.agent_id != task.agent_id {
                println!(
                    "warning: routing record points at {} but task says {}",
                    assignment.agent_id, task.agent_id
                );
            }
        }
    }
    Ok(())
}

/// `task list`: every known task, oldest id first.
pub async fn list(json: bool, config: &Config) -> Result<(), OrcError> {
    let store = TaskStore::new(config);
    let tasks = store.list_tasks().await?;

    if json {
        super::emit_json(&tasks);
        return Ok(());
    }

    if tasks.is_empty() {
        println!("No tasks.");
        return Ok(());
    }
    for task in &tasks {
        println!("  {}  {}  {} ", task.task_id, task.agent_id, task.status);
    }
    Ok(())
}

fn parse_priority(s: &str) -> Result<TaskPriority, OrcError> {
    match s {
        "low" => Ok(TaskPriority::Low),
        "medium" => Ok(TaskPriority::Medium),
        "high" => Ok(TaskPriority::High),
        "critical" => Ok(TaskPriority::Critical),
        _ => Err(OrcError::User(format!(
            "unknown priority '{s}': use low, medium, high, or critical"
        ))),
    }
}

fn parse_status(s: &str) -> Result<TaskStatus, OrcError> {
    match s {
        "pending" => Ok(TaskStatus::Pending),
        "in_progress" => Ok(TaskStatus::InProgress),
        "completed" => Ok(TaskStatus::Completed),
        "blocked" => Ok(TaskStatus::Blocked),
        "cancelled" => Ok(TaskStatus::Cancelled),
        _ => Err(OrcError::User(format!(
            "unknown status '{s}': use pending, in_progress, completed, blocked, or cancelled"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_priority() {
        assert_eq!(parse_priority("low").unwrap(), TaskPriority::Low);
        assert_eq!(parse_priority("critical").unwrap(), TaskPriority::Critical);
        assert!(parse_priority("urgent").is_err());
    }

    #[test]
    fn test_parse_status() {
        assert_eq!(parse_status("blocked").unwrap(), TaskStatus::Blocked);
        assert!(parse_status("done").is_err());
    }
}
