use crate::config::Config;
use crate::domain::task::TaskAssignment;
use crate::domain::target::Target;
use crate::error::StorageError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs;
use tracing::debug;

const IO_RETRIES: u32 = 3;
const IO_BACKOFF_INITIAL: Duration = Duration::from_millis(100);

/// Task-to-agent routing record, kept separately from the task document
/// so routing can change without rewriting the task.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Assignment {
    pub task_id: String,
    pub agent_id: Target,
}

/// JSON-per-file store for task assignments under the per-user state
/// directory. Storage I/O is the one retried operation class in the
/// system: three attempts with exponential backoff starting at 100ms.
pub struct TaskStore {
    tasks_dir: PathBuf,
    assignments_dir: PathBuf,
    /// External quality-gate tooling writes here; the store only
    /// guarantees the directory exists.
    quality_checks_dir: PathBuf,
}

impl TaskStore {
    pub fn new(config: &Config) -> Self {
        Self {
            tasks_dir: config.tasks_dir(),
            assignments_dir: config.assignments_dir(),
            quality_checks_dir: config.quality_checks_dir(),
        }
    }

    /// Create the store directories if absent.
    pub async fn init(&self) -> Result<(), StorageError> {
        for dir in [&self.tasks_dir, &self.assignments_dir, &self.quality_checks_dir] {
            fs::create_dir_all(dir)
                .await
                .map_err(|e| io_failed(dir, &e))?;
        }
        Ok(())
    }

    pub async fn save_task(&self, task: &TaskAssignment) -> Result<(), StorageError> {
        validate_key(&task.task_id)?;
        let path = self.tasks_dir.join(format!("{}.json", task.task_id));
        let json = serde_json::to_string_pretty(task).map_err(|_| StorageError::Corrupt(path.clone()))?;
        write_atomic(&path, &json).await
    }

    pub async fn load_task(&self, task_id: &str) -> Result<TaskAssignment, StorageError> {
        validate_key(task_id)?;
        let path = self.tasks_dir.join(format!("{task_id}.json"));
        let content = read_with_retries(&path, task_id).await?;
        serde_json::from_str(&content).map_err(|_| StorageError::Corrupt(path))
    }

    pub async fn list_tasks(&self) -> Result<Vec<TaskAssignment>, StorageError> {
        let mut tasks = vec![];
        let mut entries = match fs::read_dir(&self.tasks_dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(tasks),
            Err(e) => return Err(io_failed(&self.tasks_dir, &e)),
        };

        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| io_failed(&self.tasks_dir, &e))?
        {
            let path = entry.path();
            if path.extension().is_none_or(|e| e != "json") {
                continue;
            }
            match fs::read_to_string(&path).await {
                Ok(content) => match serde_json::from_str(&content) {
                    Ok(task) => tasks.push(task),
                    Err(_) => debug!(path = %path.display(), "skipping corrupt task document"),
                },
                Err(_) => debug!(path = %path.display(), "skipping unreadable task document"),
            }
        }

        tasks.sort_by(|a: &TaskAssignment, b: &TaskAssignment| a.task_id.cmp(&b.task_id));
        Ok(tasks)
    }

    pub async fn save_assignment(&self, assignment: &Assignment) -> Result<(), StorageError> {
        validate_key(&assignment.task_id)?;
        let path = self
            .assignments_dir
            .join(format!("{}.json", assignment.task_id));
        let json = serde_json::to_string_pretty(assignment)
            .map_err(|_| StorageError::Corrupt(path.clone()))?;
        write_atomic(&path, &json).await
    }

    pub async fn load_assignment(&self, task_id: &str) -> Result<Assignment, StorageError> {
        validate_key(task_id)?;
        let path = self.assignments_dir.join(format!("{task_id}.json"));
        let content = read_with_retries(&path, task_id).await?;
        serde_json::from_str(&content).map_err(|_| StorageError::Corrupt(path))
    }
}

/// Store keys become file names; hold them to the same charset as
/// session names so they can never traverse paths.
fn validate_key(key: &str) -> Result<(), StorageError> {
    let ok = !key.is_empty()
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if ok {
        Ok(())
    } else {
        Err(StorageError::InvalidKey(key.to_string()))
    }
}

fn io_failed(path: &Path, e: &std::io::Error) -> StorageError {
    StorageError::IoFailed {
        path: path.to_path_buf(),
        reason: e.to_string(),
    }
}

/// Write via a temp file and rename so readers never observe a torn
/// document. Retried per the storage retry policy.
async fn write_atomic(path: &Path, content: &str) -> Result<(), StorageError> {
    let tmp = path.with_extension("json.tmp");
    let mut backoff = IO_BACKOFF_INITIAL;
    let mut last_err = None;

    for attempt in 1..=IO_RETRIES {
        let result = async {
            fs::write(&tmp, content).await?;
            fs::rename(&tmp, path).await
        }
        .await;

        match result {
            Ok(()) => return Ok(()),
            Err(e) => {
                debug!(path = %path.display(), attempt, error = %e, "store write failed");
                last_err = Some(e);
                if attempt < IO_RETRIES {
                    tokio::time::sleep(backoff).await;
                    backoff *= 2;
                }
            }
        }
    }

    Err(io_failed(path, &last_err.unwrap_or_else(|| std::io::Error::other("write failed"))))
}

async fn read_with_retries(path: &Path, key: &str) -> Result<String, StorageError> {
    let mut backoff = IO_BACKOFF_INITIAL;
    let mut last_err = None;

    for attempt in 1..=IO_RETRIES {
        match fs::read_to_string(path).await {
            Ok(content) => return Ok(content),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(StorageError::NotFound(key.to_string()));
            }
            Err(e) => {
                debug!(path = %path.display(), attempt, error = %e, "store read failed");
                last_err = Some(e);
                if attempt < IO_RETRIES {
                    tokio::time::sleep(backoff).await;
                    backoff *= 2;
                }
            }
        }
    }

    Err(io_failed(path, &last_err.unwrap_or_else(|| std::io::Error::other("read failed"))))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::task::{TaskPriority, TaskStatus};

    fn store_in(dir: &Path) -> TaskStore {
        let config = Config {
            state_dir: Some(dir.to_path_buf()),
            ..Default::default()
        };
        TaskStore::new(&config)
    }

    fn make_task(id: &str) -> TaskAssignment {
        TaskAssignment::new(
            id.into(),
            Target::parse("proj:1").unwrap(),
            TaskPriority::Medium,
        )
    }

    #[tokio::test]
    async fn test_save_and_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(dir.path());
        store.init().await.unwrap();

        let mut task = make_task("task-1");
        task.transition(TaskStatus::InProgress);
        store.save_task(&task).await.unwrap();

        let loaded = store.load_task("task-1").await.unwrap();
        assert_eq!(loaded.task_id, "task-1");
        assert_eq!(loaded.status, TaskStatus::InProgress);
        assert_eq!(loaded.previous_status.as_deref(), Some("pending"));
    }

    #[tokio::test]
    async fn test_load_missing_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(dir.path());
        store.init().await.unwrap();

        let err = store.load_task("ghost").await.unwrap_err();
        assert!(matches!(err, StorageError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_corrupt_document() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(dir.path());
        store.init().await.unwrap();

        std::fs::write(dir.path().join("tasks/bad.json"), "{not json").unwrap();
        let err = store.load_task("bad").await.unwrap_err();
        assert!(matches!(err, StorageError::Corrupt(_)));
    }

    #[tokio::test]
    async fn test_list_skips_corrupt_and_sorts() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(dir.path());
        store.init().await.unwrap();

        store.save_task(&make_task("b-task")).await.unwrap();
        store.save_task(&make_task("a-task")).await.unwrap();
        std::fs::write(dir.path().join("tasks/zz.json"), "garbage").unwrap();
        std::fs::write(dir.path().join("tasks/readme.txt"), "not json").unwrap();

        let tasks = store.list_tasks().await.unwrap();
        let ids: Vec<&str> = tasks.iter().map(|t| t.task_id.as_str()).collect();
        assert_eq!(ids, ["a-task", "b-task"]);
    }

    #[tokio::test]
    async fn test_list_without_init_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(dir.path());
        assert!(store.list_tasks().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_invalid_key_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(dir.path());
        store.init().await.unwrap();

        let err = store.load_task("../etc/passwd").await.unwrap_err();
        assert!(matches!(err, StorageError::InvalidKey(_)));

        let task = make_task("ok");
        let mut evil = task.clone();
        evil.task_id = "a/b".into();
        assert!(store.save_task(&evil).await.is_err());
    }

    #[tokio::test]
    async fn test_assignment_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(dir.path());
        store.init().await.unwrap();

        let assignment = Assignment {
            task_id: "task-9".into(),
            agent_id: Target::parse("proj:4").unwrap(),
        };
        store.save_assignment(&assignment).await.unwrap();
        let loaded = store.load_assignment("task-9").await.unwrap();
        assert_eq!(loaded.agent_id, Target::parse("proj:4").unwrap());
    }
}
