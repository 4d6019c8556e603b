use std::collections::BTreeSet;
use std::fs;
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, anyhow};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tempfile::NamedTempFile;
use tracing::{debug, info};
use uuid::Uuid;

use crate::model::{BudgetItem, FocusSession, Note, Project, Task};

/// Names of the persisted collections, mirroring the original document store.
pub const COLLECTIONS: [&str; 5] = ["projects", "tasks", "budget", "notes", "sessions"];

/// Snapshot-oriented JSONL store: every write rewrites a whole collection
/// atomically, so readers always see the last committed snapshot.
#[derive(Debug)]
pub struct Store {
    pub data_dir: PathBuf,
    pub projects_path: PathBuf,
    pub tasks_path: PathBuf,
    pub budget_path: PathBuf,
    pub notes_path: PathBuf,
    pub sessions_path: PathBuf,

    #[cfg(test)]
    fail_project_saves: std::cell::Cell<bool>,
}

impl Store {
    #[tracing::instrument(skip(data_dir))]
    pub fn open(data_dir: &Path) -> anyhow::Result<Self> {
        let data_dir = data_dir.to_path_buf();
        fs::create_dir_all(&data_dir)
            .with_context(|| format!("failed to create {}", data_dir.display()))?;

        let store = Self {
            projects_path: data_dir.join("projects.data"),
            tasks_path: data_dir.join("tasks.data"),
            budget_path: data_dir.join("budget.data"),
            notes_path: data_dir.join("notes.data"),
            sessions_path: data_dir.join("sessions.data"),
            data_dir,
            #[cfg(test)]
            fail_project_saves: std::cell::Cell::new(false),
        };

        for path in [
            &store.projects_path,
            &store.tasks_path,
            &store.budget_path,
            &store.notes_path,
            &store.sessions_path,
        ] {
            if !path.exists() {
                fs::write(path, "")?;
            }
        }

        info!(data_dir = %store.data_dir.display(), "opened store");
        Ok(store)
    }

    #[tracing::instrument(skip(self))]
    pub fn load_projects(&self) -> anyhow::Result<Vec<Project>> {
        load_jsonl(&self.projects_path).context("failed to load projects.data")
    }

    #[tracing::instrument(skip(self))]
    pub fn load_tasks(&self) -> anyhow::Result<Vec<Task>> {
        load_jsonl(&self.tasks_path).context("failed to load tasks.data")
    }

    #[tracing::instrument(skip(self))]
    pub fn load_budget(&self) -> anyhow::Result<Vec<BudgetItem>> {
        load_jsonl(&self.budget_path).context("failed to load budget.data")
    }

    #[tracing::instrument(skip(self))]
    pub fn load_notes(&self) -> anyhow::Result<Vec<Note>> {
        load_jsonl(&self.notes_path).context("failed to load notes.data")
    }

    #[tracing::instrument(skip(self))]
    pub fn load_sessions(&self) -> anyhow::Result<Vec<FocusSession>> {
        load_jsonl(&self.sessions_path).context("failed to load sessions.data")
    }

    #[tracing::instrument(skip(self, projects))]
    pub fn save_projects(&self, projects: &[Project]) -> anyhow::Result<()> {
        #[cfg(test)]
        if self.fail_project_saves.get() {
            return Err(anyhow!("projects.data write failure forced by test"));
        }
        save_jsonl_atomic(&self.projects_path, projects).context("failed to save projects.data")
    }

    #[tracing::instrument(skip(self, tasks))]
    pub fn save_tasks(&self, tasks: &[Task]) -> anyhow::Result<()> {
        save_jsonl_atomic(&self.tasks_path, tasks).context("failed to save tasks.data")
    }

    #[tracing::instrument(skip(self, items))]
    pub fn save_budget(&self, items: &[BudgetItem]) -> anyhow::Result<()> {
        save_jsonl_atomic(&self.budget_path, items).context("failed to save budget.data")
    }

    #[tracing::instrument(skip(self, notes))]
    pub fn save_notes(&self, notes: &[Note]) -> anyhow::Result<()> {
        save_jsonl_atomic(&self.notes_path, notes).context("failed to save notes.data")
    }

    #[tracing::instrument(skip(self, sessions))]
    pub fn save_sessions(&self, sessions: &[FocusSession]) -> anyhow::Result<()> {
        save_jsonl_atomic(&self.sessions_path, sessions).context("failed to save sessions.data")
    }

    pub fn next_task_id(&self, tasks: &[Task]) -> u64 {
        tasks.iter().filter_map(|t| t.id).max().unwrap_or(0) + 1
    }

    pub fn next_project_id(&self, projects: &[Project]) -> u64 {
        projects.iter().filter_map(|p| p.id).max().unwrap_or(0) + 1
    }

    pub fn next_budget_id(&self, items: &[BudgetItem]) -> u64 {
        items.iter().filter_map(|b| b.id).max().unwrap_or(0) + 1
    }

    pub fn next_note_id(&self, notes: &[Note]) -> u64 {
        notes.iter().filter_map(|n| n.id).max().unwrap_or(0) + 1
    }

    /// Removes every task in `ids` in a single snapshot rewrite; either the
    /// whole batch lands or the old snapshot survives.
    #[tracing::instrument(skip(self, ids))]
    pub fn batch_delete_tasks(&self, ids: &BTreeSet<Uuid>) -> anyhow::Result<usize> {
        let tasks = self.load_tasks()?;
        let before = tasks.len();
        let kept: Vec<Task> = tasks
            .into_iter()
            .filter(|task| !ids.contains(&task.uuid))
            .collect();
        let removed = before - kept.len();
        self.save_tasks(&kept)?;
        debug!(removed, "batch deleted tasks");
        Ok(removed)
    }

    /// Deletes a project and every task referencing it. Validation rejects
    /// before any write; after that both snapshots are staged and the task
    /// pre-image is restored if the project rewrite fails, so no committed
    /// state has the project gone while its tasks remain or vice versa.
    #[tracing::instrument(skip(self), fields(project = %project))]
    pub fn delete_project_cascade(&self, project: Uuid) -> anyhow::Result<usize> {
        let projects = self.load_projects()?;
        let tasks = self.load_tasks()?;

        if !projects.iter().any(|p| p.uuid == project) {
            return Err(anyhow!("project not found: {project}"));
        }

        let kept_projects: Vec<Project> =
            projects.iter().filter(|p| p.uuid != project).cloned().collect();
        let kept_tasks: Vec<Task> = tasks
            .iter()
            .filter(|t| t.project != Some(project))
            .cloned()
            .collect();
        let removed_tasks = tasks.len() - kept_tasks.len();

        self.save_tasks(&kept_tasks)?;
        if let Err(err) = self.save_projects(&kept_projects) {
            // roll the task snapshot back so the cascade stays all-or-nothing
            self.save_tasks(&tasks)
                .context("failed restoring tasks after project save failure")?;
            return Err(err);
        }

        info!(removed_tasks, "cascade deleted project");
        Ok(removed_tasks)
    }
}

#[tracing::instrument(skip(path))]
fn load_jsonl<T: DeserializeOwned>(path: &Path) -> anyhow::Result<Vec<T>> {
    debug!(file = %path.display(), "loading jsonl");
    let file = fs::File::open(path)?;
    let reader = BufReader::new(file);

    let mut out = Vec::new();
    for (idx, line) in reader.lines().enumerate() {
        let line = line?;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        let doc: T = serde_json::from_str(trimmed)
            .with_context(|| format!("failed parsing {} line {}", path.display(), idx + 1))?;
        out.push(doc);
    }

    debug!(count = out.len(), "loaded documents from jsonl");
    Ok(out)
}

#[tracing::instrument(skip(path, docs))]
fn save_jsonl_atomic<T: Serialize>(path: &Path, docs: &[T]) -> anyhow::Result<()> {
    debug!(file = %path.display(), count = docs.len(), "saving jsonl atomically");

    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let mut temp = NamedTempFile::new_in(dir)?;
    for doc in docs {
        let serialized = serde_json::to_string(doc)?;
        writeln!(temp, "{serialized}")?;
    }
    temp.flush()?;

    temp.persist(path)
        .map_err(|err| anyhow!("failed to persist {}: {}", path.display(), err))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use tempfile::tempdir;

    use super::Store;
    use crate::model::{Project, Task};

    #[test]
    fn cascade_restores_tasks_when_project_rewrite_fails() {
        let temp = tempdir().expect("tempdir");
        let store = Store::open(temp.path()).expect("open store");

        let now = Utc::now();
        let doomed = Project::new("Doomed".to_string(), now, 1);
        store.save_projects(&[doomed.clone()]).expect("save projects");

        let a = Task::new("a".into(), now, now, doomed.uuid, now, 1);
        let b = Task::new("b".into(), now, now, doomed.uuid, now, 2);
        store.save_tasks(&[a, b]).expect("save tasks");

        store.fail_project_saves.set(true);
        let result = store.delete_project_cascade(doomed.uuid);
        store.fail_project_saves.set(false);

        // the task snapshot was already rewritten; the rollback must put the
        // pre-image back so the project and both tasks all survive
        assert!(result.is_err());
        assert_eq!(store.load_tasks().expect("load tasks").len(), 2);
        assert_eq!(store.load_projects().expect("load projects").len(), 1);
    }
}
