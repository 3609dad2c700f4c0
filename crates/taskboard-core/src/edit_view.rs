use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use tracing::{debug, error, info, instrument};

use crate::api::{ApiError, TaskApi};
use crate::task::{Priority, Status, Task};

#[derive(Debug, thiserror::Error)]
pub enum EditError {
    #[error("task {task_id} is not loaded yet")]
    NotLoaded { task_id: String },

    #[error(transparent)]
    Api(#[from] ApiError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DueChange {
    Set(DateTime<Utc>),
    Clear,
}

/// What the edit form hands back on submit. Unset fields are left out of the
/// payload so the server keeps their current values.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskForm {
    pub name: Option<String>,
    pub priority: Option<Priority>,
    pub status: Option<Status>,
    pub due: Option<DueChange>,
    pub owner: Option<String>,
}

impl TaskForm {
    pub fn is_empty(&self) -> bool {
        self == &TaskForm::default()
    }

    pub fn to_payload(&self) -> Map<String, Value> {
        let mut payload = Map::new();
        if let Some(name) = &self.name {
            payload.insert("name".to_string(), Value::String(name.clone()));
        }
        if let Some(priority) = self.priority {
            payload.insert("priority".to_string(), Value::from(priority.as_str()));
        }
        if let Some(status) = self.status {
            payload.insert("status".to_string(), Value::from(status.as_str()));
        }
        match self.due {
            Some(DueChange::Set(due)) => {
                payload.insert(
                    "due".to_string(),
                    Value::String(due.to_rfc3339_opts(chrono::SecondsFormat::Millis, true)),
                );
            }
            Some(DueChange::Clear) => {
                payload.insert("due".to_string(), Value::Null);
            }
            None => {}
        }
        if let Some(owner) = &self.owner {
            payload.insert("owner".to_string(), Value::String(owner.clone()));
        }
        payload
    }
}

/// Fills in the loaded task's owner when the form did not supply one.
pub fn merge_owner(mut payload: Map<String, Value>, task: &Task) -> Map<String, Value> {
    let has_owner = payload.get("owner").is_some_and(|owner| !owner.is_null());
    if !has_owner && let Some(owner) = &task.owner {
        payload.insert("owner".to_string(), Value::String(owner.clone()));
    }
    payload
}

#[derive(Debug)]
pub enum EditPhase {
    Loading,
    Loaded(Task),
    Failed(ApiError),
}

/// State behind the edit screen for a single task.
#[derive(Debug)]
pub struct TaskEditView {
    task_id: String,
    phase: EditPhase,
    notice: Option<String>,
}

impl TaskEditView {
    pub fn new(task_id: impl Into<String>) -> Self {
        Self {
            task_id: task_id.into(),
            phase: EditPhase::Loading,
            notice: None,
        }
    }

    pub fn task_id(&self) -> &str {
        &self.task_id
    }

    pub fn phase(&self) -> &EditPhase {
        &self.phase
    }

    pub fn task(&self) -> Option<&Task> {
        match &self.phase {
            EditPhase::Loaded(task) => Some(task),
            _ => None,
        }
    }

    pub fn notice(&self) -> Option<&str> {
        self.notice.as_deref()
    }

    /// Route parameter changed. Returns whether a reload is needed.
    pub fn set_task_id(&mut self, task_id: impl Into<String>) -> bool {
        let task_id = task_id.into();
        if task_id == self.task_id {
            return false;
        }
        debug!(from = %self.task_id, to = %task_id, "task id changed");
        self.task_id = task_id;
        self.phase = EditPhase::Loading;
        self.notice = None;
        true
    }

    /// Returns whether the task is now loaded.
    #[instrument(skip(self, api), fields(task_id = %self.task_id))]
    pub async fn load<A: TaskApi>(&mut self, api: &A) -> bool {
        match api.get_task(&self.task_id).await {
            Ok(task) => {
                debug!(name = %task.name, "task loaded for editing");
                self.phase = EditPhase::Loaded(task);
                true
            }
            Err(err) => {
                error!(error = %err, "failed to load task");
                self.phase = EditPhase::Failed(err);
                false
            }
        }
    }

    #[instrument(skip(self, api, form), fields(task_id = %self.task_id))]
    pub async fn submit<A: TaskApi>(&mut self, api: &A, form: &TaskForm) -> Result<Task, EditError> {
        let Some(task) = self.task() else {
            return Err(EditError::NotLoaded {
                task_id: self.task_id.clone(),
            });
        };

        let payload = Value::Object(merge_owner(form.to_payload(), task));
        debug!(payload = %payload, "submitting task update");

        match api.patch_task(&self.task_id, &payload).await {
            Ok(updated) => {
                info!(task = ?updated, "task updated");
                self.phase = EditPhase::Loaded(updated.clone());
                self.notice = None;
                Ok(updated)
            }
            Err(err) => {
                error!(error = %err, "failed to update task");
                self.notice = Some(format!("Failed to update task: {err}"));
                Err(err.into())
            }
        }
    }
}
