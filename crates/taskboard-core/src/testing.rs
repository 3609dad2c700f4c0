//! In-memory `TaskApi` used by the view tests.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;

use reqwest::Method;

use crate::api::{ApiError, TaskApi};
use crate::query::QueryState;
use crate::task::{Task, TaskPage};

#[derive(Default)]
pub(crate) struct FakeApi {
    pages: RefCell<VecDeque<Result<TaskPage, ApiError>>>,
    task: RefCell<Option<Task>>,
    patch_failure: Cell<Option<u16>>,
    calls: RefCell<Vec<String>>,
}

pub(crate) fn page_of(tasks: Vec<Task>, task_count: u64) -> TaskPage {
    let task_count = task_count.max(tasks.len() as u64);
    TaskPage { tasks, task_count }
}

impl FakeApi {
    pub(crate) fn with_task(task: Task) -> Self {
        let api = Self::default();
        *api.task.borrow_mut() = Some(task);
        api
    }

    pub(crate) fn push_page(&self, page: Result<TaskPage, ApiError>) {
        self.pages.borrow_mut().push_back(page);
    }

    pub(crate) fn fail_patches_with(&self, status: u16) {
        self.patch_failure.set(Some(status));
    }

    pub(crate) fn calls(&self) -> Vec<String> {
        self.calls.borrow().clone()
    }

    pub(crate) fn status_error(method: &str, path: &str, status: u16) -> ApiError {
        ApiError::Status {
            method: Method::from_bytes(method.as_bytes()).unwrap_or(Method::GET),
            url: format!("http://fake{path}"),
            status,
            reason: "Fake Failure".to_string(),
        }
    }
}

impl TaskApi for FakeApi {
    async fn list_user_tasks(
        &self,
        user_id: &str,
        query: &QueryState,
    ) -> Result<TaskPage, ApiError> {
        let qs = query.to_query_string();
        self.calls
            .borrow_mut()
            .push(format!("GET /tasks/user/{user_id}?{qs}"));
        self.pages
            .borrow_mut()
            .pop_front()
            .unwrap_or_else(|| Ok(TaskPage::default()))
    }

    async fn get_task(&self, task_id: &str) -> Result<Task, ApiError> {
        self.calls.borrow_mut().push(format!("GET /tasks/{task_id}"));
        self.task
            .borrow()
            .clone()
            .ok_or_else(|| Self::status_error("GET", &format!("/tasks/{task_id}"), 404))
    }

    async fn patch_task(
        &self,
        task_id: &str,
        payload: &serde_json::Value,
    ) -> Result<Task, ApiError> {
        self.calls
            .borrow_mut()
            .push(format!("PATCH /tasks/{task_id} {payload}"));

        if let Some(status) = self.patch_failure.get() {
            return Err(Self::status_error("PATCH", &format!("/tasks/{task_id}"), status));
        }

        let base = self
            .task
            .borrow()
            .clone()
            .unwrap_or_else(|| Task::new_open(task_id, ""));
        let mut merged = serde_json::to_value(base).unwrap_or_default();
        if let (Some(target), Some(fields)) = (merged.as_object_mut(), payload.as_object()) {
            for (key, value) in fields {
                target.insert(key.clone(), value.clone());
            }
        }
        let updated: Task = serde_json::from_value(merged).map_err(|source| ApiError::Decode {
            url: format!("http://fake/tasks/{task_id}"),
            source,
        })?;
        *self.task.borrow_mut() = Some(updated.clone());
        Ok(updated)
    }
}
