use serde_json::json;
use tracing::{debug, error, info, instrument, warn};

use crate::api::{ApiError, TaskApi};
use crate::query::{DEFAULT_PAGE_SIZE, QueryState, SortField};
use crate::task::{Status, Task, TaskPage};

/// One listing request, stamped with the token that decides whether its
/// response may still be applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchTicket {
    pub token: u64,
    pub user_id: String,
    pub query: QueryState,
}

#[derive(Debug)]
pub enum ListPhase {
    /// No listing has succeeded yet.
    Loading,
    Loaded { tasks: Vec<Task>, task_count: u64 },
    /// The first listing failed; nothing to show.
    Failed(ApiError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchOutcome {
    Applied,
    Failed,
    /// A newer request was issued after this one; its result was dropped.
    Stale,
}

/// State behind the task list screen: query-driven listing for the signed-in
/// user, local page-size truncation and the "complete" action.
#[derive(Debug)]
pub struct TaskListView {
    query: QueryState,
    page_size: usize,
    user_id: Option<String>,
    phase: ListPhase,
    issued: u64,
    notice: Option<String>,
}

impl Default for TaskListView {
    fn default() -> Self {
        Self::new(QueryState::default(), DEFAULT_PAGE_SIZE)
    }
}

impl TaskListView {
    pub fn new(query: QueryState, page_size: usize) -> Self {
        Self {
            query,
            page_size: page_size.max(1),
            user_id: None,
            phase: ListPhase::Loading,
            issued: 0,
            notice: None,
        }
    }

    pub fn query(&self) -> &QueryState {
        &self.query
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    pub fn phase(&self) -> &ListPhase {
        &self.phase
    }

    pub fn is_loading(&self) -> bool {
        matches!(self.phase, ListPhase::Loading)
    }

    pub fn notice(&self) -> Option<&str> {
        self.notice.as_deref()
    }

    pub fn task_count(&self) -> Option<u64> {
        match &self.phase {
            ListPhase::Loaded { task_count, .. } => Some(*task_count),
            _ => None,
        }
    }

    /// Everything the server returned for the current query.
    pub fn tasks(&self) -> &[Task] {
        match &self.phase {
            ListPhase::Loaded { tasks, .. } => tasks,
            _ => &[],
        }
    }

    /// The rows to display: at most `page_size` of the fetched tasks.
    pub fn visible_tasks(&self) -> &[Task] {
        let tasks = self.tasks();
        &tasks[..tasks.len().min(self.page_size)]
    }

    #[instrument(skip(self), fields(query = %self.query))]
    pub fn on_status_filter(&mut self, status: Option<Status>) -> Option<FetchTicket> {
        if !self.query.set_status(status) {
            debug!("status filter unchanged");
            return None;
        }
        self.begin_fetch()
    }

    #[instrument(skip(self), fields(query = %self.query))]
    pub fn on_order_by(&mut self, field: SortField) -> Option<FetchTicket> {
        if !self.query.set_order_by(field) {
            debug!("orderBy unchanged");
            return None;
        }
        self.begin_fetch()
    }

    #[instrument(skip(self), fields(query = %self.query))]
    pub fn on_page(&mut self, page: u32) -> Option<FetchTicket> {
        if !self.query.set_page(page) {
            return None;
        }
        self.begin_fetch()
    }

    /// Local only: never touches the query and never fetches.
    pub fn on_page_size(&mut self, page_size: usize) {
        if page_size == 0 {
            warn!("ignoring page size of zero");
            return;
        }
        debug!(from = self.page_size, to = page_size, "page size changed");
        self.page_size = page_size;
    }

    /// Called by the session provider whenever the signed-in user is known
    /// or changes. Signing out drops the rows and any listing still in flight.
    #[instrument(skip(self))]
    pub fn set_user(&mut self, user_id: Option<String>) -> Option<FetchTicket> {
        if self.user_id == user_id {
            return None;
        }
        self.user_id = user_id;
        if self.user_id.is_none() {
            self.supersede_pending();
            self.phase = ListPhase::Loading;
            self.notice = None;
            return None;
        }
        self.begin_fetch()
    }

    /// Invalidates every ticket issued so far.
    fn supersede_pending(&mut self) {
        self.issued += 1;
        debug!(latest = self.issued, "pending listing responses superseded");
    }

    /// Issues a ticket for the current query. Every ticket supersedes the
    /// ones before it.
    pub fn begin_fetch(&mut self) -> Option<FetchTicket> {
        let Some(user_id) = self.user_id.clone() else {
            debug!("no signed-in user yet; not fetching");
            return None;
        };

        self.issued += 1;
        let ticket = FetchTicket {
            token: self.issued,
            user_id,
            query: self.query.clone(),
        };
        debug!(token = ticket.token, query = %ticket.query, "issued fetch ticket");
        Some(ticket)
    }

    #[instrument(skip(self, result), fields(token = ticket.token))]
    pub fn apply_fetch(
        &mut self,
        ticket: &FetchTicket,
        result: Result<TaskPage, ApiError>,
    ) -> FetchOutcome {
        if ticket.token != self.issued {
            debug!(latest = self.issued, "dropping superseded listing response");
            return FetchOutcome::Stale;
        }

        match result {
            Ok(page) => {
                info!(
                    rows = page.tasks.len(),
                    task_count = page.task_count,
                    "task page loaded"
                );
                self.phase = ListPhase::Loaded {
                    tasks: page.tasks,
                    task_count: page.task_count,
                };
                self.notice = None;
                FetchOutcome::Applied
            }
            Err(err) => {
                error!(error = %err, "failed to load tasks");
                if matches!(self.phase, ListPhase::Loaded { .. }) {
                    self.notice = Some(format!("Failed to load tasks: {err}"));
                } else {
                    self.phase = ListPhase::Failed(err);
                }
                FetchOutcome::Failed
            }
        }
    }

    pub async fn run_fetch<A: TaskApi>(&mut self, api: &A, ticket: FetchTicket) -> FetchOutcome {
        let result = api.list_user_tasks(&ticket.user_id, &ticket.query).await;
        self.apply_fetch(&ticket, result)
    }

    /// Fetches the current query. `None` when no user is signed in.
    pub async fn refresh<A: TaskApi>(&mut self, api: &A) -> Option<FetchOutcome> {
        let ticket = self.begin_fetch()?;
        Some(self.run_fetch(api, ticket).await)
    }

    /// Marks one task done on the server, then locally. A failure leaves the
    /// list untouched and is kept as the notice. Listings requested before the
    /// PATCH succeeded are dropped when they arrive.
    #[instrument(skip(self, api))]
    pub async fn complete_task<A: TaskApi>(
        &mut self,
        api: &A,
        task_id: &str,
    ) -> Result<(), ApiError> {
        let payload = json!({ "status": Status::Done });

        if let Err(err) = api.patch_task(task_id, &payload).await {
            error!(task_id, error = %err, "failed to complete the task");
            self.notice = Some(format!("Failed to complete task {task_id}: {err}"));
            return Err(err);
        }

        self.supersede_pending();
        if let ListPhase::Loaded { tasks, .. } = &mut self.phase {
            for task in tasks.iter_mut().filter(|task| task.id == task_id) {
                task.status = Status::Done;
            }
        }
        self.notice = None;
        info!(task_id, "task completed");
        Ok(())
    }
}

pub fn can_complete(task: &Task) -> bool {
    task.status.is_open()
}

#[cfg(test)]
mod tests {
    use super::{FetchOutcome, ListPhase, TaskListView, can_complete};
    use crate::query::{QueryState, SortField};
    use crate::task::{Priority, Status, Task};
    use crate::testing::{FakeApi, page_of};

    async fn loaded_view(api: &FakeApi, tasks: Vec<Task>) -> TaskListView {
        let mut view = TaskListView::default();
        api.push_page(Ok(page_of(tasks, 0)));
        let ticket = view.set_user(Some("123".to_string())).expect("ticket");
        assert_eq!(view.run_fetch(api, ticket).await, FetchOutcome::Applied);
        view
    }

    fn numbered(n: usize) -> Vec<Task> {
        (1..=n)
            .map(|i| Task::new_open(i.to_string(), format!("task {i}")))
            .collect()
    }

    #[test]
    fn nothing_fetched_until_user_known() {
        let mut view = TaskListView::default();
        assert!(view.begin_fetch().is_none());
        assert!(view.on_status_filter(Some(Status::Open)).is_none());
        assert!(view.is_loading());

        let ticket = view.set_user(Some("123".to_string())).expect("ticket");
        assert_eq!(ticket.user_id, "123");
        assert_eq!(ticket.query.to_query_string(), "status=open");

        assert!(view.set_user(Some("123".to_string())).is_none());
    }

    #[tokio::test]
    async fn truncates_to_page_size() {
        let api = FakeApi::default();
        let mut view = loaded_view(&api, numbered(8)).await;
        assert_eq!(view.visible_tasks().len(), 5);

        view.on_page_size(3);
        assert_eq!(view.visible_tasks().len(), 3);
        assert_eq!(view.visible_tasks()[2].id, "3");

        view.on_page_size(20);
        assert_eq!(view.visible_tasks().len(), 8);

        view.on_page_size(0);
        assert_eq!(view.page_size(), 20);
    }

    #[tokio::test]
    async fn page_size_change_does_not_fetch_or_touch_query() {
        let api = FakeApi::default();
        let mut view = loaded_view(&api, numbered(4)).await;
        let calls_before = api.calls().len();
        let query_before = view.query().clone();

        view.on_page_size(2);

        assert_eq!(api.calls().len(), calls_before);
        assert_eq!(view.query(), &query_before);
    }

    #[test]
    fn superseded_response_is_dropped() {
        let mut view = TaskListView::new(QueryState::default(), 5);
        let first = view.set_user(Some("u".to_string())).expect("first ticket");
        let second = view.on_order_by(SortField::Due).expect("second ticket");
        assert!(second.token > first.token);

        let newer = page_of(vec![Task::new_open("new", "newer")], 1);
        assert_eq!(view.apply_fetch(&second, Ok(newer)), FetchOutcome::Applied);

        let older = page_of(vec![Task::new_open("old", "older")], 1);
        assert_eq!(view.apply_fetch(&first, Ok(older)), FetchOutcome::Stale);
        assert_eq!(view.tasks()[0].id, "new");
    }

    #[test]
    fn repeated_sort_click_does_not_refetch() {
        let mut view = TaskListView::default();
        view.set_user(Some("u".to_string()));
        assert!(view.on_order_by(SortField::Name).is_some());
        assert!(view.on_order_by(SortField::Name).is_none());
        assert_eq!(view.query().order_by(), Some(SortField::Name));
    }

    #[tokio::test]
    async fn first_failure_is_visible() {
        let api = FakeApi::default();
        api.push_page(Err(FakeApi::status_error("GET", "/tasks/user/u", 500)));

        let mut view = TaskListView::default();
        view.set_user(Some("u".to_string()));
        let ticket = view.begin_fetch().expect("ticket");

        assert_eq!(view.run_fetch(&api, ticket).await, FetchOutcome::Failed);
        assert!(matches!(view.phase(), ListPhase::Failed(_)));
        assert!(view.visible_tasks().is_empty());
    }

    #[tokio::test]
    async fn later_failure_keeps_rows() {
        let api = FakeApi::default();
        let mut view = loaded_view(&api, numbered(2)).await;
        api.push_page(Err(FakeApi::status_error("GET", "/tasks/user/123", 502)));

        assert_eq!(view.refresh(&api).await, Some(FetchOutcome::Failed));
        assert_eq!(view.tasks().len(), 2);
        assert!(view.notice().expect("notice").contains("502"));
    }

    #[tokio::test]
    async fn completing_updates_only_matching_row() {
        let api = FakeApi::default();
        let mut urgent = Task::new_open("2", "urgent one");
        urgent.priority = Priority::Urgent;
        let tasks = vec![Task::new_open("1", "a"), urgent.clone(), Task::new_open("3", "c")];
        let mut view = loaded_view(&api, tasks.clone()).await;

        view.complete_task(&api, "2").await.expect("complete");

        let after = view.tasks();
        assert_eq!(after[0], tasks[0]);
        assert_eq!(after[2], tasks[2]);
        assert_eq!(after[1].status, Status::Done);
        assert_eq!(after[1].name, urgent.name);
        assert_eq!(after[1].priority, Priority::Urgent);
        assert!(!can_complete(&after[1]));
        assert_eq!(
            api.calls().last().map(String::as_str),
            Some(r#"PATCH /tasks/2 {"status":"done"}"#)
        );
    }

    #[tokio::test]
    async fn listing_requested_before_completion_is_dropped() {
        let api = FakeApi::default();
        let mut view = loaded_view(&api, numbered(2)).await;
        let in_flight = view.begin_fetch().expect("ticket");

        view.complete_task(&api, "1").await.expect("complete");

        let snapshot = page_of(numbered(2), 2);
        assert_eq!(view.apply_fetch(&in_flight, Ok(snapshot)), FetchOutcome::Stale);
        assert_eq!(view.tasks()[0].status, Status::Done);

        let ticket = view.begin_fetch().expect("fresh ticket");
        let fresh = page_of(numbered(2), 2);
        assert_eq!(view.apply_fetch(&ticket, Ok(fresh)), FetchOutcome::Applied);
    }

    #[tokio::test]
    async fn signing_out_clears_rows_and_drops_pending_listing() {
        let api = FakeApi::default();
        let mut view = loaded_view(&api, numbered(3)).await;
        let in_flight = view.begin_fetch().expect("ticket");

        assert!(view.set_user(None).is_none());
        assert!(view.is_loading());
        assert!(view.tasks().is_empty());

        let late = page_of(numbered(3), 3);
        assert_eq!(view.apply_fetch(&in_flight, Ok(late)), FetchOutcome::Stale);
        assert!(view.is_loading());

        let ticket = view.set_user(Some("456".to_string())).expect("ticket");
        assert_eq!(ticket.user_id, "456");
    }

    #[tokio::test]
    async fn failed_completion_leaves_state_and_sets_notice() {
        let api = FakeApi::default();
        let mut view = loaded_view(&api, numbered(3)).await;
        api.fail_patches_with(500);

        let result = view.complete_task(&api, "1").await;

        assert_eq!(result.expect_err("patch fails").status(), Some(500));
        assert!(view.tasks().iter().all(|task| task.status == Status::Open));
        assert!(view.notice().expect("notice").contains("task 1"));
    }
}
