use std::io::Write;

use anyhow::{Context, anyhow};
use tracing::{debug, info, instrument, warn};

use crate::api::TaskApi;
use crate::cli::{Command, EditArgs, ListArgs};
use crate::config::Config;
use crate::edit_view::{EditPhase, TaskEditView};
use crate::list_view::{FetchOutcome, ListPhase, TaskListView};
use crate::query::QueryState;
use crate::render::Renderer;
use crate::session::Session;

/// Runs one CLI command against `api`, writing the rendered view to `out`.
#[instrument(skip_all)]
pub async fn dispatch<A: TaskApi, W: Write>(
    api: &A,
    session: &Session,
    cfg: &Config,
    renderer: &Renderer,
    command: Command,
    mut out: W,
) -> anyhow::Result<()> {
    match command {
        Command::List(args) => {
            let view = load_list(api, session, cfg, &args).await?;
            renderer.render_task_list(&mut out, &view)?;
            ensure_list_loaded(&view)
        }
        Command::Complete { id, list } => {
            let mut view = load_list(api, session, cfg, &list).await?;
            if matches!(view.phase(), ListPhase::Failed(_)) {
                warn!(task_id = %id, "listing failed; not completing");
                renderer.render_task_list(&mut out, &view)?;
                return ensure_list_loaded(&view);
            }
            let result = view.complete_task(api, &id).await;
            renderer.render_task_list(&mut out, &view)?;
            result.with_context(|| format!("task {id} was not completed"))
        }
        Command::Show { id } => {
            let mut view = TaskEditView::new(id);
            view.load(api).await;
            renderer.render_task_edit(&mut out, &view)?;
            ensure_task_loaded(&view)
        }
        Command::Edit { id, form } => edit(api, renderer, id, &form, &mut out).await,
    }
}

/// Builds the list view from config and flags and runs its first fetch.
pub fn list_view_for(cfg: &Config, args: &ListArgs) -> TaskListView {
    let mut query = args
        .query
        .as_deref()
        .map(QueryState::parse)
        .unwrap_or_default();

    if let Some(filter) = args.status {
        query.set_status(filter.as_status());
    }
    if let Some(field) = args.order_by {
        query.set_order_by(field);
    }
    if let Some(page) = args.page {
        query.set_page(page);
    }

    let mut view = TaskListView::new(query, cfg.view.page_size);
    if let Some(page_size) = args.page_size {
        view.on_page_size(page_size);
    }
    view
}

async fn load_list<A: TaskApi>(
    api: &A,
    session: &Session,
    cfg: &Config,
    args: &ListArgs,
) -> anyhow::Result<TaskListView> {
    let mut view = list_view_for(cfg, args);
    debug!(query = %view.query(), page_size = view.page_size(), "list view prepared");

    let ticket = view.set_user(session.user_id.clone()).ok_or_else(|| {
        anyhow!("no signed-in user; set session.user_id in the config or TASKBOARD_USER")
    })?;

    match view.run_fetch(api, ticket).await {
        FetchOutcome::Applied => {
            info!(task_count = ?view.task_count(), "listing fetched");
        }
        FetchOutcome::Failed => {
            warn!("listing fetch failed");
        }
        FetchOutcome::Stale => {
            debug!("listing response superseded");
        }
    }
    Ok(view)
}

fn ensure_list_loaded(view: &TaskListView) -> anyhow::Result<()> {
    match view.phase() {
        ListPhase::Failed(err) => Err(anyhow!("failed to load tasks: {err}")),
        _ => Ok(()),
    }
}

fn ensure_task_loaded(view: &TaskEditView) -> anyhow::Result<()> {
    match view.phase() {
        EditPhase::Failed(err) => Err(anyhow!("failed to load task {}: {err}", view.task_id())),
        _ => Ok(()),
    }
}

#[instrument(skip(api, renderer, form, out))]
async fn edit<A: TaskApi, W: Write>(
    api: &A,
    renderer: &Renderer,
    id: String,
    form: &EditArgs,
    mut out: W,
) -> anyhow::Result<()> {
    let form = form.to_form()?;
    if form.is_empty() {
        return Err(anyhow!(
            "nothing to update; pass --name, --priority, --set-status, --due, --clear-due or --owner"
        ));
    }

    let mut view = TaskEditView::new(id);
    if !view.load(api).await {
        renderer.render_task_edit(&mut out, &view)?;
        return ensure_task_loaded(&view);
    }

    let result = view.submit(api, &form).await;
    renderer.render_task_edit(&mut out, &view)?;
    result
        .map(|_| ())
        .with_context(|| format!("task {} was not updated", view.task_id()))
}
