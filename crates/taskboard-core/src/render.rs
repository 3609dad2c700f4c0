use std::io::{self, IsTerminal, Write};

use chrono::Utc;
use unicode_width::UnicodeWidthStr;

use crate::config::Config;
use crate::datetime::{format_due, format_due_local};
use crate::edit_view::{EditPhase, TaskEditView};
use crate::list_view::{ListPhase, TaskListView, can_complete};
use crate::query::SortField;
use crate::task::{BadgeColor, Task};

const SORT_ARROW: &str = "↑";

#[derive(Debug, Clone)]
pub struct Renderer {
    color: bool,
    utc_dates: bool,
}

impl Renderer {
    pub fn new(color: bool) -> Self {
        Self {
            color,
            utc_dates: false,
        }
    }

    /// Colour only when enabled in config and stdout is a terminal.
    pub fn from_config(cfg: &Config) -> Self {
        Self::new(cfg.view.color && io::stdout().is_terminal())
    }

    /// Print due dates in UTC instead of local time.
    pub fn with_utc_dates(mut self) -> Self {
        self.utc_dates = true;
        self
    }

    #[tracing::instrument(skip_all)]
    pub fn render_task_list<W: Write>(&self, mut out: W, view: &TaskListView) -> anyhow::Result<()> {
        writeln!(out, "Tasks to do")?;
        writeln!(out)?;

        let query = view.query();
        let status = query
            .status()
            .map(|status| status.to_string())
            .unwrap_or_else(|| "all".to_string());
        let qs = query.to_query_string();
        let qs = if qs.is_empty() { String::new() } else { format!("?{qs}") };
        writeln!(
            out,
            "status: {status}  page size: {}  query: {qs}",
            view.page_size()
        )?;
        writeln!(out)?;

        match view.phase() {
            ListPhase::Loading => {
                writeln!(out, "Loading tasks...")?;
            }
            ListPhase::Failed(err) => {
                writeln!(out, "{}", self.paint(&format!("Could not load tasks: {err}"), "31"))?;
            }
            ListPhase::Loaded { task_count, .. } => {
                let rows = view.visible_tasks();
                self.write_task_rows(&mut out, rows, query.order_by())?;
                writeln!(out)?;
                writeln!(
                    out,
                    "page {}, showing {} of {} tasks",
                    query.page(),
                    rows.len(),
                    task_count
                )?;
            }
        }

        if let Some(notice) = view.notice() {
            writeln!(out, "{}", self.paint(&format!("! {notice}"), "31"))?;
        }

        Ok(())
    }

    #[tracing::instrument(skip_all)]
    pub fn render_task_edit<W: Write>(&self, mut out: W, view: &TaskEditView) -> anyhow::Result<()> {
        writeln!(out, "Update Task")?;
        writeln!(out)?;

        match view.phase() {
            EditPhase::Loading => {
                writeln!(out, "Loading task {}...", view.task_id())?;
            }
            EditPhase::Failed(err) => {
                writeln!(out, "{}", self.paint(&format!("Could not load task: {err}"), "31"))?;
            }
            EditPhase::Loaded(task) => {
                writeln!(out, "id        {}", task.id)?;
                writeln!(out, "name      {}", task.name)?;
                writeln!(out, "priority  {}", self.badge(task.priority.as_str(), task.priority.badge()))?;
                writeln!(out, "status    {}", self.badge(task.status.as_str(), task.status.badge()))?;
                writeln!(out, "due       {}", self.due(task))?;
                writeln!(out, "owner     {}", task.owner.as_deref().unwrap_or_default())?;
                for (key, value) in &task.extra {
                    writeln!(out, "{key:<9} {value}")?;
                }
            }
        }

        if let Some(notice) = view.notice() {
            writeln!(out, "{}", self.paint(&format!("! {notice}"), "31"))?;
        }

        Ok(())
    }

    fn write_task_rows<W: Write>(
        &self,
        out: W,
        tasks: &[Task],
        order_by: Option<SortField>,
    ) -> anyhow::Result<()> {
        let header = |label: &str, field: SortField| {
            if order_by == Some(field) {
                format!("{label} {SORT_ARROW}")
            } else {
                label.to_string()
            }
        };

        let headers = vec![
            "ID".to_string(),
            header("Task", SortField::Name),
            header("Priority", SortField::Priority),
            header("Status", SortField::Status),
            header("Due Date", SortField::Due),
            "Actions".to_string(),
        ];

        let rows = tasks
            .iter()
            .map(|task| {
                let action = if can_complete(task) {
                    self.paint("complete", "34")
                } else {
                    String::new()
                };
                vec![
                    self.paint(&task.id, "33"),
                    task.name.clone(),
                    self.badge(task.priority.as_str(), task.priority.badge()),
                    self.badge(task.status.as_str(), task.status.badge()),
                    self.due(task),
                    action,
                ]
            })
            .collect();

        write_table(out, headers, rows)
    }

    fn due(&self, task: &Task) -> String {
        match task.due {
            Some(due) if self.utc_dates => format_due(due, &Utc),
            Some(due) => format_due_local(due),
            None => String::new(),
        }
    }

    fn badge(&self, text: &str, color: BadgeColor) -> String {
        self.paint(text, color.ansi_code())
    }

    fn paint(&self, text: &str, code: &str) -> String {
        if !self.color {
            return text.to_string();
        }
        format!("\x1b[{code}m{text}\x1b[0m")
    }
}

fn write_table<W: Write>(
    mut writer: W,
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
) -> anyhow::Result<()> {
    let column_count = headers.len();
    let mut widths = vec![0usize; column_count];

    for (idx, header) in headers.iter().enumerate() {
        widths[idx] = widths[idx].max(UnicodeWidthStr::width(header.as_str()));
    }

    for row in &rows {
        for (idx, cell) in row.iter().enumerate() {
            widths[idx] = widths[idx].max(UnicodeWidthStr::width(strip_ansi(cell).as_str()));
        }
    }

    let mut line = String::new();
    for (idx, header) in headers.iter().enumerate() {
        pad_cell(&mut line, header, widths[idx]);
    }
    writeln!(writer, "{}", line.trim_end())?;

    line.clear();
    for width in &widths {
        line.push_str(&"-".repeat(*width));
        line.push(' ');
    }
    writeln!(writer, "{}", line.trim_end())?;

    for row in rows {
        line.clear();
        for (idx, cell) in row.iter().enumerate() {
            pad_cell(&mut line, cell, widths[idx]);
        }
        writeln!(writer, "{}", line.trim_end())?;
    }

    Ok(())
}

fn pad_cell(line: &mut String, cell: &str, width: usize) {
    let visible_width = UnicodeWidthStr::width(strip_ansi(cell).as_str());
    line.push_str(cell);
    line.push_str(&" ".repeat(width.saturating_sub(visible_width) + 1));
}

fn strip_ansi(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut escaped = false;

    for ch in s.chars() {
        if escaped {
            if ch == 'm' {
                escaped = false;
            }
            continue;
        }

        if ch == '\x1b' {
            escaped = true;
            continue;
        }

        out.push(ch);
    }

    out
}
