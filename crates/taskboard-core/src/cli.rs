use std::fmt;
use std::io::IsTerminal;
use std::path::PathBuf;
use std::str::FromStr;

use anyhow::anyhow;
use clap::{ArgAction, Args, Parser, Subcommand};
use tracing::debug;
use tracing_subscriber::EnvFilter;

use crate::datetime::parse_due_input;
use crate::edit_view::{DueChange, TaskForm};
use crate::query::{SortField, parse_page_size};
use crate::task::{Priority, Status};

#[derive(Debug, Clone)]
pub struct KeyVal {
    pub key: String,
    pub value: String,
}

impl FromStr for KeyVal {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (k, v) = s
            .split_once('=')
            .ok_or_else(|| anyhow!("expected KEY=VALUE, got: {s}"))?;
        Ok(Self {
            key: k.trim().to_string(),
            value: v.trim().to_string(),
        })
    }
}

/// `all` clears the filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusFilter {
    All,
    Only(Status),
}

impl StatusFilter {
    pub fn as_status(self) -> Option<Status> {
        match self {
            StatusFilter::All => None,
            StatusFilter::Only(status) => Some(status),
        }
    }
}

impl FromStr for StatusFilter {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.trim().eq_ignore_ascii_case("all") || s.trim().is_empty() {
            return Ok(StatusFilter::All);
        }
        s.parse::<Status>().map(StatusFilter::Only)
    }
}

impl fmt::Display for StatusFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StatusFilter::All => f.write_str("all"),
            StatusFilter::Only(status) => write!(f, "{status}"),
        }
    }
}

#[derive(Parser, Debug, Clone)]
#[command(
    name = "taskboard",
    version,
    about = "Taskboard: terminal client for the task board API",
    disable_help_subcommand = true
)]
pub struct GlobalCli {
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count, global = true)]
    pub verbose: u8,

    #[arg(short = 'q', long = "quiet", action = ArgAction::Count, global = true)]
    pub quiet: u8,

    /// Override a config value, e.g. --rc api.base_url=http://host/api
    #[arg(
        long = "rc",
        value_parser = clap::builder::ValueParser::new(|s: &str| s.parse::<KeyVal>()),
        action = ArgAction::Append,
        global = true
    )]
    pub rc_overrides: Vec<KeyVal>,

    #[arg(long = "config", global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// List your tasks for the given filter, sort and page.
    List(ListArgs),
    /// Mark an open task done, then show the list.
    Complete {
        /// Task id.
        id: String,
        #[command(flatten)]
        list: ListArgs,
    },
    /// Load one task for editing and print it.
    Show {
        /// Task id.
        id: String,
    },
    /// Update fields of one task.
    Edit {
        /// Task id.
        id: String,
        #[command(flatten)]
        form: EditArgs,
    },
}

#[derive(Args, Debug, Clone, Default)]
pub struct ListArgs {
    /// Query string to start from, as printed by `list` (e.g. "status=open&page=2").
    #[arg(long)]
    pub query: Option<String>,

    /// open, done or all.
    #[arg(
        long,
        value_parser = clap::builder::ValueParser::new(|s: &str| s.parse::<StatusFilter>())
    )]
    pub status: Option<StatusFilter>,

    /// name, priority, status or due.
    #[arg(
        long = "order-by",
        value_parser = clap::builder::ValueParser::new(|s: &str| s.parse::<SortField>())
    )]
    pub order_by: Option<SortField>,

    #[arg(long)]
    pub page: Option<u32>,

    /// Rows to show: 2, 3, 4, 5, 8, 10 or 20. Not sent to the server.
    #[arg(
        long = "page-size",
        value_parser = clap::builder::ValueParser::new(parse_page_size)
    )]
    pub page_size: Option<usize>,
}

#[derive(Args, Debug, Clone, Default)]
pub struct EditArgs {
    #[arg(long)]
    pub name: Option<String>,

    /// normal or urgent.
    #[arg(
        long,
        value_parser = clap::builder::ValueParser::new(|s: &str| s.parse::<Priority>())
    )]
    pub priority: Option<Priority>,

    /// open or done.
    #[arg(
        long = "set-status",
        value_parser = clap::builder::ValueParser::new(|s: &str| s.parse::<Status>())
    )]
    pub status: Option<Status>,

    /// YYYY-MM-DD or an RFC 3339 timestamp.
    #[arg(long, conflicts_with = "clear_due")]
    pub due: Option<String>,

    #[arg(long = "clear-due")]
    pub clear_due: bool,

    #[arg(long)]
    pub owner: Option<String>,
}

impl EditArgs {
    pub fn to_form(&self) -> anyhow::Result<TaskForm> {
        let due = if self.clear_due {
            Some(DueChange::Clear)
        } else {
            self.due
                .as_deref()
                .map(parse_due_input)
                .transpose()?
                .map(DueChange::Set)
        };

        Ok(TaskForm {
            name: self.name.clone(),
            priority: self.priority,
            status: self.status,
            due,
            owner: self.owner.clone(),
        })
    }
}

pub fn init_tracing(verbose: u8, quiet: u8) -> anyhow::Result<()> {
    let default_level = if quiet >= 2 {
        "error"
    } else if quiet == 1 {
        "warn"
    } else if verbose >= 3 {
        "trace"
    } else if verbose == 2 {
        "debug"
    } else if verbose == 1 {
        "info"
    } else {
        "warn"
    };

    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_level))
        .map_err(|e| anyhow!("invalid RUST_LOG / log filter: {e}"))?;

    let init_result = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_level(true)
        .with_thread_ids(true)
        .with_ansi(std::io::stderr().is_terminal())
        .try_init();

    if let Err(err) = init_result {
        debug!(error = %err, "tracing subscriber already set, continuing");
    }

    Ok(())
}
