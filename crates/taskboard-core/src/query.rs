use std::fmt;
use std::str::FromStr;

use anyhow::anyhow;
use tracing::{debug, trace};
use url::form_urlencoded;

use crate::task::Status;

const PAGE_KEY: &str = "page";
const STATUS_KEY: &str = "status";
const ORDER_BY_KEY: &str = "orderBy";

pub const DEFAULT_PAGE_SIZE: usize = 5;
pub const PAGE_SIZE_CHOICES: [usize; 7] = [2, 3, 4, 5, 8, 10, 20];

/// Parses a page size, accepting only the selectable values.
pub fn parse_page_size(raw: &str) -> anyhow::Result<usize> {
    let size: usize = raw
        .trim()
        .parse()
        .map_err(|_| anyhow!("invalid page size: {raw}"))?;
    if !PAGE_SIZE_CHOICES.contains(&size) {
        return Err(anyhow!(
            "page size must be one of {}",
            page_size_choices()
        ));
    }
    Ok(size)
}

/// The selectable page sizes, e.g. "2, 3, 4, 5, 8, 10, 20".
pub fn page_size_choices() -> String {
    PAGE_SIZE_CHOICES
        .iter()
        .map(usize::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Column the server is asked to order by. There is no direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortField {
    Name,
    Priority,
    Status,
    Due,
}

impl SortField {
    pub fn as_str(self) -> &'static str {
        match self {
            SortField::Name => "name",
            SortField::Priority => "priority",
            SortField::Status => "status",
            SortField::Due => "due",
        }
    }
}

impl fmt::Display for SortField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SortField {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "name" => Ok(SortField::Name),
            "priority" => Ok(SortField::Priority),
            "status" => Ok(SortField::Status),
            "due" => Ok(SortField::Due),
            other => Err(anyhow!(
                "invalid sort field: {other} (expected name, priority, status or due)"
            )),
        }
    }
}

/// Filter, sort and page state carried in the URL query string.
///
/// This is what gets fetched: the list view never sends anything that is not
/// in here. Parameters this type does not understand are kept and re-emitted
/// in their original order so a shared URL survives a round trip. A repeated
/// `page`, `status` or `orderBy` key is ignored after its first occurrence.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct QueryState {
    page: Option<u32>,
    status: Option<Status>,
    order_by: Option<SortField>,
    extra: Vec<(String, String)>,
}

impl QueryState {
    #[tracing::instrument(level = "trace")]
    pub fn parse(raw: &str) -> Self {
        let raw = raw.strip_prefix('?').unwrap_or(raw);
        let mut state = QueryState::default();
        let mut seen = Vec::new();

        for (key, value) in form_urlencoded::parse(raw.as_bytes()) {
            let known = matches!(key.as_ref(), PAGE_KEY | STATUS_KEY | ORDER_BY_KEY);
            if known {
                if seen.contains(&key) {
                    debug!(key = %key, value = %value, "ignoring repeated query parameter");
                    continue;
                }
                seen.push(key.clone());
            }
            match key.as_ref() {
                PAGE_KEY => {
                    state.page = Some(parse_page(&value));
                }
                STATUS_KEY => match value.parse::<Status>() {
                    Ok(status) => state.status = Some(status),
                    Err(_) => {
                        debug!(value = %value, "ignoring unknown status filter");
                    }
                },
                ORDER_BY_KEY => match value.parse::<SortField>() {
                    Ok(field) => state.order_by = Some(field),
                    Err(_) => {
                        debug!(value = %value, "ignoring unknown orderBy field");
                    }
                },
                _ => {
                    trace!(key = %key, value = %value, "preserving unrecognised query parameter");
                    state.extra.push((key.into_owned(), value.into_owned()));
                }
            }
        }

        state
    }

    /// Page number, defaulting to 1.
    pub fn page(&self) -> u32 {
        self.page.unwrap_or(1)
    }

    pub fn status(&self) -> Option<Status> {
        self.status
    }

    pub fn order_by(&self) -> Option<SortField> {
        self.order_by
    }

    pub fn extra(&self) -> &[(String, String)] {
        &self.extra
    }

    /// Returns whether the state changed.
    pub fn set_status(&mut self, status: Option<Status>) -> bool {
        let changed = self.status != status;
        self.status = status;
        changed
    }

    pub fn set_order_by(&mut self, field: SortField) -> bool {
        let changed = self.order_by != Some(field);
        self.order_by = Some(field);
        changed
    }

    pub fn set_page(&mut self, page: u32) -> bool {
        let page = page.max(1);
        let changed = self.page != Some(page);
        self.page = Some(page);
        changed
    }

    pub fn is_empty(&self) -> bool {
        self.page.is_none()
            && self.status.is_none()
            && self.order_by.is_none()
            && self.extra.is_empty()
    }

    /// Serializes the set keys, without a leading `?`.
    pub fn to_query_string(&self) -> String {
        let mut out = form_urlencoded::Serializer::new(String::new());

        if let Some(page) = self.page {
            out.append_pair(PAGE_KEY, &page.to_string());
        }
        if let Some(status) = self.status {
            out.append_pair(STATUS_KEY, status.as_str());
        }
        if let Some(field) = self.order_by {
            out.append_pair(ORDER_BY_KEY, field.as_str());
        }
        for (key, value) in &self.extra {
            out.append_pair(key, value);
        }

        out.finish()
    }
}

impl fmt::Display for QueryState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_query_string())
    }
}

fn parse_page(raw: &str) -> u32 {
    match raw.trim().parse::<u32>() {
        Ok(0) | Err(_) => 1,
        Ok(page) => page,
    }
}
