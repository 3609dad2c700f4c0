use anyhow::anyhow;
use chrono::{DateTime, Local, NaiveDate, TimeZone, Utc};

/// Formats a due date the way browsers print `Date.toDateString()`,
/// e.g. `Mon Oct 19 2026`.
#[must_use]
pub fn format_due<Tz: TimeZone>(due: DateTime<Utc>, tz: &Tz) -> String
where
    Tz::Offset: std::fmt::Display,
{
    due.with_timezone(tz).format("%a %b %d %Y").to_string()
}

#[must_use]
pub fn format_due_local(due: DateTime<Utc>) -> String {
    format_due(due, &Local)
}

/// Accepts `YYYY-MM-DD` (midnight UTC, as a date input submits it) or a full
/// RFC 3339 timestamp.
pub fn parse_due_input(raw: &str) -> anyhow::Result<DateTime<Utc>> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(anyhow!("due date cannot be empty"));
    }

    if let Ok(date) = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d") {
        let midnight = date
            .and_hms_opt(0, 0, 0)
            .ok_or_else(|| anyhow!("invalid due date: {trimmed}"))?;
        return Ok(midnight.and_utc());
    }

    DateTime::parse_from_rfc3339(trimmed)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|err| anyhow!("invalid due date {trimmed}: {err} (expected YYYY-MM-DD or RFC 3339)"))
}
