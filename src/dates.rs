use std::sync::LazyLock;

use chrono::{Duration, Months, NaiveDate};
use regex::Regex;

static POSTED_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"Posted\s+(\d+)([a-z])\s+ago").unwrap());
static APPLIED_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"You applied on\s+(.+)").unwrap());

// Formats Seek has been observed to use for the applied-on line.
const APPLIED_FORMATS: &[&str] = &[
    "%d %b %Y",
    "%d %B %Y",
    "%b %d, %Y",
    "%B %d, %Y",
    "%Y-%m-%d",
    "%d/%m/%Y",
];

/// Resolve a relative "Posted Nd/Nw/Nm/Ny ago" label to an absolute date.
///
/// Month and year steps use calendar arithmetic ("1m ago" from Mar 31 lands on
/// the last day of February). An unrecognized unit resolves to `today`.
pub fn posted_date(text: &str, today: NaiveDate) -> Option<NaiveDate> {
    let caps = POSTED_RE.captures(text)?;
    let n: u32 = caps[1].parse().ok()?;
    match &caps[2] {
        "d" => Some(today - Duration::days(n as i64)),
        "w" => Some(today - Duration::weeks(n as i64)),
        "m" => today.checked_sub_months(Months::new(n)),
        "y" => today.checked_sub_months(Months::new(n.checked_mul(12)?)),
        _ => Some(today),
    }
}

/// Parse the "You applied on <date>" line. None when absent or unparsable.
pub fn applied_date(text: &str) -> Option<NaiveDate> {
    let caps = APPLIED_RE.captures(text)?;
    let raw = caps[1].trim().trim_end_matches('.');
    APPLIED_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(raw, fmt).ok())
}
