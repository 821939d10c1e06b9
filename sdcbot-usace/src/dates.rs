//! Date field parsing for inception statements
//!
//! The transferred descriptions carry the capture date either as a
//! plain ISO-style date of year, month or day granularity, or wrapped
//! in a `{{complex date}}` invocation marking it as circa.

use chrono::NaiveDate;
use regex::Regex;
use std::sync::OnceLock;

use sdcbot_common::statement::{PRECISION_DAY, PRECISION_MONTH, PRECISION_YEAR};
use sdcbot_common::wikitext;

/// A date field ready to become an inception statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InceptionDate {
    pub date: NaiveDate,
    pub precision: u8,
    pub circa: bool,
}

/// `YYYY`, `YYYY-MM` or `YYYY-MM-DD`, nothing around it.
fn plain_date_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^(\d{4})(?:-(\d{2})(?:-(\d{2}))?)?$").expect("valid regex"))
}

/// Parse a plain date, taking the precision from the components present.
/// Absent components default to January the 1st, which the statement
/// serialization zeroes back out below the chosen precision.
fn plain_date(text: &str) -> Option<InceptionDate> {
    let captures = plain_date_regex().captures(text)?;

    let year: i32 = captures.get(1)?.as_str().parse().ok()?;
    let month: u32 = match captures.get(2) {
        Some(m) => m.as_str().parse().ok()?,
        None => 1,
    };
    let day: u32 = match captures.get(3) {
        Some(d) => d.as_str().parse().ok()?,
        None => 1,
    };

    let precision = if captures.get(3).is_some() {
        PRECISION_DAY
    } else if captures.get(2).is_some() {
        PRECISION_MONTH
    } else {
        PRECISION_YEAR
    };

    let date = NaiveDate::from_ymd_opt(year, month, day)?;
    Some(InceptionDate {
        date,
        precision,
        circa: false,
    })
}

/// Parse a date field into an inception date.
///
/// Accepts a plain date, or a two-parameter `{{complex date|ca|...}}`
/// invocation whose inner date keeps its own precision and gets the
/// circa flag. Any other shape is unusable, including complex dates of
/// other kinds ("between", "before") and fields with several complex
/// date invocations.
pub fn parse_inception(text: &str) -> Option<InceptionDate> {
    let trimmed = text.trim();
    if let Some(parsed) = plain_date(trimmed) {
        return Some(parsed);
    }

    let invocations: Vec<_> = wikitext::templates(trimmed)
        .into_iter()
        .filter(|t| t.matches(&["complex date"]))
        .collect();
    let invocation = match invocations.as_slice() {
        [one] => one,
        _ => return None,
    };

    if invocation.param_count() != 2 || invocation.get("1") != Some("ca") {
        return None;
    }

    let inner = plain_date(invocation.get("2")?)?;
    Some(InceptionDate {
        circa: true,
        ..inner
    })
}

// ============================================================================
// Tests
// ============================================================================
