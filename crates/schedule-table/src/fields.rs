//! Soft parsers for individual schedule cells.
//!
//! None of these fail: an unrecognised token yields `None` and the rest of
//! the row is left untouched.

use std::sync::LazyLock;

use chrono::NaiveDate;
use regex::Regex;
use serde::Serialize;

use crate::columns::{
    ACTIVITY_ID, ACTIVITY_NAME, FINISH, ORIGINAL_DURATION, REMAINING_DURATION, START,
};
use crate::model::LogicalRow;
use crate::structure::is_sub_activity_id;

static LEADING_INTEGER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*([+-]?\d+)").expect("hardcoded leading integer regex is valid")
});

/// Two-digit year formats come first so that `1/15/24` is not read as year 24.
const DATE_FORMATS: &[&str] = &[
    "%d-%b-%y",
    "%d-%b-%Y",
    "%Y-%m-%d",
    "%m/%d/%y",
    "%m/%d/%Y",
    "%d/%m/%Y",
    "%b %d, %Y",
    "%d %b %Y",
    "%d.%m.%Y",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleDate {
    pub date: NaiveDate,
    /// Trailing `A` marker: the date is an actual, not a forecast.
    pub is_actual: bool,
}

impl ScheduleDate {
    /// ISO `YYYY-MM-DD`.
    #[must_use]
    pub fn formatted(&self) -> String {
        self.date.format("%Y-%m-%d").to_string()
    }
}

/// Trims and collapses whitespace runs to a single space.
#[must_use]
pub fn clean_text(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[must_use]
pub fn parse_date(token: &str) -> Option<ScheduleDate> {
    let mut rest = token.trim();
    rest = rest.strip_suffix('*').unwrap_or(rest).trim_end();

    let (rest, is_actual) = match rest.strip_suffix('A') {
        Some(stripped) => (stripped.trim_end(), true),
        None => (rest, false),
    };
    if rest.is_empty() {
        return None;
    }

    DATE_FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(rest, format).ok())
        .map(|date| ScheduleDate { date, is_actual })
}

/// Reads the leading integer of a duration cell (`"10d"` is 10).
#[must_use]
pub fn parse_duration(token: &str) -> Option<i64> {
    LEADING_INTEGER
        .captures(token)
        .and_then(|capture| capture.get(1))
        .and_then(|digits| digits.as_str().parse::<i64>().ok())
}

/// Typed reading of a row laid out with the standard columns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Activity {
    pub id: String,
    pub is_sub_activity: bool,
    pub name: String,
    pub original_duration: Option<i64>,
    pub remaining_duration: Option<i64>,
    pub start: Option<ScheduleDate>,
    pub finish: Option<ScheduleDate>,
}

impl Activity {
    #[must_use]
    pub fn from_row(row: &LogicalRow) -> Self {
        let raw_id = row.cell(ACTIVITY_ID);
        Self {
            id: clean_text(raw_id),
            is_sub_activity: is_sub_activity_id(raw_id),
            name: clean_text(row.cell(ACTIVITY_NAME)),
            original_duration: parse_duration(row.cell(ORIGINAL_DURATION)),
            remaining_duration: parse_duration(row.cell(REMAINING_DURATION)),
            start: parse_date(row.cell(START)),
            finish: parse_date(row.cell(FINISH)),
        }
    }
}
