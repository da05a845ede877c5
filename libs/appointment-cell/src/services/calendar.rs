use std::sync::LazyLock;

use chrono::{Datelike, Local, NaiveDate};
use regex::Regex;
use serde_json::Value;

use doctor_cell::models::DayOfWeek;

pub const SLOTS_PER_DAY: u8 = 8;

const SLOT_TIMES: [&str; SLOTS_PER_DAY as usize] = [
    "10:00-11:00",
    "11:00-12:00",
    "12:00-13:00",
    "13:00-14:00",
    "14:00-15:00",
    "15:00-16:00",
    "16:00-17:00",
    "17:00-18:00",
];

static DATE_FORMAT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\d{4}-\d{2}-\d{2}$").expect("date pattern compiles")
});

/// The fixed daily slot table, ascending by index.
pub fn slot_times() -> impl Iterator<Item = (u8, &'static str)> {
    (0..SLOTS_PER_DAY).zip(SLOT_TIMES)
}

pub fn slot_label(index: u8) -> Option<&'static str> {
    SLOT_TIMES.get(index as usize).copied()
}

pub fn is_valid_slot_index(n: i64) -> bool {
    (0..SLOTS_PER_DAY as i64).contains(&n)
}

/// Slot index from loose JSON input: only integers in range qualify, so
/// `3.0`, `"3"` and `-1` are all rejected.
pub fn parse_slot_index(value: &Value) -> Option<u8> {
    value
        .as_i64()
        .filter(|n| is_valid_slot_index(*n))
        .and_then(|n| u8::try_from(n).ok())
}

/// Shape check only. `2025-13-40` passes here; the calendar checks below
/// treat it as no day at all.
pub fn is_valid_date_format(s: &str) -> bool {
    DATE_FORMAT.is_match(s)
}

pub fn parse_date(s: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").ok()
}

/// Monday through Friday. Working on the calendar date keeps this anchored
/// to local midnight.
pub fn is_weekday(date: &str) -> bool {
    parse_date(date).is_some_and(|d| DayOfWeek::from(d.weekday()).is_weekday())
}

/// Source of "today" for past-date checks.
#[derive(Debug, Clone, Copy, Default)]
pub struct SlotCalendar {
    fixed_today: Option<NaiveDate>,
}

impl SlotCalendar {
    /// Uses the service's local time zone.
    pub fn local() -> Self {
        Self { fixed_today: None }
    }

    pub fn fixed(today: NaiveDate) -> Self {
        Self { fixed_today: Some(today) }
    }

    pub fn today(&self) -> NaiveDate {
        self.fixed_today.unwrap_or_else(|| Local::now().date_naive())
    }

    /// Strictly before today's midnight. Today itself is bookable.
    pub fn is_past_date(&self, date: &str) -> bool {
        parse_date(date).is_some_and(|d| d < self.today())
    }
}
