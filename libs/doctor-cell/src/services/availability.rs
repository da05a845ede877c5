use std::collections::BTreeSet;
use std::sync::LazyLock;

use chrono::{Datelike, NaiveDateTime, Timelike};
use regex::Regex;
use tracing::debug;

use crate::models::{DayOfWeek, Doctor, HourRange, WeeklySchedule};

static DAY_RANGE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(SUN|MON|TUE|WED|THU|FRI|SAT)\s*-\s*(SUN|MON|TUE|WED|THU|FRI|SAT)\b")
        .expect("day range pattern compiles")
});

static DAY_TOKEN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(SUN|MON|TUE|WED|THU|FRI|SAT)\b").expect("day token pattern compiles")
});

static HOUR_RANGE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(1[0-2]|0?[1-9])\s*(AM|PM)\s*-\s*(1[0-2]|0?[1-9])\s*(AM|PM)\b")
        .expect("hour range pattern compiles")
});

/// Parse a legacy declaration such as `"MON-FRI 10am-6pm"` or
/// `"MON, WED, FRI"`. Text with no recognizable day yields an empty day set.
pub fn parse_availability(text: &str) -> WeeklySchedule {
    let upper = text.to_ascii_uppercase();

    let schedule = WeeklySchedule {
        days: parse_days(&upper),
        hours: parse_hours(&upper),
    };

    debug!("Parsed availability '{}' into {:?}", text, schedule);
    schedule
}

fn parse_days(upper: &str) -> BTreeSet<DayOfWeek> {
    if let Some(caps) = DAY_RANGE.captures(upper) {
        let first = DayOfWeek::from_abbreviation(&caps[1]);
        let last = DayOfWeek::from_abbreviation(&caps[2]);
        if let (Some(first), Some(last)) = (first, last) {
            return day_run(first, last);
        }
    }

    let listed: BTreeSet<DayOfWeek> = DAY_TOKEN
        .find_iter(upper)
        .filter_map(|m| DayOfWeek::from_abbreviation(m.as_str()))
        .collect();
    if !listed.is_empty() {
        return listed;
    }

    if upper.contains("MON-FRI") {
        return day_run(DayOfWeek::Monday, DayOfWeek::Friday);
    }

    BTreeSet::new()
}

/// Inclusive run from `first` to `last`, wrapping past Saturday when needed.
fn day_run(first: DayOfWeek, last: DayOfWeek) -> BTreeSet<DayOfWeek> {
    let (start, end) = (first.index(), last.index());
    let span = if start <= end { end - start } else { end + 7 - start };

    (0..=span)
        .filter_map(|offset| DayOfWeek::from_index((start + offset) % 7))
        .collect()
}

fn parse_hours(upper: &str) -> Option<HourRange> {
    let caps = HOUR_RANGE.captures(upper)?;
    let start = to_24_hour(caps[1].parse().ok()?, &caps[2]);
    let end = to_24_hour(caps[3].parse().ok()?, &caps[4]);
    Some(HourRange { start, end })
}

fn to_24_hour(hour: u32, meridiem: &str) -> u32 {
    match (hour, meridiem) {
        (12, "AM") => 0,
        (12, "PM") => 12,
        (h, "PM") => h + 12,
        (h, _) => h,
    }
}

/// Whether the doctor's declaration covers `target`. Bookings are not consulted.
pub fn is_nominally_available(schedule: &WeeklySchedule, target: NaiveDateTime, check_hour: bool) -> bool {
    let day = DayOfWeek::from(target.weekday());
    if !schedule.days.contains(&day) {
        return false;
    }

    if !check_hour {
        return true;
    }

    schedule
        .hours
        .map_or(true, |hours| hours.contains(target.hour()))
}

/// Day-level check for the weekday capacity model. A doctor without a text
/// declaration falls back to having capacity configured for that day.
pub fn doctor_works_on(doctor: &Doctor, day: DayOfWeek) -> bool {
    if doctor.availability.as_deref().is_some_and(|text| !text.trim().is_empty()) {
        return doctor.schedule.days.contains(&day);
    }

    doctor.remaining_capacity(day).is_some_and(|remaining| remaining > 0)
}
