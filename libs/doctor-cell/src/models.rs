use std::collections::BTreeSet;
use std::fmt;

use chrono::{DateTime, Utc, Weekday};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;
use uuid::Uuid;

use crate::services::availability::parse_availability;

// ==============================================================================
// DAYS AND SCHEDULES
// ==============================================================================

/// Day of week, indexed Sunday = 0 through Saturday = 6. The index addresses
/// a doctor's `available_slots` counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DayOfWeek {
    Sunday,
    Monday,
    Tuesday,
    Wednesday,
    Thursday,
    Friday,
    Saturday,
}

impl DayOfWeek {
    pub const ALL: [DayOfWeek; 7] = [
        DayOfWeek::Sunday,
        DayOfWeek::Monday,
        DayOfWeek::Tuesday,
        DayOfWeek::Wednesday,
        DayOfWeek::Thursday,
        DayOfWeek::Friday,
        DayOfWeek::Saturday,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    /// Full day name, any case, surrounding whitespace ignored.
    pub fn from_name(name: &str) -> Option<Self> {
        let name = name.trim().to_ascii_lowercase();
        Self::ALL.into_iter().find(|day| day.name() == name)
    }

    /// Three-letter abbreviation, any case.
    pub fn from_abbreviation(abbr: &str) -> Option<Self> {
        let abbr = abbr.trim().to_ascii_uppercase();
        Self::ALL.into_iter().find(|day| day.abbreviation() == abbr)
    }

    pub fn name(self) -> &'static str {
        match self {
            DayOfWeek::Sunday => "sunday",
            DayOfWeek::Monday => "monday",
            DayOfWeek::Tuesday => "tuesday",
            DayOfWeek::Wednesday => "wednesday",
            DayOfWeek::Thursday => "thursday",
            DayOfWeek::Friday => "friday",
            DayOfWeek::Saturday => "saturday",
        }
    }

    pub fn abbreviation(self) -> &'static str {
        match self {
            DayOfWeek::Sunday => "SUN",
            DayOfWeek::Monday => "MON",
            DayOfWeek::Tuesday => "TUE",
            DayOfWeek::Wednesday => "WED",
            DayOfWeek::Thursday => "THU",
            DayOfWeek::Friday => "FRI",
            DayOfWeek::Saturday => "SAT",
        }
    }

    pub fn is_weekday(self) -> bool {
        !matches!(self, DayOfWeek::Saturday | DayOfWeek::Sunday)
    }
}

impl From<Weekday> for DayOfWeek {
    fn from(weekday: Weekday) -> Self {
        Self::ALL[weekday.num_days_from_sunday() as usize]
    }
}

impl fmt::Display for DayOfWeek {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Working hours in 24-hour local time. `start > end` wraps past midnight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HourRange {
    pub start: u32,
    pub end: u32,
}

impl HourRange {
    pub fn contains(&self, hour: u32) -> bool {
        if self.start <= self.end {
            hour >= self.start && hour < self.end
        } else {
            hour >= self.start || hour < self.end
        }
    }
}

/// Structured form of a doctor's declared availability. `hours: None` means
/// only the day of week restricts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeeklySchedule {
    pub days: BTreeSet<DayOfWeek>,
    pub hours: Option<HourRange>,
}

impl WeeklySchedule {
    pub fn is_empty(&self) -> bool {
        self.days.is_empty()
    }
}

// ==============================================================================
// DOCTOR
// ==============================================================================

/// Doctor row as stored. Only used to build `Doctor`.
#[derive(Debug, Clone, Deserialize)]
pub struct DoctorRecord {
    pub id: Uuid,
    pub user_id: Uuid,
    pub dept_id: Option<Uuid>,
    pub specialization: Option<String>,
    pub availability: Option<String>,
    pub available_slots: Option<Vec<i32>>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(from = "DoctorRecord")]
pub struct Doctor {
    pub id: Uuid,
    pub user_id: Uuid,
    pub dept_id: Option<Uuid>,
    pub specialization: Option<String>,
    /// The declaration text as entered; kept for display only.
    pub availability: Option<String>,
    pub schedule: WeeklySchedule,
    /// Remaining weekday capacity, Sunday first.
    pub available_slots: Option<[i32; 7]>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl From<DoctorRecord> for Doctor {
    fn from(record: DoctorRecord) -> Self {
        let schedule = record
            .availability
            .as_deref()
            .map(parse_availability)
            .unwrap_or_default();

        let available_slots = match record.available_slots {
            Some(slots) => match <[i32; 7]>::try_from(slots) {
                Ok(counters) => Some(counters),
                Err(slots) => {
                    warn!("Doctor {} has {} capacity counters, expected 7; ignoring", record.id, slots.len());
                    None
                }
            },
            None => None,
        };

        Self {
            id: record.id,
            user_id: record.user_id,
            dept_id: record.dept_id,
            specialization: record.specialization,
            availability: record.availability,
            schedule,
            available_slots,
            created_at: record.created_at,
            updated_at: record.updated_at,
        }
    }
}

impl Doctor {
    pub fn remaining_capacity(&self, day: DayOfWeek) -> Option<i32> {
        self.available_slots.map(|slots| slots[day.index()])
    }
}

// ==============================================================================
// QUERIES AND ERRORS
// ==============================================================================

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AvailableDoctorsQuery {
    pub specialization: Option<String>,
    /// `YYYY-MM-DD` checks the weekday only; a value with a time component
    /// also checks the hour.
    pub date: Option<String>,
}

#[derive(Error, Debug)]
pub enum DoctorError {
    #[error("Doctor not found")]
    NotFound,

    #[error("Database error: {0}")]
    DatabaseError(String),
}
