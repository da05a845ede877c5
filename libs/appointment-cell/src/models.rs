use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use uuid::Uuid;

use doctor_cell::models::DayOfWeek;

use crate::services::calendar::slot_label;

// ==============================================================================
// CORE APPOINTMENT MODELS
// ==============================================================================

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum AppointmentStatus {
    Booked,
    Cancelled,
    Completed,
}

impl fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppointmentStatus::Booked => write!(f, "BOOKED"),
            AppointmentStatus::Cancelled => write!(f, "CANCELLED"),
            AppointmentStatus::Completed => write!(f, "COMPLETED"),
        }
    }
}

/// When an appointment takes place. A deployment only ever writes one shape;
/// rows of the other shape carry nulls in these columns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum BookingKey {
    DaySlot { date: String, slot: u8 },
    Weekday { appointment_day: DayOfWeek },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Appointment {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub doctor_id: Uuid,
    #[serde(flatten)]
    pub key: BookingKey,
    pub status: AppointmentStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub cancelled_at: Option<DateTime<Utc>>,
}

impl Appointment {
    pub fn new(patient_id: Uuid, doctor_id: Uuid, key: BookingKey) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            patient_id,
            doctor_id,
            key,
            status: AppointmentStatus::Booked,
            created_at: now,
            updated_at: now,
            cancelled_at: None,
        }
    }

    pub fn slot(&self) -> Option<u8> {
        match self.key {
            BookingKey::DaySlot { slot, .. } => Some(slot),
            BookingKey::Weekday { .. } => None,
        }
    }

    pub fn weekday(&self) -> Option<DayOfWeek> {
        match self.key {
            BookingKey::Weekday { appointment_day } => Some(appointment_day),
            BookingKey::DaySlot { .. } => None,
        }
    }

    pub fn time_label(&self) -> Option<&'static str> {
        self.slot().and_then(slot_label)
    }

    pub fn is_owned_by(&self, patient_id: &str) -> bool {
        self.patient_id.to_string() == patient_id
    }
}

/// Appointment as returned to clients: the stored record plus the slot's
/// clock range when there is one.
#[derive(Debug, Clone, Serialize)]
pub struct AppointmentResponse {
    #[serde(flatten)]
    pub appointment: Appointment,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time: Option<&'static str>,
}

impl From<Appointment> for AppointmentResponse {
    fn from(appointment: Appointment) -> Self {
        let time = appointment.time_label();
        Self { appointment, time }
    }
}

// ==============================================================================
// REQUEST/RESPONSE MODELS
// ==============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BookAppointmentRequest {
    pub doctor_id: Uuid,
    /// Defaults to the caller. Admins must name the patient.
    pub patient_id: Option<Uuid>,
    pub date: Option<String>,
    /// Kept loose so non-integer input is reported as a validation error.
    pub slot: Option<Value>,
    pub appointment_day: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct DaySlotsQuery {
    pub date: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SlotAvailability {
    pub slot: u8,
    pub time: &'static str,
    pub available: bool,
    pub booked_by: Option<Uuid>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DaySlots {
    pub date: String,
    pub doctor_id: Uuid,
    pub slots: Vec<SlotAvailability>,
}

// ==============================================================================
// ERRORS
// ==============================================================================

#[derive(Error, Debug)]
pub enum AppointmentError {
    #[error("{0}")]
    ValidationError(String),

    #[error("Appointment not found")]
    NotFound,

    #[error("Doctor not found")]
    DoctorNotFound,

    #[error("Patient not found")]
    PatientNotFound,

    #[error("Doctor is not available on {0}")]
    DoctorNotAvailable(DayOfWeek),

    #[error("Slot already booked for this doctor/date/slot")]
    SlotTaken,

    #[error("No remaining capacity for this doctor on {0}")]
    NoCapacity(DayOfWeek),

    #[error("{0}")]
    Conflict(String),

    #[error("Appointment is already cancelled")]
    AlreadyCancelled,

    #[error("Not authorized to modify this appointment")]
    NotAuthorized,

    #[error("Appointment cannot leave status {0}")]
    InvalidStatusTransition(AppointmentStatus),

    #[error("Database error: {0}")]
    DatabaseError(String),

    /// No answer from storage in time. The write may still have landed.
    #[error("Storage timed out: {0}")]
    StorageTimeout(String),
}
