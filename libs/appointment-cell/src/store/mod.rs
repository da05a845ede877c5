//! Persistence port for the booking core and its adapters.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use doctor_cell::models::{DayOfWeek, Doctor};
use shared_models::auth::Role;

use crate::models::{Appointment, AppointmentError, AppointmentStatus};

pub mod memory;
pub mod supabase;

pub use memory::InMemorySchedulingStore;
pub use supabase::SupabaseSchedulingStore;

/// Everything the booking core reads or writes. Implementations must make
/// `transition_status`, `claim_weekday_capacity` and
/// `release_weekday_capacity` single conditional writes.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SchedulingStore: Send + Sync {
    async fn find_doctor(&self, doctor_id: Uuid) -> Result<Option<Doctor>, AppointmentError>;

    async fn find_user_role(&self, user_id: Uuid) -> Result<Option<Role>, AppointmentError>;

    async fn find_appointment(&self, appointment_id: Uuid) -> Result<Option<Appointment>, AppointmentError>;

    /// `BOOKED` appointments for a doctor on a calendar date.
    async fn booked_for_day(&self, doctor_id: Uuid, date: &str) -> Result<Vec<Appointment>, AppointmentError>;

    /// `BOOKED` weekday-capacity appointments for a doctor on `day`.
    async fn booked_for_weekday(&self, doctor_id: Uuid, day: DayOfWeek) -> Result<Vec<Appointment>, AppointmentError>;

    /// Fails with `SlotTaken` when the store's uniqueness constraint rejects the row.
    async fn insert_appointment(&self, appointment: &Appointment) -> Result<Appointment, AppointmentError>;

    /// Move `appointment_id` from `from` to `to` only if it is still in `from`.
    /// `Ok(None)` means the row did not match.
    async fn transition_status(
        &self,
        appointment_id: Uuid,
        from: AppointmentStatus,
        to: AppointmentStatus,
        at: DateTime<Utc>,
    ) -> Result<Option<Appointment>, AppointmentError>;

    /// Decrement the doctor's counter for `day` if it is positive.
    /// Returns whether a unit was claimed.
    async fn claim_weekday_capacity(&self, doctor_id: Uuid, day: DayOfWeek) -> Result<bool, AppointmentError>;

    /// Increment the doctor's counter for `day` if it is below `max`.
    async fn release_weekday_capacity(
        &self,
        doctor_id: Uuid,
        day: DayOfWeek,
        max: i32,
    ) -> Result<bool, AppointmentError>;

    async fn list_for_patient(&self, patient_id: Uuid) -> Result<Vec<Appointment>, AppointmentError>;

    async fn list_for_doctor(&self, doctor_id: Uuid) -> Result<Vec<Appointment>, AppointmentError>;
}
