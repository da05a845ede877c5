use std::sync::Arc;

use chrono::Utc;
use tracing::{error, info, warn};
use uuid::Uuid;

use shared_config::{AppConfig, BookingDiscipline};

use crate::models::{Appointment, AppointmentError, AppointmentStatus};
use crate::store::SchedulingStore;

/// Status changes on existing appointments. BOOKED is the only status that
/// can be left; CANCELLED and COMPLETED are terminal.
pub struct AppointmentLifecycleService {
    store: Arc<dyn SchedulingStore>,
    discipline: BookingDiscipline,
    capacity_max: i32,
}

impl AppointmentLifecycleService {
    pub fn new(store: Arc<dyn SchedulingStore>, config: &AppConfig) -> Self {
        Self {
            store,
            discipline: config.booking_discipline,
            capacity_max: config.weekday_capacity_max,
        }
    }

    pub fn validate_status_transition(
        current_status: AppointmentStatus,
        new_status: AppointmentStatus,
    ) -> Result<(), AppointmentError> {
        if !Self::get_valid_transitions(current_status).contains(&new_status) {
            warn!("Invalid status transition attempted: {} -> {}", current_status, new_status);
            return Err(AppointmentError::InvalidStatusTransition(current_status));
        }
        Ok(())
    }

    pub fn get_valid_transitions(current_status: AppointmentStatus) -> &'static [AppointmentStatus] {
        match current_status {
            AppointmentStatus::Booked => &[AppointmentStatus::Cancelled, AppointmentStatus::Completed],
            AppointmentStatus::Cancelled | AppointmentStatus::Completed => &[],
        }
    }

    /// Cancel on behalf of `requester_id`, which must be the booking patient.
    pub async fn cancel(&self, appointment_id: Uuid, requester_id: &str) -> Result<Appointment, AppointmentError> {
        info!("Cancelling appointment {} for {}", appointment_id, requester_id);

        let appointment = self
            .store
            .find_appointment(appointment_id)
            .await?
            .ok_or(AppointmentError::NotFound)?;

        if appointment.status == AppointmentStatus::Cancelled {
            return Err(AppointmentError::AlreadyCancelled);
        }
        if !appointment.is_owned_by(requester_id) {
            warn!("User {} tried to cancel appointment {} they do not own", requester_id, appointment_id);
            return Err(AppointmentError::NotAuthorized);
        }
        Self::validate_status_transition(appointment.status, AppointmentStatus::Cancelled)?;

        let cancelled = self
            .apply_transition(appointment_id, AppointmentStatus::Cancelled)
            .await?;

        if self.discipline == BookingDiscipline::WeekdayCapacity {
            if let Some(day) = cancelled.weekday() {
                match self
                    .store
                    .release_weekday_capacity(cancelled.doctor_id, day, self.capacity_max)
                    .await
                {
                    Ok(true) => {}
                    Ok(false) => warn!(
                        "Capacity for doctor {} on {} already at maximum; nothing restored",
                        cancelled.doctor_id, day
                    ),
                    Err(e) => error!(
                        "Appointment {} cancelled but capacity for doctor {} on {} was not restored: {}",
                        appointment_id, cancelled.doctor_id, day, e
                    ),
                }
            }
        }

        info!("Appointment {} cancelled", appointment_id);
        Ok(cancelled)
    }

    /// Mark a weekday appointment as attended. `acting_doctor_user` is the
    /// doctor's user id when a doctor (not an admin) is completing it.
    pub async fn complete(
        &self,
        appointment_id: Uuid,
        acting_doctor_user: Option<&str>,
    ) -> Result<Appointment, AppointmentError> {
        if self.discipline != BookingDiscipline::WeekdayCapacity {
            return Err(AppointmentError::ValidationError(
                "Completion is only tracked for weekday bookings".to_string(),
            ));
        }

        let appointment = self
            .store
            .find_appointment(appointment_id)
            .await?
            .ok_or(AppointmentError::NotFound)?;

        if let Some(user_id) = acting_doctor_user {
            let doctor = self
                .store
                .find_doctor(appointment.doctor_id)
                .await?
                .ok_or(AppointmentError::DoctorNotFound)?;
            if doctor.user_id.to_string() != user_id {
                return Err(AppointmentError::NotAuthorized);
            }
        }

        Self::validate_status_transition(appointment.status, AppointmentStatus::Completed)?;

        let completed = self
            .apply_transition(appointment_id, AppointmentStatus::Completed)
            .await?;

        info!("Appointment {} completed", appointment_id);
        Ok(completed)
    }

    /// Conditional BOOKED -> `to`. When another request got there first the
    /// row is re-read to report what it became.
    async fn apply_transition(
        &self,
        appointment_id: Uuid,
        to: AppointmentStatus,
    ) -> Result<Appointment, AppointmentError> {
        let updated = self
            .store
            .transition_status(appointment_id, AppointmentStatus::Booked, to, Utc::now())
            .await?;

        if let Some(appointment) = updated {
            return Ok(appointment);
        }

        let current = self
            .store
            .find_appointment(appointment_id)
            .await?
            .ok_or(AppointmentError::NotFound)?;

        match current.status {
            AppointmentStatus::Cancelled => Err(AppointmentError::AlreadyCancelled),
            status => Err(AppointmentError::InvalidStatusTransition(status)),
        }
    }
}
