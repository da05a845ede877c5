use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, error, info, warn};
use uuid::Uuid;

use doctor_cell::models::{DayOfWeek, Doctor};
use doctor_cell::services::availability::doctor_works_on;
use shared_config::{AppConfig, BookingDiscipline};
use shared_models::auth::Role;

use crate::models::{
    Appointment, AppointmentError, BookAppointmentRequest, BookingKey, DaySlots, SlotAvailability,
};
use crate::services::calendar::{
    is_valid_date_format, is_weekday, parse_slot_index, slot_times, SlotCalendar,
};
use crate::store::SchedulingStore;

pub struct AppointmentBookingService {
    store: Arc<dyn SchedulingStore>,
    calendar: SlotCalendar,
    discipline: BookingDiscipline,
    capacity_max: i32,
}

impl AppointmentBookingService {
    pub fn new(store: Arc<dyn SchedulingStore>, config: &AppConfig) -> Self {
        Self {
            store,
            calendar: SlotCalendar::local(),
            discipline: config.booking_discipline,
            capacity_max: config.weekday_capacity_max,
        }
    }

    pub fn with_calendar(mut self, calendar: SlotCalendar) -> Self {
        self.calendar = calendar;
        self
    }

    pub fn discipline(&self) -> BookingDiscipline {
        self.discipline
    }

    // ==============================================================================
    // DAY VIEW
    // ==============================================================================

    /// All eight slots of `date` for one doctor, ascending, with who holds
    /// each booked one.
    pub async fn get_slots_for_day(&self, doctor_id: Uuid, date: &str) -> Result<DaySlots, AppointmentError> {
        if self.discipline != BookingDiscipline::DailySlot {
            return Err(AppointmentError::ValidationError(
                "Day slots are not offered for weekday bookings".to_string(),
            ));
        }

        if !is_valid_date_format(date) {
            return Err(AppointmentError::ValidationError("Invalid date format. Expected YYYY-MM-DD".to_string()));
        }
        if !is_weekday(date) {
            return Err(AppointmentError::ValidationError("Date must be a weekday (Monday-Friday)".to_string()));
        }

        self.require_doctor(doctor_id).await?;

        let booked: HashMap<u8, Uuid> = self
            .store
            .booked_for_day(doctor_id, date)
            .await?
            .into_iter()
            .filter_map(|a| a.slot().map(|slot| (slot, a.patient_id)))
            .collect();

        debug!("Doctor {} has {} booked slots on {}", doctor_id, booked.len(), date);

        let slots = slot_times()
            .map(|(slot, time)| {
                let booked_by = booked.get(&slot).copied();
                SlotAvailability {
                    slot,
                    time,
                    available: booked_by.is_none(),
                    booked_by,
                }
            })
            .collect();

        Ok(DaySlots {
            date: date.to_string(),
            doctor_id,
            slots,
        })
    }

    // ==============================================================================
    // BOOKING
    // ==============================================================================

    pub async fn book_appointment(
        &self,
        patient_id: Uuid,
        request: BookAppointmentRequest,
    ) -> Result<Appointment, AppointmentError> {
        info!(
            "Booking appointment for patient {} with doctor {} ({})",
            patient_id, request.doctor_id, self.discipline
        );

        let appointment = match self.discipline {
            BookingDiscipline::DailySlot => self.book_day_slot(patient_id, &request).await?,
            BookingDiscipline::WeekdayCapacity => self.book_weekday(patient_id, &request).await?,
        };

        info!("Appointment {} booked", appointment.id);
        Ok(appointment)
    }

    async fn book_day_slot(
        &self,
        patient_id: Uuid,
        request: &BookAppointmentRequest,
    ) -> Result<Appointment, AppointmentError> {
        let slot = request
            .slot
            .as_ref()
            .and_then(parse_slot_index)
            .ok_or_else(|| AppointmentError::ValidationError("Slot must be an integer between 0 and 7".to_string()))?;

        let date = request.date.as_deref().unwrap_or_default();
        if !is_valid_date_format(date) {
            return Err(AppointmentError::ValidationError("Invalid date format. Expected YYYY-MM-DD".to_string()));
        }
        if !is_weekday(date) {
            return Err(AppointmentError::ValidationError("Appointments only available Monday through Friday".to_string()));
        }
        if self.calendar.is_past_date(date) {
            return Err(AppointmentError::ValidationError("Cannot book appointments in the past".to_string()));
        }

        self.require_doctor(request.doctor_id).await?;
        self.require_patient(patient_id).await?;

        // Advisory only. Two bookings can both pass here; the unique slot
        // index on the table is what stops the second insert.
        let taken = self
            .store
            .booked_for_day(request.doctor_id, date)
            .await?
            .iter()
            .any(|a| a.slot() == Some(slot));
        if taken {
            warn!("Slot {} on {} already booked for doctor {}", slot, date, request.doctor_id);
            return Err(AppointmentError::SlotTaken);
        }

        let appointment = Appointment::new(
            patient_id,
            request.doctor_id,
            BookingKey::DaySlot { date: date.to_string(), slot },
        );
        self.store.insert_appointment(&appointment).await
    }

    async fn book_weekday(
        &self,
        patient_id: Uuid,
        request: &BookAppointmentRequest,
    ) -> Result<Appointment, AppointmentError> {
        let day = request
            .appointment_day
            .as_deref()
            .and_then(DayOfWeek::from_name)
            .ok_or_else(|| AppointmentError::ValidationError("Invalid appointment day".to_string()))?;

        let doctor = self.require_doctor(request.doctor_id).await?;
        if !doctor_works_on(&doctor, day) {
            return Err(AppointmentError::DoctorNotAvailable(day));
        }

        if !self.store.claim_weekday_capacity(doctor.id, day).await? {
            warn!("Doctor {} has no capacity left on {}", doctor.id, day);
            return Err(AppointmentError::NoCapacity(day));
        }

        let existing = match self.store.booked_for_weekday(doctor.id, day).await {
            Ok(existing) => existing,
            Err(e) => {
                self.release_claim(doctor.id, day).await;
                return Err(e);
            }
        };
        if !existing.is_empty() {
            self.release_claim(doctor.id, day).await;
            return Err(AppointmentError::Conflict(format!(
                "Doctor already has an appointment booked on {}",
                day
            )));
        }

        let appointment = Appointment::new(patient_id, doctor.id, BookingKey::Weekday { appointment_day: day });
        match self.store.insert_appointment(&appointment).await {
            Ok(created) => Ok(created),
            // The row may exist; giving the unit back could oversell the day.
            Err(e @ AppointmentError::StorageTimeout(_)) => {
                error!(
                    "Insert of appointment {} timed out; capacity for doctor {} on {} left claimed for reconciliation",
                    appointment.id, doctor.id, day
                );
                Err(e)
            }
            Err(e) => {
                self.release_claim(doctor.id, day).await;
                Err(e)
            }
        }
    }

    /// Give back a unit claimed by a booking that did not go through.
    async fn release_claim(&self, doctor_id: Uuid, day: DayOfWeek) {
        if let Err(e) = self.store.release_weekday_capacity(doctor_id, day, self.capacity_max).await {
            warn!("Failed to return claimed capacity for doctor {} on {}: {}", doctor_id, day, e);
        }
    }

    // ==============================================================================
    // LOOKUPS
    // ==============================================================================

    pub async fn get_appointment(&self, appointment_id: Uuid) -> Result<Appointment, AppointmentError> {
        self.store
            .find_appointment(appointment_id)
            .await?
            .ok_or(AppointmentError::NotFound)
    }

    pub async fn get_doctor(&self, doctor_id: Uuid) -> Result<Doctor, AppointmentError> {
        self.require_doctor(doctor_id).await
    }

    pub async fn list_patient_appointments(&self, patient_id: Uuid) -> Result<Vec<Appointment>, AppointmentError> {
        self.store.list_for_patient(patient_id).await
    }

    pub async fn list_doctor_appointments(&self, doctor_id: Uuid) -> Result<Vec<Appointment>, AppointmentError> {
        self.require_doctor(doctor_id).await?;
        self.store.list_for_doctor(doctor_id).await
    }

    async fn require_doctor(&self, doctor_id: Uuid) -> Result<Doctor, AppointmentError> {
        self.store
            .find_doctor(doctor_id)
            .await?
            .ok_or(AppointmentError::DoctorNotFound)
    }

    async fn require_patient(&self, patient_id: Uuid) -> Result<(), AppointmentError> {
        match self.store.find_user_role(patient_id).await? {
            Some(Role::Patient) => Ok(()),
            _ => Err(AppointmentError::PatientNotFound),
        }
    }
}
