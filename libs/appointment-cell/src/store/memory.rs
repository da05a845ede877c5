use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use doctor_cell::models::{DayOfWeek, Doctor};
use shared_models::auth::Role;

use crate::models::{Appointment, AppointmentError, AppointmentStatus, BookingKey};
use crate::store::SchedulingStore;

#[derive(Default)]
struct State {
    doctors: HashMap<Uuid, Doctor>,
    roles: HashMap<Uuid, Role>,
    appointments: Vec<Appointment>,
}

/// Process-local store for tests and local runs. Every operation yields to
/// the runtime before touching state, so concurrent callers interleave
/// between their reads and writes the way they would against a remote store.
#[derive(Default)]
pub struct InMemorySchedulingStore {
    state: Mutex<State>,
    enforce_unique_slot: bool,
}

impl InMemorySchedulingStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject a second BOOKED row on the same (doctor, date, slot).
    pub fn with_unique_slot_index(mut self) -> Self {
        self.enforce_unique_slot = true;
        self
    }

    pub fn add_doctor(&self, doctor: Doctor) {
        self.lock().doctors.insert(doctor.id, doctor);
    }

    pub fn add_user(&self, user_id: Uuid, role: Role) {
        self.lock().roles.insert(user_id, role);
    }

    pub fn appointments(&self) -> Vec<Appointment> {
        self.lock().appointments.clone()
    }

    pub fn doctor_capacity(&self, doctor_id: Uuid) -> Option<[i32; 7]> {
        self.lock().doctors.get(&doctor_id).and_then(|d| d.available_slots)
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn booked(appointments: &[Appointment], filter: impl Fn(&Appointment) -> bool) -> Vec<Appointment> {
        appointments
            .iter()
            .filter(|a| a.status == AppointmentStatus::Booked && filter(a))
            .cloned()
            .collect()
    }

    fn newest_first(mut appointments: Vec<Appointment>) -> Vec<Appointment> {
        appointments.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        appointments
    }
}

#[async_trait]
impl SchedulingStore for InMemorySchedulingStore {
    async fn find_doctor(&self, doctor_id: Uuid) -> Result<Option<Doctor>, AppointmentError> {
        tokio::task::yield_now().await;
        Ok(self.lock().doctors.get(&doctor_id).cloned())
    }

    async fn find_user_role(&self, user_id: Uuid) -> Result<Option<Role>, AppointmentError> {
        tokio::task::yield_now().await;
        Ok(self.lock().roles.get(&user_id).copied())
    }

    async fn find_appointment(&self, appointment_id: Uuid) -> Result<Option<Appointment>, AppointmentError> {
        tokio::task::yield_now().await;
        Ok(self.lock().appointments.iter().find(|a| a.id == appointment_id).cloned())
    }

    async fn booked_for_day(&self, doctor_id: Uuid, date: &str) -> Result<Vec<Appointment>, AppointmentError> {
        tokio::task::yield_now().await;
        let state = self.lock();
        let mut booked = Self::booked(&state.appointments, |a| {
            a.doctor_id == doctor_id
                && matches!(&a.key, BookingKey::DaySlot { date: d, .. } if d == date)
        });
        booked.sort_by_key(|a| a.slot());
        Ok(booked)
    }

    async fn booked_for_weekday(&self, doctor_id: Uuid, day: DayOfWeek) -> Result<Vec<Appointment>, AppointmentError> {
        tokio::task::yield_now().await;
        let state = self.lock();
        Ok(Self::booked(&state.appointments, |a| {
            a.doctor_id == doctor_id && a.weekday() == Some(day)
        }))
    }

    async fn insert_appointment(&self, appointment: &Appointment) -> Result<Appointment, AppointmentError> {
        tokio::task::yield_now().await;
        let mut state = self.lock();

        if self.enforce_unique_slot && appointment.slot().is_some() {
            let clash = state.appointments.iter().any(|a| {
                a.status == AppointmentStatus::Booked
                    && a.doctor_id == appointment.doctor_id
                    && a.key == appointment.key
            });
            if clash {
                return Err(AppointmentError::SlotTaken);
            }
        }

        state.appointments.push(appointment.clone());
        Ok(appointment.clone())
    }

    async fn transition_status(
        &self,
        appointment_id: Uuid,
        from: AppointmentStatus,
        to: AppointmentStatus,
        at: DateTime<Utc>,
    ) -> Result<Option<Appointment>, AppointmentError> {
        tokio::task::yield_now().await;
        let mut state = self.lock();

        let Some(appointment) = state
            .appointments
            .iter_mut()
            .find(|a| a.id == appointment_id && a.status == from)
        else {
            return Ok(None);
        };

        appointment.status = to;
        appointment.updated_at = at;
        if to == AppointmentStatus::Cancelled {
            appointment.cancelled_at = Some(at);
        }
        Ok(Some(appointment.clone()))
    }

    async fn claim_weekday_capacity(&self, doctor_id: Uuid, day: DayOfWeek) -> Result<bool, AppointmentError> {
        tokio::task::yield_now().await;
        let mut state = self.lock();

        let counter = state
            .doctors
            .get_mut(&doctor_id)
            .and_then(|d| d.available_slots.as_mut())
            .map(|slots| &mut slots[day.index()]);

        match counter {
            Some(remaining) if *remaining > 0 => {
                *remaining -= 1;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn release_weekday_capacity(
        &self,
        doctor_id: Uuid,
        day: DayOfWeek,
        max: i32,
    ) -> Result<bool, AppointmentError> {
        tokio::task::yield_now().await;
        let mut state = self.lock();

        let counter = state
            .doctors
            .get_mut(&doctor_id)
            .and_then(|d| d.available_slots.as_mut())
            .map(|slots| &mut slots[day.index()]);

        match counter {
            Some(remaining) if *remaining < max => {
                *remaining += 1;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn list_for_patient(&self, patient_id: Uuid) -> Result<Vec<Appointment>, AppointmentError> {
        tokio::task::yield_now().await;
        let mine = self
            .lock()
            .appointments
            .iter()
            .filter(|a| a.patient_id == patient_id)
            .cloned()
            .collect();
        Ok(Self::newest_first(mine))
    }

    async fn list_for_doctor(&self, doctor_id: Uuid) -> Result<Vec<Appointment>, AppointmentError> {
        tokio::task::yield_now().await;
        let theirs = self
            .lock()
            .appointments
            .iter()
            .filter(|a| a.doctor_id == doctor_id)
            .cloned()
            .collect();
        Ok(Self::newest_first(theirs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doctor_with_capacity(slots: [i32; 7]) -> Doctor {
        Doctor {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            dept_id: None,
            specialization: None,
            availability: None,
            schedule: Default::default(),
            available_slots: Some(slots),
            created_at: None,
            updated_at: None,
        }
    }

    #[tokio::test]
    async fn claim_stops_at_zero_and_release_stops_at_max() {
        let store = InMemorySchedulingStore::new();
        let doctor = doctor_with_capacity([0, 1, 0, 0, 0, 0, 0]);
        let id = doctor.id;
        store.add_doctor(doctor);

        assert!(store.claim_weekday_capacity(id, DayOfWeek::Monday).await.unwrap());
        assert!(!store.claim_weekday_capacity(id, DayOfWeek::Monday).await.unwrap());
        assert!(!store.claim_weekday_capacity(id, DayOfWeek::Sunday).await.unwrap());

        assert!(store.release_weekday_capacity(id, DayOfWeek::Monday, 1).await.unwrap());
        assert!(!store.release_weekday_capacity(id, DayOfWeek::Monday, 1).await.unwrap());
        assert_eq!(store.doctor_capacity(id), Some([0, 1, 0, 0, 0, 0, 0]));
    }

    #[tokio::test]
    async fn transition_only_applies_from_expected_status() {
        let store = InMemorySchedulingStore::new();
        let appointment = Appointment::new(
            Uuid::new_v4(),
            Uuid::new_v4(),
            BookingKey::DaySlot { date: "2030-03-11".to_string(), slot: 2 },
        );
        store.insert_appointment(&appointment).await.unwrap();

        let now = Utc::now();
        let first = store
            .transition_status(appointment.id, AppointmentStatus::Booked, AppointmentStatus::Cancelled, now)
            .await
            .unwrap();
        assert_eq!(first.map(|a| a.status), Some(AppointmentStatus::Cancelled));

        let second = store
            .transition_status(appointment.id, AppointmentStatus::Booked, AppointmentStatus::Cancelled, now)
            .await
            .unwrap();
        assert!(second.is_none());
        assert_eq!(store.appointments()[0].cancelled_at, Some(now));
    }

    #[tokio::test]
    async fn unique_index_rejects_second_booked_row() {
        let store = InMemorySchedulingStore::new().with_unique_slot_index();
        let doctor_id = Uuid::new_v4();
        let key = BookingKey::DaySlot { date: "2030-03-11".to_string(), slot: 0 };

        let first = Appointment::new(Uuid::new_v4(), doctor_id, key.clone());
        store.insert_appointment(&first).await.unwrap();

        let second = Appointment::new(Uuid::new_v4(), doctor_id, key);
        let result = store.insert_appointment(&second).await;
        assert!(matches!(result, Err(AppointmentError::SlotTaken)));
    }
}
