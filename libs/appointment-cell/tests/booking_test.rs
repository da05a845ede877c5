use std::sync::Arc;

use assert_matches::assert_matches;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use futures::future::join_all;
use serde_json::json;
use uuid::Uuid;

use appointment_cell::models::{Appointment, AppointmentError, AppointmentStatus, BookAppointmentRequest};
use appointment_cell::services::{AppointmentBookingService, SlotCalendar};
use appointment_cell::store::{InMemorySchedulingStore, SchedulingStore};
use doctor_cell::models::{DayOfWeek, Doctor};
use shared_config::BookingDiscipline;
use shared_models::auth::Role;
use shared_utils::test_utils::{MockSupabaseResponses, TestConfig};

fn doctor(availability: &str, capacity: [i32; 7]) -> Doctor {
    let mut row = MockSupabaseResponses::doctor_row(
        &Uuid::new_v4().to_string(),
        &Uuid::new_v4().to_string(),
        availability,
    );
    row["available_slots"] = json!(capacity);
    serde_json::from_value(row).unwrap()
}

fn slot_service(store: Arc<InMemorySchedulingStore>) -> AppointmentBookingService {
    let config = TestConfig::default().to_app_config();
    AppointmentBookingService::new(store, &config)
        .with_calendar(SlotCalendar::fixed(NaiveDate::from_ymd_opt(2025, 3, 10).unwrap()))
}

fn weekday_service(store: Arc<dyn SchedulingStore>) -> AppointmentBookingService {
    let config = TestConfig::default()
        .discipline(BookingDiscipline::WeekdayCapacity)
        .to_app_config();
    AppointmentBookingService::new(store, &config)
}

fn patient(store: &InMemorySchedulingStore) -> Uuid {
    let id = Uuid::new_v4();
    store.add_user(id, Role::Patient);
    id
}

fn slot_request(doctor_id: Uuid, date: &str, slot: u8) -> BookAppointmentRequest {
    BookAppointmentRequest {
        doctor_id,
        date: Some(date.to_string()),
        slot: Some(json!(slot)),
        ..Default::default()
    }
}

fn weekday_request(doctor_id: Uuid, day: &str) -> BookAppointmentRequest {
    BookAppointmentRequest {
        doctor_id,
        appointment_day: Some(day.to_string()),
        ..Default::default()
    }
}

/// Commits every insert, then reports a timeout as if the reply was lost.
struct LostInsertReply {
    inner: Arc<InMemorySchedulingStore>,
}

#[async_trait]
impl SchedulingStore for LostInsertReply {
    async fn find_doctor(&self, doctor_id: Uuid) -> Result<Option<Doctor>, AppointmentError> {
        self.inner.find_doctor(doctor_id).await
    }

    async fn find_user_role(&self, user_id: Uuid) -> Result<Option<Role>, AppointmentError> {
        self.inner.find_user_role(user_id).await
    }

    async fn find_appointment(&self, appointment_id: Uuid) -> Result<Option<Appointment>, AppointmentError> {
        self.inner.find_appointment(appointment_id).await
    }

    async fn booked_for_day(&self, doctor_id: Uuid, date: &str) -> Result<Vec<Appointment>, AppointmentError> {
        self.inner.booked_for_day(doctor_id, date).await
    }

    async fn booked_for_weekday(&self, doctor_id: Uuid, day: DayOfWeek) -> Result<Vec<Appointment>, AppointmentError> {
        self.inner.booked_for_weekday(doctor_id, day).await
    }

    async fn insert_appointment(&self, appointment: &Appointment) -> Result<Appointment, AppointmentError> {
        self.inner.insert_appointment(appointment).await?;
        Err(AppointmentError::StorageTimeout("operation timed out".to_string()))
    }

    async fn transition_status(
        &self,
        appointment_id: Uuid,
        from: AppointmentStatus,
        to: AppointmentStatus,
        at: DateTime<Utc>,
    ) -> Result<Option<Appointment>, AppointmentError> {
        self.inner.transition_status(appointment_id, from, to, at).await
    }

    async fn claim_weekday_capacity(&self, doctor_id: Uuid, day: DayOfWeek) -> Result<bool, AppointmentError> {
        self.inner.claim_weekday_capacity(doctor_id, day).await
    }

    async fn release_weekday_capacity(
        &self,
        doctor_id: Uuid,
        day: DayOfWeek,
        max: i32,
    ) -> Result<bool, AppointmentError> {
        self.inner.release_weekday_capacity(doctor_id, day, max).await
    }

    async fn list_for_patient(&self, patient_id: Uuid) -> Result<Vec<Appointment>, AppointmentError> {
        self.inner.list_for_patient(patient_id).await
    }

    async fn list_for_doctor(&self, doctor_id: Uuid) -> Result<Vec<Appointment>, AppointmentError> {
        self.inner.list_for_doctor(doctor_id).await
    }
}

#[tokio::test]
async fn test_slot_booking_then_slot_taken() {
    let store = Arc::new(InMemorySchedulingStore::new());
    let doc = doctor("MON-FRI", [0, 2, 2, 2, 2, 2, 0]);
    let doctor_id = doc.id;
    store.add_doctor(doc);
    let first = patient(&store);
    let second = patient(&store);

    let service = slot_service(store.clone());

    let booked = service
        .book_appointment(first, slot_request(doctor_id, "2025-03-10", 3))
        .await
        .unwrap();
    assert_eq!(booked.status, AppointmentStatus::Booked);
    assert_eq!(booked.slot(), Some(3));
    assert_eq!(booked.time_label(), Some("13:00-14:00"));

    let again = service
        .book_appointment(second, slot_request(doctor_id, "2025-03-10", 3))
        .await;
    assert_matches!(again, Err(AppointmentError::SlotTaken));
    assert_eq!(store.appointments().len(), 1);
}

#[tokio::test]
async fn test_day_slots_lists_all_eight_in_order() {
    let store = Arc::new(InMemorySchedulingStore::new());
    let doc = doctor("MON-FRI", [0, 2, 2, 2, 2, 2, 0]);
    let doctor_id = doc.id;
    store.add_doctor(doc);
    let holder = patient(&store);

    let service = slot_service(store.clone());
    service
        .book_appointment(holder, slot_request(doctor_id, "2025-03-12", 5))
        .await
        .unwrap();

    let day = service.get_slots_for_day(doctor_id, "2025-03-12").await.unwrap();

    assert_eq!(day.slots.len(), 8);
    assert!(day.slots.iter().enumerate().all(|(i, s)| s.slot as usize == i));
    assert_eq!(day.slots[0].time, "10:00-11:00");
    assert_eq!(day.slots[7].time, "17:00-18:00");

    let taken: Vec<_> = day.slots.iter().filter(|s| !s.available).collect();
    assert_eq!(taken.len(), 1);
    assert_eq!(taken[0].slot, 5);
    assert_eq!(taken[0].booked_by, Some(holder));
}

#[tokio::test]
async fn test_day_slots_for_unknown_doctor() {
    let store = Arc::new(InMemorySchedulingStore::new());
    let service = slot_service(store);

    let result = service.get_slots_for_day(Uuid::new_v4(), "2025-03-12").await;
    assert_matches!(result, Err(AppointmentError::DoctorNotFound));
}

#[tokio::test]
async fn test_cancelled_slot_can_be_booked_again() {
    let store = Arc::new(InMemorySchedulingStore::new().with_unique_slot_index());
    let doc = doctor("MON-FRI", [0, 2, 2, 2, 2, 2, 0]);
    let doctor_id = doc.id;
    store.add_doctor(doc);
    let first = patient(&store);
    let second = patient(&store);

    let config = TestConfig::default().to_app_config();
    let service = slot_service(store.clone());
    let lifecycle = appointment_cell::services::AppointmentLifecycleService::new(store.clone(), &config);

    let booked = service
        .book_appointment(first, slot_request(doctor_id, "2025-03-10", 0))
        .await
        .unwrap();
    lifecycle.cancel(booked.id, &first.to_string()).await.unwrap();

    let rebooked = service
        .book_appointment(second, slot_request(doctor_id, "2025-03-10", 0))
        .await
        .unwrap();
    assert_eq!(rebooked.patient_id, second);
}

#[tokio::test]
async fn test_unknown_patient_is_rejected() {
    let store = Arc::new(InMemorySchedulingStore::new());
    let doc = doctor("MON-FRI", [0, 2, 2, 2, 2, 2, 0]);
    let doctor_id = doc.id;
    store.add_doctor(doc);

    // Registered, but not as a patient
    let staff = Uuid::new_v4();
    store.add_user(staff, Role::Doctor);

    let service = slot_service(store.clone());
    let result = service
        .book_appointment(staff, slot_request(doctor_id, "2025-03-10", 1))
        .await;
    assert_matches!(result, Err(AppointmentError::PatientNotFound));

    let result = service
        .book_appointment(Uuid::new_v4(), slot_request(doctor_id, "2025-03-10", 1))
        .await;
    assert_matches!(result, Err(AppointmentError::PatientNotFound));
    assert!(store.appointments().is_empty());
}

#[tokio::test]
async fn test_concurrent_slot_bookings_without_unique_index() {
    let store = Arc::new(InMemorySchedulingStore::new());
    let doc = doctor("MON-FRI", [0, 2, 2, 2, 2, 2, 0]);
    let doctor_id = doc.id;
    store.add_doctor(doc);
    let patients: Vec<Uuid> = (0..5).map(|_| patient(&store)).collect();

    let service = slot_service(store.clone());
    let results = join_all(
        patients
            .iter()
            .map(|p| service.book_appointment(*p, slot_request(doctor_id, "2025-03-11", 2))),
    )
    .await;

    let successes = results.iter().filter(|r| r.is_ok()).count();
    assert!(successes >= 1);
    assert!(results
        .iter()
        .filter_map(|r| r.as_ref().err())
        .all(|e| matches!(e, AppointmentError::SlotTaken)));
    assert_eq!(store.appointments().len(), successes);
}

#[tokio::test]
async fn test_concurrent_slot_bookings_with_unique_index() {
    let store = Arc::new(InMemorySchedulingStore::new().with_unique_slot_index());
    let doc = doctor("MON-FRI", [0, 2, 2, 2, 2, 2, 0]);
    let doctor_id = doc.id;
    store.add_doctor(doc);
    let patients: Vec<Uuid> = (0..5).map(|_| patient(&store)).collect();

    let service = slot_service(store.clone());
    let results = join_all(
        patients
            .iter()
            .map(|p| service.book_appointment(*p, slot_request(doctor_id, "2025-03-11", 2))),
    )
    .await;

    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
    assert_eq!(
        results
            .iter()
            .filter(|r| matches!(r, Err(AppointmentError::SlotTaken)))
            .count(),
        4
    );
    assert_eq!(store.appointments().len(), 1);
}

#[tokio::test]
async fn test_weekday_booking_claims_capacity() {
    let store = Arc::new(InMemorySchedulingStore::new());
    let doc = doctor("MON-FRI", [0, 2, 2, 2, 2, 2, 0]);
    let doctor_id = doc.id;
    store.add_doctor(doc);

    let service = weekday_service(store.clone());
    let booked = service
        .book_appointment(Uuid::new_v4(), weekday_request(doctor_id, "Wednesday"))
        .await
        .unwrap();

    assert_eq!(booked.weekday(), Some(DayOfWeek::Wednesday));
    assert_eq!(booked.slot(), None);
    assert_eq!(store.doctor_capacity(doctor_id), Some([0, 2, 2, 1, 2, 2, 0]));
}

#[tokio::test]
async fn test_weekday_booking_on_day_off() {
    let store = Arc::new(InMemorySchedulingStore::new());
    let doc = doctor("MON-FRI", [0, 2, 2, 2, 2, 2, 0]);
    let doctor_id = doc.id;
    store.add_doctor(doc);

    let service = weekday_service(store.clone());
    let result = service
        .book_appointment(Uuid::new_v4(), weekday_request(doctor_id, "saturday"))
        .await;

    assert_matches!(result, Err(AppointmentError::DoctorNotAvailable(DayOfWeek::Saturday)));
    assert_eq!(store.doctor_capacity(doctor_id), Some([0, 2, 2, 2, 2, 2, 0]));
}

#[tokio::test]
async fn test_weekday_duplicate_returns_claimed_unit() {
    let store = Arc::new(InMemorySchedulingStore::new());
    let doc = doctor("MON-FRI", [0, 3, 2, 2, 2, 2, 0]);
    let doctor_id = doc.id;
    store.add_doctor(doc);
    let patient_id = Uuid::new_v4();

    let service = weekday_service(store.clone());
    service
        .book_appointment(patient_id, weekday_request(doctor_id, "monday"))
        .await
        .unwrap();

    let duplicate = service
        .book_appointment(patient_id, weekday_request(doctor_id, "monday"))
        .await;

    assert_matches!(duplicate, Err(AppointmentError::Conflict(_)));
    assert_eq!(store.doctor_capacity(doctor_id), Some([0, 2, 2, 2, 2, 2, 0]));
    assert_eq!(store.appointments().len(), 1);
}

#[tokio::test]
async fn test_concurrent_weekday_bookings_for_last_unit() {
    let store = Arc::new(InMemorySchedulingStore::new());
    let doc = doctor("MON-FRI", [0, 1, 2, 2, 2, 2, 0]);
    let doctor_id = doc.id;
    store.add_doctor(doc);

    let service = weekday_service(store.clone());
    let results = join_all([
        service.book_appointment(Uuid::new_v4(), weekday_request(doctor_id, "monday")),
        service.book_appointment(Uuid::new_v4(), weekday_request(doctor_id, "monday")),
    ])
    .await;

    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
    assert_eq!(
        results
            .iter()
            .filter(|r| matches!(r, Err(AppointmentError::NoCapacity(DayOfWeek::Monday))))
            .count(),
        1
    );

    let booked: Vec<_> = store
        .appointments()
        .into_iter()
        .filter(|a| a.status == AppointmentStatus::Booked)
        .collect();
    assert_eq!(booked.len(), 1);
    assert_eq!(store.doctor_capacity(doctor_id).map(|c| c[1]), Some(0));
}

#[tokio::test]
async fn test_weekday_is_conflict_for_any_second_patient() {
    let store = Arc::new(InMemorySchedulingStore::new());
    let doc = doctor("MON-FRI", [0, 3, 2, 2, 2, 2, 0]);
    let doctor_id = doc.id;
    store.add_doctor(doc);

    let service = weekday_service(store.clone());
    service
        .book_appointment(Uuid::new_v4(), weekday_request(doctor_id, "monday"))
        .await
        .unwrap();

    let other = service
        .book_appointment(Uuid::new_v4(), weekday_request(doctor_id, "monday"))
        .await;

    assert_matches!(other, Err(AppointmentError::Conflict(_)));
    assert_eq!(store.doctor_capacity(doctor_id).map(|c| c[1]), Some(2));

    // Other weekdays are unaffected
    service
        .book_appointment(Uuid::new_v4(), weekday_request(doctor_id, "tuesday"))
        .await
        .unwrap();
    assert_eq!(store.doctor_capacity(doctor_id), Some([0, 2, 1, 2, 2, 2, 0]));
}

#[tokio::test]
async fn test_timed_out_insert_keeps_claimed_unit() {
    let inner = Arc::new(InMemorySchedulingStore::new());
    let doc = doctor("MON-FRI", [0, 1, 2, 2, 2, 2, 0]);
    let doctor_id = doc.id;
    inner.add_doctor(doc);

    let service = weekday_service(Arc::new(LostInsertReply { inner: inner.clone() }));
    let first = service
        .book_appointment(Uuid::new_v4(), weekday_request(doctor_id, "monday"))
        .await;
    assert_matches!(first, Err(AppointmentError::StorageTimeout(_)));
    assert_eq!(inner.doctor_capacity(doctor_id).map(|c| c[1]), Some(0));

    let second = weekday_service(inner.clone())
        .book_appointment(Uuid::new_v4(), weekday_request(doctor_id, "monday"))
        .await;
    assert_matches!(second, Err(AppointmentError::NoCapacity(DayOfWeek::Monday)));

    let booked = inner
        .appointments()
        .into_iter()
        .filter(|a| a.status == AppointmentStatus::Booked)
        .count();
    assert_eq!(booked, 1);
}
