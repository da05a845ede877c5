use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Method;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, error, warn};
use uuid::Uuid;

use doctor_cell::models::{DayOfWeek, Doctor, DoctorError};
use doctor_cell::services::doctor::DoctorService;
use shared_config::AppConfig;
use shared_database::supabase::{SupabaseClient, SupabaseError};
use shared_models::auth::Role;

use crate::models::{Appointment, AppointmentError, AppointmentStatus};
use crate::store::SchedulingStore;

const APPOINTMENTS: &str = "/rest/v1/appointments";

#[derive(Debug, Deserialize)]
struct UserRow {
    role: Option<String>,
}

/// PostgREST adapter. Requests run with the caller's token so row-level
/// security applies.
pub struct SupabaseSchedulingStore {
    supabase: Arc<SupabaseClient>,
    doctors: DoctorService,
    auth_token: String,
}

impl SupabaseSchedulingStore {
    pub fn new(config: &AppConfig, auth_token: &str) -> Self {
        let supabase = Arc::new(SupabaseClient::new(config));
        Self {
            doctors: DoctorService::with_client(Arc::clone(&supabase)),
            supabase,
            auth_token: auth_token.to_string(),
        }
    }

    fn db_error(err: anyhow::Error) -> AppointmentError {
        error!("Scheduling store request failed: {}", err);
        if SupabaseError::is_timeout(&err) {
            return AppointmentError::StorageTimeout(err.to_string());
        }
        AppointmentError::DatabaseError(err.to_string())
    }

    async fn fetch_appointments(&self, path: &str) -> Result<Vec<Appointment>, AppointmentError> {
        let rows: Vec<Value> = self.supabase.request(
            Method::GET,
            path,
            Some(&self.auth_token),
            None,
        ).await.map_err(Self::db_error)?;

        rows.into_iter()
            .map(|row| {
                serde_json::from_value(row).map_err(|e| {
                    AppointmentError::DatabaseError(format!("Failed to parse appointment: {}", e))
                })
            })
            .collect()
    }
}

#[async_trait]
impl SchedulingStore for SupabaseSchedulingStore {
    async fn find_doctor(&self, doctor_id: Uuid) -> Result<Option<Doctor>, AppointmentError> {
        match self.doctors.get_doctor(doctor_id, &self.auth_token).await {
            Ok(doctor) => Ok(Some(doctor)),
            Err(DoctorError::NotFound) => Ok(None),
            Err(DoctorError::DatabaseError(msg)) => Err(AppointmentError::DatabaseError(msg)),
        }
    }

    async fn find_user_role(&self, user_id: Uuid) -> Result<Option<Role>, AppointmentError> {
        let path = format!("/rest/v1/users?id=eq.{}&select=id,role", user_id);
        let rows: Vec<UserRow> = self.supabase.request(
            Method::GET,
            &path,
            Some(&self.auth_token),
            None,
        ).await.map_err(Self::db_error)?;

        Ok(rows
            .into_iter()
            .next()
            .and_then(|row| row.role.as_deref().and_then(Role::from_claim)))
    }

    async fn find_appointment(&self, appointment_id: Uuid) -> Result<Option<Appointment>, AppointmentError> {
        let path = format!("{}?id=eq.{}", APPOINTMENTS, appointment_id);
        Ok(self.fetch_appointments(&path).await?.into_iter().next())
    }

    async fn booked_for_day(&self, doctor_id: Uuid, date: &str) -> Result<Vec<Appointment>, AppointmentError> {
        debug!("Loading booked slots for doctor {} on {}", doctor_id, date);
        let path = format!(
            "{}?doctor_id=eq.{}&date=eq.{}&status=eq.{}&order=slot.asc",
            APPOINTMENTS, doctor_id, date, AppointmentStatus::Booked
        );
        self.fetch_appointments(&path).await
    }

    async fn booked_for_weekday(&self, doctor_id: Uuid, day: DayOfWeek) -> Result<Vec<Appointment>, AppointmentError> {
        let path = format!(
            "{}?doctor_id=eq.{}&appointment_day=eq.{}&status=eq.{}",
            APPOINTMENTS, doctor_id, day, AppointmentStatus::Booked
        );
        self.fetch_appointments(&path).await
    }

    async fn insert_appointment(&self, appointment: &Appointment) -> Result<Appointment, AppointmentError> {
        let body = serde_json::to_value(appointment)
            .map_err(|e| AppointmentError::DatabaseError(format!("Failed to encode appointment: {}", e)))?;

        let rows = self.supabase
            .write_returning(Method::POST, APPOINTMENTS, Some(&self.auth_token), body)
            .await
            .map_err(|e| {
                if SupabaseError::is_unique_violation(&e) {
                    warn!("Unique slot constraint rejected appointment {}", appointment.id);
                    AppointmentError::SlotTaken
                } else {
                    Self::db_error(e)
                }
            })?;

        let row = rows.into_iter().next().ok_or_else(|| {
            AppointmentError::DatabaseError("Insert returned no rows".to_string())
        })?;

        serde_json::from_value(row)
            .map_err(|e| AppointmentError::DatabaseError(format!("Failed to parse appointment: {}", e)))
    }

    async fn transition_status(
        &self,
        appointment_id: Uuid,
        from: AppointmentStatus,
        to: AppointmentStatus,
        at: DateTime<Utc>,
    ) -> Result<Option<Appointment>, AppointmentError> {
        let path = format!("{}?id=eq.{}&status=eq.{}", APPOINTMENTS, appointment_id, from);

        let mut update = json!({
            "status": to,
            "updated_at": at,
        });
        if to == AppointmentStatus::Cancelled {
            update["cancelled_at"] = json!(at);
        }

        let rows = self.supabase
            .write_returning(Method::PATCH, &path, Some(&self.auth_token), update)
            .await
            .map_err(Self::db_error)?;

        rows.into_iter()
            .next()
            .map(|row| {
                serde_json::from_value(row).map_err(|e| {
                    AppointmentError::DatabaseError(format!("Failed to parse appointment: {}", e))
                })
            })
            .transpose()
    }

    async fn claim_weekday_capacity(&self, doctor_id: Uuid, day: DayOfWeek) -> Result<bool, AppointmentError> {
        debug!("Claiming capacity for doctor {} on {}", doctor_id, day);
        self.supabase
            .rpc(
                "claim_weekday_capacity",
                Some(&self.auth_token),
                json!({ "p_doctor_id": doctor_id, "p_day_index": day.index() }),
            )
            .await
            .map_err(Self::db_error)
    }

    async fn release_weekday_capacity(
        &self,
        doctor_id: Uuid,
        day: DayOfWeek,
        max: i32,
    ) -> Result<bool, AppointmentError> {
        debug!("Releasing capacity for doctor {} on {}", doctor_id, day);
        self.supabase
            .rpc(
                "release_weekday_capacity",
                Some(&self.auth_token),
                json!({ "p_doctor_id": doctor_id, "p_day_index": day.index(), "p_max": max }),
            )
            .await
            .map_err(Self::db_error)
    }

    async fn list_for_patient(&self, patient_id: Uuid) -> Result<Vec<Appointment>, AppointmentError> {
        let path = format!("{}?patient_id=eq.{}&order=created_at.desc", APPOINTMENTS, patient_id);
        self.fetch_appointments(&path).await
    }

    async fn list_for_doctor(&self, doctor_id: Uuid) -> Result<Vec<Appointment>, AppointmentError> {
        let path = format!("{}?doctor_id=eq.{}&order=created_at.desc", APPOINTMENTS, doctor_id);
        self.fetch_appointments(&path).await
    }
}
