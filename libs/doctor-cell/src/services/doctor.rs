use std::sync::Arc;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use reqwest::Method;
use serde_json::Value;
use tracing::{debug, info};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;

use crate::models::{AvailableDoctorsQuery, Doctor, DoctorError};
use crate::services::availability::is_nominally_available;

const DOCTOR_COLUMNS: &str = "id,user_id,dept_id,specialization,availability,available_slots,created_at,updated_at";

/// Target of an availability query: a bare date checks the weekday only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AvailabilityTarget {
    Day(NaiveDate),
    DayAndHour(NaiveDateTime),
}

impl AvailabilityTarget {
    /// Accepts `YYYY-MM-DD`, or a date with a `T` or space separated time.
    /// Anything else is not a usable target.
    pub fn parse(value: &str) -> Option<Self> {
        let value = value.trim();

        for format in ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M:%S", "%Y-%m-%d %H:%M"] {
            if let Ok(instant) = NaiveDateTime::parse_from_str(value, format) {
                return Some(AvailabilityTarget::DayAndHour(instant));
            }
        }

        NaiveDate::parse_from_str(value, "%Y-%m-%d")
            .ok()
            .map(AvailabilityTarget::Day)
    }

    pub fn admits(&self, doctor: &Doctor) -> bool {
        match *self {
            AvailabilityTarget::Day(date) => {
                is_nominally_available(&doctor.schedule, date.and_time(NaiveTime::MIN), false)
            }
            AvailabilityTarget::DayAndHour(instant) => {
                is_nominally_available(&doctor.schedule, instant, true)
            }
        }
    }
}

pub struct DoctorService {
    supabase: Arc<SupabaseClient>,
}

impl DoctorService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: Arc::new(SupabaseClient::new(config)),
        }
    }

    pub fn with_client(supabase: Arc<SupabaseClient>) -> Self {
        Self { supabase }
    }

    pub async fn get_doctor(&self, doctor_id: Uuid, auth_token: &str) -> Result<Doctor, DoctorError> {
        debug!("Fetching doctor: {}", doctor_id);

        let path = format!("/rest/v1/doctors?id=eq.{}&select={}", doctor_id, DOCTOR_COLUMNS);
        let result: Vec<Value> = self.supabase.request(
            Method::GET,
            &path,
            Some(auth_token),
            None,
        ).await.map_err(|e| DoctorError::DatabaseError(e.to_string()))?;

        let row = result.into_iter().next().ok_or(DoctorError::NotFound)?;

        serde_json::from_value(row)
            .map_err(|e| DoctorError::DatabaseError(format!("Failed to parse doctor: {}", e)))
    }

    /// Doctors matching `specialization` whose declaration covers `date`.
    pub async fn find_available_doctors(
        &self,
        query: &AvailableDoctorsQuery,
        auth_token: &str,
    ) -> Result<Vec<Doctor>, DoctorError> {
        debug!("Searching available doctors: {:?}", query);

        let mut path = format!("/rest/v1/doctors?select={}", DOCTOR_COLUMNS);
        if let Some(specialization) = query.specialization.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            path.push_str(&format!("&specialization=eq.{}", urlencoding::encode(specialization)));
        }

        let rows: Vec<Value> = self.supabase.request(
            Method::GET,
            &path,
            Some(auth_token),
            None,
        ).await.map_err(|e| DoctorError::DatabaseError(e.to_string()))?;

        let doctors = rows
            .into_iter()
            .map(serde_json::from_value::<Doctor>)
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| DoctorError::DatabaseError(format!("Failed to parse doctor: {}", e)))?;

        let target = query.date.as_deref().and_then(AvailabilityTarget::parse);
        let available: Vec<Doctor> = match target {
            Some(target) => doctors.into_iter().filter(|d| target.admits(d)).collect(),
            None => doctors,
        };

        info!("Found {} available doctors", available.len());
        Ok(available)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn target_parsing_distinguishes_time_component() {
        assert_eq!(
            AvailabilityTarget::parse("2025-03-10"),
            Some(AvailabilityTarget::Day(NaiveDate::from_ymd_opt(2025, 3, 10).unwrap()))
        );
        assert!(matches!(
            AvailabilityTarget::parse("2025-03-10T14:30"),
            Some(AvailabilityTarget::DayAndHour(_))
        ));
        assert!(matches!(
            AvailabilityTarget::parse("2025-03-10 09:00:00"),
            Some(AvailabilityTarget::DayAndHour(_))
        ));
        assert_eq!(AvailabilityTarget::parse("next monday"), None);
    }
}
