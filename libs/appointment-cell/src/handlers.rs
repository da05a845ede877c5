use axum::{
    extract::{rejection::JsonRejection, Extension, Path, Query, State},
    http::StatusCode,
    Json,
};
use axum_extra::TypedHeader;
use headers::{Authorization, authorization::Bearer};
use serde_json::{json, Value};
use tracing::debug;
use uuid::Uuid;

use shared_models::auth::{Role, User};
use shared_models::error::AppError;
use shared_utils::extractor::require_role;

use crate::models::{
    AppointmentError, AppointmentResponse, BookAppointmentRequest, DaySlotsQuery,
};
use crate::router::AppointmentState;
use crate::services::booking::AppointmentBookingService;
use crate::services::lifecycle::AppointmentLifecycleService;

impl From<AppointmentError> for AppError {
    fn from(err: AppointmentError) -> Self {
        let message = err.to_string();
        match err {
            AppointmentError::ValidationError(_)
            | AppointmentError::DoctorNotAvailable(_) => AppError::ValidationError(message),
            AppointmentError::NotFound
            | AppointmentError::DoctorNotFound
            | AppointmentError::PatientNotFound => AppError::NotFound(message),
            AppointmentError::SlotTaken => AppError::SlotTaken(message),
            AppointmentError::NoCapacity(_) => AppError::NoCapacity(message),
            AppointmentError::Conflict(_)
            | AppointmentError::InvalidStatusTransition(_) => AppError::Conflict(message),
            AppointmentError::AlreadyCancelled => AppError::AlreadyCancelled(message),
            AppointmentError::NotAuthorized => AppError::Forbidden(message),
            AppointmentError::DatabaseError(msg)
            | AppointmentError::StorageTimeout(msg) => AppError::Database(msg),
        }
    }
}

fn user_uuid(user: &User) -> Result<Uuid, AppError> {
    Uuid::parse_str(&user.id)
        .map_err(|_| AppError::Auth("Token subject is not a valid user id".to_string()))
}

fn booking_service(state: &AppointmentState, token: &str) -> AppointmentBookingService {
    AppointmentBookingService::new(state.store_for(token), &state.config)
}

fn lifecycle_service(state: &AppointmentState, token: &str) -> AppointmentLifecycleService {
    AppointmentLifecycleService::new(state.store_for(token), &state.config)
}

// ==============================================================================
// SLOTS AND BOOKING
// ==============================================================================

#[axum::debug_handler]
pub async fn get_day_slots(
    State(state): State<AppointmentState>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Path(doctor_id): Path<Uuid>,
    Query(query): Query<DaySlotsQuery>,
) -> Result<Json<Value>, AppError> {
    let date = query
        .date
        .ok_or_else(|| AppError::ValidationError("date query parameter is required".to_string()))?;

    let day = booking_service(&state, auth.token())
        .get_slots_for_day(doctor_id, &date)
        .await?;

    Ok(Json(json!({
        "success": true,
        "data": day
    })))
}

#[axum::debug_handler]
pub async fn book_appointment(
    State(state): State<AppointmentState>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    payload: Result<Json<BookAppointmentRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let role = require_role(&user, &[Role::Patient, Role::Admin])?;
    let Json(request) = payload.map_err(|rejection| AppError::ValidationError(rejection.body_text()))?;

    // Patients book for themselves; admins must say for whom.
    let patient_id = match role {
        Role::Admin => request.patient_id.ok_or_else(|| {
            AppError::ValidationError("patient_id is required when booking as admin".to_string())
        })?,
        _ => {
            let self_id = user_uuid(&user)?;
            if request.patient_id.is_some_and(|id| id != self_id) {
                return Err(AppError::Forbidden("Patients can only book for themselves".to_string()));
            }
            self_id
        }
    };

    let appointment = booking_service(&state, auth.token())
        .book_appointment(patient_id, request)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "data": AppointmentResponse::from(appointment),
            "message": "Appointment booked"
        })),
    ))
}

// ==============================================================================
// LIFECYCLE
// ==============================================================================

#[axum::debug_handler]
pub async fn cancel_appointment(
    State(state): State<AppointmentState>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Path(appointment_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    require_role(&user, &[Role::Patient])?;

    let appointment = lifecycle_service(&state, auth.token())
        .cancel(appointment_id, &user.id)
        .await?;

    Ok(Json(json!({
        "success": true,
        "data": AppointmentResponse::from(appointment),
        "message": "Appointment cancelled"
    })))
}

#[axum::debug_handler]
pub async fn complete_appointment(
    State(state): State<AppointmentState>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Path(appointment_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let role = require_role(&user, &[Role::Doctor, Role::Admin])?;
    let acting_doctor = (role == Role::Doctor).then_some(user.id.as_str());

    let appointment = lifecycle_service(&state, auth.token())
        .complete(appointment_id, acting_doctor)
        .await?;

    Ok(Json(json!({
        "success": true,
        "data": AppointmentResponse::from(appointment),
        "message": "Appointment completed"
    })))
}

// ==============================================================================
// LOOKUPS
// ==============================================================================

#[axum::debug_handler]
pub async fn get_appointment(
    State(state): State<AppointmentState>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Path(appointment_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let role = require_role(&user, &[Role::Patient, Role::Doctor, Role::Admin])?;
    let service = booking_service(&state, auth.token());

    let appointment = service.get_appointment(appointment_id).await?;

    let allowed = match role {
        Role::Admin => true,
        Role::Patient => appointment.is_owned_by(&user.id),
        Role::Doctor => {
            let doctor = service.get_doctor(appointment.doctor_id).await?;
            doctor.user_id.to_string() == user.id
        }
    };
    if !allowed {
        debug!("User {} denied access to appointment {}", user.id, appointment_id);
        return Err(AppError::Forbidden("Not authorized to view this appointment".to_string()));
    }

    Ok(Json(json!({
        "success": true,
        "data": AppointmentResponse::from(appointment)
    })))
}

#[axum::debug_handler]
pub async fn get_patient_appointments(
    State(state): State<AppointmentState>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Path(patient_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let role = require_role(&user, &[Role::Patient, Role::Admin])?;
    if role == Role::Patient && user_uuid(&user)? != patient_id {
        return Err(AppError::Forbidden("Patients can only list their own appointments".to_string()));
    }

    let appointments: Vec<AppointmentResponse> = booking_service(&state, auth.token())
        .list_patient_appointments(patient_id)
        .await?
        .into_iter()
        .map(AppointmentResponse::from)
        .collect();

    Ok(Json(json!({
        "success": true,
        "data": appointments,
        "total": appointments.len()
    })))
}

#[axum::debug_handler]
pub async fn get_doctor_appointments(
    State(state): State<AppointmentState>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Path(doctor_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let role = require_role(&user, &[Role::Doctor, Role::Admin])?;
    let service = booking_service(&state, auth.token());

    if role == Role::Doctor {
        let doctor = service.get_doctor(doctor_id).await?;
        if doctor.user_id.to_string() != user.id {
            return Err(AppError::Forbidden("Doctors can only list their own appointments".to_string()));
        }
    }

    let appointments: Vec<AppointmentResponse> = service
        .list_doctor_appointments(doctor_id)
        .await?
        .into_iter()
        .map(AppointmentResponse::from)
        .collect();

    Ok(Json(json!({
        "success": true,
        "data": appointments,
        "total": appointments.len()
    })))
}
