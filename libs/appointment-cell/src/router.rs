use std::sync::Arc;

use axum::{
    Router,
    routing::{get, post, patch},
    middleware,
};

use shared_config::AppConfig;
use shared_utils::extractor::auth_middleware;

use crate::handlers;
use crate::store::{SchedulingStore, SupabaseSchedulingStore};

/// Router state. Without a shared store each request talks to Supabase with
/// the caller's own token.
#[derive(Clone)]
pub struct AppointmentState {
    pub config: Arc<AppConfig>,
    shared_store: Option<Arc<dyn SchedulingStore>>,
}

impl AppointmentState {
    pub fn store_for(&self, auth_token: &str) -> Arc<dyn SchedulingStore> {
        match &self.shared_store {
            Some(store) => Arc::clone(store),
            None => Arc::new(SupabaseSchedulingStore::new(&self.config, auth_token)),
        }
    }
}

pub fn appointment_routes(config: Arc<AppConfig>) -> Router {
    build_routes(AppointmentState { config, shared_store: None })
}

/// Same routes backed by one store for every request.
pub fn appointment_routes_with_store(config: Arc<AppConfig>, store: Arc<dyn SchedulingStore>) -> Router {
    build_routes(AppointmentState { config, shared_store: Some(store) })
}

fn build_routes(state: AppointmentState) -> Router {
    let protected_routes = Router::new()
        .route("/book", post(handlers::book_appointment))
        .route("/doctors/{doctor_id}/slots", get(handlers::get_day_slots))
        .route("/patient/{patient_id}", get(handlers::get_patient_appointments))
        .route("/doctor/{doctor_id}", get(handlers::get_doctor_appointments))
        .route("/{appointment_id}", get(handlers::get_appointment).delete(handlers::cancel_appointment))
        .route("/{appointment_id}/cancel", patch(handlers::cancel_appointment))
        .route("/{appointment_id}/complete", patch(handlers::complete_appointment))
        .layer(middleware::from_fn_with_state(state.config.clone(), auth_middleware));

    Router::new()
        .merge(protected_routes)
        .with_state(state)
}
