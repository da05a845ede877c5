pub mod handlers;
pub mod models;
pub mod router;
pub mod services;
pub mod store;

pub use models::{Appointment, AppointmentError, AppointmentStatus, BookingKey};
pub use router::{appointment_routes, appointment_routes_with_store};
pub use store::{InMemorySchedulingStore, SchedulingStore, SupabaseSchedulingStore};
