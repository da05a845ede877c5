pub mod handlers;
pub mod router;
pub mod models;
pub mod services;

pub use models::{DayOfWeek, Doctor, DoctorError, HourRange, WeeklySchedule};
pub use services::DoctorService;
