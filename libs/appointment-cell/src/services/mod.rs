pub mod booking;
pub mod calendar;
pub mod lifecycle;

pub use booking::AppointmentBookingService;
pub use calendar::SlotCalendar;
pub use lifecycle::AppointmentLifecycleService;
