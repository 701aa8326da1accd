pub mod handlers;
pub mod models;
pub mod permissions;
pub mod router;
pub mod schedule;
pub mod services;

pub use models::{
    Appointment, AppointmentBlock, AppointmentStatus, ClinicSettings, SchedulingError,
};
pub use schedule::TimeRange;
