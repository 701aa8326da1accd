pub mod availability;
pub mod blocks;
pub mod conflict;
pub mod lifecycle;
pub mod settings;
pub mod store;

pub use availability::AvailabilityService;
pub use blocks::BlockService;
pub use conflict::ConflictChecker;
pub use lifecycle::AppointmentService;
pub use settings::SettingsService;
pub use store::CalendarStore;
