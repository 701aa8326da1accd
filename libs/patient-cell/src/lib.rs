pub mod handlers;
pub mod models;
pub mod router;
pub mod services;

pub use models::{DirectoryError, Patient};
pub use services::DirectoryService;
