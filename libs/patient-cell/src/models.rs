use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use shared_models::error::AppError;

/// Patient directory record. The scheduling engine only needs existence,
/// calendar ownership and the display name.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Patient {
    pub id: Uuid,
    /// Calendar owner this patient belongs to.
    pub user_id: Uuid,
    pub full_name: String,
    pub is_active: bool,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Error, Debug)]
pub enum DirectoryError {
    /// No active practitioner record exists to delegate to. This is a
    /// deployment fault, not a user error.
    #[error("no active user with role 'psychologist' exists")]
    MissingOwner,

    #[error("{0}")]
    NotFound(String),

    #[error("database error: {0}")]
    Database(String),
}

impl From<shared_database::DbError> for DirectoryError {
    fn from(e: shared_database::DbError) -> Self {
        DirectoryError::Database(e.to_string())
    }
}

impl From<DirectoryError> for AppError {
    fn from(e: DirectoryError) -> Self {
        match e {
            DirectoryError::MissingOwner => AppError::Internal(e.to_string()),
            DirectoryError::NotFound(msg) => AppError::NotFound(msg),
            DirectoryError::Database(msg) => AppError::Database(msg),
        }
    }
}
