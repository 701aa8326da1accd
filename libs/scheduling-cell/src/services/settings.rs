use uuid::Uuid;

use shared_config::AppConfig;

use crate::models::{ClinicSettings, SchedulingError, UpdateSettingsRequest};
use crate::services::store::CalendarStore;

/// Working-hours policy for one calendar owner.
pub struct SettingsService {
    store: CalendarStore,
}

impl SettingsService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            store: CalendarStore::new(config),
        }
    }

    /// Current settings, created with defaults on first read.
    pub async fn get(
        &self,
        owner: Uuid,
        auth_token: &str,
    ) -> Result<ClinicSettings, SchedulingError> {
        self.store.get_settings(owner, auth_token).await
    }

    pub async fn update(
        &self,
        owner: Uuid,
        update: UpdateSettingsRequest,
        auth_token: &str,
    ) -> Result<ClinicSettings, SchedulingError> {
        if update.start_time >= update.end_time {
            return Err(SchedulingError::Validation(
                "start_time must be before end_time".to_string(),
            ));
        }

        self.store.update_settings(owner, &update, auth_token).await
    }
}
