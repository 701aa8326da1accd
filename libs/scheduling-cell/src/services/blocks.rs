use chrono::Utc;
use serde_json::{json, Map, Value};
use tracing::info;
use uuid::Uuid;

use patient_cell::DirectoryService;
use shared_config::AppConfig;
use shared_models::auth::{Role, User};

use crate::models::{AppointmentBlock, CreateBlockRequest, SchedulingError, UpdateBlockRequest};
use crate::permissions;
use crate::services::conflict::ConflictChecker;
use crate::services::store::CalendarStore;

/// Blocked-time registry. Blocks close a range outright, independent of
/// working hours, and only ever collide with sibling blocks.
pub struct BlockService {
    store: CalendarStore,
    directory: DirectoryService,
    checker: ConflictChecker,
}

impl BlockService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            store: CalendarStore::new(config),
            directory: DirectoryService::new(config),
            checker: ConflictChecker::new(config),
        }
    }

    async fn visible_scope(
        &self,
        user: &User,
        auth_token: &str,
    ) -> Result<Option<Uuid>, SchedulingError> {
        match user.role {
            Role::Admin => Ok(None),
            _ => Ok(Some(
                self.directory
                    .resolve_calendar_owner(user, auth_token)
                    .await?,
            )),
        }
    }

    pub async fn create(
        &self,
        user: &User,
        request: CreateBlockRequest,
        auth_token: &str,
    ) -> Result<AppointmentBlock, SchedulingError> {
        let owner = self
            .directory
            .resolve_calendar_owner(user, auth_token)
            .await?;

        self.checker
            .validate_block_candidate(owner, request.start_time, request.end_time, None, auth_token)
            .await?;

        let block = self
            .store
            .insert_block(
                json!({
                    "user_id": owner,
                    "start_time": request.start_time.to_rfc3339(),
                    "end_time": request.end_time.to_rfc3339(),
                    "reason": request.reason,
                    "is_active": true,
                    "created_by": user.id,
                }),
                auth_token,
            )
            .await?;

        info!(
            "Block {} created on calendar {} ({} - {})",
            block.id, owner, block.start_time, block.end_time
        );

        Ok(block)
    }

    pub async fn list(
        &self,
        user: &User,
        auth_token: &str,
    ) -> Result<Vec<AppointmentBlock>, SchedulingError> {
        let scope = self.visible_scope(user, auth_token).await?;
        self.store.list_active_blocks(scope, auth_token).await
    }

    pub async fn update(
        &self,
        user: &User,
        id: Uuid,
        request: UpdateBlockRequest,
        auth_token: &str,
    ) -> Result<AppointmentBlock, SchedulingError> {
        let scope = self.visible_scope(user, auth_token).await?;
        let block = self.store.get_active_block(id, scope, auth_token).await?;

        let new_start = request.start_time.unwrap_or(block.start_time);
        let new_end = request.end_time.unwrap_or(block.end_time);

        self.checker
            .validate_block_candidate(block.user_id, new_start, new_end, Some(block.id), auth_token)
            .await?;

        let mut fields = Map::new();
        if let Some(start) = request.start_time {
            fields.insert("start_time".to_string(), json!(start.to_rfc3339()));
        }
        if let Some(end) = request.end_time {
            fields.insert("end_time".to_string(), json!(end.to_rfc3339()));
        }
        if let Some(reason) = request.reason {
            fields.insert("reason".to_string(), json!(reason));
        }
        fields.insert("updated_by".to_string(), json!(user.id));
        fields.insert("updated_at".to_string(), json!(Utc::now().to_rfc3339()));

        self.store
            .patch_block(block.id, Value::Object(fields), auth_token)
            .await
    }

    /// Soft delete. Assistants may create blocks on the practitioner's
    /// behalf but may not remove them.
    pub async fn delete(
        &self,
        user: &User,
        id: Uuid,
        auth_token: &str,
    ) -> Result<AppointmentBlock, SchedulingError> {
        permissions::authorize_block_delete(user.role)?;

        let scope = self.visible_scope(user, auth_token).await?;
        let block = self.store.get_active_block(id, scope, auth_token).await?;

        let deleted = self
            .store
            .patch_block(
                block.id,
                json!({
                    "is_active": false,
                    "updated_by": user.id,
                    "updated_at": Utc::now().to_rfc3339(),
                }),
                auth_token,
            )
            .await?;

        info!("Block {} deactivated by {}", deleted.id, user.id);

        Ok(deleted)
    }
}
