use std::collections::HashMap;

use chrono::Utc;
use reqwest::Method;
use serde_json::{json, Value};
use tracing::{debug, info};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::SupabaseClient;
use shared_models::auth::{Role, User};

use crate::models::{DirectoryError, Patient};

/// Identity/role resolver and patient directory.
///
/// The practice has exactly one practitioner; assistants operate on the
/// practitioner's calendar, admins and the practitioner on their own.
pub struct DirectoryService {
    db: SupabaseClient,
}

impl DirectoryService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            db: SupabaseClient::new(config),
        }
    }

    /// The sole active practitioner record.
    pub async fn practice_owner_id(&self, auth_token: &str) -> Result<Uuid, DirectoryError> {
        let path = "/rest/v1/users?role=eq.psychologist&is_active=eq.true&select=id&limit=1";

        let rows: Vec<Value> = self
            .db
            .request(Method::GET, path, Some(auth_token), None)
            .await?;

        let id = rows
            .first()
            .and_then(|row| row.get("id"))
            .and_then(|v| v.as_str())
            .and_then(|s| Uuid::parse_str(s).ok())
            .ok_or(DirectoryError::MissingOwner)?;

        Ok(id)
    }

    /// Resolve whose calendar a request targets: assistants delegate to the
    /// practitioner, everyone else owns their own calendar.
    pub async fn resolve_calendar_owner(
        &self,
        user: &User,
        auth_token: &str,
    ) -> Result<Uuid, DirectoryError> {
        match user.role {
            Role::Assistant => self.practice_owner_id(auth_token).await,
            _ => Ok(user.id),
        }
    }

    /// Fetch an active patient the caller is allowed to see.
    ///
    /// admin: any active patient; psychologist: own patients; assistant:
    /// the practitioner's patients plus the ones the assistant registered.
    pub async fn accessible_patient(
        &self,
        user: &User,
        patient_id: Uuid,
        auth_token: &str,
    ) -> Result<Patient, DirectoryError> {
        let mut query_parts = vec![
            format!("id=eq.{}", patient_id),
            "is_active=eq.true".to_string(),
        ];

        match user.role {
            Role::Admin => {}
            Role::Psychologist => {
                query_parts.push(format!("user_id=eq.{}", user.id));
            }
            Role::Assistant => {
                let owner_id = self.practice_owner_id(auth_token).await?;
                query_parts.push(format!("user_id=in.({},{})", owner_id, user.id));
            }
        }

        let path = format!("/rest/v1/patients?{}", query_parts.join("&"));
        let rows: Vec<Patient> = self
            .db
            .request(Method::GET, &path, Some(auth_token), None)
            .await?;

        rows.into_iter()
            .next()
            .ok_or_else(|| DirectoryError::NotFound("patient not found or not accessible".to_string()))
    }

    /// Display names for a set of patient ids, used to decorate appointment
    /// responses. Inactive patients keep their name for historical rows.
    pub async fn patient_names(
        &self,
        patient_ids: &[Uuid],
        auth_token: &str,
    ) -> Result<HashMap<Uuid, String>, DirectoryError> {
        if patient_ids.is_empty() {
            return Ok(HashMap::new());
        }

        let ids = patient_ids
            .iter()
            .map(|id| id.to_string())
            .collect::<Vec<_>>()
            .join(",");
        let path = format!("/rest/v1/patients?id=in.({})&select=id,full_name", ids);

        let rows: Vec<Value> = self
            .db
            .request(Method::GET, &path, Some(auth_token), None)
            .await?;

        let mut names = HashMap::new();
        for row in rows {
            if let (Some(id), Some(name)) = (
                row.get("id")
                    .and_then(|v| v.as_str())
                    .and_then(|s| Uuid::parse_str(s).ok()),
                row.get("full_name").and_then(|v| v.as_str()),
            ) {
                names.insert(id, name.to_string());
            }
        }

        Ok(names)
    }

    /// Soft-delete a patient and everything hanging off them: active
    /// appointments are force-cancelled (status AND is_active change) and
    /// active notes are deactivated. One logical cascade; storage-level
    /// cascades cannot express the status change.
    pub async fn deactivate_patient_cascade(
        &self,
        user: &User,
        patient_id: Uuid,
        auth_token: &str,
    ) -> Result<(), DirectoryError> {
        let patient = self.accessible_patient(user, patient_id, auth_token).await?;
        let now = Utc::now();

        debug!("Deactivating patient {} and related records", patient.id);

        let stamp = json!({
            "is_active": false,
            "updated_by": user.id,
            "updated_at": now.to_rfc3339(),
        });

        let _: Vec<Value> = self
            .db
            .patch_returning(
                &format!("/rest/v1/patients?id=eq.{}", patient.id),
                auth_token,
                stamp.clone(),
            )
            .await?;

        let cancelled: Vec<Value> = self
            .db
            .patch_returning(
                &format!(
                    "/rest/v1/appointments?patient_id=eq.{}&is_active=eq.true",
                    patient.id
                ),
                auth_token,
                json!({
                    "is_active": false,
                    "status": "cancelled",
                    "updated_by": user.id,
                    "updated_at": now.to_rfc3339(),
                }),
            )
            .await?;

        let _: Vec<Value> = self
            .db
            .patch_returning(
                &format!(
                    "/rest/v1/notes?patient_id=eq.{}&is_active=eq.true",
                    patient.id
                ),
                auth_token,
                stamp,
            )
            .await?;

        info!(
            "Patient {} deactivated, {} appointments force-cancelled",
            patient.id,
            cancelled.len()
        );

        Ok(())
    }
}
