use reqwest::{
    header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE},
    Client, Method, StatusCode,
};
use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, error};

use shared_config::AppConfig;

/// Error from a PostgREST round trip. The HTTP status is preserved so
/// callers can map commit-time constraint violations (409) onto their own
/// conflict taxonomy instead of a generic database fault.
#[derive(Error, Debug)]
pub enum DbError {
    #[error("database request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("database responded {status}: {message}")]
    Status { status: StatusCode, message: String },
}

impl DbError {
    /// True when the database rejected a write with a uniqueness/exclusion
    /// constraint violation.
    pub fn is_conflict(&self) -> bool {
        matches!(self, DbError::Status { status, .. } if *status == StatusCode::CONFLICT)
    }
}

pub struct SupabaseClient {
    client: Client,
    base_url: String,
    anon_key: String,
}

impl SupabaseClient {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            client: Client::new(),
            base_url: config.supabase_url.clone(),
            anon_key: config.supabase_anon_key.clone(),
        }
    }

    fn headers(&self, auth_token: Option<&str>, extra: Option<HeaderMap>) -> HeaderMap {
        let mut headers = extra.unwrap_or_default();

        if let Ok(key) = HeaderValue::from_str(&self.anon_key) {
            headers.insert("apikey", key);
        }
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        if let Some(token) = auth_token {
            if let Ok(bearer) = HeaderValue::from_str(&format!("Bearer {}", token)) {
                headers.insert(AUTHORIZATION, bearer);
            }
        }

        headers
    }

    pub async fn request<T>(
        &self,
        method: Method,
        path: &str,
        auth_token: Option<&str>,
        body: Option<Value>,
    ) -> Result<T, DbError>
    where
        T: DeserializeOwned,
    {
        self.request_with_headers(method, path, auth_token, body, None)
            .await
    }

    pub async fn request_with_headers<T>(
        &self,
        method: Method,
        path: &str,
        auth_token: Option<&str>,
        body: Option<Value>,
        extra_headers: Option<HeaderMap>,
    ) -> Result<T, DbError>
    where
        T: DeserializeOwned,
    {
        let url = format!("{}{}", self.base_url, path);
        debug!("Making request to {}", url);

        let mut req = self
            .client
            .request(method, &url)
            .headers(self.headers(auth_token, extra_headers));

        if let Some(body_data) = body {
            req = req.json(&body_data);
        }

        let response = req.send().await?;
        let status = response.status();

        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            error!("API error ({}): {}", status, message);
            return Err(DbError::Status { status, message });
        }

        Ok(response.json::<T>().await?)
    }

    /// POST a row and return the created representation.
    pub async fn insert_returning<T>(
        &self,
        path: &str,
        auth_token: &str,
        row: Value,
    ) -> Result<Vec<T>, DbError>
    where
        T: DeserializeOwned,
    {
        let mut headers = HeaderMap::new();
        headers.insert("Prefer", HeaderValue::from_static("return=representation"));

        self.request_with_headers(Method::POST, path, Some(auth_token), Some(row), Some(headers))
            .await
    }

    /// PATCH matching rows and return the updated representations.
    pub async fn patch_returning<T>(
        &self,
        path: &str,
        auth_token: &str,
        fields: Value,
    ) -> Result<Vec<T>, DbError>
    where
        T: DeserializeOwned,
    {
        let mut headers = HeaderMap::new();
        headers.insert("Prefer", HeaderValue::from_static("return=representation"));

        self.request_with_headers(
            Method::PATCH,
            path,
            Some(auth_token),
            Some(fields),
            Some(headers),
        )
        .await
    }
}
