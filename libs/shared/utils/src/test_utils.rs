//! Helpers shared by the cells' integration tests.

use std::sync::Arc;

use jsonwebtoken::{encode, EncodingKey, Header};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_models::auth::{JwtClaims, Role, User};

pub const TEST_JWT_SECRET: &str = "test-secret-key-for-jwt-validation-must-be-long-enough";

/// Build an `AppConfig` pointing at a mock PostgREST server.
pub fn test_config(mock_base_url: &str) -> Arc<AppConfig> {
    Arc::new(AppConfig {
        supabase_url: mock_base_url.to_string(),
        supabase_anon_key: "test-anon-key".to_string(),
        supabase_jwt_secret: TEST_JWT_SECRET.to_string(),
    })
}

#[derive(Debug, Clone)]
pub struct TestUser {
    pub id: Uuid,
    pub email: String,
    pub role: Role,
}

impl TestUser {
    pub fn new(email: &str, role: Role) -> Self {
        Self {
            id: Uuid::new_v4(),
            email: email.to_string(),
            role,
        }
    }

    pub fn admin(email: &str) -> Self {
        Self::new(email, Role::Admin)
    }

    pub fn psychologist(email: &str) -> Self {
        Self::new(email, Role::Psychologist)
    }

    pub fn assistant(email: &str) -> Self {
        Self::new(email, Role::Assistant)
    }

    pub fn to_user(&self) -> User {
        User {
            id: self.id,
            email: Some(self.email.clone()),
            role: self.role,
        }
    }
}

/// Mint an HS256 token the auth middleware will accept.
pub fn mint_token(user: &TestUser, secret: &str) -> String {
    let now = chrono::Utc::now().timestamp() as u64;
    let claims = JwtClaims {
        sub: user.id,
        role: user.role,
        email: Some(user.email.clone()),
        exp: now + 3600,
        iat: Some(now),
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .expect("failed to encode test token")
}
