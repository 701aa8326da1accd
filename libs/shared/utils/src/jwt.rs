use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use tracing::debug;

use shared_models::auth::{JwtClaims, User};

/// Validate an HS256 bearer token and extract the calling user.
///
/// The claims must carry a `sub` (user id), a recognized `role` and an
/// `exp`; anything else fails closed.
pub fn validate_token(token: &str, jwt_secret: &str) -> Result<User, String> {
    if jwt_secret.is_empty() {
        return Err("JWT secret is not set".to_string());
    }

    let mut validation = Validation::new(Algorithm::HS256);
    validation.validate_aud = false;

    let data = decode::<JwtClaims>(
        token,
        &DecodingKey::from_secret(jwt_secret.as_bytes()),
        &validation,
    )
    .map_err(|e| {
        debug!("Token validation failed: {}", e);
        format!("Invalid token: {}", e)
    })?;

    let claims = data.claims;
    debug!("Token validated successfully for user: {}", claims.sub);

    Ok(User {
        id: claims.sub,
        email: claims.email,
        role: claims.role,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{mint_token, TestUser};
    use shared_models::auth::Role;

    #[test]
    fn accepts_valid_token_and_extracts_role() {
        let secret = "unit-test-secret-with-enough-length";
        let test_user = TestUser::assistant("ana@example.com");
        let token = mint_token(&test_user, secret);

        let user = validate_token(&token, secret).expect("token should validate");
        assert_eq!(user.id, test_user.id);
        assert_eq!(user.role, Role::Assistant);
    }

    #[test]
    fn rejects_token_signed_with_other_secret() {
        let test_user = TestUser::admin("root@example.com");
        let token = mint_token(&test_user, "secret-a");

        assert!(validate_token(&token, "secret-b").is_err());
    }

    #[test]
    fn rejects_empty_secret() {
        assert!(validate_token("whatever", "").is_err());
    }
}
