use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::db::UserRecord;
use crate::error::AppError;

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,        // User ID
    pub email: String,
    pub username: String,
    pub full_name: String,
    pub jti: Uuid,        // Unique per token
    pub exp: i64,         // Expiration timestamp
    pub iat: i64,         // Issued at timestamp
}

fn sign(user: &UserRecord, secret: &str, expires_in_secs: i64) -> Result<String, AppError> {
    let now = Utc::now();
    let exp = Duration::try_seconds(expires_in_secs)
        .and_then(|ttl| now.checked_add_signed(ttl))
        .ok_or_else(|| {
            AppError::Unexpected(anyhow::anyhow!("token lifetime {expires_in_secs}s is out of range"))
        })?;

    let claims = Claims {
        sub: user.id,
        email: user.email.clone(),
        username: user.username.clone(),
        full_name: user.full_name.clone(),
        jti: Uuid::new_v4(),
        exp: exp.timestamp(),
        iat: now.timestamp(),
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| AppError::Unexpected(anyhow::anyhow!("Failed to create token: {}", e)))
}

pub fn create_access_token(
    user: &UserRecord,
    secret: &str,
    expires_in_secs: i64,
) -> Result<String, AppError> {
    sign(user, secret, expires_in_secs)
}

/// Same claims as the access token, signed with the refresh secret.
pub fn create_refresh_token(
    user: &UserRecord,
    secret: &str,
    expires_in_secs: i64,
) -> Result<String, AppError> {
    sign(user, secret, expires_in_secs)
}

pub fn verify_token(token: &str, secret: &str) -> Result<Claims, AppError> {
    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map_err(|e| {
        tracing::debug!("Token verification failed: {}", e);
        AppError::Unauthorized("Invalid or expired token".to_string())
    })?;

    Ok(token_data.claims)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::Password;

    fn user() -> UserRecord {
        let now = Utc::now();
        UserRecord {
            id: Uuid::new_v4(),
            username: "alice".to_string(),
            email: "a@x.com".to_string(),
            full_name: "Alice A".to_string(),
            avatar: "https://media.test/avatar.png".to_string(),
            cover_image: String::new(),
            watch_history: Vec::new(),
            password: Password::Hashed("irrelevant".to_string()),
            refresh_token: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn access_token_carries_identity_claims() {
        let user = user();
        let token = create_access_token(&user, "access", 60).unwrap();
        let claims = verify_token(&token, "access").unwrap();

        assert_eq!(claims.sub, user.id);
        assert_eq!(claims.email, "a@x.com");
        assert_eq!(claims.username, "alice");
        assert_eq!(claims.full_name, "Alice A");
    }

    #[test]
    fn out_of_range_lifetime_is_an_error() {
        assert!(create_access_token(&user(), "access", i64::MAX).is_err());
    }

    #[test]
    fn refresh_token_is_rejected_with_access_secret() {
        let token = create_refresh_token(&user(), "refresh", 600).unwrap();
        assert!(verify_token(&token, "access").is_err());
        assert!(verify_token(&token, "refresh").is_ok());
    }

    #[test]
    fn expired_token_is_rejected() {
        // Beyond the default 60s validation leeway.
        let token = create_access_token(&user(), "access", -120).unwrap();
        assert!(matches!(
            verify_token(&token, "access"),
            Err(AppError::Unauthorized(_))
        ));
    }

    #[test]
    fn consecutive_tokens_differ() {
        let user = user();
        let a = create_refresh_token(&user, "refresh", 600).unwrap();
        let b = create_refresh_token(&user, "refresh", 600).unwrap();
        assert_ne!(a, b);
    }
}
