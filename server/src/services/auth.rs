use chrono::{Duration, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::Config;
use crate::models::user::{User, UserType};
use crate::utils::error::AppError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenKind {
    Access,
    Refresh,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub email: String,
    pub user_type: UserType,
    pub token_type: TokenKind,
    pub iat: i64,
    pub exp: i64,
}

/// Issues and verifies HS256 access and refresh tokens.
#[derive(Clone)]
pub struct TokenService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    access_ttl: Duration,
    refresh_ttl: Duration,
}

impl TokenService {
    pub fn new(secret: &str, access_ttl: Duration, refresh_ttl: Duration) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            access_ttl,
            refresh_ttl,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            &config.jwt_secret,
            Duration::minutes(config.jwt_access_ttl_minutes),
            Duration::days(config.jwt_refresh_ttl_days),
        )
    }

    fn issue(&self, user: &User, kind: TokenKind) -> Result<String, AppError> {
        let now = Utc::now();
        let ttl = match kind {
            TokenKind::Access => self.access_ttl,
            TokenKind::Refresh => self.refresh_ttl,
        };
        let claims = Claims {
            sub: user.id,
            email: user.email.clone(),
            user_type: user.user_type,
            token_type: kind,
            iat: now.timestamp(),
            exp: (now + ttl).timestamp(),
        };

        encode(&Header::default(), &claims, &self.encoding_key)
            .map_err(|e| AppError::InternalServerError(format!("Failed to sign token: {}", e)))
    }

    pub fn access_token(&self, user: &User) -> Result<String, AppError> {
        self.issue(user, TokenKind::Access)
    }

    pub fn refresh_token(&self, user: &User) -> Result<String, AppError> {
        self.issue(user, TokenKind::Refresh)
    }

    /// Verifies signature, expiry and token kind.
    pub fn verify(&self, token: &str, kind: TokenKind) -> Result<Claims, AppError> {
        let data = decode::<Claims>(token, &self.decoding_key, &Validation::default()).map_err(
            |e| match e.kind() {
                ErrorKind::ExpiredSignature => AppError::AuthError("Token has expired".to_string()),
                _ => AppError::AuthError("Invalid token".to_string()),
            },
        )?;

        if data.claims.token_type != kind {
            return Err(AppError::AuthError("Invalid token type".to_string()));
        }
        Ok(data.claims)
    }
}

pub async fn hash_password(password: String) -> Result<String, AppError> {
    tokio::task::spawn_blocking(move || bcrypt::hash(password, bcrypt::DEFAULT_COST))
        .await
        .map_err(|e| AppError::InternalServerError(format!("Hashing task failed: {}", e)))?
        .map_err(|e| AppError::InternalServerError(format!("Failed to hash password: {}", e)))
}

pub async fn verify_password(password: String, hash: String) -> Result<bool, AppError> {
    tokio::task::spawn_blocking(move || bcrypt::verify(password, &hash))
        .await
        .map_err(|e| AppError::InternalServerError(format!("Hashing task failed: {}", e)))?
        .map_err(|e| AppError::InternalServerError(format!("Failed to verify password: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user() -> User {
        User {
            id: Uuid::new_v4(),
            email: "org@example.com".into(),
            password_hash: String::new(),
            first_name: "Org".into(),
            last_name: "Anizer".into(),
            user_type: UserType::Organizer,
            phone_number: None,
            organization: Some("Acme".into()),
            is_active: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn service() -> TokenService {
        TokenService::new("test-secret", Duration::minutes(60), Duration::days(7))
    }

    #[test]
    fn test_access_token_round_trip() {
        let user = user();
        let token = service().access_token(&user).unwrap();
        let claims = service().verify(&token, TokenKind::Access).unwrap();
        assert_eq!(claims.sub, user.id);
        assert_eq!(claims.user_type, UserType::Organizer);
    }

    #[test]
    fn test_refresh_token_is_not_an_access_token() {
        let token = service().refresh_token(&user()).unwrap();
        assert!(service().verify(&token, TokenKind::Access).is_err());
        assert!(service().verify(&token, TokenKind::Refresh).is_ok());
    }

    #[test]
    fn test_expired_and_foreign_tokens_are_rejected() {
        let expired = TokenService::new("test-secret", Duration::minutes(-10), Duration::days(7));
        let token = expired.access_token(&user()).unwrap();
        match service().verify(&token, TokenKind::Access) {
            Err(AppError::AuthError(msg)) => assert_eq!(msg, "Token has expired"),
            other => panic!("unexpected: {:?}", other.map(|c| c.sub)),
        }

        let foreign = TokenService::new("other", Duration::minutes(60), Duration::days(7))
            .access_token(&user())
            .unwrap();
        assert!(service().verify(&foreign, TokenKind::Access).is_err());
    }

    #[tokio::test]
    async fn test_password_hashing() {
        let hash = hash_password("correct-horse".into()).await.unwrap();
        assert!(verify_password("correct-horse".into(), hash.clone()).await.unwrap());
        assert!(!verify_password("wrong".into(), hash).await.unwrap());
    }
}
