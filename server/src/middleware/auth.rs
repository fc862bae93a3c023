//! Bearer-token extractors. `AuthUser` admits any active account,
//! `Organizer` additionally requires the organizer role.

use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
};
use std::ops::Deref;

use crate::models::user::User;
use crate::repositories::users;
use crate::services::auth::TokenKind;
use crate::state::AppState;
use crate::utils::error::AppError;

const MISSING_CREDENTIALS: &str = "Authentication credentials were not provided";

fn bearer_token(parts: &Parts) -> Result<&str, AppError> {
    let header = parts
        .headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .ok_or_else(|| AppError::AuthError(MISSING_CREDENTIALS.to_string()))?;

    match header.strip_prefix("Bearer ") {
        Some(token) if !token.trim().is_empty() => Ok(token.trim()),
        _ => Err(AppError::AuthError(
            "Expected 'Authorization: Bearer <token>'".to_string(),
        )),
    }
}

#[derive(Debug, Clone)]
pub struct AuthUser(pub User);

impl Deref for AuthUser {
    type Target = User;

    fn deref(&self) -> &User {
        &self.0
    }
}

#[async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts)?;
        let claims = state.tokens.verify(token, TokenKind::Access)?;

        let user = users::find_by_id(&state.pool, claims.sub)
            .await?
            .filter(|u| u.is_active)
            .ok_or_else(|| AppError::AuthError("User not found or inactive".to_string()))?;

        Ok(AuthUser(user))
    }
}

/// An authenticated user with the organizer role.
#[derive(Debug, Clone)]
pub struct Organizer(pub User);

impl Deref for Organizer {
    type Target = User;

    fn deref(&self) -> &User {
        &self.0
    }
}

#[async_trait]
impl FromRequestParts<AppState> for Organizer {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let AuthUser(user) = AuthUser::from_request_parts(parts, state).await?;
        if !user.is_organizer() {
            return Err(AppError::Forbidden(
                "Only organizers can perform this action".to_string(),
            ));
        }
        Ok(Organizer(user))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    fn parts_with(header: Option<&str>) -> Parts {
        let mut builder = Request::builder().uri("/api/events");
        if let Some(value) = header {
            builder = builder.header(AUTHORIZATION, value);
        }
        builder.body(()).unwrap().into_parts().0
    }

    #[test]
    fn test_bearer_token_parsing() {
        assert_eq!(bearer_token(&parts_with(Some("Bearer abc.def"))).unwrap(), "abc.def");
        assert!(bearer_token(&parts_with(None)).is_err());
        assert!(bearer_token(&parts_with(Some("Basic Zm9vOmJhcg=="))).is_err());
        assert!(bearer_token(&parts_with(Some("Bearer "))).is_err());
    }
}
