use axum::{extract::State, response::IntoResponse, response::Response, Json};
use validator::Validate;

use crate::middleware::AuthUser;
use crate::models::user::{
    normalize_email, AccessToken, ChangePasswordRequest, LoginRequest, RefreshRequest,
    RegisterRequest, TokenPair, UpdateProfileRequest, UserProfile,
};
use crate::repositories::users::{self, NewUser};
use crate::services::auth::{hash_password, verify_password, TokenKind};
use crate::state::AppState;
use crate::utils::error::AppError;
use crate::utils::response::{created, empty_success, success};

const INVALID_LOGIN: &str = "Invalid email or password";

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

async fn profile_of(state: &AppState, user: &crate::models::user::User) -> Result<UserProfile, AppError> {
    let totals = users::totals(&state.pool, user).await?;
    Ok(UserProfile::new(user, totals))
}

pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> Result<Response, AppError> {
    req.validate()?;

    let email = normalize_email(&req.email);
    let password_hash = hash_password(req.password.clone()).await?;
    let user = users::insert(
        &state.pool,
        NewUser {
            email: &email,
            password_hash: &password_hash,
            first_name: req.first_name.trim(),
            last_name: req.last_name.trim(),
            user_type: req.user_type,
            phone_number: non_blank(&req.phone_number),
            organization: non_blank(&req.organization),
        },
    )
    .await?;

    tracing::info!(user_id = %user.id, user_type = ?user.user_type, "User registered");
    let profile = profile_of(&state, &user).await?;
    Ok(created(profile, "User registered successfully").into_response())
}

pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<Response, AppError> {
    req.validate()?;

    let user = users::find_by_email(&state.pool, &normalize_email(&req.email))
        .await?
        .filter(|u| u.is_active)
        .ok_or_else(|| AppError::AuthError(INVALID_LOGIN.to_string()))?;

    if !verify_password(req.password, user.password_hash.clone()).await? {
        return Err(AppError::AuthError(INVALID_LOGIN.to_string()));
    }

    let pair = TokenPair {
        access: state.tokens.access_token(&user)?,
        refresh: state.tokens.refresh_token(&user)?,
        user: profile_of(&state, &user).await?,
    };
    tracing::info!(user_id = %user.id, "User logged in");
    Ok(success(pair, "Login successful").into_response())
}

pub async fn refresh(
    State(state): State<AppState>,
    Json(req): Json<RefreshRequest>,
) -> Result<Response, AppError> {
    let claims = state.tokens.verify(&req.refresh, TokenKind::Refresh)?;
    let user = users::find_by_id(&state.pool, claims.sub)
        .await?
        .filter(|u| u.is_active)
        .ok_or_else(|| AppError::AuthError("User not found or inactive".to_string()))?;

    let token = AccessToken {
        access: state.tokens.access_token(&user)?,
    };
    Ok(success(token, "Token refreshed").into_response())
}

pub async fn profile(State(state): State<AppState>, AuthUser(user): AuthUser) -> Result<Response, AppError> {
    let profile = profile_of(&state, &user).await?;
    Ok(success(profile, "Profile retrieved").into_response())
}

pub async fn update_profile(
    State(state): State<AppState>,
    AuthUser(mut user): AuthUser,
    Json(req): Json<UpdateProfileRequest>,
) -> Result<Response, AppError> {
    req.validate()?;

    if let Some(first_name) = req.first_name {
        user.first_name = first_name.trim().to_string();
    }
    if let Some(last_name) = req.last_name {
        user.last_name = last_name.trim().to_string();
    }
    if let Some(phone) = req.phone_number {
        user.phone_number = Some(phone.trim().to_string()).filter(|p| !p.is_empty());
    }
    if let Some(organization) = req.organization {
        let organization = organization.trim().to_string();
        if organization.is_empty() && user.is_organizer() {
            return Err(AppError::rejected(
                "The provided input is invalid",
                serde_json::json!({
                    "organization": ["Organization name is required for event organizers."]
                }),
            ));
        }
        user.organization = Some(organization).filter(|o| !o.is_empty());
    }

    let user = users::update_profile(&state.pool, &user).await?;
    let profile = profile_of(&state, &user).await?;
    Ok(success(profile, "Profile updated successfully").into_response())
}

pub async fn change_password(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Json(req): Json<ChangePasswordRequest>,
) -> Result<Response, AppError> {
    req.validate()?;

    if !verify_password(req.old_password, user.password_hash.clone()).await? {
        return Err(AppError::rejected(
            "The provided input is invalid",
            serde_json::json!({ "old_password": ["Old password is incorrect."] }),
        ));
    }

    let password_hash = hash_password(req.new_password).await?;
    users::update_password(&state.pool, user.id, &password_hash).await?;

    tracing::info!(user_id = %user.id, "Password changed");
    Ok(empty_success("Password changed successfully").into_response())
}

pub async fn delete_account(State(state): State<AppState>, AuthUser(user): AuthUser) -> Result<Response, AppError> {
    users::delete(&state.pool, user.id).await?;
    tracing::info!(user_id = %user.id, "Account deleted");
    Ok(empty_success("Account deleted successfully").into_response())
}
