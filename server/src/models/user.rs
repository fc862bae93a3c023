use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use validator::{Validate, ValidationError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "user_type", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum UserType {
    #[default]
    Customer,
    Organizer,
}

#[derive(Debug, Clone, FromRow)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub password_hash: String,
    pub first_name: String,
    pub last_name: String,
    pub user_type: UserType,
    pub phone_number: Option<String>,
    pub organization: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
            .trim()
            .to_string()
    }

    pub fn is_organizer(&self) -> bool {
        self.user_type == UserType::Organizer
    }
}

/// Per-role counters shown on the profile.
#[derive(Debug, Clone, Copy, Default, FromRow)]
pub struct UserTotals {
    pub total_events: i64,
    pub total_guests: i64,
    pub total_tickets_purchased: i64,
    pub total_orders: i64,
}

#[derive(Debug, Serialize)]
pub struct UserProfile {
    pub id: Uuid,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub full_name: String,
    pub phone_number: Option<String>,
    pub organization: Option<String>,
    pub user_type: UserType,
    pub is_customer: bool,
    pub is_organizer: bool,
    pub total_events: i64,
    pub total_guests: i64,
    pub total_tickets_purchased: i64,
    pub total_orders: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl UserProfile {
    pub fn new(user: &User, totals: UserTotals) -> Self {
        let is_organizer = user.is_organizer();
        Self {
            id: user.id,
            email: user.email.clone(),
            first_name: user.first_name.clone(),
            last_name: user.last_name.clone(),
            full_name: user.full_name(),
            phone_number: user.phone_number.clone(),
            organization: user.organization.clone(),
            user_type: user.user_type,
            is_customer: !is_organizer,
            is_organizer,
            // Counters only make sense for the matching role.
            total_events: if is_organizer { totals.total_events } else { 0 },
            total_guests: if is_organizer { totals.total_guests } else { 0 },
            total_tickets_purchased: if is_organizer {
                0
            } else {
                totals.total_tickets_purchased
            },
            total_orders: if is_organizer { 0 } else { totals.total_orders },
            created_at: user.created_at,
            updated_at: user.updated_at,
        }
    }
}

/// Lower-cased, trimmed form used for storage and lookups.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

pub fn validate_password_strength(password: &str) -> Result<(), ValidationError> {
    if password.chars().all(|c| c.is_ascii_digit()) {
        return Err(ValidationError::new("password_numeric")
            .with_message("This password is entirely numeric.".into()));
    }
    Ok(())
}

#[derive(Debug, Deserialize, Validate)]
#[validate(schema(function = "validate_registration"))]
pub struct RegisterRequest {
    #[validate(email(message = "Enter a valid email address."))]
    pub email: String,
    #[validate(
        length(min = 8, message = "This password is too short. It must contain at least 8 characters."),
        custom(function = "validate_password_strength")
    )]
    pub password: String,
    pub password2: String,
    #[validate(length(min = 1, max = 150, message = "This field is required."))]
    pub first_name: String,
    #[validate(length(min = 1, max = 150, message = "This field is required."))]
    pub last_name: String,
    #[validate(length(max = 20))]
    pub phone_number: Option<String>,
    #[validate(length(max = 255))]
    pub organization: Option<String>,
    #[serde(default)]
    pub user_type: UserType,
}

fn validate_registration(req: &RegisterRequest) -> Result<(), ValidationError> {
    if req.password != req.password2 {
        return Err(ValidationError::new("password_mismatch")
            .with_message("Password fields didn't match.".into()));
    }
    let has_organization = req
        .organization
        .as_deref()
        .map(|o| !o.trim().is_empty())
        .unwrap_or(false);
    if req.user_type == UserType::Organizer && !has_organization {
        return Err(ValidationError::new("organization_required")
            .with_message("Organization name is required for event organizers.".into()));
    }
    Ok(())
}

#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(email(message = "Enter a valid email address."))]
    pub email: String,
    #[validate(length(min = 1, message = "This field is required."))]
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct RefreshRequest {
    pub refresh: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateProfileRequest {
    #[validate(length(min = 1, max = 150))]
    pub first_name: Option<String>,
    #[validate(length(min = 1, max = 150))]
    pub last_name: Option<String>,
    #[validate(length(max = 20))]
    pub phone_number: Option<String>,
    #[validate(length(max = 255))]
    pub organization: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
#[validate(schema(function = "validate_new_passwords_match"))]
pub struct ChangePasswordRequest {
    pub old_password: String,
    #[validate(
        length(min = 8, message = "This password is too short. It must contain at least 8 characters."),
        custom(function = "validate_password_strength")
    )]
    pub new_password: String,
    pub new_password2: String,
}

fn validate_new_passwords_match(req: &ChangePasswordRequest) -> Result<(), ValidationError> {
    if req.new_password != req.new_password2 {
        return Err(ValidationError::new("password_mismatch")
            .with_message("Password fields didn't match.".into()));
    }
    Ok(())
}

#[derive(Debug, Serialize)]
pub struct TokenPair {
    pub access: String,
    pub refresh: String,
    pub user: UserProfile,
}

#[derive(Debug, Serialize)]
pub struct AccessToken {
    pub access: String,
}
