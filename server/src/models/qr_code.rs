use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct QrCode {
    pub id: Uuid,
    pub guest_id: Uuid,
    pub token: String,
    pub is_used: bool,
    pub used_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// QR code joined with the guest and event it admits.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct QrCodeDetail {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub qr: QrCode,
    pub event_id: Uuid,
    pub organizer_id: Uuid,
    pub guest_name: String,
    pub guest_email: String,
    pub event_title: String,
}

#[derive(Debug, Deserialize)]
pub struct GenerateQrRequest {
    pub guest_id: Uuid,
}

#[derive(Debug, Deserialize)]
pub struct TokenRequest {
    pub token: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct QrCodeFilter {
    pub event: Option<Uuid>,
    pub is_used: Option<bool>,
    pub page: Option<i64>,
    pub page_size: Option<i64>,
}
