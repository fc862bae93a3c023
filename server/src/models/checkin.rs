use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "check_in_method", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum CheckInMethod {
    QrScan,
    Manual,
    SelfCheckin,
    TicketScan,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct CheckIn {
    pub id: Uuid,
    pub guest_id: Uuid,
    pub checked_in_by: Option<Uuid>,
    pub check_in_method: CheckInMethod,
    pub notes: Option<String>,
    pub ip_address: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct CheckInDetail {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub check_in: CheckIn,
    pub guest_name: String,
    pub guest_email: String,
    pub event_id: Uuid,
    pub event_title: String,
    pub checked_in_by_name: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, Serialize, FromRow)]
pub struct MethodCounts {
    pub qr_scan: i64,
    pub manual: i64,
    pub self_checkin: i64,
    pub ticket_scan: i64,
}

#[derive(Debug, Deserialize)]
pub struct ScanRequest {
    pub token: String,
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ManualCheckInRequest {
    pub guest_id: Uuid,
    pub notes: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct CheckInFilter {
    pub event: Option<Uuid>,
    pub page: Option<i64>,
    pub page_size: Option<i64>,
}
