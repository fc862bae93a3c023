use axum::{
    extract::{Query, State},
    response::{IntoResponse, Response},
    Json,
};
use chrono::Utc;

use crate::middleware::{ClientIp, Organizer};
use crate::models::checkin::{CheckInFilter, ManualCheckInRequest, ScanRequest};
use crate::models::qr_code::TokenRequest;
use crate::repositories::check_ins;
use crate::services::checkin::{self, Admission};
use crate::state::AppState;
use crate::utils::error::AppError;
use crate::utils::pagination::{Page, Pagination};
use crate::utils::response::success;

pub async fn scan_qr(
    State(state): State<AppState>,
    Organizer(user): Organizer,
    ip: ClientIp,
    Json(req): Json<ScanRequest>,
) -> Result<Response, AppError> {
    let ip = ip.to_string_opt();
    let admission = Admission {
        staff: Some(&user),
        notes: req.notes.as_deref(),
        ip_address: ip.as_deref(),
        now: Utc::now(),
    };
    let result = checkin::scan(&state, req.token.trim(), admission).await?;
    Ok(success(result, "Check-in successful").into_response())
}

pub async fn manual_checkin(
    State(state): State<AppState>,
    Organizer(user): Organizer,
    ip: ClientIp,
    Json(req): Json<ManualCheckInRequest>,
) -> Result<Response, AppError> {
    let ip = ip.to_string_opt();
    let admission = Admission {
        staff: Some(&user),
        notes: req.notes.as_deref(),
        ip_address: ip.as_deref(),
        now: Utc::now(),
    };
    let result = checkin::manual(&state, req.guest_id, admission).await?;
    Ok(success(result, "Check-in successful").into_response())
}

pub async fn self_checkin(
    State(state): State<AppState>,
    ip: ClientIp,
    Json(req): Json<TokenRequest>,
) -> Result<Response, AppError> {
    let ip = ip.to_string_opt();
    let admission = Admission {
        staff: None,
        notes: None,
        ip_address: ip.as_deref(),
        now: Utc::now(),
    };
    let result = checkin::self_checkin(&state, req.token.trim(), admission).await?;
    Ok(success(result, "Self check-in successful").into_response())
}

/// Public: describes a guest token or ticket payload without redeeming it.
pub async fn validate_credential(
    State(state): State<AppState>,
    Json(req): Json<TokenRequest>,
) -> Result<Response, AppError> {
    let status = checkin::inspect(&state, &req.token).await?;
    Ok(success(status, "Credential found").into_response())
}

/// Redeems either credential kind from a scanner.
pub async fn checkin_credential(
    State(state): State<AppState>,
    Organizer(user): Organizer,
    ip: ClientIp,
    Json(req): Json<ScanRequest>,
) -> Result<Response, AppError> {
    let ip = ip.to_string_opt();
    let admission = Admission {
        staff: Some(&user),
        notes: req.notes.as_deref(),
        ip_address: ip.as_deref(),
        now: Utc::now(),
    };
    let result = checkin::redeem(&state, &req.token, admission).await?;
    Ok(success(result, "Check-in successful").into_response())
}

pub async fn list_checkins(
    State(state): State<AppState>,
    Organizer(user): Organizer,
    Query(filter): Query<CheckInFilter>,
) -> Result<Response, AppError> {
    let (rows, count) = check_ins::list(&state.pool, user.id, &filter).await?;
    let page = Page::new(rows, count, Pagination::new(filter.page, filter.page_size));
    Ok(success(page, "Check-ins retrieved").into_response())
}
