use axum::{
    extract::{Path, Query, State},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use uuid::Uuid;

use crate::handlers::guests::owned_guest;
use crate::handlers::png_response;
use crate::middleware::Organizer;
use crate::models::qr_code::{GenerateQrRequest, QrCode, QrCodeDetail, QrCodeFilter, TokenRequest};
use crate::repositories::qr_codes;
use crate::services::qr::{get_or_create, render_png, validation_url};
use crate::state::AppState;
use crate::utils::error::AppError;
use crate::utils::pagination::{Page, Pagination};
use crate::utils::response::{created, empty_success, success};

#[derive(Serialize)]
struct IssuedQrCode {
    #[serde(flatten)]
    qr: QrCode,
    validation_url: String,
}

#[derive(Serialize)]
struct QrValidation {
    valid: bool,
    guest_id: Uuid,
    guest_name: String,
    guest_email: String,
    event_id: Uuid,
    event_title: String,
    is_used: bool,
}

async fn owned_qr(state: &AppState, organizer_id: Uuid, id: Uuid) -> Result<QrCodeDetail, AppError> {
    qr_codes::find_detail_by_id(&state.pool, id)
        .await?
        .filter(|qr| qr.organizer_id == organizer_id)
        .ok_or_else(|| AppError::NotFound("QR code not found".to_string()))
}

pub async fn list_qr_codes(
    State(state): State<AppState>,
    Organizer(user): Organizer,
    Query(filter): Query<QrCodeFilter>,
) -> Result<Response, AppError> {
    let (rows, count) = qr_codes::list(&state.pool, user.id, &filter).await?;
    let page = Page::new(rows, count, Pagination::new(filter.page, filter.page_size));
    Ok(success(page, "QR codes retrieved").into_response())
}

pub async fn generate_qr_code(
    State(state): State<AppState>,
    Organizer(user): Organizer,
    Json(req): Json<GenerateQrRequest>,
) -> Result<Response, AppError> {
    let guest = owned_guest(&state, user.id, req.guest_id).await?.guest;
    let (qr, was_created) = get_or_create(&state.pool, &state.qr, &guest).await?;
    if qr.is_used {
        return Err(AppError::ValidationError(
            "QR code has already been used and cannot be regenerated".to_string(),
        ));
    }

    let issued = IssuedQrCode {
        validation_url: validation_url(&state.config.frontend_url, &qr.token),
        qr,
    };
    if was_created {
        tracing::info!(guest_id = %guest.id, "QR code generated");
        Ok(created(issued, "QR code generated successfully").into_response())
    } else {
        Ok(success(issued, "QR code already exists").into_response())
    }
}

pub async fn get_qr_code(
    State(state): State<AppState>,
    Organizer(user): Organizer,
    Path(id): Path<Uuid>,
) -> Result<Response, AppError> {
    let qr = owned_qr(&state, user.id, id).await?;
    Ok(success(qr, "QR code retrieved").into_response())
}

pub async fn delete_qr_code(
    State(state): State<AppState>,
    Organizer(user): Organizer,
    Path(id): Path<Uuid>,
) -> Result<Response, AppError> {
    let qr = owned_qr(&state, user.id, id).await?;
    qr_codes::delete(&state.pool, qr.qr.id).await?;
    Ok(empty_success("QR code deleted successfully").into_response())
}

pub async fn qr_code_image(
    State(state): State<AppState>,
    Organizer(user): Organizer,
    Path(id): Path<Uuid>,
) -> Result<Response, AppError> {
    let qr = owned_qr(&state, user.id, id).await?;
    let png = render_png(&validation_url(&state.config.frontend_url, &qr.qr.token))?;
    Ok(png_response(png))
}

/// Public lookup of a guest token, used by the validation page.
pub async fn validate_qr_token(
    State(state): State<AppState>,
    Json(req): Json<TokenRequest>,
) -> Result<Response, AppError> {
    let claims = state.qr.verify(req.token.trim())?;
    let detail = qr_codes::find_detail_by_token(&state.pool, req.token.trim())
        .await?
        .ok_or_else(|| AppError::NotFound("QR code not found".to_string()))?;

    let validation = QrValidation {
        valid: !detail.qr.is_used,
        guest_id: claims.guest_id,
        guest_name: detail.guest_name,
        guest_email: detail.guest_email,
        event_id: detail.event_id,
        event_title: detail.event_title,
        is_used: detail.qr.is_used,
    };
    Ok(success(validation, "QR code is valid").into_response())
}
