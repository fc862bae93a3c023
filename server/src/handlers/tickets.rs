use axum::{
    extract::{Path, Query, State},
    response::{IntoResponse, Response},
};
use chrono::Utc;
use uuid::Uuid;

use crate::handlers::orders::viewer_of;
use crate::handlers::png_response;
use crate::middleware::{AuthUser, ClientIp, Organizer};
use crate::models::ticket::{TicketDetail, TicketFilter};
use crate::models::user::User;
use crate::repositories::orders::OrderViewer;
use crate::repositories::tickets;
use crate::services::checkin::{self, Admission};
use crate::services::qr::render_png;
use crate::state::AppState;
use crate::utils::error::AppError;
use crate::utils::pagination::{Page, Pagination};
use crate::utils::response::success;

async fn visible_ticket(state: &AppState, user: &User, id: Uuid) -> Result<TicketDetail, AppError> {
    tickets::find_detail_by_id(&state.pool, id)
        .await?
        .filter(|t| match viewer_of(user) {
            OrderViewer::Organizer(organizer_id) => t.organizer_id == organizer_id,
            OrderViewer::Customer(email) => t.ticket.holder_email == email,
        })
        .ok_or_else(|| AppError::NotFound("Ticket not found".to_string()))
}

pub async fn list_tickets(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Query(filter): Query<TicketFilter>,
) -> Result<Response, AppError> {
    let (rows, count) = tickets::list(&state.pool, viewer_of(&user), &filter).await?;
    let page = Page::new(rows, count, Pagination::new(filter.page, filter.page_size));
    Ok(success(page, "Tickets retrieved").into_response())
}

pub async fn get_ticket(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Response, AppError> {
    let ticket = visible_ticket(&state, &user, id).await?;
    Ok(success(ticket, "Ticket retrieved").into_response())
}

pub async fn check_in_ticket(
    State(state): State<AppState>,
    Organizer(user): Organizer,
    ip: ClientIp,
    Path(id): Path<Uuid>,
) -> Result<Response, AppError> {
    let ticket = visible_ticket(&state, &user, id).await?;
    let ip = ip.to_string_opt();
    let admission = Admission {
        staff: Some(&user),
        notes: None,
        ip_address: ip.as_deref(),
        now: Utc::now(),
    };
    let result = checkin::check_in_ticket(&state, ticket.ticket.id, admission).await?;
    Ok(success(result, "Ticket checked in successfully").into_response())
}

pub async fn ticket_qr(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Response, AppError> {
    let ticket = visible_ticket(&state, &user, id).await?;
    let png = render_png(&ticket.ticket.qr_payload())?;
    Ok(png_response(png))
}
