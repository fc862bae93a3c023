use axum::{
    extract::{Path, Query, State},
    response::{IntoResponse, Response},
    Json,
};
use chrono::Utc;
use std::collections::HashMap;
use uuid::Uuid;
use validator::Validate;

use crate::handlers::events::referenced_event;
use crate::middleware::{AuthUser, Organizer};
use crate::models::ticket::{
    CreateTicketTypeRequest, NewBenefit, TicketBenefit, TicketType, TicketTypeFilter, TicketTypeView,
    UpdateTicketTypeRequest,
};
use crate::repositories::{events, ticket_types};
use crate::state::AppState;
use crate::utils::error::AppError;
use crate::utils::pagination::{Page, Pagination};
use crate::utils::response::{created, empty_success, success};

async fn views_of(state: &AppState, types: Vec<TicketType>) -> Result<Vec<TicketTypeView>, AppError> {
    let ids: Vec<Uuid> = types.iter().map(|t| t.id).collect();
    let mut benefits: HashMap<Uuid, Vec<TicketBenefit>> = HashMap::new();
    for benefit in ticket_types::benefits_for(&state.pool, &ids).await? {
        benefits.entry(benefit.ticket_type_id).or_default().push(benefit);
    }

    let now = Utc::now();
    Ok(types
        .into_iter()
        .map(|t| {
            let own = benefits.remove(&t.id).unwrap_or_default();
            TicketTypeView::new(t, own, now)
        })
        .collect())
}

async fn view_of(state: &AppState, ticket_type: TicketType) -> Result<TicketTypeView, AppError> {
    let mut views = views_of(state, vec![ticket_type]).await?;
    views
        .pop()
        .ok_or_else(|| AppError::InternalServerError("ticket type view missing".to_string()))
}

/// Ticket type whose event the caller organizes.
async fn owned_ticket_type(state: &AppState, organizer_id: Uuid, id: Uuid) -> Result<TicketType, AppError> {
    let ticket_type = ticket_types::find_by_id(&state.pool, id)
        .await?
        .ok_or_else(|| AppError::NotFound("Ticket type not found".to_string()))?;
    referenced_event(state, organizer_id, ticket_type.event_id).await?;
    Ok(ticket_type)
}

pub async fn list_ticket_types(
    State(state): State<AppState>,
    viewer: Option<AuthUser>,
    Query(filter): Query<TicketTypeFilter>,
) -> Result<Response, AppError> {
    let owner = viewer.filter(|u| u.is_organizer()).map(|u| u.id);
    let (rows, count) = ticket_types::list(&state.pool, &filter, owner, Utc::now()).await?;
    let page = Page::new(
        views_of(&state, rows).await?,
        count,
        Pagination::new(filter.page, filter.page_size),
    );
    Ok(success(page, "Ticket types retrieved").into_response())
}

pub async fn get_ticket_type(
    State(state): State<AppState>,
    viewer: Option<AuthUser>,
    Path(id): Path<Uuid>,
) -> Result<Response, AppError> {
    let ticket_type = ticket_types::find_by_id(&state.pool, id)
        .await?
        .ok_or_else(|| AppError::NotFound("Ticket type not found".to_string()))?;
    let event = events::find_by_id(&state.pool, ticket_type.event_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Ticket type not found".to_string()))?;

    let is_owner = viewer.map_or(false, |u| u.id == event.organizer_id);
    if !is_owner && !(ticket_type.is_visible && event.is_public) {
        return Err(AppError::NotFound("Ticket type not found".to_string()));
    }
    let view = view_of(&state, ticket_type).await?;
    Ok(success(view, "Ticket type retrieved").into_response())
}

pub async fn create_ticket_type(
    State(state): State<AppState>,
    Organizer(user): Organizer,
    Json(req): Json<CreateTicketTypeRequest>,
) -> Result<Response, AppError> {
    req.validate()?;
    let event = referenced_event(&state, user.id, req.event).await?;

    let mut tx = state.pool.begin().await?;
    let ticket_type = ticket_types::insert(&mut *tx, &req).await?;
    for benefit in &req.benefits {
        ticket_types::insert_benefit(&mut *tx, ticket_type.id, benefit).await?;
    }
    tx.commit().await?;

    tracing::info!(ticket_type_id = %ticket_type.id, event_id = %event.id, "Ticket type created");
    let view = view_of(&state, ticket_type).await?;
    Ok(created(view, "Ticket type created successfully").into_response())
}

pub async fn update_ticket_type(
    State(state): State<AppState>,
    Organizer(user): Organizer,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateTicketTypeRequest>,
) -> Result<Response, AppError> {
    req.validate()?;
    owned_ticket_type(&state, user.id, id).await?;

    // Re-read under lock so the sold count cannot move while we compare.
    let mut tx = state.pool.begin().await?;
    let mut ticket_type = ticket_types::lock_many(&mut *tx, &[id])
        .await?
        .pop()
        .ok_or_else(|| AppError::NotFound("Ticket type not found".to_string()))?;
    req.apply(&mut ticket_type)?;
    let ticket_type = ticket_types::update(&mut *tx, &ticket_type).await?;
    tx.commit().await?;

    tracing::info!(ticket_type_id = %ticket_type.id, "Ticket type updated");
    let view = view_of(&state, ticket_type).await?;
    Ok(success(view, "Ticket type updated successfully").into_response())
}

pub async fn delete_ticket_type(
    State(state): State<AppState>,
    Organizer(user): Organizer,
    Path(id): Path<Uuid>,
) -> Result<Response, AppError> {
    let ticket_type = owned_ticket_type(&state, user.id, id).await?;
    if ticket_type.quantity_sold > 0 {
        return Err(AppError::ValidationError(
            "Cannot delete a ticket type that has sales".to_string(),
        ));
    }
    ticket_types::delete(&state.pool, ticket_type.id).await?;
    tracing::info!(ticket_type_id = %ticket_type.id, "Ticket type deleted");
    Ok(empty_success("Ticket type deleted successfully").into_response())
}

pub async fn add_benefit(
    State(state): State<AppState>,
    Organizer(user): Organizer,
    Path(id): Path<Uuid>,
    Json(req): Json<NewBenefit>,
) -> Result<Response, AppError> {
    req.validate()?;
    let ticket_type = owned_ticket_type(&state, user.id, id).await?;
    let benefit = ticket_types::insert_benefit(&state.pool, ticket_type.id, &req).await?;
    Ok(created(benefit, "Benefit added successfully").into_response())
}
