use axum::{
    extract::{Path, Query, State},
    response::{IntoResponse, Response},
    Json,
};
use chrono::Utc;
use uuid::Uuid;
use validator::Validate;

use crate::handlers::events::referenced_event;
use crate::middleware::Organizer;
use crate::models::guest::{
    BulkCreateError, BulkCreateGuestsRequest, BulkCreateResult, CreateGuestRequest, Guest,
    GuestFilter, GuestSource, GuestStatus, GuestWithEvent, NewGuest, UpdateGuestRequest,
};
use crate::repositories::{events, guests};
use crate::state::AppState;
use crate::utils::error::AppError;
use crate::utils::pagination::{Page, Pagination};
use crate::utils::response::{created, empty_success, success};

/// Adds a guest while holding the event row so concurrent inserts cannot
/// overshoot the capacity.
async fn insert_guest(
    state: &AppState,
    event_id: Uuid,
    guest: &NewGuest,
    status: GuestStatus,
    rsvp_status: bool,
    source: GuestSource,
) -> Result<Guest, AppError> {
    let mut tx = state.pool.begin().await?;
    let event = events::find_by_id_for_update(&mut *tx, event_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Event not found".to_string()))?;

    if let Some(capacity) = event.capacity {
        let total = guests::count_for_event(&mut *tx, event.id).await?;
        if total >= i64::from(capacity) {
            return Err(AppError::ValidationError(format!(
                "Event has reached its capacity of {} guests",
                capacity
            )));
        }
    }

    let created = guests::insert(&mut *tx, event.id, guest, status, rsvp_status, source).await?;
    tx.commit().await?;
    Ok(created)
}

pub(crate) async fn owned_guest(
    state: &AppState,
    organizer_id: Uuid,
    guest_id: Uuid,
) -> Result<GuestWithEvent, AppError> {
    guests::find_with_event(&state.pool, guest_id)
        .await?
        .filter(|g| g.organizer_id == organizer_id)
        .ok_or_else(|| AppError::NotFound("Guest not found".to_string()))
}

pub async fn list_guests(
    State(state): State<AppState>,
    Organizer(user): Organizer,
    Query(filter): Query<GuestFilter>,
) -> Result<Response, AppError> {
    let (rows, count) = guests::list(&state.pool, user.id, &filter).await?;
    let page = Page::new(rows, count, Pagination::new(filter.page, filter.page_size));
    Ok(success(page, "Guests retrieved").into_response())
}

pub async fn create_guest(
    State(state): State<AppState>,
    Organizer(user): Organizer,
    Json(req): Json<CreateGuestRequest>,
) -> Result<Response, AppError> {
    req.validate()?;
    let event = referenced_event(&state, user.id, req.event).await?;

    let guest = insert_guest(
        &state,
        event.id,
        &req.guest,
        req.status,
        req.rsvp_status,
        GuestSource::Manual,
    )
    .await?;

    tracing::info!(guest_id = %guest.id, event_id = %event.id, "Guest created");
    Ok(created(guest, "Guest created successfully").into_response())
}

pub async fn bulk_create_guests(
    State(state): State<AppState>,
    Organizer(user): Organizer,
    Json(req): Json<BulkCreateGuestsRequest>,
) -> Result<Response, AppError> {
    req.validate()?;
    let event = referenced_event(&state, user.id, req.event_id).await?;

    let mut result = BulkCreateResult {
        created: Vec::new(),
        created_count: 0,
        errors: Vec::new(),
    };
    for (index, guest) in req.guests.iter().enumerate() {
        let outcome = match guest.validate() {
            Ok(()) => {
                insert_guest(
                    &state,
                    event.id,
                    guest,
                    GuestStatus::Pending,
                    false,
                    GuestSource::Bulk,
                )
                .await
            }
            Err(errors) => Err(AppError::from(errors)),
        };
        match outcome {
            Ok(created) => result.created.push(created),
            Err(err) => result.errors.push(BulkCreateError {
                index,
                email: guest.email.clone(),
                error: match &err {
                    AppError::InvalidFields { details, .. } => details.to_string(),
                    other => other.public_message(),
                },
            }),
        }
    }
    result.created_count = result.created.len();

    tracing::info!(
        event_id = %event.id,
        created = result.created_count,
        failed = result.errors.len(),
        "Bulk guest import finished"
    );
    Ok(created(result, "Bulk guest import finished").into_response())
}

pub async fn get_guest(
    State(state): State<AppState>,
    Organizer(user): Organizer,
    Path(id): Path<Uuid>,
) -> Result<Response, AppError> {
    let guest = owned_guest(&state, user.id, id).await?;
    Ok(success(guest, "Guest retrieved").into_response())
}

pub async fn update_guest(
    State(state): State<AppState>,
    Organizer(user): Organizer,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateGuestRequest>,
) -> Result<Response, AppError> {
    req.validate()?;
    let GuestWithEvent { mut guest, .. } = owned_guest(&state, user.id, id).await?;
    req.apply(&mut guest, Utc::now());

    let guest = guests::update(&state.pool, &guest).await?;
    tracing::info!(guest_id = %guest.id, "Guest updated");
    Ok(success(guest, "Guest updated successfully").into_response())
}

pub async fn delete_guest(
    State(state): State<AppState>,
    Organizer(user): Organizer,
    Path(id): Path<Uuid>,
) -> Result<Response, AppError> {
    let guest = owned_guest(&state, user.id, id).await?;
    guests::delete(&state.pool, guest.guest.id).await?;
    tracing::info!(guest_id = %guest.guest.id, "Guest deleted");
    Ok(empty_success("Guest deleted successfully").into_response())
}
