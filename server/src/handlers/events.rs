use axum::{
    extract::{Path, Query, State},
    response::{IntoResponse, Response},
    Json,
};
use chrono::Utc;
use uuid::Uuid;
use validator::Validate;

use crate::middleware::Organizer;
use crate::models::event::{
    validate_schedule, CreateEventRequest, Event, EventFilter, EventStatus, EventView,
    UpdateEventRequest,
};
use crate::repositories::events::{self, EventScope};
use crate::state::AppState;
use crate::utils::codes::event_slug;
use crate::utils::error::AppError;
use crate::utils::pagination::{Page, Pagination};
use crate::utils::response::{created, empty_success, success};

/// Loads an event the caller organizes. Other organizers' events read as
/// missing.
pub(crate) async fn owned_event(state: &AppState, organizer_id: Uuid, event_id: Uuid) -> Result<Event, AppError> {
    events::find_by_id(&state.pool, event_id)
        .await?
        .filter(|e| e.organizer_id == organizer_id)
        .ok_or_else(|| AppError::NotFound("Event not found".to_string()))
}

/// Like `owned_event`, for events named in a request body: someone else's
/// event is a 403 rather than a 404.
pub(crate) async fn referenced_event(
    state: &AppState,
    organizer_id: Uuid,
    event_id: Uuid,
) -> Result<Event, AppError> {
    let event = events::find_by_id(&state.pool, event_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Event not found".to_string()))?;
    if event.organizer_id != organizer_id {
        return Err(AppError::Forbidden(
            "You can only manage your own events".to_string(),
        ));
    }
    Ok(event)
}

async fn view_of(state: &AppState, event_id: Uuid) -> Result<EventView, AppError> {
    events::find_with_counts(&state.pool, event_id)
        .await?
        .map(EventView::from)
        .ok_or_else(|| AppError::NotFound("Event not found".to_string()))
}

async fn list_scoped(state: &AppState, scope: EventScope, filter: EventFilter) -> Result<Response, AppError> {
    let (rows, count) = events::list(&state.pool, scope, &filter, Utc::now()).await?;
    let page = Page::new(
        rows.into_iter().map(EventView::from).collect(),
        count,
        Pagination::new(filter.page, filter.page_size),
    );
    Ok(success(page, "Events retrieved").into_response())
}

pub async fn list_events(
    State(state): State<AppState>,
    Organizer(user): Organizer,
    Query(filter): Query<EventFilter>,
) -> Result<Response, AppError> {
    list_scoped(&state, EventScope::Organizer(user.id), filter).await
}

pub async fn upcoming_events(
    State(state): State<AppState>,
    Organizer(user): Organizer,
    Query(filter): Query<EventFilter>,
) -> Result<Response, AppError> {
    list_scoped(&state, EventScope::Upcoming(user.id), filter).await
}

pub async fn past_events(
    State(state): State<AppState>,
    Organizer(user): Organizer,
    Query(filter): Query<EventFilter>,
) -> Result<Response, AppError> {
    list_scoped(&state, EventScope::Past(user.id), filter).await
}

pub async fn public_events(
    State(state): State<AppState>,
    Query(filter): Query<EventFilter>,
) -> Result<Response, AppError> {
    list_scoped(&state, EventScope::Public, filter).await
}

pub async fn event_by_slug(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> Result<Response, AppError> {
    let view = events::find_public_by_slug(&state.pool, &slug)
        .await?
        .map(EventView::from)
        .ok_or_else(|| AppError::NotFound("Event not found".to_string()))?;
    Ok(success(view, "Event retrieved").into_response())
}

pub async fn create_event(
    State(state): State<AppState>,
    Organizer(user): Organizer,
    Json(req): Json<CreateEventRequest>,
) -> Result<Response, AppError> {
    req.validate()?;
    validate_schedule(
        req.event_date,
        req.event_end_date,
        req.checkin_start_time,
        req.checkin_end_time,
    )?;

    let now = Utc::now();
    let event = Event {
        id: Uuid::new_v4(),
        organizer_id: user.id,
        slug: event_slug(&req.title),
        title: req.title.trim().to_string(),
        description: req.description,
        event_date: req.event_date,
        event_end_date: req.event_end_date,
        location: req.location.trim().to_string(),
        venue_name: req.venue_name,
        address: req.address,
        capacity: req.capacity,
        allow_plus_one: req.allow_plus_one,
        require_rsvp: req.require_rsvp,
        enable_self_checkin: req.enable_self_checkin,
        checkin_start_time: req.checkin_start_time,
        checkin_end_time: req.checkin_end_time,
        status: req.status,
        is_public: req.is_public,
        created_at: now,
        updated_at: now,
    };
    let event = events::insert(&state.pool, &event).await?;

    tracing::info!(event_id = %event.id, organizer_id = %user.id, "Event created");
    let view = view_of(&state, event.id).await?;
    Ok(created(view, "Event created successfully").into_response())
}

pub async fn get_event(
    State(state): State<AppState>,
    Organizer(user): Organizer,
    Path(id): Path<Uuid>,
) -> Result<Response, AppError> {
    let event = owned_event(&state, user.id, id).await?;
    let view = view_of(&state, event.id).await?;
    Ok(success(view, "Event retrieved").into_response())
}

pub async fn update_event(
    State(state): State<AppState>,
    Organizer(user): Organizer,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateEventRequest>,
) -> Result<Response, AppError> {
    req.validate()?;
    let mut event = owned_event(&state, user.id, id).await?;
    req.apply(&mut event);
    event.validate_schedule()?;

    let event = events::update(&state.pool, &event).await?;
    tracing::info!(event_id = %event.id, "Event updated");
    let view = view_of(&state, event.id).await?;
    Ok(success(view, "Event updated successfully").into_response())
}

pub async fn delete_event(
    State(state): State<AppState>,
    Organizer(user): Organizer,
    Path(id): Path<Uuid>,
) -> Result<Response, AppError> {
    let event = owned_event(&state, user.id, id).await?;
    events::delete(&state.pool, event.id).await?;
    tracing::info!(event_id = %event.id, "Event deleted");
    Ok(empty_success("Event deleted successfully").into_response())
}

async fn transition(
    state: &AppState,
    organizer_id: Uuid,
    id: Uuid,
    target: EventStatus,
) -> Result<EventView, AppError> {
    let event = owned_event(state, organizer_id, id).await?;
    if event.status == target {
        let message = match target {
            EventStatus::Published => "Event is already published",
            EventStatus::Cancelled => "Event is already cancelled",
            _ => "Event already has this status",
        };
        return Err(AppError::ValidationError(message.to_string()));
    }
    events::set_status(&state.pool, event.id, target).await?;
    tracing::info!(event_id = %event.id, status = ?target, "Event status changed");
    view_of(state, event.id).await
}

pub async fn publish_event(
    State(state): State<AppState>,
    Organizer(user): Organizer,
    Path(id): Path<Uuid>,
) -> Result<Response, AppError> {
    let view = transition(&state, user.id, id, EventStatus::Published).await?;
    Ok(success(view, "Event published successfully").into_response())
}

pub async fn cancel_event(
    State(state): State<AppState>,
    Organizer(user): Organizer,
    Path(id): Path<Uuid>,
) -> Result<Response, AppError> {
    let view = transition(&state, user.id, id, EventStatus::Cancelled).await?;
    Ok(success(view, "Event cancelled successfully").into_response())
}
