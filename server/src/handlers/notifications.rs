use axum::{
    extract::State,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use uuid::Uuid;

use crate::handlers::events::referenced_event;
use crate::handlers::guests::owned_guest;
use crate::middleware::Organizer;
use crate::models::guest::{Guest, GuestStatus};
use crate::repositories::{events, guests};
use crate::services::notifications::{queue_invitations, queue_ticket_reminders, InviteKind};
use crate::state::AppState;
use crate::utils::error::AppError;
use crate::utils::response::success;

#[derive(Debug, Deserialize)]
pub struct SendInviteRequest {
    pub guest_id: Uuid,
}

#[derive(Debug, Deserialize)]
pub struct BulkInviteRequest {
    pub guest_ids: Vec<Uuid>,
}

#[derive(Debug, Deserialize)]
pub struct EventNotificationRequest {
    pub event_id: Uuid,
}

#[derive(Serialize)]
struct Queued {
    queued: usize,
}

pub async fn send_invite(
    State(state): State<AppState>,
    Organizer(user): Organizer,
    Json(req): Json<SendInviteRequest>,
) -> Result<Response, AppError> {
    let guest = owned_guest(&state, user.id, req.guest_id).await?.guest;
    let event = referenced_event(&state, user.id, guest.event_id).await?;

    queue_invitations(state, event, vec![guest], InviteKind::Invitation);
    Ok(success(Queued { queued: 1 }, "Invitation queued for sending").into_response())
}

pub async fn send_bulk_invites(
    State(state): State<AppState>,
    Organizer(user): Organizer,
    Json(req): Json<BulkInviteRequest>,
) -> Result<Response, AppError> {
    if req.guest_ids.is_empty() {
        return Err(AppError::ValidationError("guest_ids must not be empty".to_string()));
    }
    let ids: Vec<Uuid> = req
        .guest_ids
        .iter()
        .copied()
        .collect::<HashSet<_>>()
        .into_iter()
        .collect();

    let rows = guests::find_many_with_event(&state.pool, &ids).await?;
    if rows.len() != ids.len() {
        return Err(AppError::NotFound("One or more guests were not found".to_string()));
    }
    if rows.iter().any(|r| r.organizer_id != user.id) {
        return Err(AppError::Forbidden(
            "You can only invite guests of your own events".to_string(),
        ));
    }

    let queued = rows.len();
    let mut by_event: Vec<(Uuid, Vec<Guest>)> = Vec::new();
    for row in rows {
        match by_event.iter_mut().find(|(id, _)| *id == row.guest.event_id) {
            Some((_, list)) => list.push(row.guest),
            None => by_event.push((row.guest.event_id, vec![row.guest])),
        }
    }
    for (event_id, recipients) in by_event {
        let event = events::find_by_id(&state.pool, event_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Event not found".to_string()))?;
        queue_invitations(state.clone(), event, recipients, InviteKind::Invitation);
    }

    Ok(success(Queued { queued }, "Invitations queued for sending").into_response())
}

/// Re-sends the invitation to every confirmed guest of the event.
pub async fn send_reminder(
    State(state): State<AppState>,
    Organizer(user): Organizer,
    Json(req): Json<EventNotificationRequest>,
) -> Result<Response, AppError> {
    let event = referenced_event(&state, user.id, req.event_id).await?;
    let recipients = guests::list_for_event(&state.pool, event.id, Some(GuestStatus::Confirmed)).await?;
    let queued = recipients.len();

    queue_invitations(state, event, recipients, InviteKind::Reminder);
    Ok(success(Queued { queued }, "Reminders queued for sending").into_response())
}

pub async fn send_ticket_reminder(
    State(state): State<AppState>,
    Organizer(user): Organizer,
    Json(req): Json<EventNotificationRequest>,
) -> Result<Response, AppError> {
    let event = referenced_event(&state, user.id, req.event_id).await?;

    queue_ticket_reminders(state, event.id);
    Ok(success(serde_json::json!({ "event_id": event.id }), "Ticket reminders queued for sending").into_response())
}
