//! Admission of guests and ticket holders. Each path locks the credential
//! row before checking its state so that concurrent scans of the same code
//! admit exactly once. Locks are always taken ticket, then guest, then QR.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::json;
use sqlx::PgConnection;
use uuid::Uuid;

use crate::models::checkin::CheckInMethod;
use crate::models::event::{Event, EventStatus};
use crate::models::guest::Guest;
use crate::models::ticket::{TicketDetail, TicketStatus};
use crate::models::user::User;
use crate::repositories::check_ins::{self, NewCheckIn};
use crate::repositories::{events, guests, qr_codes, tickets};
use crate::services::qr::{parse_credential, Credential};
use crate::state::AppState;
use crate::utils::error::AppError;

/// Who is checking someone in, and from where.
#[derive(Debug, Clone, Copy)]
pub struct Admission<'a> {
    pub staff: Option<&'a User>,
    pub notes: Option<&'a str>,
    pub ip_address: Option<&'a str>,
    pub now: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct GuestCheckIn {
    pub guest: Guest,
    pub event_title: String,
    pub method: CheckInMethod,
}

#[derive(Debug, Serialize)]
pub struct TicketCheckIn {
    pub ticket: TicketDetail,
    /// Whether a matching guest record was checked in alongside the ticket.
    pub guest_checked_in: bool,
}

#[derive(Debug, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Redemption {
    Guest(GuestCheckIn),
    Ticket(TicketCheckIn),
}

/// Read-only view of a scanned credential.
#[derive(Debug, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CredentialStatus {
    Guest {
        valid: bool,
        guest_id: Uuid,
        guest_name: String,
        guest_email: String,
        event_id: Uuid,
        event_title: String,
        is_used: bool,
        used_at: Option<DateTime<Utc>>,
    },
    Ticket {
        valid: bool,
        ticket_number: String,
        status: TicketStatus,
        holder_name: String,
        ticket_type: String,
        event_id: Uuid,
        event_title: String,
        event_date: DateTime<Utc>,
        checked_in_at: Option<DateTime<Utc>>,
    },
}

fn ensure_owner(event: &Event, staff: Option<&User>) -> Result<(), AppError> {
    match staff {
        Some(user) if user.id != event.organizer_id => Err(AppError::Forbidden(
            "You do not have permission to check in guests for this event".to_string(),
        )),
        _ => Ok(()),
    }
}

fn ensure_open(event: &Event, now: DateTime<Utc>) -> Result<(), AppError> {
    if event.status == EventStatus::Cancelled {
        return Err(AppError::ValidationError("Event has been cancelled".to_string()));
    }
    match event.checkin_window_error(now) {
        Some(message) => Err(AppError::ValidationError(message.to_string())),
        None => Ok(()),
    }
}

fn already_checked_in(guest: &Guest, at: Option<DateTime<Utc>>) -> AppError {
    AppError::rejected(
        "Guest already checked in",
        json!({
            "guest_name": guest.full_name(),
            "checked_in_at": at.or(guest.checked_in_at),
        }),
    )
}

async fn load_event(conn: &mut PgConnection, event_id: Uuid) -> Result<Event, AppError> {
    events::find_by_id(&mut *conn, event_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Event not found".to_string()))
}

/// Marks a locked guest attended, burns their QR code if they have one and
/// records the check-in.
async fn admit_guest(
    conn: &mut PgConnection,
    guest: &Guest,
    method: CheckInMethod,
    admission: Admission<'_>,
) -> Result<Guest, AppError> {
    let staff_name = admission.staff.map(User::full_name);
    let admitted =
        guests::mark_checked_in(&mut *conn, guest.id, staff_name.as_deref(), admission.now).await?;

    if let Some(qr) = qr_codes::find_by_guest_for_update(&mut *conn, guest.id).await? {
        if !qr.is_used {
            qr_codes::mark_used(&mut *conn, qr.id, admission.now).await?;
        }
    }

    check_ins::insert(
        &mut *conn,
        NewCheckIn {
            guest_id: guest.id,
            checked_in_by: admission.staff.map(|u| u.id),
            method,
            notes: admission.notes,
            ip_address: admission.ip_address,
        },
    )
    .await?;

    Ok(admitted)
}

async fn redeem_guest_token(
    state: &AppState,
    token: &str,
    method: CheckInMethod,
    admission: Admission<'_>,
) -> Result<GuestCheckIn, AppError> {
    state.qr.verify(token)?;

    let mut tx = state.pool.begin().await?;
    let guest_id = qr_codes::find_detail_by_token(&mut *tx, token)
        .await?
        .map(|detail| detail.qr.guest_id)
        .ok_or_else(|| AppError::NotFound("QR code not found".to_string()))?;
    // Guest row before QR row, as in every other admission path.
    let guest = guests::find_by_id_for_update(&mut *tx, guest_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Guest not found".to_string()))?;
    let qr = qr_codes::find_by_guest_for_update(&mut *tx, guest.id)
        .await?
        .filter(|qr| qr.token == token)
        .ok_or_else(|| AppError::NotFound("QR code not found".to_string()))?;
    let event = load_event(&mut tx, guest.event_id).await?;

    ensure_owner(&event, admission.staff)?;
    if method == CheckInMethod::SelfCheckin && !event.enable_self_checkin {
        return Err(AppError::ValidationError(
            "Self check-in is not enabled for this event".to_string(),
        ));
    }
    ensure_open(&event, admission.now)?;
    if qr.is_used || guest.has_checked_in {
        return Err(already_checked_in(&guest, qr.used_at));
    }

    let guest = admit_guest(&mut tx, &guest, method, admission).await?;
    tx.commit().await?;

    tracing::info!(guest_id = %guest.id, event_id = %event.id, ?method, "Guest checked in");
    Ok(GuestCheckIn {
        guest,
        event_title: event.title,
        method,
    })
}

/// Staff scan of a guest QR token.
pub async fn scan(
    state: &AppState,
    token: &str,
    admission: Admission<'_>,
) -> Result<GuestCheckIn, AppError> {
    redeem_guest_token(state, token, CheckInMethod::QrScan, admission).await
}

/// Guest scanning their own code at a self-service kiosk.
pub async fn self_checkin(
    state: &AppState,
    token: &str,
    admission: Admission<'_>,
) -> Result<GuestCheckIn, AppError> {
    redeem_guest_token(state, token, CheckInMethod::SelfCheckin, admission).await
}

pub async fn manual(
    state: &AppState,
    guest_id: Uuid,
    admission: Admission<'_>,
) -> Result<GuestCheckIn, AppError> {
    let mut tx = state.pool.begin().await?;
    let guest = guests::find_by_id_for_update(&mut *tx, guest_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Guest not found".to_string()))?;
    let event = load_event(&mut tx, guest.event_id).await?;

    ensure_owner(&event, admission.staff)?;
    ensure_open(&event, admission.now)?;
    if guest.has_checked_in {
        return Err(already_checked_in(&guest, None));
    }

    let guest = admit_guest(&mut tx, &guest, CheckInMethod::Manual, admission).await?;
    tx.commit().await?;

    tracing::info!(guest_id = %guest.id, event_id = %event.id, "Guest checked in manually");
    Ok(GuestCheckIn {
        guest,
        event_title: event.title,
        method: CheckInMethod::Manual,
    })
}

async fn find_ticket(
    state: &AppState,
    number: &str,
    code: Option<Uuid>,
) -> Result<TicketDetail, AppError> {
    let detail = tickets::find_detail_by_number(&state.pool, number)
        .await?
        .ok_or_else(|| AppError::NotFound("Ticket not found".to_string()))?;
    if matches!(code, Some(code) if code != detail.ticket.ticket_code) {
        return Err(AppError::ValidationError("Invalid ticket payload".to_string()));
    }
    Ok(detail)
}

/// Checks a ticket in and reconciles the holder's guest record for the same
/// event: the guest is admitted and their QR code burned with a
/// `ticket_scan` check-in, unless they were already in.
pub async fn check_in_ticket(
    state: &AppState,
    ticket_id: Uuid,
    admission: Admission<'_>,
) -> Result<TicketCheckIn, AppError> {
    let staff = admission.staff.ok_or_else(|| {
        AppError::AuthError("Authentication credentials were not provided".to_string())
    })?;

    let mut tx = state.pool.begin().await?;
    let ticket = tickets::find_by_id_for_update(&mut *tx, ticket_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Ticket not found".to_string()))?;
    let event = load_event(&mut tx, ticket.event_id).await?;

    ensure_owner(&event, Some(staff))?;
    if ticket.checked_in {
        return Err(AppError::rejected(
            "Ticket already checked in",
            json!({
                "ticket_number": ticket.ticket_number,
                "checked_in_at": ticket.checked_in_at,
            }),
        ));
    }
    if ticket.status != TicketStatus::Valid {
        return Err(AppError::ValidationError(format!(
            "Ticket is {}",
            ticket.status.label()
        )));
    }
    ensure_open(&event, admission.now)?;

    tickets::mark_checked_in(&mut *tx, ticket.id, staff.id, admission.now).await?;

    let holder =
        guests::find_by_event_and_email_for_update(&mut *tx, event.id, &ticket.holder_email).await?;
    let guest_checked_in = match holder {
        Some(guest) if !guest.has_checked_in => {
            admit_guest(&mut tx, &guest, CheckInMethod::TicketScan, admission).await?;
            true
        }
        _ => false,
    };

    tx.commit().await?;

    tracing::info!(
        ticket_number = %ticket.ticket_number,
        event_id = %event.id,
        guest_checked_in,
        "Ticket checked in"
    );

    let detail = tickets::find_detail_by_id(&state.pool, ticket.id)
        .await?
        .ok_or_else(|| AppError::NotFound("Ticket not found".to_string()))?;
    Ok(TicketCheckIn {
        ticket: detail,
        guest_checked_in,
    })
}

/// Organizer check-in from raw scanner input of either credential kind.
pub async fn redeem(
    state: &AppState,
    raw: &str,
    admission: Admission<'_>,
) -> Result<Redemption, AppError> {
    match parse_credential(raw)? {
        Credential::GuestToken(token) => scan(state, &token, admission).await.map(Redemption::Guest),
        Credential::Ticket { number, code } => {
            let detail = find_ticket(state, &number, code).await?;
            check_in_ticket(state, detail.ticket.id, admission)
                .await
                .map(Redemption::Ticket)
        }
    }
}

/// Describes a credential without changing anything.
pub async fn inspect(state: &AppState, raw: &str) -> Result<CredentialStatus, AppError> {
    match parse_credential(raw)? {
        Credential::GuestToken(token) => {
            let claims = state.qr.verify(&token)?;
            let detail = qr_codes::find_detail_by_token(&state.pool, &token)
                .await?
                .ok_or_else(|| AppError::NotFound("QR code not found".to_string()))?;
            Ok(CredentialStatus::Guest {
                valid: !detail.qr.is_used,
                guest_id: claims.guest_id,
                guest_name: detail.guest_name,
                guest_email: detail.guest_email,
                event_id: detail.event_id,
                event_title: detail.event_title,
                is_used: detail.qr.is_used,
                used_at: detail.qr.used_at,
            })
        }
        Credential::Ticket { number, code } => {
            let detail = find_ticket(state, &number, code).await?;
            let ticket = detail.ticket;
            Ok(CredentialStatus::Ticket {
                valid: ticket.status == TicketStatus::Valid && !ticket.checked_in,
                ticket_number: ticket.ticket_number,
                status: ticket.status,
                holder_name: ticket.holder_name,
                ticket_type: detail.ticket_type_name,
                event_id: ticket.event_id,
                event_title: detail.event_title,
                event_date: detail.event_date,
                checked_in_at: ticket.checked_in_at,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::event::tests::sample_event;
    use crate::models::user::UserType;
    use chrono::Duration;

    fn organizer(id: Uuid) -> User {
        let now = Utc::now();
        User {
            id,
            email: "host@example.com".to_string(),
            password_hash: String::new(),
            first_name: "Ada".to_string(),
            last_name: "Host".to_string(),
            user_type: UserType::Organizer,
            phone_number: None,
            organization: Some("Hosts Ltd".to_string()),
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_only_the_organizer_may_admit() {
        let event = sample_event();
        let owner = organizer(event.organizer_id);
        let stranger = organizer(Uuid::new_v4());

        assert!(ensure_owner(&event, Some(&owner)).is_ok());
        assert!(ensure_owner(&event, None).is_ok());
        let err = ensure_owner(&event, Some(&stranger)).unwrap_err();
        assert_eq!(err.code(), "FORBIDDEN");
    }

    #[test]
    fn test_cancelled_or_closed_events_reject_admission() {
        let now = Utc::now();
        let mut event = sample_event();
        assert!(ensure_open(&event, now).is_ok());

        event.checkin_end_time = Some(now - Duration::minutes(5));
        assert!(ensure_open(&event, now).is_err());

        event.checkin_end_time = None;
        event.status = EventStatus::Cancelled;
        match ensure_open(&event, now) {
            Err(AppError::ValidationError(msg)) => assert_eq!(msg, "Event has been cancelled"),
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_already_checked_in_carries_details() {
        let event = sample_event();
        let mut guest = crate::models::guest::tests::sample_guest(event.id);
        let at = Utc::now();
        guest.checked_in_at = Some(at);

        match already_checked_in(&guest, None) {
            AppError::InvalidFields { details, .. } => {
                assert_eq!(details["guest_name"], guest.full_name());
                assert!(!details["checked_in_at"].is_null());
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }
}
