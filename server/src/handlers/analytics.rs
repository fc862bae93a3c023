use axum::{
    extract::{Path, State},
    http::header,
    response::{IntoResponse, Response},
};
use chrono::Utc;
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::handlers::events::owned_event;
use crate::middleware::Organizer;
use crate::models::analytics::{CapacityStats, Dashboard, EventStats};
use crate::models::event::{attendance_rate, EventView};
use crate::repositories::{analytics, check_ins, events, guests};
use crate::services::export::{export_filename, guests_csv};
use crate::state::AppState;
use crate::utils::error::AppError;
use crate::utils::response::success;

const RECENT_EVENTS: i64 = 5;

pub async fn event_stats(
    State(state): State<AppState>,
    Organizer(user): Organizer,
    Path(id): Path<Uuid>,
) -> Result<Response, AppError> {
    let event = owned_event(&state, user.id, id).await?;

    let counts = analytics::guest_counts(&state.pool, event.id).await?;
    let methods = check_ins::method_counts(&state.pool, event.id).await?;
    let sales = analytics::ticket_sales(&state.pool, event.id).await?;

    let stats = EventStats {
        event_id: event.id,
        event_title: event.title,
        attendance_rate: attendance_rate(counts.checked_in, counts.total),
        capacity: CapacityStats::new(event.capacity, counts.total),
        guests: counts,
        check_in_methods: methods,
        total_tickets_sold: sales.iter().map(|s| i64::from(s.quantity_sold)).sum(),
        total_revenue: sales.iter().map(|s| s.revenue).sum::<Decimal>(),
        ticket_sales: sales,
    };
    Ok(success(stats, "Event statistics retrieved").into_response())
}

pub async fn dashboard(State(state): State<AppState>, Organizer(user): Organizer) -> Result<Response, AppError> {
    let totals = analytics::dashboard_totals(&state.pool, user.id, Utc::now()).await?;
    let recent = events::recent_for_organizer(&state.pool, user.id, RECENT_EVENTS).await?;

    let dashboard = Dashboard {
        overall_attendance_rate: attendance_rate(totals.total_checked_in, totals.total_guests),
        totals,
        recent_events: recent.into_iter().map(EventView::from).collect(),
    };
    Ok(success(dashboard, "Dashboard retrieved").into_response())
}

pub async fn export_guests(
    State(state): State<AppState>,
    Organizer(user): Organizer,
    Path(id): Path<Uuid>,
) -> Result<Response, AppError> {
    let event = owned_event(&state, user.id, id).await?;
    let rows = guests::list_for_event(&state.pool, event.id, None).await?;
    let body = guests_csv(&rows)?;

    tracing::info!(event_id = %event.id, guests = rows.len(), "Guest list exported");
    let disposition = format!("attachment; filename=\"{}\"", export_filename(&event.slug));
    Ok((
        [
            (header::CONTENT_TYPE, "text/csv".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        body,
    )
        .into_response())
}
