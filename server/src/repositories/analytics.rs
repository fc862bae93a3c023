use chrono::{DateTime, Utc};
use sqlx::PgExecutor;
use uuid::Uuid;

use crate::models::analytics::{DashboardTotals, GuestCounts, TicketTypeSales};

pub async fn guest_counts<'e, E: PgExecutor<'e>>(executor: E, event_id: Uuid) -> Result<GuestCounts, sqlx::Error> {
    sqlx::query_as::<_, GuestCounts>(
        r#"
        SELECT COUNT(*) AS total,
               COUNT(*) FILTER (WHERE has_checked_in) AS checked_in,
               COUNT(*) FILTER (WHERE status = 'pending') AS pending,
               COUNT(*) FILTER (WHERE status = 'confirmed') AS confirmed,
               COUNT(*) FILTER (WHERE status = 'declined') AS declined,
               COUNT(*) FILTER (WHERE rsvp_status) AS rsvp_yes,
               COUNT(*) FILTER (WHERE NOT rsvp_status) AS rsvp_no
        FROM guests
        WHERE event_id = $1
        "#,
    )
    .bind(event_id)
    .fetch_one(executor)
    .await
}

/// Inventory per ticket type with revenue from settled orders only.
pub async fn ticket_sales<'e, E: PgExecutor<'e>>(
    executor: E,
    event_id: Uuid,
) -> Result<Vec<TicketTypeSales>, sqlx::Error> {
    sqlx::query_as::<_, TicketTypeSales>(
        r#"
        SELECT t.id AS ticket_type_id,
               t.name,
               t.price,
               t.quantity_available,
               t.quantity_sold,
               COALESCE((
                   SELECT SUM(s.revenue) FROM ticket_sales s
                   JOIN orders o ON o.id = s.order_id
                   WHERE s.ticket_type_id = t.id AND o.status = 'completed'
               ), 0) AS revenue
        FROM ticket_types t
        WHERE t.event_id = $1
        ORDER BY t.price, t.name
        "#,
    )
    .bind(event_id)
    .fetch_all(executor)
    .await
}

pub async fn dashboard_totals<'e, E: PgExecutor<'e>>(
    executor: E,
    organizer_id: Uuid,
    now: DateTime<Utc>,
) -> Result<DashboardTotals, sqlx::Error> {
    sqlx::query_as::<_, DashboardTotals>(
        r#"
        SELECT
            (SELECT COUNT(*) FROM events WHERE organizer_id = $1) AS total_events,
            (SELECT COUNT(*) FROM events WHERE organizer_id = $1 AND status = 'published') AS published_events,
            (SELECT COUNT(*) FROM events WHERE organizer_id = $1 AND event_date >= $2
                AND status IN ('published', 'ongoing')) AS upcoming_events,
            (SELECT COUNT(*) FROM guests g JOIN events e ON e.id = g.event_id
                WHERE e.organizer_id = $1) AS total_guests,
            (SELECT COUNT(*) FROM guests g JOIN events e ON e.id = g.event_id
                WHERE e.organizer_id = $1 AND g.has_checked_in) AS total_checked_in,
            (SELECT COUNT(*) FROM tickets t JOIN events e ON e.id = t.event_id
                WHERE e.organizer_id = $1 AND t.status IN ('valid', 'used')) AS total_tickets_sold,
            (SELECT COUNT(*) FROM orders o JOIN events e ON e.id = o.event_id
                WHERE e.organizer_id = $1) AS total_orders,
            (SELECT COALESCE(SUM(o.total_amount), 0) FROM orders o JOIN events e ON e.id = o.event_id
                WHERE e.organizer_id = $1 AND o.status = 'completed') AS total_revenue
        "#,
    )
    .bind(organizer_id)
    .bind(now)
    .fetch_one(executor)
    .await
}
