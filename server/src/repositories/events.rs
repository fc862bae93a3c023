use chrono::{DateTime, Utc};
use sqlx::{PgExecutor, PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use crate::models::event::{Event, EventFilter, EventOrdering, EventStatus, EventWithCounts};
use crate::utils::pagination::Pagination;

const SELECT_WITH_COUNTS: &str = r#"
SELECT e.*,
       g.total_guests,
       g.checked_in_count,
       g.pending_count,
       EXISTS (SELECT 1 FROM ticket_types t WHERE t.event_id = e.id) AS has_tickets
FROM events e
CROSS JOIN LATERAL (
    SELECT COUNT(*) AS total_guests,
           COUNT(*) FILTER (WHERE has_checked_in) AS checked_in_count,
           COUNT(*) FILTER (WHERE status = 'pending') AS pending_count
    FROM guests
    WHERE guests.event_id = e.id
) g
"#;

/// Which slice of events a listing covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventScope {
    Organizer(Uuid),
    Upcoming(Uuid),
    Past(Uuid),
    Public,
}

pub async fn insert<'e, E: PgExecutor<'e>>(executor: E, event: &Event) -> Result<Event, sqlx::Error> {
    sqlx::query_as::<_, Event>(
        r#"
        INSERT INTO events (
            id, organizer_id, title, slug, description, event_date, event_end_date,
            location, venue_name, address, capacity, allow_plus_one, require_rsvp,
            enable_self_checkin, checkin_start_time, checkin_end_time, status, is_public,
            created_at, updated_at
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18, $19, $19)
        RETURNING *
        "#,
    )
    .bind(event.id)
    .bind(event.organizer_id)
    .bind(&event.title)
    .bind(&event.slug)
    .bind(&event.description)
    .bind(event.event_date)
    .bind(event.event_end_date)
    .bind(&event.location)
    .bind(&event.venue_name)
    .bind(&event.address)
    .bind(event.capacity)
    .bind(event.allow_plus_one)
    .bind(event.require_rsvp)
    .bind(event.enable_self_checkin)
    .bind(event.checkin_start_time)
    .bind(event.checkin_end_time)
    .bind(event.status)
    .bind(event.is_public)
    .bind(event.created_at)
    .fetch_one(executor)
    .await
}

pub async fn find_by_id<'e, E: PgExecutor<'e>>(executor: E, id: Uuid) -> Result<Option<Event>, sqlx::Error> {
    sqlx::query_as::<_, Event>("SELECT * FROM events WHERE id = $1")
        .bind(id)
        .fetch_optional(executor)
        .await
}

/// Locks the event row for the rest of the transaction.
pub async fn find_by_id_for_update<'e, E: PgExecutor<'e>>(
    executor: E,
    id: Uuid,
) -> Result<Option<Event>, sqlx::Error> {
    sqlx::query_as::<_, Event>("SELECT * FROM events WHERE id = $1 FOR UPDATE")
        .bind(id)
        .fetch_optional(executor)
        .await
}

pub async fn find_with_counts<'e, E: PgExecutor<'e>>(
    executor: E,
    id: Uuid,
) -> Result<Option<EventWithCounts>, sqlx::Error> {
    let sql = format!("{} WHERE e.id = $1", SELECT_WITH_COUNTS);
    sqlx::query_as::<_, EventWithCounts>(&sql)
        .bind(id)
        .fetch_optional(executor)
        .await
}

pub async fn find_public_by_slug<'e, E: PgExecutor<'e>>(
    executor: E,
    slug: &str,
) -> Result<Option<EventWithCounts>, sqlx::Error> {
    let sql = format!(
        "{} WHERE e.slug = $1 AND e.is_public AND e.status IN ('published', 'ongoing')",
        SELECT_WITH_COUNTS
    );
    sqlx::query_as::<_, EventWithCounts>(&sql)
        .bind(slug)
        .fetch_optional(executor)
        .await
}

fn push_conditions(
    qb: &mut QueryBuilder<'_, Postgres>,
    scope: EventScope,
    filter: &EventFilter,
    now: DateTime<Utc>,
) {
    match scope {
        EventScope::Organizer(organizer_id) => {
            qb.push(" WHERE e.organizer_id = ").push_bind(organizer_id);
        }
        EventScope::Upcoming(organizer_id) => {
            qb.push(" WHERE e.organizer_id = ")
                .push_bind(organizer_id)
                .push(" AND e.event_date >= ")
                .push_bind(now)
                .push(" AND e.status IN ('published', 'ongoing')");
        }
        EventScope::Past(organizer_id) => {
            qb.push(" WHERE e.organizer_id = ")
                .push_bind(organizer_id)
                .push(" AND e.event_date < ")
                .push_bind(now);
        }
        EventScope::Public => {
            qb.push(" WHERE e.is_public AND e.status IN ('published', 'ongoing')");
        }
    }

    if let Some(status) = filter.status {
        qb.push(" AND e.status = ").push_bind(status);
    }
    if let Some(start) = filter.start_date {
        qb.push(" AND e.event_date >= ").push_bind(start);
    }
    if let Some(end) = filter.end_date {
        qb.push(" AND e.event_date <= ").push_bind(end);
    }
    if let Some(search) = filter.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        let pattern = format!("%{}%", search);
        qb.push(" AND (e.title ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR e.description ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR e.location ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR e.venue_name ILIKE ")
            .push_bind(pattern)
            .push(")");
    }
}

pub async fn list(
    pool: &PgPool,
    scope: EventScope,
    filter: &EventFilter,
    now: DateTime<Utc>,
) -> Result<(Vec<EventWithCounts>, i64), sqlx::Error> {
    let pagination = Pagination::new(filter.page, filter.page_size);

    let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM events e");
    push_conditions(&mut count, scope, filter, now);
    let total: i64 = count.build_query_scalar().fetch_one(pool).await?;

    let mut qb = QueryBuilder::<Postgres>::new(SELECT_WITH_COUNTS);
    push_conditions(&mut qb, scope, filter, now);

    let (column, descending) = match scope {
        EventScope::Upcoming(_) | EventScope::Public if filter.ordering.is_none() => {
            ("e.event_date", false)
        }
        _ => {
            let (ordering, descending) = EventOrdering::parse(filter.ordering.as_deref());
            (ordering.column(), descending)
        }
    };
    qb.push(" ORDER BY ")
        .push(column)
        .push(if descending { " DESC" } else { " ASC" })
        .push(" LIMIT ")
        .push_bind(pagination.limit())
        .push(" OFFSET ")
        .push_bind(pagination.offset());

    let rows = qb
        .build_query_as::<EventWithCounts>()
        .fetch_all(pool)
        .await?;
    Ok((rows, total))
}

pub async fn recent_for_organizer<'e, E: PgExecutor<'e>>(
    executor: E,
    organizer_id: Uuid,
    limit: i64,
) -> Result<Vec<EventWithCounts>, sqlx::Error> {
    let sql = format!(
        "{} WHERE e.organizer_id = $1 ORDER BY e.created_at DESC LIMIT $2",
        SELECT_WITH_COUNTS
    );
    sqlx::query_as::<_, EventWithCounts>(&sql)
        .bind(organizer_id)
        .bind(limit)
        .fetch_all(executor)
        .await
}

pub async fn update<'e, E: PgExecutor<'e>>(executor: E, event: &Event) -> Result<Event, sqlx::Error> {
    sqlx::query_as::<_, Event>(
        r#"
        UPDATE events
        SET title = $2,
            description = $3,
            event_date = $4,
            event_end_date = $5,
            location = $6,
            venue_name = $7,
            address = $8,
            capacity = $9,
            allow_plus_one = $10,
            require_rsvp = $11,
            enable_self_checkin = $12,
            checkin_start_time = $13,
            checkin_end_time = $14,
            status = $15,
            is_public = $16,
            updated_at = NOW()
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(event.id)
    .bind(&event.title)
    .bind(&event.description)
    .bind(event.event_date)
    .bind(event.event_end_date)
    .bind(&event.location)
    .bind(&event.venue_name)
    .bind(&event.address)
    .bind(event.capacity)
    .bind(event.allow_plus_one)
    .bind(event.require_rsvp)
    .bind(event.enable_self_checkin)
    .bind(event.checkin_start_time)
    .bind(event.checkin_end_time)
    .bind(event.status)
    .bind(event.is_public)
    .fetch_one(executor)
    .await
}

pub async fn set_status<'e, E: PgExecutor<'e>>(
    executor: E,
    id: Uuid,
    status: EventStatus,
) -> Result<Event, sqlx::Error> {
    sqlx::query_as::<_, Event>(
        "UPDATE events SET status = $2, updated_at = NOW() WHERE id = $1 RETURNING *",
    )
    .bind(id)
    .bind(status)
    .fetch_one(executor)
    .await
}

pub async fn delete<'e, E: PgExecutor<'e>>(executor: E, id: Uuid) -> Result<u64, sqlx::Error> {
    let result = sqlx::query("DELETE FROM events WHERE id = $1")
        .bind(id)
        .execute(executor)
        .await?;
    Ok(result.rows_affected())
}
