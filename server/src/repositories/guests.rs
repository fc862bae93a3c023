use chrono::{DateTime, Utc};
use sqlx::{PgExecutor, PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use crate::models::guest::{Guest, GuestFilter, GuestSource, GuestStatus, GuestWithEvent, NewGuest};
use crate::utils::pagination::Pagination;

const SELECT_WITH_EVENT: &str =
    "SELECT g.*, e.title AS event_title, e.organizer_id FROM guests g JOIN events e ON e.id = g.event_id";

pub async fn insert<'e, E: PgExecutor<'e>>(
    executor: E,
    event_id: Uuid,
    guest: &NewGuest,
    status: GuestStatus,
    rsvp_status: bool,
    source: GuestSource,
) -> Result<Guest, sqlx::Error> {
    sqlx::query_as::<_, Guest>(
        r#"
        INSERT INTO guests (
            id, event_id, first_name, last_name, email, phone_number, company, title, notes,
            plus_one_allowed, plus_one_name, status, rsvp_status, rsvp_date, source
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13,
                CASE WHEN $13 THEN NOW() END, $14)
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(event_id)
    .bind(guest.first_name.trim())
    .bind(guest.last_name.trim())
    .bind(guest.email.trim().to_lowercase())
    .bind(&guest.phone_number)
    .bind(&guest.company)
    .bind(&guest.title)
    .bind(&guest.notes)
    .bind(guest.plus_one_allowed)
    .bind(&guest.plus_one_name)
    .bind(status)
    .bind(rsvp_status)
    .bind(source)
    .fetch_one(executor)
    .await
}

/// Records a ticket buyer as a confirmed guest of the event. An existing
/// guest with the same e-mail is confirmed in place and takes the buyer's
/// name; a blank phone keeps the stored one.
pub async fn upsert_purchaser<'e, E: PgExecutor<'e>>(
    executor: E,
    event_id: Uuid,
    first_name: &str,
    last_name: &str,
    email: &str,
    phone_number: Option<&str>,
) -> Result<Guest, sqlx::Error> {
    sqlx::query_as::<_, Guest>(
        r#"
        INSERT INTO guests (
            id, event_id, first_name, last_name, email, phone_number,
            status, rsvp_status, rsvp_date, invitation_sent, invitation_sent_at, source
        )
        VALUES ($1, $2, $3, $4, $5, $6, 'confirmed', TRUE, NOW(), TRUE, NOW(), 'ticket_purchase')
        ON CONFLICT (event_id, email) DO UPDATE
        SET first_name = EXCLUDED.first_name,
            last_name = EXCLUDED.last_name,
            phone_number = COALESCE(EXCLUDED.phone_number, guests.phone_number),
            status = CASE WHEN guests.status = 'attended' THEN guests.status ELSE 'confirmed' END,
            rsvp_status = TRUE,
            rsvp_date = COALESCE(guests.rsvp_date, NOW()),
            updated_at = NOW()
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(event_id)
    .bind(first_name)
    .bind(last_name)
    .bind(email)
    .bind(phone_number)
    .fetch_one(executor)
    .await
}

pub async fn find_by_id_for_update<'e, E: PgExecutor<'e>>(
    executor: E,
    id: Uuid,
) -> Result<Option<Guest>, sqlx::Error> {
    sqlx::query_as::<_, Guest>("SELECT * FROM guests WHERE id = $1 FOR UPDATE")
        .bind(id)
        .fetch_optional(executor)
        .await
}

pub async fn find_with_event<'e, E: PgExecutor<'e>>(
    executor: E,
    id: Uuid,
) -> Result<Option<GuestWithEvent>, sqlx::Error> {
    let sql = format!("{} WHERE g.id = $1", SELECT_WITH_EVENT);
    sqlx::query_as::<_, GuestWithEvent>(&sql)
        .bind(id)
        .fetch_optional(executor)
        .await
}

pub async fn find_many_with_event<'e, E: PgExecutor<'e>>(
    executor: E,
    ids: &[Uuid],
) -> Result<Vec<GuestWithEvent>, sqlx::Error> {
    let sql = format!("{} WHERE g.id = ANY($1)", SELECT_WITH_EVENT);
    sqlx::query_as::<_, GuestWithEvent>(&sql)
        .bind(ids)
        .fetch_all(executor)
        .await
}

pub async fn find_by_event_and_email_for_update<'e, E: PgExecutor<'e>>(
    executor: E,
    event_id: Uuid,
    email: &str,
) -> Result<Option<Guest>, sqlx::Error> {
    sqlx::query_as::<_, Guest>(
        "SELECT * FROM guests WHERE event_id = $1 AND email = $2 FOR UPDATE",
    )
    .bind(event_id)
    .bind(email.trim().to_lowercase())
    .fetch_optional(executor)
    .await
}

pub async fn count_for_event<'e, E: PgExecutor<'e>>(executor: E, event_id: Uuid) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar("SELECT COUNT(*) FROM guests WHERE event_id = $1")
        .bind(event_id)
        .fetch_one(executor)
        .await
}

pub async fn list_for_event<'e, E: PgExecutor<'e>>(
    executor: E,
    event_id: Uuid,
    status: Option<GuestStatus>,
) -> Result<Vec<Guest>, sqlx::Error> {
    sqlx::query_as::<_, Guest>(
        r#"
        SELECT * FROM guests
        WHERE event_id = $1 AND ($2::guest_status IS NULL OR status = $2)
        ORDER BY last_name, first_name
        "#,
    )
    .bind(event_id)
    .bind(status)
    .fetch_all(executor)
    .await
}

fn push_conditions(qb: &mut QueryBuilder<'_, Postgres>, organizer_id: Uuid, filter: &GuestFilter) {
    qb.push(" WHERE e.organizer_id = ").push_bind(organizer_id);
    if let Some(event_id) = filter.event {
        qb.push(" AND g.event_id = ").push_bind(event_id);
    }
    if let Some(checked_in) = filter.checked_in {
        qb.push(" AND g.has_checked_in = ").push_bind(checked_in);
    }
    if let Some(rsvp) = filter.rsvp {
        qb.push(" AND g.rsvp_status = ").push_bind(rsvp);
    }
    if let Some(status) = filter.status {
        qb.push(" AND g.status = ").push_bind(status);
    }
    if let Some(search) = filter.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        let pattern = format!("%{}%", search);
        qb.push(" AND (g.first_name ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR g.last_name ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR g.email ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR g.company ILIKE ")
            .push_bind(pattern)
            .push(")");
    }
}

pub async fn list(
    pool: &PgPool,
    organizer_id: Uuid,
    filter: &GuestFilter,
) -> Result<(Vec<GuestWithEvent>, i64), sqlx::Error> {
    let pagination = Pagination::new(filter.page, filter.page_size);

    let mut count = QueryBuilder::<Postgres>::new(
        "SELECT COUNT(*) FROM guests g JOIN events e ON e.id = g.event_id",
    );
    push_conditions(&mut count, organizer_id, filter);
    let total: i64 = count.build_query_scalar().fetch_one(pool).await?;

    let mut qb = QueryBuilder::<Postgres>::new(SELECT_WITH_EVENT);
    push_conditions(&mut qb, organizer_id, filter);
    qb.push(" ORDER BY g.created_at DESC LIMIT ")
        .push_bind(pagination.limit())
        .push(" OFFSET ")
        .push_bind(pagination.offset());

    let rows = qb.build_query_as::<GuestWithEvent>().fetch_all(pool).await?;
    Ok((rows, total))
}

pub async fn update<'e, E: PgExecutor<'e>>(executor: E, guest: &Guest) -> Result<Guest, sqlx::Error> {
    sqlx::query_as::<_, Guest>(
        r#"
        UPDATE guests
        SET first_name = $2, last_name = $3, email = $4, phone_number = $5, company = $6,
            title = $7, notes = $8, plus_one_allowed = $9, plus_one_name = $10, status = $11,
            rsvp_status = $12, rsvp_date = $13, updated_at = NOW()
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(guest.id)
    .bind(&guest.first_name)
    .bind(&guest.last_name)
    .bind(&guest.email)
    .bind(&guest.phone_number)
    .bind(&guest.company)
    .bind(&guest.title)
    .bind(&guest.notes)
    .bind(guest.plus_one_allowed)
    .bind(&guest.plus_one_name)
    .bind(guest.status)
    .bind(guest.rsvp_status)
    .bind(guest.rsvp_date)
    .fetch_one(executor)
    .await
}

pub async fn mark_checked_in<'e, E: PgExecutor<'e>>(
    executor: E,
    id: Uuid,
    checked_in_by: Option<&str>,
    at: DateTime<Utc>,
) -> Result<Guest, sqlx::Error> {
    sqlx::query_as::<_, Guest>(
        r#"
        UPDATE guests
        SET has_checked_in = TRUE, checked_in_at = $2, checked_in_by = $3,
            status = 'attended', updated_at = NOW()
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(at)
    .bind(checked_in_by)
    .fetch_one(executor)
    .await
}

pub async fn mark_invited<'e, E: PgExecutor<'e>>(executor: E, id: Uuid) -> Result<(), sqlx::Error> {
    sqlx::query(
        "UPDATE guests SET invitation_sent = TRUE, invitation_sent_at = NOW(), updated_at = NOW() WHERE id = $1",
    )
    .bind(id)
    .execute(executor)
    .await?;
    Ok(())
}

pub async fn delete<'e, E: PgExecutor<'e>>(executor: E, id: Uuid) -> Result<u64, sqlx::Error> {
    let result = sqlx::query("DELETE FROM guests WHERE id = $1")
        .bind(id)
        .execute(executor)
        .await?;
    Ok(result.rows_affected())
}
