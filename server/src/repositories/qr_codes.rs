use chrono::{DateTime, Utc};
use sqlx::{PgExecutor, PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use crate::models::qr_code::{QrCode, QrCodeDetail, QrCodeFilter};
use crate::utils::pagination::Pagination;

const SELECT_DETAIL: &str = r#"
SELECT q.*,
       g.event_id,
       e.organizer_id,
       TRIM(g.first_name || ' ' || g.last_name) AS guest_name,
       g.email AS guest_email,
       e.title AS event_title
FROM qr_codes q
JOIN guests g ON g.id = q.guest_id
JOIN events e ON e.id = g.event_id
"#;

/// Inserts a code for the guest unless one already exists.
pub async fn insert_if_absent<'e, E: PgExecutor<'e>>(
    executor: E,
    guest_id: Uuid,
    token: &str,
) -> Result<Option<QrCode>, sqlx::Error> {
    sqlx::query_as::<_, QrCode>(
        r#"
        INSERT INTO qr_codes (id, guest_id, token) VALUES ($1, $2, $3)
        ON CONFLICT (guest_id) DO NOTHING
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(guest_id)
    .bind(token)
    .fetch_optional(executor)
    .await
}

pub async fn find_by_guest<'e, E: PgExecutor<'e>>(
    executor: E,
    guest_id: Uuid,
) -> Result<Option<QrCode>, sqlx::Error> {
    sqlx::query_as::<_, QrCode>("SELECT * FROM qr_codes WHERE guest_id = $1")
        .bind(guest_id)
        .fetch_optional(executor)
        .await
}

pub async fn find_by_guest_for_update<'e, E: PgExecutor<'e>>(
    executor: E,
    guest_id: Uuid,
) -> Result<Option<QrCode>, sqlx::Error> {
    sqlx::query_as::<_, QrCode>("SELECT * FROM qr_codes WHERE guest_id = $1 FOR UPDATE")
        .bind(guest_id)
        .fetch_optional(executor)
        .await
}

pub async fn find_detail_by_id<'e, E: PgExecutor<'e>>(
    executor: E,
    id: Uuid,
) -> Result<Option<QrCodeDetail>, sqlx::Error> {
    let sql = format!("{} WHERE q.id = $1", SELECT_DETAIL);
    sqlx::query_as::<_, QrCodeDetail>(&sql)
        .bind(id)
        .fetch_optional(executor)
        .await
}

pub async fn find_detail_by_token<'e, E: PgExecutor<'e>>(
    executor: E,
    token: &str,
) -> Result<Option<QrCodeDetail>, sqlx::Error> {
    let sql = format!("{} WHERE q.token = $1", SELECT_DETAIL);
    sqlx::query_as::<_, QrCodeDetail>(&sql)
        .bind(token)
        .fetch_optional(executor)
        .await
}

/// Replaces the token of an unused code.
pub async fn replace_token<'e, E: PgExecutor<'e>>(
    executor: E,
    id: Uuid,
    token: &str,
) -> Result<QrCode, sqlx::Error> {
    sqlx::query_as::<_, QrCode>(
        "UPDATE qr_codes SET token = $2, updated_at = NOW() WHERE id = $1 RETURNING *",
    )
    .bind(id)
    .bind(token)
    .fetch_one(executor)
    .await
}

pub async fn mark_used<'e, E: PgExecutor<'e>>(
    executor: E,
    id: Uuid,
    at: DateTime<Utc>,
) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE qr_codes SET is_used = TRUE, used_at = $2, updated_at = NOW() WHERE id = $1")
        .bind(id)
        .bind(at)
        .execute(executor)
        .await?;
    Ok(())
}

pub async fn list(
    pool: &PgPool,
    organizer_id: Uuid,
    filter: &QrCodeFilter,
) -> Result<(Vec<QrCodeDetail>, i64), sqlx::Error> {
    let pagination = Pagination::new(filter.page, filter.page_size);

    fn push_conditions(qb: &mut QueryBuilder<'_, Postgres>, organizer_id: Uuid, filter: &QrCodeFilter) {
        qb.push(" WHERE e.organizer_id = ").push_bind(organizer_id);
        if let Some(event_id) = filter.event {
            qb.push(" AND g.event_id = ").push_bind(event_id);
        }
        if let Some(is_used) = filter.is_used {
            qb.push(" AND q.is_used = ").push_bind(is_used);
        }
    }

    let mut count = QueryBuilder::<Postgres>::new(
        "SELECT COUNT(*) FROM qr_codes q JOIN guests g ON g.id = q.guest_id JOIN events e ON e.id = g.event_id",
    );
    push_conditions(&mut count, organizer_id, filter);
    let total: i64 = count.build_query_scalar().fetch_one(pool).await?;

    let mut qb = QueryBuilder::<Postgres>::new(SELECT_DETAIL);
    push_conditions(&mut qb, organizer_id, filter);
    qb.push(" ORDER BY q.created_at DESC LIMIT ")
        .push_bind(pagination.limit())
        .push(" OFFSET ")
        .push_bind(pagination.offset());

    let rows = qb.build_query_as::<QrCodeDetail>().fetch_all(pool).await?;
    Ok((rows, total))
}

pub async fn delete<'e, E: PgExecutor<'e>>(executor: E, id: Uuid) -> Result<u64, sqlx::Error> {
    let result = sqlx::query("DELETE FROM qr_codes WHERE id = $1")
        .bind(id)
        .execute(executor)
        .await?;
    Ok(result.rows_affected())
}
