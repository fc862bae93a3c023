use sqlx::{PgExecutor, PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use crate::models::checkin::{CheckIn, CheckInDetail, CheckInFilter, CheckInMethod, MethodCounts};
use crate::utils::pagination::Pagination;

const SELECT_DETAIL: &str = r#"
SELECT c.*,
       TRIM(g.first_name || ' ' || g.last_name) AS guest_name,
       g.email AS guest_email,
       g.event_id,
       e.title AS event_title,
       NULLIF(TRIM(COALESCE(u.first_name, '') || ' ' || COALESCE(u.last_name, '')), '') AS checked_in_by_name
FROM check_ins c
JOIN guests g ON g.id = c.guest_id
JOIN events e ON e.id = g.event_id
LEFT JOIN users u ON u.id = c.checked_in_by
"#;

pub struct NewCheckIn<'a> {
    pub guest_id: Uuid,
    pub checked_in_by: Option<Uuid>,
    pub method: CheckInMethod,
    pub notes: Option<&'a str>,
    pub ip_address: Option<&'a str>,
}

pub async fn insert<'e, E: PgExecutor<'e>>(executor: E, new: NewCheckIn<'_>) -> Result<CheckIn, sqlx::Error> {
    sqlx::query_as::<_, CheckIn>(
        r#"
        INSERT INTO check_ins (id, guest_id, checked_in_by, check_in_method, notes, ip_address)
        VALUES ($1, $2, $3, $4, $5, $6)
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(new.guest_id)
    .bind(new.checked_in_by)
    .bind(new.method)
    .bind(new.notes)
    .bind(new.ip_address)
    .fetch_one(executor)
    .await
}

/// Check-in history for an organizer's events, newest first.
pub async fn list(
    pool: &PgPool,
    organizer_id: Uuid,
    filter: &CheckInFilter,
) -> Result<(Vec<CheckInDetail>, i64), sqlx::Error> {
    let pagination = Pagination::new(filter.page, filter.page_size);

    let mut count = QueryBuilder::<Postgres>::new(
        "SELECT COUNT(*) FROM check_ins c JOIN guests g ON g.id = c.guest_id JOIN events e ON e.id = g.event_id WHERE e.organizer_id = ",
    );
    count.push_bind(organizer_id);
    if let Some(event_id) = filter.event {
        count.push(" AND g.event_id = ").push_bind(event_id);
    }
    let total: i64 = count.build_query_scalar().fetch_one(pool).await?;

    let mut qb = QueryBuilder::<Postgres>::new(SELECT_DETAIL);
    qb.push(" WHERE e.organizer_id = ").push_bind(organizer_id);
    if let Some(event_id) = filter.event {
        qb.push(" AND g.event_id = ").push_bind(event_id);
    }
    qb.push(" ORDER BY c.created_at DESC LIMIT ")
        .push_bind(pagination.limit())
        .push(" OFFSET ")
        .push_bind(pagination.offset());

    let rows = qb.build_query_as::<CheckInDetail>().fetch_all(pool).await?;
    Ok((rows, total))
}

pub async fn method_counts<'e, E: PgExecutor<'e>>(
    executor: E,
    event_id: Uuid,
) -> Result<MethodCounts, sqlx::Error> {
    sqlx::query_as::<_, MethodCounts>(
        r#"
        SELECT COUNT(*) FILTER (WHERE c.check_in_method = 'qr_scan') AS qr_scan,
               COUNT(*) FILTER (WHERE c.check_in_method = 'manual') AS manual,
               COUNT(*) FILTER (WHERE c.check_in_method = 'self_checkin') AS self_checkin,
               COUNT(*) FILTER (WHERE c.check_in_method = 'ticket_scan') AS ticket_scan
        FROM check_ins c
        JOIN guests g ON g.id = c.guest_id
        WHERE g.event_id = $1
        "#,
    )
    .bind(event_id)
    .fetch_one(executor)
    .await
}
