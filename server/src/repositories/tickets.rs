use chrono::{DateTime, Utc};
use sqlx::{PgExecutor, PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use super::orders::OrderViewer;
use crate::models::order::{Order, OrderItem};
use crate::models::ticket::{Ticket, TicketDetail, TicketFilter};
use crate::utils::pagination::Pagination;

const SELECT_DETAIL: &str = r#"
SELECT t.*,
       tt.name AS ticket_type_name,
       e.title AS event_title,
       e.event_date,
       e.location AS event_location,
       e.organizer_id,
       o.order_number
FROM tickets t
JOIN ticket_types tt ON tt.id = t.ticket_type_id
JOIN events e ON e.id = t.event_id
JOIN order_items oi ON oi.id = t.order_item_id
JOIN orders o ON o.id = oi.order_id
"#;

pub async fn insert<'e, E: PgExecutor<'e>>(
    executor: E,
    ticket_number: &str,
    order: &Order,
    item: &OrderItem,
) -> Result<Ticket, sqlx::Error> {
    sqlx::query_as::<_, Ticket>(
        r#"
        INSERT INTO tickets (
            id, ticket_number, ticket_code, order_item_id, ticket_type_id, event_id,
            holder_name, holder_email, holder_phone
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(ticket_number)
    .bind(Uuid::new_v4())
    .bind(item.id)
    .bind(item.ticket_type_id)
    .bind(order.event_id)
    .bind(&order.customer_name)
    .bind(&order.customer_email)
    .bind(&order.customer_phone)
    .fetch_one(executor)
    .await
}

pub async fn for_order<'e, E: PgExecutor<'e>>(executor: E, order_id: Uuid) -> Result<Vec<TicketDetail>, sqlx::Error> {
    let sql = format!("{} WHERE o.id = $1 ORDER BY t.ticket_number", SELECT_DETAIL);
    sqlx::query_as::<_, TicketDetail>(&sql)
        .bind(order_id)
        .fetch_all(executor)
        .await
}

pub async fn lock_for_order<'e, E: PgExecutor<'e>>(executor: E, order_id: Uuid) -> Result<Vec<Ticket>, sqlx::Error> {
    sqlx::query_as::<_, Ticket>(
        r#"
        SELECT t.* FROM tickets t
        JOIN order_items oi ON oi.id = t.order_item_id
        WHERE oi.order_id = $1
        ORDER BY t.id
        FOR UPDATE OF t
        "#,
    )
    .bind(order_id)
    .fetch_all(executor)
    .await
}

pub async fn find_detail_by_id<'e, E: PgExecutor<'e>>(
    executor: E,
    id: Uuid,
) -> Result<Option<TicketDetail>, sqlx::Error> {
    let sql = format!("{} WHERE t.id = $1", SELECT_DETAIL);
    sqlx::query_as::<_, TicketDetail>(&sql)
        .bind(id)
        .fetch_optional(executor)
        .await
}

pub async fn find_detail_by_number<'e, E: PgExecutor<'e>>(
    executor: E,
    ticket_number: &str,
) -> Result<Option<TicketDetail>, sqlx::Error> {
    let sql = format!("{} WHERE t.ticket_number = $1", SELECT_DETAIL);
    sqlx::query_as::<_, TicketDetail>(&sql)
        .bind(ticket_number)
        .fetch_optional(executor)
        .await
}

pub async fn find_by_id_for_update<'e, E: PgExecutor<'e>>(
    executor: E,
    id: Uuid,
) -> Result<Option<Ticket>, sqlx::Error> {
    sqlx::query_as::<_, Ticket>("SELECT * FROM tickets WHERE id = $1 FOR UPDATE")
        .bind(id)
        .fetch_optional(executor)
        .await
}

pub async fn mark_checked_in<'e, E: PgExecutor<'e>>(
    executor: E,
    id: Uuid,
    checked_in_by: Uuid,
    at: DateTime<Utc>,
) -> Result<Ticket, sqlx::Error> {
    sqlx::query_as::<_, Ticket>(
        r#"
        UPDATE tickets
        SET checked_in = TRUE, checked_in_at = $2, checked_in_by = $3, status = 'used', updated_at = NOW()
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

pub async fn cancel_valid_for_order<'e, E: PgExecutor<'e>>(executor: E, order_id: Uuid) -> Result<u64, sqlx::Error> {
    let result = sqlx::query(
        r#"
        UPDATE tickets SET status = 'cancelled', updated_at = NOW()
        WHERE status = 'valid'
          AND order_item_id IN (SELECT id FROM order_items WHERE order_id = $1)
        "#,
    )
    .bind(order_id)
    .execute(executor)
    .await?;
    Ok(result.rows_affected())
}

pub async fn list(
    pool: &PgPool,
    viewer: OrderViewer<'_>,
    filter: &TicketFilter,
) -> Result<(Vec<TicketDetail>, i64), sqlx::Error> {
    let pagination = Pagination::new(filter.page, filter.page_size);

    fn push_conditions(qb: &mut QueryBuilder<'_, Postgres>, viewer: OrderViewer<'_>, filter: &TicketFilter) {
        match viewer {
            OrderViewer::Organizer(id) => {
                qb.push(" WHERE e.organizer_id = ").push_bind(id);
            }
            OrderViewer::Customer(email) => {
                qb.push(" WHERE o.customer_email = ").push_bind(email.to_string());
            }
        }
        if let Some(event_id) = filter.event {
            qb.push(" AND t.event_id = ").push_bind(event_id);
        }
        if let Some(email) = filter.email.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            qb.push(" AND t.holder_email = ").push_bind(email.to_lowercase());
        }
        if let Some(number) = filter.ticket_number.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            qb.push(" AND t.ticket_number = ").push_bind(number.to_uppercase());
        }
    }

    let mut count = QueryBuilder::<Postgres>::new(
        r#"SELECT COUNT(*) FROM tickets t
           JOIN events e ON e.id = t.event_id
           JOIN order_items oi ON oi.id = t.order_item_id
           JOIN orders o ON o.id = oi.order_id"#,
    );
    push_conditions(&mut count, viewer, filter);
    let total: i64 = count.build_query_scalar().fetch_one(pool).await?;

    let mut qb = QueryBuilder::<Postgres>::new(SELECT_DETAIL);
    push_conditions(&mut qb, viewer, filter);
    qb.push(" ORDER BY t.created_at DESC, t.ticket_number LIMIT ")
        .push_bind(pagination.limit())
        .push(" OFFSET ")
        .push_bind(pagination.offset());

    let rows = qb.build_query_as::<TicketDetail>().fetch_all(pool).await?;
    Ok((rows, total))
}
