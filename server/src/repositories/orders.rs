use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{PgExecutor, PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use crate::models::order::{
    Order, OrderFilter, OrderItem, OrderItemDetail, OrderStatus, OrderWithEvent, PaymentStatus,
};
use crate::utils::pagination::Pagination;

const SELECT_WITH_EVENT: &str =
    "SELECT o.*, e.title AS event_title, e.organizer_id FROM orders o JOIN events e ON e.id = o.event_id";

/// Who is asking for orders: organizers see their events' orders, customers
/// see the orders placed under their e-mail.
#[derive(Debug, Clone, Copy)]
pub enum OrderViewer<'a> {
    Organizer(Uuid),
    Customer(&'a str),
}

pub struct NewOrder<'a> {
    pub order_number: &'a str,
    pub event_id: Uuid,
    pub customer_name: &'a str,
    pub customer_email: &'a str,
    pub customer_phone: &'a str,
    pub subtotal: Decimal,
    pub discount_amount: Decimal,
    pub total_amount: Decimal,
    pub discount_code_id: Option<Uuid>,
    pub ip_address: Option<&'a str>,
}

pub async fn insert<'e, E: PgExecutor<'e>>(executor: E, new: NewOrder<'_>) -> Result<Order, sqlx::Error> {
    sqlx::query_as::<_, Order>(
        r#"
        INSERT INTO orders (
            id, order_number, event_id, customer_name, customer_email, customer_phone,
            subtotal, discount_amount, tax_amount, total_amount, discount_code_id, ip_address
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, 0, $9, $10, $11)
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(new.order_number)
    .bind(new.event_id)
    .bind(new.customer_name)
    .bind(new.customer_email)
    .bind(new.customer_phone)
    .bind(new.subtotal)
    .bind(new.discount_amount)
    .bind(new.total_amount)
    .bind(new.discount_code_id)
    .bind(new.ip_address)
    .fetch_one(executor)
    .await
}

pub async fn insert_item<'e, E: PgExecutor<'e>>(
    executor: E,
    order_id: Uuid,
    ticket_type_id: Uuid,
    quantity: i32,
    unit_price: Decimal,
) -> Result<OrderItem, sqlx::Error> {
    sqlx::query_as::<_, OrderItem>(
        r#"
        INSERT INTO order_items (id, order_id, ticket_type_id, quantity, unit_price, total_price)
        VALUES ($1, $2, $3, $4, $5, $6)
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(order_id)
    .bind(ticket_type_id)
    .bind(quantity)
    .bind(unit_price)
    .bind(unit_price * Decimal::from(quantity))
    .fetch_one(executor)
    .await
}

pub async fn insert_sale<'e, E: PgExecutor<'e>>(executor: E, order: &Order, item: &OrderItem) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO ticket_sales (id, event_id, ticket_type_id, order_id, quantity_sold, revenue)
        VALUES ($1, $2, $3, $4, $5, $6)
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(order.event_id)
    .bind(item.ticket_type_id)
    .bind(order.id)
    .bind(item.quantity)
    .bind(item.total_price)
    .execute(executor)
    .await?;
    Ok(())
}

pub async fn delete_sales<'e, E: PgExecutor<'e>>(executor: E, order_id: Uuid) -> Result<(), sqlx::Error> {
    sqlx::query("DELETE FROM ticket_sales WHERE order_id = $1")
        .bind(order_id)
        .execute(executor)
        .await?;
    Ok(())
}

pub async fn items<'e, E: PgExecutor<'e>>(executor: E, order_id: Uuid) -> Result<Vec<OrderItem>, sqlx::Error> {
    sqlx::query_as::<_, OrderItem>("SELECT * FROM order_items WHERE order_id = $1 ORDER BY created_at")
        .bind(order_id)
        .fetch_all(executor)
        .await
}

pub async fn item_details<'e, E: PgExecutor<'e>>(
    executor: E,
    order_ids: &[Uuid],
) -> Result<Vec<OrderItemDetail>, sqlx::Error> {
    sqlx::query_as::<_, OrderItemDetail>(
        r#"
        SELECT oi.*, t.name AS ticket_type_name, t.category AS ticket_type_category
        FROM order_items oi
        JOIN ticket_types t ON t.id = oi.ticket_type_id
        WHERE oi.order_id = ANY($1)
        ORDER BY oi.created_at
        "#,
    )
    .bind(order_ids)
    .fetch_all(executor)
    .await
}

pub async fn find_with_event<'e, E: PgExecutor<'e>>(
    executor: E,
    id: Uuid,
) -> Result<Option<OrderWithEvent>, sqlx::Error> {
    let sql = format!("{} WHERE o.id = $1", SELECT_WITH_EVENT);
    sqlx::query_as::<_, OrderWithEvent>(&sql)
        .bind(id)
        .fetch_optional(executor)
        .await
}

pub async fn find_by_id_for_update<'e, E: PgExecutor<'e>>(
    executor: E,
    id: Uuid,
) -> Result<Option<Order>, sqlx::Error> {
    sqlx::query_as::<_, Order>("SELECT * FROM orders WHERE id = $1 FOR UPDATE")
        .bind(id)
        .fetch_optional(executor)
        .await
}

pub async fn find_by_number<'e, E: PgExecutor<'e>>(
    executor: E,
    order_number: &str,
) -> Result<Option<Order>, sqlx::Error> {
    sqlx::query_as::<_, Order>("SELECT * FROM orders WHERE order_number = $1")
        .bind(order_number)
        .fetch_optional(executor)
        .await
}

pub async fn list(
    pool: &PgPool,
    viewer: OrderViewer<'_>,
    filter: &OrderFilter,
) -> Result<(Vec<OrderWithEvent>, i64), sqlx::Error> {
    let pagination = Pagination::new(filter.page, filter.page_size);

    fn push_conditions(qb: &mut QueryBuilder<'_, Postgres>, viewer: OrderViewer<'_>, filter: &OrderFilter) {
        match viewer {
            OrderViewer::Organizer(id) => {
                qb.push(" WHERE e.organizer_id = ").push_bind(id);
            }
            OrderViewer::Customer(email) => {
                qb.push(" WHERE o.customer_email = ").push_bind(email.to_string());
            }
        }
        if let Some(event_id) = filter.event {
            qb.push(" AND o.event_id = ").push_bind(event_id);
        }
        if let Some(status) = filter.status {
            qb.push(" AND o.status = ").push_bind(status);
        }
        if let Some(payment_status) = filter.payment_status {
            qb.push(" AND o.payment_status = ").push_bind(payment_status);
        }
    }

    let mut count =
        QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM orders o JOIN events e ON e.id = o.event_id");
    push_conditions(&mut count, viewer, filter);
    let total: i64 = count.build_query_scalar().fetch_one(pool).await?;

    let mut qb = QueryBuilder::<Postgres>::new(SELECT_WITH_EVENT);
    push_conditions(&mut qb, viewer, filter);
    qb.push(" ORDER BY o.created_at DESC LIMIT ")
        .push_bind(pagination.limit())
        .push(" OFFSET ")
        .push_bind(pagination.offset());

    let rows = qb.build_query_as::<OrderWithEvent>().fetch_all(pool).await?;
    Ok((rows, total))
}

pub async fn mark_settled<'e, E: PgExecutor<'e>>(
    executor: E,
    id: Uuid,
    payment_method: &str,
    payment_reference: &str,
    paid_at: DateTime<Utc>,
) -> Result<Order, sqlx::Error> {
    sqlx::query_as::<_, Order>(
        r#"
        UPDATE orders
        SET status = 'completed', payment_status = 'successful', payment_method = $2,
            payment_reference = $3, payment_date = $4, updated_at = NOW()
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(payment_method)
    .bind(payment_reference)
    .bind(paid_at)
    .fetch_one(executor)
    .await
}

pub async fn set_status<'e, E: PgExecutor<'e>>(
    executor: E,
    id: Uuid,
    status: OrderStatus,
    payment_status: PaymentStatus,
) -> Result<Order, sqlx::Error> {
    sqlx::query_as::<_, Order>(
        "UPDATE orders SET status = $2, payment_status = $3, updated_at = NOW() WHERE id = $1 RETURNING *",
    )
    .bind(id)
    .bind(status)
    .bind(payment_status)
    .fetch_one(executor)
    .await
}

/// Non-cancelled orders a customer has placed with a discount code.
pub async fn count_code_uses_by_email<'e, E: PgExecutor<'e>>(
    executor: E,
    discount_code_id: Uuid,
    email: &str,
) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar(
        r#"
        SELECT COUNT(*) FROM orders
        WHERE discount_code_id = $1 AND customer_email = $2
          AND status NOT IN ('cancelled', 'failed')
        "#,
    )
    .bind(discount_code_id)
    .bind(email)
    .fetch_one(executor)
    .await
}

/// Settled orders for an event that still hold unused valid tickets.
pub async fn with_unused_tickets<'e, E: PgExecutor<'e>>(
    executor: E,
    event_id: Uuid,
) -> Result<Vec<Order>, sqlx::Error> {
    sqlx::query_as::<_, Order>(
        r#"
        SELECT o.* FROM orders o
        WHERE o.event_id = $1 AND o.status = 'completed' AND o.payment_status = 'successful'
          AND EXISTS (
              SELECT 1 FROM tickets t
              JOIN order_items oi ON oi.id = t.order_item_id
              WHERE oi.order_id = o.id AND t.status = 'valid' AND NOT t.checked_in
          )
        ORDER BY o.created_at
        "#,
    )
    .bind(event_id)
    .fetch_all(executor)
    .await
}
