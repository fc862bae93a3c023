use chrono::{DateTime, Utc};
use sqlx::{PgExecutor, PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use crate::models::ticket::{CreateTicketTypeRequest, NewBenefit, TicketBenefit, TicketType, TicketTypeFilter};
use crate::utils::pagination::Pagination;

pub async fn insert<'e, E: PgExecutor<'e>>(
    executor: E,
    req: &CreateTicketTypeRequest,
) -> Result<TicketType, sqlx::Error> {
    sqlx::query_as::<_, TicketType>(
        r#"
        INSERT INTO ticket_types (
            id, event_id, name, category, description, price, quantity_available,
            sale_start_date, sale_end_date, min_purchase, max_purchase, is_active, is_visible
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(req.event)
    .bind(req.name.trim())
    .bind(req.category)
    .bind(&req.description)
    .bind(req.price)
    .bind(req.quantity_available)
    .bind(req.sale_start_date)
    .bind(req.sale_end_date)
    .bind(req.min_purchase)
    .bind(req.max_purchase)
    .bind(req.is_active)
    .bind(req.is_visible)
    .fetch_one(executor)
    .await
}

pub async fn insert_benefit<'e, E: PgExecutor<'e>>(
    executor: E,
    ticket_type_id: Uuid,
    benefit: &NewBenefit,
) -> Result<TicketBenefit, sqlx::Error> {
    sqlx::query_as::<_, TicketBenefit>(
        r#"
        INSERT INTO ticket_benefits (id, ticket_type_id, title, description, icon, display_order)
        VALUES ($1, $2, $3, $4, $5, $6)
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(ticket_type_id)
    .bind(&benefit.title)
    .bind(&benefit.description)
    .bind(&benefit.icon)
    .bind(benefit.display_order)
    .fetch_one(executor)
    .await
}

pub async fn benefits_for<'e, E: PgExecutor<'e>>(
    executor: E,
    ticket_type_ids: &[Uuid],
) -> Result<Vec<TicketBenefit>, sqlx::Error> {
    sqlx::query_as::<_, TicketBenefit>(
        "SELECT * FROM ticket_benefits WHERE ticket_type_id = ANY($1) ORDER BY display_order, title",
    )
    .bind(ticket_type_ids)
    .fetch_all(executor)
    .await
}

pub async fn find_by_id<'e, E: PgExecutor<'e>>(
    executor: E,
    id: Uuid,
) -> Result<Option<TicketType>, sqlx::Error> {
    sqlx::query_as::<_, TicketType>("SELECT * FROM ticket_types WHERE id = $1")
        .bind(id)
        .fetch_optional(executor)
        .await
}

/// Locks the given ticket types in ascending id order so concurrent orders
/// over overlapping types always acquire locks in the same sequence.
pub async fn lock_many<'e, E: PgExecutor<'e>>(
    executor: E,
    ids: &[Uuid],
) -> Result<Vec<TicketType>, sqlx::Error> {
    sqlx::query_as::<_, TicketType>(
        "SELECT * FROM ticket_types WHERE id = ANY($1) ORDER BY id FOR UPDATE",
    )
    .bind(ids)
    .fetch_all(executor)
    .await
}

/// Adjusts `quantity_sold` by `delta`; the table's CHECK keeps it within
/// `0..=quantity_available`.
pub async fn add_sold<'e, E: PgExecutor<'e>>(executor: E, id: Uuid, delta: i32) -> Result<(), sqlx::Error> {
    sqlx::query(
        "UPDATE ticket_types SET quantity_sold = quantity_sold + $2, updated_at = NOW() WHERE id = $1",
    )
    .bind(id)
    .bind(delta)
    .execute(executor)
    .await?;
    Ok(())
}

/// Public listing: only visible types of public, live events, unless the
/// caller owns the event (`owner`).
pub async fn list(
    pool: &PgPool,
    filter: &TicketTypeFilter,
    owner: Option<Uuid>,
    now: DateTime<Utc>,
) -> Result<(Vec<TicketType>, i64), sqlx::Error> {
    let pagination = Pagination::new(filter.page, filter.page_size);

    fn push_conditions(
        qb: &mut QueryBuilder<'_, Postgres>,
        filter: &TicketTypeFilter,
        owner: Option<Uuid>,
        now: DateTime<Utc>,
    ) {
        qb.push(" WHERE ((t.is_visible AND e.is_public AND e.status IN ('published', 'ongoing'))");
        if let Some(owner) = owner {
            qb.push(" OR e.organizer_id = ").push_bind(owner);
        }
        qb.push(")");
        if let Some(event_id) = filter.event {
            qb.push(" AND t.event_id = ").push_bind(event_id);
        }
        if filter.available == Some(true) {
            qb.push(" AND t.is_active AND t.quantity_sold < t.quantity_available AND t.sale_start_date <= ")
                .push_bind(now)
                .push(" AND t.sale_end_date >= ")
                .push_bind(now);
        }
    }

    let mut count = QueryBuilder::<Postgres>::new(
        "SELECT COUNT(*) FROM ticket_types t JOIN events e ON e.id = t.event_id",
    );
    push_conditions(&mut count, filter, owner, now);
    let total: i64 = count.build_query_scalar().fetch_one(pool).await?;

    let mut qb = QueryBuilder::<Postgres>::new(
        "SELECT t.* FROM ticket_types t JOIN events e ON e.id = t.event_id",
    );
    push_conditions(&mut qb, filter, owner, now);
    qb.push(" ORDER BY t.price ASC, t.name ASC LIMIT ")
        .push_bind(pagination.limit())
        .push(" OFFSET ")
        .push_bind(pagination.offset());

    let rows = qb.build_query_as::<TicketType>().fetch_all(pool).await?;
    Ok((rows, total))
}

pub async fn update<'e, E: PgExecutor<'e>>(executor: E, tt: &TicketType) -> Result<TicketType, sqlx::Error> {
    sqlx::query_as::<_, TicketType>(
        r#"
        UPDATE ticket_types
        SET name = $2, category = $3, description = $4, price = $5, quantity_available = $6,
            sale_start_date = $7, sale_end_date = $8, min_purchase = $9, max_purchase = $10,
            is_active = $11, is_visible = $12, updated_at = NOW()
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(tt.id)
    .bind(&tt.name)
    .bind(tt.category)
    .bind(&tt.description)
    .bind(tt.price)
    .bind(tt.quantity_available)
    .bind(tt.sale_start_date)
    .bind(tt.sale_end_date)
    .bind(tt.min_purchase)
    .bind(tt.max_purchase)
    .bind(tt.is_active)
    .bind(tt.is_visible)
    .fetch_one(executor)
    .await
}

pub async fn delete<'e, E: PgExecutor<'e>>(executor: E, id: Uuid) -> Result<u64, sqlx::Error> {
    let result = sqlx::query("DELETE FROM ticket_types WHERE id = $1")
        .bind(id)
        .execute(executor)
        .await?;
    Ok(result.rows_affected())
}
