use sqlx::{PgConnection, PgExecutor};
use uuid::Uuid;

use crate::models::discount::{CreateDiscountCodeRequest, DiscountCode};
use crate::utils::pagination::Pagination;

pub async fn insert<'e, E: PgExecutor<'e>>(
    executor: E,
    owner_id: Uuid,
    req: &CreateDiscountCodeRequest,
) -> Result<DiscountCode, sqlx::Error> {
    sqlx::query_as::<_, DiscountCode>(
        r#"
        INSERT INTO discount_codes (
            id, code, event_id, owner_id, discount_type, discount_value, min_purchase_amount,
            max_uses, max_uses_per_user, valid_from, valid_until, is_active
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(req.code.trim().to_uppercase())
    .bind(req.event)
    .bind(owner_id)
    .bind(req.discount_type)
    .bind(req.discount_value)
    .bind(req.min_purchase_amount)
    .bind(req.max_uses)
    .bind(req.max_uses_per_user)
    .bind(req.valid_from)
    .bind(req.valid_until)
    .bind(req.is_active)
    .fetch_one(executor)
    .await
}

pub async fn replace_ticket_types(
    conn: &mut PgConnection,
    discount_code_id: Uuid,
    ticket_type_ids: &[Uuid],
) -> Result<(), sqlx::Error> {
    sqlx::query("DELETE FROM discount_code_ticket_types WHERE discount_code_id = $1")
        .bind(discount_code_id)
        .execute(&mut *conn)
        .await?;
    sqlx::query(
        r#"
        INSERT INTO discount_code_ticket_types (discount_code_id, ticket_type_id)
        SELECT $1, UNNEST($2::uuid[])
        ON CONFLICT DO NOTHING
        "#,
    )
    .bind(discount_code_id)
    .bind(ticket_type_ids)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

/// `(discount_code_id, ticket_type_id)` pairs for the given codes.
pub async fn ticket_types_for<'e, E: PgExecutor<'e>>(
    executor: E,
    discount_code_ids: &[Uuid],
) -> Result<Vec<(Uuid, Uuid)>, sqlx::Error> {
    sqlx::query_as::<_, (Uuid, Uuid)>(
        "SELECT discount_code_id, ticket_type_id FROM discount_code_ticket_types WHERE discount_code_id = ANY($1)",
    )
    .bind(discount_code_ids)
    .fetch_all(executor)
    .await
}

pub async fn find_by_id<'e, E: PgExecutor<'e>>(
    executor: E,
    id: Uuid,
) -> Result<Option<DiscountCode>, sqlx::Error> {
    sqlx::query_as::<_, DiscountCode>("SELECT * FROM discount_codes WHERE id = $1")
        .bind(id)
        .fetch_optional(executor)
        .await
}

pub async fn find_by_code<'e, E: PgExecutor<'e>>(
    executor: E,
    code: &str,
) -> Result<Option<DiscountCode>, sqlx::Error> {
    sqlx::query_as::<_, DiscountCode>("SELECT * FROM discount_codes WHERE code = $1")
        .bind(code.trim().to_uppercase())
        .fetch_optional(executor)
        .await
}

pub async fn find_by_code_for_update<'e, E: PgExecutor<'e>>(
    executor: E,
    code: &str,
) -> Result<Option<DiscountCode>, sqlx::Error> {
    sqlx::query_as::<_, DiscountCode>("SELECT * FROM discount_codes WHERE code = $1 FOR UPDATE")
        .bind(code.trim().to_uppercase())
        .fetch_optional(executor)
        .await
}

pub async fn find_by_id_for_update<'e, E: PgExecutor<'e>>(
    executor: E,
    id: Uuid,
) -> Result<Option<DiscountCode>, sqlx::Error> {
    sqlx::query_as::<_, DiscountCode>("SELECT * FROM discount_codes WHERE id = $1 FOR UPDATE")
        .bind(id)
        .fetch_optional(executor)
        .await
}

pub async fn list_for_owner<'e, E>(
    executor: E,
    owner_id: Uuid,
    pagination: Pagination,
) -> Result<Vec<DiscountCode>, sqlx::Error>
where
    E: PgExecutor<'e>,
{
    sqlx::query_as::<_, DiscountCode>(
        "SELECT * FROM discount_codes WHERE owner_id = $1 ORDER BY created_at DESC LIMIT $2 OFFSET $3",
    )
    .bind(owner_id)
    .bind(pagination.limit())
    .bind(pagination.offset())
    .fetch_all(executor)
    .await
}

pub async fn count_for_owner<'e, E: PgExecutor<'e>>(executor: E, owner_id: Uuid) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar("SELECT COUNT(*) FROM discount_codes WHERE owner_id = $1")
        .bind(owner_id)
        .fetch_one(executor)
        .await
}

pub async fn update<'e, E: PgExecutor<'e>>(executor: E, code: &DiscountCode) -> Result<DiscountCode, sqlx::Error> {
    sqlx::query_as::<_, DiscountCode>(
        r#"
        UPDATE discount_codes
        SET discount_type = $2, discount_value = $3, min_purchase_amount = $4, max_uses = $5,
            max_uses_per_user = $6, valid_from = $7, valid_until = $8, is_active = $9,
            updated_at = NOW()
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(code.id)
    .bind(code.discount_type)
    .bind(code.discount_value)
    .bind(code.min_purchase_amount)
    .bind(code.max_uses)
    .bind(code.max_uses_per_user)
    .bind(code.valid_from)
    .bind(code.valid_until)
    .bind(code.is_active)
    .fetch_one(executor)
    .await
}

/// Adjusts `times_used`; releasing never takes it below zero.
pub async fn add_use<'e, E: PgExecutor<'e>>(executor: E, id: Uuid, delta: i32) -> Result<(), sqlx::Error> {
    sqlx::query(
        "UPDATE discount_codes SET times_used = GREATEST(times_used + $2, 0), updated_at = NOW() WHERE id = $1",
    )
    .bind(id)
    .bind(delta)
    .execute(executor)
    .await?;
    Ok(())
}

pub async fn delete<'e, E: PgExecutor<'e>>(executor: E, id: Uuid) -> Result<u64, sqlx::Error> {
    let result = sqlx::query("DELETE FROM discount_codes WHERE id = $1")
        .bind(id)
        .execute(executor)
        .await?;
    Ok(result.rows_affected())
}
