use sqlx::PgExecutor;
use uuid::Uuid;

use crate::models::user::{User, UserTotals, UserType};

pub struct NewUser<'a> {
    pub email: &'a str,
    pub password_hash: &'a str,
    pub first_name: &'a str,
    pub last_name: &'a str,
    pub user_type: UserType,
    pub phone_number: Option<&'a str>,
    pub organization: Option<&'a str>,
}

pub async fn insert<'e, E: PgExecutor<'e>>(executor: E, user: NewUser<'_>) -> Result<User, sqlx::Error> {
    sqlx::query_as::<_, User>(
        r#"
        INSERT INTO users (id, email, password_hash, first_name, last_name, user_type, phone_number, organization)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(user.email)
    .bind(user.password_hash)
    .bind(user.first_name)
    .bind(user.last_name)
    .bind(user.user_type)
    .bind(user.phone_number)
    .bind(user.organization)
    .fetch_one(executor)
    .await
}

pub async fn find_by_id<'e, E: PgExecutor<'e>>(executor: E, id: Uuid) -> Result<Option<User>, sqlx::Error> {
    sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
        .bind(id)
        .fetch_optional(executor)
        .await
}

pub async fn find_by_email<'e, E: PgExecutor<'e>>(
    executor: E,
    email: &str,
) -> Result<Option<User>, sqlx::Error> {
    sqlx::query_as::<_, User>("SELECT * FROM users WHERE email = $1")
        .bind(email)
        .fetch_optional(executor)
        .await
}

pub async fn update_profile<'e, E: PgExecutor<'e>>(executor: E, user: &User) -> Result<User, sqlx::Error> {
    sqlx::query_as::<_, User>(
        r#"
        UPDATE users
        SET first_name = $2, last_name = $3, phone_number = $4, organization = $5, updated_at = NOW()
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(user.id)
    .bind(&user.first_name)
    .bind(&user.last_name)
    .bind(&user.phone_number)
    .bind(&user.organization)
    .fetch_one(executor)
    .await
}

pub async fn update_password<'e, E: PgExecutor<'e>>(
    executor: E,
    id: Uuid,
    password_hash: &str,
) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE users SET password_hash = $2, updated_at = NOW() WHERE id = $1")
        .bind(id)
        .bind(password_hash)
        .execute(executor)
        .await?;
    Ok(())
}

pub async fn delete<'e, E: PgExecutor<'e>>(executor: E, id: Uuid) -> Result<(), sqlx::Error> {
    sqlx::query("DELETE FROM users WHERE id = $1")
        .bind(id)
        .execute(executor)
        .await?;
    Ok(())
}

/// Event and guest totals for an organizer, order and ticket totals for a
/// customer (matched by e-mail).
pub async fn totals<'e, E: PgExecutor<'e>>(executor: E, user: &User) -> Result<UserTotals, sqlx::Error> {
    sqlx::query_as::<_, UserTotals>(
        r#"
        SELECT
            (SELECT COUNT(*) FROM events WHERE organizer_id = $1) AS total_events,
            (SELECT COUNT(*) FROM guests g JOIN events e ON e.id = g.event_id
                WHERE e.organizer_id = $1) AS total_guests,
            (SELECT COUNT(*) FROM tickets t JOIN order_items oi ON oi.id = t.order_item_id
                JOIN orders o ON o.id = oi.order_id
                WHERE o.customer_email = $2 AND o.status = 'completed') AS total_tickets_purchased,
            (SELECT COUNT(*) FROM orders WHERE customer_email = $2) AS total_orders
        "#,
    )
    .bind(user.id)
    .bind(&user.email)
    .fetch_one(executor)
    .await
}
