//! Query functions over the Postgres schema. Each takes any `PgExecutor`, so
//! callers choose between the pool and an open transaction.

pub mod analytics;
pub mod check_ins;
pub mod discount_codes;
pub mod events;
pub mod guests;
pub mod orders;
pub mod qr_codes;
pub mod ticket_types;
pub mod tickets;
pub mod users;
