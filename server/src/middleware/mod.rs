pub mod auth;
pub mod client_ip;

pub use auth::{AuthUser, Organizer};
pub use client_ip::ClientIp;
