use axum::response::{IntoResponse, Response};
use serde::Serialize;

use crate::utils::response::success;

pub mod accounts;
pub mod analytics;
pub mod checkin;
pub mod discount_codes;
pub mod events;
pub mod guests;
pub mod notifications;
pub mod orders;
pub mod payments;
pub mod qr_codes;
pub mod ticket_types;
pub mod tickets;

#[derive(Serialize)]
struct HealthPayload {
    status: &'static str,
    service: &'static str,
}

pub async fn health_check() -> Response {
    let payload = HealthPayload {
        status: "ok",
        service: "eventdesk-api",
    };

    success(payload, "Health check successful").into_response()
}

/// PNG bytes as an inline image response.
pub(crate) fn png_response(bytes: Vec<u8>) -> Response {
    ([(axum::http::header::CONTENT_TYPE, "image/png")], bytes).into_response()
}
