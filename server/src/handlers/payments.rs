use axum::{
    body::Bytes,
    extract::{Query, State},
    http::HeaderMap,
    response::{IntoResponse, Response},
};
use chrono::Utc;
use serde::Deserialize;

use crate::services::orders::{self as order_service, WebhookOutcome};
use crate::state::AppState;
use crate::utils::error::AppError;
use crate::utils::response::{empty_success, success};

const SIGNATURE_HEADER: &str = "x-paystack-signature";

#[derive(Debug, Deserialize)]
pub struct VerifyQuery {
    pub reference: Option<String>,
}

/// Paystack calls this with the raw event body; the signature covers those
/// exact bytes.
pub async fn paystack_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, AppError> {
    let signature = headers.get(SIGNATURE_HEADER).and_then(|v| v.to_str().ok());
    let outcome = order_service::process_webhook(&state, &body, signature, Utc::now()).await?;

    match outcome {
        WebhookOutcome::Settled(settlement) => {
            let order = settlement.order();
            Ok(success(
                serde_json::json!({
                    "status": settlement.status(),
                    "order_number": order.order_number,
                }),
                "Webhook processed",
            )
            .into_response())
        }
        WebhookOutcome::Ignored(_) => Ok(empty_success("Event acknowledged").into_response()),
    }
}

pub async fn verify_payment(
    State(state): State<AppState>,
    Query(query): Query<VerifyQuery>,
) -> Result<Response, AppError> {
    let reference = query
        .reference
        .as_deref()
        .map(str::trim)
        .filter(|r| !r.is_empty())
        .ok_or_else(|| AppError::ValidationError("Payment reference is required".to_string()))?;

    let check = order_service::verify_payment(&state, reference, Utc::now()).await?;
    Ok(success(check, "Payment status retrieved").into_response())
}
