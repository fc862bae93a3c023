//! Order placement, settlement and cancellation. Every inventory or usage
//! counter change happens under `SELECT … FOR UPDATE` inside one transaction.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use serde_json::json;
use sqlx::PgConnection;
use std::collections::{HashMap, HashSet};
use uuid::Uuid;
use validator::Validate;

use crate::models::event::EventStatus;
use crate::models::guest::split_name;
use crate::models::order::{CreateOrderRequest, Order, OrderStatus, PaymentStatus};
use crate::models::ticket::TicketType;
use crate::models::user::normalize_email;
use crate::repositories::orders::NewOrder;
use crate::repositories::{discount_codes, events, guests, orders, ticket_types, tickets};
use crate::services::notifications;
use crate::services::payment::{
    verify_webhook_signature, ChargeData, InitializePayment, InitializedPayment, WebhookEvent,
};
use crate::services::pricing;
use crate::state::AppState;
use crate::utils::codes::{generate_order_number, generate_ticket_number};
use crate::utils::error::AppError;

pub const FREE_PAYMENT_METHOD: &str = "free";
pub const PAYSTACK_PAYMENT_METHOD: &str = "paystack";

const PAYMENT_CHANNELS: [&str; 6] = ["card", "bank", "ussd", "qr", "mobile_money", "bank_transfer"];

/// Outcome of a settlement attempt.
#[derive(Debug)]
pub enum Settlement {
    Settled(Order),
    AlreadyProcessed(Order),
}

impl Settlement {
    pub fn order(&self) -> &Order {
        match self {
            Settlement::Settled(order) | Settlement::AlreadyProcessed(order) => order,
        }
    }

    pub fn status(&self) -> &'static str {
        match self {
            Settlement::Settled(_) => "success",
            Settlement::AlreadyProcessed(_) => "already_processed",
        }
    }
}

/// What a webhook delivery amounted to.
#[derive(Debug)]
pub enum WebhookOutcome {
    Settled(Settlement),
    Ignored(String),
}

/// State of an order after asking the gateway about its payment.
#[derive(Debug, Serialize)]
pub struct PaymentCheck {
    pub status: String,
    pub order_number: String,
    pub order_status: OrderStatus,
    pub payment_status: PaymentStatus,
    pub amount: Decimal,
}

pub async fn create_order(
    state: &AppState,
    req: CreateOrderRequest,
    ip_address: Option<String>,
    now: DateTime<Utc>,
) -> Result<Order, AppError> {
    req.validate()?;
    let customer_email = normalize_email(&req.customer_email);
    let mut tx = state.pool.begin().await?;

    let event = events::find_by_id(&mut *tx, req.event)
        .await?
        .ok_or_else(|| AppError::NotFound("Event not found".to_string()))?;
    if matches!(event.status, EventStatus::Cancelled | EventStatus::Completed) {
        return Err(AppError::ValidationError(
            "Tickets are no longer on sale for this event".to_string(),
        ));
    }

    let mut ids: Vec<Uuid> = req.items.iter().map(|i| i.ticket_type_id).collect();
    ids.sort();
    let locked: HashMap<Uuid, TicketType> = ticket_types::lock_many(&mut *tx, &ids)
        .await?
        .into_iter()
        .map(|t| (t.id, t))
        .collect();

    let mut lines: Vec<(&TicketType, i32)> = Vec::with_capacity(req.items.len());
    for item in &req.items {
        let ticket_type = locked.get(&item.ticket_type_id).ok_or_else(|| {
            AppError::ValidationError(format!("Ticket type {} not found", item.ticket_type_id))
        })?;
        if ticket_type.event_id != event.id {
            return Err(AppError::ValidationError(format!(
                "{} is not sold for this event",
                ticket_type.name
            )));
        }
        ticket_type.check_purchase(item.quantity, now)?;
        lines.push((ticket_type, item.quantity));
    }

    let subtotal: Decimal = lines
        .iter()
        .map(|(t, qty)| t.price * Decimal::from(*qty))
        .sum();

    let mut discount_amount = Decimal::ZERO;
    let mut discount_code_id = None;
    if let Some(code) = req.normalized_discount_code() {
        let discount = discount_codes::find_by_code_for_update(&mut *tx, &code)
            .await?
            .ok_or_else(|| AppError::ValidationError("Invalid discount code".to_string()))?;
        pricing::check_code(&discount, event.id, subtotal, now)?;

        let used = orders::count_code_uses_by_email(&mut *tx, discount.id, &customer_email).await?;
        if used >= i64::from(discount.max_uses_per_user) {
            return Err(AppError::ValidationError(
                "You have already used this discount code".to_string(),
            ));
        }

        let restricted: HashSet<Uuid> = discount_codes::ticket_types_for(&mut *tx, &[discount.id])
            .await?
            .into_iter()
            .map(|(_, ticket_type_id)| ticket_type_id)
            .collect();
        let applicable: Decimal = lines
            .iter()
            .filter(|(t, _)| restricted.is_empty() || restricted.contains(&t.id))
            .map(|(t, qty)| t.price * Decimal::from(*qty))
            .sum();
        if !restricted.is_empty() && applicable.is_zero() {
            return Err(AppError::ValidationError(
                "Discount code does not apply to the selected tickets".to_string(),
            ));
        }

        discount_amount = pricing::discount_amount(&discount, applicable).min(subtotal);
        discount_codes::add_use(&mut *tx, discount.id, 1).await?;
        discount_code_id = Some(discount.id);
    }
    let total_amount = (subtotal - discount_amount).max(Decimal::ZERO);

    let order_number = generate_order_number();
    let order = orders::insert(
        &mut *tx,
        NewOrder {
            order_number: &order_number,
            event_id: event.id,
            customer_name: req.customer_name.trim(),
            customer_email: &customer_email,
            customer_phone: req.customer_phone.trim(),
            subtotal,
            discount_amount,
            total_amount,
            discount_code_id,
            ip_address: ip_address.as_deref(),
        },
    )
    .await?;

    for (ticket_type, quantity) in &lines {
        let item =
            orders::insert_item(&mut *tx, order.id, ticket_type.id, *quantity, ticket_type.price)
                .await?;
        for _ in 0..*quantity {
            tickets::insert(&mut *tx, &generate_ticket_number(), &order, &item).await?;
        }
        orders::insert_sale(&mut *tx, &order, &item).await?;
        ticket_types::add_sold(&mut *tx, ticket_type.id, *quantity).await?;
    }

    let free = total_amount.is_zero();
    let order = if free {
        let reference = order.order_number.clone();
        settle_locked(&mut tx, &order, FREE_PAYMENT_METHOD, &reference, now).await?
    } else {
        order
    };

    tx.commit().await?;

    tracing::info!(
        order_id = %order.id,
        order_number = %order.order_number,
        event_id = %order.event_id,
        total = %order.total_amount,
        free,
        "Order created"
    );
    if free {
        notifications::queue_ticket_confirmation(state.clone(), order.id);
    }
    Ok(order)
}

/// Marks a locked, unpaid order as paid and records the buyer as a guest.
async fn settle_locked(
    conn: &mut PgConnection,
    order: &Order,
    payment_method: &str,
    payment_reference: &str,
    now: DateTime<Utc>,
) -> Result<Order, AppError> {
    let settled =
        orders::mark_settled(&mut *conn, order.id, payment_method, payment_reference, now).await?;

    let (first_name, last_name) = split_name(&order.customer_name);
    let phone = Some(order.customer_phone.as_str()).filter(|p| !p.is_empty());
    guests::upsert_purchaser(
        &mut *conn,
        order.event_id,
        &first_name,
        &last_name,
        &order.customer_email,
        phone,
    )
    .await?;

    Ok(settled)
}

/// Settles an order once. Repeated calls report `AlreadyProcessed` and change
/// nothing. `paid_kobo`, when given, must match the gateway amount.
pub async fn settle(
    state: &AppState,
    order_id: Uuid,
    payment_method: &str,
    payment_reference: &str,
    paid_kobo: Option<i64>,
    now: DateTime<Utc>,
) -> Result<Settlement, AppError> {
    let mut tx = state.pool.begin().await?;

    let order = orders::find_by_id_for_update(&mut *tx, order_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Order not found".to_string()))?;

    if order.is_paid() {
        return Ok(Settlement::AlreadyProcessed(order));
    }
    if order.status == OrderStatus::Cancelled {
        return Err(AppError::ValidationError(
            "Cannot settle a cancelled order".to_string(),
        ));
    }
    if let Some(paid) = paid_kobo {
        let expected = pricing::to_kobo(order.total_amount, state.config.usd_to_ngn_rate)?;
        if paid != expected {
            tracing::warn!(
                order_number = %order.order_number,
                paid,
                expected,
                "Payment amount mismatch"
            );
            return Err(AppError::ValidationError("Amount mismatch".to_string()));
        }
    }

    let order = settle_locked(&mut tx, &order, payment_method, payment_reference, now).await?;
    tx.commit().await?;

    tracing::info!(
        order_id = %order.id,
        order_number = %order.order_number,
        payment_method,
        "Order settled"
    );
    notifications::queue_ticket_confirmation(state.clone(), order.id);
    Ok(Settlement::Settled(order))
}

pub async fn cancel(state: &AppState, order_id: Uuid) -> Result<Order, AppError> {
    let mut tx = state.pool.begin().await?;

    let order = orders::find_by_id_for_update(&mut *tx, order_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Order not found".to_string()))?;
    if order.status == OrderStatus::Cancelled {
        return Err(AppError::ValidationError("Order already cancelled".to_string()));
    }

    let issued = tickets::lock_for_order(&mut *tx, order.id).await?;
    if issued.iter().any(|t| t.checked_in) {
        return Err(AppError::ValidationError(
            "Cannot cancel an order with checked-in tickets".to_string(),
        ));
    }

    let items = orders::items(&mut *tx, order.id).await?;
    let mut ids: Vec<Uuid> = items.iter().map(|i| i.ticket_type_id).collect();
    ids.sort();
    ids.dedup();
    ticket_types::lock_many(&mut *tx, &ids).await?;
    for item in &items {
        ticket_types::add_sold(&mut *tx, item.ticket_type_id, -item.quantity).await?;
    }

    tickets::cancel_valid_for_order(&mut *tx, order.id).await?;
    if let Some(code_id) = order.discount_code_id {
        if discount_codes::find_by_id_for_update(&mut *tx, code_id).await?.is_some() {
            discount_codes::add_use(&mut *tx, code_id, -1).await?;
        }
    }
    orders::delete_sales(&mut *tx, order.id).await?;

    let cancelled = orders::set_status(
        &mut *tx,
        order.id,
        OrderStatus::Cancelled,
        order.cancelled_payment_status(),
    )
    .await?;
    tx.commit().await?;

    tracing::info!(order_id = %cancelled.id, order_number = %cancelled.order_number, "Order cancelled");
    Ok(cancelled)
}

pub async fn initialize_payment(state: &AppState, order_id: Uuid) -> Result<InitializedPayment, AppError> {
    let row = orders::find_with_event(&state.pool, order_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Order not found".to_string()))?;
    let order = &row.order;

    if order.is_paid() {
        return Err(AppError::ValidationError("Order already paid".to_string()));
    }
    if order.status == OrderStatus::Cancelled {
        return Err(AppError::ValidationError("Order has been cancelled".to_string()));
    }

    let amount = pricing::to_kobo(order.total_amount, state.config.usd_to_ngn_rate)?;
    let frontend = &state.config.frontend_url;
    let request = InitializePayment {
        email: order.customer_email.clone(),
        amount,
        currency: "NGN".to_string(),
        reference: order.order_number.clone(),
        callback_url: format!("{}/payment/callback", frontend),
        metadata: json!({
            "order_id": order.id,
            "order_number": order.order_number,
            "event_id": order.event_id,
            "event_title": row.event_title,
            "customer_name": order.customer_name,
            "customer_phone": order.customer_phone,
            "cancel_action": format!("{}/checkout", frontend),
        }),
        channels: PAYMENT_CHANNELS.iter().map(|c| c.to_string()).collect(),
    };

    let initialized = state.gateway.initialize(request).await?;
    tracing::info!(order_number = %order.order_number, amount, "Payment initialized");
    Ok(initialized)
}

/// Authenticates and applies a Paystack webhook delivery. Only
/// `charge.success` changes state.
pub async fn process_webhook(
    state: &AppState,
    body: &[u8],
    signature: Option<&str>,
    now: DateTime<Utc>,
) -> Result<WebhookOutcome, AppError> {
    let signature = signature.ok_or_else(|| {
        tracing::warn!("Webhook received without signature");
        AppError::ValidationError("Invalid signature".to_string())
    })?;
    if !verify_webhook_signature(&state.config.paystack_secret_key, body, signature) {
        tracing::warn!("Webhook signature mismatch");
        return Err(AppError::ValidationError("Invalid signature".to_string()));
    }

    let event: WebhookEvent = serde_json::from_slice(body)
        .map_err(|_| AppError::ValidationError("Invalid JSON".to_string()))?;
    if event.event != "charge.success" {
        tracing::info!(event = %event.event, "Webhook event ignored");
        return Ok(WebhookOutcome::Ignored(event.event));
    }

    let charge: ChargeData = serde_json::from_value(event.data)
        .map_err(|_| AppError::ValidationError("Invalid charge payload".to_string()))?;
    let order = orders::find_by_number(&state.pool, &charge.reference)
        .await?
        .ok_or_else(|| AppError::NotFound("Order not found".to_string()))?;

    let method = charge.channel.as_deref().unwrap_or(PAYSTACK_PAYMENT_METHOD).to_string();
    let settlement = settle(
        state,
        order.id,
        &method,
        &charge.reference,
        Some(charge.amount),
        now,
    )
    .await?;
    Ok(WebhookOutcome::Settled(settlement))
}

/// Asks the gateway about a reference and settles the order when the
/// webhook has not done so yet. A payment the gateway does not report as
/// successful is a 400 carrying the gateway status.
pub async fn verify_payment(
    state: &AppState,
    reference: &str,
    now: DateTime<Utc>,
) -> Result<PaymentCheck, AppError> {
    let order = orders::find_by_number(&state.pool, reference)
        .await?
        .ok_or_else(|| AppError::NotFound("Order not found".to_string()))?;

    let verified = state.gateway.verify(reference).await?;
    if !verified.is_success() {
        tracing::info!(order_number = %order.order_number, status = %verified.status, "Payment not successful");
        return Err(AppError::rejected(
            "Payment not successful",
            json!({ "status": verified.status, "order_number": order.order_number }),
        ));
    }

    let order = if !order.is_paid() {
        let method = verified
            .channel
            .clone()
            .unwrap_or_else(|| PAYSTACK_PAYMENT_METHOD.to_string());
        settle(state, order.id, &method, &verified.reference, Some(verified.amount), now)
            .await?
            .order()
            .clone()
    } else {
        order
    };

    Ok(PaymentCheck {
        status: verified.status,
        order_number: order.order_number,
        order_status: order.status,
        payment_status: order.payment_status,
        amount: order.total_amount,
    })
}
