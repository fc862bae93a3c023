use axum::{
    extract::{Path, Query, State},
    response::{IntoResponse, Response},
    Json,
};
use chrono::Utc;
use std::collections::HashMap;
use uuid::Uuid;

use crate::middleware::{AuthUser, ClientIp, Organizer};
use crate::models::order::{
    ConfirmPaymentRequest, CreateOrderRequest, OrderFilter, OrderItemDetail, OrderView, OrderWithEvent,
};
use crate::models::user::User;
use crate::repositories::orders::{self, OrderViewer};
use crate::services::orders::{self as order_service, Settlement};
use crate::state::AppState;
use crate::utils::error::AppError;
use crate::utils::pagination::{Page, Pagination};
use crate::utils::response::{created, success};

pub(crate) fn viewer_of(user: &User) -> OrderViewer<'_> {
    if user.is_organizer() {
        OrderViewer::Organizer(user.id)
    } else {
        OrderViewer::Customer(&user.email)
    }
}

fn can_see(user: &User, row: &OrderWithEvent) -> bool {
    match viewer_of(user) {
        OrderViewer::Organizer(id) => row.organizer_id == id,
        OrderViewer::Customer(email) => row.order.customer_email == email,
    }
}

async fn views_of(state: &AppState, rows: Vec<OrderWithEvent>) -> Result<Vec<OrderView>, AppError> {
    let ids: Vec<Uuid> = rows.iter().map(|r| r.order.id).collect();
    let mut items: HashMap<Uuid, Vec<OrderItemDetail>> = HashMap::new();
    for item in orders::item_details(&state.pool, &ids).await? {
        items.entry(item.item.order_id).or_default().push(item);
    }
    Ok(rows
        .into_iter()
        .map(|row| {
            let own = items.remove(&row.order.id).unwrap_or_default();
            OrderView::new(row, own)
        })
        .collect())
}

async fn view_of(state: &AppState, order_id: Uuid) -> Result<OrderView, AppError> {
    let row = orders::find_with_event(&state.pool, order_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Order not found".to_string()))?;
    let mut views = views_of(state, vec![row]).await?;
    views
        .pop()
        .ok_or_else(|| AppError::InternalServerError("order view missing".to_string()))
}

async fn visible_order(state: &AppState, user: &User, id: Uuid) -> Result<OrderWithEvent, AppError> {
    orders::find_with_event(&state.pool, id)
        .await?
        .filter(|row| can_see(user, row))
        .ok_or_else(|| AppError::NotFound("Order not found".to_string()))
}

pub async fn list_orders(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Query(filter): Query<OrderFilter>,
) -> Result<Response, AppError> {
    let (rows, count) = orders::list(&state.pool, viewer_of(&user), &filter).await?;
    let page = Page::new(
        views_of(&state, rows).await?,
        count,
        Pagination::new(filter.page, filter.page_size),
    );
    Ok(success(page, "Orders retrieved").into_response())
}

pub async fn get_order(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Response, AppError> {
    let row = visible_order(&state, &user, id).await?;
    let view = view_of(&state, row.order.id).await?;
    Ok(success(view, "Order retrieved").into_response())
}

pub async fn create_order(
    State(state): State<AppState>,
    ip: ClientIp,
    Json(req): Json<CreateOrderRequest>,
) -> Result<Response, AppError> {
    let order = order_service::create_order(&state, req, ip.to_string_opt(), Utc::now()).await?;
    let view = view_of(&state, order.id).await?;
    Ok(created(view, "Order created successfully").into_response())
}

/// Public: the checkout page starts payment right after placing the order.
pub async fn initialize_payment(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Response, AppError> {
    let initialized = order_service::initialize_payment(&state, id).await?;
    Ok(success(initialized, "Payment initialized").into_response())
}

pub async fn confirm_payment(
    State(state): State<AppState>,
    Organizer(user): Organizer,
    Path(id): Path<Uuid>,
    body: Option<Json<ConfirmPaymentRequest>>,
) -> Result<Response, AppError> {
    let row = visible_order(&state, &user, id).await?;
    let Json(req) = body.unwrap_or_default();

    let method = req
        .payment_method
        .filter(|m| !m.trim().is_empty())
        .unwrap_or_else(|| "manual".to_string());
    let reference = req
        .payment_reference
        .filter(|r| !r.trim().is_empty())
        .unwrap_or_else(|| row.order.order_number.clone());

    let settlement =
        order_service::settle(&state, row.order.id, &method, &reference, None, Utc::now()).await?;
    let message = match settlement {
        Settlement::Settled(_) => "Payment confirmed",
        Settlement::AlreadyProcessed(_) => "Order already paid",
    };
    let view = view_of(&state, row.order.id).await?;
    Ok(success(view, message).into_response())
}

pub async fn cancel_order(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Response, AppError> {
    let row = visible_order(&state, &user, id).await?;
    order_service::cancel(&state, row.order.id).await?;
    let view = view_of(&state, row.order.id).await?;
    Ok(success(view, "Order cancelled successfully").into_response())
}
