use axum::{
    extract::{Path, Query, State},
    response::{IntoResponse, Response},
    Json,
};
use chrono::Utc;
use std::collections::HashMap;
use uuid::Uuid;
use validator::Validate;

use crate::handlers::events::referenced_event;
use crate::middleware::Organizer;
use crate::models::discount::{
    CreateDiscountCodeRequest, DiscountCode, DiscountCodeView, UpdateDiscountCodeRequest,
    ValidateCodeRequest, ValidateCodeResponse,
};
use crate::repositories::{discount_codes, events, ticket_types};
use crate::services::pricing;
use crate::state::AppState;
use crate::utils::error::AppError;
use crate::utils::pagination::{Page, Pagination};
use crate::utils::response::{created, empty_success, success};

async fn view_of(state: &AppState, discount: DiscountCode) -> Result<DiscountCodeView, AppError> {
    let applicable = discount_codes::ticket_types_for(&state.pool, &[discount.id])
        .await?
        .into_iter()
        .map(|(_, ticket_type_id)| ticket_type_id)
        .collect();
    Ok(DiscountCodeView::new(discount, applicable, Utc::now()))
}

async fn owned_code(state: &AppState, owner_id: Uuid, id: Uuid) -> Result<DiscountCode, AppError> {
    discount_codes::find_by_id(&state.pool, id)
        .await?
        .filter(|d| d.owner_id == owner_id)
        .ok_or_else(|| AppError::NotFound("Discount code not found".to_string()))
}

/// Restricting ticket types must belong to the caller's events, and to the
/// code's event when it has one.
async fn check_applicable(
    state: &AppState,
    owner_id: Uuid,
    event_id: Option<Uuid>,
    ticket_type_ids: &[Uuid],
) -> Result<(), AppError> {
    for id in ticket_type_ids {
        let ticket_type = ticket_types::find_by_id(&state.pool, *id)
            .await?
            .ok_or_else(|| AppError::ValidationError(format!("Ticket type {} not found", id)))?;
        let event = events::find_by_id(&state.pool, ticket_type.event_id)
            .await?
            .ok_or_else(|| AppError::ValidationError(format!("Ticket type {} not found", id)))?;
        if event.organizer_id != owner_id {
            return Err(AppError::Forbidden(
                "You can only restrict codes to your own ticket types".to_string(),
            ));
        }
        if matches!(event_id, Some(e) if e != event.id) {
            return Err(AppError::ValidationError(format!(
                "{} does not belong to this code's event",
                ticket_type.name
            )));
        }
    }
    Ok(())
}

pub async fn list_discount_codes(
    State(state): State<AppState>,
    Organizer(user): Organizer,
    Query(pagination): Query<Pagination>,
) -> Result<Response, AppError> {
    let codes = discount_codes::list_for_owner(&state.pool, user.id, pagination).await?;
    let count = discount_codes::count_for_owner(&state.pool, user.id).await?;

    let ids: Vec<Uuid> = codes.iter().map(|c| c.id).collect();
    let mut applicable: HashMap<Uuid, Vec<Uuid>> = HashMap::new();
    for (code_id, ticket_type_id) in discount_codes::ticket_types_for(&state.pool, &ids).await? {
        applicable.entry(code_id).or_default().push(ticket_type_id);
    }

    let now = Utc::now();
    let views = codes
        .into_iter()
        .map(|c| {
            let own = applicable.remove(&c.id).unwrap_or_default();
            DiscountCodeView::new(c, own, now)
        })
        .collect();
    Ok(success(Page::new(views, count, pagination), "Discount codes retrieved").into_response())
}

pub async fn create_discount_code(
    State(state): State<AppState>,
    Organizer(user): Organizer,
    Json(req): Json<CreateDiscountCodeRequest>,
) -> Result<Response, AppError> {
    req.validate()?;
    if let Some(event_id) = req.event {
        referenced_event(&state, user.id, event_id).await?;
    }
    check_applicable(&state, user.id, req.event, &req.applicable_ticket_types).await?;

    let mut tx = state.pool.begin().await?;
    let discount = discount_codes::insert(&mut *tx, user.id, &req).await?;
    discount_codes::replace_ticket_types(&mut tx, discount.id, &req.applicable_ticket_types).await?;
    tx.commit().await?;

    tracing::info!(discount_code_id = %discount.id, code = %discount.code, "Discount code created");
    let view = view_of(&state, discount).await?;
    Ok(created(view, "Discount code created successfully").into_response())
}

pub async fn get_discount_code(
    State(state): State<AppState>,
    Organizer(user): Organizer,
    Path(id): Path<Uuid>,
) -> Result<Response, AppError> {
    let discount = owned_code(&state, user.id, id).await?;
    let view = view_of(&state, discount).await?;
    Ok(success(view, "Discount code retrieved").into_response())
}

pub async fn update_discount_code(
    State(state): State<AppState>,
    Organizer(user): Organizer,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateDiscountCodeRequest>,
) -> Result<Response, AppError> {
    req.validate()?;
    let discount = owned_code(&state, user.id, id).await?;
    if let Some(ids) = &req.applicable_ticket_types {
        check_applicable(&state, user.id, discount.event_id, ids).await?;
    }

    let mut tx = state.pool.begin().await?;
    let mut discount = discount_codes::find_by_id_for_update(&mut *tx, discount.id)
        .await?
        .ok_or_else(|| AppError::NotFound("Discount code not found".to_string()))?;
    req.apply(&mut discount).map_err(|e| {
        AppError::ValidationError(
            e.message
                .map(|m| m.to_string())
                .unwrap_or_else(|| e.code.to_string()),
        )
    })?;
    let discount = discount_codes::update(&mut *tx, &discount).await?;
    if let Some(ids) = &req.applicable_ticket_types {
        discount_codes::replace_ticket_types(&mut tx, discount.id, ids).await?;
    }
    tx.commit().await?;

    let view = view_of(&state, discount).await?;
    Ok(success(view, "Discount code updated successfully").into_response())
}

pub async fn delete_discount_code(
    State(state): State<AppState>,
    Organizer(user): Organizer,
    Path(id): Path<Uuid>,
) -> Result<Response, AppError> {
    let discount = owned_code(&state, user.id, id).await?;
    discount_codes::delete(&state.pool, discount.id).await?;
    tracing::info!(discount_code_id = %discount.id, "Discount code deleted");
    Ok(empty_success("Discount code deleted successfully").into_response())
}

/// Public price check used by the checkout page before placing an order.
pub async fn validate_code(
    State(state): State<AppState>,
    Json(req): Json<ValidateCodeRequest>,
) -> Result<Response, AppError> {
    let code = req.code.trim().to_uppercase();
    let discount = discount_codes::find_by_code(&state.pool, &code)
        .await?
        .ok_or_else(|| AppError::NotFound("Discount code not found".to_string()))?;
    pricing::check_code(&discount, req.event_id, req.order_total, Utc::now())?;

    let discount_amount = pricing::discount_amount(&discount, req.order_total);
    let response = ValidateCodeResponse {
        valid: true,
        code: discount.code,
        discount_type: discount.discount_type,
        discount_value: discount.discount_value,
        discount_amount,
        final_total: req.order_total - discount_amount,
    };
    Ok(success(response, "Discount code is valid").into_response())
}
