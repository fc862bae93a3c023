use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::collections::HashSet;
use uuid::Uuid;
use validator::{Validate, ValidationError};

use super::ticket::TicketCategory;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "order_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    #[default]
    Pending,
    Processing,
    Completed,
    Cancelled,
    Refunded,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "payment_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    #[default]
    Pending,
    Processing,
    Successful,
    Failed,
    Refunded,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Order {
    pub id: Uuid,
    pub order_number: String,
    pub event_id: Uuid,
    pub customer_name: String,
    pub customer_email: String,
    pub customer_phone: String,
    pub status: OrderStatus,
    pub payment_status: PaymentStatus,
    pub subtotal: Decimal,
    pub discount_amount: Decimal,
    pub tax_amount: Decimal,
    pub total_amount: Decimal,
    pub discount_code_id: Option<Uuid>,
    pub payment_method: String,
    pub payment_reference: String,
    pub payment_date: Option<DateTime<Utc>>,
    pub notes: String,
    pub ip_address: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    pub fn is_paid(&self) -> bool {
        self.payment_status == PaymentStatus::Successful
    }

    /// Payment status an order moves to when it is cancelled.
    pub fn cancelled_payment_status(&self) -> PaymentStatus {
        if self.is_paid() {
            PaymentStatus::Refunded
        } else {
            PaymentStatus::Failed
        }
    }
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct OrderItem {
    pub id: Uuid,
    pub order_id: Uuid,
    pub ticket_type_id: Uuid,
    pub quantity: i32,
    pub unit_price: Decimal,
    pub total_price: Decimal,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct OrderItemDetail {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub item: OrderItem,
    pub ticket_type_name: String,
    pub ticket_type_category: TicketCategory,
}

#[derive(Debug, Clone, FromRow)]
pub struct OrderWithEvent {
    #[sqlx(flatten)]
    pub order: Order,
    pub event_title: String,
    pub organizer_id: Uuid,
}

#[derive(Debug, Serialize)]
pub struct OrderView {
    #[serde(flatten)]
    pub order: Order,
    pub event_title: String,
    pub items: Vec<OrderItemDetail>,
    pub total_tickets: i64,
}

impl OrderView {
    pub fn new(row: OrderWithEvent, items: Vec<OrderItemDetail>) -> Self {
        let total_tickets = items.iter().map(|i| i64::from(i.item.quantity)).sum();
        Self {
            order: row.order,
            event_title: row.event_title,
            items,
            total_tickets,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
pub struct OrderItemRequest {
    pub ticket_type_id: Uuid,
    #[validate(range(min = 1, message = "Quantity must be at least 1"))]
    pub quantity: i32,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateOrderRequest {
    pub event: Uuid,
    #[validate(length(min = 1, max = 200, message = "This field is required."))]
    pub customer_name: String,
    #[validate(email(message = "Enter a valid email address."))]
    pub customer_email: String,
    #[serde(default)]
    #[validate(length(max = 20))]
    pub customer_phone: String,
    #[validate(
        length(min = 1, message = "Order must contain at least one item"),
        custom(function = "validate_distinct_ticket_types"),
        nested
    )]
    pub items: Vec<OrderItemRequest>,
    pub discount_code: Option<String>,
}

fn validate_distinct_ticket_types(items: &[OrderItemRequest]) -> Result<(), ValidationError> {
    let mut seen = HashSet::new();
    if items.iter().all(|item| seen.insert(item.ticket_type_id)) {
        Ok(())
    } else {
        Err(ValidationError::new("duplicate_ticket_type")
            .with_message("Each ticket type may appear only once per order".into()))
    }
}

impl CreateOrderRequest {
    /// Discount code as stored, or `None` when blank.
    pub fn normalized_discount_code(&self) -> Option<String> {
        self.discount_code
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .map(str::to_uppercase)
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct ConfirmPaymentRequest {
    pub payment_method: Option<String>,
    pub payment_reference: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct OrderFilter {
    pub event: Option<Uuid>,
    pub status: Option<OrderStatus>,
    pub payment_status: Option<PaymentStatus>,
    pub page: Option<i64>,
    pub page_size: Option<i64>,
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn sample_order() -> Order {
        let now = Utc::now();
        Order {
            id: Uuid::new_v4(),
            order_number: "ORD-ABCDEFGHIJ".into(),
            event_id: Uuid::new_v4(),
            customer_name: "Ada Obi".into(),
            customer_email: "ada@example.com".into(),
            customer_phone: String::new(),
            status: OrderStatus::Completed,
            payment_status: PaymentStatus::Successful,
            subtotal: Decimal::new(500000, 2),
            discount_amount: Decimal::ZERO,
            tax_amount: Decimal::ZERO,
            total_amount: Decimal::new(500000, 2),
            discount_code_id: None,
            payment_method: "paystack".into(),
            payment_reference: "ORD-ABCDEFGHIJ".into(),
            payment_date: Some(now),
            notes: String::new(),
            ip_address: None,
            created_at: now,
            updated_at: now,
        }
    }

    fn request(items: Vec<OrderItemRequest>) -> CreateOrderRequest {
        CreateOrderRequest {
            event: Uuid::new_v4(),
            customer_name: "Ada Obi".into(),
            customer_email: "ada@example.com".into(),
            customer_phone: String::new(),
            items,
            discount_code: Some("  save10 ".into()),
        }
    }

    #[test]
    fn test_items_are_required_and_distinct() {
        assert!(request(vec![]).validate().is_err());

        let id = Uuid::new_v4();
        let dup = request(vec![
            OrderItemRequest {
                ticket_type_id: id,
                quantity: 1,
            },
            OrderItemRequest {
                ticket_type_id: id,
                quantity: 2,
            },
        ]);
        assert!(dup.validate().is_err());

        let ok = request(vec![OrderItemRequest {
            ticket_type_id: id,
            quantity: 2,
        }]);
        assert!(ok.validate().is_ok());
    }

    #[test]
    fn test_quantity_must_be_positive() {
        let zero = request(vec![OrderItemRequest {
            ticket_type_id: Uuid::new_v4(),
            quantity: 0,
        }]);
        assert!(zero.validate().is_err());
    }

    #[test]
    fn test_discount_code_is_normalized() {
        let req = request(vec![]);
        assert_eq!(req.normalized_discount_code().as_deref(), Some("SAVE10"));

        let mut blank = request(vec![]);
        blank.discount_code = Some("   ".into());
        assert_eq!(blank.normalized_discount_code(), None);
    }
}
