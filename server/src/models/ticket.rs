use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use validator::{Validate, ValidationError};

use crate::utils::error::AppError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "ticket_category", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum TicketCategory {
    #[default]
    General,
    Premium,
    Vip,
    Vvip,
    EarlyBird,
    Student,
    Group,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct TicketType {
    pub id: Uuid,
    pub event_id: Uuid,
    pub name: String,
    pub category: TicketCategory,
    pub description: String,
    pub price: Decimal,
    pub quantity_available: i32,
    pub quantity_sold: i32,
    pub sale_start_date: DateTime<Utc>,
    pub sale_end_date: DateTime<Utc>,
    pub min_purchase: i32,
    pub max_purchase: i32,
    pub is_active: bool,
    pub is_visible: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TicketType {
    pub fn quantity_remaining(&self) -> i32 {
        (self.quantity_available - self.quantity_sold).max(0)
    }

    pub fn sold_out(&self) -> bool {
        self.quantity_sold >= self.quantity_available
    }

    pub fn is_available(&self, now: DateTime<Utc>) -> bool {
        self.is_active
            && !self.sold_out()
            && self.sale_start_date <= now
            && now <= self.sale_end_date
    }

    /// Checks a requested quantity against availability, purchase limits and
    /// remaining stock.
    pub fn check_purchase(&self, quantity: i32, now: DateTime<Utc>) -> Result<(), AppError> {
        if !self.is_available(now) {
            return Err(AppError::ValidationError(format!(
                "{} is not available",
                self.name
            )));
        }
        if quantity > self.quantity_remaining() {
            return Err(AppError::ValidationError(format!(
                "Only {} tickets remaining for {}",
                self.quantity_remaining(),
                self.name
            )));
        }
        if quantity < self.min_purchase {
            return Err(AppError::ValidationError(format!(
                "Minimum purchase for {} is {}",
                self.name, self.min_purchase
            )));
        }
        if quantity > self.max_purchase {
            return Err(AppError::ValidationError(format!(
                "Maximum purchase for {} is {}",
                self.name, self.max_purchase
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct TicketBenefit {
    pub id: Uuid,
    pub ticket_type_id: Uuid,
    pub title: String,
    pub description: String,
    pub icon: String,
    pub display_order: i32,
}

#[derive(Debug, Serialize)]
pub struct TicketTypeView {
    #[serde(flatten)]
    pub ticket_type: TicketType,
    pub quantity_remaining: i32,
    pub sold_out: bool,
    pub is_available: bool,
    pub benefits: Vec<TicketBenefit>,
}

impl TicketTypeView {
    pub fn new(ticket_type: TicketType, benefits: Vec<TicketBenefit>, now: DateTime<Utc>) -> Self {
        Self {
            quantity_remaining: ticket_type.quantity_remaining(),
            sold_out: ticket_type.sold_out(),
            is_available: ticket_type.is_available(now),
            ticket_type,
            benefits,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct TicketTypeFilter {
    pub event: Option<Uuid>,
    pub available: Option<bool>,
    pub page: Option<i64>,
    pub page_size: Option<i64>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct NewBenefit {
    #[validate(length(min = 1, max = 200, message = "This field is required."))]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    #[validate(length(max = 50))]
    pub icon: String,
    #[serde(default)]
    pub display_order: i32,
}

fn validate_non_negative(price: &Decimal) -> Result<(), ValidationError> {
    if price.is_sign_negative() {
        return Err(ValidationError::new("negative").with_message("Price cannot be negative".into()));
    }
    Ok(())
}

#[derive(Debug, Deserialize, Validate)]
#[validate(schema(function = "validate_new_ticket_type"))]
pub struct CreateTicketTypeRequest {
    pub event: Uuid,
    #[validate(length(min = 1, max = 100, message = "This field is required."))]
    pub name: String,
    #[serde(default)]
    pub category: TicketCategory,
    #[serde(default)]
    pub description: String,
    #[validate(custom(function = "validate_non_negative"))]
    pub price: Decimal,
    #[validate(range(min = 0))]
    pub quantity_available: i32,
    pub sale_start_date: DateTime<Utc>,
    pub sale_end_date: DateTime<Utc>,
    #[serde(default = "default_min_purchase")]
    #[validate(range(min = 1, message = "Minimum purchase must be at least 1"))]
    pub min_purchase: i32,
    #[serde(default = "default_max_purchase")]
    pub max_purchase: i32,
    #[serde(default = "default_true")]
    pub is_active: bool,
    #[serde(default = "default_true")]
    pub is_visible: bool,
    #[serde(default)]
    #[validate(nested)]
    pub benefits: Vec<NewBenefit>,
}

fn default_min_purchase() -> i32 {
    1
}

fn default_max_purchase() -> i32 {
    10
}

fn default_true() -> bool {
    true
}

fn validate_new_ticket_type(req: &CreateTicketTypeRequest) -> Result<(), ValidationError> {
    check_limits(
        req.min_purchase,
        req.max_purchase,
        req.sale_start_date,
        req.sale_end_date,
    )
}

fn check_limits(
    min_purchase: i32,
    max_purchase: i32,
    sale_start: DateTime<Utc>,
    sale_end: DateTime<Utc>,
) -> Result<(), ValidationError> {
    if max_purchase < min_purchase {
        return Err(ValidationError::new("purchase_limits")
            .with_message("Maximum purchase cannot be less than minimum purchase".into()));
    }
    if sale_end < sale_start {
        return Err(ValidationError::new("sale_window")
            .with_message("Sale end date must be after sale start date".into()));
    }
    Ok(())
}

#[derive(Debug, Default, Deserialize, Validate)]
pub struct UpdateTicketTypeRequest {
    #[validate(length(min = 1, max = 100))]
    pub name: Option<String>,
    pub category: Option<TicketCategory>,
    pub description: Option<String>,
    #[validate(custom(function = "validate_non_negative"))]
    pub price: Option<Decimal>,
    #[validate(range(min = 0))]
    pub quantity_available: Option<i32>,
    pub sale_start_date: Option<DateTime<Utc>>,
    pub sale_end_date: Option<DateTime<Utc>>,
    #[validate(range(min = 1))]
    pub min_purchase: Option<i32>,
    pub max_purchase: Option<i32>,
    pub is_active: Option<bool>,
    pub is_visible: Option<bool>,
}

impl UpdateTicketTypeRequest {
    /// Applies the update and re-checks the combined limits.
    pub fn apply(self, ticket_type: &mut TicketType) -> Result<(), AppError> {
        if let Some(v) = self.name {
            ticket_type.name = v;
        }
        if let Some(v) = self.category {
            ticket_type.category = v;
        }
        if let Some(v) = self.description {
            ticket_type.description = v;
        }
        if let Some(v) = self.price {
            ticket_type.price = v;
        }
        if let Some(v) = self.quantity_available {
            if v < ticket_type.quantity_sold {
                return Err(AppError::ValidationError(format!(
                    "Quantity available cannot be less than the {} tickets already sold",
                    ticket_type.quantity_sold
                )));
            }
            ticket_type.quantity_available = v;
        }
        if let Some(v) = self.sale_start_date {
            ticket_type.sale_start_date = v;
        }
        if let Some(v) = self.sale_end_date {
            ticket_type.sale_end_date = v;
        }
        if let Some(v) = self.min_purchase {
            ticket_type.min_purchase = v;
        }
        if let Some(v) = self.max_purchase {
            ticket_type.max_purchase = v;
        }
        if let Some(v) = self.is_active {
            ticket_type.is_active = v;
        }
        if let Some(v) = self.is_visible {
            ticket_type.is_visible = v;
        }

        check_limits(
            ticket_type.min_purchase,
            ticket_type.max_purchase,
            ticket_type.sale_start_date,
            ticket_type.sale_end_date,
        )
        .map_err(|e| {
            AppError::ValidationError(
                e.message
                    .map(|m| m.to_string())
                    .unwrap_or_else(|| e.code.to_string()),
            )
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "ticket_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum TicketStatus {
    #[default]
    Valid,
    Used,
    Cancelled,
    Transferred,
    Expired,
}

impl TicketStatus {
    pub fn label(&self) -> &'static str {
        match self {
            TicketStatus::Valid => "valid",
            TicketStatus::Used => "used",
            TicketStatus::Cancelled => "cancelled",
            TicketStatus::Transferred => "transferred",
            TicketStatus::Expired => "expired",
        }
    }
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Ticket {
    pub id: Uuid,
    pub ticket_number: String,
    pub ticket_code: Uuid,
    pub order_item_id: Uuid,
    pub ticket_type_id: Uuid,
    pub event_id: Uuid,
    pub holder_name: String,
    pub holder_email: String,
    pub holder_phone: String,
    pub status: TicketStatus,
    pub checked_in: bool,
    pub checked_in_at: Option<DateTime<Utc>>,
    pub checked_in_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Ticket {
    /// Text encoded into the ticket's QR image.
    pub fn qr_payload(&self) -> String {
        format!("{}|{}", self.ticket_number, self.ticket_code)
    }
}

/// Ticket joined with its type, event and order for display.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct TicketDetail {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub ticket: Ticket,
    pub ticket_type_name: String,
    pub event_title: String,
    pub event_date: DateTime<Utc>,
    pub event_location: String,
    pub organizer_id: Uuid,
    pub order_number: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct TicketFilter {
    pub event: Option<Uuid>,
    pub email: Option<String>,
    pub ticket_number: Option<String>,
    pub page: Option<i64>,
    pub page_size: Option<i64>,
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use chrono::Duration;

    pub(crate) fn sample_ticket_type(event_id: Uuid) -> TicketType {
        let now = Utc::now();
        TicketType {
            id: Uuid::new_v4(),
            event_id,
            name: "General".into(),
            category: TicketCategory::General,
            description: String::new(),
            price: Decimal::new(5000, 2),
            quantity_available: 10,
            quantity_sold: 8,
            sale_start_date: now - Duration::days(1),
            sale_end_date: now + Duration::days(1),
            min_purchase: 1,
            max_purchase: 4,
            is_active: true,
            is_visible: true,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_availability() {
        let now = Utc::now();
        let mut tt = sample_ticket_type(Uuid::new_v4());
        assert_eq!(tt.quantity_remaining(), 2);
        assert!(tt.is_available(now));

        tt.quantity_sold = 10;
        assert!(tt.sold_out());
        assert!(!tt.is_available(now));

        tt.quantity_sold = 0;
        tt.sale_start_date = now + Duration::hours(1);
        assert!(!tt.is_available(now));
    }

    #[test]
    fn test_check_purchase_limits() {
        let now = Utc::now();
        let tt = sample_ticket_type(Uuid::new_v4());
        assert!(tt.check_purchase(2, now).is_ok());
        assert!(tt.check_purchase(3, now).is_err());

        let mut roomy = tt.clone();
        roomy.quantity_sold = 0;
        roomy.min_purchase = 2;
        assert!(roomy.check_purchase(1, now).is_err());
        assert!(roomy.check_purchase(5, now).is_err());
    }

    #[test]
    fn test_update_cannot_undercut_sales() {
        let mut tt = sample_ticket_type(Uuid::new_v4());
        let err = UpdateTicketTypeRequest {
            quantity_available: Some(5),
            ..Default::default()
        }
        .apply(&mut tt)
        .unwrap_err();
        assert!(matches!(err, AppError::ValidationError(_)));
    }

    #[test]
    fn test_update_rechecks_limits() {
        let mut tt = sample_ticket_type(Uuid::new_v4());
        assert!(UpdateTicketTypeRequest {
            max_purchase: Some(0),
            ..Default::default()
        }
        .apply(&mut tt)
        .is_err());
    }

    #[test]
    fn test_qr_payload() {
        let now = Utc::now();
        let ticket = Ticket {
            id: Uuid::new_v4(),
            ticket_number: "TKT-ABCDEFGHIJKL".into(),
            ticket_code: Uuid::nil(),
            order_item_id: Uuid::new_v4(),
            ticket_type_id: Uuid::new_v4(),
            event_id: Uuid::new_v4(),
            holder_name: "Ada".into(),
            holder_email: "ada@example.com".into(),
            holder_phone: String::new(),
            status: TicketStatus::Valid,
            checked_in: false,
            checked_in_at: None,
            checked_in_by: None,
            created_at: now,
            updated_at: now,
        };
        assert_eq!(
            ticket.qr_payload(),
            "TKT-ABCDEFGHIJKL|00000000-0000-0000-0000-000000000000"
        );
    }
}
