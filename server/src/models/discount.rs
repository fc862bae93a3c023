use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use validator::{Validate, ValidationError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "discount_type", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum DiscountType {
    Percentage,
    Fixed,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct DiscountCode {
    pub id: Uuid,
    pub code: String,
    pub event_id: Option<Uuid>,
    pub owner_id: Uuid,
    pub discount_type: DiscountType,
    pub discount_value: Decimal,
    pub min_purchase_amount: Decimal,
    pub max_uses: Option<i32>,
    pub max_uses_per_user: i32,
    pub times_used: i32,
    pub valid_from: DateTime<Utc>,
    pub valid_until: DateTime<Utc>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl DiscountCode {
    pub fn is_valid(&self, now: DateTime<Utc>) -> bool {
        self.is_active
            && self.valid_from <= now
            && now <= self.valid_until
            && self.max_uses.map_or(true, |max| self.times_used < max)
    }
}

#[derive(Debug, Serialize)]
pub struct DiscountCodeView {
    #[serde(flatten)]
    pub discount: DiscountCode,
    pub is_valid: bool,
    pub applicable_ticket_types: Vec<Uuid>,
}

impl DiscountCodeView {
    pub fn new(discount: DiscountCode, applicable_ticket_types: Vec<Uuid>, now: DateTime<Utc>) -> Self {
        Self {
            is_valid: discount.is_valid(now),
            discount,
            applicable_ticket_types,
        }
    }
}

fn validate_amount(value: &Decimal) -> Result<(), ValidationError> {
    if value.is_sign_negative() {
        return Err(ValidationError::new("negative").with_message("Value cannot be negative".into()));
    }
    Ok(())
}

#[derive(Debug, Deserialize, Validate)]
#[validate(schema(function = "validate_new_discount"))]
pub struct CreateDiscountCodeRequest {
    #[validate(length(min = 1, max = 50, message = "This field is required."))]
    pub code: String,
    pub event: Option<Uuid>,
    pub discount_type: DiscountType,
    #[validate(custom(function = "validate_amount"))]
    pub discount_value: Decimal,
    #[serde(default)]
    #[validate(custom(function = "validate_amount"))]
    pub min_purchase_amount: Decimal,
    #[validate(range(min = 1))]
    pub max_uses: Option<i32>,
    #[serde(default = "default_per_user")]
    #[validate(range(min = 1))]
    pub max_uses_per_user: i32,
    pub valid_from: DateTime<Utc>,
    pub valid_until: DateTime<Utc>,
    #[serde(default = "default_true")]
    pub is_active: bool,
    #[serde(default)]
    pub applicable_ticket_types: Vec<Uuid>,
}

fn default_per_user() -> i32 {
    1
}

fn default_true() -> bool {
    true
}

fn validate_new_discount(req: &CreateDiscountCodeRequest) -> Result<(), ValidationError> {
    check_discount(req.discount_type, req.discount_value, req.valid_from, req.valid_until)
}

pub fn check_discount(
    discount_type: DiscountType,
    value: Decimal,
    valid_from: DateTime<Utc>,
    valid_until: DateTime<Utc>,
) -> Result<(), ValidationError> {
    if discount_type == DiscountType::Percentage && value > Decimal::ONE_HUNDRED {
        return Err(ValidationError::new("percentage_range")
            .with_message("Percentage discount cannot exceed 100".into()));
    }
    if valid_until < valid_from {
        return Err(ValidationError::new("validity_window")
            .with_message("valid_until must be after valid_from".into()));
    }
    Ok(())
}

#[derive(Debug, Default, Deserialize, Validate)]
pub struct UpdateDiscountCodeRequest {
    pub discount_type: Option<DiscountType>,
    #[validate(custom(function = "validate_amount"))]
    pub discount_value: Option<Decimal>,
    #[validate(custom(function = "validate_amount"))]
    pub min_purchase_amount: Option<Decimal>,
    #[validate(range(min = 1))]
    pub max_uses: Option<i32>,
    #[validate(range(min = 1))]
    pub max_uses_per_user: Option<i32>,
    pub valid_from: Option<DateTime<Utc>>,
    pub valid_until: Option<DateTime<Utc>>,
    pub is_active: Option<bool>,
    pub applicable_ticket_types: Option<Vec<Uuid>>,
}

impl UpdateDiscountCodeRequest {
    /// Applies scalar fields; the applicable ticket types are handled by the caller.
    pub fn apply(&self, discount: &mut DiscountCode) -> Result<(), ValidationError> {
        if let Some(v) = self.discount_type {
            discount.discount_type = v;
        }
        if let Some(v) = self.discount_value {
            discount.discount_value = v;
        }
        if let Some(v) = self.min_purchase_amount {
            discount.min_purchase_amount = v;
        }
        if let Some(v) = self.max_uses {
            discount.max_uses = Some(v);
        }
        if let Some(v) = self.max_uses_per_user {
            discount.max_uses_per_user = v;
        }
        if let Some(v) = self.valid_from {
            discount.valid_from = v;
        }
        if let Some(v) = self.valid_until {
            discount.valid_until = v;
        }
        if let Some(v) = self.is_active {
            discount.is_active = v;
        }
        check_discount(
            discount.discount_type,
            discount.discount_value,
            discount.valid_from,
            discount.valid_until,
        )
    }
}

#[derive(Debug, Deserialize)]
pub struct ValidateCodeRequest {
    pub code: String,
    pub event_id: Uuid,
    pub order_total: Decimal,
}

#[derive(Debug, Serialize)]
pub struct ValidateCodeResponse {
    pub valid: bool,
    pub code: String,
    pub discount_type: DiscountType,
    pub discount_value: Decimal,
    pub discount_amount: Decimal,
    pub final_total: Decimal,
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use chrono::Duration;

    pub(crate) fn sample_discount(discount_type: DiscountType, value: Decimal) -> DiscountCode {
        let now = Utc::now();
        DiscountCode {
            id: Uuid::new_v4(),
            code: "SAVE".into(),
            event_id: None,
            owner_id: Uuid::new_v4(),
            discount_type,
            discount_value: value,
            min_purchase_amount: Decimal::ZERO,
            max_uses: Some(2),
            max_uses_per_user: 1,
            times_used: 0,
            valid_from: now - Duration::days(1),
            valid_until: now + Duration::days(1),
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_is_valid() {
        let now = Utc::now();
        let mut code = sample_discount(DiscountType::Fixed, Decimal::TEN);
        assert!(code.is_valid(now));

        code.times_used = 2;
        assert!(!code.is_valid(now));

        code.max_uses = None;
        assert!(code.is_valid(now));

        code.is_active = false;
        assert!(!code.is_valid(now));
    }

    #[test]
    fn test_percentage_cannot_exceed_hundred() {
        let now = Utc::now();
        assert!(check_discount(
            DiscountType::Percentage,
            Decimal::new(101, 0),
            now,
            now
        )
        .is_err());
        assert!(check_discount(DiscountType::Fixed, Decimal::new(101, 0), now, now).is_ok());
    }
}
