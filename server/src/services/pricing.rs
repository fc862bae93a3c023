//! Discount and currency arithmetic. Everything stays in `Decimal`; gateway
//! amounts are integers in kobo.

use chrono::{DateTime, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use uuid::Uuid;

use crate::models::discount::{DiscountCode, DiscountType};
use crate::utils::error::AppError;

/// Discount for `applicable` worth of items, never more than that amount.
pub fn discount_amount(code: &DiscountCode, applicable: Decimal) -> Decimal {
    if applicable <= Decimal::ZERO {
        return Decimal::ZERO;
    }
    let raw = match code.discount_type {
        DiscountType::Percentage => (applicable * code.discount_value / Decimal::ONE_HUNDRED)
            .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero),
        DiscountType::Fixed => code.discount_value,
    };
    raw.min(applicable).max(Decimal::ZERO)
}

/// Checks that a code can be applied to an order for `event_id` worth
/// `order_total` at `now`. Per-customer usage is checked separately.
pub fn check_code(
    code: &DiscountCode,
    event_id: Uuid,
    order_total: Decimal,
    now: DateTime<Utc>,
) -> Result<(), AppError> {
    if !code.is_valid(now) {
        return Err(AppError::ValidationError(
            "Discount code is invalid or expired".to_string(),
        ));
    }
    if matches!(code.event_id, Some(id) if id != event_id) {
        return Err(AppError::ValidationError(
            "Discount code is not valid for this event".to_string(),
        ));
    }
    if order_total < code.min_purchase_amount {
        return Err(AppError::ValidationError(format!(
            "Minimum purchase amount of {} required",
            code.min_purchase_amount
        )));
    }
    Ok(())
}

/// USD total converted to NGN at `rate`, in kobo.
pub fn to_kobo(total: Decimal, rate: Decimal) -> Result<i64, AppError> {
    (total * rate * Decimal::ONE_HUNDRED)
        .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
        .to_i64()
        .ok_or_else(|| AppError::ValidationError("Order amount is out of range".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::discount::tests::sample_discount;

    #[test]
    fn test_percentage_rounds_to_cents() {
        let code = sample_discount(DiscountType::Percentage, Decimal::new(15, 0));
        // 15% of 33.33 = 4.9995
        assert_eq!(
            discount_amount(&code, Decimal::new(3333, 2)),
            Decimal::new(500, 2)
        );
    }

    #[test]
    fn test_discount_is_capped() {
        let fixed = sample_discount(DiscountType::Fixed, Decimal::new(50, 0));
        assert_eq!(discount_amount(&fixed, Decimal::new(20, 0)), Decimal::new(20, 0));
        assert_eq!(discount_amount(&fixed, Decimal::ZERO), Decimal::ZERO);

        let full = sample_discount(DiscountType::Percentage, Decimal::ONE_HUNDRED);
        assert_eq!(discount_amount(&full, Decimal::new(1999, 2)), Decimal::new(1999, 2));
    }

    #[test]
    fn test_check_code() {
        let now = Utc::now();
        let event = Uuid::new_v4();
        let mut code = sample_discount(DiscountType::Fixed, Decimal::TEN);
        code.min_purchase_amount = Decimal::new(25, 0);
        assert!(check_code(&code, event, Decimal::new(30, 0), now).is_ok());
        assert!(check_code(&code, event, Decimal::new(20, 0), now).is_err());

        code.event_id = Some(Uuid::new_v4());
        assert!(check_code(&code, event, Decimal::new(30, 0), now).is_err());

        code.event_id = Some(event);
        code.times_used = 2;
        assert!(check_code(&code, event, Decimal::new(30, 0), now).is_err());
    }

    #[test]
    fn test_to_kobo() {
        assert_eq!(to_kobo(Decimal::new(2550, 2), Decimal::new(1600, 0)).unwrap(), 4_080_000);
        assert_eq!(to_kobo(Decimal::ZERO, Decimal::new(1600, 0)).unwrap(), 0);
        assert_eq!(
            to_kobo(Decimal::new(1, 2), Decimal::new(15005, 1)).unwrap(),
            1501
        );
    }
}
