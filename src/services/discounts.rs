//! Discount code validation and application.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::fmt;

use crate::models::{DiscountCode, DiscountType};
use crate::store::Document;

/// Why a discount code was rejected. Each kind maps to its own
/// user-visible message; an invalid code is never silently ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodeRejection {
    NotFound,
    Disabled,
    Expired,
    UsageLimitReached,
}

impl fmt::Display for CodeRejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            CodeRejection::NotFound => "Invalid discount code",
            CodeRejection::Disabled => "Discount code is disabled",
            CodeRejection::Expired => "Discount code has expired",
            CodeRejection::UsageLimitReached => "Discount code has reached its usage limit",
        };
        f.write_str(msg)
    }
}

/// Case-insensitive lookup scoped to one conference, then enabled, expiry
/// and usage-cap checks.
pub fn validate_code<'a>(
    doc: &'a Document,
    code: &str,
    conference_id: &str,
    now: DateTime<Utc>,
) -> Result<&'a DiscountCode, CodeRejection> {
    let discount = doc
        .discount_code(code, conference_id)
        .ok_or(CodeRejection::NotFound)?;
    if !discount.enabled {
        return Err(CodeRejection::Disabled);
    }
    if let Some(expiry) = discount.expiry_date {
        if now.date_naive() > expiry {
            return Err(CodeRejection::Expired);
        }
    }
    if discount.max_usage > 0 && discount.used_count >= discount.max_usage {
        return Err(CodeRejection::UsageLimitReached);
    }
    Ok(discount)
}

/// Discount against the subtotal of applicable line items.
///
/// Fixed-value codes are deliberately not clamped here; the booking total
/// is floored at zero downstream instead, preserving the recorded
/// `discount_amount` as configured.
pub fn discount_amount(code: &DiscountCode, applicable_subtotal: Decimal) -> Decimal {
    match code.discount_type {
        DiscountType::Percentage => applicable_subtotal * code.value / Decimal::ONE_HUNDRED,
        DiscountType::Fixed => code.value,
    }
}

/// Sums the line items the code covers; an empty restriction list covers
/// everything.
pub fn applicable_subtotal(code: &DiscountCode, line_items: &[(String, Decimal)]) -> Decimal {
    line_items
        .iter()
        .filter(|(ticket_type_id, _)| code.applies_to(ticket_type_id))
        .map(|(_, price)| *price)
        .sum()
}
