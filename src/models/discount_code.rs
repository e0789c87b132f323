use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiscountType {
    Percentage,
    Fixed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscountCode {
    pub id: String,
    pub conference_id: String,
    /// Matched case-insensitively, unique within a conference.
    pub code: String,
    #[serde(rename = "type")]
    pub discount_type: DiscountType,
    pub value: Decimal,
    /// Empty means the discount applies to the whole subtotal.
    #[serde(default)]
    pub applicable_ticket_types: Vec<String>,
    /// 0 means unlimited.
    #[serde(default)]
    pub max_usage: u32,
    #[serde(default)]
    pub used_count: u32,
    #[serde(default)]
    pub expiry_date: Option<NaiveDate>,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_enabled() -> bool {
    true
}

impl DiscountCode {
    pub fn matches(&self, code: &str, conference_id: &str) -> bool {
        self.conference_id == conference_id && self.code.eq_ignore_ascii_case(code)
    }

    /// Restricts which line items the discount covers; empty list covers all.
    pub fn applies_to(&self, ticket_type_id: &str) -> bool {
        self.applicable_ticket_types.is_empty()
            || self.applicable_ticket_types.iter().any(|t| t == ticket_type_id)
    }
}
