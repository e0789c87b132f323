use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A bookable conference. The early-bird fields define a conference-wide
/// flat discount window that overrides per-ticket pricing while active.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Conference {
    pub id: String,
    pub slug: String,
    pub title: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    #[serde(default)]
    pub venue: Option<Venue>,
    #[serde(default)]
    pub published: bool,
    #[serde(default)]
    pub registration_open: bool,
    #[serde(default)]
    pub early_bird_start_date: Option<NaiveDate>,
    #[serde(default)]
    pub early_bird_end_date: Option<NaiveDate>,
    #[serde(default)]
    pub early_bird_discount_amount: Option<Decimal>,
    #[serde(default)]
    pub payment_settings: Option<PaymentSettings>,
    /// Age band ("0-5", "6-8", "9-12") to notification email address.
    #[serde(default)]
    pub child_group_leaders: HashMap<String, String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Venue {
    pub name: String,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub postcode: Option<String>,
    #[serde(default)]
    pub country: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentSettings {
    #[serde(default)]
    pub paypal_enabled: bool,
    #[serde(default)]
    pub pay_later_enabled: bool,
    /// Fixed deposit takes precedence over the percentage when both are set.
    #[serde(default)]
    pub deposit_amount: Option<Decimal>,
    #[serde(default)]
    pub deposit_percentage: Option<Decimal>,
    #[serde(default = "default_installment_count")]
    pub installment_count: u32,
    /// Days between installment due dates.
    #[serde(default = "default_installment_interval")]
    pub installment_interval: i64,
}

fn default_installment_count() -> u32 {
    3
}

fn default_installment_interval() -> i64 {
    30
}
