use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Ticket kind values are open-ended; "child" is special-cased for
/// registration notifications.
pub const KIND_CHILD: &str = "child";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TicketType {
    pub id: String,
    pub conference_id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub camping: bool,
    pub price: Decimal,
    #[serde(default)]
    pub early_bird_price: Option<Decimal>,
    #[serde(default)]
    pub early_bird_end_date: Option<NaiveDate>,
    #[serde(default)]
    pub late_price: Option<Decimal>,
    #[serde(default)]
    pub late_price_start_date: Option<NaiveDate>,
    /// 0 means unlimited.
    #[serde(default)]
    pub capacity: u32,
    /// Monotonic; not decremented on refund or attendee deletion.
    #[serde(default)]
    pub sold: u32,
    #[serde(default)]
    pub age_min: Option<i32>,
    #[serde(default)]
    pub age_max: Option<i32>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_enabled() -> bool {
    true
}

impl TicketType {
    pub fn is_child(&self) -> bool {
        self.kind == KIND_CHILD
    }
}
