use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Unpaid,
    Partial,
    Paid,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentMethod {
    Paypal,
    Deposit,
    Installment,
    Deposit20,
}

impl PaymentMethod {
    /// Methods that leave a tracked balance collected via a payment schedule.
    pub fn is_installment(self) -> bool {
        matches!(self, Self::Deposit | Self::Installment | Self::Deposit20)
    }
}

/// Invariants: `paid_amount <= total_amount`;
/// `payment_status == Paid` iff `paid_amount >= total_amount`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Booking {
    pub id: String,
    pub conference_id: String,
    /// Human-facing reference, distinct from the internal id.
    pub booking_reference: String,
    pub group_leader_name: String,
    pub group_leader_email: String,
    #[serde(default)]
    pub group_leader_phone: Option<String>,
    pub attendee_count: u32,
    pub subtotal: Decimal,
    pub discount_amount: Decimal,
    #[serde(default)]
    pub discount_code: Option<String>,
    pub total_amount: Decimal,
    pub payment_method: PaymentMethod,
    pub payment_status: PaymentStatus,
    #[serde(default)]
    pub paid_amount: Decimal,
    #[serde(default)]
    pub paypal_order_id: Option<String>,
    #[serde(default)]
    pub paypal_order_status: Option<String>,
    /// Every gateway capture applied to this booking, in order. Used to make
    /// capture handling idempotent; the last entry is the correlation id.
    #[serde(default)]
    pub paypal_capture_ids: Vec<String>,
    #[serde(default)]
    pub payment_date: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub archived: bool,
}

impl Booking {
    pub fn balance_due(&self) -> Decimal {
        (self.total_amount - self.paid_amount).max(Decimal::ZERO)
    }

    pub fn has_capture(&self, capture_id: &str) -> bool {
        self.paypal_capture_ids.iter().any(|c| c == capture_id)
    }
}
