use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScheduleStatus {
    Pending,
    Paid,
}

/// One future installment due against a booking's remaining balance.
/// Rows are created lazily on the first installment-style capture.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentSchedule {
    pub id: String,
    pub booking_id: String,
    pub conference_id: String,
    pub amount: Decimal,
    pub due_date: NaiveDate,
    pub status: ScheduleStatus,
    pub installment_number: u32,
    pub created_at: DateTime<Utc>,
}
