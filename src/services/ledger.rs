//! Payment ledger.
//!
//! Captures accumulate against a booking's running balance; they never
//! replace prior amounts. `paid_amount` is clamped to `total_amount` so a
//! final capture cannot overshoot, and capture ids make re-delivery (out of
//! order webhooks, gateway retries) a no-op.

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::models::{
    Booking, Conference, PaymentMethod, PaymentSchedule, PaymentStatus, ScheduleStatus,
};
use crate::store::Document;
use crate::utils::error::AppError;

pub struct CaptureApplied {
    pub booking: Booking,
    /// False when this capture id had already been recorded.
    pub newly_recorded: bool,
}

/// Applies a confirmed gateway capture to a booking: accumulate, clamp,
/// derive status, and lazily create the installment schedule on the first
/// installment-style payment.
pub fn apply_capture(
    doc: &mut Document,
    booking_id: &str,
    capture_id: &str,
    amount: Decimal,
    now: DateTime<Utc>,
) -> Result<CaptureApplied, AppError> {
    let booking = doc
        .booking_mut(booking_id)
        .ok_or_else(|| AppError::NotFound(format!("booking {booking_id}")))?;

    if booking.has_capture(capture_id) {
        return Ok(CaptureApplied {
            booking: booking.clone(),
            newly_recorded: false,
        });
    }

    let accumulated = booking.paid_amount + amount;
    if accumulated >= booking.total_amount {
        booking.paid_amount = booking.total_amount;
        booking.payment_status = PaymentStatus::Paid;
    } else {
        booking.paid_amount = accumulated;
        booking.payment_status = PaymentStatus::Partial;
    }
    booking.paypal_capture_ids.push(capture_id.to_string());
    booking.payment_date = Some(now);

    let booking = booking.clone();
    if booking.payment_method.is_installment() && booking.payment_status == PaymentStatus::Partial
    {
        ensure_installment_schedule(doc, &booking.id, now)?;
    }

    Ok(CaptureApplied {
        booking: doc
            .booking(booking_id)
            .cloned()
            .unwrap_or(booking),
        newly_recorded: true,
    })
}

/// A DENIED or REFUNDED capture event; the booking drops back to unpaid.
pub fn mark_payment_failed(doc: &mut Document, booking_id: &str) -> Result<Booking, AppError> {
    let booking = doc
        .booking_mut(booking_id)
        .ok_or_else(|| AppError::NotFound(format!("booking {booking_id}")))?;
    booking.payment_status = PaymentStatus::Unpaid;
    Ok(booking.clone())
}

/// Creates the installment schedule for a booking once: existing rows
/// suppress creation, making first-payment handling idempotent. The
/// remaining balance is spread evenly across `installment_count - 1`
/// future dues spaced `installment_interval` days apart.
pub fn ensure_installment_schedule(
    doc: &mut Document,
    booking_id: &str,
    now: DateTime<Utc>,
) -> Result<usize, AppError> {
    if !doc.schedules_for_booking(booking_id).is_empty() {
        return Ok(0);
    }
    let booking = doc
        .booking(booking_id)
        .ok_or_else(|| AppError::NotFound(format!("booking {booking_id}")))?
        .clone();
    let Some(settings) = doc
        .conference(&booking.conference_id)
        .and_then(|c| c.payment_settings.clone())
    else {
        return Ok(0);
    };
    if settings.installment_count < 2 {
        return Ok(0);
    }
    let remaining = booking.balance_due();
    if remaining <= Decimal::ZERO {
        return Ok(0);
    }

    let future_dues = settings.installment_count - 1;
    let per_installment = (remaining / Decimal::from(future_dues)).round_dp(2);
    let today = now.date_naive();
    for i in 1..settings.installment_count {
        // the last due absorbs rounding so the rows sum exactly to remaining
        let amount = if i == future_dues {
            remaining - per_installment * Decimal::from(future_dues - 1)
        } else {
            per_installment
        };
        doc.conference_payment_schedules.push(PaymentSchedule {
            id: Uuid::new_v4().to_string(),
            booking_id: booking.id.clone(),
            conference_id: booking.conference_id.clone(),
            amount,
            due_date: today + Duration::days(settings.installment_interval * i64::from(i)),
            status: ScheduleStatus::Pending,
            installment_number: i + 1,
            created_at: now,
        });
    }
    Ok(future_dues as usize)
}

/// Amount for a *new* payment request (order creation, not capture).
///
/// Precedence: explicit custom amount (validated against the balance due),
/// then the deposit20 method, then the conference's configured deposit,
/// then the full remaining balance.
pub fn resolve_payment_amount(
    booking: &Booking,
    conference: &Conference,
    method: PaymentMethod,
    custom: Option<Decimal>,
) -> Result<Decimal, AppError> {
    if let Some(amount) = custom {
        if amount <= Decimal::ZERO {
            return Err(AppError::Validation("Payment amount must be positive".into()));
        }
        if amount > booking.balance_due() {
            return Err(AppError::Validation(
                "Payment amount exceeds the balance due".into(),
            ));
        }
        return Ok(amount);
    }

    if method == PaymentMethod::Deposit20 {
        return Ok((booking.total_amount * Decimal::new(20, 0) / Decimal::ONE_HUNDRED).round_dp(2));
    }

    if method.is_installment() {
        if let Some(settings) = &conference.payment_settings {
            if let Some(deposit) = settings.deposit_amount {
                return Ok(deposit);
            }
            if let Some(percentage) = settings.deposit_percentage {
                return Ok((booking.total_amount * percentage / Decimal::ONE_HUNDRED).round_dp(2));
            }
        }
    }

    Ok(booking.balance_due())
}
