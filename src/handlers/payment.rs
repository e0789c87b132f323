use axum::extract::State;
use axum::http::HeaderMap;
use axum::response::Response;
use axum::Json;
use chrono::Utc;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::str::FromStr;
use tracing::{info, warn};

use crate::gateway::{OrderRequest, WebhookHeaders};
use crate::models::{PaymentMethod, PaymentStatus};
use crate::notify::Notification;
use crate::services::ledger;
use crate::state::AppState;
use crate::utils::error::AppError;
use crate::utils::response::success;

const CURRENCY: &str = "GBP";

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrderRequest {
    pub booking_id: String,
    #[serde(default)]
    pub payment_method: Option<PaymentMethod>,
    #[serde(default)]
    pub amount: Option<Decimal>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct OrderCreated {
    order_id: String,
    status: String,
    amount: Decimal,
    links: Value,
}

/// POST /api/conference/paypal/create-order
///
/// Resolves the amount to charge, creates the gateway order, and records
/// the order id on the booking. The gateway round-trip happens outside the
/// store lock.
pub async fn create_order(
    State(state): State<AppState>,
    Json(request): Json<CreateOrderRequest>,
) -> Result<Response, AppError> {
    let (booking, conference) = state
        .store
        .read(|doc| {
            let booking = doc.booking(&request.booking_id).cloned()?;
            let conference = doc.conference(&booking.conference_id).cloned()?;
            Some((booking, conference))
        })
        .await
        .ok_or_else(|| AppError::NotFound(format!("booking {}", request.booking_id)))?;

    if booking.payment_status == PaymentStatus::Paid {
        return Err(AppError::Validation(
            "Booking is already paid in full".into(),
        ));
    }
    if let Some(settings) = &conference.payment_settings {
        if !settings.paypal_enabled {
            return Err(AppError::Validation(
                "PayPal payments are not enabled for this conference".into(),
            ));
        }
    }

    let method = request.payment_method.unwrap_or(booking.payment_method);
    let amount = ledger::resolve_payment_amount(&booking, &conference, method, request.amount)?;

    let installments = method
        .is_installment()
        .then(|| {
            conference
                .payment_settings
                .as_ref()
                .map(|s| s.installment_count)
        })
        .flatten();
    let order = state
        .gateway
        .create_order(&OrderRequest {
            amount,
            currency: CURRENCY.to_string(),
            booking_id: booking.id.clone(),
            booking_reference: booking.booking_reference.clone(),
            description: format!("{} - {}", conference.title, booking.booking_reference),
            installments,
        })
        .await?;

    state
        .store
        .mutate(|doc| {
            let record = doc
                .booking_mut(&booking.id)
                .ok_or_else(|| AppError::NotFound(format!("booking {}", booking.id)))?;
            record.paypal_order_id = Some(order.id.clone());
            record.paypal_order_status = Some(order.status.clone());
            record.payment_method = method;
            Ok::<_, AppError>(())
        })
        .await?;

    info!(booking_id = %booking.id, order_id = %order.id, %amount, "created payment order");

    Ok(success(OrderCreated {
        order_id: order.id,
        status: order.status,
        amount,
        links: order.links,
    }))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaptureRequest {
    pub order_id: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CaptureResponse {
    booking_id: String,
    payment_status: PaymentStatus,
    amount_paid: Decimal,
    balance_due: Decimal,
    account_exists: bool,
    account_verified: bool,
}

/// POST /api/conference/paypal/capture
pub async fn capture_order(
    State(state): State<AppState>,
    Json(request): Json<CaptureRequest>,
) -> Result<Response, AppError> {
    let now = Utc::now();
    let outcome = state.gateway.capture_order(&request.order_id).await?;
    if outcome.status != "COMPLETED" {
        warn!(order_id = %request.order_id, status = %outcome.status, "capture not completed");
        return Err(AppError::PaymentNotCompleted);
    }

    let applied = state
        .store
        .mutate(|doc| {
            let booking_id = doc
                .booking_by_order_id(&request.order_id)
                .map(|b| b.id.clone())
                .or_else(|| outcome.booking_id.clone())
                .ok_or_else(|| {
                    AppError::NotFound(format!("booking for order {}", request.order_id))
                })?;
            let applied = ledger::apply_capture(
                doc,
                &booking_id,
                &outcome.capture_id,
                outcome.amount,
                now,
            )?;
            if let Some(record) = doc.booking_mut(&booking_id) {
                record.paypal_order_status = Some(outcome.status.clone());
            }
            Ok::<_, AppError>(applied)
        })
        .await?;

    let booking = &applied.booking;
    info!(
        booking_id = %booking.id,
        capture_id = %outcome.capture_id,
        amount = %outcome.amount,
        status = ?booking.payment_status,
        "payment captured"
    );

    let (account_exists, account_verified, conference_title) = state
        .store
        .read(|doc| {
            let account = doc.account_by_email(&booking.group_leader_email);
            let title = doc
                .conference(&booking.conference_id)
                .map(|c| c.title.clone())
                .unwrap_or_default();
            (
                account.is_some(),
                account.map(|a| a.verified).unwrap_or(false),
                title,
            )
        })
        .await;

    if applied.newly_recorded {
        let notifier = state.notifier.clone();
        let notification = Notification::PaymentCaptured {
            to: booking.group_leader_email.clone(),
            conference_title,
            booking_reference: booking.booking_reference.clone(),
            amount: outcome.amount,
            balance_due: booking.balance_due(),
        };
        tokio::spawn(async move { notifier.dispatch(notification).await });
    }

    Ok(success(CaptureResponse {
        booking_id: booking.id.clone(),
        payment_status: booking.payment_status,
        amount_paid: booking.paid_amount,
        balance_due: booking.balance_due(),
        account_exists,
        account_verified,
    }))
}

#[derive(Serialize)]
struct WebhookAck {
    received: bool,
}

/// POST /api/conference/paypal/webhook
///
/// Signature is verified against the gateway before any event is acted on.
/// Events for unknown bookings are acknowledged so the gateway stops
/// retrying them.
pub async fn webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(event): Json<Value>,
) -> Result<Response, AppError> {
    let signature = WebhookHeaders::from_header_map(&headers);
    let valid = state.gateway.verify_webhook(&signature, &event).await?;
    if !valid {
        return Err(AppError::Unauthorized("Invalid webhook signature".into()));
    }

    let event_type = event["event_type"].as_str().unwrap_or_default();
    let resource = &event["resource"];
    let now = Utc::now();

    match event_type {
        "PAYMENT.CAPTURE.COMPLETED" => {
            let capture_id = resource["id"].as_str().unwrap_or_default().to_string();
            let booking_id = resource["custom_id"].as_str().map(str::to_string);
            let amount = resource["amount"]["value"]
                .as_str()
                .and_then(|v| Decimal::from_str(v).ok());

            match (booking_id, amount) {
                (Some(booking_id), Some(amount)) => {
                    let result = state
                        .store
                        .mutate(|doc| {
                            ledger::apply_capture(doc, &booking_id, &capture_id, amount, now)
                        })
                        .await;
                    match result {
                        Ok(applied) if applied.newly_recorded => {
                            info!(%booking_id, %capture_id, "webhook applied capture");
                        }
                        Ok(_) => {}
                        Err(AppError::NotFound(what)) => {
                            warn!(%what, "webhook capture for unknown booking, ignoring");
                        }
                        Err(e) => return Err(e),
                    }
                }
                _ => warn!(%event_type, "webhook capture event missing custom_id or amount"),
            }
        }
        "PAYMENT.CAPTURE.DENIED" | "PAYMENT.CAPTURE.REFUNDED" => {
            if let Some(booking_id) = resource["custom_id"].as_str() {
                let result = state
                    .store
                    .mutate(|doc| ledger::mark_payment_failed(doc, booking_id))
                    .await;
                match result {
                    Ok(booking) => {
                        warn!(booking_id = %booking.id, %event_type, "payment reversed");
                    }
                    Err(AppError::NotFound(what)) => {
                        warn!(%what, "webhook reversal for unknown booking, ignoring");
                    }
                    Err(e) => return Err(e),
                }
            }
        }
        other => {
            info!(event_type = %other, "ignoring webhook event");
        }
    }

    Ok(success(WebhookAck { received: true }))
}
