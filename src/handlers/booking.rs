use axum::extract::{Path, State};
use axum::response::Response;
use axum::Json;
use chrono::Utc;
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::info;

use crate::models::{Attendee, Booking};
use crate::notify::{self, Notification};
use crate::services::{accounts, booking};
use crate::state::AppState;
use crate::utils::error::AppError;
use crate::utils::response::success;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct BookingCreated {
    booking_id: String,
    booking_reference: String,
    total_amount: Decimal,
    account_exists: bool,
    account_verified: bool,
    /// True when the leader still has to verify their email or set a
    /// password before they can sign in.
    account_needs_setup: bool,
}

/// POST /api/conference/booking
///
/// Validates and persists a booking in one store transaction, links the
/// group leader's account, then sends confirmation emails off the request
/// path.
pub async fn create_booking(
    State(state): State<AppState>,
    Json(request): Json<booking::BookingRequest>,
) -> Result<Response, AppError> {
    let now = Utc::now();

    let (created, link) = state
        .store
        .mutate(|doc| {
            let created = booking::create(doc, &request, now)?;
            let link = accounts::link_or_create(
                doc,
                &created.booking.group_leader_email,
                &created.booking.id,
                now,
            );
            Ok::<_, AppError>((created, link))
        })
        .await?;

    info!(
        booking_id = %created.booking.id,
        reference = %created.booking.booking_reference,
        attendees = created.booking.attendee_count,
        total = %created.booking.total_amount,
        "booking created"
    );

    let mut notifications = vec![Notification::BookingConfirmed {
        to: created.booking.group_leader_email.clone(),
        conference_title: created.conference.title.clone(),
        booking_reference: created.booking.booking_reference.clone(),
        total: created.booking.total_amount,
        attendee_names: created
            .attendees
            .iter()
            .map(|a| a.full_name.clone())
            .collect(),
    }];
    let child_attendees: Vec<_> = state
        .store
        .read(|doc| {
            created
                .attendees
                .iter()
                .filter(|a| {
                    doc.ticket_type(&a.ticket_type_id)
                        .is_some_and(|t| t.is_child())
                })
                .cloned()
                .collect()
        })
        .await;
    notifications.extend(notify::child_notifications(
        &created.conference,
        &child_attendees,
    ));
    if let Some(code) = &link.issued_code {
        notifications.push(Notification::VerificationCode {
            to: created.booking.group_leader_email.clone(),
            code: code.clone(),
        });
    }
    let notifier = state.notifier.clone();
    tokio::spawn(async move { notifier.dispatch_all(notifications).await });

    Ok(success(BookingCreated {
        booking_id: created.booking.id,
        booking_reference: created.booking.booking_reference,
        total_amount: created.booking.total_amount,
        account_exists: link.account_exists,
        account_verified: link.account_verified,
        account_needs_setup: !link.account_verified,
    }))
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct BookingDetail {
    booking: Booking,
    attendees: Vec<Attendee>,
}

/// GET /api/conference/booking/:reference
///
/// Confirmation-page lookup by the human-facing booking reference.
pub async fn get_booking(
    State(state): State<AppState>,
    Path(reference): Path<String>,
) -> Result<Response, AppError> {
    let detail = state
        .store
        .read(|doc| {
            let booking = doc.booking_by_reference(&reference).filter(|b| !b.archived)?;
            let attendees = doc
                .attendees_for_booking(&booking.id)
                .into_iter()
                .cloned()
                .collect();
            Some(BookingDetail {
                booking: booking.clone(),
                attendees,
            })
        })
        .await
        .ok_or_else(|| AppError::NotFound(format!("booking '{reference}'")))?;

    Ok(success(detail))
}
