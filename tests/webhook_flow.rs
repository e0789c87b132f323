//! Webhook handling end to end: a stub gateway stands in for PayPal so the
//! signature check and the capture bookkeeping can be driven over HTTP.

use std::sync::Arc;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use chrono::{TimeZone, Utc};
use rust_decimal_macros::dec;
use serde_json::{json, Value};
use tower::ServiceExt;

use koinonia_server::config::Config;
use koinonia_server::email::LogMailer;
use koinonia_server::gateway::{
    CaptureOutcome, GatewayError, GatewayOrder, OrderRequest, PaymentGateway, WebhookHeaders,
};
use koinonia_server::models::{Booking, PaymentMethod, PaymentStatus};
use koinonia_server::notify::Notifier;
use koinonia_server::routes::create_routes;
use koinonia_server::state::AppState;
use koinonia_server::store::{Document, Store};

/// Answers signature checks with a fixed verdict and refuses everything else.
struct StubGateway {
    signature_valid: bool,
}

#[async_trait]
impl PaymentGateway for StubGateway {
    async fn create_order(&self, _request: &OrderRequest) -> Result<GatewayOrder, GatewayError> {
        Err(GatewayError::NotConfigured)
    }

    async fn capture_order(&self, _order_id: &str) -> Result<CaptureOutcome, GatewayError> {
        Err(GatewayError::NotConfigured)
    }

    async fn verify_webhook(
        &self,
        _headers: &WebhookHeaders,
        _event_body: &Value,
    ) -> Result<bool, GatewayError> {
        Ok(self.signature_valid)
    }
}

fn seed() -> Document {
    let mut doc = Document::default();
    doc.conference_bookings.push(Booking {
        id: "bk-1".into(),
        conference_id: "conf-1".into(),
        booking_reference: "KOI-2024-0001".into(),
        group_leader_name: "John Smith".into(),
        group_leader_email: "john.smith@example.com".into(),
        group_leader_phone: None,
        attendee_count: 2,
        subtotal: dec!(200),
        discount_amount: dec!(0),
        discount_code: None,
        total_amount: dec!(200),
        payment_method: PaymentMethod::Paypal,
        payment_status: PaymentStatus::Unpaid,
        paid_amount: dec!(0),
        paypal_order_id: Some("ORD-1".into()),
        paypal_order_status: Some("CREATED".into()),
        paypal_capture_ids: vec![],
        payment_date: None,
        created_at: Utc.with_ymd_and_hms(2024, 8, 15, 10, 0, 0).unwrap(),
        archived: false,
    });
    doc
}

fn app(signature_valid: bool) -> (Router, Arc<Store>) {
    let store = Arc::new(Store::in_memory_with(seed()));
    let state = AppState {
        store: store.clone(),
        gateway: Arc::new(StubGateway { signature_valid }),
        notifier: Arc::new(Notifier::new(Arc::new(LogMailer), None, "Koinonia".into())),
        config: Arc::new(Config::from_env()),
    };
    (create_routes(state), store)
}

fn webhook_request(event: &Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/api/conference/paypal/webhook")
        .header("content-type", "application/json")
        .header("paypal-transmission-id", "tx-1")
        .header("paypal-transmission-time", "2024-08-15T10:00:00Z")
        .header("paypal-transmission-sig", "sig")
        .header("paypal-cert-url", "https://api.paypal.com/cert")
        .header("paypal-auth-algo", "SHA256withRSA")
        .body(Body::from(event.to_string()))
        .unwrap()
}

fn completed_event(capture_id: &str, booking_id: &str, amount: &str) -> Value {
    json!({
        "event_type": "PAYMENT.CAPTURE.COMPLETED",
        "resource": {
            "id": capture_id,
            "custom_id": booking_id,
            "amount": { "value": amount, "currency_code": "GBP" }
        }
    })
}

#[tokio::test]
async fn webhook_with_a_bad_signature_is_rejected() {
    let (app, store) = app(false);

    let response = app
        .oneshot(webhook_request(&completed_event("CAP-1", "bk-1", "80.00")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    store
        .read(|doc| {
            let booking = doc.booking("bk-1").unwrap();
            assert_eq!(booking.paid_amount, dec!(0));
            assert_eq!(booking.payment_status, PaymentStatus::Unpaid);
        })
        .await;
}

#[tokio::test]
async fn completed_capture_is_applied_once() {
    let (app, store) = app(true);
    let event = completed_event("CAP-1", "bk-1", "80.00");

    let response = app.clone().oneshot(webhook_request(&event)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    store
        .read(|doc| {
            let booking = doc.booking("bk-1").unwrap();
            assert_eq!(booking.paid_amount, dec!(80));
            assert_eq!(booking.payment_status, PaymentStatus::Partial);
            assert!(booking.has_capture("CAP-1"));
        })
        .await;

    // The gateway retries deliveries; a replay must not double-count.
    let replay = app.oneshot(webhook_request(&event)).await.unwrap();
    assert_eq!(replay.status(), StatusCode::OK);

    store
        .read(|doc| {
            let booking = doc.booking("bk-1").unwrap();
            assert_eq!(booking.paid_amount, dec!(80));
            assert_eq!(booking.paypal_capture_ids, vec!["CAP-1".to_string()]);
        })
        .await;
}

#[tokio::test]
async fn capture_for_an_unknown_booking_is_acknowledged() {
    let (app, store) = app(true);

    let response = app
        .oneshot(webhook_request(&completed_event("CAP-9", "bk-missing", "80.00")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    store
        .read(|doc| assert_eq!(doc.booking("bk-1").unwrap().paid_amount, dec!(0)))
        .await;
}

#[tokio::test]
async fn denied_capture_marks_the_payment_failed() {
    let (app, store) = app(true);

    let paid = app
        .clone()
        .oneshot(webhook_request(&completed_event("CAP-1", "bk-1", "80.00")))
        .await
        .unwrap();
    assert_eq!(paid.status(), StatusCode::OK);

    let denied = json!({
        "event_type": "PAYMENT.CAPTURE.DENIED",
        "resource": { "id": "CAP-1", "custom_id": "bk-1" }
    });
    let response = app.oneshot(webhook_request(&denied)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    store
        .read(|doc| {
            let booking = doc.booking("bk-1").unwrap();
            assert_eq!(booking.payment_status, PaymentStatus::Unpaid);
        })
        .await;
}
