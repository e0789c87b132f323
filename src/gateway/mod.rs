//! Payment gateway seam. Handlers talk to [`PaymentGateway`] so the HTTP
//! client lives behind a trait and tests can substitute a stub.

pub mod paypal;

use async_trait::async_trait;
use axum::http::HeaderMap;
use rust_decimal::Decimal;
use serde_json::Value;
use thiserror::Error;

pub use paypal::PayPalClient;

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("payment gateway is not configured")]
    NotConfigured,
    #[error("gateway request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("gateway returned {status}: {body}")]
    Api { status: u16, body: String },
    #[error("gateway response missing {0}")]
    Malformed(&'static str),
}

#[derive(Debug, Clone)]
pub struct OrderRequest {
    pub amount: Decimal,
    pub currency: String,
    pub booking_id: String,
    pub booking_reference: String,
    pub description: String,
    /// When set, the order is created with the pay-over-time experience.
    pub installments: Option<u32>,
}

#[derive(Debug, Clone)]
pub struct GatewayOrder {
    pub id: String,
    pub status: String,
    pub links: Value,
}

#[derive(Debug, Clone)]
pub struct CaptureOutcome {
    pub order_id: String,
    pub status: String,
    pub capture_id: String,
    /// The booking id carried through the order's custom_id field.
    pub booking_id: Option<String>,
    pub amount: Decimal,
}

/// Signature headers forwarded verbatim from an incoming webhook request.
#[derive(Debug, Clone, Default)]
pub struct WebhookHeaders {
    pub transmission_id: String,
    pub transmission_time: String,
    pub cert_url: String,
    pub auth_algo: String,
    pub transmission_sig: String,
}

impl WebhookHeaders {
    pub fn from_header_map(headers: &HeaderMap) -> Self {
        let get = |name: &str| {
            headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .unwrap_or_default()
                .to_string()
        };
        Self {
            transmission_id: get("paypal-transmission-id"),
            transmission_time: get("paypal-transmission-time"),
            cert_url: get("paypal-cert-url"),
            auth_algo: get("paypal-auth-algo"),
            transmission_sig: get("paypal-transmission-sig"),
        }
    }
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn create_order(&self, request: &OrderRequest) -> Result<GatewayOrder, GatewayError>;

    async fn capture_order(&self, order_id: &str) -> Result<CaptureOutcome, GatewayError>;

    /// Returns whether the webhook signature checks out. Transport errors
    /// surface as `Err`; a definitive "not valid" answer is `Ok(false)`.
    async fn verify_webhook(
        &self,
        headers: &WebhookHeaders,
        event_body: &Value,
    ) -> Result<bool, GatewayError>;
}
