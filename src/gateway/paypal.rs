//! PayPal REST client: checkout orders, captures, and webhook signature
//! verification against the v1/v2 APIs.

use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, warn};

use super::{
    CaptureOutcome, GatewayError, GatewayOrder, OrderRequest, PaymentGateway, WebhookHeaders,
};

const MAX_ATTEMPTS: u32 = 3;

pub struct PayPalClient {
    http: reqwest::Client,
    client_id: String,
    client_secret: String,
    base_url: String,
    webhook_id: String,
    site_url: String,
    brand_name: String,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
}

impl PayPalClient {
    pub fn new(
        client_id: String,
        client_secret: String,
        base_url: String,
        webhook_id: String,
        site_url: String,
        brand_name: String,
    ) -> Self {
        Self {
            http: reqwest::Client::new(),
            client_id,
            client_secret,
            base_url: base_url.trim_end_matches('/').to_string(),
            webhook_id,
            site_url,
            brand_name,
        }
    }

    fn configured(&self) -> Result<(), GatewayError> {
        if self.client_id.is_empty() || self.client_secret.is_empty() {
            return Err(GatewayError::NotConfigured);
        }
        Ok(())
    }

    async fn access_token(&self) -> Result<String, GatewayError> {
        self.configured()?;
        let response = self
            .http
            .post(format!("{}/v1/oauth2/token", self.base_url))
            .basic_auth(&self.client_id, Some(&self.client_secret))
            .form(&[("grant_type", "client_credentials")])
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(GatewayError::Api {
                status: response.status().as_u16(),
                body: response.text().await.unwrap_or_default(),
            });
        }
        let token: TokenResponse = response.json().await?;
        Ok(token.access_token)
    }

    /// POSTs `body` with a fresh bearer token, retrying transient failures
    /// (network errors and 5xx responses) up to [`MAX_ATTEMPTS`] times.
    async fn post_json(&self, path: &str, body: &Value) -> Result<Value, GatewayError> {
        let token = self.access_token().await?;
        let url = format!("{}{}", self.base_url, path);
        let mut last_err = GatewayError::Malformed("no attempts made");
        for attempt in 1..=MAX_ATTEMPTS {
            let result = self
                .http
                .post(&url)
                .bearer_auth(&token)
                .json(body)
                .send()
                .await;
            match result {
                Ok(response) if response.status().is_success() => {
                    return Ok(response.json().await?);
                }
                Ok(response) => {
                    let status = response.status().as_u16();
                    let body = response.text().await.unwrap_or_default();
                    if status < 500 {
                        return Err(GatewayError::Api { status, body });
                    }
                    warn!(%url, status, attempt, "gateway 5xx, retrying");
                    last_err = GatewayError::Api { status, body };
                }
                Err(err) if err.is_connect() || err.is_timeout() => {
                    warn!(%url, attempt, error = %err, "gateway network error, retrying");
                    last_err = GatewayError::Http(err);
                }
                Err(err) => return Err(GatewayError::Http(err)),
            }
            if attempt < MAX_ATTEMPTS {
                tokio::time::sleep(Duration::from_millis(200 * u64::from(attempt))).await;
            }
        }
        Err(last_err)
    }
}

#[async_trait]
impl PaymentGateway for PayPalClient {
    async fn create_order(&self, request: &OrderRequest) -> Result<GatewayOrder, GatewayError> {
        let mut body = json!({
            "intent": "CAPTURE",
            "purchase_units": [{
                "reference_id": request.booking_reference,
                "custom_id": request.booking_id,
                "description": request.description,
                "amount": {
                    "currency_code": request.currency,
                    "value": money_string(request.amount),
                },
            }],
            "application_context": {
                "brand_name": self.brand_name,
                "user_action": "PAY_NOW",
                "return_url": format!("{}/booking/confirmation", self.site_url),
                "cancel_url": format!("{}/booking/cancelled", self.site_url),
            },
        });
        if request.installments.is_some() {
            body["payment_source"] = json!({
                "paypal": {
                    "experience_context": {
                        "brand_name": self.brand_name,
                        "user_action": "PAY_NOW",
                        "return_url": format!("{}/booking/confirmation", self.site_url),
                        "cancel_url": format!("{}/booking/cancelled", self.site_url),
                    },
                    "attributes": { "vault": { "store_in_vault": "ON_SUCCESS" } },
                }
            });
        }

        let response = self.post_json("/v2/checkout/orders", &body).await?;
        let id = response["id"]
            .as_str()
            .ok_or(GatewayError::Malformed("order id"))?
            .to_string();
        let status = response["status"].as_str().unwrap_or_default().to_string();
        debug!(order_id = %id, %status, "created checkout order");
        Ok(GatewayOrder {
            id,
            status,
            links: response["links"].clone(),
        })
    }

    async fn capture_order(&self, order_id: &str) -> Result<CaptureOutcome, GatewayError> {
        let response = self
            .post_json(
                &format!("/v2/checkout/orders/{order_id}/capture"),
                &json!({}),
            )
            .await?;

        let status = response["status"].as_str().unwrap_or_default().to_string();
        let capture = &response["purchase_units"][0]["payments"]["captures"][0];
        let capture_id = capture["id"]
            .as_str()
            .ok_or(GatewayError::Malformed("capture id"))?
            .to_string();
        let amount = capture["amount"]["value"]
            .as_str()
            .and_then(|v| Decimal::from_str(v).ok())
            .ok_or(GatewayError::Malformed("capture amount"))?;
        let booking_id = capture["custom_id"].as_str().map(str::to_string);
        debug!(%order_id, %capture_id, %status, "captured order");
        Ok(CaptureOutcome {
            order_id: order_id.to_string(),
            status,
            capture_id,
            booking_id,
            amount,
        })
    }

    async fn verify_webhook(
        &self,
        headers: &WebhookHeaders,
        event_body: &Value,
    ) -> Result<bool, GatewayError> {
        if self.webhook_id.is_empty() {
            return Err(GatewayError::NotConfigured);
        }
        let body = json!({
            "auth_algo": headers.auth_algo,
            "cert_url": headers.cert_url,
            "transmission_id": headers.transmission_id,
            "transmission_sig": headers.transmission_sig,
            "transmission_time": headers.transmission_time,
            "webhook_id": self.webhook_id,
            "webhook_event": event_body,
        });
        let token = self.access_token().await?;
        let response = self
            .http
            .post(format!(
                "{}/v1/notifications/verify-webhook-signature",
                self.base_url
            ))
            .bearer_auth(&token)
            .json(&body)
            .send()
            .await?;
        if !response.status().is_success() {
            warn!(status = %response.status(), "webhook verification call failed");
            return Ok(false);
        }
        let payload: Value = response.json().await?;
        Ok(payload["verification_status"].as_str() == Some("SUCCESS"))
    }
}

/// PayPal wants amounts as strings with exactly two decimal places.
pub fn money_string(amount: Decimal) -> String {
    format!("{:.2}", amount.round_dp(2))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn money_string_always_has_two_decimals() {
        assert_eq!(money_string(dec!(120)), "120.00");
        assert_eq!(money_string(dec!(43.5)), "43.50");
        assert_eq!(money_string(dec!(19.999)), "20.00");
    }

    #[test]
    fn unconfigured_client_reports_not_configured() {
        let client = PayPalClient::new(
            String::new(),
            String::new(),
            "https://api-m.sandbox.paypal.com".into(),
            String::new(),
            "https://example.org".into(),
            "Test".into(),
        );
        assert!(matches!(
            client.configured(),
            Err(GatewayError::NotConfigured)
        ));
    }
}
