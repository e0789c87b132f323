use axum::response::Response;
use serde::Serialize;

use crate::utils::response::success_with_message;

pub mod account;
pub mod booking;
pub mod conference;
pub mod discount;
pub mod payment;

#[derive(Serialize)]
struct HealthPayload {
    status: &'static str,
    service: &'static str,
}

pub async fn health_check() -> Response {
    let payload = HealthPayload {
        status: "ok",
        service: "koinonia-api",
    };

    success_with_message(payload, "Health check successful")
}
