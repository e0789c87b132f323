use axum::extract::{Query, State};
use axum::response::Response;
use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::models::DiscountCode;
use crate::services::discounts;
use crate::state::AppState;
use crate::utils::error::AppError;
use crate::utils::response::success;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidateQuery {
    pub code: String,
    pub conference_id: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ValidatedCode {
    discount_code: DiscountCode,
}

/// GET /api/conference/discount-code?code=...&conferenceId=...
///
/// Pre-checkout validation so the client can show the discount before
/// submitting. The authoritative check still happens at booking time.
pub async fn validate_discount_code(
    State(state): State<AppState>,
    Query(query): Query<ValidateQuery>,
) -> Result<Response, AppError> {
    let now = Utc::now();
    let code: DiscountCode = state
        .store
        .read(|doc| {
            discounts::validate_code(doc, &query.code, &query.conference_id, now).cloned()
        })
        .await
        .map_err(AppError::InvalidDiscountCode)?;

    Ok(success(ValidatedCode {
        discount_code: code,
    }))
}
