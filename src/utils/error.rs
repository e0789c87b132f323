use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;
use tracing::error;

use crate::gateway::GatewayError;
use crate::services::discounts::CodeRejection;
use crate::store::StoreError;
use crate::utils::response::error as error_response;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Conference not available for registration")]
    ConferenceUnavailable,

    #[error("{0}")]
    InvalidDiscountCode(CodeRejection),

    #[error("Invalid ticket type for attendee {0}")]
    InvalidTicketType(String),

    #[error("Ticket type {0} is sold out")]
    SoldOut(String),

    #[error("Submitted total does not match the calculated total")]
    SubtotalMismatch,

    #[error("Payment not completed")]
    PaymentNotCompleted,

    #[error("User account not found")]
    AccountNotFound,

    // Deliberately generic to avoid account enumeration.
    #[error("Invalid email or password")]
    InvalidCredentials,

    #[error("Please verify your email address first. Check your email for the verification code.")]
    EmailNotVerified,

    #[error("Please set your password first.")]
    PasswordNotSet,

    #[error("{0}")]
    TokenExpiredOrUsed(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Payment gateway error")]
    Gateway(#[from] GatewayError),

    #[error("Database error")]
    Store(#[from] StoreError),
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::ConferenceUnavailable
            | AppError::InvalidTicketType(_)
            | AppError::SoldOut(_)
            | AppError::SubtotalMismatch
            | AppError::PaymentNotCompleted
            | AppError::TokenExpiredOrUsed(_)
            | AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::InvalidDiscountCode(rejection) => match rejection {
                CodeRejection::NotFound => StatusCode::NOT_FOUND,
                _ => StatusCode::BAD_REQUEST,
            },
            AppError::InvalidCredentials
            | AppError::EmailNotVerified
            | AppError::PasswordNotSet
            | AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::AccountNotFound | AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Gateway(_) => StatusCode::BAD_GATEWAY,
            AppError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            AppError::ConferenceUnavailable => "CONFERENCE_UNAVAILABLE",
            AppError::InvalidDiscountCode(_) => "INVALID_DISCOUNT_CODE",
            AppError::InvalidTicketType(_) => "INVALID_TICKET_TYPE",
            AppError::SoldOut(_) => "SOLD_OUT",
            AppError::SubtotalMismatch => "SUBTOTAL_MISMATCH",
            AppError::PaymentNotCompleted => "PAYMENT_NOT_COMPLETED",
            AppError::AccountNotFound => "ACCOUNT_NOT_FOUND",
            AppError::InvalidCredentials => "INVALID_CREDENTIALS",
            AppError::EmailNotVerified => "EMAIL_NOT_VERIFIED",
            AppError::PasswordNotSet => "PASSWORD_NOT_SET",
            AppError::TokenExpiredOrUsed(_) => "TOKEN_EXPIRED_OR_USED",
            AppError::Validation(_) => "VALIDATION_ERROR",
            AppError::NotFound(_) => "NOT_FOUND",
            AppError::Unauthorized(_) => "UNAUTHORIZED",
            AppError::Gateway(_) => "GATEWAY_ERROR",
            AppError::Store(_) => "DATABASE_ERROR",
        }
    }

    fn log(&self) {
        match self {
            AppError::Gateway(e) => {
                error!(error = ?e, "Payment gateway error");
            }
            AppError::Store(e) => {
                error!(error = ?e, "Database error");
            }
            other => {
                error!(error = %other, code = other.code(), "Request rejected");
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let code = self.code();

        // Log internal details
        self.log();

        // Gateway and store internals are never exposed to the client.
        let public_message = match &self {
            AppError::Gateway(_) => "Payment not completed, please try again".to_string(),
            AppError::Store(_) => "A database error occurred".to_string(),
            other => other.to_string(),
        };

        error_response(code, public_message, None, status)
    }
}
