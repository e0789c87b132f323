use axum::extract::{Query, State};
use axum::response::Response;
use axum::Json;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::models::UserAccount;
use crate::notify::Notification;
use crate::services::accounts;
use crate::state::AppState;
use crate::utils::error::AppError;
use crate::utils::response::{success, success_with_message};

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub email: String,
    #[serde(default)]
    pub booking_id: Option<String>,
}

/// POST /api/user/register
pub async fn register(
    State(state): State<AppState>,
    Json(request): Json<RegisterRequest>,
) -> Result<Response, AppError> {
    let now = Utc::now();
    let outcome = state
        .store
        .mutate(|doc| accounts::register(doc, &request.email, request.booking_id.as_deref(), now))
        .await?;

    send_code(&state, request.email.to_lowercase(), outcome.issued_code);
    info!(user_id = %outcome.user_id, "registration started");

    Ok(success_with_message(
        serde_json::json!({ "userId": outcome.user_id }),
        "Verification code sent to your email",
    ))
}

#[derive(Deserialize)]
pub struct VerifyRequest {
    pub email: String,
    pub code: String,
}

/// POST /api/user/verify
pub async fn verify_email(
    State(state): State<AppState>,
    Json(request): Json<VerifyRequest>,
) -> Result<Response, AppError> {
    let now = Utc::now();
    let account = state
        .store
        .mutate(|doc| accounts::consume_code(doc, &request.email, &request.code, now))
        .await?;

    Ok(success_with_message(
        AccountView::from(&account),
        "Email verified. Please set your password.",
    ))
}

#[derive(Deserialize)]
pub struct SetPasswordRequest {
    pub email: String,
    pub password: String,
}

/// POST /api/user/set-password
pub async fn set_password(
    State(state): State<AppState>,
    Json(request): Json<SetPasswordRequest>,
) -> Result<Response, AppError> {
    let now = Utc::now();
    let account = state
        .store
        .mutate(|doc| accounts::set_password(doc, &request.email, &request.password, now))
        .await?;

    info!(user_id = %account.id, "account setup completed");
    Ok(success_with_message(
        AccountView::from(&account),
        "Password set. Your account is ready.",
    ))
}

#[derive(Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// POST /api/user/login
pub async fn login(
    State(state): State<AppState>,
    Json(request): Json<LoginRequest>,
) -> Result<Response, AppError> {
    let now = Utc::now();
    let account = state
        .store
        .mutate(|doc| accounts::login(doc, &request.email, &request.password, now))
        .await?;

    Ok(success(AccountView::from(&account)))
}

#[derive(Deserialize)]
pub struct ResendRequest {
    pub email: String,
}

/// POST /api/user/resend-code
pub async fn resend_code(
    State(state): State<AppState>,
    Json(request): Json<ResendRequest>,
) -> Result<Response, AppError> {
    let now = Utc::now();
    let email = request.email.to_lowercase();
    let code = state
        .store
        .mutate(|doc| {
            let account = doc.account_by_email(&email).ok_or(AppError::AccountNotFound)?;
            if account.email_verified {
                return Err(AppError::Validation("Email is already verified".into()));
            }
            Ok(accounts::issue_code(doc, &email, now))
        })
        .await?;

    send_code(&state, email, code);
    Ok(success_with_message(
        serde_json::json!({}),
        "Verification code sent to your email",
    ))
}

#[derive(Deserialize)]
pub struct ForgotPasswordRequest {
    pub email: String,
}

/// POST /api/user/forgot-password
///
/// Always responds with the same success message so the endpoint does not
/// reveal which emails have accounts.
pub async fn forgot_password(
    State(state): State<AppState>,
    Json(request): Json<ForgotPasswordRequest>,
) -> Result<Response, AppError> {
    let now = Utc::now();
    let email = request.email.to_lowercase();
    let token = state
        .store
        .mutate(|doc| Ok::<_, AppError>(accounts::issue_reset_token(doc, &email, now)))
        .await?;

    if let Some(token) = token {
        let notifier = state.notifier.clone();
        let to = email.clone();
        tokio::spawn(async move {
            notifier
                .dispatch(Notification::PasswordReset { to, token })
                .await;
        });
    }

    Ok(success_with_message(
        serde_json::json!({}),
        "If an account exists for that email, a reset link has been sent",
    ))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResetPasswordRequest {
    pub email: String,
    pub token: String,
    pub new_password: String,
}

/// POST /api/user/reset-password
pub async fn reset_password(
    State(state): State<AppState>,
    Json(request): Json<ResetPasswordRequest>,
) -> Result<Response, AppError> {
    let now = Utc::now();
    let account = state
        .store
        .mutate(|doc| {
            accounts::reset_password(
                doc,
                &request.email,
                &request.token,
                &request.new_password,
                now,
            )
        })
        .await?;

    info!(user_id = %account.id, "password reset completed");
    Ok(success_with_message(
        AccountView::from(&account),
        "Password reset. You can now sign in.",
    ))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordRequest {
    pub email: String,
    pub current_password: String,
    pub new_password: String,
}

/// POST /api/user/change-password
pub async fn change_password(
    State(state): State<AppState>,
    Json(request): Json<ChangePasswordRequest>,
) -> Result<Response, AppError> {
    let now = Utc::now();
    let account = state
        .store
        .mutate(|doc| {
            accounts::change_password(
                doc,
                &request.email,
                &request.current_password,
                &request.new_password,
                now,
            )
        })
        .await?;

    info!(user_id = %account.id, "password changed");
    Ok(success_with_message(
        AccountView::from(&account),
        "Password changed successfully",
    ))
}

#[derive(Deserialize)]
pub struct CheckAccountQuery {
    pub email: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct AccountCheck {
    exists: bool,
    verified: bool,
    email: String,
}

/// GET /api/user/check-account?email=...
pub async fn check_account(
    State(state): State<AppState>,
    Query(query): Query<CheckAccountQuery>,
) -> Result<Response, AppError> {
    let email = query.email.to_lowercase();
    let check = state
        .store
        .read(|doc| {
            let account = doc.account_by_email(&email);
            AccountCheck {
                exists: account.is_some(),
                verified: account.map(|a| a.verified).unwrap_or(false),
                email: email.clone(),
            }
        })
        .await;

    Ok(success(check))
}

/// Account fields safe to return to the client. The password hash and
/// internal timestamps stay server-side.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct AccountView {
    user_id: String,
    email: String,
    email_verified: bool,
    verified: bool,
    booking_ids: Vec<String>,
}

impl From<&UserAccount> for AccountView {
    fn from(account: &UserAccount) -> Self {
        Self {
            user_id: account.id.clone(),
            email: account.email.clone(),
            email_verified: account.email_verified,
            verified: account.verified,
            booking_ids: account.booking_ids.clone(),
        }
    }
}

fn send_code(state: &AppState, email: String, code: String) {
    let notifier = state.notifier.clone();
    tokio::spawn(async move {
        notifier
            .dispatch(Notification::VerificationCode { to: email, code })
            .await;
    });
}
