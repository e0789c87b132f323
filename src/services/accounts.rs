//! Booking-linked user accounts and the email verification flow.
//!
//! Verification is a two-step gate: consuming a code proves the email, but
//! the account only becomes `verified` (loginable) once a password is also
//! set. This keeps sessions impossible before credentials exist.

use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::models::{PasswordResetToken, UserAccount, VerificationCode};
use crate::store::Document;
use crate::utils::error::AppError;

const CODE_TTL_HOURS: i64 = 24;
const RESET_TOKEN_TTL_HOURS: i64 = 1;
const MIN_PASSWORD_LEN: usize = 6;

pub struct LinkOutcome {
    pub account_exists: bool,
    pub account_verified: bool,
    pub account_created: bool,
    /// Present when a verification code was (re-)issued and must be emailed.
    pub issued_code: Option<String>,
    pub user_id: String,
}

/// Associates a booking with the account for its group-leader email,
/// creating the account and issuing a verification code when needed.
/// Callers only invoke this for bookings that are not fully paid.
pub fn link_or_create(
    doc: &mut Document,
    email: &str,
    booking_id: &str,
    now: DateTime<Utc>,
) -> LinkOutcome {
    let email = email.to_lowercase();

    if let Some(account) = doc.account_by_email_mut(&email) {
        if !account.booking_ids.iter().any(|b| b == booking_id) {
            account.booking_ids.push(booking_id.to_string());
        }
        let account_verified = account.verified;
        let email_verified = account.email_verified;
        let user_id = account.id.clone();
        let issued_code = if email_verified {
            None
        } else {
            Some(issue_code(doc, &email, now))
        };
        return LinkOutcome {
            account_exists: true,
            account_verified,
            account_created: false,
            issued_code,
            user_id,
        };
    }

    let account = UserAccount {
        id: Uuid::new_v4().to_string(),
        email: email.clone(),
        password_hash: None,
        email_verified: false,
        verified: false,
        booking_ids: vec![booking_id.to_string()],
        created_at: now,
        email_verified_at: None,
        verified_at: None,
        password_changed_at: None,
    };
    let user_id = account.id.clone();
    doc.user_accounts.push(account);
    let issued_code = Some(issue_code(doc, &email, now));

    LinkOutcome {
        account_exists: false,
        account_verified: false,
        account_created: true,
        issued_code,
        user_id,
    }
}

pub struct RegisterOutcome {
    pub user_id: String,
    pub issued_code: String,
}

/// Standalone registration. Unlike [`link_or_create`] it rejects emails
/// that already have a fully set up account.
pub fn register(
    doc: &mut Document,
    email: &str,
    booking_id: Option<&str>,
    now: DateTime<Utc>,
) -> Result<RegisterOutcome, AppError> {
    let email = email.to_lowercase();

    if let Some(account) = doc.account_by_email(&email) {
        if account.verified && account.password_hash.is_some() {
            return Err(AppError::Validation(
                "An account with this email already exists".into(),
            ));
        }
    }

    let outcome = link_or_create(doc, &email, booking_id.unwrap_or_default(), now);
    // link_or_create links the placeholder booking id when none was given
    if booking_id.is_none() {
        if let Some(account) = doc.account_by_email_mut(&email) {
            account.booking_ids.retain(|b| !b.is_empty());
        }
    }
    let issued_code = match outcome.issued_code {
        Some(code) => code,
        None => issue_code(doc, &email, now),
    };
    Ok(RegisterOutcome {
        user_id: outcome.user_id,
        issued_code,
    })
}

/// Issues a fresh 6-digit single-use code for `email`.
pub fn issue_code(doc: &mut Document, email: &str, now: DateTime<Utc>) -> String {
    let code = generate_code();
    doc.email_verification_codes.push(VerificationCode {
        email: email.to_lowercase(),
        code: code.clone(),
        used: false,
        created_at: now,
    });
    code
}

/// Consumes a verification code and marks the account's email verified.
/// The account stays `verified = false` until a password is set.
pub fn consume_code(
    doc: &mut Document,
    email: &str,
    code: &str,
    now: DateTime<Utc>,
) -> Result<UserAccount, AppError> {
    let verification = doc
        .verification_code_mut(email, code)
        .ok_or_else(|| AppError::TokenExpiredOrUsed("Invalid or expired verification code".into()))?;
    if verification.used {
        return Err(AppError::TokenExpiredOrUsed(
            "This verification code has already been used".into(),
        ));
    }
    if now - verification.created_at > Duration::hours(CODE_TTL_HOURS) {
        return Err(AppError::TokenExpiredOrUsed(
            "Verification code has expired. Please request a new one.".into(),
        ));
    }
    verification.used = true;

    let account = doc
        .account_by_email_mut(email)
        .ok_or(AppError::AccountNotFound)?;
    account.email_verified = true;
    account.email_verified_at = Some(now);
    account.verified = false;
    Ok(account.clone())
}

/// Sets the password on an email-verified account, completing the two-step
/// gate.
pub fn set_password(
    doc: &mut Document,
    email: &str,
    password: &str,
    now: DateTime<Utc>,
) -> Result<UserAccount, AppError> {
    if password.len() < MIN_PASSWORD_LEN {
        return Err(AppError::Validation(
            "Password must be at least 6 characters".into(),
        ));
    }
    let account = doc
        .account_by_email_mut(email)
        .ok_or(AppError::AccountNotFound)?;
    if !account.email_verified {
        return Err(AppError::Validation(
            "Email must be verified before setting password".into(),
        ));
    }
    account.password_hash = Some(hash_password(password));
    account.verified = true;
    account.verified_at = Some(now);
    Ok(account.clone())
}

/// Credential check. Unverified states get specific guidance; a wrong
/// password or unknown email both yield the same generic rejection.
pub fn login(
    doc: &mut Document,
    email: &str,
    password: &str,
    now: DateTime<Utc>,
) -> Result<UserAccount, AppError> {
    let account = doc
        .account_by_email_mut(email)
        .ok_or(AppError::InvalidCredentials)?;
    if !account.email_verified {
        return Err(AppError::EmailNotVerified);
    }
    let Some(hash) = &account.password_hash else {
        return Err(AppError::PasswordNotSet);
    };
    if !verify_password(password, hash) {
        return Err(AppError::InvalidCredentials);
    }
    if !account.verified {
        account.verified = true;
        account.verified_at = Some(now);
    }
    Ok(account.clone())
}

/// Issues a reset token for `email`. Returns `None` for unknown emails;
/// callers respond identically either way so the endpoint cannot be used
/// to enumerate accounts.
pub fn issue_reset_token(doc: &mut Document, email: &str, now: DateTime<Utc>) -> Option<String> {
    let email = email.to_lowercase();
    doc.account_by_email(&email)?;
    let token = generate_reset_token();
    doc.password_reset_tokens.push(PasswordResetToken {
        email,
        token: token.clone(),
        used: false,
        created_at: now,
    });
    Some(token)
}

/// Sets a new password against a valid reset token. The account is marked
/// verified since the token proves control of the email.
pub fn reset_password(
    doc: &mut Document,
    email: &str,
    token: &str,
    new_password: &str,
    now: DateTime<Utc>,
) -> Result<UserAccount, AppError> {
    if new_password.len() < MIN_PASSWORD_LEN {
        return Err(AppError::Validation(
            "Password must be at least 6 characters".into(),
        ));
    }
    let reset = doc
        .password_reset_token_mut(email, token)
        .filter(|t| !t.used)
        .filter(|t| now - t.created_at <= Duration::hours(RESET_TOKEN_TTL_HOURS))
        .ok_or_else(|| AppError::TokenExpiredOrUsed("Invalid or expired reset token".into()))?;
    reset.used = true;

    let account = doc
        .account_by_email_mut(email)
        .ok_or(AppError::AccountNotFound)?;
    account.password_hash = Some(hash_password(new_password));
    account.email_verified = true;
    account.verified = true;
    account.verified_at.get_or_insert(now);
    account.password_changed_at = Some(now);
    Ok(account.clone())
}

/// Password change for a signed-in user, authenticated by the current
/// password.
pub fn change_password(
    doc: &mut Document,
    email: &str,
    current_password: &str,
    new_password: &str,
    now: DateTime<Utc>,
) -> Result<UserAccount, AppError> {
    if new_password.len() < MIN_PASSWORD_LEN {
        return Err(AppError::Validation(
            "New password must be at least 6 characters".into(),
        ));
    }
    let account = doc
        .account_by_email_mut(email)
        .ok_or(AppError::AccountNotFound)?;
    let Some(hash) = &account.password_hash else {
        return Err(AppError::PasswordNotSet);
    };
    if !verify_password(current_password, hash) {
        return Err(AppError::Unauthorized(
            "Current password is incorrect".into(),
        ));
    }
    if verify_password(new_password, hash) {
        return Err(AppError::Validation(
            "New password must be different from current password".into(),
        ));
    }
    account.password_hash = Some(hash_password(new_password));
    account.password_changed_at = Some(now);
    Ok(account.clone())
}

pub fn hash_password(password: &str) -> String {
    let digest = Sha256::digest(password.as_bytes());
    let mut out = String::with_capacity(digest.len() * 2);
    for byte in digest {
        use std::fmt::Write;
        let _ = write!(out, "{byte:02x}");
    }
    out
}

pub fn verify_password(password: &str, hash: &str) -> bool {
    hash_password(password) == hash
}

fn generate_code() -> String {
    rand::thread_rng().gen_range(100_000..1_000_000).to_string()
}

fn generate_reset_token() -> String {
    let bytes: [u8; 32] = rand::thread_rng().gen();
    let mut out = String::with_capacity(bytes.len() * 2);
    for byte in bytes {
        use std::fmt::Write;
        let _ = write!(out, "{byte:02x}");
    }
    out
}
