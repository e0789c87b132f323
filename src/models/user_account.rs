use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Account linked to one or more bookings by group-leader email.
///
/// `verified` is the two-step gate: it only becomes true once the email is
/// verified AND a password has been set. `email_verified` alone is not
/// enough to log in.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserAccount {
    pub id: String,
    /// Stored lowercased; unique.
    pub email: String,
    #[serde(default)]
    pub password_hash: Option<String>,
    #[serde(default)]
    pub email_verified: bool,
    #[serde(default)]
    pub verified: bool,
    #[serde(default)]
    pub booking_ids: Vec<String>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub email_verified_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub verified_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub password_changed_at: Option<DateTime<Utc>>,
}

/// Single-use email verification code, keyed by (email, code).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerificationCode {
    pub email: String,
    pub code: String,
    #[serde(default)]
    pub used: bool,
    pub created_at: DateTime<Utc>,
}

/// Single-use password reset token (32 random bytes, hex), keyed by
/// (email, token).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PasswordResetToken {
    pub email: String,
    pub token: String,
    #[serde(default)]
    pub used: bool,
    pub created_at: DateTime<Utc>,
}
