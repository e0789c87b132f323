//! Single-document JSON store.
//!
//! The whole database is one JSON document of named top-level arrays, read
//! into memory at startup and flushed in full after every mutation. All
//! mutations run under one writer lock, so check-then-act sequences such as
//! capacity check → sold increment are serialized and cannot interleave.
//! Gateway round-trips must never happen while the lock is held.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::sync::RwLock;

use crate::models::{
    Attendee, Booking, Conference, DiscountCode, PasswordResetToken, PaymentSchedule, TicketType,
    UserAccount, VerificationCode,
};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to read database file: {0}")]
    Read(#[source] std::io::Error),

    #[error("failed to write database file: {0}")]
    Write(#[source] std::io::Error),

    #[error("database file is not valid JSON: {0}")]
    Parse(#[from] serde_json::Error),
}

/// The persisted document. Collections this service does not own (CMS pages,
/// team, hero slides, ...) are carried through `rest` untouched so a flush
/// never drops them.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Document {
    pub conferences: Vec<Conference>,
    pub conference_ticket_types: Vec<TicketType>,
    pub conference_bookings: Vec<Booking>,
    pub conference_attendees: Vec<Attendee>,
    pub conference_discount_codes: Vec<DiscountCode>,
    pub conference_payment_schedules: Vec<PaymentSchedule>,
    pub user_accounts: Vec<UserAccount>,
    pub email_verification_codes: Vec<VerificationCode>,
    pub password_reset_tokens: Vec<PasswordResetToken>,
    #[serde(flatten)]
    pub rest: serde_json::Map<String, serde_json::Value>,
}

impl Document {
    pub fn conference(&self, id: &str) -> Option<&Conference> {
        self.conferences.iter().find(|c| c.id == id)
    }

    pub fn conference_by_slug(&self, slug: &str) -> Option<&Conference> {
        self.conferences.iter().find(|c| c.slug == slug)
    }

    pub fn ticket_type(&self, id: &str) -> Option<&TicketType> {
        self.conference_ticket_types.iter().find(|t| t.id == id)
    }

    pub fn ticket_type_mut(&mut self, id: &str) -> Option<&mut TicketType> {
        self.conference_ticket_types.iter_mut().find(|t| t.id == id)
    }

    pub fn booking(&self, id: &str) -> Option<&Booking> {
        self.conference_bookings.iter().find(|b| b.id == id)
    }

    pub fn booking_mut(&mut self, id: &str) -> Option<&mut Booking> {
        self.conference_bookings.iter_mut().find(|b| b.id == id)
    }

    pub fn booking_by_reference(&self, reference: &str) -> Option<&Booking> {
        self.conference_bookings
            .iter()
            .find(|b| b.booking_reference == reference)
    }

    pub fn booking_by_order_id(&self, order_id: &str) -> Option<&Booking> {
        self.conference_bookings
            .iter()
            .find(|b| b.paypal_order_id.as_deref() == Some(order_id))
    }

    pub fn attendees_for_booking(&self, booking_id: &str) -> Vec<&Attendee> {
        self.conference_attendees
            .iter()
            .filter(|a| a.booking_id == booking_id)
            .collect()
    }

    /// Case-insensitive code lookup scoped to a conference.
    pub fn discount_code(&self, code: &str, conference_id: &str) -> Option<&DiscountCode> {
        self.conference_discount_codes
            .iter()
            .find(|d| d.matches(code, conference_id))
    }

    pub fn discount_code_mut(&mut self, id: &str) -> Option<&mut DiscountCode> {
        self.conference_discount_codes.iter_mut().find(|d| d.id == id)
    }

    pub fn schedules_for_booking(&self, booking_id: &str) -> Vec<&PaymentSchedule> {
        self.conference_payment_schedules
            .iter()
            .filter(|s| s.booking_id == booking_id)
            .collect()
    }

    pub fn account_by_email(&self, email: &str) -> Option<&UserAccount> {
        let email = email.to_lowercase();
        self.user_accounts.iter().find(|a| a.email == email)
    }

    pub fn account_by_email_mut(&mut self, email: &str) -> Option<&mut UserAccount> {
        let email = email.to_lowercase();
        self.user_accounts.iter_mut().find(|a| a.email == email)
    }

    pub fn verification_code_mut(&mut self, email: &str, code: &str) -> Option<&mut VerificationCode> {
        let email = email.to_lowercase();
        self.email_verification_codes
            .iter_mut()
            .find(|v| v.email == email && v.code == code)
    }

    pub fn password_reset_token_mut(
        &mut self,
        email: &str,
        token: &str,
    ) -> Option<&mut PasswordResetToken> {
        let email = email.to_lowercase();
        self.password_reset_tokens
            .iter_mut()
            .find(|t| t.email == email && t.token == token)
    }
}

pub struct Store {
    path: Option<PathBuf>,
    doc: RwLock<Document>,
}

impl Store {
    /// Opens the document at `path`, initializing an empty one when the file
    /// does not exist yet.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        let doc = match std::fs::read_to_string(&path) {
            Ok(raw) => serde_json::from_str(&raw)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::warn!(path = %path.display(), "database file missing, starting empty");
                Document::default()
            }
            Err(e) => return Err(StoreError::Read(e)),
        };
        Ok(Self {
            path: Some(path),
            doc: RwLock::new(doc),
        })
    }

    /// Store without a backing file; used in tests.
    pub fn in_memory_with(doc: Document) -> Self {
        Self {
            path: None,
            doc: RwLock::new(doc),
        }
    }

    pub async fn read<T>(&self, f: impl FnOnce(&Document) -> T) -> T {
        let doc = self.doc.read().await;
        f(&doc)
    }

    /// Runs `f` under the writer lock and flushes the document when it
    /// returns `Ok`. On `Err` the in-memory document is rolled back to its
    /// pre-call state and nothing is written, so a validation failure
    /// halfway through a multi-record mutation leaves no partial state.
    pub async fn mutate<T, E>(
        &self,
        f: impl FnOnce(&mut Document) -> Result<T, E>,
    ) -> Result<T, E>
    where
        E: From<StoreError>,
    {
        let mut doc = self.doc.write().await;
        let snapshot = doc.clone();
        match f(&mut doc) {
            Ok(out) => {
                self.flush(&doc).await?;
                Ok(out)
            }
            Err(e) => {
                *doc = snapshot;
                Err(e)
            }
        }
    }

    async fn flush(&self, doc: &Document) -> Result<(), StoreError> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let raw = serde_json::to_string_pretty(doc)?;
        tokio::fs::write(path, raw)
            .await
            .map_err(StoreError::Write)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn mutate_on_error_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("database.json");
        let store = Store::open(&path).unwrap();

        let res: Result<(), StoreError> = store
            .mutate(|doc| {
                doc.rest
                    .insert("settings".into(), serde_json::json!({"siteName": "x"}));
                Err(StoreError::Parse(serde::de::Error::custom("boom")))
            })
            .await;
        assert!(res.is_err());
        assert!(!path.exists());
        assert!(store.read(|doc| doc.rest.is_empty()).await);
    }

    #[tokio::test]
    async fn flush_round_trips_unknown_collections() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("database.json");

        let store = Store::open(&path).unwrap();
        store
            .mutate::<_, StoreError>(|doc| {
                doc.rest.insert("pages".into(), serde_json::json!([{"id": "home"}]));
                Ok(())
            })
            .await
            .unwrap();

        let reopened = Store::open(&path).unwrap();
        let pages = reopened.read(|doc| doc.rest.get("pages").cloned()).await;
        assert_eq!(pages, Some(serde_json::json!([{"id": "home"}])));
    }

    #[tokio::test]
    async fn discount_code_lookup_is_case_insensitive_and_scoped() {
        let mut doc = Document::default();
        doc.conference_discount_codes.push(crate::models::DiscountCode {
            id: "d1".into(),
            conference_id: "conf-1".into(),
            code: "FAMILY2024".into(),
            discount_type: crate::models::DiscountType::Percentage,
            value: rust_decimal::Decimal::new(15, 0),
            applicable_ticket_types: vec![],
            max_usage: 0,
            used_count: 0,
            expiry_date: None,
            enabled: true,
        });

        assert!(doc.discount_code("family2024", "conf-1").is_some());
        assert!(doc.discount_code("family2024", "conf-2").is_none());
        assert!(doc.discount_code("FAMILY", "conf-1").is_none());
    }
}
