//! Booking aggregation.
//!
//! Builds the persisted Booking + Attendee records for a request. All
//! amounts are recomputed server-side; client-submitted totals are never
//! trusted into persistence, and all ids are freshly generated.

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use rand::distributions::Alphanumeric;
use rand::Rng;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::collections::HashMap;
use uuid::Uuid;

use crate::models::{
    Attendee, Booking, Conference, EmergencyContact, PaymentMethod, PaymentStatus,
};
use crate::services::{capacity, discounts, pricing};
use crate::store::Document;
use crate::utils::error::AppError;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingRequest {
    pub conference_id: String,
    pub group_leader_name: String,
    pub group_leader_email: String,
    #[serde(default)]
    pub group_leader_phone: Option<String>,
    #[serde(default)]
    pub payment_method: Option<PaymentMethod>,
    pub attendees: Vec<AttendeeRequest>,
    #[serde(default)]
    pub discount_code: Option<String>,
    /// Client-side subtotal, sent by the booking form for cross-checking
    /// only. When present it must agree with the server computation.
    #[serde(default)]
    pub subtotal: Option<Decimal>,
}

/// Attendee submission. Carries no id fields on purpose: booking id,
/// attendee id and ticket id are always generated server-side.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendeeRequest {
    pub full_name: String,
    pub ticket_type_id: String,
    #[serde(default)]
    pub date_of_birth: Option<NaiveDate>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub home_church: Option<String>,
    #[serde(default)]
    pub group_name: Option<String>,
    #[serde(default)]
    pub emergency_contact: Option<EmergencyContact>,
    #[serde(default)]
    pub medical_history: Option<String>,
    #[serde(default)]
    pub allergies: Option<String>,
    #[serde(default)]
    pub dietary_restrictions: Option<String>,
    #[serde(default)]
    pub consent_waiver: Option<bool>,
}

pub struct CreatedBooking {
    pub booking: Booking,
    pub attendees: Vec<Attendee>,
    pub conference: Conference,
}

/// Creates a booking with its attendees, incrementing sold counters and
/// discount usage. Runs inside a store write transaction; any error leaves
/// the document untouched.
pub fn create(
    doc: &mut Document,
    req: &BookingRequest,
    now: DateTime<Utc>,
) -> Result<CreatedBooking, AppError> {
    let conference = doc
        .conference(&req.conference_id)
        .filter(|c| c.published && c.registration_open)
        .cloned()
        .ok_or(AppError::ConferenceUnavailable)?;

    if req.attendees.is_empty() {
        return Err(AppError::Validation(
            "At least one attendee is required".into(),
        ));
    }

    let discount = match &req.discount_code {
        Some(code) => Some(
            discounts::validate_code(doc, code, &conference.id, now)
                .map_err(AppError::InvalidDiscountCode)?
                .clone(),
        ),
        None => None,
    };

    // Validate ticket types and capacity per attendee, resolving unit
    // prices as we go. `requested` counts seats already claimed by earlier
    // attendees of this same booking.
    let mut requested: HashMap<String, u32> = HashMap::new();
    let mut line_items: Vec<(String, Decimal)> = Vec::with_capacity(req.attendees.len());
    for attendee in &req.attendees {
        let ticket = doc
            .ticket_type(&attendee.ticket_type_id)
            .filter(|t| t.enabled)
            .ok_or_else(|| AppError::InvalidTicketType(attendee.full_name.clone()))?;
        if let Some(dob) = attendee.date_of_birth {
            let age = age_at(dob, now.date_naive());
            let below = ticket.age_min.is_some_and(|min| age < min);
            let above = ticket.age_max.is_some_and(|max| age > max);
            if below || above {
                return Err(AppError::Validation(format!(
                    "{} is outside the age range for {}",
                    attendee.full_name, ticket.name
                )));
            }
        }
        let claimed = requested.entry(ticket.id.clone()).or_insert(0);
        capacity::check(ticket, *claimed)?;
        *claimed += 1;
        line_items.push((
            ticket.id.clone(),
            pricing::resolve_unit_price(ticket, &conference, now),
        ));
    }

    let subtotal: Decimal = line_items.iter().map(|(_, price)| *price).sum();
    if let Some(client_subtotal) = req.subtotal {
        if (client_subtotal - subtotal).abs() > Decimal::new(1, 2) {
            return Err(AppError::SubtotalMismatch);
        }
    }

    let discount_amount = discount
        .as_ref()
        .map(|d| discounts::discount_amount(d, discounts::applicable_subtotal(d, &line_items)))
        .unwrap_or(Decimal::ZERO);
    let total_amount = (subtotal - discount_amount).max(Decimal::ZERO);

    let payment_method = req.payment_method.unwrap_or(PaymentMethod::Paypal);
    let payment_status = if payment_method == PaymentMethod::Deposit20 {
        PaymentStatus::Partial
    } else {
        PaymentStatus::Unpaid
    };

    let booking = Booking {
        id: Uuid::new_v4().to_string(),
        conference_id: conference.id.clone(),
        booking_reference: booking_reference(now),
        group_leader_name: req.group_leader_name.clone(),
        group_leader_email: req.group_leader_email.to_lowercase(),
        group_leader_phone: req.group_leader_phone.clone(),
        attendee_count: req.attendees.len() as u32,
        subtotal,
        discount_amount,
        discount_code: discount.as_ref().map(|d| d.code.clone()),
        total_amount,
        payment_method,
        payment_status,
        paid_amount: Decimal::ZERO,
        paypal_order_id: None,
        paypal_order_status: None,
        paypal_capture_ids: vec![],
        payment_date: None,
        created_at: now,
        archived: false,
    };

    let attendees: Vec<Attendee> = req
        .attendees
        .iter()
        .map(|a| Attendee {
            id: Uuid::new_v4().to_string(),
            booking_id: booking.id.clone(),
            ticket_id: ticket_reference(now),
            ticket_type_id: a.ticket_type_id.clone(),
            full_name: a.full_name.clone(),
            date_of_birth: a.date_of_birth,
            age: a.date_of_birth.map(|dob| age_at(dob, now.date_naive())),
            email: a.email.clone(),
            phone: a.phone.clone(),
            home_church: a.home_church.clone(),
            group_name: a.group_name.clone(),
            is_group_leader: a
                .email
                .as_deref()
                .is_some_and(|e| e.eq_ignore_ascii_case(&req.group_leader_email)),
            emergency_contact: a.emergency_contact.clone(),
            medical_history: a.medical_history.clone(),
            allergies: a.allergies.clone(),
            dietary_restrictions: a.dietary_restrictions.clone(),
            consent_waiver: a.consent_waiver,
        })
        .collect();

    for (ticket_type_id, count) in &requested {
        if let Some(ticket) = doc.ticket_type_mut(ticket_type_id) {
            ticket.sold += count;
        }
    }
    // once per booking, not per attendee
    if let Some(d) = &discount {
        if let Some(dc) = doc.discount_code_mut(&d.id) {
            dc.used_count += 1;
        }
    }

    doc.conference_bookings.push(booking.clone());
    doc.conference_attendees.extend(attendees.iter().cloned());

    Ok(CreatedBooking {
        booking,
        attendees,
        conference,
    })
}

/// Whole years between `dob` and `today`, one less before the birthday.
pub fn age_at(dob: NaiveDate, today: NaiveDate) -> i32 {
    let mut age = today.year() - dob.year();
    if (today.month(), today.day()) < (dob.month(), dob.day()) {
        age -= 1;
    }
    age
}

fn booking_reference(now: DateTime<Utc>) -> String {
    format!(
        "CONF-{}-{}",
        base36_upper(now.timestamp_millis()),
        random_suffix(4)
    )
}

fn ticket_reference(now: DateTime<Utc>) -> String {
    format!(
        "TICKET-{}-{}",
        base36_upper(now.timestamp_millis()),
        random_suffix(6)
    )
}

fn base36_upper(mut n: i64) -> String {
    const DIGITS: &[u8] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ";
    if n <= 0 {
        return "0".to_string();
    }
    let mut out = String::new();
    while n > 0 {
        out.insert(0, DIGITS[(n % 36) as usize] as char);
        n /= 36;
    }
    out
}

fn random_suffix(len: usize) -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(|b| (b as char).to_ascii_uppercase())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{DiscountCode, DiscountType, TicketType};
    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 8, 15, 10, 0, 0).unwrap()
    }

    fn fixture() -> Document {
        let mut doc = Document::default();
        doc.conferences.push(Conference {
            id: "conf-1".into(),
            slug: "annual-2024".into(),
            title: "Annual Conference".into(),
            start_date: "2024-09-20".parse().unwrap(),
            end_date: "2024-09-22".parse().unwrap(),
            venue: None,
            published: true,
            registration_open: true,
            early_bird_start_date: None,
            early_bird_end_date: None,
            early_bird_discount_amount: None,
            payment_settings: None,
            child_group_leaders: Default::default(),
            created_at: None,
        });
        doc.conference_ticket_types.push(TicketType {
            id: "ticket-adult".into(),
            conference_id: "conf-1".into(),
            name: "Adult - Regular".into(),
            kind: "adult".into(),
            camping: false,
            price: dec!(120),
            early_bird_price: None,
            early_bird_end_date: None,
            late_price: None,
            late_price_start_date: None,
            capacity: 0,
            sold: 0,
            age_min: None,
            age_max: None,
            description: None,
            enabled: true,
        });
        doc.conference_ticket_types.push(TicketType {
            id: "ticket-child".into(),
            conference_id: "conf-1".into(),
            name: "Child - Regular".into(),
            kind: "child".into(),
            camping: false,
            price: dec!(50),
            early_bird_price: None,
            early_bird_end_date: None,
            late_price: None,
            late_price_start_date: None,
            capacity: 1,
            sold: 0,
            age_min: Some(3),
            age_max: Some(12),
            description: None,
            enabled: true,
        });
        doc
    }

    fn attendee(name: &str, ticket: &str, dob: Option<&str>) -> AttendeeRequest {
        AttendeeRequest {
            full_name: name.into(),
            ticket_type_id: ticket.into(),
            date_of_birth: dob.map(|d| d.parse().unwrap()),
            email: None,
            phone: None,
            home_church: None,
            group_name: None,
            emergency_contact: None,
            medical_history: None,
            allergies: None,
            dietary_restrictions: None,
            consent_waiver: None,
        }
    }

    fn request(attendees: Vec<AttendeeRequest>) -> BookingRequest {
        BookingRequest {
            conference_id: "conf-1".into(),
            group_leader_name: "John Smith".into(),
            group_leader_email: "john.smith@example.com".into(),
            group_leader_phone: None,
            payment_method: None,
            attendees,
            discount_code: None,
            subtotal: None,
        }
    }

    #[test]
    fn subtotal_is_recomputed_server_side() {
        let mut doc = fixture();
        let mut req = request(vec![
            attendee("John Smith", "ticket-adult", Some("1985-03-15")),
            attendee("Sarah Smith", "ticket-adult", Some("1987-07-22")),
        ]);
        // agreeing client subtotal passes and is discarded either way
        req.subtotal = Some(dec!(240));
        let created = create(&mut doc, &req, now()).unwrap();
        assert_eq!(created.booking.subtotal, dec!(240));
        assert_eq!(created.booking.total_amount, dec!(240));
        assert_eq!(created.booking.paid_amount, Decimal::ZERO);
    }

    #[test]
    fn disagreeing_client_subtotal_is_rejected() {
        let mut doc = fixture();
        let mut req = request(vec![attendee("John Smith", "ticket-adult", None)]);
        req.subtotal = Some(dec!(1));
        assert!(matches!(
            create(&mut doc, &req, now()),
            Err(AppError::SubtotalMismatch)
        ));
        assert!(doc.conference_bookings.is_empty());
    }

    #[test]
    fn ids_and_reference_are_generated() {
        let mut doc = fixture();
        let req = request(vec![attendee("John Smith", "ticket-adult", None)]);
        let created = create(&mut doc, &req, now()).unwrap();
        assert!(created.booking.booking_reference.starts_with("CONF-"));
        assert!(created.attendees[0].ticket_id.starts_with("TICKET-"));
        assert_eq!(created.attendees[0].booking_id, created.booking.id);
    }

    #[test]
    fn age_is_derived_from_date_of_birth() {
        let mut doc = fixture();
        let req = request(vec![
            // birthday already passed this year
            attendee("A", "ticket-adult", Some("1985-03-15")),
            // birthday still ahead this year
            attendee("B", "ticket-adult", Some("1985-11-10")),
        ]);
        let created = create(&mut doc, &req, now()).unwrap();
        assert_eq!(created.attendees[0].age, Some(39));
        assert_eq!(created.attendees[1].age, Some(38));
    }

    #[test]
    fn counters_increment_on_success() {
        let mut doc = fixture();
        doc.conference_discount_codes.push(DiscountCode {
            id: "d1".into(),
            conference_id: "conf-1".into(),
            code: "FAMILY2024".into(),
            discount_type: DiscountType::Percentage,
            value: dec!(15),
            applicable_ticket_types: vec![],
            max_usage: 50,
            used_count: 0,
            expiry_date: None,
            enabled: true,
        });
        let mut req = request(vec![
            attendee("A", "ticket-adult", None),
            attendee("B", "ticket-adult", None),
        ]);
        req.discount_code = Some("family2024".into());
        let created = create(&mut doc, &req, now()).unwrap();
        // sold per attendee, usage once per booking
        assert_eq!(doc.ticket_type("ticket-adult").unwrap().sold, 2);
        assert_eq!(doc.conference_discount_codes[0].used_count, 1);
        assert_eq!(created.booking.subtotal, dec!(240));
        assert_eq!(created.booking.discount_amount, dec!(36));
        assert_eq!(created.booking.total_amount, dec!(204));
    }

    #[test]
    fn sold_out_rejects_before_any_persistence() {
        let mut doc = fixture();
        if let Some(t) = doc.ticket_type_mut("ticket-child") {
            t.sold = 1; // capacity 1
        }
        let req = request(vec![attendee("Oliver", "ticket-child", Some("2015-05-18"))]);
        assert!(matches!(create(&mut doc, &req, now()), Err(AppError::SoldOut(_))));
        assert!(doc.conference_bookings.is_empty());
        assert!(doc.conference_attendees.is_empty());
        assert_eq!(doc.ticket_type("ticket-child").unwrap().sold, 1);
    }

    #[test]
    fn same_booking_cannot_overfill_a_ticket_type() {
        let mut doc = fixture();
        let req = request(vec![
            attendee("Oliver", "ticket-child", None),
            attendee("Amelia", "ticket-child", None),
        ]);
        // capacity 1, two child attendees in one request
        assert!(matches!(create(&mut doc, &req, now()), Err(AppError::SoldOut(_))));
    }

    #[test]
    fn deposit20_starts_partial_everything_else_unpaid() {
        let mut doc = fixture();
        let mut req = request(vec![attendee("A", "ticket-adult", None)]);
        req.payment_method = Some(PaymentMethod::Deposit20);
        let created = create(&mut doc, &req, now()).unwrap();
        assert_eq!(created.booking.payment_status, PaymentStatus::Partial);

        let req = request(vec![attendee("B", "ticket-adult", None)]);
        let created = create(&mut doc, &req, now()).unwrap();
        assert_eq!(created.booking.payment_status, PaymentStatus::Unpaid);
    }

    #[test]
    fn unknown_or_disabled_ticket_type_is_rejected() {
        let mut doc = fixture();
        let req = request(vec![attendee("A", "ticket-missing", None)]);
        assert!(matches!(
            create(&mut doc, &req, now()),
            Err(AppError::InvalidTicketType(_))
        ));

        if let Some(t) = doc.ticket_type_mut("ticket-adult") {
            t.enabled = false;
        }
        let req = request(vec![attendee("A", "ticket-adult", None)]);
        assert!(matches!(
            create(&mut doc, &req, now()),
            Err(AppError::InvalidTicketType(_))
        ));
    }

    #[test]
    fn unpublished_or_closed_conference_is_unavailable() {
        let mut doc = fixture();
        doc.conferences[0].registration_open = false;
        let req = request(vec![attendee("A", "ticket-adult", None)]);
        assert!(matches!(
            create(&mut doc, &req, now()),
            Err(AppError::ConferenceUnavailable)
        ));
    }

    #[test]
    fn fixed_discount_larger_than_subtotal_floors_total_at_zero() {
        let mut doc = fixture();
        doc.conference_discount_codes.push(DiscountCode {
            id: "d2".into(),
            conference_id: "conf-1".into(),
            code: "COMP".into(),
            discount_type: DiscountType::Fixed,
            value: dec!(500),
            applicable_ticket_types: vec![],
            max_usage: 0,
            used_count: 0,
            expiry_date: None,
            enabled: true,
        });
        let mut req = request(vec![attendee("A", "ticket-adult", None)]);
        req.discount_code = Some("COMP".into());
        let created = create(&mut doc, &req, now()).unwrap();
        assert_eq!(created.booking.discount_amount, dec!(500));
        assert_eq!(created.booking.total_amount, Decimal::ZERO);
    }

    #[test]
    fn attendee_outside_ticket_age_range_is_rejected() {
        let mut doc = fixture();
        // 16 years old on a 3-12 ticket
        let req = request(vec![attendee("Noah", "ticket-child", Some("2008-01-10"))]);
        assert!(matches!(
            create(&mut doc, &req, now()),
            Err(AppError::Validation(_))
        ));
        // no date of birth submitted, range not enforced
        let req = request(vec![attendee("Noah", "ticket-child", None)]);
        assert!(create(&mut doc, &req, now()).is_ok());
    }

    #[test]
    fn age_boundaries() {
        let today: NaiveDate = "2024-08-15".parse().unwrap();
        assert_eq!(age_at("2010-08-15".parse().unwrap(), today), 14);
        assert_eq!(age_at("2010-08-16".parse().unwrap(), today), 13);
        assert_eq!(age_at("2010-08-14".parse().unwrap(), today), 14);
    }
}
