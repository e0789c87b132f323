//! Unit-price resolution.
//!
//! Pricing is a fixed-order cascade of rules; the first rule that matches
//! wins and nothing stacks. In particular an active conference-wide
//! early-bird window overrides any per-ticket early-bird or late pricing.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;

use crate::models::{Conference, TicketType};

type PriceRule = fn(&TicketType, &Conference, NaiveDate) -> Option<Decimal>;

/// Evaluation order is load-bearing; do not reorder.
const RULES: [PriceRule; 3] = [conference_early_bird, ticket_early_bird, ticket_late_price];

/// Resolves the unit price for one ticket at `now`. Never negative.
pub fn resolve_unit_price(
    ticket: &TicketType,
    conference: &Conference,
    now: DateTime<Utc>,
) -> Decimal {
    let today = now.date_naive();
    let price = RULES
        .iter()
        .find_map(|rule| rule(ticket, conference, today))
        .unwrap_or(ticket.price);
    price.max(Decimal::ZERO)
}

/// Conference-wide flat discount, active on an inclusive date window
/// (the end date counts through end of day).
fn conference_early_bird(
    ticket: &TicketType,
    conference: &Conference,
    today: NaiveDate,
) -> Option<Decimal> {
    let start = conference.early_bird_start_date?;
    let end = conference.early_bird_end_date?;
    let discount = conference.early_bird_discount_amount?;
    if discount <= Decimal::ZERO || today < start || today > end {
        return None;
    }
    Some(ticket.price - discount)
}

fn ticket_early_bird(
    ticket: &TicketType,
    _conference: &Conference,
    today: NaiveDate,
) -> Option<Decimal> {
    let end = ticket.early_bird_end_date?;
    let price = ticket.early_bird_price?;
    if price <= Decimal::ZERO || today >= end {
        return None;
    }
    Some(price)
}

fn ticket_late_price(
    ticket: &TicketType,
    _conference: &Conference,
    today: NaiveDate,
) -> Option<Decimal> {
    let start = ticket.late_price_start_date?;
    let price = ticket.late_price?;
    if price <= Decimal::ZERO || today < start {
        return None;
    }
    Some(price)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use proptest::prelude::*;
    use rust_decimal_macros::dec;

    fn conference(early_bird: Option<(&str, &str, Decimal)>) -> Conference {
        let (start, end, amount) = match early_bird {
            Some((s, e, a)) => (
                Some(s.parse().unwrap()),
                Some(e.parse().unwrap()),
                Some(a),
            ),
            None => (None, None, None),
        };
        Conference {
            id: "conf-1".into(),
            slug: "conf-1".into(),
            title: "Annual Conference".into(),
            start_date: "2024-09-20".parse().unwrap(),
            end_date: "2024-09-22".parse().unwrap(),
            venue: None,
            published: true,
            registration_open: true,
            early_bird_start_date: start,
            early_bird_end_date: end,
            early_bird_discount_amount: amount,
            payment_settings: None,
            child_group_leaders: Default::default(),
            created_at: None,
        }
    }

    fn ticket(price: Decimal) -> TicketType {
        TicketType {
            id: "ticket-1".into(),
            conference_id: "conf-1".into(),
            name: "Adult - Regular".into(),
            kind: "adult".into(),
            camping: false,
            price,
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
        }
    }

    fn at(date: &str) -> DateTime<Utc> {
        Utc.from_utc_datetime(&format!("{date}T12:00:00").parse().unwrap())
    }

    #[test]
    fn conference_early_bird_discounts_standard_price() {
        let conf = conference(Some(("2024-06-01", "2024-07-31", dec!(25))));
        let t = ticket(dec!(120));
        assert_eq!(resolve_unit_price(&t, &conf, at("2024-07-01")), dec!(95));
    }

    #[test]
    fn conference_early_bird_window_is_inclusive() {
        let conf = conference(Some(("2024-06-01", "2024-07-31", dec!(25))));
        let t = ticket(dec!(120));
        assert_eq!(resolve_unit_price(&t, &conf, at("2024-06-01")), dec!(95));
        assert_eq!(resolve_unit_price(&t, &conf, at("2024-07-31")), dec!(95));
        assert_eq!(resolve_unit_price(&t, &conf, at("2024-08-01")), dec!(120));
    }

    #[test]
    fn conference_early_bird_overrides_ticket_rules() {
        let conf = conference(Some(("2024-06-01", "2024-07-31", dec!(25))));
        let mut t = ticket(dec!(120));
        t.early_bird_price = Some(dec!(95));
        t.early_bird_end_date = Some("2024-07-31".parse().unwrap());
        t.late_price = Some(dec!(145));
        t.late_price_start_date = Some("2024-06-15".parse().unwrap());
        // conference rule wins even though both ticket rules would match
        assert_eq!(resolve_unit_price(&t, &conf, at("2024-07-01")), dec!(95));
    }

    #[test]
    fn ticket_early_bird_ends_on_its_end_date() {
        let conf = conference(None);
        let mut t = ticket(dec!(120));
        t.early_bird_price = Some(dec!(95));
        t.early_bird_end_date = Some("2024-07-31".parse().unwrap());
        assert_eq!(resolve_unit_price(&t, &conf, at("2024-07-30")), dec!(95));
        assert_eq!(resolve_unit_price(&t, &conf, at("2024-07-31")), dec!(120));
    }

    #[test]
    fn ticket_late_price_starts_on_its_start_date() {
        let conf = conference(None);
        let mut t = ticket(dec!(120));
        t.late_price = Some(dec!(145));
        t.late_price_start_date = Some("2024-08-31".parse().unwrap());
        assert_eq!(resolve_unit_price(&t, &conf, at("2024-08-30")), dec!(120));
        assert_eq!(resolve_unit_price(&t, &conf, at("2024-08-31")), dec!(145));
    }

    #[test]
    fn ticket_early_bird_beats_late_price_when_both_match() {
        let conf = conference(None);
        let mut t = ticket(dec!(120));
        t.early_bird_price = Some(dec!(95));
        t.early_bird_end_date = Some("2024-09-30".parse().unwrap());
        t.late_price = Some(dec!(145));
        t.late_price_start_date = Some("2024-08-01".parse().unwrap());
        assert_eq!(resolve_unit_price(&t, &conf, at("2024-08-15")), dec!(95));
    }

    #[test]
    fn discount_larger_than_price_floors_at_zero() {
        let conf = conference(Some(("2024-06-01", "2024-07-31", dec!(25))));
        let t = ticket(dec!(10));
        assert_eq!(
            resolve_unit_price(&t, &conf, at("2024-07-01")),
            Decimal::ZERO
        );
    }

    #[test]
    fn zero_discount_amount_disables_the_conference_rule() {
        let conf = conference(Some(("2024-06-01", "2024-07-31", dec!(0))));
        let mut t = ticket(dec!(120));
        t.early_bird_price = Some(dec!(95));
        t.early_bird_end_date = Some("2024-12-31".parse().unwrap());
        assert_eq!(resolve_unit_price(&t, &conf, at("2024-07-01")), dec!(95));
    }

    proptest! {
        #[test]
        fn resolved_price_is_never_negative(
            price in 0i64..100_000,
            discount in 0i64..200_000,
            day in 0u32..27,
        ) {
            let conf = conference(Some(("2024-06-01", "2024-07-31", Decimal::new(discount, 2))));
            let t = ticket(Decimal::new(price, 2));
            let now = at(&format!("2024-06-{:02}", day + 1));
            prop_assert!(resolve_unit_price(&t, &conf, now) >= Decimal::ZERO);
        }
    }
}
