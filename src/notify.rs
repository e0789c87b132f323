//! Turns booking and payment events into outbound emails. Delivery is
//! best-effort: failures are logged and never fail the originating request.

use std::sync::Arc;

use rust_decimal::Decimal;
use tracing::warn;

use crate::email::{Mailer, OutboundEmail};
use crate::gateway::paypal::money_string;
use crate::models::{Attendee, Conference};

#[derive(Debug, Clone)]
pub enum Notification {
    BookingConfirmed {
        to: String,
        conference_title: String,
        booking_reference: String,
        total: Decimal,
        attendee_names: Vec<String>,
    },
    PaymentCaptured {
        to: String,
        conference_title: String,
        booking_reference: String,
        amount: Decimal,
        balance_due: Decimal,
    },
    ChildRegistered {
        leader_email: String,
        conference_title: String,
        child_name: String,
        age: i32,
        band: String,
    },
    VerificationCode {
        to: String,
        code: String,
    },
    PasswordReset {
        to: String,
        token: String,
    },
}

pub struct Notifier {
    mailer: Arc<dyn Mailer>,
    admin_email: Option<String>,
    brand: String,
}

impl Notifier {
    pub fn new(mailer: Arc<dyn Mailer>, admin_email: Option<String>, brand: String) -> Self {
        Self {
            mailer,
            admin_email,
            brand,
        }
    }

    pub async fn dispatch_all(&self, notifications: Vec<Notification>) {
        for notification in notifications {
            self.dispatch(notification).await;
        }
    }

    pub async fn dispatch(&self, notification: Notification) {
        for email in self.render(notification) {
            let to = email.to.clone();
            let subject = email.subject.clone();
            if let Err(err) = self.mailer.send(email).await {
                warn!(%to, %subject, error = %err, "failed to send email");
            }
        }
    }

    fn render(&self, notification: Notification) -> Vec<OutboundEmail> {
        match notification {
            Notification::BookingConfirmed {
                to,
                conference_title,
                booking_reference,
                total,
                attendee_names,
            } => {
                let subject = format!("Booking Confirmation: {conference_title}");
                let body = format!(
                    "Thank you for booking with {brand}.\n\n\
                     Booking reference: {booking_reference}\n\
                     Attendees: {attendees}\n\
                     Total: {total}\n\n\
                     We look forward to seeing you at {conference_title}.",
                    brand = self.brand,
                    attendees = attendee_names.join(", "),
                    total = money_string(total),
                );
                let mut emails = vec![OutboundEmail {
                    to,
                    subject: subject.clone(),
                    body: body.clone(),
                }];
                if let Some(admin) = &self.admin_email {
                    emails.push(OutboundEmail {
                        to: admin.clone(),
                        subject: format!("New Booking: {booking_reference}"),
                        body,
                    });
                }
                emails
            }
            Notification::PaymentCaptured {
                to,
                conference_title,
                booking_reference,
                amount,
                balance_due,
            } => vec![OutboundEmail {
                to,
                subject: format!("Payment Received: {conference_title}"),
                body: format!(
                    "We received your payment of {amount} for booking {booking_reference}.\n\
                     Remaining balance: {balance}.",
                    amount = money_string(amount),
                    balance = money_string(balance_due),
                ),
            }],
            Notification::ChildRegistered {
                leader_email,
                conference_title,
                child_name,
                age,
                band,
            } => vec![OutboundEmail {
                to: leader_email,
                subject: format!("New Child Registration - {conference_title}"),
                body: format!(
                    "{child_name} (age {age}) has been registered in the {band} group \
                     for {conference_title}."
                ),
            }],
            Notification::VerificationCode { to, code } => vec![OutboundEmail {
                to,
                subject: format!("{} - Verify your email", self.brand),
                body: format!(
                    "Your verification code is: {code}\n\n\
                     The code expires in 24 hours."
                ),
            }],
            Notification::PasswordReset { to, token } => vec![OutboundEmail {
                to,
                subject: format!("{} - Reset your password", self.brand),
                body: format!(
                    "A password reset was requested for your account.\n\n\
                     Your reset token is: {token}\n\n\
                     The token expires in 1 hour. If you did not request \
                     this, you can ignore this email."
                ),
            }],
        }
    }
}

/// Age band used to route child registrations to the right group leader.
pub fn child_band(age: i32) -> Option<&'static str> {
    match age {
        0..=5 => Some("0-5"),
        6..=8 => Some("6-8"),
        9..=12 => Some("9-12"),
        _ => None,
    }
}

/// Builds a notification for every child attendee whose age band has a
/// group leader registered on the conference.
pub fn child_notifications(conference: &Conference, attendees: &[Attendee]) -> Vec<Notification> {
    attendees
        .iter()
        .filter_map(|attendee| {
            let age = attendee.age?;
            let band = child_band(age)?;
            let leader_email = conference.child_group_leaders.get(band)?;
            Some(Notification::ChildRegistered {
                leader_email: leader_email.clone(),
                conference_title: conference.title.clone(),
                child_name: attendee.full_name.clone(),
                age,
                band: band.to_string(),
            })
        })
        .collect()
}
