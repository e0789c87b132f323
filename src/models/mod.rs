pub mod attendee;
pub mod booking;
pub mod conference;
pub mod discount_code;
pub mod payment_schedule;
pub mod ticket_type;
pub mod user_account;

pub use attendee::{Attendee, EmergencyContact};
pub use booking::{Booking, PaymentMethod, PaymentStatus};
pub use conference::{Conference, PaymentSettings, Venue};
pub use discount_code::{DiscountCode, DiscountType};
pub use payment_schedule::{PaymentSchedule, ScheduleStatus};
pub use ticket_type::TicketType;
pub use user_account::{PasswordResetToken, UserAccount, VerificationCode};
