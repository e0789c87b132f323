//! Capacity guard.
//!
//! Checked per attendee inside the store's single write transaction, so the
//! check and the subsequent `sold` increment cannot interleave with another
//! booking.

use crate::models::TicketType;
use crate::utils::error::AppError;

/// `SoldOut` when a finite capacity is exhausted. `extra_requested` counts
/// seats already claimed by earlier attendees of the same booking.
pub fn check(ticket: &TicketType, extra_requested: u32) -> Result<(), AppError> {
    if ticket.capacity > 0 && ticket.sold + extra_requested >= ticket.capacity {
        return Err(AppError::SoldOut(ticket.name.clone()));
    }
    Ok(())
}
