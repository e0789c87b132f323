pub mod accounts;
pub mod booking;
pub mod capacity;
pub mod discounts;
pub mod ledger;
pub mod pricing;
