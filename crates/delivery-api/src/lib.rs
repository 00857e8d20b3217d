//! Record types for the delivery client
//!
//! Every record here is stored as JSON by the persistence layer. Field
//! names are camelCase so blobs written by the mobile client decode
//! unchanged.

mod account;
mod catalog;
mod coupon;
mod link;
mod notification;
mod order;

pub use account::*;
pub use catalog::*;
pub use coupon::*;
pub use link::*;
pub use notification::*;
pub use order::*;

pub use rust_decimal::Decimal;

/// Round a money amount to cents
pub fn round_money(amount: Decimal) -> Decimal {
    amount.round_dp(2)
}
