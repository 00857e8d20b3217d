//! Client-side backend of the delivery app
//!
//! Every "server" concern of the app runs locally over a key-value store:
//! - Accounts, the login session, saved cards and addresses
//! - Per-user carts and checkout into orders
//! - Coupon issuance with per-code caps and one-shot redemption
//! - Simulated order progression with notifications
//! - Favorites, recent searches and whole-store maintenance

mod app;
mod cards;
mod cart;
mod checkout;
mod coupons;
mod favorites;
pub mod keys;
mod locations;
mod maintenance;
mod notifications;
mod orders;
pub mod password;
mod recent_searches;
mod session;
mod tracking;
mod users;

pub use app::*;
pub use cards::*;
pub use cart::*;
pub use checkout::*;
pub use coupons::*;
pub use favorites::*;
pub use locations::*;
pub use maintenance::*;
pub use notifications::*;
pub use orders::*;
pub use recent_searches::*;
pub use session::*;
pub use tracking::*;
pub use users::*;
