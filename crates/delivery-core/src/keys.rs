//! Storage keys
//!
//! Every collection lives under a fixed key in the `@delivery:` namespace.
//! Per-user collections append `_<userId>` to their prefix.

use delivery_util::UserId;

pub const NAMESPACE: &str = "@delivery:";

pub const USERS: &str = "@delivery:users";
pub const CURRENT_SESSION: &str = "@delivery:current_session";
pub const CARDS: &str = "@delivery:cards";
pub const CART: &str = "@delivery:cart";
pub const ORDERS: &str = "@delivery:orders";
pub const COUPON_DISTRIBUTIONS: &str = "@delivery:coupon_distributions";
pub const USER_COUPONS: &str = "@delivery:user_coupons";
/// Also the legacy un-scoped key from before locations were per user
pub const LOCATIONS: &str = "@delivery:locations";
/// Also the legacy un-scoped key from before locations were per user
pub const CURRENT_LOCATION: &str = "@delivery:current_location";
pub const NOTIFICATIONS: &str = "@delivery:notifications";
pub const FAVORITES: &str = "@delivery:favorites";
pub const RECENT_SEARCHES: &str = "@delivery:recent_searches";

/// Keys that are not scoped to a user. Only these are accepted on import.
pub const FIXED_KEYS: &[&str] = &[
    USERS,
    CURRENT_SESSION,
    CARDS,
    ORDERS,
    COUPON_DISTRIBUTIONS,
    NOTIFICATIONS,
    FAVORITES,
    RECENT_SEARCHES,
];

/// `<prefix>_<userId>`
pub fn user_scoped(prefix: &str, user_id: &UserId) -> String {
    format!("{}_{}", prefix, user_id)
}

/// Whether a raw store key belongs to this application
pub fn is_managed(key: &str) -> bool {
    key.starts_with(NAMESPACE)
}
