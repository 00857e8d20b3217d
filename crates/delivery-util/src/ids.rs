//! Strongly-typed identifiers for the delivery client
//!
//! All identifiers are strings on the wire so that blobs written by older
//! clients (which used millisecond timestamps as ids) still deserialize.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::{epoch_millis, now};

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }
    };
}

string_id!(
    /// Unique identifier for a registered user
    UserId
);
string_id!(
    /// Unique identifier for a saved payment card
    CardId
);
string_id!(
    /// Unique identifier for a placed order
    OrderId
);
string_id!(
    /// Identifier of a coupon issued to one user
    CouponId
);
string_id!(
    /// Unique identifier for a stored notification
    NotificationId
);
string_id!(
    /// Catalog product identifier (a meal id from the catalog API)
    ProductId
);

fn short_uuid() -> String {
    Uuid::new_v4().simple().to_string()[..8].to_string()
}

impl UserId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

impl CardId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

impl NotificationId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

impl OrderId {
    /// `ORD-<epoch millis>-<random suffix>`
    pub fn generate() -> Self {
        Self(format!("ORD-{}-{}", epoch_millis(&now()), short_uuid()))
    }

    /// Last six characters, used in user-facing messages
    pub fn short(&self) -> &str {
        let len = self.0.len();
        if len > 6 && self.0.is_ascii() {
            &self.0[len - 6..]
        } else {
            &self.0
        }
    }
}

impl CouponId {
    /// Coupons are issued per user: `<userId>_<random suffix>`
    pub fn generate(user_id: &UserId) -> Self {
        Self(format!("{}_{}", user_id, short_uuid()))
    }
}
