//! Deep links carried by notification payloads
//!
//! Format: `myapp://<target>/<id>` where target is `order` or
//! `notification`.

use delivery_util::{NotificationId, OrderId};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

pub const DEEP_LINK_SCHEME: &str = "myapp://";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeepLink {
    Order(OrderId),
    Notification(NotificationId),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeepLinkError {
    #[error("missing myapp:// scheme")]
    BadScheme,

    #[error("unknown link target: {0}")]
    UnknownTarget(String),

    #[error("missing entity id")]
    MissingId,
}

impl DeepLink {
    pub fn screen(&self) -> &'static str {
        match self {
            DeepLink::Order(_) => "OrderTracking",
            DeepLink::Notification(_) => "Notifications",
        }
    }
}

impl fmt::Display for DeepLink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeepLink::Order(id) => write!(f, "{}order/{}", DEEP_LINK_SCHEME, id),
            DeepLink::Notification(id) => write!(f, "{}notification/{}", DEEP_LINK_SCHEME, id),
        }
    }
}

impl FromStr for DeepLink {
    type Err = DeepLinkError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let rest = s
            .strip_prefix(DEEP_LINK_SCHEME)
            .ok_or(DeepLinkError::BadScheme)?;

        let (target, id) = rest.split_once('/').ok_or(DeepLinkError::MissingId)?;
        let id = id.trim_end_matches('/');
        if id.is_empty() {
            return Err(DeepLinkError::MissingId);
        }

        match target {
            "order" => Ok(DeepLink::Order(OrderId::new(id))),
            "notification" => Ok(DeepLink::Notification(NotificationId::new(id))),
            other => Err(DeepLinkError::UnknownTarget(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_order_link() {
        let link: DeepLink = "myapp://order/ORD-123".parse().unwrap();
        assert_eq!(link, DeepLink::Order(OrderId::new("ORD-123")));
        assert_eq!(link.to_string(), "myapp://order/ORD-123");
        assert_eq!(link.screen(), "OrderTracking");
    }

    #[test]
    fn parse_notification_link() {
        let link: DeepLink = "myapp://notification/abc/".parse().unwrap();
        assert_eq!(link, DeepLink::Notification(NotificationId::new("abc")));
    }

    #[test]
    fn reject_malformed_links() {
        assert_eq!("https://order/1".parse::<DeepLink>(), Err(DeepLinkError::BadScheme));
        assert_eq!("myapp://order".parse::<DeepLink>(), Err(DeepLinkError::MissingId));
        assert_eq!("myapp://order/".parse::<DeepLink>(), Err(DeepLinkError::MissingId));
        assert_eq!(
            "myapp://cart/1".parse::<DeepLink>(),
            Err(DeepLinkError::UnknownTarget("cart".into()))
        );
    }
}
