//! In-app notification records

use chrono::{DateTime, Local};
use delivery_util::{NotificationId, OrderId};
use serde::{Deserialize, Serialize};

use crate::{Coupon, DeepLink};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    Coupon,
    OrderReady,
    Delivery,
    General,
}

impl NotificationKind {
    /// Screen a host should open when the notification is tapped
    pub fn screen(&self) -> &'static str {
        match self {
            NotificationKind::OrderReady | NotificationKind::Delivery => "OrderTracking",
            NotificationKind::Coupon | NotificationKind::General => "Notifications",
        }
    }
}

/// Stored notification, newest first in the collection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppNotification {
    pub id: NotificationId,
    #[serde(rename = "type")]
    pub kind: NotificationKind,
    pub title: String,
    pub body: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(default)]
    pub data: serde_json::Value,
    pub timestamp: DateTime<Local>,
    pub read: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coupon: Option<Coupon>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order_id: Option<OrderId>,
}

impl AppNotification {
    /// Order notifications link to the order, everything else to itself
    pub fn deep_link(&self) -> DeepLink {
        match (&self.kind, &self.order_id) {
            (NotificationKind::OrderReady | NotificationKind::Delivery, Some(order_id)) => {
                DeepLink::Order(order_id.clone())
            }
            _ => DeepLink::Notification(self.id.clone()),
        }
    }

    /// Payload handed to the platform notifier alongside title and body
    pub fn payload(&self) -> serde_json::Value {
        let mut data = match &self.data {
            serde_json::Value::Object(map) => map.clone(),
            _ => serde_json::Map::new(),
        };
        data.insert("notificationId".into(), self.id.as_str().into());
        data.insert("screen".into(), self.kind.screen().into());
        data.insert("deeplink".into(), self.deep_link().to_string().into());
        serde_json::Value::Object(data)
    }
}

/// Content of a notification before it is stored
#[derive(Debug, Clone)]
pub struct NotificationDraft {
    pub kind: NotificationKind,
    pub title: String,
    pub body: String,
    pub image: Option<String>,
    pub data: serde_json::Value,
    pub coupon: Option<Coupon>,
    pub order_id: Option<OrderId>,
}

impl NotificationDraft {
    pub fn new(kind: NotificationKind, title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            kind,
            title: title.into(),
            body: body.into(),
            image: None,
            data: serde_json::Value::Null,
            coupon: None,
            order_id: None,
        }
    }

    pub fn for_order(mut self, order_id: OrderId) -> Self {
        self.data = serde_json::json!({ "orderId": order_id.as_str() });
        self.order_id = Some(order_id);
        self
    }

    pub fn with_coupon(mut self, coupon: Coupon) -> Self {
        self.data = serde_json::json!({ "couponId": coupon.id.as_str() });
        self.coupon = Some(coupon);
        self
    }

    pub fn into_notification(self, timestamp: DateTime<Local>) -> AppNotification {
        AppNotification {
            id: NotificationId::generate(),
            kind: self.kind,
            title: self.title,
            body: self.body,
            image: self.image,
            data: self.data,
            timestamp,
            read: false,
            coupon: self.coupon,
            order_id: self.order_id,
        }
    }
}
