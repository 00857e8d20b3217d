//! Cart and order records

use chrono::{DateTime, Local};
use delivery_util::{CardId, OrderId, ProductId, UserId};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::{Coupon, Location, round_money};

/// One line of a cart or order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartItem {
    pub product_id: ProductId,
    pub name: String,
    pub price: Decimal,
    pub quantity: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
}

impl CartItem {
    pub fn new(
        product_id: impl Into<ProductId>,
        name: impl Into<String>,
        price: Decimal,
        quantity: u32,
    ) -> Self {
        Self {
            product_id: product_id.into(),
            name: name.into(),
            price,
            quantity,
            notes: None,
            image: None,
        }
    }

    pub fn line_total(&self) -> Decimal {
        self.price * Decimal::from(self.quantity)
    }

    pub fn checked_line_total(&self) -> Option<Decimal> {
        self.price.checked_mul(Decimal::from(self.quantity))
    }
}

/// Terms of a coupon the user attached to the cart. The coupon itself is
/// only redeemed when the order is placed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppliedCoupon {
    pub code: String,
    pub discount_percent: u32,
    pub min_order_value: Decimal,
}

impl AppliedCoupon {
    pub fn applies_to(&self, subtotal: Decimal) -> bool {
        subtotal >= self.min_order_value
    }

    pub fn discount_for(&self, subtotal: Decimal) -> Decimal {
        round_money(subtotal * Decimal::from(self.discount_percent) / Decimal::ONE_HUNDRED)
    }
}

impl From<&Coupon> for AppliedCoupon {
    fn from(c: &Coupon) -> Self {
        Self {
            code: c.code.to_uppercase(),
            discount_percent: c.discount_percent,
            min_order_value: c.min_order_value,
        }
    }
}

/// A user's active cart
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cart {
    pub items: Vec<CartItem>,
    pub subtotal: Decimal,
    pub delivery_fee: Decimal,
    /// Derived from `coupon` on every recalculation
    #[serde(default)]
    pub discount: Decimal,
    pub total: Decimal,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coupon: Option<AppliedCoupon>,
    pub updated_at: DateTime<Local>,
}

impl Cart {
    pub fn empty(now: DateTime<Local>) -> Self {
        Self {
            items: Vec::new(),
            subtotal: Decimal::ZERO,
            delivery_fee: Decimal::ZERO,
            discount: Decimal::ZERO,
            total: Decimal::ZERO,
            coupon: None,
            updated_at: now,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn item_count(&self) -> u32 {
        self.items
            .iter()
            .fold(0u32, |acc, i| acc.saturating_add(i.quantity))
    }

    /// Sum of the line totals, `None` on overflow
    pub fn checked_subtotal(&self) -> Option<Decimal> {
        self.items
            .iter()
            .try_fold(Decimal::ZERO, |acc, i| acc.checked_add(i.checked_line_total()?))
    }

    /// Recompute subtotal, discount and total from the current lines.
    ///
    /// The delivery fee only applies while the cart has items. A coupon
    /// whose minimum the subtotal no longer meets is dropped. The total
    /// never drops below zero.
    pub fn recalculate(&mut self, delivery_fee: Decimal) {
        self.subtotal = self.items.iter().map(CartItem::line_total).sum();
        self.delivery_fee = if self.items.is_empty() {
            Decimal::ZERO
        } else {
            delivery_fee
        };
        if self.items.is_empty()
            || self
                .coupon
                .as_ref()
                .is_some_and(|c| !c.applies_to(self.subtotal))
        {
            self.coupon = None;
        }
        self.discount = self
            .coupon
            .as_ref()
            .map_or(Decimal::ZERO, |c| c.discount_for(self.subtotal));
        self.total = (self.subtotal + self.delivery_fee - self.discount).max(Decimal::ZERO);
    }
}

/// Order lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Pending,
    Confirmed,
    Preparing,
    OutForDelivery,
    Delivered,
    Cancelled,
}

impl OrderStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Delivered | OrderStatus::Cancelled)
    }

    /// Any non-terminal status may move to any other status; terminal
    /// statuses are final.
    pub fn can_transition_to(&self, next: OrderStatus) -> bool {
        !self.is_terminal() && *self != next
    }

    pub fn label(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "Pending",
            OrderStatus::Confirmed => "Confirmed",
            OrderStatus::Preparing => "Preparing",
            OrderStatus::OutForDelivery => "Out for Delivery",
            OrderStatus::Delivered => "Delivered",
            OrderStatus::Cancelled => "Cancelled",
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Confirmed => "confirmed",
            OrderStatus::Preparing => "preparing",
            OrderStatus::OutForDelivery => "out_for_delivery",
            OrderStatus::Delivered => "delivered",
            OrderStatus::Cancelled => "cancelled",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Card,
    Cash,
    Pix,
}

/// Snapshot of a cart at checkout
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: OrderId,
    pub user_id: UserId,
    pub items: Vec<CartItem>,
    pub subtotal: Decimal,
    pub delivery_fee: Decimal,
    #[serde(default)]
    pub discount: Decimal,
    pub total: Decimal,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub applied_coupon: Option<String>,
    pub address: Location,
    pub payment_method: PaymentMethod,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub card_id: Option<CardId>,
    pub status: OrderStatus,
    pub order_date: DateTime<Local>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub estimated_delivery: Option<DateTime<Local>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}
