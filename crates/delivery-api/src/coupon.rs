//! Coupon records

use chrono::{DateTime, Local};
use delivery_util::CouponId;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::round_money;

/// A coupon issued to one user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Coupon {
    pub id: CouponId,
    pub code: String,
    /// Percentage off, 1-100
    #[serde(rename = "discount")]
    pub discount_percent: u32,
    pub description: String,
    pub expiry_date: DateTime<Local>,
    pub is_used: bool,
    #[serde(default)]
    pub min_order_value: Decimal,
}

impl Coupon {
    pub fn is_expired(&self, now: DateTime<Local>) -> bool {
        self.expiry_date <= now
    }

    pub fn meets_minimum(&self, order_total: Decimal) -> bool {
        order_total >= self.min_order_value
    }

    /// `order_total × pct / 100`, rounded to cents
    pub fn discount_for(&self, order_total: Decimal) -> Decimal {
        round_money(order_total * Decimal::from(self.discount_percent) / Decimal::ONE_HUNDRED)
    }
}

/// Issuance counter for one coupon code, shared by all users
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CouponDistribution {
    pub code: String,
    pub distributed: u32,
    pub max_distribution: u32,
}

impl CouponDistribution {
    pub fn has_capacity(&self) -> bool {
        self.distributed < self.max_distribution
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CouponStats {
    pub code: String,
    pub distributed: u32,
    pub remaining: u32,
    pub max_distribution: u32,
}

impl From<&CouponDistribution> for CouponStats {
    fn from(d: &CouponDistribution) -> Self {
        Self {
            code: d.code.clone(),
            distributed: d.distributed,
            remaining: d.max_distribution.saturating_sub(d.distributed),
            max_distribution: d.max_distribution,
        }
    }
}

/// Outcome of applying a coupon to an order total
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CouponApplication {
    pub success: bool,
    pub discount: Decimal,
    pub message: String,
}

impl CouponApplication {
    pub fn applied(discount: Decimal, percent: u32) -> Self {
        Self {
            success: true,
            discount,
            message: format!("{}% discount applied!", percent),
        }
    }

    pub fn rejected(message: impl Into<String>) -> Self {
        Self {
            success: false,
            discount: Decimal::ZERO,
            message: message.into(),
        }
    }
}
