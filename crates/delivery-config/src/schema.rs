//! Raw configuration schema (as parsed from TOML)

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Raw configuration as parsed from TOML
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RawConfig {
    /// Config schema version
    pub config_version: u32,

    #[serde(default)]
    pub app: RawAppConfig,

    #[serde(default)]
    pub cart: RawCartConfig,

    #[serde(default)]
    pub coupons: RawCouponConfig,

    #[serde(default)]
    pub tracking: RawTrackingConfig,

    #[serde(default)]
    pub catalog: RawCatalogConfig,

    #[serde(default)]
    pub geocoding: RawGeocodingConfig,

    #[serde(default)]
    pub lists: RawListConfig,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RawAppConfig {
    /// Directory holding the store database
    pub data_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RawCartConfig {
    /// Flat delivery fee added to non-empty carts
    pub delivery_fee: Option<f64>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RawCouponConfig {
    /// Issuance cap per coupon code across all users
    pub max_per_code: Option<u32>,

    /// Chance that a completed checkout earns a reward coupon (0.0-1.0)
    pub reward_probability: Option<f64>,

    /// Delay before the reward coupon is issued
    pub reward_delay_seconds: Option<u64>,

    /// Coupon catalog; the built-in catalog is used when empty
    #[serde(default)]
    pub catalog: Vec<RawCouponTemplate>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RawCouponTemplate {
    pub code: String,

    /// Percentage off, 1-100
    pub discount_percent: u32,

    #[serde(default)]
    pub description: String,

    /// Days an issued coupon stays valid
    pub valid_days: u32,

    #[serde(default)]
    pub min_order_value: f64,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RawTrackingConfig {
    /// Delay before a placed order is marked ready
    pub ready_after_seconds: Option<u64>,

    /// Delay between the ready and out-for-delivery notifications
    pub delivery_notice_after_seconds: Option<u64>,

    /// Delivery estimate stamped on new orders
    pub estimated_delivery_minutes: Option<u64>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RawCatalogConfig {
    pub base_url: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RawGeocodingConfig {
    pub postmon_url: Option<String>,
    pub nominatim_url: Option<String>,
    pub accept_language: Option<String>,
    pub user_agent: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RawListConfig {
    pub max_recent_searches: Option<usize>,
    pub max_favorites: Option<usize>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_full_config() {
        let toml_str = r#"
            config_version = 1

            [app]
            data_dir = "/var/lib/delivery"

            [cart]
            delivery_fee = 3.5

            [coupons]
            max_per_code = 10
            reward_probability = 0.25

            [[coupons.catalog]]
            code = "LUNCH"
            discount_percent = 12
            description = "Lunch deal"
            valid_days = 1
            min_order_value = 15

            [tracking]
            ready_after_seconds = 30

            [lists]
            max_recent_searches = 8
        "#;

        let config: RawConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.cart.delivery_fee, Some(3.5));
        assert_eq!(config.coupons.catalog.len(), 1);
        assert_eq!(config.coupons.catalog[0].code, "LUNCH");
        assert_eq!(config.tracking.ready_after_seconds, Some(30));
        assert_eq!(config.lists.max_recent_searches, Some(8));
    }

    #[test]
    fn sections_are_optional() {
        let config: RawConfig = toml::from_str("config_version = 1").unwrap();
        assert!(config.coupons.catalog.is_empty());
        assert!(config.app.data_dir.is_none());
    }
}
