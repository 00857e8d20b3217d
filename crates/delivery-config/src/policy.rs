//! Validated settings (converted from raw config)

use crate::schema::{RawConfig, RawCouponTemplate};
use delivery_util::default_data_dir;
use rust_decimal::Decimal;
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_MEAL_API_URL: &str = "https://www.themealdb.com/api/json/v1/1";
pub const DEFAULT_POSTMON_URL: &str = "https://api.postmon.com.br/v1/geo";
pub const DEFAULT_NOMINATIM_URL: &str = "https://nominatim.openstreetmap.org/reverse";
pub const DEFAULT_MAX_COUPONS_PER_CODE: u32 = 5;
pub const DEFAULT_MAX_RECENT_SEARCHES: usize = 5;
pub const DEFAULT_MAX_FAVORITES: usize = 50;

/// Validated settings for every store and service
#[derive(Debug, Clone)]
pub struct Settings {
    pub app: AppSettings,
    pub cart: CartPolicy,
    pub coupons: CouponPolicy,
    pub tracking: TrackingPolicy,
    pub catalog: CatalogSettings,
    pub geocoding: GeocodingSettings,
    pub lists: ListLimits,
}

#[derive(Debug, Clone)]
pub struct AppSettings {
    pub data_dir: PathBuf,
}

#[derive(Debug, Clone)]
pub struct CartPolicy {
    pub delivery_fee: Decimal,
}

#[derive(Debug, Clone)]
pub struct CouponPolicy {
    pub max_per_code: u32,
    pub reward_probability: f64,
    pub reward_delay: Duration,
    pub catalog: Vec<CouponTemplate>,
}

/// A coupon code that can be issued to users
#[derive(Debug, Clone, PartialEq)]
pub struct CouponTemplate {
    pub code: String,
    pub discount_percent: u32,
    pub description: String,
    /// How long an issued coupon stays valid
    pub valid_for: Duration,
    pub min_order_value: Decimal,
}

#[derive(Debug, Clone)]
pub struct TrackingPolicy {
    pub ready_after: Duration,
    pub delivery_notice_after: Duration,
    pub estimated_delivery: Duration,
}

#[derive(Debug, Clone)]
pub struct CatalogSettings {
    pub base_url: String,
}

#[derive(Debug, Clone)]
pub struct GeocodingSettings {
    pub postmon_url: String,
    pub nominatim_url: String,
    pub accept_language: String,
    pub user_agent: String,
}

#[derive(Debug, Clone)]
pub struct ListLimits {
    pub max_recent_searches: usize,
    pub max_favorites: usize,
}

const DAY: u64 = 24 * 60 * 60;

/// Built-in coupon catalog
pub fn default_coupon_catalog() -> Vec<CouponTemplate> {
    let template = |code: &str, pct: u32, description: &str, days: u64, min: i64| CouponTemplate {
        code: code.into(),
        discount_percent: pct,
        description: description.into(),
        valid_for: Duration::from_secs(days * DAY),
        min_order_value: Decimal::new(min, 0),
    };

    vec![
        template("WELCOME5", 5, "Get 5% OFF on your order!", 7, 0),
        template("SAVE10", 10, "Save 10% on orders above $20!", 7, 20),
        template("MEGA15", 15, "Mega Deal! 15% OFF on orders above $30!", 5, 30),
        template("SUPER20", 20, "Super Savings! 20% OFF on orders above $50!", 3, 50),
        template("ULTRA25", 25, "Ultra Deal! 25% OFF on orders above $70!", 2, 70),
    ]
}

fn money(value: f64) -> Decimal {
    Decimal::try_from(value)
        .map(|d| d.round_dp(2))
        .unwrap_or(Decimal::ZERO)
}

impl CouponTemplate {
    fn from_raw(raw: RawCouponTemplate) -> Self {
        Self {
            code: raw.code,
            discount_percent: raw.discount_percent,
            description: raw.description,
            valid_for: Duration::from_secs(u64::from(raw.valid_days) * DAY),
            min_order_value: money(raw.min_order_value),
        }
    }
}

impl Settings {
    /// Convert a validated raw config
    pub fn from_raw(raw: RawConfig) -> Self {
        let catalog = if raw.coupons.catalog.is_empty() {
            default_coupon_catalog()
        } else {
            raw.coupons
                .catalog
                .into_iter()
                .map(CouponTemplate::from_raw)
                .collect()
        };

        Self {
            app: AppSettings {
                data_dir: raw.app.data_dir.unwrap_or_else(default_data_dir),
            },
            cart: CartPolicy {
                delivery_fee: raw.cart.delivery_fee.map(money).unwrap_or(Decimal::ZERO),
            },
            coupons: CouponPolicy {
                max_per_code: raw
                    .coupons
                    .max_per_code
                    .unwrap_or(DEFAULT_MAX_COUPONS_PER_CODE),
                reward_probability: raw.coupons.reward_probability.unwrap_or(0.1),
                reward_delay: Duration::from_secs(raw.coupons.reward_delay_seconds.unwrap_or(3)),
                catalog,
            },
            tracking: TrackingPolicy {
                ready_after: Duration::from_secs(raw.tracking.ready_after_seconds.unwrap_or(60)),
                delivery_notice_after: Duration::from_secs(
                    raw.tracking.delivery_notice_after_seconds.unwrap_or(2),
                ),
                estimated_delivery: Duration::from_secs(
                    raw.tracking.estimated_delivery_minutes.unwrap_or(45) * 60,
                ),
            },
            catalog: CatalogSettings {
                base_url: raw
                    .catalog
                    .base_url
                    .unwrap_or_else(|| DEFAULT_MEAL_API_URL.to_string()),
            },
            geocoding: GeocodingSettings {
                postmon_url: raw
                    .geocoding
                    .postmon_url
                    .unwrap_or_else(|| DEFAULT_POSTMON_URL.to_string()),
                nominatim_url: raw
                    .geocoding
                    .nominatim_url
                    .unwrap_or_else(|| DEFAULT_NOMINATIM_URL.to_string()),
                accept_language: raw
                    .geocoding
                    .accept_language
                    .unwrap_or_else(|| "pt-BR".to_string()),
                user_agent: raw
                    .geocoding
                    .user_agent
                    .unwrap_or_else(|| concat!("delivery/", env!("CARGO_PKG_VERSION")).to_string()),
            },
            lists: ListLimits {
                max_recent_searches: raw
                    .lists
                    .max_recent_searches
                    .unwrap_or(DEFAULT_MAX_RECENT_SEARCHES),
                max_favorites: raw.lists.max_favorites.unwrap_or(DEFAULT_MAX_FAVORITES),
            },
        }
    }

    pub fn find_coupon(&self, code: &str) -> Option<&CouponTemplate> {
        self.coupons
            .catalog
            .iter()
            .find(|c| c.code.eq_ignore_ascii_case(code))
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self::from_raw(RawConfig {
            config_version: crate::CURRENT_CONFIG_VERSION,
            ..Default::default()
        })
    }
}
