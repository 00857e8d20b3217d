//! Configuration validation

use crate::schema::{RawConfig, RawCouponTemplate};
use std::collections::HashSet;
use thiserror::Error;

/// Validation error
#[derive(Debug, Clone, Error)]
pub enum ValidationError {
    #[error("Coupon '{code}': {message}")]
    CouponError { code: String, message: String },

    #[error("Duplicate coupon code: {0}")]
    DuplicateCouponCode(String),

    #[error("Invalid value for {field}: {message}")]
    InvalidValue { field: String, message: String },

    #[error("Invalid URL for {field}: '{value}'")]
    InvalidUrl { field: String, value: String },
}

/// Validate a raw configuration
pub fn validate_config(config: &RawConfig) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    if let Some(fee) = config.cart.delivery_fee
        && (!fee.is_finite() || fee < 0.0)
    {
        errors.push(ValidationError::InvalidValue {
            field: "cart.delivery_fee".into(),
            message: format!("must be a non-negative amount, got {}", fee),
        });
    }

    if config.coupons.max_per_code == Some(0) {
        errors.push(ValidationError::InvalidValue {
            field: "coupons.max_per_code".into(),
            message: "must be at least 1".into(),
        });
    }

    if let Some(p) = config.coupons.reward_probability
        && !(0.0..=1.0).contains(&p)
    {
        errors.push(ValidationError::InvalidValue {
            field: "coupons.reward_probability".into(),
            message: format!("must be between 0.0 and 1.0, got {}", p),
        });
    }

    let mut seen_codes = HashSet::new();
    for coupon in &config.coupons.catalog {
        if !seen_codes.insert(coupon.code.to_uppercase()) {
            errors.push(ValidationError::DuplicateCouponCode(coupon.code.clone()));
        }
        errors.extend(validate_coupon(coupon));
    }

    if config.tracking.ready_after_seconds == Some(0) {
        errors.push(ValidationError::InvalidValue {
            field: "tracking.ready_after_seconds".into(),
            message: "must be at least 1".into(),
        });
    }

    let urls = [
        ("catalog.base_url", &config.catalog.base_url),
        ("geocoding.postmon_url", &config.geocoding.postmon_url),
        ("geocoding.nominatim_url", &config.geocoding.nominatim_url),
    ];
    for (field, value) in urls {
        if let Some(url) = value
            && !(url.starts_with("http://") || url.starts_with("https://"))
        {
            errors.push(ValidationError::InvalidUrl {
                field: field.into(),
                value: url.clone(),
            });
        }
    }

    for (field, value) in [
        ("lists.max_recent_searches", config.lists.max_recent_searches),
        ("lists.max_favorites", config.lists.max_favorites),
    ] {
        if value == Some(0) {
            errors.push(ValidationError::InvalidValue {
                field: field.into(),
                message: "must be at least 1".into(),
            });
        }
    }

    errors
}

fn validate_coupon(coupon: &RawCouponTemplate) -> Vec<ValidationError> {
    let mut errors = Vec::new();
    let err = |message: String| ValidationError::CouponError {
        code: coupon.code.clone(),
        message,
    };

    if coupon.code.trim().is_empty() {
        errors.push(err("code cannot be empty".into()));
    } else if coupon.code != coupon.code.to_uppercase() {
        errors.push(err("code must be upper case".into()));
    }

    if coupon.discount_percent == 0 || coupon.discount_percent > 100 {
        errors.push(err(format!(
            "discount_percent must be 1-100, got {}",
            coupon.discount_percent
        )));
    }

    if coupon.valid_days == 0 {
        errors.push(err("valid_days must be at least 1".into()));
    }

    if !coupon.min_order_value.is_finite() || coupon.min_order_value < 0.0 {
        errors.push(err(format!(
            "min_order_value must be non-negative, got {}",
            coupon.min_order_value
        )));
    }

    errors
}
