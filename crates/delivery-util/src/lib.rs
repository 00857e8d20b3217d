//! Shared utilities for the delivery client
//!
//! This crate provides:
//! - ID types (UserId, CardId, OrderId, CouponId, ...)
//! - Time utilities (mockable wall clock, epoch millis, formatting)
//! - Error types
//! - Default paths for config and data directories

mod error;
mod ids;
mod paths;
mod time;

pub use error::*;
pub use ids::*;
pub use paths::*;
pub use time::*;
