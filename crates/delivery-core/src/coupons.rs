//! Coupon issuance and redemption
//!
//! Each catalog code can be issued a bounded number of times across all
//! users. Redemption checks and marks the coupon inside one atomic update,
//! so a coupon never discounts twice. Attaching a coupon to a cart only
//! previews it; it is redeemed when the order is placed.

use chrono::{DateTime, Local};
use delivery_api::{
    Coupon, CouponApplication, CouponDistribution, CouponStats, NotificationDraft,
    NotificationKind,
};
use delivery_config::{CouponPolicy, CouponTemplate};
use delivery_store::{JsonStoreExt, KvStore};
use delivery_util::{CouponId, DeliveryError, Result, UserId};
use rand::seq::IndexedRandom;
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::{NotificationService, keys};

pub struct CouponService {
    store: Arc<dyn KvStore>,
    policy: CouponPolicy,
    notifications: Arc<NotificationService>,
}

/// Outcome of checking a coupon without redeeming it
#[derive(Debug, Clone, PartialEq)]
pub enum CouponCheck {
    Valid(Coupon),
    Rejected(String),
}

/// The user's unused coupon `code` if it can discount `order_total`, or
/// the reason it cannot
fn redeemable<'a>(
    coupons: &'a mut [Coupon],
    code: &str,
    order_total: Decimal,
    now: DateTime<Local>,
) -> std::result::Result<&'a mut Coupon, String> {
    let mut candidates = coupons
        .iter_mut()
        .filter(|c| c.code.eq_ignore_ascii_case(code) && !c.is_used)
        .peekable();
    if candidates.peek().is_none() {
        return Err("Invalid or already used coupon".into());
    }

    let coupon = candidates
        .find(|c| !c.is_expired(now))
        .ok_or_else(|| "Coupon has expired".to_string())?;
    if !coupon.meets_minimum(order_total) {
        return Err(format!("Minimum order value is ${}", coupon.min_order_value));
    }
    Ok(coupon)
}

/// Add a counter for every catalog code that has none yet
fn seed(distributions: &mut Vec<CouponDistribution>, policy: &CouponPolicy) -> usize {
    let mut added = 0;
    for template in &policy.catalog {
        if !distributions.iter().any(|d| d.code == template.code) {
            distributions.push(CouponDistribution {
                code: template.code.clone(),
                distributed: 0,
                max_distribution: policy.max_per_code,
            });
            added += 1;
        }
    }
    added
}

impl CouponService {
    pub fn new(
        store: Arc<dyn KvStore>,
        policy: CouponPolicy,
        notifications: Arc<NotificationService>,
    ) -> Self {
        Self {
            store,
            policy,
            notifications,
        }
    }

    fn user_key(user_id: &UserId) -> String {
        keys::user_scoped(keys::USER_COUPONS, user_id)
    }

    /// Seed distribution counters that are missing
    pub fn initialize(&self) -> Result<()> {
        let added = self.store.modify(
            keys::COUPON_DISTRIBUTIONS,
            |all: &mut Vec<CouponDistribution>| Ok::<_, DeliveryError>(seed(all, &self.policy)),
        )?;
        if added > 0 {
            info!(added, "Coupon distributions initialized");
        }
        Ok(())
    }

    pub fn distributions(&self) -> Result<Vec<CouponDistribution>> {
        Ok(self.store.load_or_default(keys::COUPON_DISTRIBUTIONS)?)
    }

    pub fn is_available(&self, code: &str) -> Result<bool> {
        Ok(self
            .distributions()?
            .iter()
            .any(|d| d.code.eq_ignore_ascii_case(code) && d.has_capacity()))
    }

    pub fn stats(&self) -> Result<Vec<CouponStats>> {
        Ok(self.distributions()?.iter().map(CouponStats::from).collect())
    }

    /// Reserve one issuance of a random code that is still under its cap
    fn reserve_random(&self) -> Result<Option<CouponTemplate>> {
        self.store.modify(
            keys::COUPON_DISTRIBUTIONS,
            |all: &mut Vec<CouponDistribution>| {
                seed(all, &self.policy);
                let available: Vec<&CouponTemplate> = self
                    .policy
                    .catalog
                    .iter()
                    .filter(|t| all.iter().any(|d| d.code == t.code && d.has_capacity()))
                    .collect();

                let Some(template) = available.choose(&mut rand::rng()).map(|t| (*t).clone())
                else {
                    return Ok::<_, DeliveryError>(None);
                };
                if let Some(d) = all.iter_mut().find(|d| d.code == template.code) {
                    d.distributed += 1;
                }
                Ok(Some(template))
            },
        )
    }

    /// Issue a random available coupon to the user and notify them.
    /// `None` once every code is exhausted.
    pub async fn distribute_random(&self, user_id: &UserId) -> Result<Option<Coupon>> {
        let Some(template) = self.reserve_random()? else {
            info!(user_id = %user_id, "No coupons left to distribute");
            return Ok(None);
        };

        let coupon = Coupon {
            id: CouponId::generate(user_id),
            code: template.code.clone(),
            discount_percent: template.discount_percent,
            description: template.description.clone(),
            expiry_date: delivery_util::add_duration(delivery_util::now(), template.valid_for),
            is_used: false,
            min_order_value: template.min_order_value,
        };
        self.store
            .modify(&Self::user_key(user_id), |coupons: &mut Vec<Coupon>| {
                coupons.push(coupon.clone());
                Ok::<_, DeliveryError>(())
            })?;
        info!(user_id = %user_id, code = %coupon.code, "Coupon issued");

        let draft = NotificationDraft::new(
            NotificationKind::Coupon,
            "New Coupon Available!",
            format!(
                "Use code {} to get {}% OFF!",
                coupon.code, coupon.discount_percent
            ),
        )
        .with_coupon(coupon.clone());
        if let Err(e) = self.notifications.send(draft).await {
            warn!(user_id = %user_id, error = %e, "Coupon notification not stored");
        }

        Ok(Some(coupon))
    }

    /// Unexpired coupons of the user. Expired ones are pruned from storage.
    pub fn user_coupons(&self, user_id: &UserId) -> Result<Vec<Coupon>> {
        let now = delivery_util::now();
        let (valid, pruned) =
            self.store
                .modify(&Self::user_key(user_id), |coupons: &mut Vec<Coupon>| {
                    let before = coupons.len();
                    coupons.retain(|c| !c.is_expired(now));
                    Ok::<_, DeliveryError>((coupons.clone(), before - coupons.len()))
                })?;
        if pruned > 0 {
            debug!(user_id = %user_id, pruned, "Expired coupons pruned");
        }
        Ok(valid)
    }

    /// Check a coupon against an order total without redeeming it
    pub fn preview(&self, user_id: &UserId, code: &str, order_total: Decimal) -> Result<CouponCheck> {
        let mut coupons: Vec<Coupon> = self.store.load_or_default(&Self::user_key(user_id))?;
        Ok(
            match redeemable(&mut coupons, code, order_total, delivery_util::now()) {
                Ok(coupon) => CouponCheck::Valid(coupon.clone()),
                Err(reason) => CouponCheck::Rejected(reason),
            },
        )
    }

    /// Redeem a coupon against an order total.
    ///
    /// The lookup, the checks and marking the coupon used happen in one
    /// atomic update; a rejected coupon is left untouched.
    pub fn apply(&self, user_id: &UserId, code: &str, order_total: Decimal) -> Result<CouponApplication> {
        let now = delivery_util::now();
        let outcome = self
            .store
            .modify(&Self::user_key(user_id), |coupons: &mut Vec<Coupon>| {
                Ok::<_, DeliveryError>(match redeemable(coupons, code, order_total, now) {
                    Ok(coupon) => {
                        coupon.is_used = true;
                        CouponApplication::applied(
                            coupon.discount_for(order_total),
                            coupon.discount_percent,
                        )
                    }
                    Err(reason) => CouponApplication::rejected(reason),
                })
            })?;

        if outcome.success {
            info!(user_id = %user_id, code, discount = %outcome.discount, "Coupon applied");
        } else {
            debug!(user_id = %user_id, code, reason = %outcome.message, "Coupon rejected");
        }
        Ok(outcome)
    }

    /// Make a redeemed coupon usable again. Used when the order it paid
    /// for could not be saved.
    pub fn release(&self, user_id: &UserId, code: &str) -> Result<bool> {
        let released = self
            .store
            .modify(&Self::user_key(user_id), |coupons: &mut Vec<Coupon>| {
                let used = coupons
                    .iter_mut()
                    .find(|c| c.code.eq_ignore_ascii_case(code) && c.is_used);
                Ok::<_, DeliveryError>(match used {
                    Some(coupon) => {
                        coupon.is_used = false;
                        true
                    }
                    None => false,
                })
            })?;
        if released {
            warn!(user_id = %user_id, code, "Coupon redemption released");
        }
        Ok(released)
    }
}
