//! Checkout: turns a user's cart into an order
//!
//! The coupon, the order and the cart are written one after the other;
//! there is no transaction spanning them. A coupon redeemed for an order
//! that then fails to save is released again.

use delivery_api::{
    AppliedCoupon, CouponApplication, Location, Order, OrderStatus, PaymentMethod, SavedCard,
};
use delivery_config::{CouponPolicy, TrackingPolicy};
use delivery_util::{CardId, DeliveryError, OrderId, Result, UserId};
use rand::Rng;
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::{CardStore, CartStore, CouponCheck, CouponService, OrderStore, OrderTracker, UserStore};

/// Everything the checkout screen collects
#[derive(Debug, Clone)]
pub struct CheckoutRequest {
    pub user_id: UserId,
    pub address: Location,
    pub payment_method: PaymentMethod,
    /// Required when paying by card
    pub card_id: Option<CardId>,
    /// Applied at checkout unless the cart already carries a coupon
    pub coupon_code: Option<String>,
    pub notes: Option<String>,
}

pub struct Checkout {
    users: Arc<UserStore>,
    cards: Arc<CardStore>,
    cart: Arc<CartStore>,
    orders: Arc<OrderStore>,
    coupons: Arc<CouponService>,
    tracker: Arc<OrderTracker>,
    coupon_policy: CouponPolicy,
    tracking_policy: TrackingPolicy,
}

impl Checkout {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        users: Arc<UserStore>,
        cards: Arc<CardStore>,
        cart: Arc<CartStore>,
        orders: Arc<OrderStore>,
        coupons: Arc<CouponService>,
        tracker: Arc<OrderTracker>,
        coupon_policy: CouponPolicy,
        tracking_policy: TrackingPolicy,
    ) -> Self {
        Self {
            users,
            cards,
            cart,
            orders,
            coupons,
            tracker,
            coupon_policy,
            tracking_policy,
        }
    }

    /// Attach a coupon to the cart after checking it against the subtotal.
    /// The coupon is only redeemed when the order is placed. A rejected
    /// coupon leaves the cart unchanged.
    pub fn apply_coupon(&self, user_id: &UserId, code: &str) -> Result<CouponApplication> {
        let cart = self.cart.get(user_id)?;
        if cart.is_empty() {
            return Err(DeliveryError::EmptyCart);
        }
        if let Some(applied) = &cart.coupon {
            return Ok(CouponApplication::rejected(format!(
                "Coupon {} is already applied",
                applied.code
            )));
        }

        match self.coupons.preview(user_id, code, cart.subtotal)? {
            CouponCheck::Valid(coupon) => {
                let cart = self.cart.apply_coupon(user_id, AppliedCoupon::from(&coupon))?;
                Ok(CouponApplication::applied(cart.discount, coupon.discount_percent))
            }
            CouponCheck::Rejected(reason) => Ok(CouponApplication::rejected(reason)),
        }
    }

    fn payment_card(&self, request: &CheckoutRequest) -> Result<Option<SavedCard>> {
        match (request.payment_method, &request.card_id) {
            (PaymentMethod::Card, None) => Err(DeliveryError::validation(
                "a card is required for card payments",
            )),
            (_, Some(card_id)) => self
                .cards
                .get(card_id, &request.user_id)?
                .map(Some)
                .ok_or_else(|| DeliveryError::not_found(format!("card {card_id} for this user"))),
            (_, None) => Ok(None),
        }
    }

    /// Place an order from the user's cart.
    ///
    /// Order of effects: coupon redeemed against the current subtotal, order
    /// saved (the coupon is released if this fails), tracking started,
    /// maybe a reward coupon scheduled, cart cleared, then the user's
    /// chosen address and card remembered.
    pub async fn place_order(&self, request: CheckoutRequest) -> Result<Order> {
        let user_id = &request.user_id;
        self.users.get(user_id)?;

        let cart = self.cart.get(user_id)?;
        if cart.is_empty() {
            return Err(DeliveryError::EmptyCart);
        }
        let card = self.payment_card(&request)?;

        let code = cart
            .coupon
            .as_ref()
            .map(|c| c.code.clone())
            .or_else(|| request.coupon_code.as_ref().map(|c| c.to_uppercase()));
        let discount = match &code {
            Some(code) => {
                let outcome = self.coupons.apply(user_id, code, cart.subtotal)?;
                if !outcome.success {
                    return Err(DeliveryError::coupon(outcome.message));
                }
                outcome.discount
            }
            None => Decimal::ZERO,
        };

        let now = delivery_util::now();
        let mut address = request.address.clone();
        address.user_id = user_id.clone();
        let order = Order {
            id: OrderId::generate(),
            user_id: user_id.clone(),
            items: cart.items.clone(),
            subtotal: cart.subtotal,
            delivery_fee: cart.delivery_fee,
            discount,
            total: (cart.subtotal + cart.delivery_fee - discount).max(Decimal::ZERO),
            applied_coupon: code.clone(),
            address: address.clone(),
            payment_method: request.payment_method,
            card_id: card.as_ref().map(|c| c.id.clone()),
            status: OrderStatus::Pending,
            order_date: now,
            estimated_delivery: Some(delivery_util::add_duration(
                now,
                self.tracking_policy.estimated_delivery,
            )),
            notes: request.notes.clone(),
        };
        let order = match self.orders.save(order) {
            Ok(order) => order,
            Err(e) => {
                if let Some(code) = &code {
                    if let Err(release) = self.coupons.release(user_id, code) {
                        warn!(user_id = %user_id, code, error = %release, "Coupon not released");
                    }
                }
                return Err(e);
            }
        };

        self.tracker.start(&order.id)?;
        self.maybe_schedule_reward(user_id);
        self.cart.clear(user_id)?;

        if let Err(e) = self
            .users
            .set_chosen_location(user_id, Some(address))
            .and_then(|_| self.users.set_chosen_card(user_id, card))
        {
            warn!(user_id = %user_id, error = %e, "Checkout choices not remembered");
        }

        info!(
            order_id = %order.id,
            user_id = %user_id,
            total = %order.total,
            items = order.items.len(),
            "Order placed"
        );
        Ok(order)
    }

    fn maybe_schedule_reward(&self, user_id: &UserId) {
        let probability = self.coupon_policy.reward_probability.clamp(0.0, 1.0);
        if !rand::rng().random_bool(probability) {
            return;
        }

        let delay = self.coupon_policy.reward_delay;
        debug!(user_id = %user_id, delay_secs = delay.as_secs(), "Reward coupon scheduled");

        let coupons = self.coupons.clone();
        let user_id = user_id.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            match coupons.distribute_random(&user_id).await {
                Ok(Some(coupon)) => debug!(user_id = %user_id, code = %coupon.code, "Reward coupon issued"),
                Ok(None) => debug!(user_id = %user_id, "No reward coupon left"),
                Err(e) => warn!(user_id = %user_id, error = %e, "Reward coupon failed"),
            }
        });
    }
}
