//! Per-user shopping cart
//!
//! Totals are recomputed on every mutation: the subtotal is always the sum
//! of the line totals, and an attached coupon's discount follows it.

use delivery_api::{AppliedCoupon, Cart, CartItem};
use delivery_config::CartPolicy;
use delivery_store::{JsonStoreExt, KvStore};
use delivery_util::{DeliveryError, ProductId, Result, UserId};
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::{debug, info};

use crate::keys;

/// Largest subtotal a cart may reach
const MAX_SUBTOTAL: i64 = 1_000_000_000;

pub struct CartStore {
    store: Arc<dyn KvStore>,
    policy: CartPolicy,
}

impl CartStore {
    pub fn new(store: Arc<dyn KvStore>, policy: CartPolicy) -> Self {
        Self { store, policy }
    }

    fn key(user_id: &UserId) -> String {
        keys::user_scoped(keys::CART, user_id)
    }

    /// Current cart; an empty one if the user has none yet
    pub fn get(&self, user_id: &UserId) -> Result<Cart> {
        Ok(self
            .store
            .load(&Self::key(user_id))?
            .unwrap_or_else(|| Cart::empty(delivery_util::now())))
    }

    /// Run `f` on the stored cart and recalculate. Nothing is written when
    /// `f` fails or the subtotal would exceed the cap.
    fn mutate(&self, user_id: &UserId, f: impl FnOnce(&mut Cart) -> Result<()>) -> Result<Cart> {
        let fee = self.policy.delivery_fee;
        self.store
            .modify(&Self::key(user_id), |slot: &mut Option<Cart>| {
                let now = delivery_util::now();
                let cart = slot.get_or_insert_with(|| Cart::empty(now));
                f(cart)?;
                match cart.checked_subtotal() {
                    Some(subtotal) if subtotal <= Decimal::from(MAX_SUBTOTAL) => {}
                    _ => return Err(DeliveryError::validation("cart total too large")),
                }
                cart.recalculate(fee);
                cart.updated_at = now;
                Ok(cart.clone())
            })
    }

    /// Add a line, merging quantities when the product is already present
    pub fn add_item(&self, user_id: &UserId, item: CartItem) -> Result<Cart> {
        if item.quantity == 0 {
            return Err(DeliveryError::validation("quantity must be at least 1"));
        }
        if item.price < Decimal::ZERO {
            return Err(DeliveryError::validation("price cannot be negative"));
        }

        let product_id = item.product_id.clone();
        let cart = self.mutate(user_id, |cart| {
            match cart.items.iter_mut().find(|i| i.product_id == item.product_id) {
                Some(existing) => {
                    existing.quantity = existing
                        .quantity
                        .checked_add(item.quantity)
                        .ok_or_else(|| DeliveryError::validation("quantity too large"))?;
                }
                None => cart.items.push(item),
            }
            Ok(())
        })?;

        debug!(user_id = %user_id, product_id = %product_id, subtotal = %cart.subtotal, "Item added to cart");
        Ok(cart)
    }

    pub fn remove_item(&self, user_id: &UserId, product_id: &ProductId) -> Result<Cart> {
        self.mutate(user_id, |cart| {
            cart.items.retain(|i| &i.product_id != product_id);
            Ok(())
        })
    }

    /// Set a line's quantity; zero or less removes the line
    pub fn update_quantity(
        &self,
        user_id: &UserId,
        product_id: &ProductId,
        quantity: i64,
    ) -> Result<Cart> {
        self.mutate(user_id, |cart| {
            if quantity <= 0 {
                cart.items.retain(|i| &i.product_id != product_id);
                return Ok(());
            }
            let line = cart
                .items
                .iter_mut()
                .find(|i| &i.product_id == product_id)
                .ok_or_else(|| DeliveryError::not_found(format!("product {product_id} in cart")))?;
            line.quantity = u32::try_from(quantity)
                .map_err(|_| DeliveryError::validation("quantity too large"))?;
            Ok(())
        })
    }

    pub fn clear(&self, user_id: &UserId) -> Result<()> {
        self.store.remove(&Self::key(user_id))?;
        info!(user_id = %user_id, "Cart cleared");
        Ok(())
    }

    /// Attach a coupon's terms to the cart. The discount is recomputed on
    /// every change and the coupon falls off once the subtotal drops below
    /// its minimum.
    pub fn apply_coupon(&self, user_id: &UserId, coupon: AppliedCoupon) -> Result<Cart> {
        self.mutate(user_id, |cart| {
            if cart.is_empty() {
                return Err(DeliveryError::EmptyCart);
            }
            if !coupon.applies_to(cart.subtotal) {
                return Err(DeliveryError::coupon(format!(
                    "Minimum order value is ${}",
                    coupon.min_order_value
                )));
            }
            cart.coupon = Some(coupon);
            Ok(())
        })
    }

    pub fn remove_coupon(&self, user_id: &UserId) -> Result<Cart> {
        self.mutate(user_id, |cart| {
            cart.coupon = None;
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use delivery_store::MemoryStore;

    fn carts(fee: i64) -> CartStore {
        CartStore::new(
            Arc::new(MemoryStore::new()),
            CartPolicy {
                delivery_fee: Decimal::new(fee, 0),
            },
        )
    }

    fn dec(units: i64) -> Decimal {
        Decimal::new(units, 0)
    }

    fn assert_consistent(cart: &Cart) {
        let sum: Decimal = cart.items.iter().map(CartItem::line_total).sum();
        assert_eq!(cart.subtotal, sum);
    }

    #[test]
    fn add_merges_quantities() {
        let store = carts(3);
        let user = UserId::new("u1");

        store.add_item(&user, CartItem::new("a", "A", dec(10), 1)).unwrap();
        let cart = store.add_item(&user, CartItem::new("a", "A", dec(10), 1)).unwrap();
        assert_eq!(cart.items.len(), 1);
        assert_eq!(cart.items[0].quantity, 2);

        let cart = store.add_item(&user, CartItem::new("b", "B", dec(5), 1)).unwrap();
        assert_consistent(&cart);
        assert_eq!(cart.subtotal, dec(25));
        assert_eq!(cart.total, dec(28));
    }

    #[test]
    fn quantity_zero_removes_line() {
        let store = carts(3);
        let user = UserId::new("u1");
        store.add_item(&user, CartItem::new("a", "A", dec(10), 2)).unwrap();
        store.add_item(&user, CartItem::new("b", "B", dec(5), 1)).unwrap();

        let cart = store.update_quantity(&user, &ProductId::new("a"), 5).unwrap();
        assert_eq!(cart.subtotal, dec(55));
        assert_consistent(&cart);

        let cart = store.update_quantity(&user, &ProductId::new("a"), 0).unwrap();
        assert_eq!(cart.items.len(), 1);
        assert_eq!(cart.subtotal, dec(5));

        let cart = store.update_quantity(&user, &ProductId::new("b"), -1).unwrap();
        assert!(cart.is_empty());
        assert_eq!(cart.total, Decimal::ZERO);
        assert_eq!(cart.delivery_fee, Decimal::ZERO);

        assert!(matches!(
            store.update_quantity(&user, &ProductId::new("zzz"), 1),
            Err(DeliveryError::NotFound(_))
        ));
    }

    fn coupon(code: &str, pct: u32, min: i64) -> AppliedCoupon {
        AppliedCoupon {
            code: code.into(),
            discount_percent: pct,
            min_order_value: dec(min),
        }
    }

    #[test]
    fn coupon_discount_and_removal() {
        let store = carts(3);
        let user = UserId::new("u1");

        assert!(matches!(
            store.apply_coupon(&user, coupon("SAVE10", 10, 20)),
            Err(DeliveryError::EmptyCart)
        ));

        store.add_item(&user, CartItem::new("a", "A", dec(10), 2)).unwrap();
        store.add_item(&user, CartItem::new("b", "B", dec(5), 1)).unwrap();
        let cart = store.apply_coupon(&user, coupon("SAVE10", 10, 20)).unwrap();
        assert_eq!(cart.coupon.as_ref().map(|c| c.code.as_str()), Some("SAVE10"));
        assert_eq!(cart.discount, Decimal::new(250, 2));
        assert_eq!(cart.total, Decimal::new(2550, 2));

        let cart = store.remove_coupon(&user).unwrap();
        assert_eq!(cart.total, dec(28));
        assert!(cart.coupon.is_none());
    }

    #[test]
    fn coupon_falls_off_below_minimum() {
        let store = carts(0);
        let user = UserId::new("u1");
        store.add_item(&user, CartItem::new("a", "A", dec(25), 1)).unwrap();
        store.add_item(&user, CartItem::new("b", "B", dec(5), 1)).unwrap();

        let cart = store.apply_coupon(&user, coupon("MEGA15", 15, 30)).unwrap();
        assert_eq!(cart.discount, Decimal::new(450, 2));

        let cart = store.remove_item(&user, &ProductId::new("a")).unwrap();
        assert!(cart.coupon.is_none());
        assert_eq!(cart.discount, Decimal::ZERO);
        assert_eq!(cart.total, dec(5));

        assert!(matches!(
            store.apply_coupon(&user, coupon("MEGA15", 15, 30)),
            Err(DeliveryError::CouponRejected(_))
        ));
    }

    #[test]
    fn quantity_overflow_is_rejected() {
        let store: Arc<dyn KvStore> = Arc::new(MemoryStore::new());
        let cart = CartStore::new(store.clone(), CartPolicy { delivery_fee: dec(0) });
        let user = UserId::new("u1");

        cart.add_item(&user, CartItem::new("a", "A", Decimal::ZERO, u32::MAX))
            .unwrap();
        assert!(matches!(
            cart.add_item(&user, CartItem::new("a", "A", Decimal::ZERO, 1)),
            Err(DeliveryError::ValidationError(_))
        ));
        assert!(matches!(
            cart.add_item(&user, CartItem::new("b", "B", Decimal::MAX, 2)),
            Err(DeliveryError::ValidationError(_))
        ));

        // The store is still usable and the cart unchanged
        assert!(store.is_healthy());
        let current = cart.get(&user).unwrap();
        assert_eq!(current.items.len(), 1);
        assert_eq!(current.items[0].quantity, u32::MAX);
        assert!(cart.add_item(&user, CartItem::new("c", "C", dec(1), 1)).is_ok());
    }

    #[test]
    fn carts_are_per_user() {
        let store = carts(0);
        let ana = UserId::new("ana");
        let bob = UserId::new("bob");
        store.add_item(&ana, CartItem::new("a", "A", dec(10), 1)).unwrap();

        assert!(store.get(&bob).unwrap().is_empty());
        assert_eq!(store.get(&ana).unwrap().item_count(), 1);

        store.clear(&ana).unwrap();
        assert!(store.get(&ana).unwrap().is_empty());
    }

    #[test]
    fn rejects_bad_items() {
        let store = carts(0);
        let user = UserId::new("u1");
        assert!(store.add_item(&user, CartItem::new("a", "A", dec(10), 0)).is_err());
        assert!(store.add_item(&user, CartItem::new("a", "A", dec(-1), 1)).is_err());
    }
}
