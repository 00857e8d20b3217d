//! Wiring of every store and service over one key-value store

use delivery_config::Settings;
use delivery_store::KvStore;
use delivery_util::Result;
use std::sync::Arc;
use tracing::info;

use crate::{
    CardStore, CartStore, Checkout, CouponService, Favorites, LocationStore, Maintenance,
    NotificationService, Notifier, OrderStore, OrderTracker, RecentSearches, SessionStore,
    UserStore,
};

/// The client-side backend, assembled
pub struct DeliveryApp {
    pub settings: Settings,
    pub users: Arc<UserStore>,
    pub sessions: SessionStore,
    pub cards: Arc<CardStore>,
    pub cart: Arc<CartStore>,
    pub orders: Arc<OrderStore>,
    pub coupons: Arc<CouponService>,
    pub locations: LocationStore,
    pub notifications: Arc<NotificationService>,
    pub tracker: Arc<OrderTracker>,
    pub checkout: Checkout,
    pub favorites: Favorites,
    pub recent_searches: RecentSearches,
    pub maintenance: Maintenance,
}

impl DeliveryApp {
    /// Build every service and seed the coupon counters
    pub fn new(settings: Settings, store: Arc<dyn KvStore>, notifier: Arc<dyn Notifier>) -> Result<Self> {
        let users = Arc::new(UserStore::new(store.clone()));
        let cards = Arc::new(CardStore::new(store.clone()));
        let cart = Arc::new(CartStore::new(store.clone(), settings.cart.clone()));
        let orders = Arc::new(OrderStore::new(store.clone()));
        let notifications = Arc::new(NotificationService::new(store.clone(), notifier));
        let coupons = Arc::new(CouponService::new(
            store.clone(),
            settings.coupons.clone(),
            notifications.clone(),
        ));
        let tracker = Arc::new(OrderTracker::new(
            orders.clone(),
            notifications.clone(),
            settings.tracking.clone(),
        ));
        let checkout = Checkout::new(
            users.clone(),
            cards.clone(),
            cart.clone(),
            orders.clone(),
            coupons.clone(),
            tracker.clone(),
            settings.coupons.clone(),
            settings.tracking.clone(),
        );

        coupons.initialize()?;

        info!(
            delivery_fee = %settings.cart.delivery_fee,
            coupon_codes = settings.coupons.catalog.len(),
            healthy = store.is_healthy(),
            "Delivery app initialized"
        );

        Ok(Self {
            sessions: SessionStore::new(store.clone()),
            locations: LocationStore::new(store.clone()),
            favorites: Favorites::new(store.clone(), settings.lists.max_favorites),
            recent_searches: RecentSearches::new(store.clone(), settings.lists.max_recent_searches),
            maintenance: Maintenance::new(store),
            settings,
            users,
            cards,
            cart,
            orders,
            coupons,
            notifications,
            tracker,
            checkout,
        })
    }
}
