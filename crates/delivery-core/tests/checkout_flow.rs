//! Integration tests for delivery-core
//!
//! These tests drive the assembled app from registration to delivery.

use delivery_api::{
    CartItem, Location, NewCard, NewUser, NotificationKind, OrderStatus, PaymentMethod,
    UserProfile,
};
use delivery_config::{CouponTemplate, Settings};
use delivery_core::{CheckoutRequest, DeliveryApp, RecordingNotifier, keys};
use delivery_store::{KvStore, MemoryStore, SqliteStore, StoreError, StoreResult, UpdateFn};
use delivery_util::{DeliveryError, ProductId, UserId};
use rust_decimal::Decimal;
use std::sync::Arc;
use std::time::Duration;

fn make_test_settings() -> Settings {
    let mut settings = Settings::default();
    settings.cart.delivery_fee = Decimal::new(3, 0);
    settings.coupons.reward_probability = 0.0;
    settings.coupons.reward_delay = Duration::from_millis(10);
    settings.tracking.ready_after = Duration::from_millis(50);
    settings.tracking.delivery_notice_after = Duration::from_millis(20);
    settings
}

fn only_coupon(settings: &mut Settings, code: &str) {
    settings.coupons.catalog.retain(|t: &CouponTemplate| t.code == code);
}

fn make_app(settings: Settings, store: Arc<dyn KvStore>) -> (DeliveryApp, Arc<RecordingNotifier>) {
    let notifier = Arc::new(RecordingNotifier::new());
    let app = DeliveryApp::new(settings, store, notifier.clone()).unwrap();
    (app, notifier)
}

fn register(app: &DeliveryApp, email: &str, phone: &str) -> UserProfile {
    app.users
        .create(NewUser {
            name: "Ana Silva".into(),
            email: email.into(),
            phone: phone.into(),
            password: "Secret123".into(),
            img: None,
        })
        .unwrap()
}

fn address(user: &UserId) -> Location {
    Location {
        latitude: -23.5614,
        longitude: -46.6559,
        address: "Av. Paulista, 1000".into(),
        city: "São Paulo".into(),
        state: "SP".into(),
        zip_code: "01310-100".into(),
        complement: "Apto 12".into(),
        reference: String::new(),
        user_id: user.clone(),
    }
}

fn fill_cart(app: &DeliveryApp, user: &UserId) {
    app.cart
        .add_item(user, CartItem::new("52772", "A", Decimal::new(10, 0), 2))
        .unwrap();
    app.cart
        .add_item(user, CartItem::new("52773", "B", Decimal::new(5, 0), 1))
        .unwrap();
}

fn card_request(app: &DeliveryApp, user: &UserId) -> CheckoutRequest {
    let card = app
        .cards
        .save(
            user,
            NewCard {
                number: "4111 1111 1111 1111".into(),
                holder: "Ana Silva".into(),
                cvv: "123".into(),
                expiry: "12/99".into(),
                is_default: true,
            },
        )
        .unwrap();
    CheckoutRequest {
        user_id: user.clone(),
        address: address(user),
        payment_method: PaymentMethod::Card,
        card_id: Some(card.id),
        coupon_code: None,
        notes: None,
    }
}

#[tokio::test]
async fn test_checkout_with_coupon() {
    let mut settings = make_test_settings();
    only_coupon(&mut settings, "SAVE10");
    let (app, notifier) = make_app(settings, Arc::new(MemoryStore::new()));
    let user = register(&app, "ana@example.com", "11999990000").id;

    let coupon = app.coupons.distribute_random(&user).await.unwrap().unwrap();
    assert_eq!(coupon.code, "SAVE10");

    fill_cart(&app, &user);
    let cart = app.cart.get(&user).unwrap();
    assert_eq!(cart.subtotal, Decimal::new(25, 0));
    assert_eq!(cart.total, Decimal::new(28, 0));

    let applied = app.checkout.apply_coupon(&user, "SAVE10").unwrap();
    assert!(applied.success);
    assert_eq!(applied.discount, Decimal::new(250, 2));
    assert_eq!(app.cart.get(&user).unwrap().total, Decimal::new(2550, 2));

    // Attached to the cart but not redeemed yet
    assert!(!app.coupons.user_coupons(&user).unwrap()[0].is_used);
    let twice = app.checkout.apply_coupon(&user, "SAVE10").unwrap();
    assert!(!twice.success);

    let request = card_request(&app, &user);
    let order = app.checkout.place_order(request).await.unwrap();

    assert_eq!(order.subtotal, Decimal::new(25, 0));
    assert_eq!(order.delivery_fee, Decimal::new(3, 0));
    assert_eq!(order.discount, Decimal::new(250, 2));
    assert_eq!(order.total, Decimal::new(2550, 2));
    assert_eq!(order.applied_coupon.as_deref(), Some("SAVE10"));
    assert_eq!(order.status, OrderStatus::Pending);

    // Second redemption never discounts again
    let again = app.coupons.apply(&user, "SAVE10", Decimal::new(25, 0)).unwrap();
    assert!(!again.success);
    assert!(order.estimated_delivery.is_some());

    let stored = app.orders.get(&order.id).unwrap();
    assert_eq!(stored.items, order.items);
    assert_eq!(stored.total, order.total);
    assert!(app.cart.get(&user).unwrap().is_empty());

    let profile = app.users.get(&user).unwrap();
    assert_eq!(profile.chosen_location.unwrap().address, "Av. Paulista, 1000");
    assert_eq!(profile.chosen_card.unwrap().id, order.card_id.unwrap());

    assert_eq!(app.tracker.active(), vec![order.id.clone()]);
    tokio::time::sleep(Duration::from_millis(400)).await;

    assert_eq!(app.orders.get(&order.id).unwrap().status, OrderStatus::OutForDelivery);
    assert_eq!(
        notifier.delivered_kinds(),
        vec![
            NotificationKind::Coupon,
            NotificationKind::OrderReady,
            NotificationKind::Delivery
        ]
    );
    assert_eq!(app.notifications.unread_count().unwrap(), 3);

    app.tracker.complete(&order.id).await.unwrap();
    assert_eq!(app.orders.get(&order.id).unwrap().status, OrderStatus::Delivered);
    assert!(app.orders.cancel(&order.id, &user).is_err());
}

#[tokio::test]
async fn test_coupon_code_at_checkout() {
    let mut settings = make_test_settings();
    only_coupon(&mut settings, "MEGA15");
    let (app, _) = make_app(settings, Arc::new(MemoryStore::new()));
    let user = register(&app, "ana@example.com", "11999990000").id;
    app.coupons.distribute_random(&user).await.unwrap().unwrap();

    // Below the 30 minimum: rejected and nothing is written
    fill_cart(&app, &user);
    let mut request = card_request(&app, &user);
    request.coupon_code = Some("mega15".into());
    let err = app.checkout.place_order(request.clone()).await.unwrap_err();
    assert!(matches!(err, DeliveryError::CouponRejected(_)));
    assert!(app.orders.for_user(&user).unwrap().is_empty());
    assert!(!app.cart.get(&user).unwrap().is_empty());

    app.cart
        .add_item(&user, CartItem::new("52774", "C", Decimal::new(15, 0), 1))
        .unwrap();
    let order = app.checkout.place_order(request).await.unwrap();
    assert_eq!(order.subtotal, Decimal::new(40, 0));
    assert_eq!(order.discount, Decimal::new(600, 2));
    assert_eq!(order.total, Decimal::new(3700, 2));
    assert_eq!(order.applied_coupon.as_deref(), Some("MEGA15"));
}

fn cash_request(user: &UserId) -> CheckoutRequest {
    CheckoutRequest {
        user_id: user.clone(),
        address: address(user),
        payment_method: PaymentMethod::Cash,
        card_id: None,
        coupon_code: None,
        notes: None,
    }
}

#[tokio::test]
async fn test_cart_coupon_follows_subtotal() {
    let mut settings = make_test_settings();
    only_coupon(&mut settings, "MEGA15");
    let (app, _) = make_app(settings, Arc::new(MemoryStore::new()));
    let user = register(&app, "ana@example.com", "111").id;
    app.coupons.distribute_random(&user).await.unwrap().unwrap();

    app.cart
        .add_item(&user, CartItem::new("a", "A", Decimal::new(25, 0), 1))
        .unwrap();
    app.cart
        .add_item(&user, CartItem::new("b", "B", Decimal::new(5, 0), 1))
        .unwrap();
    let applied = app.checkout.apply_coupon(&user, "MEGA15").unwrap();
    assert!(applied.success);
    assert_eq!(applied.discount, Decimal::new(450, 2));

    // Dropping below the 30 minimum takes the coupon off the cart
    let cart = app.cart.remove_item(&user, &ProductId::new("a")).unwrap();
    assert!(cart.coupon.is_none());
    assert_eq!(cart.discount, Decimal::ZERO);
    assert_eq!(cart.total, Decimal::new(8, 0));

    let order = app.checkout.place_order(cash_request(&user)).await.unwrap();
    assert_eq!(order.discount, Decimal::ZERO);
    assert_eq!(order.total, Decimal::new(8, 0));
    assert!(order.applied_coupon.is_none());
    app.tracker.clear_all();

    let coupons = app.coupons.user_coupons(&user).unwrap();
    assert_eq!(coupons.len(), 1);
    assert!(!coupons[0].is_used);
}

#[tokio::test]
async fn test_abandoned_cart_coupon_stays_usable() {
    let mut settings = make_test_settings();
    only_coupon(&mut settings, "SAVE10");
    let (app, _) = make_app(settings, Arc::new(MemoryStore::new()));
    let user = register(&app, "ana@example.com", "111").id;
    app.coupons.distribute_random(&user).await.unwrap().unwrap();

    fill_cart(&app, &user);
    assert!(app.checkout.apply_coupon(&user, "SAVE10").unwrap().success);
    app.cart.remove_coupon(&user).unwrap();
    assert!(app.checkout.apply_coupon(&user, "SAVE10").unwrap().success);
    app.cart.clear(&user).unwrap();

    assert!(!app.coupons.user_coupons(&user).unwrap()[0].is_used);
    let redeemed = app.coupons.apply(&user, "SAVE10", Decimal::new(25, 0)).unwrap();
    assert!(redeemed.success);
}

/// Memory store whose order list cannot be written
struct OrdersUnwritable(MemoryStore);

impl KvStore for OrdersUnwritable {
    fn get(&self, key: &str) -> StoreResult<Option<String>> {
        self.0.get(key)
    }

    fn set(&self, key: &str, value: &str) -> StoreResult<()> {
        self.0.set(key, value)
    }

    fn remove(&self, key: &str) -> StoreResult<()> {
        self.0.remove(key)
    }

    fn keys(&self) -> StoreResult<Vec<String>> {
        self.0.keys()
    }

    fn update(&self, key: &str, f: &mut UpdateFn<'_>) -> StoreResult<()> {
        if key == keys::ORDERS {
            return Err(StoreError::Database("disk full".into()));
        }
        self.0.update(key, f)
    }

    fn is_healthy(&self) -> bool {
        true
    }
}

#[tokio::test]
async fn test_failed_order_releases_coupon() {
    let mut settings = make_test_settings();
    only_coupon(&mut settings, "SAVE10");
    let (app, _) = make_app(settings, Arc::new(OrdersUnwritable(MemoryStore::new())));
    let user = register(&app, "ana@example.com", "111").id;
    app.coupons.distribute_random(&user).await.unwrap().unwrap();

    fill_cart(&app, &user);
    assert!(app.checkout.apply_coupon(&user, "SAVE10").unwrap().success);

    let err = app.checkout.place_order(cash_request(&user)).await.unwrap_err();
    assert!(matches!(err, DeliveryError::StoreError(_)));

    // Cart and coupon are as they were before the attempt
    let cart = app.cart.get(&user).unwrap();
    assert_eq!(cart.coupon.as_ref().map(|c| c.code.as_str()), Some("SAVE10"));
    assert_eq!(cart.total, Decimal::new(2550, 2));
    assert!(!app.coupons.user_coupons(&user).unwrap()[0].is_used);
}

#[tokio::test]
async fn test_checkout_rejections() {
    let (app, _) = make_app(make_test_settings(), Arc::new(MemoryStore::new()));
    let ana = register(&app, "ana@example.com", "111").id;
    let bob = register(&app, "bob@example.com", "222").id;

    let request = card_request(&app, &ana);
    let err = app.checkout.place_order(request.clone()).await.unwrap_err();
    assert!(matches!(err, DeliveryError::EmptyCart));

    // Bob cannot pay with Ana's card
    fill_cart(&app, &bob);
    let stolen = CheckoutRequest {
        user_id: bob.clone(),
        address: address(&bob),
        ..request
    };
    let err = app.checkout.place_order(stolen.clone()).await.unwrap_err();
    assert!(matches!(err, DeliveryError::NotFound(_)));

    let no_card = CheckoutRequest {
        card_id: None,
        ..stolen.clone()
    };
    assert!(app.checkout.place_order(no_card).await.is_err());

    let cash = CheckoutRequest {
        payment_method: PaymentMethod::Cash,
        card_id: None,
        ..stolen
    };
    let order = app.checkout.place_order(cash).await.unwrap();
    assert_eq!(order.total, Decimal::new(28, 0));
    assert!(order.card_id.is_none());

    app.tracker.clear_all();
}

#[tokio::test]
async fn test_reward_coupon_after_checkout() {
    let mut settings = make_test_settings();
    settings.coupons.reward_probability = 1.0;
    let (app, notifier) = make_app(settings, Arc::new(MemoryStore::new()));
    let user = register(&app, "ana@example.com", "111").id;

    fill_cart(&app, &user);
    let request = CheckoutRequest {
        payment_method: PaymentMethod::Pix,
        card_id: None,
        ..card_request(&app, &user)
    };
    app.checkout.place_order(request).await.unwrap();
    app.tracker.clear_all();

    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(app.coupons.user_coupons(&user).unwrap().len(), 1);
    assert_eq!(notifier.delivered_kinds(), vec![NotificationKind::Coupon]);
    let distributed: u32 = app
        .coupons
        .stats()
        .unwrap()
        .iter()
        .map(|s| s.distributed)
        .sum();
    assert_eq!(distributed, 1);
}

#[test]
fn test_duplicate_registration() {
    let (app, _) = make_app(make_test_settings(), Arc::new(MemoryStore::new()));
    register(&app, "ana@example.com", "111");

    let dup = app.users.create(NewUser {
        name: "Other".into(),
        email: "ANA@example.com".into(),
        phone: "999".into(),
        password: "Secret123".into(),
        img: None,
    });
    assert!(matches!(dup, Err(DeliveryError::EmailTaken)));

    let session = app.sessions.login("111", "Secret123", false).unwrap().unwrap();
    assert_eq!(session.user.email, "ana@example.com");
}

#[tokio::test]
async fn test_orders_survive_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("delivery.db");

    let order_id = {
        let store = Arc::new(SqliteStore::open(&path).unwrap());
        let (app, _) = make_app(make_test_settings(), store);
        let user = register(&app, "ana@example.com", "111").id;
        fill_cart(&app, &user);
        let request = card_request(&app, &user);
        let order = app.checkout.place_order(request).await.unwrap();
        app.tracker.clear_all();
        order.id
    };

    let store = Arc::new(SqliteStore::open(&path).unwrap());
    let (app, _) = make_app(make_test_settings(), store);
    let order = app.orders.get(&order_id).unwrap();
    assert_eq!(order.items.len(), 2);
    assert_eq!(order.total, Decimal::new(28, 0));
    // Timers do not survive a restart
    assert!(app.tracker.active().is_empty());
    assert_eq!(app.coupons.stats().unwrap().len(), 5);
}
