//! Shared fixtures for the engine integration tests.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use chrono::{DateTime, Duration, TimeZone, Utc};
use turbo_orders::config::GatewayConfig;
use turbo_orders::payment::sign;
use turbo_orders::prelude::*;

pub const SECRET: &str = "whsec_integration";
pub const KEY_ID: &str = "rzp_test_key";

/// Clock the tests move by hand.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap();
        *now = *now + by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap()
    }
}

/// Notifier that keeps every event.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    events: Mutex<Vec<Notification>>,
}

impl RecordingNotifier {
    pub fn events(&self) -> Vec<Notification> {
        self.events.lock().unwrap().clone()
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.events().iter().map(Notification::name).collect()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, notification: Notification) {
        self.events.lock().unwrap().push(notification);
    }
}

pub fn rupees(units: i64) -> Money {
    Money::major(units, Currency::INR)
}

pub fn test_config() -> EngineConfig {
    EngineConfig {
        gateway: GatewayConfig::new(KEY_ID, SECRET),
        ..EngineConfig::default()
    }
}

/// An engine with one lamp (₹100, 5 in stock), one customer with an
/// address, and a 10% `SAVE10` coupon.
pub struct Fixture {
    pub engine: OrderEngine,
    pub clock: Arc<ManualClock>,
    pub gateway: Arc<MockGateway>,
    pub notifier: Arc<RecordingNotifier>,
    pub admin: Actor,
    pub user: UserId,
    pub address: AddressId,
    pub lamp: ProductId,
}

impl Fixture {
    pub fn new() -> Self {
        Self::with_config(test_config())
    }

    pub fn with_config(config: EngineConfig) -> Self {
        let start = Utc.with_ymd_and_hms(2025, 3, 1, 10, 0, 0).unwrap();
        let clock = Arc::new(ManualClock::new(start));
        let gateway = Arc::new(MockGateway::new(KEY_ID));
        let notifier = Arc::new(RecordingNotifier::default());

        let engine = OrderEngine::new(config, gateway.clone())
            .with_clock(clock.clone())
            .with_notifier(notifier.clone());

        let admin = Actor::admin("admin");
        let lamp = ProductId::new("prod_lamp");
        engine
            .register_product(Product::new(lamp.clone(), "Desk Lamp", rupees(100)), 5)
            .unwrap();
        engine
            .create_coupon(
                &admin,
                Coupon::percentage("SAVE10", 10, rupees(0), start + Duration::days(30)),
            )
            .unwrap();

        let user = UserId::new("usr_asha");
        let address = Self::add_address(&engine, &user);

        Self {
            engine,
            clock,
            gateway,
            notifier,
            admin,
            user,
            address,
            lamp,
        }
    }

    pub fn add_address(engine: &OrderEngine, user: &UserId) -> AddressId {
        engine
            .add_address(
                user,
                Address::new(
                    user.clone(),
                    "Asha Rao",
                    "12 Residency Road",
                    "Bengaluru",
                    "KA",
                    "560025",
                    "IN",
                ),
            )
            .unwrap()
    }

    /// Cart `quantity` lamps and open a checkout with the address set.
    pub fn checkout(&self, quantity: i64) -> CheckoutSession {
        self.engine
            .add_to_cart(&self.user, &self.lamp, quantity)
            .unwrap();
        self.engine.create_checkout(&self.user).unwrap();
        self.engine.set_address(&self.user, &self.address).unwrap()
    }

    pub fn place_cod(&self, quantity: i64) -> Order {
        self.checkout(quantity);
        self.engine.place_order_cod(&self.user).unwrap()
    }

    pub async fn place_gateway(&self, quantity: i64) -> GatewayCheckout {
        self.checkout(quantity);
        self.engine.place_order_gateway(&self.user).await.unwrap()
    }

    /// A correctly signed callback for `checkout`.
    pub fn callback(&self, checkout: &GatewayCheckout) -> PaymentVerification {
        let payment_id = format!("pay_{}", checkout.order_id);
        PaymentVerification {
            gateway_order_id: checkout.gateway_order_id.clone(),
            signature: sign(SECRET, &checkout.gateway_order_id, &payment_id).unwrap(),
            gateway_payment_id: payment_id,
        }
    }

    /// A paid gateway order.
    pub async fn paid_order(&self, quantity: i64) -> Order {
        let checkout = self.place_gateway(quantity).await;
        self.engine.verify_payment(&self.callback(&checkout)).unwrap()
    }

    /// A paid gateway order that has been shipped and delivered.
    pub async fn delivered_order(&self, quantity: i64) -> Order {
        let order = self.paid_order(quantity).await;
        self.engine.ship_order(&self.admin, &order.id).unwrap();
        self.engine.deliver_order(&self.admin, &order.id).unwrap()
    }

    pub fn available(&self) -> i64 {
        self.engine.stock().available(&self.lamp)
    }

    pub fn on_hand(&self) -> i64 {
        self.engine.stock().level(&self.lamp).on_hand
    }

    pub fn order(&self, id: &OrderId) -> Order {
        self.engine.order(&self.admin, id).unwrap()
    }
}
