mod common;

use common::{rupees, Fixture};
use turbo_orders::coupon::CouponRemoval;
use turbo_orders::prelude::*;

#[test]
fn test_fulfillment_transitions() {
    let fx = Fixture::new();
    let order = fx.place_cod(1);

    let confirmed = fx.engine.confirm_order(&fx.admin, &order.id).unwrap();
    assert_eq!(confirmed.status, OrderStatus::Confirmed);
    assert!(matches!(
        fx.engine.confirm_order(&fx.admin, &order.id),
        Err(OrderError::InvalidTransition {
            from: OrderStatus::Confirmed,
            to: OrderStatus::Confirmed,
            ..
        })
    ));
    assert!(matches!(
        fx.engine.deliver_order(&fx.admin, &order.id),
        Err(OrderError::InvalidTransition { .. })
    ));

    let shipped = fx.engine.ship_order(&fx.admin, &order.id).unwrap();
    assert_eq!(shipped.delivery_status, DeliveryStatus::Shipped);
    assert_eq!(shipped.payment_status, PaymentStatus::Pending);

    let delivered = fx.engine.deliver_order(&fx.admin, &order.id).unwrap();
    assert_eq!(delivered.status, OrderStatus::Delivered);
    assert_eq!(delivered.payment_status, PaymentStatus::Paid);
    assert!(delivered.delivered_at.is_some());
}

#[tokio::test]
async fn test_unpaid_gateway_order_cannot_ship() {
    let fx = Fixture::new();
    let checkout = fx.place_gateway(1).await;

    assert!(matches!(
        fx.engine.ship_order(&fx.admin, &checkout.order_id),
        Err(OrderError::PaymentRequired(_))
    ));
    assert_eq!(fx.order(&checkout.order_id).status, OrderStatus::Pending);
}

#[test]
fn test_fulfillment_requires_admin() {
    let fx = Fixture::new();
    let order = fx.place_cod(1);
    let customer = Actor::customer(fx.user.clone());

    for result in [
        fx.engine.confirm_order(&customer, &order.id),
        fx.engine.ship_order(&customer, &order.id),
        fx.engine.deliver_order(&customer, &order.id),
    ] {
        assert!(matches!(result, Err(OrderError::Forbidden(_))));
    }
    assert_eq!(fx.order(&order.id).status, OrderStatus::Pending);
}

#[test]
fn test_order_visibility() {
    let fx = Fixture::new();
    let order = fx.place_cod(1);

    let own = fx
        .engine
        .order(&Actor::customer(fx.user.clone()), &order.id)
        .unwrap();
    assert_eq!(own.id, order.id);
    assert!(matches!(
        fx.engine.order(&Actor::customer("usr_other"), &order.id),
        Err(OrderError::OrderNotFound(_))
    ));
    assert!(fx.engine.order(&fx.admin, &order.id).is_ok());

    fx.clock.advance(chrono::Duration::minutes(5));
    let newer = fx.place_cod(1);
    let listed = fx.engine.orders_for_user(&fx.user);
    assert_eq!(listed.len(), 2);
    assert_eq!(listed[0].id, newer.id);
}

#[test]
fn test_cart_limits_and_stock() {
    let fx = Fixture::new();

    assert!(matches!(
        fx.engine.add_to_cart(&fx.user, &fx.lamp, 6),
        Err(OrderError::InsufficientStock { .. })
    ));
    assert!(matches!(
        fx.engine.add_to_cart(&fx.user, &ProductId::new("prod_ghost"), 1),
        Err(OrderError::ProductNotFound(_))
    ));
    assert!(matches!(
        fx.engine.add_to_cart(&fx.user, &fx.lamp, 0),
        Err(OrderError::InvalidQuantity(0))
    ));
    assert!(fx.engine.cart(&fx.user).is_empty());

    fx.engine.add_to_cart(&fx.user, &fx.lamp, 2).unwrap();
    let cart = fx.engine.update_cart_item(&fx.user, &fx.lamp, 4).unwrap();
    assert_eq!(cart.item_count(), 4);
    assert_eq!(cart.subtotal().unwrap(), rupees(400));

    let cart = fx.engine.remove_cart_item(&fx.user, &fx.lamp).unwrap();
    assert!(cart.is_empty());
    assert!(matches!(
        fx.engine.create_checkout(&fx.user),
        Err(OrderError::EmptyCart)
    ));
}

#[test]
fn test_cart_keeps_captured_price() {
    let fx = Fixture::new();
    fx.engine.add_to_cart(&fx.user, &fx.lamp, 1).unwrap();
    fx.engine
        .register_product(Product::new(fx.lamp.clone(), "Desk Lamp", rupees(120)), 5)
        .unwrap();

    let cart = fx.engine.add_to_cart(&fx.user, &fx.lamp, 1).unwrap();
    assert_eq!(cart.subtotal().unwrap(), rupees(200));
}

#[test]
fn test_address_must_belong_to_user() {
    let fx = Fixture::new();
    let other = UserId::new("usr_other");
    let other_address = Fixture::add_address(&fx.engine, &other);
    fx.engine.add_to_cart(&fx.user, &fx.lamp, 1).unwrap();
    fx.engine.create_checkout(&fx.user).unwrap();

    assert!(matches!(
        fx.engine.set_address(&fx.user, &other_address),
        Err(OrderError::AddressNotFound(_))
    ));

    let incomplete = Address::new(fx.user.clone(), "", "", "Pune", "MH", "411001", "IN");
    assert!(matches!(
        fx.engine.add_address(&fx.user, incomplete),
        Err(OrderError::InvalidAddress(_))
    ));
}

#[test]
fn test_new_checkout_supersedes_old() {
    let fx = Fixture::new();
    let first = fx.checkout(1);
    let second = fx.engine.create_checkout(&fx.user).unwrap();

    assert_ne!(first.id, second.id);
    assert_eq!(second.status, CheckoutStatus::Created);
    assert!(second.shipping_address_id.is_none());
    assert!(matches!(
        fx.engine.place_order_cod(&fx.user),
        Err(OrderError::AddressRequired(_))
    ));
}

#[test]
fn test_used_coupon_is_deactivated_not_deleted() {
    let fx = Fixture::new();
    fx.checkout(1);
    fx.engine.apply_coupon(&fx.user, "SAVE10").unwrap();
    fx.engine.place_order_cod(&fx.user).unwrap();

    assert_eq!(
        fx.engine.delete_coupon(&fx.admin, "SAVE10").unwrap(),
        CouponRemoval::Deactivated
    );
    assert!(fx.engine.active_coupons().is_empty());
    assert!(!fx.engine.coupon("SAVE10").unwrap().is_active);

    fx.checkout(1);
    assert!(matches!(
        fx.engine.apply_coupon(&fx.user, "SAVE10"),
        Err(OrderError::CouponInactive(_))
    ));
}

#[test]
fn test_once_per_user_coupon() {
    let fx = Fixture::new();
    fx.engine
        .create_coupon(
            &fx.admin,
            Coupon::percentage(
                "WELCOME",
                15,
                rupees(0),
                fx.clock.now() + chrono::Duration::days(1),
            )
            .once_per_user(),
        )
        .unwrap();

    fx.checkout(1);
    fx.engine.apply_coupon(&fx.user, "WELCOME").unwrap();
    fx.engine.place_order_cod(&fx.user).unwrap();

    fx.checkout(1);
    assert!(matches!(
        fx.engine.apply_coupon(&fx.user, "WELCOME"),
        Err(OrderError::CouponAlreadyUsed(_))
    ));
}

#[test]
fn test_minimum_order_coupon() {
    let fx = Fixture::new();
    fx.engine
        .create_coupon(
            &fx.admin,
            Coupon::percentage(
                "BIGSPEND",
                20,
                rupees(300),
                fx.clock.now() + chrono::Duration::days(1),
            ),
        )
        .unwrap();

    fx.checkout(2);
    assert!(matches!(
        fx.engine.apply_coupon(&fx.user, "BIGSPEND"),
        Err(OrderError::BelowMinimumOrder { .. })
    ));
    assert!(matches!(
        fx.engine.apply_coupon(&fx.user, "NOSUCH"),
        Err(OrderError::CouponNotFound(_))
    ));
}
