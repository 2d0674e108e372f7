mod common;

use chrono::Duration;
use common::{rupees, Fixture};
use turbo_orders::prelude::*;

#[tokio::test]
async fn test_return_and_refund_to_wallet() {
    let fx = Fixture::new();
    fx.checkout(2);
    fx.engine.apply_coupon(&fx.user, "SAVE10").unwrap();
    let checkout = fx.engine.place_order_gateway(&fx.user).await.unwrap();
    let order = fx.engine.verify_payment(&fx.callback(&checkout)).unwrap();
    fx.engine.ship_order(&fx.admin, &order.id).unwrap();
    fx.engine.deliver_order(&fx.admin, &order.id).unwrap();
    fx.clock.advance(Duration::days(3));

    let request = fx
        .engine
        .initiate_return(&fx.user, &order.id, "arrived cracked")
        .unwrap();
    assert_eq!(request.status, ReturnStatus::Pending);
    assert_eq!(fx.order(&order.id).status, OrderStatus::ReturnRequested);

    let approved = fx
        .engine
        .decide_return(&fx.admin, &request.id, true)
        .unwrap();
    assert_eq!(approved.status, ReturnStatus::Approved);
    assert_eq!(fx.order(&order.id).status, OrderStatus::Returned);

    let refunded = fx.engine.initiate_refund(&fx.admin, &request.id).unwrap();
    assert_eq!(refunded.refund_status, RefundStatus::Completed);
    assert_eq!(refunded.refund_amount, Some(rupees(180)));
    assert_eq!(fx.engine.wallet_balance(&fx.user).unwrap(), rupees(180));
    assert_eq!(
        fx.order(&order.id).payment_status,
        PaymentStatus::Refunded
    );

    assert!(matches!(
        fx.engine.initiate_refund(&fx.admin, &request.id),
        Err(OrderError::RefundAlreadyInitiated(_))
    ));
    assert!(matches!(
        fx.engine.retry_refund(&fx.admin, &request.id),
        Err(OrderError::RefundNotRetriable(_))
    ));
    assert_eq!(fx.engine.wallet_balance(&fx.user).unwrap(), rupees(180));
    assert_eq!(fx.engine.wallet_transactions(&fx.user).len(), 1);

    let names = fx.notifier.names();
    assert_eq!(
        &names[names.len() - 2..],
        &["return_decided", "refund_completed"]
    );
}

#[tokio::test]
async fn test_interrupted_refund_is_retried_once() {
    let fx = Fixture::new();
    let order = fx.delivered_order(1).await;
    let request = fx
        .engine
        .initiate_return(&fx.user, &order.id, "flickers")
        .unwrap();
    fx.engine
        .decide_return(&fx.admin, &request.id, true)
        .unwrap();

    // Refund started but never finished.
    let started = fx
        .engine
        .returns()
        .begin_refund(&request.id, order.final_amount)
        .unwrap();
    assert_eq!(started.refund_status, RefundStatus::Initiated);
    assert_eq!(fx.engine.wallet_balance(&fx.user).unwrap(), rupees(0));

    assert!(matches!(
        fx.engine.initiate_refund(&fx.admin, &request.id),
        Err(OrderError::RefundAlreadyInitiated(_))
    ));
    assert!(matches!(
        fx.engine
            .retry_refund(&Actor::customer(fx.user.clone()), &request.id),
        Err(OrderError::Forbidden(_))
    ));

    let retried = fx.engine.retry_refund(&fx.admin, &request.id).unwrap();
    assert_eq!(retried.refund_status, RefundStatus::Completed);
    assert_eq!(fx.engine.wallet_balance(&fx.user).unwrap(), rupees(100));
    assert_eq!(
        fx.order(&order.id).payment_status,
        PaymentStatus::Refunded
    );

    assert!(matches!(
        fx.engine.retry_refund(&fx.admin, &request.id),
        Err(OrderError::RefundNotRetriable(_))
    ));
    assert_eq!(fx.engine.wallet_balance(&fx.user).unwrap(), rupees(100));
    assert_eq!(fx.engine.wallet_transactions(&fx.user).len(), 1);
}

#[tokio::test]
async fn test_returned_units_restocked_once() {
    let fx = Fixture::new();
    let order = fx.delivered_order(2).await;
    assert_eq!(fx.on_hand(), 3);

    let request = fx
        .engine
        .initiate_return(&fx.user, &order.id, "too dim")
        .unwrap();

    // Not approved yet.
    assert!(matches!(
        fx.engine.mark_returned_to_seller(&fx.admin, &request.id),
        Err(OrderError::ReturnNotApproved(_))
    ));

    fx.engine
        .decide_return(&fx.admin, &request.id, true)
        .unwrap();
    let restocked = fx
        .engine
        .mark_returned_to_seller(&fx.admin, &request.id)
        .unwrap();
    assert!(restocked.restocked);
    assert_eq!(fx.on_hand(), 5);

    assert!(matches!(
        fx.engine.mark_returned_to_seller(&fx.admin, &request.id),
        Err(OrderError::AlreadyRestocked(_))
    ));
    assert_eq!(fx.on_hand(), 5);
}

#[tokio::test]
async fn test_return_window_expired() {
    let fx = Fixture::new();
    let order = fx.delivered_order(1).await;
    fx.clock.advance(Duration::days(8));

    assert!(matches!(
        fx.engine.initiate_return(&fx.user, &order.id, "late"),
        Err(OrderError::ReturnWindowExpired(_))
    ));
    assert_eq!(fx.order(&order.id).status, OrderStatus::Delivered);
}

#[tokio::test]
async fn test_return_requires_delivery() {
    let fx = Fixture::new();
    let order = fx.paid_order(1).await;
    fx.engine.ship_order(&fx.admin, &order.id).unwrap();

    assert!(matches!(
        fx.engine.initiate_return(&fx.user, &order.id, "early"),
        Err(OrderError::ReturnNotAllowed {
            status: OrderStatus::Shipped,
            ..
        })
    ));
}

#[tokio::test]
async fn test_return_decided_once() {
    let fx = Fixture::new();
    let order = fx.delivered_order(1).await;
    let request = fx
        .engine
        .initiate_return(&fx.user, &order.id, "not as pictured")
        .unwrap();

    assert!(matches!(
        fx.engine.initiate_return(&fx.user, &order.id, "again"),
        Err(OrderError::ReturnAlreadyRequested(_))
    ));
    assert!(matches!(
        fx.engine
            .decide_return(&Actor::customer(fx.user.clone()), &request.id, true),
        Err(OrderError::Forbidden(_))
    ));

    let rejected = fx
        .engine
        .decide_return(&fx.admin, &request.id, false)
        .unwrap();
    assert_eq!(rejected.status, ReturnStatus::Rejected);
    assert_eq!(fx.order(&order.id).status, OrderStatus::Delivered);

    assert!(matches!(
        fx.engine.decide_return(&fx.admin, &request.id, true),
        Err(OrderError::AlreadyProcessed(_))
    ));
    assert!(matches!(
        fx.engine.initiate_refund(&fx.admin, &request.id),
        Err(OrderError::ReturnNotApproved(_))
    ));
    assert_eq!(fx.engine.wallet_balance(&fx.user).unwrap(), rupees(0));

    // A rejected request does not block a new one inside the window.
    let second = fx
        .engine
        .initiate_return(&fx.user, &order.id, "really not as pictured")
        .unwrap();
    assert_ne!(second.id, request.id);
}

#[test]
fn test_cod_order_refunds_after_delivery() {
    let fx = Fixture::new();
    let order = fx.place_cod(1);
    fx.engine.ship_order(&fx.admin, &order.id).unwrap();
    let delivered = fx.engine.deliver_order(&fx.admin, &order.id).unwrap();
    assert_eq!(delivered.payment_status, PaymentStatus::Paid);

    let request = fx
        .engine
        .initiate_return(&fx.user, &order.id, "duplicate gift")
        .unwrap();
    fx.engine
        .decide_return(&fx.admin, &request.id, true)
        .unwrap();
    fx.engine.initiate_refund(&fx.admin, &request.id).unwrap();

    assert_eq!(fx.engine.wallet_balance(&fx.user).unwrap(), rupees(100));
    let tx = &fx.engine.wallet_transactions(&fx.user)[0];
    assert_eq!(tx.reference, request.refund_reference());
}

#[tokio::test]
async fn test_return_of_someone_elses_order() {
    let fx = Fixture::new();
    let order = fx.delivered_order(1).await;

    assert!(matches!(
        fx.engine
            .initiate_return(&UserId::new("usr_mallory"), &order.id, "free lamp"),
        Err(OrderError::OrderNotFound(_))
    ));
    assert!(fx.engine.returns().for_order(&order.id).is_empty());
}
