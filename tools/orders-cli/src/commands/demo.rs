//! Sample order lifecycle against an in-memory engine.

use std::sync::Arc;

use anyhow::{Context as _, Result};
use chrono::{Duration, Utc};
use turbo_orders::payment::sign;
use turbo_orders::prelude::*;

use super::DemoArgs;
use crate::context::Context;
use crate::output::status_badge;

const TOTAL_STEPS: usize = 4;

/// Run the demo command.
pub async fn run(args: DemoArgs, ctx: &Context) -> Result<()> {
    let mut config = ctx.config.clone();
    if config.gateway.key_secret.is_empty() {
        ctx.output
            .warn("gateway.key_secret not set, using a throwaway demo secret");
        config.gateway.key_secret = "demo-secret".to_string();
    }
    let secret = config.gateway.key_secret.clone();
    let currency = config.currency;

    let gateway = Arc::new(MockGateway::new(config.gateway.key_id.clone()));
    let engine = OrderEngine::new(config, gateway);
    let admin = Actor::admin("demo-admin");
    let user = UserId::new("demo-customer");
    let product_id = ProductId::new("prod_mug");

    ctx.output.header("Order lifecycle demo");

    ctx.output.step(1, TOTAL_STEPS, "Seeding catalog and coupon");
    engine.register_product(
        Product::new(product_id.clone(), "Ceramic Mug", Money::major(100, currency)),
        5,
    )?;
    let code = format!("DEMO{}", args.discount);
    engine.create_coupon(
        &admin,
        Coupon::percentage(
            &code,
            args.discount,
            Money::zero(currency),
            Utc::now() + Duration::days(30),
        ),
    )?;
    let address_id = engine.add_address(
        &user,
        Address::new(
            user.clone(),
            "Demo Customer",
            "221 MG Road",
            "Bengaluru",
            "KA",
            "560001",
            "IN",
        ),
    )?;
    ctx.output
        .debug(&format!("stock on hand: {}", engine.stock().available(&product_id)));

    ctx.output.step(2, TOTAL_STEPS, "Cash on delivery with a coupon");
    engine.add_to_cart(&user, &product_id, 2)?;
    engine.create_checkout(&user)?;
    engine.set_address(&user, &address_id)?;
    let session = engine.apply_coupon(&user, &code)?;
    ctx.output.kv("subtotal", &session.subtotal.display());
    ctx.output.kv("discount", &session.discount.display());
    let cod_order = engine.place_order_cod(&user)?;
    print_order(ctx, &cod_order);

    ctx.output.step(3, TOTAL_STEPS, "Gateway payment");
    engine.add_to_cart(&user, &product_id, 1)?;
    engine.create_checkout(&user)?;
    engine.set_address(&user, &address_id)?;

    let spinner = ctx.output.spinner("Creating payment intent...");
    let checkout = engine.place_order_gateway(&user).await;
    spinner.finish_and_clear();
    let checkout = checkout.context("gateway checkout failed")?;
    ctx.output.kv("gateway_order_id", &checkout.gateway_order_id);
    ctx.output.debug(&format!(
        "available while reserved: {}",
        engine.stock().available(&product_id)
    ));

    let gateway_payment_id = "pay_demo_0001";
    let mut signature = sign(&secret, &checkout.gateway_order_id, gateway_payment_id)?;
    if args.tamper {
        signature = signature.chars().rev().collect();
    }
    let callback = PaymentVerification {
        gateway_order_id: checkout.gateway_order_id.clone(),
        gateway_payment_id: gateway_payment_id.to_string(),
        signature,
    };

    let gateway_order = match engine.verify_payment(&callback) {
        Ok(order) => order,
        Err(e) => {
            ctx.output.warn(&format!("verification failed: {}", e));
            engine.order(&admin, &checkout.order_id)?
        }
    };
    print_order(ctx, &gateway_order);

    ctx.output.step(4, TOTAL_STEPS, "Summary");
    let orders = engine.orders_for_user(&user);
    ctx.output
        .kv("stock left", &engine.stock().available(&product_id).to_string());
    ctx.output.kv("orders", &orders.len().to_string());

    if ctx.output.is_json() {
        ctx.output.json(&orders);
    } else {
        ctx.output.success("Demo complete");
    }
    Ok(())
}

fn print_order(ctx: &Context, order: &Order) {
    ctx.output.kv("order", &order.order_number);
    ctx.output.kv("status", &status_badge(order.status.as_str()));
    ctx.output
        .kv("payment", &status_badge(order.payment_status.as_str()));
    ctx.output.kv("total", &order.final_amount.display());
}
