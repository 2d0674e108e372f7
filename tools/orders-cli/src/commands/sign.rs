//! Callback signing for manual gateway testing.

use anyhow::{bail, Result};
use turbo_orders::payment::sign;

use super::SignArgs;
use crate::context::Context;

/// Run the sign command.
pub async fn run(args: SignArgs, ctx: &Context) -> Result<()> {
    let secret = &ctx.config.gateway.key_secret;
    if secret.is_empty() {
        bail!("gateway.key_secret is not set");
    }

    let signature = sign(secret, &args.gateway_order_id, &args.gateway_payment_id)?;

    if ctx.output.is_json() {
        ctx.output.json(&serde_json::json!({
            "gateway_order_id": args.gateway_order_id,
            "gateway_payment_id": args.gateway_payment_id,
            "signature": signature,
        }));
    } else {
        println!("{}", signature);
    }
    Ok(())
}
