//! CLI command implementations.

pub mod config;
pub mod demo;
pub mod sign;

use clap::{Args, Subcommand};

/// Arguments for the config command.
#[derive(Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Subcommand)]
pub enum ConfigCommand {
    /// Show current configuration.
    Show,
    /// Initialize a new config file.
    Init {
        /// Force overwrite existing config.
        #[arg(short, long)]
        force: bool,
    },
    /// Validate the config file.
    Validate,
}

/// Arguments for the sign command.
#[derive(Args)]
pub struct SignArgs {
    /// Gateway order id (from the payment intent).
    pub gateway_order_id: String,

    /// Gateway payment id (from the client callback).
    pub gateway_payment_id: String,
}

/// Arguments for the demo command.
#[derive(Args)]
pub struct DemoArgs {
    /// Coupon percentage applied at checkout.
    #[arg(long, default_value = "10")]
    pub discount: u32,

    /// Send a tampered signature for the gateway payment.
    #[arg(long)]
    pub tamper: bool,
}
