//! Configuration management commands.

use std::fs;

use anyhow::{bail, Result};
use dialoguer::Confirm;
use turbo_orders::config::generate_default_config;

use super::{ConfigArgs, ConfigCommand};
use crate::context::Context;

/// Run the config command.
pub async fn run(args: ConfigArgs, ctx: &Context) -> Result<()> {
    match args.command {
        ConfigCommand::Show => show_config(ctx).await,
        ConfigCommand::Init { force } => init_config(force, ctx).await,
        ConfigCommand::Validate => validate_config(ctx).await,
    }
}

async fn show_config(ctx: &Context) -> Result<()> {
    if ctx.output.is_json() {
        let mut shown = ctx.config.clone();
        if !shown.gateway.key_secret.is_empty() {
            shown.gateway.key_secret = "********".to_string();
        }
        ctx.output.json(&shown);
        return Ok(());
    }

    ctx.output.header("Current Configuration");
    match &ctx.config_path {
        Some(path) => ctx.output.kv("file", &path.display().to_string()),
        None => ctx.output.kv("file", "(defaults)"),
    }

    let config = &ctx.config;
    ctx.output.info("");
    ctx.output.kv("currency", config.currency.code());
    ctx.output.kv("cod_ceiling", &config.cod_ceiling().display());
    ctx.output.kv(
        "cancellation_window_hours",
        &config.cancellation_window_hours.to_string(),
    );
    ctx.output
        .kv("return_window_days", &config.return_window_days.to_string());
    ctx.output.kv(
        "max_quantity_per_line",
        &config.max_quantity_per_line.to_string(),
    );
    ctx.output
        .kv("max_cart_lines", &config.max_cart_lines.to_string());

    ctx.output.info("");
    ctx.output.info("[gateway]");
    ctx.output.kv("key_id", &config.gateway.key_id);
    ctx.output.kv(
        "key_secret",
        if config.gateway.key_secret.is_empty() {
            "(not set)"
        } else {
            "********"
        },
    );

    Ok(())
}

async fn init_config(force: bool, ctx: &Context) -> Result<()> {
    let config_path = ctx.cwd.join("orders.toml");

    if config_path.exists() && !force {
        let overwrite = Confirm::new()
            .with_prompt(format!("{} exists. Overwrite?", config_path.display()))
            .default(false)
            .interact()?;
        if !overwrite {
            ctx.output.warn("Config left unchanged");
            return Ok(());
        }
    }

    fs::write(&config_path, generate_default_config())?;
    ctx.output
        .success(&format!("Created: {}", config_path.display()));
    ctx.output
        .info("Replace gateway.key_secret before taking real payments");

    Ok(())
}

async fn validate_config(ctx: &Context) -> Result<()> {
    ctx.output.header("Validating configuration");

    let Some(path) = &ctx.config_path else {
        bail!("No config file found. Run `orders config init` first.");
    };
    ctx.output.debug(&format!("Checking {}", path.display()));

    ctx.config.validate()?;
    if ctx.config.gateway.key_secret == "change-me" {
        ctx.output.warn("gateway.key_secret is still the placeholder value");
    }
    if ctx.config.cod_ceiling == 0 {
        ctx.output.warn("cod_ceiling is 0: cash on delivery is disabled");
    }

    ctx.output.success("Configuration is valid");
    Ok(())
}
