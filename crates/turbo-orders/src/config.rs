//! Engine configuration.

use anyhow::{bail, Context, Result};
use chrono::Duration;
use serde::{Deserialize, Serialize};

use crate::cart::CartLimits;
use crate::money::{Currency, Money};

/// Order engine configuration file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Currency used for every price and payment.
    #[serde(default)]
    pub currency: Currency,

    /// Largest order total accepted for cash on delivery, in minor units.
    #[serde(default = "default_cod_ceiling")]
    pub cod_ceiling: i64,

    /// Hours after creation during which a customer cancel is auto-approved.
    #[serde(default = "default_cancellation_window_hours")]
    pub cancellation_window_hours: i64,

    /// Days after delivery during which a return may be requested.
    #[serde(default = "default_return_window_days")]
    pub return_window_days: i64,

    /// Maximum quantity per cart line.
    #[serde(default = "default_max_quantity_per_line")]
    pub max_quantity_per_line: i64,

    /// Maximum number of lines in a cart.
    #[serde(default = "default_max_cart_lines")]
    pub max_cart_lines: usize,

    /// Payment gateway credentials.
    #[serde(default)]
    pub gateway: GatewayConfig,
}

fn default_cod_ceiling() -> i64 {
    100_000
}

fn default_cancellation_window_hours() -> i64 {
    24
}

fn default_return_window_days() -> i64 {
    7
}

fn default_max_quantity_per_line() -> i64 {
    10
}

fn default_max_cart_lines() -> usize {
    20
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            currency: Currency::default(),
            cod_ceiling: default_cod_ceiling(),
            cancellation_window_hours: default_cancellation_window_hours(),
            return_window_days: default_return_window_days(),
            max_quantity_per_line: default_max_quantity_per_line(),
            max_cart_lines: default_max_cart_lines(),
            gateway: GatewayConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Load config from a file.
    ///
    /// `.json` files are parsed as JSON, everything else as TOML.
    pub fn load(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path))?;

        let config: Self = if path.ends_with(".json") {
            serde_json::from_str(&content)
                .with_context(|| format!("Failed to parse JSON config: {}", path))?
        } else {
            toml::from_str(&content)
                .with_context(|| format!("Failed to parse TOML config: {}", path))?
        };

        config
            .validate()
            .with_context(|| format!("Invalid config: {}", path))?;
        Ok(config)
    }

    /// Parse config from an inline TOML document.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content).context("Failed to parse TOML config")?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings the engine cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.gateway.key_secret.is_empty() {
            bail!("gateway.key_secret must not be empty");
        }
        if self.cod_ceiling < 0 {
            bail!("cod_ceiling must not be negative");
        }
        if self.cancellation_window_hours < 0 || self.return_window_days < 0 {
            bail!("cancellation and return windows must not be negative");
        }
        if self.max_quantity_per_line <= 0 || self.max_cart_lines == 0 {
            bail!("cart limits must be positive");
        }
        Ok(())
    }

    pub fn cod_ceiling(&self) -> Money {
        Money::new(self.cod_ceiling, self.currency)
    }

    pub fn cancellation_window(&self) -> Duration {
        Duration::hours(self.cancellation_window_hours)
    }

    pub fn return_window(&self) -> Duration {
        Duration::days(self.return_window_days)
    }

    pub fn cart_limits(&self) -> CartLimits {
        CartLimits {
            max_quantity_per_line: self.max_quantity_per_line,
            max_lines: self.max_cart_lines,
        }
    }
}

/// Payment gateway credentials.
#[derive(Clone, Default, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// Public key identifier handed to clients with each intent.
    #[serde(default)]
    pub key_id: String,

    /// Shared secret used to verify callback signatures.
    #[serde(default)]
    pub key_secret: String,
}

impl GatewayConfig {
    pub fn new(key_id: impl Into<String>, key_secret: impl Into<String>) -> Self {
        Self {
            key_id: key_id.into(),
            key_secret: key_secret.into(),
        }
    }
}

impl std::fmt::Debug for GatewayConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatewayConfig")
            .field("key_id", &self.key_id)
            .field("key_secret", &"[REDACTED]")
            .finish()
    }
}

/// Generate a default config file.
pub fn generate_default_config() -> String {
    r#"# Order engine configuration

currency = "INR"

# Minor units (paise): 100000 = 1000.00
cod_ceiling = 100000

cancellation_window_hours = 24
return_window_days = 7

max_quantity_per_line = 10
max_cart_lines = 20

[gateway]
key_id = "rzp_test_key"
key_secret = "change-me"
"#
    .to_string()
}
