//! Application configuration management.
//!
//! This module handles loading configuration from environment variables.
//! It uses the `envy` crate to automatically deserialize environment variables
//! into a type-safe struct.

use serde::Deserialize;

use crate::models::withdrawal::FeePolicy;

/// Application configuration loaded from environment variables.
///
/// # Environment Variables
///
/// - `DATABASE_URL` (required): PostgreSQL connection string
/// - `SERVER_PORT` (optional): HTTP server port, defaults to 3000
/// - `GATEWAY_SECRET_KEY` (required): gateway API secret, also signs inbound webhooks
/// - `GATEWAY_BASE_URL` (optional): gateway API root, defaults to `https://api.paystack.co`
/// - `GATEWAY_TIMEOUT_SECS` (optional): per-call gateway timeout, defaults to 10
/// - `CURRENCY` (optional): ISO 4217 code, defaults to `KES`
/// - `PLATFORM_FEE_BPS` (optional): withdrawal fee rate in basis points, defaults to 50 (0.5%)
/// - `MINIMUM_FEE_MINOR` (optional): withdrawal fee floor in minor units, defaults to 1000 (KSh 10)
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub database_url: String,

    #[serde(default = "default_port")]
    pub server_port: u16,

    pub gateway_secret_key: String,

    #[serde(default = "default_gateway_base_url")]
    pub gateway_base_url: String,

    #[serde(default = "default_gateway_timeout_secs")]
    pub gateway_timeout_secs: u64,

    #[serde(default = "default_currency")]
    pub currency: String,

    #[serde(default = "default_platform_fee_bps")]
    pub platform_fee_bps: u32,

    #[serde(default = "default_minimum_fee_minor")]
    pub minimum_fee_minor: i64,
}

/// Default port if SERVER_PORT environment variable is not set.
fn default_port() -> u16 {
    3000
}

fn default_gateway_base_url() -> String {
    "https://api.paystack.co".to_string()
}

fn default_gateway_timeout_secs() -> u64 {
    10
}

fn default_currency() -> String {
    "KES".to_string()
}

fn default_platform_fee_bps() -> u32 {
    50
}

fn default_minimum_fee_minor() -> i64 {
    1000
}

/// Configuration values that parse but make no sense.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read environment: {0}")]
    Env(#[from] envy::Error),

    #[error("GATEWAY_BASE_URL is not a valid http(s) URL: {0}")]
    GatewayUrl(String),

    #[error("PLATFORM_FEE_BPS must be at most 10000, got {0}")]
    FeeRate(u32),

    #[error("MINIMUM_FEE_MINOR must not be negative, got {0}")]
    MinimumFee(i64),

    #[error("CURRENCY must be a 3-letter ISO 4217 code, got {0:?}")]
    Currency(String),
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// This method first attempts to load a `.env` file (which is optional),
    /// then reads environment variables and deserializes them into a Config struct.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Required environment variables are missing (e.g., DATABASE_URL)
    /// - Environment variable values cannot be parsed into expected types
    /// - A value is out of range (see [`Config::validate`])
    pub fn from_env() -> Result<Self, ConfigError> {
        // Try to load .env file if it exists (does nothing if not found)
        dotenvy::dotenv().ok();

        // Field names are automatically converted: database_url -> DATABASE_URL
        let config = envy::from_env::<Config>()?;
        config.validate()?;
        Ok(config)
    }

    /// Range checks that serde cannot express.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let parsed = url::Url::parse(&self.gateway_base_url)
            .map_err(|e| ConfigError::GatewayUrl(e.to_string()))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(ConfigError::GatewayUrl(format!(
                "unsupported scheme {}",
                parsed.scheme()
            )));
        }

        if self.platform_fee_bps > 10_000 {
            return Err(ConfigError::FeeRate(self.platform_fee_bps));
        }

        if self.minimum_fee_minor < 0 {
            return Err(ConfigError::MinimumFee(self.minimum_fee_minor));
        }

        if self.currency.len() != 3 || !self.currency.chars().all(|c| c.is_ascii_uppercase()) {
            return Err(ConfigError::Currency(self.currency.clone()));
        }

        Ok(())
    }

    /// The one fee policy every withdrawal is quoted against.
    pub fn fee_policy(&self) -> FeePolicy {
        FeePolicy {
            rate_bps: self.platform_fee_bps,
            minimum_fee_minor: self.minimum_fee_minor,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Config {
        Config {
            database_url: "postgres://localhost/settlement".to_string(),
            server_port: default_port(),
            gateway_secret_key: "sk_test_123".to_string(),
            gateway_base_url: default_gateway_base_url(),
            gateway_timeout_secs: default_gateway_timeout_secs(),
            currency: default_currency(),
            platform_fee_bps: default_platform_fee_bps(),
            minimum_fee_minor: default_minimum_fee_minor(),
        }
    }

    #[test]
    fn defaults_are_valid() {
        let config = sample();
        assert!(config.validate().is_ok());

        let policy = config.fee_policy();
        assert_eq!(policy.rate_bps, 50);
        assert_eq!(policy.minimum_fee_minor, 1000);
    }

    #[test]
    fn rejects_non_http_gateway_url() {
        let mut config = sample();
        config.gateway_base_url = "ftp://api.paystack.co".to_string();
        assert!(matches!(config.validate(), Err(ConfigError::GatewayUrl(_))));

        config.gateway_base_url = "not a url".to_string();
        assert!(matches!(config.validate(), Err(ConfigError::GatewayUrl(_))));
    }

    #[test]
    fn rejects_out_of_range_fees() {
        let mut config = sample();
        config.platform_fee_bps = 10_001;
        assert!(matches!(config.validate(), Err(ConfigError::FeeRate(10_001))));

        let mut config = sample();
        config.minimum_fee_minor = -1;
        assert!(matches!(config.validate(), Err(ConfigError::MinimumFee(-1))));
    }

    #[test]
    fn rejects_malformed_currency() {
        let mut config = sample();
        config.currency = "kes".to_string();
        assert!(matches!(config.validate(), Err(ConfigError::Currency(_))));
    }
}
