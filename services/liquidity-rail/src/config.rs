use config::{ConfigError, Environment, File};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::env;

pub const MAX_QUOTE_TTL_SECONDS: i64 = 86_400;

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub quote: QuoteConfig,
    pub rates: RatesConfig,
    pub webhook: WebhookConfig,
    pub auth: AuthConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub workers: usize,
}

/// Quote lifecycle settings, including the confirmation policy.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct QuoteConfig {
    pub ttl_seconds: i64,
    /// Upper bound of the relative rate drift applied on refresh (0.01 = 1%).
    pub max_rate_drift: Decimal,
    /// Provider id recorded on transactions confirmed without a company id.
    pub default_provider_id: String,
    /// Refuse to confirm a quote whose expiry has passed.
    pub reject_expired: bool,
    /// Allow at most one transaction per quote.
    pub single_use: bool,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct RatesConfig {
    pub fee_ratio: Decimal,
    pub asset_rates: HashMap<String, Decimal>,
    pub currency_rates: HashMap<String, Decimal>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct WebhookConfig {
    pub webhook_url: String,
    pub auth_url: String,
    pub secret_key: String,
    pub api_key: String,
    pub timeout_seconds: u64,
    pub token_margin_seconds: i64,
}

impl WebhookConfig {
    pub fn is_configured(&self) -> bool {
        !self.webhook_url.is_empty() && !self.auth_url.is_empty()
    }
}

/// Inbound API credentials. Empty values disable enforcement.
#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct AuthConfig {
    pub api_key: String,
    pub api_secret: String,
}

impl AuthConfig {
    pub fn is_enforced(&self) -> bool {
        !self.api_key.is_empty() || !self.api_secret.is_empty()
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LoggingConfig {
    pub level: String,
    pub json: bool,
}

impl Default for QuoteConfig {
    fn default() -> Self {
        Self {
            ttl_seconds: 300,
            max_rate_drift: Decimal::new(1, 2),
            default_provider_id: "1".to_string(),
            reject_expired: false,
            single_use: false,
        }
    }
}

impl Default for RatesConfig {
    fn default() -> Self {
        let asset_rates = [("USDT", 1), ("USDC", 1), ("CUSD", 1)]
            .into_iter()
            .map(|(code, rate)| (code.to_string(), Decimal::from(rate)))
            .collect();

        let currency_rates = [
            ("ZAR", Decimal::new(155, 1)),
            ("UGX", Decimal::new(355762, 2)),
            ("NGN", Decimal::new(1500, 0)),
        ]
        .into_iter()
        .map(|(code, rate)| (code.to_string(), rate))
        .collect();

        Self {
            fee_ratio: Decimal::new(5, 3),
            asset_rates,
            currency_rates,
        }
    }
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self {
            webhook_url: String::new(),
            auth_url: String::new(),
            secret_key: String::new(),
            api_key: String::new(),
            timeout_seconds: 10,
            token_margin_seconds: 300,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        let environment = env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string());
        let quote = QuoteConfig::default();
        let rates = RatesConfig::default();
        let webhook = WebhookConfig::default();

        let mut builder = config::Config::builder()
            // Start with default configuration
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 3000)?
            .set_default("server.workers", 4)?
            .set_default("quote.ttl_seconds", quote.ttl_seconds)?
            .set_default("quote.max_rate_drift", quote.max_rate_drift.to_string())?
            .set_default("quote.default_provider_id", quote.default_provider_id)?
            .set_default("quote.reject_expired", quote.reject_expired)?
            .set_default("quote.single_use", quote.single_use)?
            .set_default("rates.fee_ratio", rates.fee_ratio.to_string())?
            .set_default("webhook.webhook_url", "")?
            .set_default("webhook.auth_url", "")?
            .set_default("webhook.secret_key", "")?
            .set_default("webhook.api_key", "")?
            .set_default("webhook.timeout_seconds", webhook.timeout_seconds)?
            .set_default("webhook.token_margin_seconds", webhook.token_margin_seconds)?
            .set_default("auth.api_key", "")?
            .set_default("auth.api_secret", "")?
            .set_default("logging.level", "info")?
            .set_default("logging.json", false)?;

        for (code, rate) in &rates.asset_rates {
            builder = builder.set_default(format!("rates.asset_rates.{}", code), rate.to_string())?;
        }
        for (code, rate) in &rates.currency_rates {
            builder =
                builder.set_default(format!("rates.currency_rates.{}", code), rate.to_string())?;
        }

        // Add environment-specific config file if it exists
        if let Ok(config_file) = env::var("CONFIG_FILE") {
            builder = builder.add_source(File::with_name(&config_file).required(false));
        } else {
            builder = builder.add_source(
                File::with_name(&format!("config/{}", environment)).required(false),
            );
        }

        // Override with environment variables
        builder = builder.add_source(
            Environment::with_prefix("LIQUIDITY_RAIL")
                .separator("__")
                .try_parsing(true),
        );

        // Plain variables used by existing deployments
        if let Ok(port) = env::var("PORT") {
            builder = builder.set_override("server.port", port)?;
        }

        if let Ok(url) = env::var("MUDA_WEBHOOK_URL") {
            builder = builder.set_override("webhook.webhook_url", url)?;
        }

        if let Ok(url) = env::var("MUDA_AUTH_URL") {
            builder = builder.set_override("webhook.auth_url", url)?;
        }

        if let Ok(secret) = env::var("MUDA_SECRET_KEY") {
            builder = builder.set_override("webhook.secret_key", secret)?;
        }

        if let Ok(key) = env::var("MUDA_API_KEY") {
            builder = builder.set_override("webhook.api_key", key)?;
        }

        builder.build()?.try_deserialize()
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.server.port == 0 {
            return Err("Server port cannot be 0".to_string());
        }

        if self.server.workers == 0 {
            return Err("At least one server worker is required".to_string());
        }

        if self.quote.ttl_seconds <= 0 || self.quote.ttl_seconds > MAX_QUOTE_TTL_SECONDS {
            return Err(format!(
                "Quote TTL must be between 1 and {} seconds",
                MAX_QUOTE_TTL_SECONDS
            ));
        }

        if self.quote.max_rate_drift < Decimal::ZERO || self.quote.max_rate_drift >= Decimal::ONE {
            return Err("Rate drift must be within [0, 1)".to_string());
        }

        if self.rates.fee_ratio < Decimal::ZERO {
            return Err("Fee ratio cannot be negative".to_string());
        }

        if let Some((code, _)) = self
            .rates
            .asset_rates
            .iter()
            .chain(self.rates.currency_rates.iter())
            .find(|(_, rate)| **rate <= Decimal::ZERO)
        {
            return Err(format!("Rate for {} must be positive", code));
        }

        if self.webhook.is_configured()
            && (self.webhook.secret_key.is_empty() || self.webhook.api_key.is_empty())
        {
            return Err("Webhook credentials are required when webhook URLs are set".to_string());
        }

        if self.webhook.timeout_seconds == 0 {
            return Err("Webhook timeout cannot be 0".to_string());
        }

        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 3000,
                workers: 4,
            },
            quote: QuoteConfig::default(),
            rates: RatesConfig::default(),
            webhook: WebhookConfig::default(),
            auth: AuthConfig::default(),
            logging: LoggingConfig {
                level: "info".to_string(),
                json: false,
            },
        }
    }
}
