//! Configuration management for the Broiler Cycle Ledger
//!
//! Supports hierarchical configuration loading:
//! 1. Default values in code
//! 2. Configuration files (development.toml, production.toml)
//! 3. Environment variable overrides with BCL_ prefix

use config::{ConfigError, Environment, File};
use rust_decimal::Decimal;
use serde::Deserialize;
use shared::PricingPolicy;

/// Main application configuration
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    /// Current environment (development, production)
    pub environment: String,

    /// Server configuration
    pub server: ServerConfig,

    /// Database configuration
    pub database: DatabaseConfig,

    /// JWT authentication configuration
    pub jwt: JwtConfig,

    /// Manager notification configuration
    pub notification: NotificationConfig,

    /// Settlement prices used by the metrics calculator
    pub pricing: PricingConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    /// Server port
    pub port: u16,

    /// Server host
    pub host: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    /// PostgreSQL connection URL
    pub url: String,

    /// Maximum number of connections in the pool
    pub max_connections: u32,

    /// Minimum number of connections in the pool
    pub min_connections: u32,
}

#[derive(Debug, Deserialize, Clone)]
pub struct JwtConfig {
    /// Secret key used to verify JWT tokens issued by the auth service
    pub secret: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct NotificationConfig {
    /// LINE Messaging API access token; push delivery is skipped when empty
    #[serde(default)]
    pub line_messaging_token: Option<String>,

    /// Base URL used to build links inside notifications
    pub app_base_url: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct PricingConfig {
    pub base_price: Decimal,
    pub feed_price_per_bag: Decimal,
    pub doc_price: Decimal,
    pub bag_weight_kg: Decimal,
}

impl PricingConfig {
    /// The bag weight converts both the feed model and the metrics between
    /// bags and kilograms
    fn check(&self) -> Result<(), ConfigError> {
        if self.bag_weight_kg <= Decimal::ZERO {
            return Err(ConfigError::Message(
                "pricing.bag_weight_kg must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

impl From<&PricingConfig> for PricingPolicy {
    fn from(config: &PricingConfig) -> Self {
        PricingPolicy {
            base_price: config.base_price,
            feed_price_per_bag: config.feed_price_per_bag,
            doc_price: config.doc_price,
            bag_weight_kg: config.bag_weight_kg,
        }
    }
}

impl Config {
    /// Load configuration from files and environment variables
    pub fn load() -> Result<Self, ConfigError> {
        let environment = std::env::var("BCL_ENVIRONMENT").unwrap_or_else(|_| "development".into());
        let pricing = PricingPolicy::default();

        let config = config::Config::builder()
            // Start with default values
            .set_default("environment", environment.clone())?
            .set_default("server.port", 3000)?
            .set_default("server.host", "0.0.0.0")?
            .set_default("database.max_connections", 10)?
            .set_default("database.min_connections", 2)?
            .set_default("notification.app_base_url", "http://localhost:5173")?
            .set_default("pricing.base_price", pricing.base_price.to_string())?
            .set_default(
                "pricing.feed_price_per_bag",
                pricing.feed_price_per_bag.to_string(),
            )?
            .set_default("pricing.doc_price", pricing.doc_price.to_string())?
            .set_default("pricing.bag_weight_kg", pricing.bag_weight_kg.to_string())?
            // Load environment-specific config file
            .add_source(File::with_name(&format!("config/{}", environment)).required(false))
            // Override with environment variables (BCL_ prefix)
            .add_source(
                Environment::with_prefix("BCL")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let config: Self = config.try_deserialize()?;
        config.pricing.check()?;
        Ok(config)
    }

    pub fn pricing_policy(&self) -> PricingPolicy {
        PricingPolicy::from(&self.pricing)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 3000,
            host: "0.0.0.0".to_string(),
        }
    }
}
