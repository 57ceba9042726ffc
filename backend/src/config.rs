//! Configuration management for the Kindergarten Kitchen Management Platform
//!
//! Supports hierarchical configuration loading:
//! 1. Default values in code
//! 2. Configuration files (development.toml, production.toml)
//! 3. Environment variable overrides with KIM_ prefix

use chrono::{FixedOffset, Offset, Utc};
use config::{ConfigError, Environment, File};
use rust_decimal::Decimal;
use serde::Deserialize;
use shared::EndingStockBasis;
use std::net::{AddrParseError, IpAddr, SocketAddr};

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

    /// Stock engine tuning
    pub inventory: InventoryConfig,

    /// Background jobs
    pub scheduler: SchedulerConfig,

    /// In-process event relay
    pub notifications: NotificationsConfig,
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
    /// Secret key used to verify access tokens
    pub secret: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct InventoryConfig {
    /// Discrepancy (percent) above which a report row is suspicious
    pub suspicious_threshold_percent: Decimal,

    /// Facility offset from UTC, used for calendar month boundaries
    pub utc_offset_minutes: i32,

    /// Balance used as a product's actual ending stock in monthly reports
    pub ending_stock_basis: EndingStockBasis,

    /// Persist and broadcast low-stock alerts after servings
    pub low_stock_notifications: bool,
}

impl InventoryConfig {
    /// Facility offset; falls back to UTC for out-of-range values
    pub fn offset(&self) -> FixedOffset {
        FixedOffset::east_opt(self.utc_offset_minutes.saturating_mul(60)).unwrap_or(Utc.fix())
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct SchedulerConfig {
    pub enabled: bool,

    /// Seconds between possible-portions recalculations
    pub portions_interval_secs: u64,

    /// Generate the previous month's report at each month boundary
    pub monthly_report_enabled: bool,
}

#[derive(Debug, Deserialize, Clone)]
pub struct NotificationsConfig {
    /// Buffered events per WebSocket subscriber before it starts lagging
    pub channel_capacity: usize,
}

impl Config {
    /// Load configuration from files and environment variables
    pub fn load() -> Result<Self, ConfigError> {
        let environment = std::env::var("KIM_ENVIRONMENT").unwrap_or_else(|_| "development".into());

        let config = Self::builder(&environment)?
            // Load environment-specific config file
            .add_source(File::with_name(&format!("config/{}", environment)).required(false))
            // Override with environment variables (KIM_ prefix)
            .add_source(
                Environment::with_prefix("KIM")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }

    fn builder(
        environment: &str,
    ) -> Result<config::ConfigBuilder<config::builder::DefaultState>, ConfigError> {
        config::Config::builder()
            // Start with default values
            .set_default("environment", environment)?
            .set_default("server.port", 3000)?
            .set_default("server.host", "0.0.0.0")?
            .set_default("database.max_connections", 10)?
            .set_default("database.min_connections", 2)?
            .set_default("inventory.suspicious_threshold_percent", "15")?
            .set_default("inventory.utc_offset_minutes", 300)?
            .set_default("inventory.ending_stock_basis", "live")?
            .set_default("inventory.low_stock_notifications", true)?
            .set_default("scheduler.enabled", true)?
            .set_default("scheduler.portions_interval_secs", 1800)?
            .set_default("scheduler.monthly_report_enabled", true)?
            .set_default("notifications.channel_capacity", 256)
    }
}

impl ServerConfig {
    /// Address to bind; `host` must be an IP literal
    pub fn socket_addr(&self) -> Result<SocketAddr, AddrParseError> {
        Ok(SocketAddr::new(self.host.parse::<IpAddr>()?, self.port))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn load_defaults() -> Config {
        Config::builder("test")
            .unwrap()
            .set_override("database.url", "postgres://localhost/kim_test")
            .unwrap()
            .set_override("jwt.secret", "test-secret")
            .unwrap()
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap()
    }

    #[test]
    fn test_inventory_defaults() {
        let config = load_defaults();
        assert_eq!(config.inventory.suspicious_threshold_percent, Decimal::from(15));
        assert_eq!(config.inventory.utc_offset_minutes, 300);
        assert_eq!(config.inventory.ending_stock_basis, EndingStockBasis::Live);
        assert!(config.inventory.low_stock_notifications);
        assert_eq!(config.inventory.offset().local_minus_utc(), 5 * 3600);
    }

    #[test]
    fn test_scheduler_and_server_defaults() {
        let config = load_defaults();
        assert!(config.scheduler.enabled);
        assert_eq!(config.scheduler.portions_interval_secs, 1800);
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.database.max_connections, 10);
        assert_eq!(config.notifications.channel_capacity, 256);
        assert_eq!(config.server.socket_addr().unwrap().to_string(), "0.0.0.0:3000");
    }

    #[test]
    fn test_server_host_must_be_an_ip() {
        let server = ServerConfig {
            port: 8080,
            host: "127.0.0.1".to_string(),
        };
        assert_eq!(server.socket_addr().unwrap().to_string(), "127.0.0.1:8080");

        let named = ServerConfig {
            host: "kitchen.local".to_string(),
            ..server
        };
        assert!(named.socket_addr().is_err());
    }

    #[test]
    fn test_out_of_range_offset_falls_back_to_utc() {
        let mut config = load_defaults();
        config.inventory.utc_offset_minutes = 100_000;
        assert_eq!(config.inventory.offset().local_minus_utc(), 0);
    }
}
