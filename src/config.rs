use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::domain::order::{OrderStatus, ValidationRules};

// ============================================================================
// Configuration
// ============================================================================
//
// Defaults cover the common case; a JSON file (ORDER_GUARD_CONFIG) can
// override any subset, and a handful of environment variables override that.
//
// ============================================================================

pub const CONFIG_PATH_ENV: &str = "ORDER_GUARD_CONFIG";
pub const PORT_ENV: &str = "ORDER_GUARD_PORT";
pub const VALIDATION_ENV: &str = "ORDER_GUARD_VALIDATION";
pub const FIXTURES_ENV: &str = "ORDER_GUARD_FIXTURES";
pub const LOG_FILTER_ENV: &str = "RUST_LOG";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyticsConfig {
    pub validation_enabled: bool,
    pub logging_enabled: bool,
    pub rules: ValidationRules,
}

impl Default for AnalyticsConfig {
    fn default() -> Self {
        Self {
            validation_enabled: true,
            logging_enabled: true,
            rules: ValidationRules::analytics(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrdersServiceConfig {
    pub validation_enabled: bool,
    pub logging_enabled: bool,
    pub rules: ValidationRules,
    /// Status given to created orders that do not name one
    pub default_status: OrderStatus,
}

impl Default for OrdersServiceConfig {
    fn default() -> Self {
        Self {
            validation_enabled: true,
            logging_enabled: true,
            rules: ValidationRules::persistence(),
            default_status: OrderStatus::Pending,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub analytics: AnalyticsConfig,
    pub orders: OrdersServiceConfig,
    pub server: ServerConfig,
    /// JSON file seeding the in-memory order table
    pub fixtures_path: Option<PathBuf>,
    pub log_filter: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            analytics: AnalyticsConfig::default(),
            orders: OrdersServiceConfig::default(),
            server: ServerConfig::default(),
            fixtures_path: None,
            log_filter: "info,order_guard=debug".to_string(),
        }
    }
}

impl AppConfig {
    pub fn from_json_str(raw: &str) -> Result<Self> {
        serde_json::from_str(raw).context("Failed to parse configuration JSON")
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read configuration file {}", path.display()))?;
        Self::from_json_str(&raw)
    }

    /// Optional file, then environment overrides
    pub fn from_env() -> Result<Self> {
        let mut config = match std::env::var_os(CONFIG_PATH_ENV) {
            Some(path) => Self::from_file(Path::new(&path))?,
            None => Self::default(),
        };
        config.apply_overrides(|name| std::env::var(name).ok())?;
        Ok(config)
    }

    /// Apply overrides from any lookup (the environment in production)
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(port) = lookup(PORT_ENV) {
            self.server.port = port
                .parse()
                .with_context(|| format!("{} must be a port number, got '{}'", PORT_ENV, port))?;
        }
        if let Some(flag) = lookup(VALIDATION_ENV) {
            let enabled = parse_flag(&flag)
                .with_context(|| format!("{} must be true or false, got '{}'", VALIDATION_ENV, flag))?;
            self.analytics.validation_enabled = enabled;
            self.orders.validation_enabled = enabled;
        }
        if let Some(path) = lookup(FIXTURES_ENV) {
            self.fixtures_path = Some(PathBuf::from(path));
        }
        if let Some(filter) = lookup(LOG_FILTER_ENV) {
            self.log_filter = filter;
        }
        Ok(())
    }
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::order::IdFormat;
    use std::collections::HashMap;

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert!(config.analytics.validation_enabled);
        assert_eq!(config.analytics.rules.id_format, IdFormat::NonEmpty);
        assert_eq!(config.orders.rules.id_format, IdFormat::Uuid);
        assert_eq!(config.orders.default_status, OrderStatus::Pending);
        assert_eq!(config.server.port, 8080);
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config = AppConfig::from_json_str(
            r#"{ "analytics": { "validation_enabled": false }, "server": { "port": 9000 } }"#,
        )
        .unwrap();

        assert!(!config.analytics.validation_enabled);
        assert!(config.analytics.logging_enabled);
        assert!(config.analytics.rules.require_items);
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.server.host, "0.0.0.0");
    }

    #[test]
    fn test_rules_from_json() {
        let config = AppConfig::from_json_str(
            r#"{ "analytics": { "rules": { "id_format": "uuid", "max_total_amount": 500.0 } } }"#,
        )
        .unwrap();

        assert_eq!(config.analytics.rules.id_format, IdFormat::Uuid);
        assert_eq!(config.analytics.rules.max_total_amount, 500.0);
        assert!(config.analytics.rules.require_items);
    }

    #[test]
    fn test_invalid_json_is_an_error() {
        assert!(AppConfig::from_json_str("{ not json").is_err());
    }

    #[test]
    fn test_overrides() {
        let vars: HashMap<&str, &str> = [
            (PORT_ENV, "7070"),
            (VALIDATION_ENV, "off"),
            (FIXTURES_ENV, "/tmp/orders.json"),
        ]
        .into_iter()
        .collect();

        let mut config = AppConfig::default();
        config
            .apply_overrides(|name| vars.get(name).map(|v| v.to_string()))
            .unwrap();

        assert_eq!(config.server.port, 7070);
        assert!(!config.analytics.validation_enabled);
        assert!(!config.orders.validation_enabled);
        assert_eq!(config.fixtures_path, Some(PathBuf::from("/tmp/orders.json")));
        assert_eq!(config.log_filter, "info,order_guard=debug");
    }

    #[test]
    fn test_bad_override_is_an_error() {
        let mut config = AppConfig::default();
        assert!(config.apply_overrides(|name| (name == PORT_ENV).then(|| "http".to_string())).is_err());

        let mut config = AppConfig::default();
        assert!(config
            .apply_overrides(|name| (name == VALIDATION_ENV).then(|| "maybe".to_string()))
            .is_err());
    }
}
