//! Configuration management for the procurement server
//!
//! Supports hierarchical configuration loading:
//! 1. Default values in code
//! 2. Configuration files (development.toml, production.toml)
//! 3. Environment variable overrides with PROCUREMENT_ prefix

use config::{ConfigError, Environment, File};
use serde::Deserialize;

/// Main application configuration
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    /// Current environment (development, production)
    pub environment: String,

    /// Server configuration
    pub server: ServerConfig,

    /// Which persistence adapter backs the store
    pub storage: StorageConfig,

    /// Database configuration, used by the postgres backend
    pub database: DatabaseConfig,

    /// Tax calculation options
    pub tax: TaxConfig,

    /// Approval flows seeded when none is stored
    pub approvals: ApprovalsConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    /// Server port
    pub port: u16,

    /// Server host
    pub host: String,
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    Memory,
    Postgres,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StorageConfig {
    pub backend: StorageBackend,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    /// PostgreSQL connection URL
    pub url: Option<String>,

    /// Maximum number of connections in the pool
    pub max_connections: u32,

    /// Minimum number of connections in the pool
    pub min_connections: u32,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct TaxConfig {
    /// Report a 0% rate instead of failing when no rate resolves
    pub zero_rate_fallback: bool,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ApprovalsConfig {
    pub pr_stages: Vec<String>,
    pub po_stages: Vec<String>,
}

impl Config {
    /// Load configuration from files and environment variables
    pub fn load() -> Result<Self, ConfigError> {
        let environment =
            std::env::var("PROCUREMENT_ENVIRONMENT").unwrap_or_else(|_| "development".into());

        let config = config::Config::builder()
            // Start with default values
            .set_default("environment", environment.clone())?
            .set_default("server.port", 3000)?
            .set_default("server.host", "0.0.0.0")?
            .set_default("storage.backend", "memory")?
            .set_default("database.max_connections", 10)?
            .set_default("database.min_connections", 2)?
            .set_default("tax.zero_rate_fallback", false)?
            .set_default("approvals.pr_stages", vec!["Manager"])?
            .set_default("approvals.po_stages", vec!["Manager", "Finance"])?
            // Load environment-specific config file
            .add_source(File::with_name(&format!("config/{}", environment)).required(false))
            // Override with environment variables (PROCUREMENT_ prefix)
            .add_source(
                Environment::with_prefix("PROCUREMENT")
                    .separator("__")
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("approvals.pr_stages")
                    .with_list_parse_key("approvals.po_stages"),
            )
            .build()?;

        config.try_deserialize()
    }
}

impl Default for Config {
    /// In-memory configuration with the stock approval flows
    fn default() -> Self {
        Self {
            environment: "development".to_string(),
            server: ServerConfig::default(),
            storage: StorageConfig {
                backend: StorageBackend::Memory,
            },
            database: DatabaseConfig {
                url: None,
                max_connections: 10,
                min_connections: 2,
            },
            tax: TaxConfig::default(),
            approvals: ApprovalsConfig {
                pr_stages: vec!["Manager".to_string()],
                po_stages: vec!["Manager".to_string(), "Finance".to_string()],
            },
        }
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
