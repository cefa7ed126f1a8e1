//! Configuration management via environment variables
//!
//! Loads configuration from environment variables with .env file support.

use std::env;

use crate::error::{ArmorError, Result};

/// Main application configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub app: AppConfig,
    pub server: ServerConfig,
    pub rate_limit: RateLimitConfig,
}

/// Application identity and log verbosity
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub name: String,
    pub version: String,
    pub debug: bool,
}

/// Server binding configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

/// Per-client generation rate ceiling
#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    pub enabled: bool,
    pub requests_per_minute: u32,
    pub burst_capacity: u32,
}

impl Config {
    /// Load configuration from environment variables
    ///
    /// Reads .env file if present, then parses environment variables.
    pub fn from_env() -> Result<Self> {
        let _ = dotenvy::dotenv();

        Ok(Self {
            app: AppConfig::from_env()?,
            server: ServerConfig::from_env()?,
            rate_limit: RateLimitConfig::from_env()?,
        })
    }
}

fn parse_var<T>(name: &str, default: &str) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    env::var(name)
        .unwrap_or_else(|_| default.to_string())
        .parse::<T>()
        .map_err(|e| ArmorError::Config(format!("Invalid {}: {}", name, e)))
}

impl AppConfig {
    fn from_env() -> Result<Self> {
        let name = env::var("APP_NAME").unwrap_or_else(|_| "VoIP Armor".to_string());
        let debug = parse_var::<bool>("APP_DEBUG", "false")?;

        Ok(Self {
            name,
            version: env!("CARGO_PKG_VERSION").to_string(),
            debug,
        })
    }
}

impl ServerConfig {
    fn from_env() -> Result<Self> {
        let host = env::var("SERVER_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = parse_var::<u16>("SERVER_PORT", "8080")?;

        Ok(Self { host, port })
    }
}

impl RateLimitConfig {
    fn from_env() -> Result<Self> {
        let enabled = parse_var::<bool>("RATE_LIMIT_ENABLED", "true")?;
        let requests_per_minute = parse_var::<u32>("RATE_LIMIT_REQUESTS_PER_MINUTE", "10")?;

        if requests_per_minute == 0 {
            return Err(ArmorError::Config(
                "RATE_LIMIT_REQUESTS_PER_MINUTE must be >= 1".to_string(),
            ));
        }

        let burst_capacity = parse_var::<u32>("RATE_LIMIT_BURST_CAPACITY", "3")?;

        if burst_capacity == 0 {
            return Err(ArmorError::Config(
                "RATE_LIMIT_BURST_CAPACITY must be >= 1".to_string(),
            ));
        }

        Ok(Self {
            enabled,
            requests_per_minute,
            burst_capacity,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_app_config_defaults() {
        temp_env::with_vars_unset(vec!["APP_NAME", "APP_DEBUG"], || {
            let config = AppConfig::from_env().unwrap();
            assert_eq!(config.name, "VoIP Armor");
            assert_eq!(config.version, env!("CARGO_PKG_VERSION"));
            assert!(!config.debug);
        });
    }

    #[test]
    fn test_app_config_invalid_debug() {
        temp_env::with_var("APP_DEBUG", Some("verbose"), || {
            let result = AppConfig::from_env();
            assert!(result.is_err());
            assert!(result.unwrap_err().to_string().contains("APP_DEBUG"));
        });
    }

    #[test]
    fn test_server_config_defaults() {
        temp_env::with_vars_unset(vec!["SERVER_HOST", "SERVER_PORT"], || {
            let config = ServerConfig::from_env().unwrap();
            assert_eq!(config.host, "127.0.0.1");
            assert_eq!(config.port, 8080);
        });
    }

    #[test]
    fn test_server_config_custom() {
        temp_env::with_vars(
            vec![
                ("SERVER_HOST", Some("0.0.0.0")),
                ("SERVER_PORT", Some("3000")),
            ],
            || {
                let config = ServerConfig::from_env().unwrap();
                assert_eq!(config.host, "0.0.0.0");
                assert_eq!(config.port, 3000);
            },
        );
    }

    #[test]
    fn test_server_config_invalid_port() {
        temp_env::with_var("SERVER_PORT", Some("70000"), || {
            let result = ServerConfig::from_env();
            assert!(result.is_err());
            assert!(result.unwrap_err().to_string().contains("SERVER_PORT"));
        });
    }

    #[test]
    fn test_rate_limit_defaults() {
        temp_env::with_vars_unset(
            vec![
                "RATE_LIMIT_ENABLED",
                "RATE_LIMIT_REQUESTS_PER_MINUTE",
                "RATE_LIMIT_BURST_CAPACITY",
            ],
            || {
                let config = RateLimitConfig::from_env().unwrap();
                assert!(config.enabled);
                assert_eq!(config.requests_per_minute, 10);
                assert_eq!(config.burst_capacity, 3);
            },
        );
    }

    #[test]
    fn test_rate_limit_custom() {
        temp_env::with_vars(
            vec![
                ("RATE_LIMIT_ENABLED", Some("false")),
                ("RATE_LIMIT_REQUESTS_PER_MINUTE", Some("60")),
                ("RATE_LIMIT_BURST_CAPACITY", Some("5")),
            ],
            || {
                let config = RateLimitConfig::from_env().unwrap();
                assert!(!config.enabled);
                assert_eq!(config.requests_per_minute, 60);
                assert_eq!(config.burst_capacity, 5);
            },
        );
    }

    #[test]
    fn test_rate_limit_zero_rejected() {
        temp_env::with_vars(
            vec![
                ("RATE_LIMIT_REQUESTS_PER_MINUTE", Some("0")),
                ("RATE_LIMIT_BURST_CAPACITY", None),
            ],
            || {
                let result = RateLimitConfig::from_env();
                assert!(result.is_err());
                assert!(result.unwrap_err().to_string().contains("must be >= 1"));
            },
        );

        temp_env::with_vars(
            vec![
                ("RATE_LIMIT_REQUESTS_PER_MINUTE", None),
                ("RATE_LIMIT_BURST_CAPACITY", Some("0")),
            ],
            || {
                let result = RateLimitConfig::from_env();
                assert!(result.is_err());
                assert!(result
                    .unwrap_err()
                    .to_string()
                    .contains("RATE_LIMIT_BURST_CAPACITY"));
            },
        );
    }
}
