use serde::Deserialize;
use std::env;
use chrono::Duration;
use ridepool_core::ReservationPolicy;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub database: DatabaseConfig,
    #[serde(default)]
    pub redis: RedisConfig,
    pub business_rules: BusinessRules,
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    Postgres,
    Memory,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StorageConfig {
    pub backend: StorageBackend,
}

#[derive(Debug, Deserialize, Clone)]
pub struct BusinessRules {
    #[serde(default = "default_hold_seconds")]
    pub hold_seconds: i64,
    #[serde(default = "default_warning_lead_seconds")]
    pub warning_lead_seconds: i64,
    #[serde(default = "default_response_timeout_seconds")]
    pub response_timeout_seconds: i64,
    #[serde(default = "default_sweep_interval_seconds")]
    pub sweep_interval_seconds: i64,
}

fn default_hold_seconds() -> i64 { 600 }
fn default_warning_lead_seconds() -> i64 { 120 }
fn default_response_timeout_seconds() -> i64 { 120 }
fn default_sweep_interval_seconds() -> i64 { 60 }

impl Default for BusinessRules {
    fn default() -> Self {
        Self {
            hold_seconds: default_hold_seconds(),
            warning_lead_seconds: default_warning_lead_seconds(),
            response_timeout_seconds: default_response_timeout_seconds(),
            sweep_interval_seconds: default_sweep_interval_seconds(),
        }
    }
}

impl BusinessRules {
    pub fn policy(&self) -> ReservationPolicy {
        ReservationPolicy {
            hold_duration: Duration::seconds(self.hold_seconds),
            warning_lead: Duration::seconds(self.warning_lead_seconds),
            response_timeout: Duration::seconds(self.response_timeout_seconds),
            sweep_interval: Duration::seconds(self.sweep_interval_seconds),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub port: u16,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_max_connections() -> u32 { 5 }

/// Without a url, presence and notifications stay in-process
#[derive(Debug, Deserialize, Clone, Default)]
pub struct RedisConfig {
    pub url: Option<String>,
}

impl Config {
    pub fn load() -> Result<Self, config::ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = config::Config::builder()
            .add_source(config::File::with_name("config/default"))
            // Per-environment overrides are optional
            .add_source(config::File::with_name(&format!("config/{}", run_mode)).required(false))
            // Local overrides, never checked in
            .add_source(config::File::with_name("config/local").required(false))
            // RIDEPOOL__SERVER__PORT=9000 overrides server.port
            .add_source(config::Environment::with_prefix("RIDEPOOL").separator("__"))
            .build()?;

        s.try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_rules_match_policy_defaults() {
        assert_eq!(BusinessRules::default().policy(), ReservationPolicy::default());
    }

    #[test]
    fn test_config_deserializes_from_toml() {
        let raw = r#"
            [server]
            port = 8080

            [storage]
            backend = "memory"

            [database]
            url = "postgres://localhost/ridepool"

            [business_rules]
            hold_seconds = 300
        "#;

        let cfg: Config = config::Config::builder()
            .add_source(config::File::from_str(raw, config::FileFormat::Toml))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();

        assert_eq!(cfg.storage.backend, StorageBackend::Memory);
        assert_eq!(cfg.database.max_connections, 5);
        assert!(cfg.redis.url.is_none());
        assert_eq!(cfg.business_rules.policy().hold_duration, Duration::minutes(5));
        assert_eq!(cfg.business_rules.warning_lead_seconds, 120);
    }
}
