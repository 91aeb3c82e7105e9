use sqlx::postgres::PgPoolOptions;
use sqlx::{Pool, Postgres};
use std::time::Duration;
use tracing::info;
use serde_json::Value;

use crate::app_config::BusinessRules;

#[derive(Clone)]
pub struct DbClient {
    pub pool: Pool<Postgres>,
}

impl DbClient {
    pub async fn new(connection_string: &str, max_connections: u32) -> Result<Self, sqlx::Error> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(Duration::from_secs(3))
            .connect(connection_string)
            .await?;

        Ok(Self { pool })
    }

    pub async fn migrate(&self) -> Result<(), sqlx::migrate::MigrateError> {
        info!("Running database migrations...");
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await?;
        info!("Migrations completed successfully.");
        Ok(())
    }

    pub fn store(&self) -> PgStore {
        PgStore { pool: self.pool.clone() }
    }

    /// Overlay operator-tuned rules stored as `{"value": <n>}` rows on top of the file config
    pub async fn fetch_business_rules(&self, defaults: BusinessRules) -> Result<BusinessRules, sqlx::Error> {
        let rows: Vec<(String, Value)> = sqlx::query_as("SELECT rule_key, rule_value FROM business_rules")
            .fetch_all(&self.pool)
            .await?;

        Ok(apply_rule_overrides(defaults, rows))
    }
}

fn apply_rule_overrides(mut rules: BusinessRules, rows: Vec<(String, Value)>) -> BusinessRules {
    for (key, value) in rows {
        let Some(seconds) = value.get("value").and_then(Value::as_i64) else {
            continue;
        };
        if seconds <= 0 {
            continue;
        }
        match key.as_str() {
            "hold_seconds" => rules.hold_seconds = seconds,
            "warning_lead_seconds" => rules.warning_lead_seconds = seconds,
            "response_timeout_seconds" => rules.response_timeout_seconds = seconds,
            "sweep_interval_seconds" => rules.sweep_interval_seconds = seconds,
            _ => {}
        }
    }
    rules
}

/// Postgres-backed datastore. Repository impls live in the `*_repo` modules.
#[derive(Clone)]
pub struct PgStore {
    pub(crate) pool: Pool<Postgres>,
}

impl PgStore {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}
