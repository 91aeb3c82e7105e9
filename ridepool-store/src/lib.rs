pub mod app_config;
pub mod chat_repo;
pub mod database;
pub mod memory;
pub mod metrics_repo;
pub mod redis_repo;
pub mod reservation_repo;
pub mod trip_repo;

pub use database::{DbClient, PgStore};
pub use memory::{MemoryNotifier, MemoryStore};
pub use redis_repo::RedisClient;

pub(crate) fn db_err(err: sqlx::Error) -> ridepool_core::CoreError {
    ridepool_core::CoreError::internal(format!("database: {}", err))
}
