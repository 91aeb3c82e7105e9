pub mod chat;
pub mod events;
pub mod metrics;
pub mod reservation;
pub mod task;
pub mod trip;
pub mod user;
