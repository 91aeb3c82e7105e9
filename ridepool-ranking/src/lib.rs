pub mod engine;
pub mod score;

pub use engine::{DriverRanking, RankingEngine};
