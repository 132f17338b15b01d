pub mod calculator;
pub mod config;

pub use calculator::{metric_score, ScoreCalculator, ScoreResult};
pub use config::ScoringConfig;
