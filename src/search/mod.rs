//! Hyperparameter search and model selection

pub mod cv;
pub mod finder;
pub mod grid;
pub mod metrics;

pub use finder::{find_best_model, ClusterData, FamilyScore, SearchOutcome, SearchScope};
pub use metrics::{adjust_r2, adjusted_r2_score, r2_score};
