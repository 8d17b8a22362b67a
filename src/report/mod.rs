//! Report module - terminal summaries and the JSON training report

pub mod summary;
pub mod training_report;

pub use summary::*;
pub use training_report::*;
