//! Pipeline module - training stages, artifacts and prediction routing

pub mod archive;
pub mod artifacts;
pub mod cluster;
pub mod correlation;
pub mod knee;
pub mod loader;
pub mod missing;
pub mod mutual_info;
pub mod prediction;
pub mod scaler;
pub mod selection;
pub mod training;

pub use archive::RowArchive;
pub use artifacts::{ArtifactStore, Generation, GenerationInfo, ModelRegistryEntry, TargetArtifacts};
pub use cluster::{ClusterModel, KMeans};
pub use correlation::CorrelatedPair;
pub use loader::*;
pub use missing::{analyze_missing_values, handle_missing_values, MissingValueLayout};
pub use prediction::{GenerationHandle, PredictionResult, PredictionRouter, RowFailure};
pub use scaler::StandardScaler;
pub use selection::{select_features, DropList, DropReason};
pub use training::{run_training, train_all, TrainingOutcome};
