//! Training orchestrator
//!
//! Runs the full per-target pipeline: impute, select features, scale, cluster and
//! search a regressor per cluster. Targets train in parallel and share nothing
//! mutable. A generation is committed only when every target succeeds.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use chrono::Utc;
use ndarray::{Array1, Axis};
use polars::prelude::*;
use rayon::prelude::*;

use crate::config::PipelineConfig;
use crate::error::{PipelineError, Result};
use crate::pipeline::artifacts::{
    finite, ArtifactStore, Generation, GenerationManifest, ModelRegistryEntry, TargetArtifacts,
};
use crate::pipeline::cluster::select_clusters;
use crate::pipeline::loader::split_features_targets;
use crate::pipeline::missing::handle_missing_values;
use crate::pipeline::scaler::StandardScaler;
use crate::pipeline::selection::select_features;
use crate::report::{ClusterReport, FamilyReportEntry, TargetReport, TrainingReport};
use crate::search::cv::train_test_split;
use crate::search::{find_best_model, ClusterData, SearchScope};

/// Result of a committed training run
#[derive(Debug, Clone)]
pub struct TrainingOutcome {
    pub generation_id: String,
    pub report: TrainingReport,
}

/// Trained artifacts and report for one target, held in memory until commit
#[derive(Debug, Clone)]
pub struct TrainedTarget {
    pub artifacts: TargetArtifacts,
    pub report: TargetReport,
}

/// Train one target on its feature table.
///
/// Every stage error aborts the target; nothing is written to disk here.
pub fn train_target(
    features: &DataFrame,
    target: &str,
    y: &[f64],
    config: &PipelineConfig,
) -> Result<TrainedTarget> {
    let seed = config.seed;
    let input_features = features.width();

    let missing = handle_missing_values(features, target, &config.missing)?;
    let selection = select_features(&missing.frame, target, y, &config.selection, seed)?;
    let reduced = selection.drop_list.apply(&missing.frame);

    let scaler = StandardScaler::fit(&reduced, target)?;
    let columns = scaler.column_names();
    let x = scaler.transform_matrix(&reduced)?;

    let clustering = select_clusters(&x, &columns, target, &config.cluster, seed)?;
    let labels = &clustering.labels;
    let clusters: Vec<usize> = labels
        .iter()
        .copied()
        .collect::<BTreeSet<usize>>()
        .into_iter()
        .collect();

    let searched: Vec<(ModelRegistryEntry, ClusterReport)> = clusters
        .par_iter()
        .map(|&cluster| -> Result<(ModelRegistryEntry, ClusterReport)> {
            let rows: Vec<usize> = (0..labels.len()).filter(|&i| labels[i] == cluster).collect();
            let cluster_x = x.select(Axis(0), &rows);
            let cluster_y: Array1<f64> = rows.iter().map(|&i| y[i]).collect();

            let (train, test) = train_test_split(
                rows.len(),
                config.search.test_ratio,
                seed.wrapping_add(cluster as u64),
            );
            let train_x = cluster_x.select(Axis(0), &train);
            let train_y = cluster_y.select(Axis(0), &train);
            let test_x = cluster_x.select(Axis(0), &test);
            let test_y = cluster_y.select(Axis(0), &test);

            tracing::info!(
                target_name = target,
                cluster,
                train_rows = train.len(),
                test_rows = test.len(),
                "searching models"
            );

            let data = ClusterData {
                train_x: &train_x,
                train_y: &train_y,
                test_x: &test_x,
                test_y: &test_y,
            };
            let outcome = find_best_model(&data, &config.search, SearchScope { target, cluster }, seed)?;

            let report = ClusterReport {
                cluster,
                train_rows: train.len(),
                test_rows: test.len(),
                winner: outcome.winner.family,
                families: outcome.families.iter().map(FamilyReportEntry::from).collect(),
            };
            let entry = ModelRegistryEntry {
                target: target.to_string(),
                cluster,
                family: outcome.winner.family,
                hyperparameters: outcome.winner.hyperparameters,
                model: outcome.model,
                cv_score: finite(outcome.winner.cv_score),
                test_score: finite(outcome.winner.test_score),
            };
            Ok((entry, report))
        })
        .collect::<Result<_>>()?;

    let mut models = BTreeMap::new();
    let mut cluster_reports = Vec::with_capacity(searched.len());
    for (entry, report) in searched {
        models.insert(entry.cluster, entry);
        cluster_reports.push(report);
    }

    let report = TargetReport {
        target: target.to_string(),
        rows: features.height(),
        input_features,
        dropped_missing: missing.dropped.clone(),
        imputed: missing.layout.imputed.iter().map(|c| c.name.clone()).collect(),
        drop_entries: selection.entries,
        drop_list_size: selection.drop_list.len(),
        features_used: columns.len(),
        k: clustering.model.k,
        inertia_curve: clustering.model.inertia_curve.clone(),
        clusters: cluster_reports,
    };

    Ok(TrainedTarget {
        artifacts: TargetArtifacts {
            target: target.to_string(),
            missing: missing.layout,
            drop_list: selection.drop_list,
            scaler,
            cluster_model: clustering.model,
            models,
        },
        report,
    })
}

/// Train every configured target in parallel
pub fn train_all(df: &DataFrame, config: &PipelineConfig) -> Result<Vec<TrainedTarget>> {
    config.validate()?;
    let (features, targets) = split_features_targets(df, &config.id_column, &config.targets)?;
    if features.width() == 0 {
        return Err(PipelineError::data("No feature columns besides the id and targets"));
    }

    targets
        .par_iter()
        .map(|(name, y)| {
            train_target(&features, name, y, config).map_err(|e| {
                tracing::error!(target_name = %name, error = %e, "training failed");
                e
            })
        })
        .collect()
}

/// Train all targets and commit the result as the new current generation.
///
/// On any failure nothing is committed and the previous generation stays live.
pub fn run_training(
    df: &DataFrame,
    store: &ArtifactStore,
    config: &PipelineConfig,
    input_file: Option<&Path>,
) -> Result<TrainingOutcome> {
    let trained = train_all(df, config)?;

    let id = store.allocate_id();
    let (artifacts, reports): (Vec<TargetArtifacts>, Vec<TargetReport>) = trained
        .into_iter()
        .map(|t| (t.artifacts, t.report))
        .unzip();

    let generation = Generation {
        manifest: GenerationManifest {
            id: id.clone(),
            created_at: Utc::now(),
            crate_version: env!("CARGO_PKG_VERSION").to_string(),
            config: config.clone(),
            targets: artifacts.iter().map(|a| a.target.clone()).collect(),
        },
        targets: artifacts,
    };
    let report = TrainingReport::new(&id, input_file, config, reports);
    let generation_id = store.commit(&generation, &report)?;

    Ok(TrainingOutcome {
        generation_id,
        report,
    })
}
