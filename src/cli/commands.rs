//! Subcommand implementations

use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use console::style;

use crate::config::{PipelineConfig, SearchConfig};
use crate::pipeline::{
    analyze_missing_values, load_dataframe, row_ids, run_training, ArtifactStore,
    PredictionRouter, RowArchive,
};
use crate::report::{display_generations, PredictionSummary, TrainingSummary};
use crate::utils::{
    create_spinner, finish_with_failure, finish_with_success, print_banner, print_completion,
    print_count, print_info, print_step_header, print_step_time, print_success,
    print_train_config, print_warning,
};

use super::args::default_predictions_path;

/// Overrides taken from the `train` command line
#[derive(Debug, Default)]
pub struct TrainOverrides {
    pub id_column: Option<String>,
    pub targets: Option<Vec<String>>,
    pub seed: Option<u64>,
    pub quick: bool,
}

/// Merge a config file (or the defaults) with command-line overrides
pub fn resolve_config(config_path: Option<&Path>, overrides: TrainOverrides) -> Result<PipelineConfig> {
    let mut config = match config_path {
        Some(path) => PipelineConfig::from_file(path)
            .with_context(|| format!("Failed to load config file: {}", path.display()))?,
        None => PipelineConfig::default(),
    };
    if let Some(id_column) = overrides.id_column {
        config.id_column = id_column;
    }
    if let Some(targets) = overrides.targets {
        config.targets = targets;
    }
    if let Some(seed) = overrides.seed {
        config.seed = seed;
    }
    if overrides.quick {
        config.search = SearchConfig::quick();
    }
    config.validate().context("Invalid configuration")?;
    Ok(config)
}

/// Train a generation from `input` and commit it under `artifacts`
///
/// # Arguments
/// * `input` - Training data with id, feature and target columns
/// * `artifacts` - Artifact root; created if missing
/// * `config` - Resolved pipeline configuration
pub fn run_train(input: &Path, artifacts: &Path, config: &PipelineConfig) -> Result<()> {
    print_banner(env!("CARGO_PKG_VERSION"));
    print_train_config(
        input,
        artifacts,
        &config.targets,
        config.seed,
        config.cluster.max_k,
        config.search.folds,
    );

    // Step 1: Load dataset
    print_step_header(1, "Load Dataset");
    let step_start = Instant::now();
    let spinner = create_spinner("Loading dataset...");
    let df = load_dataframe(input)
        .with_context(|| format!("Failed to load dataset: {}", input.display()))?;
    finish_with_success(&spinner, "Dataset loaded");
    println!("      Rows: {}", df.height());
    println!("      Columns: {}", df.width());
    let with_missing = analyze_missing_values(&df)?
        .into_iter()
        .filter(|(_, ratio)| *ratio > 0.0)
        .count();
    print_count("columns with missing values", with_missing, None);
    print_step_time(step_start.elapsed());

    // Step 2: Train every target
    print_step_header(2, "Train Targets");
    let step_start = Instant::now();
    let store = ArtifactStore::new(artifacts);
    let spinner = create_spinner(&format!(
        "Training {} target(s): imputation, selection, clustering, model search...",
        config.targets.len()
    ));
    let outcome = match run_training(&df, &store, config, Some(input)) {
        Ok(outcome) => outcome,
        Err(e) => {
            finish_with_failure(&spinner, "Training failed, no generation committed");
            return Err(e).context("Training failed");
        }
    };
    finish_with_success(&spinner, "All targets trained");
    print_success(&format!("Generation {} committed", outcome.generation_id));
    print_step_time(step_start.elapsed());

    TrainingSummary::new(&outcome.report).display();

    println!();
    print_info(&format!(
        "Artifacts: {}",
        style(store.root().join("generations").join(&outcome.generation_id).display()).dim()
    ));
    print_completion("Training complete!");
    Ok(())
}

/// Predict every target for `input` with the current generation
pub fn run_predict(
    input: &Path,
    artifacts: &Path,
    output: Option<&Path>,
    archive_dir: Option<&Path>,
) -> Result<()> {
    let output = output
        .map(Path::to_path_buf)
        .unwrap_or_else(|| default_predictions_path(input));

    print_step_header(1, "Load Generation");
    let store = ArtifactStore::new(artifacts);
    let generation = store
        .load_current()
        .with_context(|| format!("Failed to load artifacts from {}", artifacts.display()))?;
    print_success(&format!("Generation {} loaded", generation.id()));
    let router = PredictionRouter::new(Arc::new(generation));

    print_step_header(2, "Predict");
    let step_start = Instant::now();
    let df = load_dataframe(input)
        .with_context(|| format!("Failed to load dataset: {}", input.display()))?;
    row_ids(&df, &router.generation().manifest.config.id_column)
        .context("Input rows failed validation")?;

    if let Some(dir) = archive_dir {
        let archive = RowArchive::spawn(dir)
            .with_context(|| format!("Failed to start row archive in {}", dir.display()))?;
        let label = input
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("rows");
        archive.submit(label, &df);
    }

    let spinner = create_spinner("Routing rows to cluster models...");
    let result = router.predict(&df)?;
    finish_with_success(&spinner, &format!("{} rows predicted", result.rows.len()));

    result
        .write(&output)
        .with_context(|| format!("Failed to write predictions: {}", output.display()))?;
    print_step_time(step_start.elapsed());

    PredictionSummary::new(&result).display();
    if !result.failures.is_empty() {
        println!();
        print_warning(&format!(
            "{} (row, target) pairs received no prediction",
            result.failures.len()
        ));
    }

    println!();
    print_info(&format!("Predictions: {}", style(output.display()).dim()));
    print_completion("Prediction complete!");
    Ok(())
}

/// List committed generations
pub fn run_generations(artifacts: &Path) -> Result<()> {
    let store = ArtifactStore::new(artifacts);
    let generations = store
        .list_generations()
        .with_context(|| format!("Failed to read generations in {}", artifacts.display()))?;
    if generations.is_empty() {
        print_info("No generations committed yet");
        return Ok(());
    }
    display_generations(&generations);
    Ok(())
}

/// Export a generation as a zip bundle
pub fn run_export(artifacts: &Path, output: &Path, generation: Option<&str>) -> Result<()> {
    let store = ArtifactStore::new(artifacts);
    let spinner = create_spinner("Packaging generation...");
    let id = match store.export_zip(generation, output) {
        Ok(id) => id,
        Err(e) => {
            finish_with_failure(&spinner, "Export failed");
            return Err(e).context("Failed to export generation");
        }
    };
    finish_with_success(&spinner, &format!("Generation {} exported", id));
    print_info(&format!("Bundle: {}", style(output.display()).dim()));
    Ok(())
}
