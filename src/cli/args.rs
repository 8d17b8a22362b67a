//! Command-line argument definitions using clap

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};

/// Clustreg - cluster-routed regression training and prediction
#[derive(Parser, Debug)]
#[command(name = "clustreg")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Write logs to this file instead of stderr (ANSI colors disabled).
    /// Verbosity follows RUST_LOG, defaulting to "clustreg=info".
    #[arg(long, global = true)]
    pub log_file: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Train a new generation and make it current
    Train {
        /// Training data (CSV or Parquet) with id, feature and target columns
        #[arg(short, long)]
        input: PathBuf,

        /// Artifact root directory
        #[arg(short, long)]
        artifacts: PathBuf,

        /// Row id column. Defaults to "ID"; row position is used when absent
        #[arg(long)]
        id_column: Option<String>,

        /// Target columns (comma-separated). Defaults to "Y1,Y2"
        #[arg(long, value_delimiter = ',')]
        targets: Option<Vec<String>>,

        /// JSON configuration file; command-line flags take precedence
        #[arg(long)]
        config: Option<PathBuf>,

        /// Seed for every randomized step
        #[arg(long)]
        seed: Option<u64>,

        /// Use a small hyperparameter search space (fast, less thorough)
        #[arg(long, default_value = "false")]
        quick: bool,
    },

    /// Predict every target for new rows with the current generation
    Predict {
        /// Rows to predict (CSV or Parquet); target columns are ignored
        #[arg(short, long)]
        input: PathBuf,

        /// Artifact root directory
        #[arg(short, long)]
        artifacts: PathBuf,

        /// Output file (CSV or Parquet by extension).
        /// Defaults to the input directory with a '_predictions' suffix.
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Archive the validated input rows into this directory in the background
        #[arg(long)]
        archive_dir: Option<PathBuf>,
    },

    /// List committed generations
    Generations {
        /// Artifact root directory
        #[arg(short, long)]
        artifacts: PathBuf,
    },

    /// Bundle a generation into a zip archive
    Export {
        /// Artifact root directory
        #[arg(short, long)]
        artifacts: PathBuf,

        /// Zip file to create
        #[arg(short, long)]
        output: PathBuf,

        /// Generation id; defaults to the current generation
        #[arg(long)]
        generation: Option<String>,
    },
}

/// Default prediction output: next to the input with a '_predictions' suffix
pub fn default_predictions_path(input: &Path) -> PathBuf {
    let parent = input.parent().unwrap_or_else(|| Path::new("."));
    let stem = input
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("output");
    let extension = input
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("csv");
    parent.join(format!("{}_predictions.{}", stem, extension))
}
