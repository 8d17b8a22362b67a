//! Clustreg: cluster-routed regression CLI
//!
//! Trains per-target pipelines into versioned generations and serves
//! predictions from the current one.

use anyhow::Result;
use clap::Parser;

use clustreg::cli::{
    resolve_config, run_export, run_generations, run_predict, run_train, Cli, Commands,
    TrainOverrides,
};
use clustreg::utils::init_logging;

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.log_file.as_deref())?;

    match cli.command {
        Commands::Train {
            input,
            artifacts,
            id_column,
            targets,
            config,
            seed,
            quick,
        } => {
            let config = resolve_config(
                config.as_deref(),
                TrainOverrides {
                    id_column,
                    targets,
                    seed,
                    quick,
                },
            )?;
            run_train(&input, &artifacts, &config)
        }
        Commands::Predict {
            input,
            artifacts,
            output,
            archive_dir,
        } => run_predict(&input, &artifacts, output.as_deref(), archive_dir.as_deref()),
        Commands::Generations { artifacts } => run_generations(&artifacts),
        Commands::Export {
            artifacts,
            output,
            generation,
        } => run_export(&artifacts, &output, generation.as_deref()),
    }
}
