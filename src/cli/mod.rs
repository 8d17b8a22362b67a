//! CLI module - argument parsing and subcommands

pub mod args;
pub mod commands;

pub use args::{Cli, Commands};
pub use commands::{resolve_config, run_export, run_generations, run_predict, run_train, TrainOverrides};
