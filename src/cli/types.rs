//! CLI type definitions
//!
//! This module contains clap command structures that define the CLI interface.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use super::commands::{
    batch::BatchArgs, history::HistoryArgs, lineage::LineageArgs, list::ListArgs,
    validate::ValidateArgs,
};

#[derive(Parser, Debug)]
#[command(name = "vigil")]
#[command(about = "Vigil - iterative requirement validation with a provenance ledger", long_about = None)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Output in JSON format
    #[arg(short, long, global = true)]
    pub json: bool,

    /// Configuration file (defaults to .vigil/config.yaml and .vigil/local.yaml)
    #[arg(short, long, global = true, env = "VIGIL_CONFIG")]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Validate one requirement
    Validate(ValidateArgs),

    /// Validate every requirement in a YAML or JSON file
    Batch(BatchArgs),

    /// Show the iteration history of a requirement
    History(HistoryArgs),

    /// Show the split parent and children of a requirement
    Lineage(LineageArgs),

    /// List known requirements
    List(ListArgs),
}
