//! Command-line parsing for the Treasury yield-trend tool.
//!
//! The goal of this module is to keep **argument parsing** and **command
//! dispatch** separate from the parsing/trend/cache code.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::domain::{DEFAULT_PENALTY_WEIGHT, DEFAULT_TREND_WINDOW};

/// Top-level CLI.
#[derive(Debug, Parser)]
#[command(
    name = "treas",
    version,
    about = "Treasury yield-curve trend and best-value ranking"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Fetch (or reuse cached) data for a month, write artifacts, and print
    /// the full summary.
    Generate(GenerateArgs),
    /// Print the best-value ranking only (useful for scripting).
    Rank(GenerateArgs),
}

/// Common options for generation and ranking.
#[derive(Debug, Parser, Clone)]
pub struct GenerateArgs {
    /// Month in YYYYMM; defaults to the current month (ET).
    #[arg(short = 'm', long)]
    pub month: Option<String>,

    /// Output directory for cached artifacts.
    #[arg(short = 'o', long, default_value = "out")]
    pub out: PathBuf,

    /// Regenerate regardless of the freshness window.
    #[arg(long)]
    pub force: bool,

    /// Disable TLS certificate verification (only for networks behind a
    /// proxy with a self-signed certificate).
    #[arg(long)]
    pub insecure: bool,

    /// Use a deterministic offline sample feed instead of the network.
    #[arg(long)]
    pub sample: bool,

    /// Seed for the offline sample feed.
    #[arg(long, default_value_t = 42)]
    pub seed: u64,

    /// Trailing trend window (business days with a quote).
    #[arg(long, default_value_t = DEFAULT_TREND_WINDOW)]
    pub window: usize,

    /// Penalty weight applied to a confident rising trend.
    #[arg(long, default_value_t = DEFAULT_PENALTY_WEIGHT)]
    pub penalty_weight: f64,
}
