//! Top-level application orchestration.
//!
//! `src/main.rs` is intentionally tiny; this module is the "real main" that:
//! - parses CLI arguments
//! - resolves the requested month against the Eastern-time clock
//! - builds the engine with a live or sample feed source
//! - runs the generation pipeline and prints reports

use clap::Parser;

use crate::cache::now_eastern;
use crate::cli::{Command, GenerateArgs};
use crate::data::sample::SampleCurveSource;
use crate::data::treasury::{CurveSource, HttpCurveSource};
use crate::domain::{EngineConfig, MonthKey};
use crate::error::AppError;

pub mod pipeline;

use pipeline::Engine;

/// Entry point for the `treas` binary.
pub fn run() -> Result<(), AppError> {
    // We want bare `treas` and `treas -m 202507` to behave like
    // `treas generate ...`. Clap requires a subcommand name, so we do a
    // small, explicit rewrite of the argv list before parsing.
    let argv = rewrite_args(std::env::args().collect());
    let cli = crate::cli::Cli::parse_from(argv);

    match cli.command {
        Command::Generate(args) => handle_generate(args, OutputMode::Full),
        Command::Rank(args) => handle_generate(args, OutputMode::RankOnly),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OutputMode {
    Full,
    RankOnly,
}

fn handle_generate(args: GenerateArgs, mode: OutputMode) -> Result<(), AppError> {
    let now = now_eastern();
    let month = match &args.month {
        Some(raw) => MonthKey::parse(raw)?,
        None => MonthKey::from_date(now.date_naive()),
    };

    let source: Box<dyn CurveSource> = if args.sample {
        Box::new(SampleCurveSource::new(args.seed))
    } else {
        Box::new(HttpCurveSource::new(args.insecure)?)
    };

    let config = EngineConfig {
        out_dir: args.out.clone(),
        insecure: args.insecure,
        trend_window: args.window,
        penalty_weight: args.penalty_weight,
    };
    let engine = Engine::new(source, config.clone())?;

    let generation = engine.generate(month, args.force, now)?;

    if let Some(reason) = &generation.stale_reason {
        eprintln!("Warning: serving stale cached data for {month}: {reason}");
    }

    match mode {
        OutputMode::Full => {
            let status = if generation.regenerated {
                "Generated new artifacts"
            } else {
                "Using cached artifacts"
            };
            println!("{status} for {month}.");
            println!(
                "Artifacts: {}",
                engine.store().series_csv_path(month).display()
            );
            println!();
            println!(
                "{}",
                crate::report::format_summary(month, &generation.ranking, &config)
            );
        }
        OutputMode::RankOnly => {
            println!("{}", crate::report::format_ranking(&generation.ranking));
        }
    }

    Ok(())
}

/// Rewrite argv so `treas` defaults to `treas generate`.
///
/// Rules:
/// - `treas`                     -> `treas generate`
/// - `treas -m 202507 ...`       -> `treas generate -m 202507 ...`
/// - `treas --help/--version/-h` -> unchanged (show top-level help/version)
fn rewrite_args(mut argv: Vec<String>) -> Vec<String> {
    let Some(arg1) = argv.get(1).cloned() else {
        argv.push("generate".to_string());
        return argv;
    };

    let is_top_level_help_or_version =
        matches!(arg1.as_str(), "-h" | "--help" | "-V" | "--version" | "help");
    if is_top_level_help_or_version {
        return argv;
    }

    let is_subcommand = matches!(arg1.as_str(), "generate" | "rank");
    if is_subcommand {
        return argv;
    }

    // If the first token is a flag, treat it as "generate flags".
    if arg1.starts_with('-') {
        argv.insert(1, "generate".to_string());
        return argv;
    }

    argv
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn bare_invocation_defaults_to_generate() {
        assert_eq!(args(&["treas", "generate"]), rewrite_args(args(&["treas"])));
        assert_eq!(
            args(&["treas", "generate", "-m", "202507"]),
            rewrite_args(args(&["treas", "-m", "202507"]))
        );
    }

    #[test]
    fn explicit_subcommands_and_help_pass_through() {
        assert_eq!(
            args(&["treas", "rank", "--sample"]),
            rewrite_args(args(&["treas", "rank", "--sample"]))
        );
        assert_eq!(args(&["treas", "--help"]), rewrite_args(args(&["treas", "--help"])));
    }
}
