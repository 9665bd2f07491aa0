//! Command-line interface module for tidyplan.
//!
//! Each subcommand runs one pipeline stage: it reads the previous stage's
//! document, runs the stage, prints progress to stderr and writes its own
//! document to `--output` (or stdout).

use crate::config::Config;
use crate::document;
use crate::executor::{ApplyError, ApplyOptions, ExecutionLog, Executor};
use crate::output::OutputFormatter;
use crate::planner::{MovePlan, generate_plan};
use crate::rollback::{RollbackError, RollbackManager, RollbackOptions};
use crate::scanner::{ScanResult, Scanner};
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

/// Sort a flat directory into category folders through a reviewable plan
#[derive(Parser, Debug)]
#[command(name = "tidyplan", version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file (TOML)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Suppress progress output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Scan a directory and categorize its files by extension
    Scan {
        /// Directory to scan (default: ~/Downloads)
        #[arg(short, long)]
        directory: Option<PathBuf>,

        /// Output file for the scan report (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Include a SHA-256 checksum for each file
        #[arg(long)]
        hash: bool,
    },

    /// Generate a move plan from a scan report
    Plan {
        /// Scan report to plan from
        #[arg(short, long)]
        input: PathBuf,

        /// Output file for the plan (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Base directory for organized files (default: ~/Downloads/Organized)
        #[arg(short, long)]
        target: Option<PathBuf>,
    },

    /// Execute a move plan
    Apply {
        /// Plan to execute
        #[arg(short, long)]
        input: PathBuf,

        /// Output file for the execution log (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Simulate moves without moving files
        #[arg(long)]
        dry_run: bool,

        /// Verify file checksums after each move
        #[arg(long)]
        verify_hash: bool,
    },

    /// Undo an apply run using its execution log
    Rollback {
        /// Execution log of the run to undo
        #[arg(short, long)]
        input: PathBuf,

        /// Output file for the rollback log (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Simulate the rollback without moving files
        #[arg(long)]
        dry_run: bool,

        /// Remove category directories left empty
        #[arg(long)]
        cleanup: bool,
    },
}

/// Runs one parsed command.
///
/// Returns the process exit code: failure when any apply or rollback
/// operation failed. Document-level problems (unreadable input, malformed
/// JSON, bad configuration) are returned as errors.
pub fn run_cli(cli: Cli) -> Result<ExitCode> {
    let out = OutputFormatter::new(cli.quiet);
    let config_path = cli.config.as_deref();

    match cli.command {
        Command::Scan {
            directory,
            output,
            hash,
        } => {
            let directory = directory.unwrap_or_else(default_source_dir);
            scan_command(&directory, output.as_deref(), hash, config_path, &out)
        }
        Command::Plan {
            input,
            output,
            target,
        } => {
            let target = target.unwrap_or_else(|| default_source_dir().join("Organized"));
            plan_command(&input, output.as_deref(), &target, &out)
        }
        Command::Apply {
            input,
            output,
            dry_run,
            verify_hash,
        } => {
            let options = ApplyOptions {
                dry_run,
                verify_hash,
                checkpoint: output.clone(),
            };
            apply_command(&input, output.as_deref(), &options, &out)
        }
        Command::Rollback {
            input,
            output,
            dry_run,
            cleanup,
        } => rollback_command(
            &input,
            output.as_deref(),
            RollbackOptions { dry_run, cleanup },
            &out,
        ),
    }
}

fn default_source_dir() -> PathBuf {
    std::env::var("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("."))
        .join("Downloads")
}

fn scan_command(
    directory: &Path,
    output: Option<&Path>,
    hash: bool,
    config_path: Option<&Path>,
    out: &OutputFormatter,
) -> Result<ExitCode> {
    let config = Config::load(config_path).context("Error loading configuration")?;
    let filters = config
        .compile_filters()
        .context("Error compiling filters")?;
    let table = config.category_table();

    out.info(&format!("Scanning {}...", directory.display()));
    let result = Scanner::new(&table)
        .with_filters(&filters)
        .with_hash(hash)
        .scan(directory)?;

    out.info(&format!("Found {} files", result.stats.total_files));
    out.summary_table(
        "SCAN SUMMARY",
        result
            .stats
            .by_category
            .iter()
            .map(|(category, stats)| (category, stats.count)),
        result.stats.total_files,
    );

    emit(&result, output, "Report", out)?;
    Ok(ExitCode::SUCCESS)
}

fn plan_command(
    input: &Path,
    output: Option<&Path>,
    target: &Path,
    out: &OutputFormatter,
) -> Result<ExitCode> {
    let scan: ScanResult = document::load(input)?;

    out.info(&format!("Generating plan from {}...", input.display()));
    let plan = generate_plan(&scan, target)?;

    out.info(&format!("Plan: {} files to move", plan.stats.total_moves));
    for (category, count) in plan.stats.by_category.iter() {
        out.plain(&format!("  {}: {} files", category, count));
    }

    emit(&plan, output, "Plan", out)?;
    Ok(ExitCode::SUCCESS)
}

fn apply_command(
    input: &Path,
    output: Option<&Path>,
    options: &ApplyOptions,
    out: &OutputFormatter,
) -> Result<ExitCode> {
    let plan: MovePlan = document::load(input)?;

    let mode = if options.dry_run { "[DRY RUN] " } else { "" };
    out.info(&format!(
        "{}Applying plan with {} operations...",
        mode, plan.stats.total_moves
    ));

    let log = match Executor::new(*out).apply(&plan, options) {
        Ok(log) => log,
        Err(ApplyError::Checkpoint { log, source }) => {
            out.error("Could not save the execution log, printing the partial log to stdout");
            println!("{}", document::to_json(&log)?);
            return Err(anyhow::Error::new(source).context("Failed to checkpoint execution log"));
        }
    };

    out.results(
        "success",
        log.stats.success,
        log.stats.failed,
        log.stats.skipped,
    );
    emit(&log, output, "Log", out)?;

    Ok(exit_code(log.stats.has_failures()))
}

fn rollback_command(
    input: &Path,
    output: Option<&Path>,
    options: RollbackOptions,
    out: &OutputFormatter,
) -> Result<ExitCode> {
    let log: ExecutionLog = document::load(input)?;

    let rollback_log = match RollbackManager::new(*out).rollback(&log, options) {
        Ok(rollback_log) => rollback_log,
        Err(RollbackError::DryRunLog { .. }) => {
            out.warning("This log is from a dry run, nothing to rollback");
            return Ok(ExitCode::SUCCESS);
        }
    };

    if options.dry_run {
        out.dry_run_notice("No files were moved.");
    }
    out.results(
        "restored",
        rollback_log.stats.success,
        rollback_log.stats.failed,
        rollback_log.stats.skipped,
    );
    emit(&rollback_log, output, "Log", out)?;

    Ok(exit_code(rollback_log.stats.has_failures()))
}

/// Writes a document to `output`, or to stdout when no path is given.
fn emit<T: Serialize>(
    document: &T,
    output: Option<&Path>,
    label: &str,
    out: &OutputFormatter,
) -> Result<()> {
    match output {
        Some(path) => {
            document::save(path, document)?;
            out.success(&format!("{} saved to {}", label, path.display()));
        }
        None => println!("{}", document::to_json(document)?),
    }
    Ok(())
}

fn exit_code(has_failures: bool) -> ExitCode {
    if has_failures {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}
