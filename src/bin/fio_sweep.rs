//! fio parameter sweep CLI
//!
//! Runs the full Cartesian sweep, re-exports stored reports as CSV tables,
//! and manages sweep configuration files.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use fio_sweep::axes::{Axis, AxisSet};
use fio_sweep::executor::FioExecutor;
use fio_sweep::sweep::SweepOrchestrator;
use fio_sweep::{config, report, OperationMode, SweepConfig};
use std::fs;
use std::path::PathBuf;
use tracing::warn;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "fio-sweep")]
#[command(about = "Cartesian parameter sweep runner for fio")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a sweep over block size, job count and queue depth
    Run {
        /// Operation mode (all runs read and write separately per combination)
        #[arg(short, long, value_enum, default_value = "read")]
        mode: OperationMode,

        /// Block sizes to sweep, e.g. --bs 4k 64k 1m
        #[arg(long, num_args = 1.., required = true)]
        bs: Vec<String>,

        /// numjobs values to sweep
        #[arg(long, num_args = 1.., required = true)]
        numjobs: Vec<String>,

        /// iodepth values to sweep
        #[arg(long, num_args = 1.., required = true)]
        iodepth: Vec<String>,

        /// Override the base output directory
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Re-export a stored sweep report as a CSV table
    Table {
        /// Path to a sweep_report.json
        report: PathBuf,

        /// Output CSV path (defaults to <report>_result.csv next to the input)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Configuration helpers
    Config {
        #[command(subcommand)]
        action: ConfigCommands,
    },
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Write a default configuration file
    Generate {
        #[arg(short, long, default_value = "fio_sweep.toml")]
        output: PathBuf,
    },

    /// Validate a configuration file
    Validate { path: PathBuf },

    /// Print the resolved configuration
    Show,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = match &cli.config {
        Some(path) => SweepConfig::from_file(path)
            .with_context(|| format!("failed to load config {}", path.display()))?,
        None => config::load_with_defaults(),
    };

    match cli.command {
        Commands::Run {
            mode,
            bs,
            numjobs,
            iodepth,
            output,
        } => run_sweep(config, mode, bs, numjobs, iodepth, output),
        Commands::Table { report, output } => export_table(report, output),
        Commands::Config { action } => match action {
            ConfigCommands::Generate { output } => {
                SweepConfig::default().to_file(&output)?;
                println!("configuration written to {}", output.display());
                Ok(())
            }
            ConfigCommands::Validate { path } => {
                SweepConfig::from_file(&path)
                    .with_context(|| format!("invalid configuration {}", path.display()))?;
                println!("{} is valid", path.display());
                Ok(())
            }
            ConfigCommands::Show => {
                println!("{}", toml::to_string_pretty(&config)?);
                Ok(())
            }
        },
    }
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn run_sweep(
    mut config: SweepConfig,
    mode: OperationMode,
    bs: Vec<String>,
    numjobs: Vec<String>,
    iodepth: Vec<String>,
    output: Option<PathBuf>,
) -> Result<()> {
    if let Some(output) = output {
        config.output_dir = output;
    }

    let axes = AxisSet::new(vec![
        Axis::new("bs", bs),
        Axis::new("numjobs", numjobs),
        Axis::new("iodepth", iodepth),
    ]);

    let results_dir = report::timestamped_dir(&config.output_dir);
    fs::create_dir_all(&results_dir)
        .with_context(|| format!("failed to create {}", results_dir.display()))?;
    fs::create_dir_all(&config.target_dir)
        .with_context(|| format!("failed to create {}", config.target_dir.display()))?;

    let executor = FioExecutor::new(config, results_dir.clone());
    let orchestrator = SweepOrchestrator::new(mode);
    let sweep_report = orchestrator
        .run(&axes, &executor)
        .context("sweep rejected before any run started")?;

    report::save_report(&sweep_report, &results_dir)?;
    report::write_csv(&sweep_report.grid, &results_dir.join("sweep_table.csv"))?;

    print!("{}", report::render_surface_tables(&sweep_report.grid));
    println!(
        "completed {} combinations, {} failures, results in {}",
        sweep_report.completed_runs,
        sweep_report.failures.len(),
        results_dir.display()
    );
    for failure in &sweep_report.failures {
        warn!(
            combination = %failure.combination,
            rw = ?failure.rw,
            stage = ?failure.stage,
            "{}", failure.message
        );
    }
    Ok(())
}

fn export_table(report_path: PathBuf, output: Option<PathBuf>) -> Result<()> {
    let sweep_report = report::load_report(&report_path)
        .with_context(|| format!("failed to load report {}", report_path.display()))?;

    let csv_path = output.unwrap_or_else(|| {
        let stem = report_path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "sweep_report".to_string());
        report_path.with_file_name(format!("{}_result.csv", stem))
    });

    report::write_csv(&sweep_report.grid, &csv_path)?;
    println!("table written to {}", csv_path.display());
    Ok(())
}
