#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! CLI entry point for the crime table builder.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use crime_table_cli_utils::{IndicatifProgress, init_logger};
use crime_table_crime_models::{OUTPUT_COLUMNS, RAW_COLUMNS};
use crime_table_pipeline::config::PipelineConfig;
use crime_table_pipeline::run_config;

#[derive(Parser)]
#[command(
    name = "crime_table",
    about = "Merge yearly crime CSVs into one normalized dataset"
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// TOML config file (overrides `CRIME_TABLE_CONFIG`)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Load, normalize, and merge every configured year (default)
    Run(RunArgs),
    /// Print the raw and output column schemas
    Columns,
}

#[derive(Args, Default)]
struct RunArgs {
    /// First year to process
    #[arg(long)]
    start_year: Option<i32>,
    /// Last year to process (inclusive)
    #[arg(long)]
    end_year: Option<i32>,
    /// Maximum number of years processed at once
    #[arg(long)]
    workers: Option<usize>,
    /// Input path template containing `{year}`
    #[arg(long)]
    input: Option<String>,
    /// Output CSV path
    #[arg(long)]
    output: Option<PathBuf>,
    /// Omit the leading row index column
    #[arg(long)]
    no_index: bool,
}

impl RunArgs {
    fn apply(self, config: &mut PipelineConfig) {
        if let Some(start_year) = self.start_year {
            config.start_year = start_year;
        }
        if let Some(end_year) = self.end_year {
            config.end_year = end_year;
        }
        if let Some(workers) = self.workers {
            config.max_workers = workers;
        }
        if let Some(input) = self.input {
            config.input_template = input;
        }
        if let Some(output) = self.output {
            config.output_path = output;
        }
        if self.no_index {
            config.write_index = false;
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let multi = init_logger();
    let cli = Cli::parse();

    let args = match cli.command {
        Some(Commands::Columns) => {
            println!("raw:    {}", RAW_COLUMNS.join(", "));
            println!("output: {}", OUTPUT_COLUMNS.join(", "));
            return Ok(());
        }
        Some(Commands::Run(args)) => args,
        None => RunArgs::default(),
    };

    let mut config = PipelineConfig::resolve(cli.config.as_deref())?;
    args.apply(&mut config);
    log::debug!("Resolved config: {config:?}");

    let progress = IndicatifProgress::years_bar(&multi, "Processing years");

    match run_config(&config, progress).await {
        Ok(summary) => {
            log::info!(
                "Wrote {} rows from {} year(s) to {} in {:.1}s ({} without coordinates)",
                summary.rows,
                summary.years,
                config.output_path.display(),
                summary.elapsed.as_secs_f64(),
                summary.missing_coordinates
            );
            Ok(())
        }
        Err(e) => {
            let mut message = e.to_string();
            let mut cause = std::error::Error::source(&e);
            while let Some(inner) = cause {
                message.push_str(": ");
                message.push_str(&inner.to_string());
                cause = inner.source();
            }
            log::error!("Run failed: {message}");
            Err(e.into())
        }
    }
}
