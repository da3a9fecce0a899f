//! Reservation Advisor
//!
//! Matches Azure Advisor reserved-instance savings to running VMs from an
//! inventory report export, then prices the matches against the Azure Retail
//! Prices API and a catalog site for Windows VMs.

use clap::{Args, Parser, Subcommand};
use core_config::tracing::{init_tracing_with_filter, install_color_eyre};
use core_config::{Environment, FromEnv};
use eyre::{Result, eyre};
use serde::Serialize;
use std::path::PathBuf;
use tracing::{info, warn};

mod artifacts;
mod config;
mod pipeline;
mod providers;
mod workbook;

use config::Config;
use pipeline::ReservationPipeline;

/// Default log filters when `RUST_LOG` is not set
const DEVELOPMENT_LOG_FILTER: &str = "info,reservation_advisor=debug,domain_reservations=debug";
const PRODUCTION_LOG_FILTER: &str = "info,reqwest=warn,html5ever=error";

/// Report export layout expected under the input directory
const INPUT_LAYOUT: &str = "\
Input: a directory matching the report pattern (default AzureResourceInventory_Report_*)
holding the workbook's sheets saved as CSV: `Advisor.csv` and `Virtual Machines.csv`.
An .xlsx export must be converted sheet by sheet before running.";

#[derive(Parser)]
#[command(name = "reservation-advisor")]
#[command(about = "Match Azure Advisor reservation savings to running VMs and price them")]
#[command(after_help = INPUT_LAYOUT)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args, Clone)]
struct Paths {
    /// Directory containing inventory report exports (each a folder of
    /// `Advisor.csv` and `Virtual Machines.csv`)
    #[arg(short, long)]
    input_dir: Option<PathBuf>,

    /// Directory for artifacts and reports
    #[arg(short, long)]
    output_dir: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Match advisor recommendations to running VMs (writes output.json and inputs.json)
    Recommend {
        #[command(flatten)]
        paths: Paths,
    },

    /// Price previously matched VMs and write the cost reports
    Price {
        #[command(flatten)]
        paths: Paths,
    },

    /// Run both phases back to back
    Run {
        #[command(flatten)]
        paths: Paths,
    },
}

impl Commands {
    fn paths(&self) -> &Paths {
        match self {
            Commands::Recommend { paths } | Commands::Price { paths } | Commands::Run { paths } => {
                paths
            }
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    install_color_eyre();

    let config = Config::from_env()?;
    let environment = Environment::from_env();
    init_tracing_with_filter(&environment, Some(log_filter(&environment)));

    let cli = Cli::parse();
    let paths = cli.command.paths().clone();
    let config = config.with_overrides(paths.input_dir, paths.output_dir);

    info!(
        input_dir = %config.input_dir.display(),
        output_dir = %config.output_dir.display(),
        "Starting reservation advisor"
    );
    let pipeline = ReservationPipeline::new(config)?;

    tokio::select! {
        result = execute(&pipeline, cli.command) => result,
        _ = tokio::signal::ctrl_c() => {
            warn!("Interrupted, partial artifacts may remain in the output directory");
            Err(eyre!("Interrupted by user"))
        }
    }
}

async fn execute(pipeline: &ReservationPipeline, command: Commands) -> Result<()> {
    match command {
        Commands::Recommend { .. } => {
            let result = pipeline.recommend()?;
            info!(selected = result.selected, "Recommendation phase complete");
            print_json(&result)?;
        }

        Commands::Price { .. } => {
            let result = pipeline.price().await?;
            info!(
                rows = result.estimate_rows,
                duration_ms = result.duration_ms,
                "Pricing phase complete"
            );
            print_json(&result)?;
        }

        Commands::Run { .. } => {
            let recommended = pipeline.recommend()?;
            if recommended.selected == 0 {
                warn!("No recommendations selected, pricing an empty match set");
            }
            let priced = pipeline.price().await?;
            info!(
                selected = recommended.selected,
                rows = priced.estimate_rows,
                duration_ms = priced.duration_ms,
                "Run complete"
            );
            print_json(&RunResult {
                recommend: recommended,
                price: priced,
            })?;
        }
    }

    Ok(())
}

#[derive(Serialize)]
struct RunResult {
    recommend: pipeline::RecommendResult,
    price: pipeline::PricingResult,
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn log_filter(environment: &Environment) -> &'static str {
    if environment.is_production() {
        PRODUCTION_LOG_FILTER
    } else {
        DEVELOPMENT_LOG_FILTER
    }
}
