mod catalog;
mod config;
mod http;
mod ingest;
mod logging;
mod metrics;
mod models;
mod pipeline;
#[cfg(test)]
mod testing;

use clap::{Parser, Subcommand, error::ErrorKind};
use config::LoaderConfig;
use eyre::WrapErr;
use logging::{LOG_TARGET, REPORT_TARGET, init_tracing};
use pipeline::{Job, Pipeline};
use std::{path::PathBuf, process::ExitCode};
use tracing::{error, info};

const USAGE: &str = "Usage:
  catalog-loader product <url> <accessToken> <sourceId> <csvFile>
  catalog-loader categoryMap <url> <accessToken> <sourceId> <csvFile>";

#[derive(Parser, Debug)]
#[command(name = "catalog-loader", version, about = "Load product catalogs from CSV")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Validate a product CSV and upload its products in batches
    Product(RunArgs),
    /// Publish a source-category → catalog-category map
    #[command(name = "categoryMap")]
    CategoryMap(RunArgs),
}

#[derive(clap::Args, Debug)]
struct RunArgs {
    /// Catalog service base URL (`http://` is assumed when no scheme is given)
    url: String,
    #[arg(value_name = "accessToken")]
    access_token: String,
    #[arg(value_name = "sourceId")]
    source_id: String,
    #[arg(value_name = "csvFile", value_parser = parse_csv_path)]
    csv_file: PathBuf,
}

fn parse_csv_path(raw: &str) -> Result<PathBuf, String> {
    if raw.to_ascii_lowercase().ends_with(".csv") {
        Ok(PathBuf::from(raw))
    } else {
        Err(format!("`{raw}` is not a .csv file"))
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) if matches!(err.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) => {
            err.exit()
        }
        Err(err) => {
            eprintln!("{err}");
            eprintln!("{USAGE}");
            return ExitCode::FAILURE;
        }
    };

    match run(cli).await {
        Ok(()) => {
            println!("\nStatus: OK\n");
            ExitCode::SUCCESS
        }
        Err(err) => {
            error!(target: REPORT_TARGET, "{err:#}");
            println!("\nStatus: ERROR\n");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> eyre::Result<()> {
    let _ = dotenvy::dotenv();
    init_tracing(LoaderConfig::report_log_from_env().as_deref())
        .wrap_err("cannot open the report log")?;
    let config = LoaderConfig::from_env();

    let (job, args) = match cli.command {
        Command::Product(args) => (Job::ProductLoad, args),
        Command::CategoryMap(args) => (Job::CategoryMap, args),
    };
    let ctx = config.run_context(&args.url, &args.access_token, &args.source_id, args.csv_file);
    info!(target: LOG_TARGET, run_id = %ctx.run_id, job = ?job, "run started");

    let outcome = Pipeline::new().run(ctx, job).await?;

    info!(
        target: LOG_TARGET,
        run_id = %outcome.report.run_id,
        stages = outcome.report.stages.len(),
        products = outcome.products.len(),
        diagnostics = outcome.diagnostics.len(),
        failed_batches = outcome.failed_batches(),
        "run finished"
    );
    Ok(())
}
