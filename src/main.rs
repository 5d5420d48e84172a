use std::path::PathBuf;

use anyhow::Context;
use chrono::{Duration, Local, NaiveDate};
use clap::Parser;
use tracing::{error, info};

use retail_ordergen::config::{init_tracing, load_config};
use retail_ordergen::pipeline::{self, RunOptions};

/// Builds a vendor order workbook from POS inventory and sales reports.
#[derive(Parser, Debug)]
#[command(name = "retail-ordergen", version, about)]
struct Cli {
    /// Expected delivery date for the order (YYYY-MM-DD). Defaults to one
    /// week from today.
    #[arg(long)]
    receiving_date: Option<NaiveDate>,

    /// Length of the sales-history window in days.
    #[arg(long)]
    historical_days: Option<u16>,

    /// Base analytics on yesterday instead of the current (partial) day.
    #[arg(long)]
    exclude_today: bool,

    /// Vendor order form (.xlsx) to reconcile against. Without it the POS
    /// dataset is exported directly.
    #[arg(long)]
    catalogue: Option<PathBuf>,

    /// Output workbook path. Defaults to an OrderForm_<location>_<date>.xlsx
    /// name under the configured output directory.
    #[arg(long)]
    output: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = load_config().context("configuration")?;
    if let Some(days) = cli.historical_days {
        config.historical_days = days;
    }
    if cli.exclude_today {
        config.exclude_today = true;
    }

    init_tracing(config.log_level(), config.log_json);
    info!(environment = %config.environment, "starting retail-ordergen");

    let receiving_date = cli
        .receiving_date
        .unwrap_or_else(|| Local::now().date_naive() + Duration::days(7));
    let opts = RunOptions {
        receiving_date,
        catalogue_path: cli.catalogue,
        output_path: cli.output,
    };

    match pipeline::run(&config, &opts).await {
        Ok(path) => {
            info!(path = %path.display(), "order workbook written");
            println!("{}", path.display());
            Ok(())
        }
        Err(err) => {
            error!(error = %err, "order generation failed");
            Err(err.into())
        }
    }
}
