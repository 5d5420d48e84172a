use std::path::PathBuf;
use std::sync::Arc;

use chrono::{Duration, Local, NaiveDate};
use tracing::{info, instrument, warn};

use crate::clients::pos::PosClient;
use crate::config::AppConfig;
use crate::errors::ServiceError;
use crate::models::ReportTable;
use crate::reports::workbook::{self, RunSummary};
use crate::services::current_inventory::CurrentInventoryService;
use crate::services::inventory_history::{self, InventoryHistoryService};
use crate::services::reconcile::{self, OrderParameters};
use crate::services::sales::{SalesService, SalesWindow};
use crate::services::{catalogue, order_dataset, stock_cycles};

/// Per-run inputs that override the configured defaults.
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub receiving_date: NaiveDate,
    pub catalogue_path: Option<PathBuf>,
    pub output_path: Option<PathBuf>,
}

/// Runs the full inventory-to-order pipeline and returns the path of the
/// written workbook.
///
/// Stages: POS authentication, trailing inventory-on-hand history, stock
/// cycle analytics, the two sales windows, current inventory, order dataset
/// assembly, then either catalogue reconciliation (when an order form is
/// supplied) or a direct export of the dataset.
#[instrument(skip_all, fields(receiving_date = %opts.receiving_date))]
pub async fn run(config: &AppConfig, opts: &RunOptions) -> Result<PathBuf, ServiceError> {
    let today = Local::now().date_naive();
    // Today's sales and snapshots are partial until close of business.
    let reference_day = if config.exclude_today {
        today - Duration::days(1)
    } else {
        today
    };
    info!(%today, %reference_day, historical_days = config.historical_days, "pipeline started");

    let mut client = PosClient::new(&config.pos)?;
    client.authenticate(&config.pos).await?;
    let client = Arc::new(client);

    let history_service =
        InventoryHistoryService::new(Arc::clone(&client), &config.pos, config.fetch_concurrency);
    let sales_service = SalesService::new(Arc::clone(&client), &config.pos);
    let inventory_service = CurrentInventoryService::new(Arc::clone(&client), &config.pos);

    let window = inventory_history::trailing_window(reference_day, config.historical_days);
    let history = history_service.fetch_window(&window).await?;
    let stats = stock_cycles::analyze(&history.snapshots);

    let week_sales = sales_service
        .fetch_window(SalesWindow::recent_week(reference_day))
        .await?;
    let hist_sales = sales_service
        .fetch_window(SalesWindow::historical(
            reference_day,
            config.historical_days,
        ))
        .await?;

    let inventory = inventory_service.fetch(reference_day).await?;
    if inventory.is_empty() {
        warn!("current inventory report returned no rows");
    }

    let dataset = order_dataset::build(
        inventory,
        &week_sales,
        &hist_sales,
        &stats,
        &config.supplier_code_prefix,
    );

    let params = OrderParameters {
        receiving_date: opts.receiving_date,
        today,
    };

    let catalogue_path = opts
        .catalogue_path
        .clone()
        .or_else(|| config.catalogue_path.as_ref().map(PathBuf::from));
    let (table, catalogue_source): (ReportTable, String) = match catalogue_path {
        Some(path) => {
            let bytes = std::fs::read(&path)?;
            let catalogue = catalogue::load(&bytes, &dataset);
            let source = catalogue.source.label().to_string();
            (reconcile::reconcile(&catalogue, &dataset, &params), source)
        }
        None => (
            order_dataset::to_table(&dataset),
            "none (direct POS export)".to_string(),
        ),
    };

    let summary = RunSummary {
        generated_at: Local::now().naive_local(),
        receiving_date: opts.receiving_date,
        coverage_days: params.coverage_days(),
        historical_days: u32::from(config.historical_days),
        exclude_today: config.exclude_today,
        catalogue_source,
        snapshot_days_fetched: history.days_requested - history.days_failed,
        snapshot_days_failed: history.days_failed,
    };

    let output_path = match &opts.output_path {
        Some(path) => path.clone(),
        None => PathBuf::from(&config.output_dir)
            .join(workbook::default_output_name(&table.locations(), today)),
    };
    if let Some(parent) = output_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    workbook::write_workbook(&table, &summary, &output_path)?;
    info!(path = %output_path.display(), "pipeline finished");
    Ok(output_path)
}
