use std::sync::Arc;

use chrono::NaiveDate;
use tracing::{info, instrument};

use crate::clients::pos::{self, PosClient, ReportRow};
use crate::columns;
use crate::config::PosConfig;
use crate::errors::ServiceError;
use crate::models::CurrentInventoryRow;

/// Pulls the present-day inventory snapshot, including the supplier SKU
/// metadata and receiving dates used by the catalogue reconciler.
pub struct CurrentInventoryService {
    client: Arc<PosClient>,
    report_id: String,
    company_id: u64,
    entities: Vec<u64>,
    classifications: Vec<u64>,
}

impl CurrentInventoryService {
    pub fn new(client: Arc<PosClient>, cfg: &PosConfig) -> Self {
        Self {
            client,
            report_id: cfg.ioh_report_id.clone(),
            company_id: cfg.company_id,
            entities: cfg.entities.clone(),
            classifications: cfg.classifications.clone(),
        }
    }

    #[instrument(skip(self), fields(day = %reference_day))]
    pub async fn fetch(
        &self,
        reference_day: NaiveDate,
    ) -> Result<Vec<CurrentInventoryRow>, ServiceError> {
        let params = serde_json::json!({
            "CompanyId": self.company_id,
            "Date": reference_day.format("%Y-%m-%d").to_string(),
            "Entities": self.entities,
            "Classifications": self.classifications,
            "InStockOnly": false,
        });

        let rows = self.client.execute_report(&self.report_id, &params).await?;
        let inventory: Vec<CurrentInventoryRow> = rows.iter().map(inventory_from_row).collect();
        info!(rows = inventory.len(), "current inventory fetched");
        Ok(inventory)
    }
}

fn inventory_from_row(row: &ReportRow) -> CurrentInventoryRow {
    CurrentInventoryRow {
        sku: pos::row_text(row, &columns::SKU),
        location: pos::row_text(row, &columns::LOCATION),
        in_stock_qty: pos::row_f64(row, &columns::STOCK_QTY),
        supplier_sku: pos::row_text(row, &columns::SUPPLIER_SKU),
        on_order: pos::row_f64(row, &columns::ON_ORDER),
        product: pos::row_text(row, &columns::PRODUCT),
        brand: pos::row_text(row, &columns::BRAND),
        classification: pos::row_text(row, &columns::CLASSIFICATION),
        first_received: pos::row_date(row, &columns::FIRST_RECEIVED),
        last_received: pos::row_date(row, &columns::LAST_RECEIVED),
    }
}
