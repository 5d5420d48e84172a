use std::collections::HashMap;
use std::sync::Arc;

use chrono::NaiveDate;
use tracing::{info, instrument};

use crate::clients::pos::{self, PosClient, ReportRow};
use crate::columns;
use crate::config::PosConfig;
use crate::errors::ServiceError;
use crate::models::{SalesRecord, SkuLocation};

/// An inclusive date range for one sales query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SalesWindow {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl SalesWindow {
    /// The fixed recent window: the 7 days ending at `reference_day`.
    pub fn recent_week(reference_day: NaiveDate) -> Self {
        Self {
            start: reference_day - chrono::Duration::days(6),
            end: reference_day,
        }
    }

    /// The historical window, end-aligned with the stock-cycle window so
    /// sales-per-day and days-in-stock cover the same calendar span.
    pub fn historical(reference_day: NaiveDate, days: u16) -> Self {
        Self {
            start: reference_day - chrono::Duration::days(i64::from(days) - 1),
            end: reference_day,
        }
    }
}

/// Runs windowed sales queries against the reporting endpoint.
///
/// An empty response degrades to an empty result set; downstream joins
/// zero-fill the missing keys. Transport and status errors remain fatal.
pub struct SalesService {
    client: Arc<PosClient>,
    report_id: String,
    company_id: u64,
    entities: Vec<u64>,
    classifications: Vec<u64>,
}

impl SalesService {
    pub fn new(client: Arc<PosClient>, cfg: &PosConfig) -> Self {
        Self {
            client,
            report_id: cfg.sales_report_id.clone(),
            company_id: cfg.company_id,
            entities: cfg.entities.clone(),
            classifications: cfg.classifications.clone(),
        }
    }

    #[instrument(skip(self), fields(start = %window.start, end = %window.end))]
    pub async fn fetch_window(
        &self,
        window: SalesWindow,
    ) -> Result<HashMap<SkuLocation, SalesRecord>, ServiceError> {
        let params = serde_json::json!({
            "CompanyId": self.company_id,
            "DateRange": {
                "StartDate": window.start.format("%Y-%m-%d").to_string(),
                "EndDate": window.end.format("%Y-%m-%d").to_string(),
                "DateRangeType": 0,
            },
            "Entities": self.entities,
            "Classifications": self.classifications,
            "SaleType": 0,
            "UseType": 0,
            "DeliveryType": 0,
        });

        let rows = self.client.execute_report(&self.report_id, &params).await?;
        let records = records_from_rows(&rows);
        info!(keys = records.len(), "sales window fetched");
        Ok(records)
    }
}

fn records_from_rows(rows: &[ReportRow]) -> HashMap<SkuLocation, SalesRecord> {
    let mut records: HashMap<SkuLocation, SalesRecord> = HashMap::new();
    for row in rows {
        let key = (
            pos::row_text(row, &columns::SKU),
            pos::row_text(row, &columns::LOCATION),
        );
        let units = pos::row_f64(row, &columns::NET_SOLD);
        let price = pos::row_f64(row, &columns::AVG_PRICE);

        let entry = records.entry(key).or_default();
        let prev_units = entry.net_sold;
        entry.net_sold += units;
        entry.total_cost += pos::row_f64(row, &columns::TOTAL_COST);
        // Duplicate rows for one key merge by unit-weighted average price;
        // when no units were sold the latest quoted price stands.
        entry.avg_price = if entry.net_sold > 0.0 {
            (entry.avg_price * prev_units + price * units) / entry.net_sold
        } else {
            price
        };
    }
    records
}
