use std::sync::Arc;

use chrono::NaiveDate;
use futures::stream::{self, StreamExt};
use tracing::{info, instrument, warn};

use crate::clients::pos::{self, PosClient, ReportRow};
use crate::columns;
use crate::config::PosConfig;
use crate::errors::ServiceError;
use crate::models::DailySnapshot;

/// Pulls daily inventory-on-hand snapshots for a trailing window.
///
/// Days are fetched through a bounded-concurrency fan-out; each day fails
/// independently and a failed day simply contributes no rows. Only a window
/// where every single day failed aborts the run.
/// Outcome of a window fetch, with per-day failure counts preserved for
/// the run summary.
#[derive(Debug)]
pub struct HistoryFetch {
    pub snapshots: Vec<DailySnapshot>,
    pub days_requested: usize,
    pub days_failed: usize,
}

pub struct InventoryHistoryService {
    client: Arc<PosClient>,
    report_id: String,
    company_id: u64,
    entities: Vec<u64>,
    classifications: Vec<u64>,
    concurrency: usize,
}

impl InventoryHistoryService {
    pub fn new(client: Arc<PosClient>, cfg: &PosConfig, concurrency: usize) -> Self {
        Self {
            client,
            report_id: cfg.ioh_report_id.clone(),
            company_id: cfg.company_id,
            entities: cfg.entities.clone(),
            classifications: cfg.classifications.clone(),
            concurrency: concurrency.max(1),
        }
    }

    /// Fetches snapshots for every date in `window`, sorted by
    /// (SKU, Location, Date) ascending.
    #[instrument(skip(self, window), fields(days = window.len()))]
    pub async fn fetch_window(&self, window: &[NaiveDate]) -> Result<HistoryFetch, ServiceError> {
        let outcomes: Vec<(NaiveDate, Result<Vec<DailySnapshot>, ServiceError>)> =
            stream::iter(window.iter().copied())
                .map(|day| async move { (day, self.fetch_day(day).await) })
                .buffer_unordered(self.concurrency)
                .collect()
                .await;

        let mut snapshots = Vec::new();
        let mut failed_days = 0usize;
        for (day, outcome) in outcomes {
            match outcome {
                Ok(rows) => {
                    if rows.is_empty() {
                        info!(%day, "no inventory rows for day");
                    }
                    snapshots.extend(rows);
                }
                Err(err) => {
                    failed_days += 1;
                    warn!(%day, error = %err, "inventory day fetch failed; day skipped");
                }
            }
        }

        if !window.is_empty() && failed_days == window.len() {
            return Err(ServiceError::EmptyHistory);
        }

        snapshots.sort_by(|a, b| {
            (a.sku.as_str(), a.location.as_str(), a.date)
                .cmp(&(b.sku.as_str(), b.location.as_str(), b.date))
        });

        info!(
            rows = snapshots.len(),
            failed_days, "inventory history window assembled"
        );
        Ok(HistoryFetch {
            snapshots,
            days_requested: window.len(),
            days_failed: failed_days,
        })
    }

    async fn fetch_day(&self, day: NaiveDate) -> Result<Vec<DailySnapshot>, ServiceError> {
        let params = serde_json::json!({
            "CompanyId": self.company_id,
            "Date": day.format("%Y-%m-%d").to_string(),
            "Entities": self.entities,
            "Classifications": self.classifications,
            "InStockOnly": false,
        });

        let rows = self.client.execute_report(&self.report_id, &params).await?;
        Ok(rows.iter().map(|row| snapshot_from_row(row, day)).collect())
    }
}

fn snapshot_from_row(row: &ReportRow, day: NaiveDate) -> DailySnapshot {
    DailySnapshot {
        sku: pos::row_text(row, &columns::SKU),
        location: pos::row_text(row, &columns::LOCATION),
        date: day,
        in_stock_qty: pos::row_f64(row, &columns::STOCK_QTY),
    }
}

/// Builds the trailing window of dates ending at `reference_day`, most
/// recent first.
pub fn trailing_window(reference_day: NaiveDate, days: u16) -> Vec<NaiveDate> {
    (0..i64::from(days))
        .map(|offset| reference_day - chrono::Duration::days(offset))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trailing_window_counts_back_from_reference() {
        let end = NaiveDate::from_ymd_opt(2024, 3, 10).unwrap();
        let window = trailing_window(end, 3);
        assert_eq!(
            window,
            vec![
                NaiveDate::from_ymd_opt(2024, 3, 10).unwrap(),
                NaiveDate::from_ymd_opt(2024, 3, 9).unwrap(),
                NaiveDate::from_ymd_opt(2024, 3, 8).unwrap(),
            ]
        );
    }

    #[test]
    fn snapshot_row_extraction_uses_alternative_names() {
        let raw = serde_json::json!({
            "SKU": "AB-1",
            "Store Name": "Downtown",
            "Stock Qty": "7",
        });
        let day = NaiveDate::from_ymd_opt(2024, 3, 10).unwrap();
        let snap = snapshot_from_row(raw.as_object().unwrap(), day);
        assert_eq!(snap.sku, "AB-1");
        assert_eq!(snap.location, "Downtown");
        assert_eq!(snap.in_stock_qty, 7.0);
        assert_eq!(snap.date, day);
    }
}
