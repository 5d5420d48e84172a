use std::collections::HashMap;

use tracing::{info, instrument};

use crate::models::{
    CellValue, CurrentInventoryRow, OrderRow, ReportTable, SalesRecord, SkuLocation,
    StockCycleStats, TableRow,
};

/// Extracts the normalized vendor code from a (possibly multi-valued)
/// supplier SKU field: split on comma, trim, uppercase, first token with
/// the configured prefix; else the raw trimmed/uppercased value; else
/// empty string.
pub fn extract_supplier_code(raw: &str, prefix: &str) -> String {
    let trimmed = raw.trim().to_uppercase();
    if trimmed.is_empty() {
        return String::new();
    }
    trimmed
        .split(',')
        .map(str::trim)
        .find(|token| token.starts_with(prefix))
        .map(str::to_string)
        .unwrap_or(trimmed)
}

/// Left-joins current inventory with both sales windows and the cycle
/// statistics on (SKU, Location). Missing sales matches zero-fill; missing
/// statistics default. Sales-per-day is NaN (unknown) when the key had zero
/// stocked days.
#[instrument(skip_all, fields(inventory = inventory.len()))]
pub fn build(
    inventory: Vec<CurrentInventoryRow>,
    week_sales: &HashMap<SkuLocation, SalesRecord>,
    hist_sales: &HashMap<SkuLocation, SalesRecord>,
    stats: &HashMap<SkuLocation, StockCycleStats>,
    supplier_prefix: &str,
) -> Vec<OrderRow> {
    let rows: Vec<OrderRow> = inventory
        .into_iter()
        .map(|item| {
            let key = (item.sku.clone(), item.location.clone());
            let week = week_sales.get(&key).copied().unwrap_or_default();
            let hist = hist_sales.get(&key).copied().unwrap_or_default();
            let key_stats = stats.get(&key).cloned().unwrap_or_default();

            let sales_per_day = if key_stats.total_days_in_stock == 0 {
                f64::NAN
            } else {
                hist.net_sold / f64::from(key_stats.total_days_in_stock)
            };

            OrderRow {
                supplier_code: extract_supplier_code(&item.supplier_sku, supplier_prefix),
                sku: item.sku,
                location: item.location,
                product: item.product,
                brand: item.brand,
                classification: item.classification,
                in_stock_qty: item.in_stock_qty,
                on_order: item.on_order,
                week_sales: week,
                hist_sales: hist,
                stats: key_stats,
                sales_per_day,
                first_received: item.first_received,
                last_received: item.last_received,
            }
        })
        .collect();

    info!(rows = rows.len(), "order dataset assembled");
    rows
}

/// Flattens the builder output into a table for the direct-write path
/// (no catalogue supplied).
pub fn to_table(rows: &[OrderRow]) -> ReportTable {
    let headers: Vec<String> = [
        "SKU",
        "Location",
        "Supplier SKU",
        "Product",
        "Brand",
        "Classification",
        "In Stock Qty",
        "On Order",
        "Week Net Sold",
        "Week Avg Price",
        "Week Total Cost",
        "Hist Net Sold",
        "Hist Avg Price",
        "Hist Total Cost",
        "Last In Stock Date",
        "Avg Days In Stock Per Cycle",
        "Stock Variability",
        "Stockout Frequency",
        "Total Days in Stock",
        "Total In Stock Qty",
        "Sales per Day",
        "First Received Date",
        "Last Received Date",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect();

    let table_rows = rows
        .iter()
        .map(|row| TableRow {
            location: row.location.clone(),
            cells: vec![
                CellValue::Text(row.sku.clone()),
                CellValue::Text(row.location.clone()),
                CellValue::Text(row.supplier_code.clone()),
                CellValue::Text(row.product.clone()),
                CellValue::Text(row.brand.clone()),
                CellValue::Text(row.classification.clone()),
                CellValue::Number(row.in_stock_qty),
                CellValue::Number(row.on_order),
                CellValue::Number(row.week_sales.net_sold),
                CellValue::Number(row.week_sales.avg_price),
                CellValue::Number(row.week_sales.total_cost),
                CellValue::Number(row.hist_sales.net_sold),
                CellValue::Number(row.hist_sales.avg_price),
                CellValue::Number(row.hist_sales.total_cost),
                date_cell(row.stats.last_in_stock_date),
                CellValue::Number(row.stats.avg_days_in_stock_per_cycle),
                row.stats
                    .stock_variability
                    .map(CellValue::Number)
                    .unwrap_or(CellValue::Empty),
                CellValue::Number(f64::from(row.stats.stockout_frequency)),
                CellValue::Number(f64::from(row.stats.total_days_in_stock)),
                CellValue::Number(row.stats.total_in_stock_qty),
                number_or_empty(row.sales_per_day),
                date_cell(row.first_received),
                date_cell(row.last_received),
            ],
        })
        .collect();

    ReportTable {
        headers,
        rows: table_rows,
    }
}

fn date_cell(date: Option<chrono::NaiveDate>) -> CellValue {
    date.map(CellValue::Date).unwrap_or(CellValue::Empty)
}

/// NaN means "unknown" and is emitted as a blank cell, never as zero.
fn number_or_empty(value: f64) -> CellValue {
    if value.is_nan() {
        CellValue::Empty
    } else {
        CellValue::Number(value)
    }
}
