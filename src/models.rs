use chrono::NaiveDate;
use serde::Serialize;

/// Composite key used by every join in the pipeline.
pub type SkuLocation = (String, String);

/// One row per (SKU, Location, Date): the unit of the cycle analysis.
#[derive(Debug, Clone, PartialEq)]
pub struct DailySnapshot {
    pub sku: String,
    pub location: String,
    pub date: NaiveDate,
    pub in_stock_qty: f64,
}

/// Derived stock statistics for one (SKU, Location) key, recomputed fresh
/// on every run from the daily snapshot series.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StockCycleStats {
    pub last_in_stock_date: Option<NaiveDate>,
    pub avg_days_in_stock_per_cycle: f64,
    /// Sample standard deviation of the raw quantity series; `None` below
    /// two observations.
    pub stock_variability: Option<f64>,
    /// Count of in->out transitions inside the window.
    pub stockout_frequency: u32,
    pub total_days_in_stock: u32,
    pub total_in_stock_qty: f64,
}

/// Net sales for one (SKU, Location) key over one query window.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct SalesRecord {
    pub net_sold: f64,
    pub avg_price: f64,
    pub total_cost: f64,
}

/// Present-day inventory snapshot row, carrying the free-text supplier SKU
/// used for catalogue reconciliation.
#[derive(Debug, Clone, Default)]
pub struct CurrentInventoryRow {
    pub sku: String,
    pub location: String,
    pub in_stock_qty: f64,
    /// May contain multiple comma-separated vendor codes.
    pub supplier_sku: String,
    pub on_order: f64,
    pub product: String,
    pub brand: String,
    pub classification: String,
    pub first_received: Option<NaiveDate>,
    pub last_received: Option<NaiveDate>,
}

/// Flat row produced by the order dataset builder: current inventory joined
/// with both sales windows and the cycle statistics.
#[derive(Debug, Clone)]
pub struct OrderRow {
    pub sku: String,
    pub location: String,
    /// Normalized vendor code extracted from the supplier SKU field.
    pub supplier_code: String,
    pub product: String,
    pub brand: String,
    pub classification: String,
    pub in_stock_qty: f64,
    pub on_order: f64,
    pub week_sales: SalesRecord,
    pub hist_sales: SalesRecord,
    pub stats: StockCycleStats,
    /// NaN when the key had zero stocked days: "unknown", never zero.
    pub sales_per_day: f64,
    pub first_received: Option<NaiveDate>,
    pub last_received: Option<NaiveDate>,
}

/// A spreadsheet cell carried through the pipeline without interpretation.
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    Text(String),
    Number(f64),
    Date(NaiveDate),
    Empty,
}

impl CellValue {
    pub fn as_text(&self) -> String {
        match self {
            CellValue::Text(s) => s.clone(),
            CellValue::Number(n) => {
                if n.fract() == 0.0 && n.abs() < 1e15 {
                    format!("{}", *n as i64)
                } else {
                    format!("{}", n)
                }
            }
            CellValue::Date(d) => d.format("%Y-%m-%d").to_string(),
            CellValue::Empty => String::new(),
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            CellValue::Number(n) => Some(*n),
            CellValue::Text(s) => s.trim().parse::<f64>().ok(),
            _ => None,
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            CellValue::Empty => true,
            CellValue::Text(s) => s.trim().is_empty(),
            _ => false,
        }
    }
}

/// A flat table ready for the workbook emitter: a shared header plus rows
/// tagged with the location they belong to.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReportTable {
    pub headers: Vec<String>,
    pub rows: Vec<TableRow>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TableRow {
    pub location: String,
    pub cells: Vec<CellValue>,
}

impl ReportTable {
    /// Distinct locations in first-seen order. Rows with an empty location
    /// are not counted as a group of their own.
    pub fn locations(&self) -> Vec<String> {
        let mut seen = Vec::new();
        for row in &self.rows {
            if !row.location.is_empty() && !seen.contains(&row.location) {
                seen.push(row.location.clone());
            }
        }
        seen
    }
}
