use std::collections::HashMap;

use chrono::NaiveDate;
use tracing::{info, instrument};

use crate::models::{CellValue, OrderRow, ReportTable, TableRow};
use crate::services::catalogue::Catalogue;

/// Days added on top of the lead time so the order covers the gap until the
/// delivery after next.
pub const COVERAGE_EXTENSION_DAYS: i64 = 14;

/// Headers appended after the catalogue's own columns.
const COMPUTED_HEADERS: [&str; 14] = [
    "Receiving Date",
    "Days Until Receiving",
    "Coverage Period",
    "In Stock Qty",
    "On Order",
    "Sales per Day",
    "Projected Need",
    "Current Inventory",
    "Units Needed",
    "Case Size",
    "Cases Needed",
    "Order Qty",
    "Case Size Source",
    "Match",
];

#[derive(Debug, Clone, Copy)]
pub struct OrderParameters {
    pub receiving_date: NaiveDate,
    pub today: NaiveDate,
}

impl OrderParameters {
    /// Number of days the order must cover: lead time until the delivery
    /// plus the coverage extension. Lead time may be negative when the
    /// receiving date is in the past; the extension still applies.
    pub fn coverage_days(&self) -> i64 {
        self.days_until_receiving() + COVERAGE_EXTENSION_DAYS
    }

    pub fn days_until_receiving(&self) -> i64 {
        (self.receiving_date - self.today).num_days()
    }
}

/// Joins the catalogue against the order dataset, one pass per store
/// location, and computes order quantities. Every catalogue row appears for
/// every location; rows without POS data order against zero stock and zero
/// demand so a buyer can still fill them in by hand.
#[instrument(skip(catalogue, dataset), fields(entries = catalogue.entries.len(), rows = dataset.len()))]
pub fn reconcile(
    catalogue: &Catalogue,
    dataset: &[OrderRow],
    params: &OrderParameters,
) -> ReportTable {
    let mut headers = catalogue.headers.clone();
    headers.extend(COMPUTED_HEADERS.iter().map(|h| h.to_string()));

    let mut locations: Vec<String> = Vec::new();
    let mut by_location: HashMap<&str, HashMap<String, &OrderRow>> = HashMap::new();
    for row in dataset {
        if !locations.iter().any(|l| l == &row.location) {
            locations.push(row.location.clone());
        }
        // First occurrence wins when two dataset rows share a code at one
        // location (duplicate POS SKUs mapped to the same vendor code).
        by_location
            .entry(row.location.as_str())
            .or_default()
            .entry(match_key(row))
            .or_insert(row);
    }
    // Catalogue-only run: emit a single unlocated pass.
    if locations.is_empty() {
        locations.push(String::new());
    }

    let days_until = params.days_until_receiving();
    let coverage = params.coverage_days();
    let mut rows = Vec::with_capacity(locations.len() * catalogue.entries.len());

    for location in &locations {
        let lookup = by_location.get(location.as_str());
        for entry in &catalogue.entries {
            let matched = lookup.and_then(|m| m.get(&entry.product_code)).copied();

            let (in_stock, on_order, spd_raw) = match matched {
                Some(row) => (row.in_stock_qty, row.on_order, row.sales_per_day),
                None => (0.0, 0.0, 0.0),
            };
            // Unknown velocity contributes no demand to the projection.
            let spd = if spd_raw.is_nan() { 0.0 } else { spd_raw };

            let projected = spd * coverage as f64;
            let current = in_stock + on_order;
            let units_needed = (projected - current).max(0.0);
            let case_pack = if entry.case_pack > 0.0 {
                entry.case_pack
            } else {
                1.0
            };
            let cases_needed = round1(units_needed / case_pack);

            let mut cells = entry.cells.clone();
            cells.extend([
                CellValue::Date(params.receiving_date),
                CellValue::Number(days_until as f64),
                CellValue::Number(coverage as f64),
                CellValue::Number(in_stock),
                CellValue::Number(on_order),
                number_or_empty(spd_raw),
                CellValue::Number(round1(projected)),
                CellValue::Number(current),
                CellValue::Number(round1(units_needed)),
                CellValue::Number(case_pack),
                CellValue::Number(cases_needed),
                CellValue::Number(cases_needed),
                CellValue::Text(entry.case_pack_source.label().to_string()),
                CellValue::Text(
                    if matched.is_some() {
                        "matched"
                    } else {
                        "no POS match"
                    }
                    .to_string(),
                ),
            ]);
            rows.push(TableRow {
                location: location.clone(),
                cells,
            });
        }
    }

    info!(
        locations = locations.len(),
        rows = rows.len(),
        "catalogue reconciled"
    );
    ReportTable { headers, rows }
}

fn match_key(row: &OrderRow) -> String {
    if row.supplier_code.is_empty() {
        row.sku.trim().to_uppercase()
    } else {
        row.supplier_code.clone()
    }
}

fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

fn number_or_empty(value: f64) -> CellValue {
    if value.is_nan() {
        CellValue::Empty
    } else {
        CellValue::Number(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::columns::FieldSource;
    use crate::models::{SalesRecord, StockCycleStats};
    use crate::services::catalogue::{Catalogue, CatalogueEntry, CatalogueSource};

    fn day(s: &str) -> NaiveDate {
        s.parse().unwrap()
    }

    fn entry(code: &str, case_pack: f64) -> CatalogueEntry {
        CatalogueEntry {
            cells: vec![CellValue::Text(code.to_string())],
            product_code: code.to_string(),
            classification: "Pre-Roll".into(),
            case_pack,
            case_pack_source: FieldSource::ExactName,
        }
    }

    fn catalogue(entries: Vec<CatalogueEntry>) -> Catalogue {
        Catalogue {
            headers: vec!["AGLC SKU".to_string()],
            entries,
            source: CatalogueSource::Parsed,
        }
    }

    fn order_row(code: &str, location: &str, in_stock: f64, on_order: f64, spd: f64) -> OrderRow {
        OrderRow {
            sku: code.into(),
            location: location.into(),
            supplier_code: code.to_uppercase(),
            product: "p".into(),
            brand: "b".into(),
            classification: "Pre-Roll".into(),
            in_stock_qty: in_stock,
            on_order,
            week_sales: SalesRecord::default(),
            hist_sales: SalesRecord::default(),
            stats: StockCycleStats::default(),
            sales_per_day: spd,
            first_received: None,
            last_received: None,
        }
    }

    fn computed(row: &TableRow, catalogue_width: usize, header: &str) -> CellValue {
        let idx = COMPUTED_HEADERS
            .iter()
            .position(|h| *h == header)
            .expect("known computed header");
        row.cells[catalogue_width + idx].clone()
    }

    #[test]
    fn computes_order_quantities_for_a_matched_row() {
        let cat = catalogue(vec![entry("CNB-1001", 12.0)]);
        let dataset = vec![order_row("CNB-1001", "Downtown", 5.0, 0.0, 2.0)];
        let params = OrderParameters {
            receiving_date: day("2026-03-08"),
            today: day("2026-03-01"),
        };

        let table = reconcile(&cat, &dataset, &params);
        assert_eq!(table.rows.len(), 1);
        let row = &table.rows[0];
        assert_eq!(computed(row, 1, "Days Until Receiving").as_number(), Some(7.0));
        assert_eq!(computed(row, 1, "Coverage Period").as_number(), Some(21.0));
        assert_eq!(computed(row, 1, "Projected Need").as_number(), Some(42.0));
        assert_eq!(computed(row, 1, "Current Inventory").as_number(), Some(5.0));
        assert_eq!(computed(row, 1, "Units Needed").as_number(), Some(37.0));
        assert_eq!(computed(row, 1, "Cases Needed").as_number(), Some(3.1));
        assert_eq!(computed(row, 1, "Order Qty").as_number(), Some(3.1));
        assert_eq!(computed(row, 1, "Match").as_text(), "matched");
    }

    #[test]
    fn unmatched_catalogue_rows_order_against_zero_stock() {
        let cat = catalogue(vec![entry("CNB-9999", 6.0)]);
        let dataset = vec![order_row("CNB-1001", "Downtown", 5.0, 0.0, 2.0)];
        let params = OrderParameters {
            receiving_date: day("2026-03-08"),
            today: day("2026-03-01"),
        };

        let table = reconcile(&cat, &dataset, &params);
        let row = &table.rows[0];
        assert_eq!(computed(row, 1, "In Stock Qty").as_number(), Some(0.0));
        assert_eq!(computed(row, 1, "Units Needed").as_number(), Some(0.0));
        assert_eq!(computed(row, 1, "Match").as_text(), "no POS match");
    }

    #[test]
    fn every_catalogue_row_repeats_per_location() {
        let cat = catalogue(vec![entry("A", 12.0), entry("B", 12.0)]);
        let dataset = vec![
            order_row("A", "Downtown", 1.0, 0.0, 1.0),
            order_row("A", "Uptown", 2.0, 0.0, 1.0),
        ];
        let params = OrderParameters {
            receiving_date: day("2026-03-08"),
            today: day("2026-03-01"),
        };

        let table = reconcile(&cat, &dataset, &params);
        assert_eq!(table.rows.len(), 4);
        // Locations hold first-seen order; catalogue order holds within.
        assert_eq!(table.rows[0].location, "Downtown");
        assert_eq!(table.rows[2].location, "Uptown");
        assert_eq!(table.rows[0].cells[0].as_text(), "A");
        assert_eq!(table.rows[1].cells[0].as_text(), "B");
    }

    #[test]
    fn past_receiving_date_shrinks_coverage() {
        let params = OrderParameters {
            receiving_date: day("2026-03-01"),
            today: day("2026-03-05"),
        };
        assert_eq!(params.days_until_receiving(), -4);
        assert_eq!(params.coverage_days(), 10);
    }

    #[test]
    fn unknown_velocity_is_blank_but_orders_nothing() {
        let cat = catalogue(vec![entry("A", 12.0)]);
        let dataset = vec![order_row("A", "Downtown", 0.0, 0.0, f64::NAN)];
        let params = OrderParameters {
            receiving_date: day("2026-03-08"),
            today: day("2026-03-01"),
        };

        let table = reconcile(&cat, &dataset, &params);
        let row = &table.rows[0];
        assert!(computed(row, 1, "Sales per Day").is_empty());
        assert_eq!(computed(row, 1, "Projected Need").as_number(), Some(0.0));
        assert_eq!(computed(row, 1, "Cases Needed").as_number(), Some(0.0));
    }

    #[test]
    fn zero_case_pack_is_treated_as_one() {
        let cat = catalogue(vec![entry("A", 0.0)]);
        let dataset = vec![order_row("A", "Downtown", 0.0, 0.0, 1.0)];
        let params = OrderParameters {
            receiving_date: day("2026-03-08"),
            today: day("2026-03-01"),
        };

        let table = reconcile(&cat, &dataset, &params);
        let row = &table.rows[0];
        assert_eq!(computed(row, 1, "Case Size").as_number(), Some(1.0));
        assert_eq!(computed(row, 1, "Cases Needed").as_number(), Some(21.0));
    }

    #[test]
    fn duplicate_codes_at_one_location_resolve_to_the_first_row() {
        let cat = catalogue(vec![entry("A", 12.0)]);
        // Two POS SKUs mapped to the same vendor code at one location.
        let dataset = vec![
            order_row("A", "Downtown", 5.0, 0.0, 2.0),
            order_row("A", "Downtown", 9.0, 3.0, 4.0),
        ];
        let params = OrderParameters {
            receiving_date: day("2026-03-08"),
            today: day("2026-03-01"),
        };

        let table = reconcile(&cat, &dataset, &params);
        assert_eq!(table.rows.len(), 1);
        let row = &table.rows[0];
        assert_eq!(computed(row, 1, "In Stock Qty").as_number(), Some(5.0));
        assert_eq!(computed(row, 1, "Sales per Day").as_number(), Some(2.0));
    }

    #[test]
    fn identical_inputs_reconcile_identically() {
        let cat = catalogue(vec![entry("A", 12.0), entry("B", 6.0)]);
        let dataset = vec![
            order_row("A", "Downtown", 5.0, 2.0, 1.5),
            order_row("B", "Uptown", 0.0, 0.0, 0.3),
        ];
        let params = OrderParameters {
            receiving_date: day("2026-03-08"),
            today: day("2026-03-01"),
        };

        let first = reconcile(&cat, &dataset, &params);
        let second = reconcile(&cat, &dataset, &params);
        assert_eq!(first, second);
    }

    #[test]
    fn catalogue_only_run_emits_unlocated_rows() {
        let cat = catalogue(vec![entry("A", 12.0)]);
        let params = OrderParameters {
            receiving_date: day("2026-03-08"),
            today: day("2026-03-01"),
        };

        let table = reconcile(&cat, &[], &params);
        assert_eq!(table.rows.len(), 1);
        assert!(table.rows[0].location.is_empty());
        assert!(table.locations().is_empty());
    }
}
