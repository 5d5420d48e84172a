//! End-to-end test of the offline half of the pipeline: daily snapshots
//! through stock-cycle analytics, order dataset assembly, catalogue
//! reconciliation, and workbook emission. The written workbook is read
//! back to verify sheet layout and computed order quantities.

use std::collections::HashMap;

use calamine::{open_workbook, Data, DataType, Reader, Xlsx};
use chrono::NaiveDate;
use rust_xlsxwriter::Workbook;

use retail_ordergen::models::{CurrentInventoryRow, DailySnapshot, SalesRecord, SkuLocation};
use retail_ordergen::reports::workbook::{write_workbook, RunSummary};
use retail_ordergen::services::reconcile::{reconcile, OrderParameters};
use retail_ordergen::services::{catalogue, order_dataset, stock_cycles};

fn day(s: &str) -> NaiveDate {
    s.parse().unwrap()
}

/// Ten consecutive days of snapshots, all in stock.
fn snapshots(sku: &str, location: &str, qty: f64) -> Vec<DailySnapshot> {
    (0..10)
        .map(|offset| DailySnapshot {
            sku: sku.to_string(),
            location: location.to_string(),
            date: day("2026-02-19") + chrono::Duration::days(offset),
            in_stock_qty: qty,
        })
        .collect()
}

fn sales(sku: &str, location: &str, net_sold: f64) -> HashMap<SkuLocation, SalesRecord> {
    let mut map = HashMap::new();
    map.insert(
        (sku.to_string(), location.to_string()),
        SalesRecord {
            net_sold,
            avg_price: 10.0,
            total_cost: net_sold * 6.0,
        },
    );
    map
}

fn order_form() -> Vec<u8> {
    let mut wb = Workbook::new();
    let ws = wb.add_worksheet().set_name("Catalogue").unwrap();
    ws.write(0, 0, "Spring order form").unwrap();
    for (col, header) in ["AGLC SKU", "Product", "Format", "EachesPerCase"]
        .iter()
        .enumerate()
    {
        ws.write(3, col as u16, *header).unwrap();
    }
    ws.write(4, 0, "CNB-1001").unwrap();
    ws.write(4, 1, "Thing One").unwrap();
    ws.write(4, 2, "Pre-Roll").unwrap();
    ws.write(4, 3, 12).unwrap();
    ws.write(5, 0, "CNB-9999").unwrap();
    ws.write(5, 1, "Thing Two").unwrap();
    ws.write(5, 2, "Dried Flower").unwrap();
    ws.write(5, 3, 6).unwrap();
    wb.save_to_buffer().unwrap()
}

#[test]
fn snapshots_to_workbook_produces_reconciled_order_quantities() {
    let history = snapshots("1001", "Downtown", 3.0);
    let stats = stock_cycles::analyze(&history);
    assert_eq!(stats[&("1001".to_string(), "Downtown".to_string())].total_days_in_stock, 10);

    let inventory = vec![CurrentInventoryRow {
        sku: "1001".to_string(),
        location: "Downtown".to_string(),
        in_stock_qty: 5.0,
        supplier_sku: "OTHER-1, CNB-1001".to_string(),
        on_order: 0.0,
        product: "Thing One".to_string(),
        brand: "Brand A".to_string(),
        classification: "Pre-Roll".to_string(),
        ..Default::default()
    }];

    let week = sales("1001", "Downtown", 5.0);
    let hist = sales("1001", "Downtown", 20.0);
    let dataset = order_dataset::build(inventory, &week, &hist, &stats, "CNB-");
    assert_eq!(dataset.len(), 1);
    assert_eq!(dataset[0].supplier_code, "CNB-1001");
    assert_eq!(dataset[0].sales_per_day, 2.0);

    let cat = catalogue::load(&order_form(), &dataset);
    let params = OrderParameters {
        receiving_date: day("2026-03-08"),
        today: day("2026-03-01"),
    };
    let table = reconcile(&cat, &dataset, &params);

    let summary = RunSummary {
        generated_at: day("2026-03-01").and_hms_opt(8, 0, 0).unwrap(),
        receiving_date: day("2026-03-08"),
        coverage_days: params.coverage_days(),
        historical_days: 10,
        exclude_today: false,
        catalogue_source: cat.source.label().to_string(),
        snapshot_days_fetched: 10,
        snapshot_days_failed: 0,
    };

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("OrderForm_Downtown_20260301.xlsx");
    write_workbook(&table, &summary, &path).unwrap();

    // Read the workbook back and verify layout and numbers. The combined
    // sheet is present even for a single location.
    let mut wb: Xlsx<_> = open_workbook(&path).unwrap();
    let names = wb.sheet_names().to_vec();
    assert_eq!(
        names,
        vec![
            "Downtown".to_string(),
            "All_Locations".to_string(),
            "Info".to_string()
        ]
    );

    let range = wb.worksheet_range("Downtown").unwrap();
    let rows: Vec<Vec<Data>> = range.rows().map(|r| r.to_vec()).collect();
    let headers: Vec<String> = rows[0]
        .iter()
        .map(|d| d.to_string().trim().to_string())
        .collect();
    let sku_col = headers.iter().position(|h| h == "AGLC SKU").unwrap();
    let qty_col = headers.iter().position(|h| h == "Order Qty").unwrap();
    let match_col = headers.iter().position(|h| h == "Match").unwrap();

    // 21 days of coverage at 2 units/day against 5 on hand, 12 per case.
    assert_eq!(rows[1][sku_col].to_string(), "CNB-1001");
    assert_eq!(rows[1][qty_col].as_f64(), Some(3.1));
    assert_eq!(rows[1][match_col].to_string(), "matched");

    // Unmatched catalogue line orders nothing but stays on the form.
    assert_eq!(rows[2][sku_col].to_string(), "CNB-9999");
    assert_eq!(rows[2][qty_col].as_f64(), Some(0.0));
    assert_eq!(rows[2][match_col].to_string(), "no POS match");
}

#[test]
fn multiple_locations_gain_a_combined_sheet() {
    let mut history = snapshots("1001", "Downtown", 3.0);
    history.extend(snapshots("1001", "Uptown", 1.0));
    let stats = stock_cycles::analyze(&history);

    let inventory = vec![
        CurrentInventoryRow {
            sku: "1001".to_string(),
            location: "Downtown".to_string(),
            in_stock_qty: 5.0,
            supplier_sku: "CNB-1001".to_string(),
            classification: "Pre-Roll".to_string(),
            ..Default::default()
        },
        CurrentInventoryRow {
            sku: "1001".to_string(),
            location: "Uptown".to_string(),
            in_stock_qty: 1.0,
            supplier_sku: "CNB-1001".to_string(),
            classification: "Pre-Roll".to_string(),
            ..Default::default()
        },
    ];
    let empty = HashMap::new();
    let dataset = order_dataset::build(inventory, &empty, &empty, &stats, "CNB-");

    let cat = catalogue::load(&order_form(), &dataset);
    let params = OrderParameters {
        receiving_date: day("2026-03-08"),
        today: day("2026-03-01"),
    };
    let table = reconcile(&cat, &dataset, &params);

    let summary = RunSummary {
        generated_at: day("2026-03-01").and_hms_opt(8, 0, 0).unwrap(),
        receiving_date: day("2026-03-08"),
        coverage_days: params.coverage_days(),
        historical_days: 10,
        exclude_today: false,
        catalogue_source: cat.source.label().to_string(),
        snapshot_days_fetched: 10,
        snapshot_days_failed: 0,
    };

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("out.xlsx");
    write_workbook(&table, &summary, &path).unwrap();

    let mut wb: Xlsx<_> = open_workbook(&path).unwrap();
    assert_eq!(
        wb.sheet_names().to_vec(),
        vec![
            "Downtown".to_string(),
            "Uptown".to_string(),
            "All_Locations".to_string(),
            "Info".to_string()
        ]
    );

    let combined = wb.worksheet_range("All_Locations").unwrap();
    let first_header = combined.rows().next().unwrap()[0].to_string();
    assert_eq!(first_header, "Location");
    // Header plus two catalogue lines per location.
    assert_eq!(combined.rows().count(), 5);
}
