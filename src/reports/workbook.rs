use std::path::Path;

use chrono::{NaiveDate, NaiveDateTime};
use rust_xlsxwriter::{Format, Workbook, Worksheet};
use tracing::{info, instrument};

use crate::errors::ServiceError;
use crate::models::{CellValue, ReportTable, TableRow};

/// Excel caps sheet names at 31 characters.
const MAX_SHEET_NAME: usize = 31;

/// Run metadata written to the Info sheet so a buyer can see what the
/// numbers were computed from.
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub generated_at: NaiveDateTime,
    pub receiving_date: NaiveDate,
    pub coverage_days: i64,
    pub historical_days: u32,
    pub exclude_today: bool,
    pub catalogue_source: String,
    pub snapshot_days_fetched: usize,
    pub snapshot_days_failed: usize,
}

/// Writes the reconciled table as a multi-sheet workbook: one sheet per
/// store location, a combined "All_Locations" sheet whenever any location
/// exists, and an Info sheet with the run metadata.
#[instrument(skip(table, summary), fields(rows = table.rows.len()))]
pub fn write_workbook(
    table: &ReportTable,
    summary: &RunSummary,
    path: &Path,
) -> Result<(), ServiceError> {
    let mut workbook = Workbook::new();
    let header_format = Format::new().set_bold();
    let date_format = Format::new().set_num_format("yyyy-mm-dd");

    let locations = table.locations();
    if locations.is_empty() {
        let sheet = workbook.add_worksheet();
        sheet.set_name("Catalogue")?;
        write_table(sheet, &table.headers, &table.rows, &header_format, &date_format)?;
    } else {
        // Reserved names so a location cannot shadow the fixed sheets.
        let mut used_names = vec!["All_Locations".to_string(), "Info".to_string()];
        for location in &locations {
            let rows: Vec<TableRow> = table
                .rows
                .iter()
                .filter(|r| &r.location == location)
                .cloned()
                .collect();
            let sheet = workbook.add_worksheet();
            sheet.set_name(unique_sheet_name(location, &mut used_names))?;
            write_table(sheet, &table.headers, &rows, &header_format, &date_format)?;
        }

        // Combined view carries the location as an extra first column.
        // Written even for a single location so the sheet set is stable.
        let mut headers = vec!["Location".to_string()];
        headers.extend(table.headers.iter().cloned());
        let rows: Vec<TableRow> = table
            .rows
            .iter()
            .map(|r| {
                let mut cells = vec![CellValue::Text(r.location.clone())];
                cells.extend(r.cells.iter().cloned());
                TableRow {
                    location: r.location.clone(),
                    cells,
                }
            })
            .collect();
        let sheet = workbook.add_worksheet();
        sheet.set_name("All_Locations")?;
        write_table(sheet, &headers, &rows, &header_format, &date_format)?;
    }

    write_info_sheet(
        workbook.add_worksheet(),
        summary,
        &locations,
        table.rows.len(),
        &header_format,
        &date_format,
    )?;

    let sheet_total = if locations.is_empty() {
        2
    } else {
        locations.len() + 2
    };
    workbook.save(path)?;
    info!(path = %path.display(), sheets = sheet_total, "workbook written");
    Ok(())
}

fn write_table(
    sheet: &mut Worksheet,
    headers: &[String],
    rows: &[TableRow],
    header_format: &Format,
    date_format: &Format,
) -> Result<(), ServiceError> {
    for (col, header) in headers.iter().enumerate() {
        sheet.write_with_format(0, col as u16, header.as_str(), header_format)?;
    }
    for (i, row) in rows.iter().enumerate() {
        let r = (i + 1) as u32;
        for (col, cell) in row.cells.iter().enumerate() {
            write_cell(sheet, r, col as u16, cell, date_format)?;
        }
    }
    sheet.autofit();
    Ok(())
}

fn write_cell(
    sheet: &mut Worksheet,
    row: u32,
    col: u16,
    cell: &CellValue,
    date_format: &Format,
) -> Result<(), ServiceError> {
    match cell {
        CellValue::Text(s) => {
            sheet.write(row, col, s.as_str())?;
        }
        CellValue::Number(n) if n.is_finite() => {
            sheet.write(row, col, *n)?;
        }
        CellValue::Date(d) => {
            sheet.write_datetime_with_format(row, col, d, date_format)?;
        }
        // Non-finite numbers and empties stay blank cells.
        CellValue::Number(_) | CellValue::Empty => {}
    }
    Ok(())
}

fn write_info_sheet(
    sheet: &mut Worksheet,
    summary: &RunSummary,
    locations: &[String],
    row_count: usize,
    header_format: &Format,
    date_format: &Format,
) -> Result<(), ServiceError> {
    sheet.set_name("Info")?;
    sheet.write_with_format(0, 0, "Order Form Run", header_format)?;

    let pairs: Vec<(&str, CellValue)> = vec![
        (
            "Generation Date",
            CellValue::Text(summary.generated_at.format("%Y-%m-%d %H:%M:%S").to_string()),
        ),
        ("Receiving Date", CellValue::Date(summary.receiving_date)),
        (
            "Coverage Period (days)",
            CellValue::Number(summary.coverage_days as f64),
        ),
        (
            "Sales History Window (days)",
            CellValue::Number(summary.historical_days as f64),
        ),
        (
            "Excluded Today",
            CellValue::Text(if summary.exclude_today { "yes" } else { "no" }.to_string()),
        ),
        (
            "Catalogue Source",
            CellValue::Text(summary.catalogue_source.clone()),
        ),
        (
            "Snapshot Days Fetched",
            CellValue::Number(summary.snapshot_days_fetched as f64),
        ),
        (
            "Snapshot Days Failed",
            CellValue::Number(summary.snapshot_days_failed as f64),
        ),
        ("Locations", CellValue::Text(locations.join(", "))),
        ("Rows", CellValue::Number(row_count as f64)),
    ];
    for (offset, (key, value)) in pairs.iter().enumerate() {
        let row = 2 + offset as u32;
        sheet.write(row, 0, *key)?;
        write_cell(sheet, row, 1, value, date_format)?;
    }
    sheet.autofit();
    Ok(())
}

/// Makes a location usable as an Excel sheet name: forbidden characters
/// become dashes, spaces become underscores, and the result is truncated
/// to 31 characters.
pub fn sanitize_sheet_name(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| match c {
            ':' | '/' | '\\' | '?' | '*' | '[' | ']' => '-',
            ' ' => '_',
            other => other,
        })
        .collect();
    let cleaned = cleaned.trim_matches('\'').to_string();
    let truncated: String = cleaned.chars().take(MAX_SHEET_NAME).collect();
    if truncated.is_empty() {
        "Sheet".to_string()
    } else {
        truncated
    }
}

fn unique_sheet_name(location: &str, used: &mut Vec<String>) -> String {
    let base = sanitize_sheet_name(location);
    let mut name = base.clone();
    let mut n = 2;
    while used.iter().any(|u| u.eq_ignore_ascii_case(&name)) {
        let suffix = format!("_{}", n);
        let head: String = base.chars().take(MAX_SHEET_NAME - suffix.len()).collect();
        name = format!("{}{}", head, suffix);
        n += 1;
    }
    used.push(name.clone());
    name
}

/// Default output filename: the location when there is exactly one,
/// otherwise the location count.
pub fn default_output_name(locations: &[String], run_date: NaiveDate) -> String {
    let tag = match locations.len() {
        0 => "Catalogue".to_string(),
        1 => sanitize_sheet_name(&locations[0]),
        n => format!("{}_Locations", n),
    };
    format!("OrderForm_{}_{}.xlsx", tag, run_date.format("%Y%m%d"))
}
