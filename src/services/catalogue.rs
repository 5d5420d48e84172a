use std::io::Cursor;

use calamine::{open_workbook_auto_from_rs, Data, DataType, Reader};
use tracing::{info, instrument, warn};

use crate::columns::{self, FieldSource};
use crate::errors::ServiceError;
use crate::models::{CellValue, OrderRow};

/// Rows scanned while looking for the true header row.
const HEADER_SCAN_ROWS: usize = 20;

/// Sheet names tried, in order, before falling back to the first sheet.
const SHEET_NAMES: [&str; 2] = ["Catalogue", "Catalog"];

/// Case-pack defaults keyed by classification keyword, applied by substring
/// match when the order form carries no usable case-pack column.
const DEFAULT_CASE_PACKS: [(&str, f64); 12] = [
    ("Dried Flower", 6.0),
    ("Pre-Roll", 12.0),
    ("Edible", 12.0),
    ("Concentrate", 12.0),
    ("Vaporizer", 10.0),
    ("Beverage", 12.0),
    ("Topical", 12.0),
    ("Accessory", 6.0),
    ("Seeds", 10.0),
    ("Oil", 12.0),
    ("Spray", 12.0),
    ("Capsule", 12.0),
];

const FALLBACK_CASE_PACK: f64 = 12.0;

/// One product as listed in the vendor order form.
#[derive(Debug, Clone)]
pub struct CatalogueEntry {
    /// Raw cells in header order, carried to the output untouched.
    pub cells: Vec<CellValue>,
    /// Normalized (trimmed, uppercased) vendor product code.
    pub product_code: String,
    pub classification: String,
    pub case_pack: f64,
    /// How the case-pack value was obtained, carried to the output so
    /// low-confidence rows stay visible.
    pub case_pack_source: FieldSource,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CatalogueSource {
    /// Parsed from the supplied order form.
    Parsed,
    /// Rebuilt from the order dataset because the form was unusable.
    Synthesized,
}

impl CatalogueSource {
    pub fn label(&self) -> &'static str {
        match self {
            CatalogueSource::Parsed => "order form",
            CatalogueSource::Synthesized => "synthesized from POS data",
        }
    }
}

#[derive(Debug, Clone)]
pub struct Catalogue {
    pub headers: Vec<String>,
    pub entries: Vec<CatalogueEntry>,
    pub source: CatalogueSource,
}

/// Loads the catalogue from order-form bytes, degrading to a synthesized
/// catalogue when the form cannot be reliably parsed. Never fails the run.
#[instrument(skip_all)]
pub fn load(bytes: &[u8], dataset: &[OrderRow]) -> Catalogue {
    match parse(bytes) {
        Ok(catalogue) if !catalogue.entries.is_empty() => {
            info!(
                entries = catalogue.entries.len(),
                "catalogue parsed from order form"
            );
            catalogue
        }
        Ok(_) => {
            warn!("order form parsed but holds no data rows; synthesizing catalogue");
            synthesize(dataset)
        }
        Err(err) => {
            warn!(error = %err, "order form unusable; synthesizing catalogue");
            synthesize(dataset)
        }
    }
}

/// Parses the order-form spreadsheet. The header may sit anywhere within
/// the first 20 rows and column names vary across form revisions.
pub fn parse(bytes: &[u8]) -> Result<Catalogue, ServiceError> {
    let cursor = Cursor::new(bytes.to_vec());
    let mut workbook = open_workbook_auto_from_rs(cursor)
        .map_err(|e| ServiceError::CatalogueError(format!("unreadable workbook: {}", e)))?;

    let available = workbook.sheet_names().to_vec();
    let sheet = SHEET_NAMES
        .iter()
        .find_map(|wanted| {
            available
                .iter()
                .find(|name| name.eq_ignore_ascii_case(wanted))
                .cloned()
        })
        .or_else(|| available.first().cloned())
        .ok_or_else(|| ServiceError::CatalogueError("workbook has no sheets".into()))?;

    let range = workbook
        .worksheet_range(&sheet)
        .map_err(|e| ServiceError::CatalogueError(format!("sheet '{}': {}", sheet, e)))?;

    let rows: Vec<&[Data]> = range.rows().collect();
    let (header_idx, headers) = locate_header(&rows).ok_or_else(|| {
        ServiceError::CatalogueError(format!(
            "no recognizable header row in the first {} rows of sheet '{}'",
            HEADER_SCAN_ROWS, sheet
        ))
    })?;

    let code_col = columns::PRODUCT_CODE
        .resolve(&headers)
        .map(|(idx, _)| idx)
        .ok_or_else(|| {
            ServiceError::CatalogueError("header row carries no product code column".into())
        })?;
    let case_col = columns::CASE_PACK.resolve(&headers);
    let class_col = columns::CLASSIFICATION.resolve(&headers).map(|(idx, _)| idx);
    if case_col.is_none() {
        warn!("no case-pack column found; classification keyword defaults apply");
    }

    let mut entries = Vec::new();
    for raw in rows.iter().skip(header_idx + 1) {
        let cells: Vec<CellValue> = headers
            .iter()
            .enumerate()
            .map(|(i, _)| raw.get(i).map(cell_from_data).unwrap_or(CellValue::Empty))
            .collect();
        if cells.iter().all(CellValue::is_empty) {
            continue;
        }

        let product_code = cells[code_col].as_text().trim().to_uppercase();
        let classification = class_col
            .map(|i| cells[i].as_text())
            .unwrap_or_default();

        let (case_pack, case_pack_source) = match case_col {
            Some((idx, source)) => match cells[idx].as_number().filter(|n| *n > 0.0) {
                Some(n) => (n, source),
                None => (default_case_pack(&classification), FieldSource::Default),
            },
            None => (default_case_pack(&classification), FieldSource::Default),
        };

        entries.push(CatalogueEntry {
            cells,
            product_code,
            classification,
            case_pack,
            case_pack_source,
        });
    }

    Ok(Catalogue {
        headers,
        entries,
        source: CatalogueSource::Parsed,
    })
}

/// Finds the true header row: the first row within the scan limit where a
/// key column resolves by name and at least half of the populated width is
/// named.
fn locate_header(rows: &[&[Data]]) -> Option<(usize, Vec<String>)> {
    for (idx, row) in rows.iter().take(HEADER_SCAN_ROWS).enumerate() {
        let headers: Vec<String> = row
            .iter()
            .map(|d| d.as_string().unwrap_or_default().trim().to_string())
            .collect();
        if headers.is_empty() {
            continue;
        }

        let unnamed = headers.iter().filter(|h| h.is_empty()).count();
        if unnamed * 2 >= headers.len() {
            continue;
        }

        let key_found = matches!(
            columns::PRODUCT_CODE.resolve(&headers),
            Some((_, FieldSource::ExactName)) | Some((_, FieldSource::CaseInsensitiveName))
        ) || matches!(
            columns::CASE_PACK.resolve(&headers),
            Some((_, FieldSource::ExactName)) | Some((_, FieldSource::CaseInsensitiveName))
        );
        if key_found {
            return Some((idx, headers));
        }
    }
    None
}

/// Rebuilds a minimal catalogue from the order dataset so the pipeline can
/// proceed without a usable order form. One entry per distinct code.
pub fn synthesize(dataset: &[OrderRow]) -> Catalogue {
    let headers: Vec<String> = ["AGLC SKU", "Brand Name", "Product", "Format", "EachesPerCase"]
        .iter()
        .map(|s| s.to_string())
        .collect();

    let mut seen = std::collections::HashSet::new();
    let mut entries = Vec::new();
    for row in dataset {
        let code = if row.supplier_code.is_empty() {
            row.sku.trim().to_uppercase()
        } else {
            row.supplier_code.clone()
        };
        if code.is_empty() || !seen.insert(code.clone()) {
            continue;
        }
        let case_pack = default_case_pack(&row.classification);
        entries.push(CatalogueEntry {
            cells: vec![
                CellValue::Text(code.clone()),
                CellValue::Text(row.brand.clone()),
                CellValue::Text(row.product.clone()),
                CellValue::Text(row.classification.clone()),
                CellValue::Number(case_pack),
            ],
            product_code: code,
            classification: row.classification.clone(),
            case_pack,
            case_pack_source: FieldSource::Default,
        });
    }

    info!(entries = entries.len(), "catalogue synthesized");
    Catalogue {
        headers,
        entries,
        source: CatalogueSource::Synthesized,
    }
}

/// Case-pack default by classification keyword, substring matched;
/// 12 when nothing matches.
pub fn default_case_pack(classification: &str) -> f64 {
    let lower = classification.to_lowercase();
    DEFAULT_CASE_PACKS
        .iter()
        .find(|(keyword, _)| lower.contains(&keyword.to_lowercase()))
        .map(|(_, size)| *size)
        .unwrap_or(FALLBACK_CASE_PACK)
}

fn cell_from_data(data: &Data) -> CellValue {
    match data {
        Data::Empty => CellValue::Empty,
        Data::String(s) => {
            if s.trim().is_empty() {
                CellValue::Empty
            } else {
                CellValue::Text(s.clone())
            }
        }
        Data::Float(f) => CellValue::Number(*f),
        Data::Int(i) => CellValue::Number(*i as f64),
        Data::Bool(b) => CellValue::Text(b.to_string()),
        Data::DateTime(_) | Data::DateTimeIso(_) => data
            .as_date()
            .map(CellValue::Date)
            .unwrap_or(CellValue::Empty),
        Data::DurationIso(s) => CellValue::Text(s.clone()),
        Data::Error(_) => CellValue::Empty,
    }
}
