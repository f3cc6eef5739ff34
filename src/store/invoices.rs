//! Parsing supplier invoice CSV exports into line items.
//!
//! Expected header: `invoice_id,sku,asin,unit_cost,quantity,invoice_date`
//! with the date in epoch milliseconds. Unparseable rows are skipped with a
//! warning; a malformed file never aborts a run.

use crate::domain::{Decimal, InvoiceLineItem, Sku, TimeMs};
use std::path::Path;
use thiserror::Error;
use tracing::warn;

#[derive(Debug, Error)]
pub enum InvoiceParseError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("csv error: {0}")]
    Csv(String),
}

#[derive(Debug, serde::Deserialize)]
struct Row {
    invoice_id: String,
    sku: Option<String>,
    asin: Option<String>,
    unit_cost: String,
    quantity: i64,
    invoice_date: i64,
}

/// Parse invoice line items out of CSV bytes.
pub fn parse_invoice_csv(csv_bytes: &[u8]) -> Result<Vec<InvoiceLineItem>, InvoiceParseError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(csv_bytes);

    let mut lines = Vec::new();
    for record in reader.deserialize::<Row>() {
        let row = match record {
            Ok(row) => row,
            Err(e) => {
                warn!(error = %e, "skipping unparseable invoice row");
                continue;
            }
        };
        let unit_cost = match Decimal::parse(&row.unit_cost) {
            Ok(cost) => cost,
            Err(e) => {
                warn!(invoice = %row.invoice_id, unit_cost = %row.unit_cost, error = %e,
                    "skipping invoice row with invalid unit cost");
                continue;
            }
        };
        lines.push(InvoiceLineItem {
            invoice_id: row.invoice_id,
            sku: row.sku.filter(|s| !s.is_empty()).map(Sku::new),
            asin: row.asin.filter(|s| !s.is_empty()),
            unit_cost,
            quantity: row.quantity,
            invoice_date: TimeMs::new(row.invoice_date),
        });
    }
    Ok(lines)
}

/// Load invoice line items from a CSV file on disk.
pub fn load_invoice_file(path: &Path) -> Result<Vec<InvoiceLineItem>, InvoiceParseError> {
    let bytes = std::fs::read(path)?;
    parse_invoice_csv(&bytes)
}

/// Load every `.csv` file in a directory, concatenating line items.
/// A missing directory yields an empty set.
pub fn load_invoice_dir(dir: &Path) -> Vec<InvoiceLineItem> {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(_) => return Vec::new(),
    };

    let mut lines = Vec::new();
    for entry in entries.flatten() {
        let path = entry.path();
        if path.extension().map(|e| e == "csv").unwrap_or(false) {
            match load_invoice_file(&path) {
                Ok(mut file_lines) => lines.append(&mut file_lines),
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "skipping unreadable invoice file");
                }
            }
        }
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "\
invoice_id,sku,asin,unit_cost,quantity,invoice_date
INV-1,SKU-1,,12.50,100,1705320000000
INV-1,SKU-2,B000X,8.25,40,1705320000000
INV-2,,B000Y,3.10,500,1705406400000
";

    #[test]
    fn test_parse_sample() {
        let lines = parse_invoice_csv(SAMPLE.as_bytes()).unwrap();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0].invoice_id, "INV-1");
        assert_eq!(lines[0].sku, Some(Sku::new("SKU-1")));
        assert_eq!(lines[0].asin, None);
        assert_eq!(lines[0].unit_cost, Decimal::parse("12.50").unwrap());
        assert_eq!(lines[2].sku, None);
        assert_eq!(lines[2].asin.as_deref(), Some("B000Y"));
    }

    #[test]
    fn test_invalid_cost_row_skipped() {
        let csv = "\
invoice_id,sku,asin,unit_cost,quantity,invoice_date
INV-1,SKU-1,,not_a_number,100,1705320000000
INV-1,SKU-2,,5.00,10,1705320000000
";
        let lines = parse_invoice_csv(csv.as_bytes()).unwrap();
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].sku, Some(Sku::new("SKU-2")));
    }

    #[test]
    fn test_empty_input() {
        let lines = parse_invoice_csv(b"invoice_id,sku,asin,unit_cost,quantity,invoice_date\n")
            .unwrap();
        assert!(lines.is_empty());
    }

    #[test]
    fn test_missing_directory_yields_empty() {
        let lines = load_invoice_dir(Path::new("/definitely/not/a/real/dir"));
        assert!(lines.is_empty());
    }

    #[test]
    fn test_load_invoice_dir() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("january.csv"), SAMPLE).unwrap();
        std::fs::write(dir.path().join("notes.txt"), "ignore me").unwrap();
        let lines = load_invoice_dir(dir.path());
        assert_eq!(lines.len(), 3);
    }
}
