// Streaming CSV parser for uploaded bank statements

use std::collections::HashMap;
use std::fs::File;
use std::path::Path;

use chrono::NaiveDate;
use rust_decimal::{Decimal, RoundingStrategy};
use tracing::debug;

use crate::error::WorkerError;

const REQUIRED_COLUMNS: [&str; 3] = ["transaction_date", "description", "amount"];

/// One validated CSV row. Rows that fail validation are skipped silently
/// and never reach the matcher or the batch total.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedRow {
    pub transaction_date: NaiveDate,
    pub description: String,
    pub amount: Decimal,
    pub reference_number: Option<String>,
}

/// Lazy reader over an uploaded file. Validates the header eagerly (a
/// missing required column is fatal to the whole batch), then yields
/// rows in file order without ever buffering the full file.
#[derive(Debug)]
pub struct CsvStream {
    reader: csv::Reader<File>,
    columns: ColumnMap,
}

#[derive(Debug, Clone)]
struct ColumnMap {
    transaction_date: usize,
    description: usize,
    amount: usize,
    reference: Option<usize>,
}

impl CsvStream {
    pub fn open(path: &Path) -> Result<Self, WorkerError> {
        let file = File::open(path)?;
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(file);

        let headers = reader
            .headers()
            .map_err(|e| WorkerError::Parse(format!("unreadable header row: {e}")))?;

        let mut by_name: HashMap<String, usize> = HashMap::new();
        for (index, name) in headers.iter().enumerate() {
            by_name.entry(name.trim().to_lowercase()).or_insert(index);
        }

        let missing: Vec<&str> = REQUIRED_COLUMNS
            .iter()
            .copied()
            .filter(|name| !by_name.contains_key(*name))
            .collect();

        if !missing.is_empty() {
            return Err(WorkerError::Parse(format!(
                "missing required columns: {}",
                missing.join(", ")
            )));
        }

        let columns = ColumnMap {
            transaction_date: by_name["transaction_date"],
            description: by_name["description"],
            amount: by_name["amount"],
            reference: by_name
                .get("reference_number")
                .or_else(|| by_name.get("reference"))
                .copied(),
        };

        Ok(CsvStream { reader, columns })
    }

    fn parse_record(&self, record: &csv::StringRecord) -> Option<ParsedRow> {
        let date_field = record.get(self.columns.transaction_date)?.trim();
        let transaction_date = parse_date(date_field)?;

        let description = record.get(self.columns.description)?.trim();
        if description.is_empty() {
            return None;
        }

        let amount_field = record.get(self.columns.amount)?;
        let amount = parse_amount(amount_field)?;

        let reference_number = self
            .columns
            .reference
            .and_then(|index| record.get(index))
            .map(str::trim)
            .filter(|r| !r.is_empty())
            .map(str::to_string);

        Some(ParsedRow {
            transaction_date,
            description: description.to_string(),
            amount,
            reference_number,
        })
    }
}

impl Iterator for CsvStream {
    type Item = ParsedRow;

    fn next(&mut self) -> Option<ParsedRow> {
        let mut record = csv::StringRecord::new();
        loop {
            match self.reader.read_record(&mut record) {
                Ok(true) => match self.parse_record(&record) {
                    Some(row) => return Some(row),
                    None => {
                        debug!("Skipping invalid CSV row at {:?}", record.position());
                    }
                },
                Ok(false) => return None,
                Err(e) => {
                    // Malformed record: skip it like any other bad row
                    debug!("Skipping unreadable CSV record: {}", e);
                }
            }
        }
    }
}

/// Accept ISO-8601 (`YYYY-MM-DD`, longer ISO strings by prefix) and US
/// `M/D/YYYY`.
fn parse_date(field: &str) -> Option<NaiveDate> {
    if field.len() >= 10 && field.is_char_boundary(10) {
        if let Ok(date) = NaiveDate::parse_from_str(&field[..10], "%Y-%m-%d") {
            return Some(date);
        }
    }

    NaiveDate::parse_from_str(field, "%m/%d/%Y").ok()
}

/// Strip currency formatting, require a positive value, round to 2
/// decimal places half-away-from-zero.
fn parse_amount(field: &str) -> Option<Decimal> {
    let cleaned: String = field
        .chars()
        .filter(|c| *c != '$' && *c != ',' && !c.is_whitespace())
        .collect();

    let amount: Decimal = cleaned.parse().ok()?;
    if amount <= Decimal::ZERO {
        return None;
    }

    Some(amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_csv(content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file.flush().unwrap();
        file
    }

    #[test]
    fn test_parses_rows_in_order() {
        let file = write_csv(
            "transaction_date,description,amount,reference_number\n\
             2024-01-15,ACME CORP,1500.00,REF-1\n\
             1/16/2024,GLOBEX INC,\"$2,000.50\",\n",
        );

        let rows: Vec<ParsedRow> = CsvStream::open(file.path()).unwrap().collect();

        assert_eq!(rows.len(), 2);
        assert_eq!(
            rows[0].transaction_date,
            NaiveDate::from_ymd_opt(2024, 1, 15).unwrap()
        );
        assert_eq!(rows[0].amount, Decimal::new(150000, 2));
        assert_eq!(rows[0].reference_number.as_deref(), Some("REF-1"));

        assert_eq!(
            rows[1].transaction_date,
            NaiveDate::from_ymd_opt(2024, 1, 16).unwrap()
        );
        assert_eq!(rows[1].amount, Decimal::new(200050, 2));
        assert_eq!(rows[1].reference_number, None);
    }

    #[test]
    fn test_header_case_insensitive_and_reference_alias() {
        let file = write_csv(
            "Transaction_Date,DESCRIPTION,Amount,Reference\n\
             2024-02-01,WAYNE ENTERPRISES,750,W-42\n",
        );

        let rows: Vec<ParsedRow> = CsvStream::open(file.path()).unwrap().collect();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].reference_number.as_deref(), Some("W-42"));
    }

    #[test]
    fn test_missing_required_column_is_fatal() {
        let file = write_csv("transaction_date,description\n2024-01-15,ACME\n");

        let err = CsvStream::open(file.path()).unwrap_err();
        match err {
            WorkerError::Parse(msg) => assert!(msg.contains("amount")),
            other => panic!("expected parse error, got {other:?}"),
        }
    }

    #[test]
    fn test_invalid_rows_skipped_silently() {
        let file = write_csv(
            "transaction_date,description,amount\n\
             not-a-date,ACME,100.00\n\
             2024-01-15,,100.00\n\
             2024-01-15,ACME,-5.00\n\
             2024-01-15,ACME,zero\n\
             2024-01-15,ACME,100.00\n",
        );

        let rows: Vec<ParsedRow> = CsvStream::open(file.path()).unwrap().collect();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].description, "ACME");
    }

    #[test]
    fn test_iso_datetime_accepted_by_prefix() {
        let file = write_csv(
            "transaction_date,description,amount\n\
             2024-01-15T10:30:00Z,ACME,100.00\n",
        );

        let rows: Vec<ParsedRow> = CsvStream::open(file.path()).unwrap().collect();
        assert_eq!(
            rows[0].transaction_date,
            NaiveDate::from_ymd_opt(2024, 1, 15).unwrap()
        );
    }

    #[test]
    fn test_amount_rounding_half_away_from_zero() {
        let file = write_csv(
            "transaction_date,description,amount\n\
             2024-01-15,ACME,10.005\n",
        );

        let rows: Vec<ParsedRow> = CsvStream::open(file.path()).unwrap().collect();
        assert_eq!(rows[0].amount, Decimal::new(1001, 2));
    }
}
