//! Artifact files for a generation session.

use crate::domain::error::{AppError, Result};
use crate::domain::test_case::{ColumnSchema, TestCaseRecord};
use crate::infrastructure::storage::atomic_write_bytes;
use csv::Writer;
use std::path::Path;

/// Raw records as a pretty-printed JSON array.
pub fn write_raw_json(path: &Path, records: &[TestCaseRecord]) -> Result<()> {
    let json = serde_json::to_vec_pretty(records)?;
    atomic_write_bytes(path, &json)
}

/// Reviewed table as CSV, header row first, values in column order.
pub fn write_reviewed_csv(
    path: &Path,
    columns: &ColumnSchema,
    records: &[TestCaseRecord],
) -> Result<()> {
    let bytes = reviewed_csv_bytes(columns, records)?;
    atomic_write_bytes(path, &bytes)
}

pub fn reviewed_csv_bytes(columns: &ColumnSchema, records: &[TestCaseRecord]) -> Result<Vec<u8>> {
    let mut writer = Writer::from_writer(Vec::new());
    writer
        .write_record(columns.columns())
        .map_err(|e| AppError::Internal(format!("Failed to write CSV header: {}", e)))?;
    for record in records {
        let row: Vec<&str> = columns
            .columns()
            .iter()
            .map(|column| record.get(column).unwrap_or(""))
            .collect();
        writer
            .write_record(&row)
            .map_err(|e| AppError::Internal(format!("Failed to write CSV row: {}", e)))?;
    }
    writer
        .into_inner()
        .map_err(|e| AppError::Internal(format!("Failed to flush CSV: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_raw_json_keeps_schema_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("raw.json");
        let columns = ColumnSchema::new(["TestCaseID", "Description"]);
        let records = vec![TestCaseRecord::from_values(&columns, ["TC1", "Café login"])];

        write_raw_json(&path, &records).unwrap();
        let text = fs::read_to_string(&path).unwrap();
        assert!(text.find("TestCaseID").unwrap() < text.find("Description").unwrap());
        assert!(text.contains("Café login"));
        assert_eq!(
            serde_json::from_str::<serde_json::Value>(&text).unwrap(),
            serde_json::json!([{"TestCaseID": "TC1", "Description": "Café login"}])
        );
    }

    #[test]
    fn test_reviewed_csv_quotes_fields() {
        let columns = ColumnSchema::new(["ID", "Steps"]);
        let records = vec![TestCaseRecord::from_values(&columns, ["TC1", "Open, then close"])];
        let bytes = reviewed_csv_bytes(&columns, &records).unwrap();
        assert_eq!(
            String::from_utf8(bytes).unwrap(),
            "ID,Steps\nTC1,\"Open, then close\"\n"
        );
    }

    #[test]
    fn test_empty_table_still_has_header() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("reviewed.csv");
        write_reviewed_csv(&path, &ColumnSchema::new(["A", "B"]), &[]).unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "A,B\n");
    }
}
