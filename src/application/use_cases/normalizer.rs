use crate::domain::test_case::{ColumnSchema, TestCaseRecord};
use serde_json::Value;

/// Coerces parsed items into records with exactly the schema's keys, in
/// schema order. Extra keys are dropped, missing ones become "", and
/// non-object items become all-empty records.
pub fn normalize(items: &[Value], columns: &ColumnSchema) -> Vec<TestCaseRecord> {
    items
        .iter()
        .map(|item| match item {
            Value::Object(map) => TestCaseRecord::from_values(
                columns,
                columns
                    .columns()
                    .iter()
                    .map(|column| map.get(column).map(coerce_value).unwrap_or_default()),
            ),
            _ => TestCaseRecord::empty(columns),
        })
        .collect()
}

/// Strings verbatim, null as "", everything else as compact JSON text.
pub fn coerce_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}
