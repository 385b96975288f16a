use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};

use crate::shared::text::render_aligned_table;

pub const DEFAULT_COLUMNS: [&str; 6] = [
    "TestCaseID",
    "Description",
    "Requirement",
    "ExpectedResult",
    "Priority",
    "Notes",
];

/// Column name that carries the test case identifier, when the schema has one.
pub const ID_COLUMN: &str = "TestCaseID";

/// Ordered field names every record of a run must carry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ColumnSchema(Vec<String>);

impl ColumnSchema {
    pub fn new<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(columns.into_iter().map(Into::into).collect())
    }

    pub fn columns(&self) -> &[String] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn contains(&self, column: &str) -> bool {
        self.0.iter().any(|c| c == column)
    }

    /// `"A", "B", "C"` as used in prompt instructions.
    pub fn quoted_list(&self) -> String {
        self.0
            .iter()
            .map(|c| format!("\"{}\"", c))
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl Default for ColumnSchema {
    fn default() -> Self {
        Self::new(DEFAULT_COLUMNS)
    }
}

/// One test case: field name to string value, in schema order.
///
/// Serializes as a JSON object whose keys follow the schema order.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TestCaseRecord {
    fields: Vec<(String, String)>,
}

impl TestCaseRecord {
    /// A record with every schema column set to "".
    pub fn empty(schema: &ColumnSchema) -> Self {
        Self {
            fields: schema
                .columns()
                .iter()
                .map(|c| (c.clone(), String::new()))
                .collect(),
        }
    }

    /// Builds a record from values listed in schema order; missing trailing values are "".
    pub fn from_values<I, S>(schema: &ColumnSchema, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut values = values.into_iter();
        Self {
            fields: schema
                .columns()
                .iter()
                .map(|c| (c.clone(), values.next().map(Into::into).unwrap_or_default()))
                .collect(),
        }
    }

    pub fn get(&self, column: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(k, _)| k == column)
            .map(|(_, v)| v.as_str())
    }

    /// Overwrites an existing column. Columns outside the record's key set are ignored.
    pub fn set(&mut self, column: &str, value: impl Into<String>) {
        if let Some((_, slot)) = self.fields.iter_mut().find(|(k, _)| k == column) {
            *slot = value.into();
        }
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(k, _)| k.as_str())
    }

    pub fn values(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(_, v)| v.as_str())
    }

    pub fn fields(&self) -> &[(String, String)] {
        &self.fields
    }
}

impl Serialize for TestCaseRecord {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.fields.len()))?;
        for (key, value) in &self.fields {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

/// Exemplar table for one ALM tool. Its columns are the authoritative schema for a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FewShotSet {
    pub alm_tool: String,
    pub columns: ColumnSchema,
    pub examples: Vec<TestCaseRecord>,
}

impl FewShotSet {
    /// Renders the exemplars as a plain aligned table, header first.
    pub fn render_text(&self) -> String {
        let rows: Vec<Vec<&str>> = self
            .examples
            .iter()
            .map(|record| record.values().collect())
            .collect();
        let header: Vec<&str> = self.columns.columns().iter().map(String::as_str).collect();
        render_aligned_table(&header, &rows)
    }
}

/// Artifact of one pipeline run, handed to the caller for persistence.
#[derive(Debug, Clone, Serialize)]
pub struct PipelineResult {
    pub alm_tool: String,
    pub raw_records: Vec<TestCaseRecord>,
    pub reviewed_records: Vec<TestCaseRecord>,
    pub column_schema: ColumnSchema,
    pub prompt_used: String,
    /// Generation output after fence stripping, kept for diagnostics.
    pub generation_output: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_serializes_in_schema_order() {
        let schema = ColumnSchema::new(["Zeta", "Alpha", "Mid"]);
        let record = TestCaseRecord::from_values(&schema, ["z", "a"]);
        let json = serde_json::to_string(&record).unwrap();
        assert_eq!(json, r#"{"Zeta":"z","Alpha":"a","Mid":""}"#);
    }

    #[test]
    fn test_set_ignores_unknown_columns() {
        let schema = ColumnSchema::default();
        let mut record = TestCaseRecord::empty(&schema);
        record.set("Priority", "High");
        record.set("Severity", "Critical");
        assert_eq!(record.get("Priority"), Some("High"));
        assert_eq!(record.get("Severity"), None);
        assert_eq!(record.keys().count(), 6);
    }

    #[test]
    fn test_render_text_aligns_columns() {
        let schema = ColumnSchema::new(["ID", "Description"]);
        let set = FewShotSet {
            alm_tool: "jira".to_string(),
            columns: schema.clone(),
            examples: vec![TestCaseRecord::from_values(&schema, ["TC-1", "Login"])],
        };
        assert_eq!(set.render_text(), "ID    Description\nTC-1  Login");
    }

    #[test]
    fn test_quoted_list() {
        let schema = ColumnSchema::new(["A", "B"]);
        assert_eq!(schema.quoted_list(), "\"A\", \"B\"");
    }
}
