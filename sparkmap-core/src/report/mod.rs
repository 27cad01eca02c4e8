//! Report generation — Markdown and JSON renderings of an extraction.
//!
//! Both follow the two-sheet layout of a mapping workbook: one row per
//! mapping (followed by its array fields) and a separate join table.

pub mod json;
pub mod markdown;

pub use json::render_json;
pub use markdown::render_markdown;

use crate::config::ReportFormat;
use crate::error::ExtractError;
use crate::extract::{ColumnMapping, Extraction};
use chrono::{DateTime, TimeZone};
use serde::Serialize;

/// Column headers of the mapping table.
pub const MAPPING_HEADERS: [&str; 6] = [
    "Source Table",
    "Source Column(s)",
    "Target Column(s)",
    "Array Field",
    "Transformation",
    "DQ Rules",
];

/// Column headers of the join table.
pub const JOIN_HEADERS: [&str; 5] = [
    "Primary Table",
    "Secondary Table",
    "Join Type",
    "Join Condition",
    "Remarks",
];

/// One flattened row of the mapping table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MappingRow {
    pub source_table: String,
    pub source_columns: String,
    pub target_column: String,
    pub array_field: String,
    pub transformation: String,
    pub dq_rule: String,
}

impl MappingRow {
    pub fn cells(&self) -> [&str; 6] {
        [
            &self.source_table,
            &self.source_columns,
            &self.target_column,
            &self.array_field,
            &self.transformation,
            &self.dq_rule,
        ]
    }
}

/// Flatten mappings: each mapping row is followed by one row per array
/// field carrying only the alias and its transformation.
pub fn mapping_rows(mappings: &[ColumnMapping]) -> Vec<MappingRow> {
    let mut rows = Vec::with_capacity(mappings.len());
    for mapping in mappings {
        rows.push(MappingRow {
            source_table: mapping.source_table.clone(),
            source_columns: mapping.source_columns.clone(),
            target_column: mapping.target_column.clone().unwrap_or_default(),
            array_field: String::new(),
            transformation: mapping.transformation.clone(),
            dq_rule: mapping.dq_rule.clone(),
        });
        for field in &mapping.array_fields {
            rows.push(MappingRow {
                source_table: String::new(),
                source_columns: String::new(),
                target_column: String::new(),
                array_field: field.alias.clone(),
                transformation: field.transformation.clone(),
                dq_rule: String::new(),
            });
        }
    }
    rows
}

/// Render an extraction in the given format.
pub fn render(extraction: &Extraction, format: ReportFormat) -> Result<String, ExtractError> {
    match format {
        ReportFormat::Markdown => Ok(render_markdown(extraction)),
        ReportFormat::Json => render_json(extraction),
    }
}

/// `<prefix>_<target>_<YYYYmmdd_HHMMSS>.<ext>`
pub fn output_file_name<Tz: TimeZone>(
    prefix: &str,
    target: &str,
    timestamp: &DateTime<Tz>,
    extension: &str,
) -> String
where
    Tz::Offset: std::fmt::Display,
{
    format!(
        "{prefix}_{target}_{}.{extension}",
        timestamp.format("%Y%m%d_%H%M%S")
    )
}
