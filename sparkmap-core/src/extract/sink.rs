//! Output records and the append-only sinks that collect them.

use super::bindings::AliasTable;
use super::dq::DqRuleIndex;
use serde::{Deserialize, Serialize};

/// Characters not allowed in a target (sheet) name.
const FORBIDDEN_TARGET_CHARS: &[char] = &['[', ']', ':', '*', '?', '/', '\\', '\''];
const MAX_TARGET_LEN: usize = 31;

/// A nested field of an array-of-struct target column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArrayField {
    pub alias: String,
    pub transformation: String,
}

/// How one target column is derived.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnMapping {
    /// Sorted, comma-joined source tables; empty when no columns resolved.
    pub source_table: String,
    /// `table.column` list, comma-joined.
    pub source_columns: String,
    pub target_column: Option<String>,
    pub array_fields: Vec<ArrayField>,
    pub transformation: String,
    pub dq_rule: String,
}

/// One join edge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoinRecord {
    pub primary_table: String,
    pub secondary_table: String,
    pub join_type: String,
    pub join_condition: String,
    pub remarks: String,
}

/// A mapping as produced by a recognizer, before sink policy applies.
#[derive(Debug, Clone, Default)]
pub struct MappingDraft {
    pub table: String,
    pub columns: String,
    pub target: Option<String>,
    pub transformation: String,
    pub array_fields: Vec<ArrayField>,
}

/// Append-only collector of mappings and joins.
#[derive(Debug, Clone, Default)]
pub struct MappingSink {
    mappings: Vec<ColumnMapping>,
    joins: Vec<JoinRecord>,
}

impl MappingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one mapping. A blank column list blanks the table; the table
    /// is resolved once more through the alias table; the DQ rule comes from
    /// the target column.
    pub fn append_mapping(&mut self, aliases: &AliasTable, dq: &DqRuleIndex, draft: MappingDraft) {
        let table = if draft.columns.trim().is_empty() {
            ""
        } else {
            draft.table.as_str()
        };
        let source_table = aliases.resolve(table).to_string();
        let dq_rule = draft
            .target
            .as_deref()
            .and_then(|target| dq.get(target))
            .unwrap_or_default()
            .to_string();

        tracing::debug!(
            table = %source_table,
            target = draft.target.as_deref().unwrap_or(""),
            "mapping emitted"
        );
        self.mappings.push(ColumnMapping {
            source_table,
            source_columns: draft.columns,
            target_column: draft.target,
            array_fields: draft.array_fields,
            transformation: draft.transformation,
            dq_rule,
        });
    }

    pub fn append_join(&mut self, join: JoinRecord) {
        tracing::debug!(
            primary = %join.primary_table,
            secondary = %join.secondary_table,
            "join emitted"
        );
        self.joins.push(join);
    }

    pub fn mappings(&self) -> &[ColumnMapping] {
        &self.mappings
    }

    pub fn joins(&self) -> &[JoinRecord] {
        &self.joins
    }

    pub fn into_parts(self) -> (Vec<ColumnMapping>, Vec<JoinRecord>) {
        (self.mappings, self.joins)
    }
}

/// Turn raw target table text into a safe sheet/file name: dots become
/// underscores, forbidden characters are removed, at most 31 characters,
/// `default` when nothing remains.
pub fn sanitize_target_name(raw: &str, default: &str) -> String {
    let cleaned: String = raw
        .replace('.', "_")
        .chars()
        .filter(|c| *c != '<' && *c != '>' && !FORBIDDEN_TARGET_CHARS.contains(c))
        .take(MAX_TARGET_LEN)
        .collect();
    if cleaned.is_empty() {
        default.to_string()
    } else {
        cleaned
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::dq::DqRuleParser;

    fn draft(table: &str, columns: &str, target: Option<&str>) -> MappingDraft {
        MappingDraft {
            table: table.into(),
            columns: columns.into(),
            target: target.map(str::to_string),
            transformation: "col('x')".into(),
            array_fields: Vec::new(),
        }
    }

    #[test]
    fn test_blank_columns_blank_the_table() {
        let mut sink = MappingSink::new();
        sink.append_mapping(
            &AliasTable::new(),
            &DqRuleIndex::default(),
            draft("claims", " ", Some("x")),
        );
        assert_eq!(sink.mappings()[0].source_table, "");
    }

    #[test]
    fn test_table_is_re_resolved_and_dq_attached() {
        let mut aliases = AliasTable::new();
        aliases.insert("c", "silver.claims");
        let dq = DqRuleParser::new().parse("    claim_id must not be null\n");

        let mut sink = MappingSink::new();
        sink.append_mapping(&aliases, &dq, draft("c", "claims.id", Some("claim_id")));
        sink.append_mapping(&aliases, &dq, draft("c", "claims.id", Some("claim_id")));

        let m = &sink.mappings()[0];
        assert_eq!(m.source_table, "silver.claims");
        assert_eq!(m.dq_rule, "claim_id must not be null");
        // never deduplicated
        assert_eq!(sink.mappings().len(), 2);
    }

    #[test]
    fn test_sanitize_target_name() {
        assert_eq!(
            sanitize_target_name("schema.silver.service_provider", "Sheet1"),
            "schema_silver_service_provider"
        );
        assert_eq!(sanitize_target_name("<db>.t[1]", "Sheet1"), "db_t1");
        assert_eq!(sanitize_target_name("[]?*", "Sheet1"), "Sheet1");

        let long = sanitize_target_name("a".repeat(40).as_str(), "Sheet1");
        assert_eq!(long.len(), 31);
    }
}
