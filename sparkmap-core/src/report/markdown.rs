//! Markdown report generator — human-readable mapping document.

use super::{JOIN_HEADERS, MAPPING_HEADERS, mapping_rows};
use crate::extract::Extraction;

/// Generate a Markdown mapping document.
pub fn render_markdown(extraction: &Extraction) -> String {
    let mut md = String::new();

    md.push_str(&format!("# {}\n\n", extraction.target_table));

    let rows = mapping_rows(&extraction.mappings);
    if rows.is_empty() {
        md.push_str("No mappings extracted.\n");
    } else {
        write_table(
            &mut md,
            &MAPPING_HEADERS,
            rows.iter().map(|row| row.cells().to_vec()),
        );
    }

    if !extraction.joins.is_empty() {
        md.push_str("\n## Join Details\n\n");
        write_table(
            &mut md,
            &JOIN_HEADERS,
            extraction.joins.iter().map(|join| {
                vec![
                    join.primary_table.as_str(),
                    join.secondary_table.as_str(),
                    join.join_type.as_str(),
                    join.join_condition.as_str(),
                    join.remarks.as_str(),
                ]
            }),
        );
    }

    if !extraction.diagnostics.is_empty() {
        md.push_str("\n## Skipped Nodes\n\n");
        for diagnostic in &extraction.diagnostics {
            md.push_str(&format!(
                "- line {} `{}`: {}\n",
                diagnostic.line, diagnostic.operation, diagnostic.reason
            ));
        }
    }

    md
}

fn write_table<'a>(md: &mut String, headers: &[&str], rows: impl Iterator<Item = Vec<&'a str>>) {
    md.push_str(&format!("| {} |\n", headers.join(" | ")));
    md.push_str(&format!("|{}\n", "---|".repeat(headers.len())));
    for row in rows {
        let cells: Vec<String> = row.iter().map(|cell| escape_cell(cell)).collect();
        md.push_str(&format!("| {} |\n", cells.join(" | ")));
    }
}

fn escape_cell(text: &str) -> String {
    text.replace('|', "\\|").replace('\n', " ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ExtractorConfig;
    use crate::extract::Extractor;

    fn render(source: &str) -> String {
        let extraction = Extractor::new(ExtractorConfig::default())
            .extract(source)
            .unwrap();
        render_markdown(&extraction)
    }

    #[test]
    fn test_mapping_table_and_escaping() {
        let md = render(
            "target_table = 'gold.members'\n\
             m = spark.table('edw.member')\n\
             out = m.withColumn('flag', col('a') | col('b'))\n",
        );
        assert!(md.starts_with("# gold_members\n"));
        assert!(md.contains("| Source Table | Source Column(s) | Target Column(s) |"));
        assert!(md.contains("| edw.member | member.a, member.b | flag |  | col('a') \\| col('b') |  |"));
        assert!(!md.contains("## Join Details"));
    }

    #[test]
    fn test_join_section() {
        let md = render(
            "a = spark.table('A')\nb = spark.table('B')\nj = a.join(b, a.id == b.id, 'inner')\n",
        );
        assert!(md.contains("## Join Details"));
        assert!(md.contains("| A | B | INNER | A.id == B.id |  |"));
    }

    #[test]
    fn test_empty_extraction() {
        let md = render("x = 1\n");
        assert!(md.contains("No mappings extracted."));
    }
}
