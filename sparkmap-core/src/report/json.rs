//! JSON report — the whole extraction, pretty-printed.

use crate::error::ExtractError;
use crate::extract::Extraction;

pub fn render_json(extraction: &Extraction) -> Result<String, ExtractError> {
    Ok(serde_json::to_string_pretty(extraction)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ExtractorConfig;
    use crate::extract::Extractor;

    #[test]
    fn test_json_report_structure() {
        let extraction = Extractor::new(ExtractorConfig::default())
            .extract("df = spark.table('t')\nout = df.select(col('a').alias('b'))\n")
            .unwrap();
        let json: serde_json::Value =
            serde_json::from_str(&render_json(&extraction).unwrap()).unwrap();

        assert_eq!(json["target_table"], "unknown");
        assert_eq!(json["mappings"][0]["source_columns"], "t.a");
        assert_eq!(json["mappings"][0]["target_column"], "b");
        assert!(json["joins"].as_array().unwrap().is_empty());
    }
}
