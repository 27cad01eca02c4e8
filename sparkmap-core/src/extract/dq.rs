//! Data-quality rule block parsing.
//!
//! The block is free text: unindented lines are section headers, lines
//! indented by four or more spaces are rules. A rule belongs to the column
//! named inside its first `func(column)` call, or else to its leading word.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

const RULE_INDENT: &str = "    ";

/// Column name → rules joined by `"; "`, in source order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DqRuleIndex {
    rules: BTreeMap<String, String>,
}

impl DqRuleIndex {
    pub fn get(&self, column: &str) -> Option<&str> {
        self.rules.get(column).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.rules.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

/// Parser for DQ rule blocks.
pub struct DqRuleParser {
    function_pattern: Regex,
    leading_word: Regex,
}

impl DqRuleParser {
    pub fn new() -> Self {
        Self {
            function_pattern: Regex::new(r"\w+\((\w+)\)").expect("valid regex"),
            leading_word: Regex::new(r"^(\w+)\s").expect("valid regex"),
        }
    }

    pub fn parse(&self, block: &str) -> DqRuleIndex {
        let mut grouped: BTreeMap<String, Vec<&str>> = BTreeMap::new();
        for line in block.lines() {
            if !line.starts_with(RULE_INDENT) {
                continue;
            }
            let rule = line.trim();
            let Some(column) = self.governing_column(rule) else {
                tracing::trace!(rule, "DQ line without a column token dropped");
                continue;
            };
            grouped.entry(column.to_string()).or_default().push(rule);
        }

        DqRuleIndex {
            rules: grouped
                .into_iter()
                .map(|(column, rules)| (column, rules.join("; ")))
                .collect(),
        }
    }

    fn governing_column<'a>(&self, rule: &'a str) -> Option<&'a str> {
        self.function_pattern
            .captures(rule)
            .or_else(|| self.leading_word.captures(rule))
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str())
    }
}

impl Default for DqRuleParser {
    fn default() -> Self {
        Self::new()
    }
}
