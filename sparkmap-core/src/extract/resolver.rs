//! Expression → column resolver.
//!
//! Collects the column references an expression reads and maps them onto
//! source tables through the alias table.

use super::bindings::Bindings;
use crate::ast::{Expr, callee_name};
use std::collections::BTreeSet;

/// Function that reads a column by literal name.
pub const COLUMN_ACCESSOR: &str = "col";

/// Functions whose literal first argument names a column.
pub const COLUMN_FUNCTIONS: &[&str] = &[
    "coalesce",
    "substring",
    "upper",
    "lower",
    "trim",
    "ltrim",
    "rtrim",
    "regexp_replace",
    "regexp_extract",
    "concat",
    "concat_ws",
    "collect_set",
    "when",
    "otherwise",
    "length",
    "date_format",
    "to_date",
    "to_timestamp",
    "from_unixtime",
    "unix_timestamp",
    "nvl",
    "ifnull",
    "explode",
    "explode_outer",
    "posexplode",
    "posexplode_outer",
    "element_at",
    "array",
    "struct",
];

/// Column methods that end the column part of an attribute path.
pub const NON_COLUMN_METHODS: &[&str] = &[
    "alias",
    "isNull",
    "isNotNull",
    "isin",
    "otherwise",
    "when",
    "between",
    "startswith",
    "endswith",
    "contains",
    "cast",
    "substr",
    "rlike",
    "like",
    "over",
    "desc",
    "asc",
    "asc_nulls_first",
    "asc_nulls_last",
    "desc_nulls_first",
    "desc_nulls_last",
    "getItem",
];

const DATE_FORMATS: &[&str] = &["yyyy-MM-dd", "MM-dd-yyyy", "dd-MM-yyyy", "yyyyMMdd"];

const DISALLOWED_CHARS: &str = "-:<>/\\|&=+*^%$#@!~`";

fn is_reserved(name: &str) -> bool {
    NON_COLUMN_METHODS.contains(&name)
        || (name != COLUMN_ACCESSOR && COLUMN_FUNCTIONS.contains(&name))
        || DATE_FORMATS.contains(&name)
}

fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_alphanumeric() || c == '_')
}

/// Whether `name` can be a bare column name.
pub fn is_valid_column_name(name: &str) -> bool {
    !name.is_empty()
        && !name.chars().any(|c| DISALLOWED_CHARS.contains(c))
        && !is_reserved(name)
        && is_identifier(name)
}

/// Validate a candidate: a bare column, or `var.column[.field...]` where
/// every segment is an identifier and the column part is not reserved.
pub fn is_valid_candidate(candidate: &str) -> bool {
    match candidate.split_once('.') {
        None => is_valid_column_name(candidate),
        Some((root, column)) => {
            is_identifier(root)
                && !column.is_empty()
                && column.split('.').all(is_identifier)
                && !is_reserved(column)
        }
    }
}

/// Candidate column strings read by `expr`, in discovery order.
pub fn column_candidates(expr: &Expr) -> Vec<String> {
    let mut out = Vec::new();
    collect(expr, &mut out);
    out
}

fn push_candidate(out: &mut Vec<String>, candidate: String) {
    if is_valid_candidate(&candidate) && !out.contains(&candidate) {
        out.push(candidate);
    }
}

fn collect(expr: &Expr, out: &mut Vec<String>) {
    match expr {
        Expr::Call {
            func,
            args,
            keywords,
        } => {
            if let Some(name) = callee_name(func)
                && (name == COLUMN_ACCESSOR || COLUMN_FUNCTIONS.contains(&name))
                && let Some(first) = args.first().and_then(Expr::as_str)
            {
                push_candidate(out, first.to_string());
            }
            match func.as_ref() {
                // `x.method(...)`: the method itself is never a column
                Expr::Attribute { value, .. } => match value.as_ref() {
                    Expr::Attribute { .. } => collect_path(value, out),
                    Expr::Name(_) => {}
                    other => collect(other, out),
                },
                Expr::Name(_) => {}
                other => collect(other, out),
            }
            for arg in args {
                collect(arg, out);
            }
            for kw in keywords {
                collect(&kw.value, out);
            }
        }
        Expr::Attribute { .. } => collect_path(expr, out),
        other => other.for_each_child(|child| collect(child, out)),
    }
}

fn collect_path(expr: &Expr, out: &mut Vec<String>) {
    let mut segments = Vec::new();
    let mut node = expr;
    while let Expr::Attribute { value, attr } = node {
        segments.push(attr.as_str());
        node = value;
    }
    segments.reverse();

    let Expr::Name(root) = node else {
        // chain hangs off a call or subscript: look inside that instead
        collect(node, out);
        return;
    };
    let cut = segments
        .iter()
        .position(|s| NON_COLUMN_METHODS.contains(s))
        .unwrap_or(segments.len());
    if cut > 0 {
        push_candidate(out, format!("{root}.{}", segments[..cut].join(".")));
    }
}

/// Best single column reference of `expr`: the literal of `col("x")` or a
/// dotted attribute path.
pub fn single_column(expr: &Expr) -> Option<String> {
    if expr.is_call_to(COLUMN_ACCESSOR) {
        return expr.first_str_arg().map(str::to_string);
    }
    let path = expr.attribute_path()?;
    (path.len() >= 2).then(|| path.join("."))
}

/// Resolved source columns and tables.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Resolution {
    /// `table.column` entries, first-seen order.
    pub columns: Vec<String>,
    /// Full table names, sorted.
    pub tables: BTreeSet<String>,
}

impl Resolution {
    pub fn columns_text(&self) -> String {
        self.columns.join(", ")
    }

    pub fn tables_text(&self) -> String {
        self.tables.iter().cloned().collect::<Vec<_>>().join(", ")
    }
}

/// Maps candidate columns onto tables.
pub struct Resolver<'a> {
    bindings: &'a Bindings,
    unknown_table: &'a str,
}

impl<'a> Resolver<'a> {
    pub fn new(bindings: &'a Bindings, unknown_table: &'a str) -> Self {
        Self {
            bindings,
            unknown_table,
        }
    }

    /// Resolve every candidate read by `expr`.
    pub fn resolve_expr(&self, expr: &Expr, default_table: Option<&str>) -> Resolution {
        self.resolve(&column_candidates(expr), default_table)
    }

    /// Split each candidate once on its first dot; the prefix is resolved
    /// through the alias table, an undotted candidate takes the default
    /// table (then the hint, then the placeholder).
    pub fn resolve(&self, candidates: &[String], default_table: Option<&str>) -> Resolution {
        let fallback = default_table
            .filter(|t| !t.is_empty())
            .or_else(|| self.bindings.hint())
            .unwrap_or(self.unknown_table);

        let mut resolution = Resolution::default();
        for candidate in candidates {
            let (table, column) = match candidate.split_once('.') {
                Some((var, column)) => (self.bindings.aliases.resolve(var), column),
                None => (fallback, candidate.as_str()),
            };
            if column.is_empty() {
                continue;
            }
            let short = table.rsplit('.').next().unwrap_or(table);
            let entry = format!("{short}.{column}");
            if !resolution.columns.contains(&entry) {
                resolution.columns.push(entry);
            }
            resolution.tables.insert(table.to_string());
        }
        resolution
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::parse_expression;
    use crate::config::ExtractorConfig;

    fn candidates(src: &str) -> Vec<String> {
        column_candidates(&parse_expression(src).unwrap())
    }

    #[test]
    fn test_column_name_validation() {
        assert!(is_valid_column_name("member_id"));
        assert!(!is_valid_column_name(""));
        assert!(!is_valid_column_name("isNull"));
        assert!(!is_valid_column_name("upper"));
        assert!(!is_valid_column_name("yyyyMMdd"));
        assert!(!is_valid_column_name("yyyy-MM-dd"));
        assert!(!is_valid_column_name("a-b"));
        assert!(!is_valid_column_name("1abc"));
        assert!(is_valid_column_name("col"));
    }

    #[test]
    fn test_col_and_function_literals() {
        assert_eq!(
            candidates("concat_ws('-', col('first'), upper('last'))"),
            vec!["first", "last"]
        );
        assert_eq!(candidates("to_date(col('dob'), 'yyyy-MM-dd')"), vec!["dob"]);
        assert_eq!(candidates("F.col('amt') * 2"), vec!["amt"]);
    }

    #[test]
    fn test_attribute_paths_truncate_at_methods() {
        assert_eq!(candidates("m.member_id.isNull()"), vec!["m.member_id"]);
        assert_eq!(candidates("a.addr.city.cast('string')"), vec!["a.addr.city"]);
        assert_eq!(
            candidates("when(p.status == 'A', p.code).otherwise(p.alt)"),
            vec!["p.status", "p.code", "p.alt"]
        );
        // method directly on a variable is not a path
        assert!(candidates("df.isNull()").is_empty());
    }

    #[test]
    fn test_method_chain_on_call_receiver() {
        assert_eq!(
            candidates("col('a').cast('int').alias('b')"),
            vec!["a"]
        );
    }

    #[test]
    fn test_single_column() {
        let e = parse_expression("col('x')").unwrap();
        assert_eq!(single_column(&e).as_deref(), Some("x"));
        let e = parse_expression("df.addr.zip").unwrap();
        assert_eq!(single_column(&e).as_deref(), Some("df.addr.zip"));
        let e = parse_expression("lit(1)").unwrap();
        assert_eq!(single_column(&e), None);
    }

    #[test]
    fn test_resolution_uses_alias_table_and_defaults() {
        let config = ExtractorConfig::default();
        let mut bindings = Bindings::new(&config);
        bindings.aliases.insert("p", "silver.provider");

        let resolver = Resolver::new(&bindings, "unknown");
        let res = resolver.resolve(
            &["p.npi".into(), "name".into(), "p.npi".into()],
            Some("edw.member"),
        );
        assert_eq!(res.columns, vec!["provider.npi", "member.name"]);
        assert_eq!(res.tables_text(), "edw.member, silver.provider");

        let res = resolver.resolve(&["name".into()], None);
        assert_eq!(res.columns_text(), "unknown.name");

        bindings.set_hint("claims");
        let resolver = Resolver::new(&bindings, "unknown");
        let res = resolver.resolve(&["name".into()], None);
        assert_eq!(res.columns_text(), "claims.name");
    }

    #[test]
    fn test_unbound_prefix_is_kept_as_table() {
        let bindings = Bindings::new(&ExtractorConfig::default());
        let resolver = Resolver::new(&bindings, "unknown");
        let res = resolver.resolve_expr(&parse_expression("x.amount + 1").unwrap(), None);
        assert_eq!(res.columns, vec!["x.amount"]);
        assert_eq!(res.tables_text(), "x");
    }
}
