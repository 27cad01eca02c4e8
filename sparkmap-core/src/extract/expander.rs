//! Static list-comprehension expansion.
//!
//! `[f(a, b) for (a, b) in pairs]` over a statically known iterable is
//! unrolled into one `f(...)` per item by substituting the loop variables.
//! Anything not statically knowable yields `None` and is left alone.

use super::bindings::Bindings;
use crate::ast::Expr;
use std::collections::HashMap;

/// Expand a single-generator comprehension (optionally starred).
/// Filter clauses are not evaluated.
pub fn expand_comprehension(expr: &Expr, bindings: &Bindings) -> Option<Vec<Expr>> {
    let expr = match expr {
        Expr::Starred(inner) => inner.as_ref(),
        other => other,
    };
    let Expr::ListComp { elt, generators } = expr else {
        return None;
    };
    let [generator] = generators.as_slice() else {
        return None;
    };

    let items = iterable_items(&generator.iter, bindings)?;
    let targets = target_names(&generator.target);

    let mut expanded = Vec::with_capacity(items.len());
    for item in items {
        let values: Vec<&Expr> = match item {
            Expr::Tuple(parts) => parts.iter().collect(),
            other => vec![other],
        };
        if values.len() != targets.len() {
            tracing::trace!(
                expected = targets.len(),
                found = values.len(),
                "comprehension item skipped"
            );
            continue;
        }
        let substitutions: HashMap<&str, &Expr> =
            targets.iter().copied().zip(values).collect();
        expanded.push(elt.map_names(&|id| substitutions.get(id).map(|&v| v.clone())));
    }
    Some(expanded)
}

/// Literal items of an iterable: a literal list/tuple, or a variable bound
/// to a literal list.
fn iterable_items<'a>(iter: &'a Expr, bindings: &'a Bindings) -> Option<&'a [Expr]> {
    let items = match iter {
        Expr::List(items) | Expr::Tuple(items) => items.as_slice(),
        Expr::Name(var) => bindings.column_list(var)?,
        _ => return None,
    };
    items.iter().all(Expr::is_literal).then_some(items)
}

fn target_names(target: &Expr) -> Vec<&str> {
    match target {
        Expr::Name(id) => vec![id.as_str()],
        Expr::Tuple(parts) | Expr::List(parts) => {
            parts.iter().filter_map(Expr::as_name).collect()
        }
        _ => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::parse_expression;
    use crate::config::ExtractorConfig;
    use pretty_assertions::assert_eq;

    fn expand(src: &str, bindings: &Bindings) -> Option<Vec<String>> {
        expand_comprehension(&parse_expression(src).unwrap(), bindings)
            .map(|items| items.iter().map(Expr::to_canonical).collect())
    }

    #[test]
    fn test_tuple_unpacking() {
        let bindings = Bindings::new(&ExtractorConfig::default());
        assert_eq!(
            expand(
                "[col(c).alias(a) for (c, a) in [('x', 'X'), ('y', 'Y')]]",
                &bindings
            ),
            Some(vec![
                "col('x').alias('X')".to_string(),
                "col('y').alias('Y')".to_string(),
            ])
        );
    }

    #[test]
    fn test_named_iterable_and_starred() {
        let config = ExtractorConfig::default();
        let mut bindings = Bindings::new(&config);
        bindings.bind_assignment(
            "fields",
            &parse_expression("['npi', 'taxonomy']").unwrap(),
            &config,
        );
        assert_eq!(
            expand("*[col(f) for f in fields]", &bindings),
            Some(vec!["col('npi')".to_string(), "col('taxonomy')".to_string()])
        );
    }

    #[test]
    fn test_arity_mismatch_skips_item() {
        let bindings = Bindings::new(&ExtractorConfig::default());
        assert_eq!(
            expand("[col(a) for (a, b) in [('x', 'X'), ('y',)]]", &bindings),
            Some(vec!["col('x')".to_string()])
        );
        // list items are not unpacked
        assert_eq!(
            expand("[col(a) for (a, b) in [['x', 'X']]]", &bindings),
            Some(vec![])
        );
    }

    #[test]
    fn test_non_static_iterables_are_left_alone() {
        let bindings = Bindings::new(&ExtractorConfig::default());
        assert_eq!(expand("[col(c) for c in df.columns]", &bindings), None);
        assert_eq!(expand("[col(c) for c in [name, 'x']]", &bindings), None);
        assert_eq!(expand("[col(c) for c in unknown_var]", &bindings), None);
        assert_eq!(
            expand("[col(c) for c in ['a'] for d in ['b']]", &bindings),
            None
        );
    }

    #[test]
    fn test_filter_clause_is_not_evaluated() {
        let bindings = Bindings::new(&ExtractorConfig::default());
        assert_eq!(
            expand("[col(c) for c in ['a', 'b'] if c != 'a']", &bindings),
            Some(vec!["col('a')".to_string(), "col('b')".to_string()])
        );
    }
}
