//! Canonical text rendering.
//!
//! Reconstructs source text from an [`Expr`] the way Python's own unparser
//! does: normalised quoting and spacing, parentheses only where operator
//! precedence needs them. The result is both the human-readable
//! transformation description and the deduplication key for `withColumn`
//! chains, so it must be deterministic.

use super::{Comprehension, Expr, FStringPart, Keyword};
use std::fmt;

// Operator precedence levels, lowest binding first.
const TUPLE: u8 = 1;
const TEST: u8 = 3;
const OR: u8 = 4;
const AND: u8 = 5;
const NOT: u8 = 6;
const CMP: u8 = 7;
const EXPR: u8 = 8;
const BOR: u8 = 8;
const BXOR: u8 = 9;
const BAND: u8 = 10;
const SHIFT: u8 = 11;
const ARITH: u8 = 12;
const TERM: u8 = 13;
const FACTOR: u8 = 14;
const POWER: u8 = 15;
const ATOM: u8 = 17;

impl Expr {
    /// Canonical text of this expression.
    pub fn to_canonical(&self) -> String {
        let mut out = String::new();
        write_expr(&mut out, self, TEST);
        out
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_canonical())
    }
}

fn binop_precedence(op: &str) -> u8 {
    match op {
        "|" => BOR,
        "^" => BXOR,
        "&" => BAND,
        "<<" | ">>" => SHIFT,
        "+" | "-" => ARITH,
        "**" => POWER,
        _ => TERM,
    }
}

fn write_expr(out: &mut String, expr: &Expr, required: u8) {
    match expr {
        Expr::Name(id) => out.push_str(id),
        Expr::Str(s) => out.push_str(&py_repr(s)),
        Expr::Num(n) => out.push_str(n),
        Expr::Bool(true) => out.push_str("True"),
        Expr::Bool(false) => out.push_str("False"),
        Expr::NoneLit => out.push_str("None"),
        Expr::FString(parts) => write_fstring(out, parts),
        Expr::Opaque(text) => {
            // verbatim source may span lines; keep descriptions single-line
            let collapsed: Vec<&str> = text.split_whitespace().collect();
            out.push_str(&collapsed.join(" "));
        }
        Expr::Attribute { value, attr } => {
            write_expr(out, value, ATOM);
            out.push('.');
            out.push_str(attr);
        }
        Expr::Call {
            func,
            args,
            keywords,
        } => {
            write_expr(out, func, ATOM);
            out.push('(');
            write_arguments(out, args, keywords);
            out.push(')');
        }
        Expr::Subscript { value, index } => {
            write_expr(out, value, ATOM);
            out.push('[');
            match index.as_ref() {
                Expr::Tuple(items) if !items.is_empty() => write_joined(out, items, TEST),
                other => write_expr(out, other, TEST),
            }
            out.push(']');
        }
        Expr::List(items) => {
            out.push('[');
            write_joined(out, items, TEST);
            out.push(']');
        }
        Expr::Tuple(items) => {
            let parens = items.is_empty() || required > TUPLE;
            if parens {
                out.push('(');
            }
            write_joined(out, items, TEST);
            if items.len() == 1 {
                out.push(',');
            }
            if parens {
                out.push(')');
            }
        }
        Expr::Dict(entries) => {
            out.push('{');
            for (i, (key, value)) in entries.iter().enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                match key {
                    Some(key) => {
                        write_expr(out, key, TEST);
                        out.push_str(": ");
                        write_expr(out, value, TEST);
                    }
                    None => {
                        out.push_str("**");
                        write_expr(out, value, EXPR);
                    }
                }
            }
            out.push('}');
        }
        Expr::Starred(inner) => {
            out.push('*');
            write_expr(out, inner, EXPR);
        }
        Expr::ListComp { elt, generators } => {
            out.push('[');
            write_expr(out, elt, TEST);
            for generator in generators {
                write_generator(out, generator);
            }
            out.push(']');
        }
        Expr::BinOp { left, op, right } => {
            let prec = binop_precedence(op);
            let (left_prec, right_prec) = if prec == POWER {
                (prec + 1, prec)
            } else {
                (prec, prec + 1)
            };
            with_parens(out, prec < required, |out| {
                write_expr(out, left, left_prec);
                out.push(' ');
                out.push_str(op);
                out.push(' ');
                write_expr(out, right, right_prec);
            });
        }
        Expr::UnaryOp { op, operand } => {
            let prec = if op == "not" { NOT } else { FACTOR };
            with_parens(out, prec < required, |out| {
                out.push_str(op);
                if op == "not" {
                    out.push(' ');
                }
                write_expr(out, operand, prec);
            });
        }
        Expr::BoolOp { op, values } => {
            let prec = if op == "or" { OR } else { AND };
            with_parens(out, prec < required, |out| {
                for (i, value) in values.iter().enumerate() {
                    if i > 0 {
                        out.push(' ');
                        out.push_str(op);
                        out.push(' ');
                    }
                    write_expr(out, value, prec + 1);
                }
            });
        }
        Expr::Compare { left, ops } => {
            with_parens(out, CMP < required, |out| {
                write_expr(out, left, CMP + 1);
                for (op, right) in ops {
                    out.push(' ');
                    out.push_str(op);
                    out.push(' ');
                    write_expr(out, right, CMP + 1);
                }
            });
        }
        Expr::IfExp { body, test, orelse } => {
            with_parens(out, TEST < required, |out| {
                write_expr(out, body, TEST + 1);
                out.push_str(" if ");
                write_expr(out, test, TEST + 1);
                out.push_str(" else ");
                write_expr(out, orelse, TEST);
            });
        }
    }
}

fn with_parens(out: &mut String, parens: bool, body: impl FnOnce(&mut String)) {
    if parens {
        out.push('(');
    }
    body(out);
    if parens {
        out.push(')');
    }
}

fn write_joined(out: &mut String, items: &[Expr], prec: u8) {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            out.push_str(", ");
        }
        write_expr(out, item, prec);
    }
}

fn write_arguments(out: &mut String, args: &[Expr], keywords: &[Keyword]) {
    write_joined(out, args, TEST);
    for (i, kw) in keywords.iter().enumerate() {
        if i > 0 || !args.is_empty() {
            out.push_str(", ");
        }
        match &kw.arg {
            Some(name) => {
                out.push_str(name);
                out.push('=');
                write_expr(out, &kw.value, TEST);
            }
            None => {
                out.push_str("**");
                write_expr(out, &kw.value, EXPR);
            }
        }
    }
}

fn write_generator(out: &mut String, generator: &Comprehension) {
    out.push_str(" for ");
    write_expr(out, &generator.target, TUPLE);
    out.push_str(" in ");
    write_expr(out, &generator.iter, TEST + 1);
    for condition in &generator.ifs {
        out.push_str(" if ");
        write_expr(out, condition, TEST + 1);
    }
}

fn write_fstring(out: &mut String, parts: &[FStringPart]) {
    let literal_text: String = parts
        .iter()
        .filter_map(|p| match p {
            FStringPart::Literal(s) => Some(s.as_str()),
            FStringPart::Interpolation(_) => None,
        })
        .collect();
    let quote = pick_quote(&literal_text);
    out.push('f');
    out.push(quote);
    for part in parts {
        match part {
            FStringPart::Literal(s) => {
                let escaped = escape_body(s, quote);
                out.push_str(&escaped.replace('{', "{{").replace('}', "}}"));
            }
            FStringPart::Interpolation(text) => {
                out.push('{');
                out.push_str(text);
                out.push('}');
            }
        }
    }
    out.push(quote);
}

fn pick_quote(s: &str) -> char {
    if s.contains('\'') && !s.contains('"') {
        '"'
    } else {
        '\''
    }
}

fn escape_body(s: &str, quote: char) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c == quote => {
                out.push('\\');
                out.push(c);
            }
            c if (c as u32) < 0x20 || c as u32 == 0x7f => {
                out.push_str(&format!("\\x{:02x}", c as u32));
            }
            c => out.push(c),
        }
    }
    out
}

/// Python `repr()` of a string.
pub fn py_repr(s: &str) -> String {
    let quote = pick_quote(s);
    let mut out = String::with_capacity(s.len() + 2);
    out.push(quote);
    out.push_str(&escape_body(s, quote));
    out.push(quote);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::parse::parse_expression;

    fn canon(src: &str) -> String {
        parse_expression(src).unwrap().to_canonical()
    }

    #[test]
    fn test_quotes_are_normalised() {
        assert_eq!(canon(r#"col("amount")"#), "col('amount')");
        assert_eq!(canon(r#"lit("it's")"#), r#"lit("it's")"#);
        assert_eq!(py_repr("a\nb"), r"'a\nb'");
    }

    #[test]
    fn test_spacing_is_normalised() {
        assert_eq!(
            canon("F.when( col('a')==1 ,lit( 'x' ) ).otherwise( None )"),
            "F.when(col('a') == 1, lit('x')).otherwise(None)"
        );
        assert_eq!(
            canon("df.join(other,on=['id'],how='left')"),
            "df.join(other, on=['id'], how='left')"
        );
    }

    #[test]
    fn test_parentheses_follow_precedence() {
        assert_eq!(
            canon("(col('a') == 1) & (col('b') > 2)"),
            "(col('a') == 1) & (col('b') > 2)"
        );
        assert_eq!(canon("(a + b) * c"), "(a + b) * c");
        assert_eq!(canon("a + (b * c)"), "a + b * c");
        assert_eq!(canon("~(a | b)"), "~(a | b)");
        assert_eq!(canon("not (a and b)"), "not (a and b)");
        assert_eq!(canon("a - (b - c)"), "a - (b - c)");
    }

    #[test]
    fn test_collections_and_comprehensions() {
        assert_eq!(canon("(1,)"), "(1,)");
        assert_eq!(canon("f(*cols, **opts)"), "f(*cols, **opts)");
        assert_eq!(canon("{'a': col('x'), **rest}"), "{'a': col('x'), **rest}");
        assert_eq!(
            canon("[struct(col(a).alias(b)) for (a, b) in pairs if a]"),
            "[struct(col(a).alias(b)) for a, b in pairs if a]"
        );
        assert_eq!(canon("m[1, 2]"), "m[1, 2]");
    }

    #[test]
    fn test_fstring_roundtrip() {
        assert_eq!(
            canon(r#"f"{database}.silver.x""#),
            "f'{database}.silver.x'"
        );
    }

    #[test]
    fn test_canonical_text_reparses_to_same_tree() {
        let src = "when((col('x') > 1) | col('y').isNull(), -1).otherwise(col('x') ** 2)";
        let first = parse_expression(src).unwrap();
        let second = parse_expression(&first.to_canonical()).unwrap();
        assert_eq!(first, second);
    }
}
