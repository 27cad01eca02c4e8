//! tree-sitter Python front end.
//!
//! Lowers the concrete syntax tree produced by `tree-sitter-python` into the
//! owned [`Program`] model. Shapes the extractor never inspects are kept as
//! [`Expr::Opaque`] source text.

use super::{Comprehension, Expr, FStringPart, Keyword, Program, Stmt};
use crate::error::AstError;
use tree_sitter::{Node, Parser};

/// Parse a Python module.
///
/// Any syntax error in the module is fatal: the whole extraction depends on a
/// faithful tree, so a partially recovered parse is rejected.
pub fn parse_program(source: &str) -> Result<Program, AstError> {
    let mut parser = Parser::new();
    parser
        .set_language(&tree_sitter_python::LANGUAGE.into())
        .map_err(|e| AstError::GrammarLoad(format!("Failed to set Python language: {e}")))?;

    let tree = parser
        .parse(source, None)
        .ok_or_else(|| AstError::ParseError {
            line: 0,
            message: "Failed to parse Python source".into(),
        })?;

    let root = tree.root_node();
    if root.has_error() {
        let (line, message) = match first_error(root) {
            Some(node) if node.is_missing() => (
                node.start_position().row + 1,
                format!("missing '{}'", node.kind()),
            ),
            Some(node) => (
                node.start_position().row + 1,
                format!("unexpected '{}'", truncate(&source[node.byte_range()], 40)),
            ),
            None => (0, "syntax error".to_string()),
        };
        return Err(AstError::ParseError { line, message });
    }

    let lowerer = Lowerer { source };
    Ok(Program {
        body: lowerer.lower_block(root),
    })
}

/// Parse a single expression, e.g. canonical text produced by the renderer.
pub fn parse_expression(source: &str) -> Result<Expr, AstError> {
    let program = parse_program(source)?;
    match program.body.into_iter().next() {
        Some(Stmt::Expr { expr, .. }) => Ok(expr),
        _ => Err(AstError::ParseError {
            line: 1,
            message: "expected a single expression".into(),
        }),
    }
}

fn first_error(node: Node) -> Option<Node> {
    if node.is_error() || node.is_missing() {
        return Some(node);
    }
    let mut cursor = node.walk();
    let children: Vec<Node> = node.children(&mut cursor).collect();
    children
        .into_iter()
        .filter(|c| c.has_error())
        .find_map(first_error)
}

fn truncate(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        Some((idx, _)) => format!("{}...", &s[..idx]),
        None => s.to_string(),
    }
}

struct Lowerer<'s> {
    source: &'s str,
}

impl<'s> Lowerer<'s> {
    fn text(&self, node: Node) -> &'s str {
        &self.source[node.byte_range()]
    }

    fn opaque(&self, node: Node) -> Expr {
        Expr::Opaque(self.text(node).to_string())
    }

    fn named_children<'t>(&self, node: Node<'t>) -> Vec<Node<'t>> {
        let mut cursor = node.walk();
        node.named_children(&mut cursor)
            .filter(|c| c.kind() != "comment")
            .collect()
    }

    // ─────────────────────────── statements ───────────────────────────

    fn lower_block(&self, node: Node) -> Vec<Stmt> {
        self.named_children(node)
            .into_iter()
            .flat_map(|child| self.lower_stmt(child))
            .collect()
    }

    fn lower_stmt(&self, node: Node) -> Vec<Stmt> {
        let line = node.start_position().row + 1;
        match node.kind() {
            "module" | "block" => self.lower_block(node),
            "expression_statement" => {
                let children = self.named_children(node);
                if children.len() > 1 {
                    let items = children.into_iter().map(|c| self.lower_expr(c)).collect();
                    return vec![Stmt::Expr {
                        expr: Expr::Tuple(items),
                        line,
                    }];
                }
                children
                    .into_iter()
                    .flat_map(|child| match child.kind() {
                        "assignment" => self.lower_assignment(child),
                        "augmented_assignment" => child
                            .child_by_field_name("right")
                            .map(|right| Stmt::Expr {
                                expr: self.lower_expr(right),
                                line,
                            })
                            .into_iter()
                            .collect(),
                        _ => vec![Stmt::Expr {
                            expr: self.lower_expr(child),
                            line,
                        }],
                    })
                    .collect()
            }
            "assignment" => self.lower_assignment(node),
            "decorated_definition" => {
                let mut header = Vec::new();
                let mut body = Vec::new();
                for child in self.named_children(node) {
                    if child.kind() == "decorator" {
                        if let Some(inner) = self.named_children(child).into_iter().next() {
                            header.push(self.lower_expr(inner));
                        }
                    } else {
                        body.extend(self.lower_stmt(child));
                    }
                }
                vec![Stmt::Block { header, body }]
            }
            "pass_statement" | "break_statement" | "continue_statement" | "import_statement"
            | "import_from_statement" | "future_import_statement" | "global_statement"
            | "nonlocal_statement" => Vec::new(),
            _ => {
                let mut header = Vec::new();
                let mut body = Vec::new();
                for child in self.named_children(node) {
                    if is_statement_like(child.kind()) {
                        body.extend(self.lower_stmt(child));
                    } else {
                        header.push(self.lower_expr(child));
                    }
                }
                if header.is_empty() && body.is_empty() {
                    return Vec::new();
                }
                vec![Stmt::Block { header, body }]
            }
        }
    }

    /// `a = b = value` keeps the first target, as Python's `targets[0]`.
    fn lower_assignment(&self, node: Node) -> Vec<Stmt> {
        let line = node.start_position().row + 1;
        let Some(left) = node.child_by_field_name("left") else {
            return Vec::new();
        };
        let target = self.lower_expr(left);

        let mut right = node.child_by_field_name("right");
        while let Some(r) = right {
            if r.kind() == "assignment" {
                right = r.child_by_field_name("right");
            } else {
                break;
            }
        }

        match right {
            // annotated assignment with a value
            Some(value) if node.child_by_field_name("type").is_some() => vec![Stmt::Expr {
                expr: self.lower_expr(value),
                line,
            }],
            Some(value) => vec![Stmt::Assign {
                target,
                value: self.lower_expr(value),
                line,
            }],
            None => Vec::new(),
        }
    }

    // ─────────────────────────── expressions ───────────────────────────

    fn lower_expr(&self, node: Node) -> Expr {
        match node.kind() {
            "identifier" => Expr::Name(self.text(node).to_string()),
            "integer" | "float" => Expr::Num(self.text(node).to_string()),
            "true" => Expr::Bool(true),
            "false" => Expr::Bool(false),
            "none" => Expr::NoneLit,
            "string" => self.lower_string(node),
            "concatenated_string" => self.lower_concatenated(node),
            "parenthesized_expression" => match self.named_children(node).into_iter().next() {
                Some(inner) => self.lower_expr(inner),
                None => self.opaque(node),
            },
            "attribute" => {
                match (
                    node.child_by_field_name("object"),
                    node.child_by_field_name("attribute"),
                ) {
                    (Some(object), Some(attr)) => Expr::Attribute {
                        value: Box::new(self.lower_expr(object)),
                        attr: self.text(attr).to_string(),
                    },
                    _ => self.opaque(node),
                }
            }
            "call" => self.lower_call(node),
            "subscript" => {
                let Some(value) = node.child_by_field_name("value") else {
                    return self.opaque(node);
                };
                let mut cursor = node.walk();
                let indices: Vec<Node> = node
                    .children_by_field_name("subscript", &mut cursor)
                    .collect();
                let index = match indices.as_slice() {
                    [single] => self.lower_expr(*single),
                    many => Expr::Tuple(many.iter().map(|n| self.lower_expr(*n)).collect()),
                };
                Expr::Subscript {
                    value: Box::new(self.lower_expr(value)),
                    index: Box::new(index),
                }
            }
            "list" | "list_pattern" => Expr::List(self.lower_items(node)),
            "tuple" | "tuple_pattern" | "expression_list" | "pattern_list" => {
                Expr::Tuple(self.lower_items(node))
            }
            "dictionary" => {
                let entries = self
                    .named_children(node)
                    .into_iter()
                    .filter_map(|child| match child.kind() {
                        "pair" => {
                            let key = child.child_by_field_name("key")?;
                            let value = child.child_by_field_name("value")?;
                            Some((Some(self.lower_expr(key)), self.lower_expr(value)))
                        }
                        "dictionary_splat" => {
                            let inner = self.named_children(child).into_iter().next()?;
                            Some((None, self.lower_expr(inner)))
                        }
                        _ => None,
                    })
                    .collect();
                Expr::Dict(entries)
            }
            "list_splat" | "list_splat_pattern" => {
                match self.named_children(node).into_iter().next() {
                    Some(inner) => Expr::Starred(Box::new(self.lower_expr(inner))),
                    None => self.opaque(node),
                }
            }
            "list_comprehension" => self.lower_list_comprehension(node),
            "binary_operator" => {
                match (
                    node.child_by_field_name("left"),
                    node.child_by_field_name("operator"),
                    node.child_by_field_name("right"),
                ) {
                    (Some(left), Some(op), Some(right)) => Expr::BinOp {
                        left: Box::new(self.lower_expr(left)),
                        op: op.kind().to_string(),
                        right: Box::new(self.lower_expr(right)),
                    },
                    _ => self.opaque(node),
                }
            }
            "unary_operator" => {
                match (
                    node.child_by_field_name("operator"),
                    node.child_by_field_name("argument"),
                ) {
                    (Some(op), Some(arg)) => Expr::UnaryOp {
                        op: op.kind().to_string(),
                        operand: Box::new(self.lower_expr(arg)),
                    },
                    _ => self.opaque(node),
                }
            }
            "not_operator" => match node.child_by_field_name("argument") {
                Some(arg) => Expr::UnaryOp {
                    op: "not".into(),
                    operand: Box::new(self.lower_expr(arg)),
                },
                None => self.opaque(node),
            },
            "boolean_operator" => self.lower_boolean(node),
            "comparison_operator" => self.lower_comparison(node),
            "conditional_expression" => match self.named_children(node).as_slice() {
                [body, test, orelse] => Expr::IfExp {
                    body: Box::new(self.lower_expr(*body)),
                    test: Box::new(self.lower_expr(*test)),
                    orelse: Box::new(self.lower_expr(*orelse)),
                },
                _ => self.opaque(node),
            },
            // `await x` / `yield x` / `yield from x`: only the operand matters
            "await" | "yield" => match self.named_children(node).into_iter().next() {
                Some(operand) => self.lower_expr(operand),
                None => Expr::NoneLit,
            },
            "with_item" => match node.child_by_field_name("value") {
                Some(value) => self.lower_expr(value),
                None => self.opaque(node),
            },
            "keyword_argument" => match node.child_by_field_name("value") {
                Some(value) => self.lower_expr(value),
                None => self.opaque(node),
            },
            _ => self.opaque(node),
        }
    }

    fn lower_items(&self, node: Node) -> Vec<Expr> {
        self.named_children(node)
            .into_iter()
            .map(|c| self.lower_expr(c))
            .collect()
    }

    fn lower_call(&self, node: Node) -> Expr {
        let Some(function) = node.child_by_field_name("function") else {
            return self.opaque(node);
        };
        let func = Box::new(self.lower_expr(function));
        let mut args = Vec::new();
        let mut keywords = Vec::new();

        if let Some(arguments) = node.child_by_field_name("arguments") {
            if arguments.kind() == "generator_expression" {
                args.push(self.opaque(arguments));
            } else {
                for arg in self.named_children(arguments) {
                    match arg.kind() {
                        "keyword_argument" => {
                            if let (Some(name), Some(value)) = (
                                arg.child_by_field_name("name"),
                                arg.child_by_field_name("value"),
                            ) {
                                keywords.push(Keyword {
                                    arg: Some(self.text(name).to_string()),
                                    value: self.lower_expr(value),
                                });
                            }
                        }
                        "dictionary_splat" => {
                            if let Some(inner) = self.named_children(arg).into_iter().next() {
                                keywords.push(Keyword {
                                    arg: None,
                                    value: self.lower_expr(inner),
                                });
                            }
                        }
                        _ => args.push(self.lower_expr(arg)),
                    }
                }
            }
        }

        Expr::Call {
            func,
            args,
            keywords,
        }
    }

    fn lower_list_comprehension(&self, node: Node) -> Expr {
        let Some(body) = node.child_by_field_name("body") else {
            return self.opaque(node);
        };
        let mut generators: Vec<Comprehension> = Vec::new();
        for clause in self.named_children(node) {
            match clause.kind() {
                "for_in_clause" => {
                    let target = clause
                        .child_by_field_name("left")
                        .map(|n| self.lower_expr(n))
                        .unwrap_or_else(|| self.opaque(clause));
                    let mut cursor = clause.walk();
                    let rights: Vec<Node> =
                        clause.children_by_field_name("right", &mut cursor).collect();
                    let iter = match rights.as_slice() {
                        [single] => self.lower_expr(*single),
                        many => Expr::Tuple(many.iter().map(|n| self.lower_expr(*n)).collect()),
                    };
                    generators.push(Comprehension {
                        target,
                        iter,
                        ifs: Vec::new(),
                    });
                }
                "if_clause" => {
                    let condition = self.named_children(clause).into_iter().next();
                    if let (Some(last), Some(cond)) = (generators.last_mut(), condition) {
                        last.ifs.push(self.lower_expr(cond));
                    }
                }
                _ => {}
            }
        }
        Expr::ListComp {
            elt: Box::new(self.lower_expr(body)),
            generators,
        }
    }

    /// `a and b and c` becomes one flat `BoolOp`, as in Python's own AST.
    fn lower_boolean(&self, node: Node) -> Expr {
        let (Some(left), Some(op), Some(right)) = (
            node.child_by_field_name("left"),
            node.child_by_field_name("operator"),
            node.child_by_field_name("right"),
        ) else {
            return self.opaque(node);
        };
        let op = op.kind().to_string();
        let mut values = Vec::new();
        for side in [left, right] {
            match self.lower_expr(side) {
                Expr::BoolOp {
                    op: inner_op,
                    values: inner,
                } if inner_op == op && side.kind() == "boolean_operator" => values.extend(inner),
                other => values.push(other),
            }
        }
        Expr::BoolOp { op, values }
    }

    fn lower_comparison(&self, node: Node) -> Expr {
        let mut cursor = node.walk();
        let children: Vec<Node> = node.children(&mut cursor).collect();
        let mut operands = Vec::new();
        let mut operators: Vec<String> = Vec::new();
        for child in children {
            if child.kind() == "comment" {
                continue;
            }
            if child.is_named() {
                operands.push(self.lower_expr(child));
                continue;
            }
            let token = self
                .text(child)
                .split_whitespace()
                .collect::<Vec<_>>()
                .join(" ");
            // `not in` / `is not` may arrive as two tokens
            if operators.len() == operands.len()
                && let Some(last) = operators.last_mut()
            {
                last.push(' ');
                last.push_str(&token);
            } else {
                operators.push(token);
            }
        }
        if operands.len() != operators.len() + 1 {
            return self.opaque(node);
        }
        let mut operands = operands.into_iter();
        let Some(left) = operands.next() else {
            return self.opaque(node);
        };
        Expr::Compare {
            left: Box::new(left),
            ops: operators.into_iter().zip(operands).collect(),
        }
    }

    // ─────────────────────────── strings ───────────────────────────

    fn lower_string(&self, node: Node) -> Expr {
        let raw = self.text(node);
        let Some(literal) = split_string_literal(raw) else {
            return self.opaque(node);
        };
        let body_start = node.start_byte() + literal.body_offset;
        let body_end = body_start + literal.body_len;

        if !literal.is_format {
            let body = &self.source[body_start..body_end];
            return Expr::Str(decode_body(body, literal.is_raw));
        }

        let mut parts = Vec::new();
        let mut pos = body_start;
        for child in self.named_children(node) {
            if child.kind() != "interpolation" {
                continue;
            }
            if child.start_byte() > pos {
                let literal_text = &self.source[pos..child.start_byte()];
                parts.push(FStringPart::Literal(unescape_braces(&decode_body(
                    literal_text,
                    literal.is_raw,
                ))));
            }
            let inner = self.text(child);
            let inner = inner
                .strip_prefix('{')
                .and_then(|s| s.strip_suffix('}'))
                .unwrap_or(inner);
            parts.push(FStringPart::Interpolation(inner.to_string()));
            pos = child.end_byte();
        }
        if body_end > pos {
            let literal_text = &self.source[pos..body_end];
            parts.push(FStringPart::Literal(unescape_braces(&decode_body(
                literal_text,
                literal.is_raw,
            ))));
        }
        Expr::FString(parts)
    }

    /// Implicit concatenation: `"a" "b"`. Joined into one constant unless an
    /// f-string takes part.
    fn lower_concatenated(&self, node: Node) -> Expr {
        let pieces: Vec<Expr> = self
            .named_children(node)
            .into_iter()
            .map(|c| self.lower_expr(c))
            .collect();
        if pieces.iter().all(|p| matches!(p, Expr::Str(_))) {
            return Expr::Str(pieces.iter().filter_map(Expr::as_str).collect());
        }
        let mut parts = Vec::new();
        for piece in pieces {
            match piece {
                Expr::Str(s) => parts.push(FStringPart::Literal(s)),
                Expr::FString(inner) => parts.extend(inner),
                _ => return self.opaque(node),
            }
        }
        Expr::FString(parts)
    }
}

fn is_statement_like(kind: &str) -> bool {
    kind == "block"
        || kind.ends_with("_statement")
        || kind.ends_with("_clause")
        || kind.ends_with("_definition")
}

struct StringLiteral {
    body_offset: usize,
    body_len: usize,
    is_raw: bool,
    is_format: bool,
}

/// Locate prefix, quotes and body of a string literal's source text.
fn split_string_literal(raw: &str) -> Option<StringLiteral> {
    let prefix_len = raw.find(['\'', '"'])?;
    let prefix = raw[..prefix_len].to_ascii_lowercase();
    let rest = &raw[prefix_len..];
    let quote_len = if rest.starts_with("\"\"\"") || rest.starts_with("'''") {
        3
    } else {
        1
    };
    if rest.len() < quote_len * 2 {
        return None;
    }
    Some(StringLiteral {
        body_offset: prefix_len + quote_len,
        body_len: rest.len() - quote_len * 2,
        is_raw: prefix.contains('r'),
        is_format: prefix.contains('f'),
    })
}

fn decode_body(body: &str, is_raw: bool) -> String {
    if is_raw {
        body.to_string()
    } else {
        unescape(body)
    }
}

fn unescape_braces(s: &str) -> String {
    s.replace("{{", "{").replace("}}", "}")
}

/// Decode Python backslash escapes. Unknown escapes keep their backslash.
fn unescape(body: &str) -> String {
    let mut out = String::with_capacity(body.len());
    let mut chars = body.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        let Some(next) = chars.next() else {
            out.push('\\');
            break;
        };
        match next {
            '\n' => {}
            '\\' => out.push('\\'),
            '\'' => out.push('\''),
            '"' => out.push('"'),
            'n' => out.push('\n'),
            't' => out.push('\t'),
            'r' => out.push('\r'),
            'a' => out.push('\x07'),
            'b' => out.push('\x08'),
            'f' => out.push('\x0c'),
            'v' => out.push('\x0b'),
            '0'..='7' => {
                let mut value = next.to_digit(8).unwrap_or(0);
                for _ in 0..2 {
                    match chars.peek().and_then(|c| c.to_digit(8)) {
                        Some(d) => {
                            value = value * 8 + d;
                            chars.next();
                        }
                        None => break,
                    }
                }
                out.extend(char::from_u32(value));
            }
            'x' | 'u' | 'U' => {
                let width = match next {
                    'x' => 2,
                    'u' => 4,
                    _ => 8,
                };
                let digits: String = chars.by_ref().take(width).collect();
                match u32::from_str_radix(&digits, 16).ok().and_then(char::from_u32) {
                    Some(decoded) if digits.len() == width => out.push(decoded),
                    _ => {
                        out.push('\\');
                        out.push(next);
                        out.push_str(&digits);
                    }
                }
            }
            other => {
                out.push('\\');
                out.push(other);
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn single_expr(src: &str) -> Expr {
        parse_expression(src).unwrap()
    }

    #[test]
    fn test_parse_assignment_and_call() {
        let program = parse_program("df = spark.table(\"db.customers\")\n").unwrap();
        assert_eq!(program.body.len(), 1);
        let Stmt::Assign {
            target,
            value,
            line,
        } = &program.body[0]
        else {
            panic!("expected assignment");
        };
        assert_eq!(target, &Expr::name("df"));
        assert_eq!(*line, 1);
        assert_eq!(value.call_name(), Some("table"));
        assert_eq!(value.first_str_arg(), Some("db.customers"));
    }

    #[test]
    fn test_parse_keywords_and_splat() {
        let e = single_expr("a.join(b, on=cond, how='inner', *extra, **opts)");
        assert_eq!(e.call_name(), Some("join"));
        assert_eq!(e.call_args().len(), 2);
        assert!(matches!(e.call_args()[1], Expr::Starred(_)));
        assert_eq!(e.keyword("how").and_then(Expr::as_str), Some("inner"));
        assert_eq!(e.call_keywords().len(), 3);
        assert_eq!(e.call_keywords()[2].arg, None);
    }

    #[test]
    fn test_parse_list_comprehension() {
        let e = single_expr("[col(c).alias(c.upper()) for c, d in pairs if c]");
        let Expr::ListComp { generators, .. } = e else {
            panic!("expected comprehension");
        };
        assert_eq!(generators.len(), 1);
        assert_eq!(
            generators[0].target,
            Expr::Tuple(vec![Expr::name("c"), Expr::name("d")])
        );
        assert_eq!(generators[0].iter, Expr::name("pairs"));
        assert_eq!(generators[0].ifs.len(), 1);
    }

    #[test]
    fn test_parse_string_escapes() {
        assert_eq!(single_expr(r#""a\tb""#), Expr::string("a\tb"));
        assert_eq!(single_expr(r#"r"a\tb""#), Expr::string(r"a\tb"));
        assert_eq!(single_expr("'it''s'"), Expr::string("its"));
        assert_eq!(single_expr("'\\x41\\u00e9'"), Expr::string("Aé"));
    }

    #[test]
    fn test_parse_fstring_parts() {
        let e = single_expr(r#"f"{database}.silver.{{x}}""#);
        assert_eq!(
            e,
            Expr::FString(vec![
                FStringPart::Interpolation("database".into()),
                FStringPart::Literal(".silver.{x}".into()),
            ])
        );
    }

    #[test]
    fn test_parse_triple_quoted_block() {
        let src = "rules = \"\"\"\nheader\n    npi must not be null\n\"\"\"\n";
        let program = parse_program(src).unwrap();
        let Stmt::Assign { value, .. } = &program.body[0] else {
            panic!("expected assignment");
        };
        assert_eq!(
            value.as_str(),
            Some("\nheader\n    npi must not be null\n")
        );
    }

    #[test]
    fn test_parse_compound_statements() {
        let src = "if flag:\n    x = a.select(col('a'))\nelse:\n    y = 1\n";
        let program = parse_program(src).unwrap();
        let Stmt::Block { header, body } = &program.body[0] else {
            panic!("expected block");
        };
        assert_eq!(header, &vec![Expr::name("flag")]);
        assert!(!body.is_empty());
    }

    #[test]
    fn test_parse_comparison_and_boolean() {
        let e = single_expr("a.x == b.y and a.z is not None and c");
        let Expr::BoolOp { op, values } = e else {
            panic!("expected boolean operator");
        };
        assert_eq!(op, "and");
        assert_eq!(values.len(), 3);
        assert!(matches!(&values[1], Expr::Compare { ops, .. } if ops[0].0 == "is not"));
    }

    #[test]
    fn test_await_and_yield_lower_to_operand() {
        let src = "async def run():\n    await publish(a.join(b))\n    yield a.select(col('x'))\n    yield\n";
        let program = parse_program(src).unwrap();
        let Stmt::Block { body, .. } = &program.body[0] else {
            panic!("expected block");
        };
        let exprs: Vec<&Expr> = body
            .iter()
            .filter_map(|stmt| match stmt {
                Stmt::Expr { expr, .. } => Some(expr),
                _ => None,
            })
            .collect();
        assert_eq!(exprs.len(), 3);
        assert_eq!(exprs[0].call_name(), Some("publish"));
        assert_eq!(exprs[1].call_name(), Some("select"));
        assert_eq!(exprs[2], &Expr::NoneLit);
    }

    #[test]
    fn test_parse_error_is_fatal() {
        let err = parse_program("df = spark.table(\n\nx = = 1\n").unwrap_err();
        assert!(matches!(err, AstError::ParseError { .. }));
    }

    #[test]
    fn test_databricks_comments_are_ignored() {
        let src = "# Databricks notebook source\n# COMMAND ----------\nx = 1\n";
        let program = parse_program(src).unwrap();
        assert_eq!(program.body.len(), 1);
    }
}
