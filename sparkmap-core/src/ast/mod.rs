//! Program model — an owned, immutable view of a parsed PySpark module.
//!
//! The tree-sitter concrete syntax tree is lowered once into [`Expr`] and
//! [`Stmt`] values so the extraction engine never touches parser internals.
//! Rewrites (comprehension expansion) build new trees instead of mutating
//! shared nodes.

pub mod parse;
pub mod render;

pub use parse::{parse_expression, parse_program};

/// A lowered expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Name(String),
    Str(String),
    /// Numeric literal, kept as written.
    Num(String),
    Bool(bool),
    NoneLit,
    FString(Vec<FStringPart>),
    Attribute {
        value: Box<Expr>,
        attr: String,
    },
    Call {
        func: Box<Expr>,
        args: Vec<Expr>,
        keywords: Vec<Keyword>,
    },
    Subscript {
        value: Box<Expr>,
        index: Box<Expr>,
    },
    List(Vec<Expr>),
    Tuple(Vec<Expr>),
    /// Dictionary display; a `None` key is a `**spread` entry.
    Dict(Vec<(Option<Expr>, Expr)>),
    Starred(Box<Expr>),
    ListComp {
        elt: Box<Expr>,
        generators: Vec<Comprehension>,
    },
    BinOp {
        left: Box<Expr>,
        op: String,
        right: Box<Expr>,
    },
    UnaryOp {
        op: String,
        operand: Box<Expr>,
    },
    BoolOp {
        op: String,
        values: Vec<Expr>,
    },
    Compare {
        left: Box<Expr>,
        ops: Vec<(String, Expr)>,
    },
    IfExp {
        body: Box<Expr>,
        test: Box<Expr>,
        orelse: Box<Expr>,
    },
    /// Any shape the engine never looks inside, kept verbatim.
    Opaque(String),
}

/// One piece of an f-string.
#[derive(Debug, Clone, PartialEq)]
pub enum FStringPart {
    Literal(String),
    /// Source text of an interpolated expression, including any format spec.
    Interpolation(String),
}

/// A keyword argument; `arg == None` is a `**kwargs` spread.
#[derive(Debug, Clone, PartialEq)]
pub struct Keyword {
    pub arg: Option<String>,
    pub value: Expr,
}

/// A `for target in iter if ...` clause of a comprehension.
#[derive(Debug, Clone, PartialEq)]
pub struct Comprehension {
    pub target: Expr,
    pub iter: Expr,
    pub ifs: Vec<Expr>,
}

/// A lowered statement.
#[derive(Debug, Clone, PartialEq)]
pub enum Stmt {
    Assign {
        target: Expr,
        value: Expr,
        line: usize,
    },
    Expr {
        expr: Expr,
        line: usize,
    },
    /// Compound statement (if/for/def/with/...): header expressions are
    /// visited before the nested body.
    Block {
        header: Vec<Expr>,
        body: Vec<Stmt>,
    },
}

/// A parsed module.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Program {
    pub body: Vec<Stmt>,
}

impl Expr {
    pub fn name(id: impl Into<String>) -> Self {
        Expr::Name(id.into())
    }

    pub fn string(value: impl Into<String>) -> Self {
        Expr::Str(value.into())
    }

    /// Builds `func(args...)` with no keywords.
    pub fn call(func: Expr, args: Vec<Expr>) -> Self {
        Expr::Call {
            func: Box::new(func),
            args,
            keywords: Vec::new(),
        }
    }

    /// Builds `value.attr`.
    pub fn attr(value: Expr, attr: impl Into<String>) -> Self {
        Expr::Attribute {
            value: Box::new(value),
            attr: attr.into(),
        }
    }

    /// The string value of a string constant.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Expr::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_name(&self) -> Option<&str> {
        match self {
            Expr::Name(id) => Some(id),
            _ => None,
        }
    }

    /// Name of the called function for `f(...)` and `x.f(...)`.
    pub fn call_name(&self) -> Option<&str> {
        match self {
            Expr::Call { func, .. } => callee_name(func),
            _ => None,
        }
    }

    /// True when this is a call whose name is `name`.
    pub fn is_call_to(&self, name: &str) -> bool {
        self.call_name() == Some(name)
    }

    /// The receiver of a method call (`x` in `x.f(...)`).
    pub fn method_receiver(&self) -> Option<&Expr> {
        match self {
            Expr::Call { func, .. } => match func.as_ref() {
                Expr::Attribute { value, .. } => Some(value),
                _ => None,
            },
            _ => None,
        }
    }

    /// Positional arguments of a call, empty for anything else.
    pub fn call_args(&self) -> &[Expr] {
        match self {
            Expr::Call { args, .. } => args,
            _ => &[],
        }
    }

    /// Keyword arguments of a call, empty for anything else.
    pub fn call_keywords(&self) -> &[Keyword] {
        match self {
            Expr::Call { keywords, .. } => keywords,
            _ => &[],
        }
    }

    /// Value of the keyword argument `name`, if given.
    pub fn keyword(&self, name: &str) -> Option<&Expr> {
        self.call_keywords()
            .iter()
            .find(|kw| kw.arg.as_deref() == Some(name))
            .map(|kw| &kw.value)
    }

    /// Literal string first argument (`"x"` in `f("x")`).
    pub fn first_str_arg(&self) -> Option<&str> {
        self.call_args().first().and_then(Expr::as_str)
    }

    /// Dotted path of a pure attribute chain rooted at a name
    /// (`["df", "addr", "city"]` for `df.addr.city`).
    pub fn attribute_path(&self) -> Option<Vec<&str>> {
        let mut parts = Vec::new();
        let mut node = self;
        while let Expr::Attribute { value, attr } = node {
            parts.push(attr.as_str());
            node = value;
        }
        let Expr::Name(root) = node else {
            return None;
        };
        parts.push(root.as_str());
        parts.reverse();
        Some(parts)
    }

    /// Whether the expression is a compile-time literal (what Python's
    /// `ast.literal_eval` would accept).
    pub fn is_literal(&self) -> bool {
        match self {
            Expr::Str(_) | Expr::Num(_) | Expr::Bool(_) | Expr::NoneLit => true,
            Expr::List(items) | Expr::Tuple(items) => items.iter().all(Expr::is_literal),
            Expr::Dict(entries) => entries
                .iter()
                .all(|(k, v)| k.as_ref().is_some_and(Expr::is_literal) && v.is_literal()),
            Expr::UnaryOp { op, operand } => {
                (op == "-" || op == "+") && matches!(operand.as_ref(), Expr::Num(_))
            }
            _ => false,
        }
    }

    /// Visit every direct child expression in source order.
    pub fn for_each_child<'a>(&'a self, mut f: impl FnMut(&'a Expr)) {
        match self {
            Expr::Name(_)
            | Expr::Str(_)
            | Expr::Num(_)
            | Expr::Bool(_)
            | Expr::NoneLit
            | Expr::FString(_)
            | Expr::Opaque(_) => {}
            Expr::Attribute { value, .. } => f(value),
            Expr::Call {
                func,
                args,
                keywords,
            } => {
                f(func);
                args.iter().for_each(&mut f);
                keywords.iter().for_each(|kw| f(&kw.value));
            }
            Expr::Subscript { value, index } => {
                f(value);
                f(index);
            }
            Expr::List(items) | Expr::Tuple(items) => items.iter().for_each(f),
            Expr::Dict(entries) => {
                for (key, value) in entries {
                    if let Some(key) = key {
                        f(key);
                    }
                    f(value);
                }
            }
            Expr::Starred(inner) => f(inner),
            Expr::ListComp { elt, generators } => {
                f(elt);
                for generator in generators {
                    f(&generator.target);
                    f(&generator.iter);
                    generator.ifs.iter().for_each(&mut f);
                }
            }
            Expr::BinOp { left, right, .. } => {
                f(left);
                f(right);
            }
            Expr::UnaryOp { operand, .. } => f(operand),
            Expr::BoolOp { values, .. } => values.iter().for_each(f),
            Expr::Compare { left, ops } => {
                f(left);
                ops.iter().for_each(|(_, e)| f(e));
            }
            Expr::IfExp { body, test, orelse } => {
                f(body);
                f(test);
                f(orelse);
            }
        }
    }

    /// Pure rewrite: returns a new tree where every `Name` for which
    /// `replace` yields a value is swapped for that value.
    pub fn map_names(&self, replace: &impl Fn(&str) -> Option<Expr>) -> Expr {
        let go = |e: &Expr| Box::new(e.map_names(replace));
        let all = |items: &[Expr]| items.iter().map(|e| e.map_names(replace)).collect();
        match self {
            Expr::Name(id) => replace(id).unwrap_or_else(|| self.clone()),
            Expr::Str(_)
            | Expr::Num(_)
            | Expr::Bool(_)
            | Expr::NoneLit
            | Expr::FString(_)
            | Expr::Opaque(_) => self.clone(),
            Expr::Attribute { value, attr } => Expr::Attribute {
                value: go(value),
                attr: attr.clone(),
            },
            Expr::Call {
                func,
                args,
                keywords,
            } => Expr::Call {
                func: go(func),
                args: all(args),
                keywords: keywords
                    .iter()
                    .map(|kw| Keyword {
                        arg: kw.arg.clone(),
                        value: kw.value.map_names(replace),
                    })
                    .collect(),
            },
            Expr::Subscript { value, index } => Expr::Subscript {
                value: go(value),
                index: go(index),
            },
            Expr::List(items) => Expr::List(all(items)),
            Expr::Tuple(items) => Expr::Tuple(all(items)),
            Expr::Dict(entries) => Expr::Dict(
                entries
                    .iter()
                    .map(|(k, v)| (k.as_ref().map(|k| k.map_names(replace)), v.map_names(replace)))
                    .collect(),
            ),
            Expr::Starred(inner) => Expr::Starred(go(inner)),
            Expr::ListComp { elt, generators } => Expr::ListComp {
                elt: go(elt),
                generators: generators
                    .iter()
                    .map(|g| Comprehension {
                        target: g.target.map_names(replace),
                        iter: g.iter.map_names(replace),
                        ifs: all(&g.ifs),
                    })
                    .collect(),
            },
            Expr::BinOp { left, op, right } => Expr::BinOp {
                left: go(left),
                op: op.clone(),
                right: go(right),
            },
            Expr::UnaryOp { op, operand } => Expr::UnaryOp {
                op: op.clone(),
                operand: go(operand),
            },
            Expr::BoolOp { op, values } => Expr::BoolOp {
                op: op.clone(),
                values: all(values),
            },
            Expr::Compare { left, ops } => Expr::Compare {
                left: go(left),
                ops: ops
                    .iter()
                    .map(|(op, e)| (op.clone(), e.map_names(replace)))
                    .collect(),
            },
            Expr::IfExp { body, test, orelse } => Expr::IfExp {
                body: go(body),
                test: go(test),
                orelse: go(orelse),
            },
        }
    }
}

/// `f` for `f(...)`, `attr` for `x.attr(...)`.
pub fn callee_name(func: &Expr) -> Option<&str> {
    match func {
        Expr::Name(id) => Some(id),
        Expr::Attribute { attr, .. } => Some(attr),
        _ => None,
    }
}

impl Stmt {
    pub fn line(&self) -> usize {
        match self {
            Stmt::Assign { line, .. } | Stmt::Expr { line, .. } => *line,
            Stmt::Block { body, .. } => body.first().map(Stmt::line).unwrap_or(0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_attribute_path() {
        let e = Expr::attr(Expr::attr(Expr::name("df"), "addr"), "city");
        assert_eq!(e.attribute_path(), Some(vec!["df", "addr", "city"]));

        let rooted_at_call = Expr::attr(Expr::call(Expr::name("f"), vec![]), "x");
        assert_eq!(rooted_at_call.attribute_path(), None);
    }

    #[test]
    fn test_call_helpers() {
        let e = Expr::call(
            Expr::attr(Expr::name("F"), "col"),
            vec![Expr::string("amount")],
        );
        assert_eq!(e.call_name(), Some("col"));
        assert_eq!(e.first_str_arg(), Some("amount"));
        assert!(e.is_call_to("col"));
        assert_eq!(e.method_receiver(), Some(&Expr::name("F")));
    }

    #[test]
    fn test_is_literal() {
        assert!(Expr::Tuple(vec![Expr::string("a"), Expr::Num("1".into())]).is_literal());
        assert!(!Expr::List(vec![Expr::name("x")]).is_literal());
        assert!(
            Expr::UnaryOp {
                op: "-".into(),
                operand: Box::new(Expr::Num("3".into()))
            }
            .is_literal()
        );
    }

    #[test]
    fn test_map_names_is_pure() {
        let template = Expr::call(Expr::name("col"), vec![Expr::name("c")]);
        let rewritten = template.map_names(&|id| (id == "c").then(|| Expr::string("amount")));
        assert_eq!(
            rewritten,
            Expr::call(Expr::name("col"), vec![Expr::string("amount")])
        );
        // the template itself is untouched
        assert_eq!(template.call_args(), &[Expr::name("c")]);
    }
}
