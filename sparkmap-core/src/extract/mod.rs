//! Extraction engine — walks a parsed program and reconstructs column
//! lineage.
//!
//! One [`ExtractionContext`] is created per run and owns every piece of
//! mutable state (bindings, sinks, the withColumn dedup set), so an
//! [`Extractor`] can be shared freely and reused across inputs.
//!
//! Traversal is depth-first in source order. Each call node is offered to
//! the recognizer for its method name; a recognizer that cannot handle a
//! node reports a [`SkipReason`] which is kept as a [`Diagnostic`].

pub mod bindings;
pub mod dq;
pub mod expander;
pub mod recognizers;
pub mod resolver;
pub mod sink;

pub use bindings::{AliasTable, Bindings};
pub use dq::{DqRuleIndex, DqRuleParser};
pub use recognizers::Operation;
pub use sink::{ArrayField, ColumnMapping, JoinRecord, sanitize_target_name};

use crate::ast::{Expr, FStringPart, Program, Stmt, callee_name, parse_program};
use crate::config::ExtractorConfig;
use crate::error::ExtractError;
use resolver::Resolver;
use serde::{Deserialize, Serialize};
use sink::{MappingDraft, MappingSink};
use std::collections::HashSet;
use std::fmt;
use std::path::Path;

/// Why a node produced no (or only partial) output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// The target column name is not a string literal.
    NonLiteralTarget,
    /// An argument has a shape the recognizer does not model.
    UnsupportedArgument(String),
    /// A comprehension over an iterable that is not statically known.
    NotExpandable,
    /// The call is missing arguments it cannot do without.
    Malformed(String),
}

impl SkipReason {
    pub fn is_malformed(&self) -> bool {
        matches!(self, SkipReason::Malformed(_))
    }
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::NonLiteralTarget => f.write_str("target column is not a string literal"),
            SkipReason::UnsupportedArgument(what) => write!(f, "unsupported argument: {what}"),
            SkipReason::NotExpandable => f.write_str("comprehension is not statically expandable"),
            SkipReason::Malformed(what) => write!(f, "malformed call: {what}"),
        }
    }
}

/// A skipped node, as reported in the extraction result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    /// 1-based line of the enclosing statement.
    pub line: usize,
    pub operation: String,
    pub reason: String,
    pub text: String,
}

/// Result of one extraction run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Extraction {
    /// Sanitised target table name.
    pub target_table: String,
    pub mappings: Vec<ColumnMapping>,
    pub joins: Vec<JoinRecord>,
    pub dq_rules: DqRuleIndex,
    pub diagnostics: Vec<Diagnostic>,
}

/// Lineage extractor. Holds configuration only; every call to
/// [`Extractor::extract`] starts from empty state.
pub struct Extractor {
    config: ExtractorConfig,
    dq_parser: DqRuleParser,
}

impl Extractor {
    pub fn new(config: ExtractorConfig) -> Self {
        Self {
            config,
            dq_parser: DqRuleParser::new(),
        }
    }

    pub fn config(&self) -> &ExtractorConfig {
        &self.config
    }

    /// Parse `source` and extract its lineage. Only a parse failure is an
    /// error; problems with individual calls end up in `diagnostics`.
    pub fn extract(&self, source: &str) -> Result<Extraction, ExtractError> {
        let program = parse_program(source)?;
        Ok(self.extract_program(&program))
    }

    pub fn extract_program(&self, program: &Program) -> Extraction {
        let dq_rules = self.collect_dq_rules(&program.body).unwrap_or_default();
        if !dq_rules.is_empty() {
            tracing::debug!(columns = dq_rules.len(), "DQ rules indexed");
        }

        let mut cx = ExtractionContext::new(&self.config, dq_rules);
        for stmt in &program.body {
            cx.visit_stmt(stmt);
        }
        let extraction = cx.finish();

        tracing::info!(
            target_table = %extraction.target_table,
            mappings = extraction.mappings.len(),
            joins = extraction.joins.len(),
            skipped = extraction.diagnostics.len(),
            "extraction complete"
        );
        extraction
    }

    /// Pre-pass: the first string literal assigned to the DQ variable.
    fn collect_dq_rules(&self, body: &[Stmt]) -> Option<DqRuleIndex> {
        body.iter().find_map(|stmt| match stmt {
            Stmt::Assign { target, value, .. }
                if target.as_name() == Some(self.config.dq_variable.as_str()) =>
            {
                value.as_str().map(|block| self.dq_parser.parse(block))
            }
            Stmt::Block { body, .. } => self.collect_dq_rules(body),
            _ => None,
        })
    }
}

/// Read and extract one source file.
pub fn extract_file(path: &Path, config: &ExtractorConfig) -> Result<Extraction, ExtractError> {
    config.validate()?;
    let source = std::fs::read_to_string(path)?;
    tracing::info!(path = %path.display(), bytes = source.len(), "extracting");
    Extractor::new(config.clone()).extract(&source)
}

/// Mutable state of a single extraction run.
pub(crate) struct ExtractionContext<'c> {
    pub(crate) config: &'c ExtractorConfig,
    pub(crate) bindings: Bindings,
    pub(crate) sink: MappingSink,
    dq_rules: DqRuleIndex,
    seen_with_column: HashSet<String>,
    raw_target: Option<String>,
    diagnostics: Vec<Diagnostic>,
    line: usize,
}

impl<'c> ExtractionContext<'c> {
    pub(crate) fn new(config: &'c ExtractorConfig, dq_rules: DqRuleIndex) -> Self {
        Self {
            config,
            bindings: Bindings::new(config),
            sink: MappingSink::new(),
            dq_rules,
            seen_with_column: HashSet::new(),
            raw_target: None,
            diagnostics: Vec::new(),
            line: 0,
        }
    }

    pub(crate) fn finish(self) -> Extraction {
        let raw = self
            .raw_target
            .unwrap_or_else(|| self.config.unknown_table.clone());
        let (mappings, joins) = self.sink.into_parts();
        Extraction {
            target_table: sanitize_target_name(&raw, &self.config.default_sheet_name),
            mappings,
            joins,
            dq_rules: self.dq_rules,
            diagnostics: self.diagnostics,
        }
    }

    pub(crate) fn resolver(&self) -> Resolver<'_> {
        Resolver::new(&self.bindings, &self.config.unknown_table)
    }

    pub(crate) fn emit(&mut self, draft: MappingDraft) {
        self.sink
            .append_mapping(&self.bindings.aliases, &self.dq_rules, draft);
    }

    /// True the first time a withColumn call with this canonical text is seen.
    pub(crate) fn first_with_column(&mut self, canonical: String) -> bool {
        self.seen_with_column.insert(canonical)
    }

    pub(crate) fn skip(&mut self, operation: Operation, node: &Expr, reason: SkipReason) {
        let text = node.to_canonical();
        if reason.is_malformed() {
            tracing::warn!(line = self.line, operation = operation.label(), %reason, %text, "node skipped");
        } else {
            tracing::debug!(line = self.line, operation = operation.label(), %reason, %text, "node skipped");
        }
        self.diagnostics.push(Diagnostic {
            line: self.line,
            operation: operation.label().to_string(),
            reason: reason.to_string(),
            text,
        });
    }

    pub(crate) fn visit_stmt(&mut self, stmt: &Stmt) {
        match stmt {
            Stmt::Assign {
                target,
                value,
                line,
            } => {
                self.line = *line;
                self.visit_assign(target, value);
                self.visit_expr(target);
                self.visit_expr(value);
            }
            Stmt::Expr { expr, line } => {
                self.line = *line;
                self.visit_expr(expr);
            }
            Stmt::Block { header, body } => {
                for expr in header {
                    self.visit_expr(expr);
                }
                for stmt in body {
                    self.visit_stmt(stmt);
                }
            }
        }
    }

    fn visit_assign(&mut self, target: &Expr, value: &Expr) {
        let Some(var) = target.as_name() else {
            return;
        };
        if var == self.config.target_variable {
            self.capture_target(value);
        }
        self.bindings.bind_assignment(var, value, self.config);
        if let Some(name) = value.call_name()
            && Operation::from_method(name) == Operation::Aggregate
            && value.method_receiver().is_some()
        {
            recognizers::aggregation(self, var, value);
        }
    }

    fn capture_target(&mut self, value: &Expr) {
        let captured = match value {
            Expr::FString(parts) => parts
                .iter()
                .filter_map(|part| match part {
                    FStringPart::Literal(text) => Some(text.trim_start_matches('.')),
                    FStringPart::Interpolation(_) => None,
                })
                .collect::<String>(),
            Expr::Str(text) => text.clone(),
            _ => return,
        };
        if !captured.is_empty() {
            tracing::debug!(target_table = %captured, "target table captured");
            self.raw_target = Some(captured);
        }
    }

    pub(crate) fn visit_expr(&mut self, expr: &Expr) {
        if matches!(expr, Expr::Call { .. }) && !self.visit_call(expr) {
            return;
        }
        expr.for_each_child(|child| self.visit_expr(child));
    }

    /// Offer a call to its recognizer. Returns whether to descend into the
    /// call's children.
    fn visit_call(&mut self, call: &Expr) -> bool {
        let Expr::Call { func, args, .. } = call else {
            return true;
        };

        if let Expr::Name(name) = func.as_ref()
            && self.config.registry_builders.contains(name)
        {
            let first = args
                .get(2)
                .and_then(Expr::as_name)
                .and_then(|list| self.bindings.table_list(list))
                .and_then(|tables| tables.first())
                .cloned();
            if let Some(table) = first {
                self.bindings.set_hint(table);
            }
        }

        let Some(method) = callee_name(func).filter(|_| call.method_receiver().is_some()) else {
            return true;
        };
        self.bindings.refresh_hint(call);

        let operation = Operation::from_method(method);
        let outcome = match operation {
            Operation::Alias => {
                recognizers::bind_alias(self, call);
                Ok(())
            }
            Operation::Select => {
                // a select owns its whole subtree, receiver chain included
                recognizers::select(self, call);
                return false;
            }
            Operation::WithColumn => {
                recognizers::with_column_chain(self, call);
                Ok(())
            }
            Operation::WithColumns => recognizers::with_columns(self, call),
            Operation::Join => recognizers::join(self, call),
            Operation::Aggregate | Operation::Other => Ok(()),
        };

        match outcome {
            Ok(()) => true,
            Err(reason) => {
                let descend = !reason.is_malformed();
                self.skip(operation, call, reason);
                descend
            }
        }
    }
}
