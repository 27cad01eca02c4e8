//! Per-operation recognizers.
//!
//! Each recognizer matches one method of the closed DataFrame vocabulary and
//! turns it into mapping or join records. Recognizers return a
//! [`SkipReason`] instead of failing; the caller records it and moves on.

use super::bindings::{Bindings, root_variable};
use super::expander::expand_comprehension;
use super::resolver::{COLUMN_ACCESSOR, is_valid_candidate, single_column};
use super::sink::{ArrayField, JoinRecord, MappingDraft};
use super::{ExtractionContext, SkipReason};
use crate::ast::Expr;

/// Methods the traversal dispatches on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Select,
    WithColumn,
    WithColumns,
    Join,
    Alias,
    Aggregate,
    Other,
}

impl Operation {
    pub fn from_method(name: &str) -> Self {
        match name {
            "select" => Operation::Select,
            "withColumn" => Operation::WithColumn,
            "withColumns" => Operation::WithColumns,
            "join" => Operation::Join,
            "alias" => Operation::Alias,
            "agg" | "groupBy" => Operation::Aggregate,
            _ => Operation::Other,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Operation::Select => "select",
            Operation::WithColumn => "withColumn",
            Operation::WithColumns => "withColumns",
            Operation::Join => "join",
            Operation::Alias => "alias",
            Operation::Aggregate => "agg",
            Operation::Other => "call",
        }
    }
}

// ---------------------------------------------------------------------------
// Array-of-struct fields
// ---------------------------------------------------------------------------

/// How much of an aliased struct field goes into its transformation text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FieldText {
    /// `col('a')` for `col('a').alias('x')`
    Source,
    /// `col('a').alias('x')` as written
    Aliased,
}

/// Fields of `array(struct(x.alias("a"), ...))`, expanding a comprehension
/// argument (`array(*[struct(...) for ...])`) when it is static. Expanded
/// fields keep their `.alias(...)` in the transformation text.
pub fn array_fields(expr: &Expr, bindings: &Bindings) -> Vec<ArrayField> {
    if !expr.is_call_to("array") {
        return Vec::new();
    }
    let args = expr.call_args();
    if let Some(first) = args.first()
        && let Some(items) = expand_comprehension(first, bindings)
    {
        return items
            .iter()
            .filter(|item| item.is_call_to("struct"))
            .flat_map(|item| struct_fields(item, FieldText::Aliased))
            .collect();
    }
    args.iter()
        .filter(|arg| arg.is_call_to("struct"))
        .flat_map(|arg| struct_fields(arg, FieldText::Source))
        .collect()
}

fn struct_fields(call: &Expr, text: FieldText) -> Vec<ArrayField> {
    call.call_args()
        .iter()
        .filter(|arg| arg.is_call_to("alias"))
        .filter_map(|field| {
            let receiver = field.method_receiver()?;
            let transformation = match text {
                FieldText::Source => receiver.to_canonical(),
                FieldText::Aliased => field.to_canonical(),
            };
            Some(ArrayField {
                alias: field.first_str_arg().unwrap_or_default().to_string(),
                transformation,
            })
        })
        .collect()
}

/// Fields of every `struct(...)` nested anywhere among call arguments.
fn nested_struct_fields(expr: &Expr, out: &mut Vec<ArrayField>) {
    if expr.is_call_to("struct") {
        out.extend(struct_fields(expr, FieldText::Source));
        return;
    }
    for arg in expr.call_args() {
        nested_struct_fields(arg, out);
    }
}

fn peel_alias(expr: &Expr) -> &Expr {
    match expr.method_receiver() {
        Some(receiver) if expr.is_call_to("alias") => receiver,
        _ => expr,
    }
}

// ---------------------------------------------------------------------------
// alias
// ---------------------------------------------------------------------------

/// `df.alias("x")` seen outside an assignment: bind `x` when `df` is known.
pub(crate) fn bind_alias(cx: &mut ExtractionContext<'_>, call: &Expr) {
    let (Some(alias), Some(receiver)) = (call.first_str_arg(), call.method_receiver()) else {
        return;
    };
    if let Some(table) = cx.bindings.frame_table(receiver) {
        tracing::debug!(alias, table = %table, "dataframe alias bound");
        cx.bindings.aliases.insert(alias, table);
    }
}

// ---------------------------------------------------------------------------
// select
// ---------------------------------------------------------------------------

pub(crate) fn select(cx: &mut ExtractionContext<'_>, call: &Expr) {
    let table = call.method_receiver().and_then(|receiver| {
        cx.bindings
            .frame_table(receiver)
            .or_else(|| receiver.as_name().map(str::to_string))
    });
    for arg in call.call_args() {
        select_argument(cx, arg, table.as_deref());
    }
}

fn select_argument(cx: &mut ExtractionContext<'_>, arg: &Expr, table: Option<&str>) {
    let starred = match arg {
        Expr::Starred(inner) => Some(inner.as_ref()),
        _ => None,
    };
    let collection = starred.unwrap_or(arg);

    match collection {
        Expr::ListComp { .. } => match expand_comprehension(collection, &cx.bindings) {
            Some(items) => {
                tracing::debug!(count = items.len(), "select comprehension expanded");
                for item in &items {
                    select_item(cx, item, table);
                }
            }
            None => opaque_select(cx, arg, table),
        },
        Expr::List(items) => {
            for item in items {
                select_item(cx, item, table);
            }
        }
        Expr::Name(var) if cx.bindings.column_list(var).is_some() => {
            let items = cx
                .bindings
                .column_list(var)
                .map(<[Expr]>::to_vec)
                .unwrap_or_default();
            for item in &items {
                select_item(cx, item, table);
            }
        }
        _ if starred.is_some() => opaque_select(cx, arg, table),
        _ => select_item(cx, arg, table),
    }
}

/// A collection argument that cannot be unrolled: one mapping with the
/// whole argument as transformation and whatever columns it mentions.
fn opaque_select(cx: &mut ExtractionContext<'_>, arg: &Expr, table: Option<&str>) {
    let resolution = cx.resolver().resolve_expr(arg, table);
    cx.emit(MappingDraft {
        table: resolution.tables_text(),
        columns: resolution.columns_text(),
        target: None,
        transformation: arg.to_canonical(),
        array_fields: Vec::new(),
    });
    cx.skip(Operation::Select, arg, SkipReason::NotExpandable);
}

fn select_item(cx: &mut ExtractionContext<'_>, expr: &Expr, table: Option<&str>) {
    if let Err(reason) = select_expression(cx, expr, table) {
        cx.skip(Operation::Select, expr, reason);
    }
}

fn select_expression(
    cx: &mut ExtractionContext<'_>,
    expr: &Expr,
    table: Option<&str>,
) -> Result<(), SkipReason> {
    let table = table
        .map(str::to_string)
        .or_else(|| cx.bindings.hint().map(str::to_string));
    let table = table.as_deref();

    match (expr.call_name(), expr.method_receiver()) {
        (Some("alias"), Some(source)) => aliased_select(cx, expr, source, table),
        (Some("explode"), _) => explode_select(cx, expr, table),
        (Some(COLUMN_ACCESSOR), _) if expr.first_str_arg().is_some() => {
            let candidates: Vec<String> = expr
                .first_str_arg()
                .filter(|name| is_valid_candidate(name))
                .map(str::to_string)
                .into_iter()
                .collect();
            let resolution = cx.resolver().resolve(&candidates, table);
            cx.emit(MappingDraft {
                table: resolution.tables_text(),
                columns: resolution.columns_text(),
                target: None,
                transformation: expr.to_canonical(),
                array_fields: Vec::new(),
            });
            Ok(())
        }
        _ => {
            expr.for_each_child(|child| cx.visit_expr(child));
            Ok(())
        }
    }
}

fn aliased_select(
    cx: &mut ExtractionContext<'_>,
    expr: &Expr,
    source: &Expr,
    table: Option<&str>,
) -> Result<(), SkipReason> {
    let target = match expr.call_args().first() {
        None => return Err(SkipReason::Malformed("alias without a name".into())),
        Some(Expr::Str(name)) => name.clone(),
        Some(_) => return Err(SkipReason::NonLiteralTarget),
    };
    let fields = array_fields(source, &cx.bindings);

    let resolver = cx.resolver();
    let mut resolution = resolver.resolve_expr(source, table);
    if resolution.columns.is_empty()
        && let Some(single) = single_column(source)
        && is_valid_candidate(&single)
    {
        resolution = resolver.resolve(&[single], table);
    }
    let display_table = if resolution.tables.is_empty() {
        table.unwrap_or(&cx.config.unknown_table).to_string()
    } else {
        resolution.tables_text()
    };

    cx.emit(MappingDraft {
        table: display_table,
        columns: resolution.columns_text(),
        target: Some(target),
        transformation: expr.to_canonical(),
        array_fields: fields,
    });
    Ok(())
}

fn explode_select(
    cx: &mut ExtractionContext<'_>,
    expr: &Expr,
    table: Option<&str>,
) -> Result<(), SkipReason> {
    let args = expr.call_args();
    let (Some(first), Some(last)) = (args.first(), args.last()) else {
        return Err(SkipReason::Malformed("explode without arguments".into()));
    };
    let candidates: Vec<String> = single_column(first)
        .filter(|c| is_valid_candidate(c))
        .into_iter()
        .collect();
    let resolution = cx.resolver().resolve(&candidates, table);
    cx.emit(MappingDraft {
        table: resolution.tables_text(),
        columns: resolution.columns_text(),
        target: Some(last.to_canonical()),
        transformation: expr.to_canonical(),
        array_fields: Vec::new(),
    });
    Ok(())
}

// ---------------------------------------------------------------------------
// withColumn / withColumns
// ---------------------------------------------------------------------------

/// Process a whole `.withColumn` chain from its base outwards. Calls already
/// processed (same canonical text) are skipped, so visiting the inner links
/// of the chain again emits nothing.
pub(crate) fn with_column_chain(cx: &mut ExtractionContext<'_>, call: &Expr) {
    let mut chain = Vec::new();
    let mut node = call;
    while node.is_call_to("withColumn") {
        chain.push(node);
        match node.method_receiver() {
            Some(receiver) => node = receiver,
            None => break,
        }
    }
    chain.reverse();

    let default_table = cx
        .bindings
        .frame_table(node)
        .or_else(|| {
            root_variable(node)
                .and_then(|var| cx.bindings.aliases.get(var))
                .map(str::to_string)
        })
        .or_else(|| cx.bindings.hint().map(str::to_string));

    for link in chain {
        if !cx.first_with_column(link.to_canonical()) {
            continue;
        }
        if let Err(reason) = with_column(cx, link, default_table.as_deref()) {
            cx.skip(Operation::WithColumn, link, reason);
        }
    }
}

fn with_column(
    cx: &mut ExtractionContext<'_>,
    call: &Expr,
    default_table: Option<&str>,
) -> Result<(), SkipReason> {
    let [target, value, ..] = call.call_args() else {
        return Err(SkipReason::Malformed(
            "withColumn expects a column name and an expression".into(),
        ));
    };
    let target = target.as_str().ok_or(SkipReason::NonLiteralTarget)?;
    let source = peel_alias(value);
    let fields = array_fields(source, &cx.bindings);

    let resolution = cx.resolver().resolve_expr(source, default_table);
    let table = if resolution.tables.is_empty() {
        default_table.unwrap_or_default().to_string()
    } else {
        resolution.tables_text()
    };
    cx.emit(MappingDraft {
        table,
        columns: resolution.columns_text(),
        target: Some(target.to_string()),
        transformation: source.to_canonical(),
        array_fields: fields,
    });
    Ok(())
}

pub(crate) fn with_columns(cx: &mut ExtractionContext<'_>, call: &Expr) -> Result<(), SkipReason> {
    let Some(Expr::Dict(entries)) = call.call_args().first() else {
        return Err(SkipReason::UnsupportedArgument(
            "withColumns expects a dict literal".into(),
        ));
    };
    let default_table = call
        .method_receiver()
        .and_then(|receiver| cx.bindings.frame_table(receiver))
        .or_else(|| cx.bindings.hint().map(str::to_string));

    for (key, value) in entries {
        let Some(target) = key.as_ref().and_then(Expr::as_str) else {
            cx.skip(Operation::WithColumns, value, SkipReason::NonLiteralTarget);
            continue;
        };
        let resolution = cx.resolver().resolve_expr(value, default_table.as_deref());
        let table = if resolution.tables.is_empty() {
            default_table.clone().unwrap_or_default()
        } else {
            resolution.tables_text()
        };
        cx.emit(MappingDraft {
            table,
            columns: resolution.columns_text(),
            target: Some(target.to_string()),
            transformation: value.to_canonical(),
            array_fields: Vec::new(),
        });
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// join
// ---------------------------------------------------------------------------

/// Dataframe variable (or registry table) a join operand is rooted at.
fn join_root(expr: &Expr, bindings: &Bindings) -> Option<String> {
    match expr {
        Expr::Name(id) => Some(id.clone()),
        Expr::Attribute { value, .. } => join_root(value, bindings),
        Expr::Subscript { value, .. } => bindings
            .registry_key(expr)
            .or_else(|| join_root(value, bindings)),
        Expr::Call { func, args, .. } => match (expr.call_name()?, func.as_ref()) {
            ("select" | "filter" | "where" | "join" | "alias", Expr::Attribute { value, .. }) => {
                join_root(value, bindings)
            }
            ("broadcast", _) => join_root(args.first()?, bindings),
            _ => None,
        },
        _ => None,
    }
}

pub(crate) fn join(cx: &mut ExtractionContext<'_>, call: &Expr) -> Result<(), SkipReason> {
    let unknown = cx.config.unknown_table.clone();
    let args = call.call_args();

    let left = call
        .method_receiver()
        .and_then(|receiver| join_root(receiver, &cx.bindings))
        .unwrap_or_else(|| unknown.clone());
    let right = args
        .first()
        .and_then(|other| join_root(other, &cx.bindings))
        .unwrap_or_else(|| unknown.clone());

    let on = call.keyword("on").or_else(|| args.get(1));
    let how = call
        .keyword("how")
        .and_then(Expr::as_str)
        .or_else(|| args.get(2).and_then(Expr::as_str));

    // plain textual substitution in alias-table order: `a.` also rewrites
    // the tail of `ba.`
    let mut condition = on.map(Expr::to_canonical).unwrap_or(unknown);
    for (var, table) in cx.bindings.aliases.iter() {
        condition = condition.replace(&format!("{var}."), &format!("{table}."));
    }

    let record = JoinRecord {
        primary_table: cx.bindings.aliases.resolve(&left).to_string(),
        secondary_table: cx.bindings.aliases.resolve(&right).to_string(),
        join_type: how.unwrap_or("left").to_uppercase(),
        join_condition: condition,
        remarks: String::new(),
    };
    cx.sink.append_join(record);
    Ok(())
}

// ---------------------------------------------------------------------------
// groupBy / agg
// ---------------------------------------------------------------------------

/// `var = df.groupBy(...).agg(expr.alias("t"), ...)`: one mapping per
/// aliased aggregate.
pub(crate) fn aggregation(cx: &mut ExtractionContext<'_>, var: &str, value: &Expr) {
    let table = cx
        .bindings
        .aliases
        .get(var)
        .map(str::to_string)
        .or_else(|| {
            value
                .method_receiver()
                .and_then(|receiver| cx.bindings.frame_table(receiver))
        })
        .or_else(|| cx.bindings.hint().map(str::to_string));

    for arg in value.call_args() {
        if !arg.is_call_to("alias") {
            continue;
        }
        let Some(target) = arg.first_str_arg() else {
            cx.skip(Operation::Aggregate, arg, SkipReason::NonLiteralTarget);
            continue;
        };

        let mut fields = Vec::new();
        if let Some(aggregate) = arg.method_receiver() {
            for inner in aggregate.call_args() {
                nested_struct_fields(inner, &mut fields);
            }
        }

        let resolution = cx.resolver().resolve_expr(arg, table.as_deref());
        let display_table = if resolution.tables.is_empty() {
            table.clone().unwrap_or_default()
        } else {
            resolution.tables_text()
        };
        cx.emit(MappingDraft {
            table: display_table,
            columns: resolution.columns_text(),
            target: Some(target.to_string()),
            transformation: arg.to_canonical(),
            array_fields: fields,
        });
    }
}
