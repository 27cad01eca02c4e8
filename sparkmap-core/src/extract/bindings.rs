//! Binding/alias tracker — maps program variables to the tables they denote.
//!
//! Bindings are mutated strictly in traversal order, last write wins, and are
//! never rolled back. The dataframe → table table keeps insertion order
//! because join conditions are rewritten by iterating it.

use super::expander;
use crate::ast::{Expr, callee_name};
use crate::config::ExtractorConfig;
use std::collections::{HashMap, HashSet};

/// Methods that hand back a dataframe over the same table as their receiver.
pub const PASS_THROUGH_METHODS: &[&str] = &["filter", "select", "groupBy", "agg"];

/// Insertion-ordered variable → table map. Re-binding a variable updates the
/// value in place and keeps its original position.
#[derive(Debug, Clone, Default)]
pub struct AliasTable {
    entries: Vec<(String, String)>,
    index: HashMap<String, usize>,
}

impl AliasTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, var: impl Into<String>, table: impl Into<String>) {
        let var = var.into();
        let table = table.into();
        match self.index.get(&var) {
            Some(&idx) => self.entries[idx].1 = table,
            None => {
                self.index.insert(var.clone(), self.entries.len());
                self.entries.push((var, table));
            }
        }
    }

    pub fn get(&self, var: &str) -> Option<&str> {
        self.index.get(var).map(|&idx| self.entries[idx].1.as_str())
    }

    /// The bound table, or the name itself when unbound.
    pub fn resolve<'a>(&'a self, name: &'a str) -> &'a str {
        self.get(name).unwrap_or(name)
    }

    pub fn contains(&self, var: &str) -> bool {
        self.index.contains_key(var)
    }

    /// Entries in first-insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(v, t)| (v.as_str(), t.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Which right-hand-side shape produced a binding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindingShape {
    LiteralList,
    Comprehension,
    RegistryBuilder,
    TableLoad,
    RegistrySubscript,
    Alias,
    PassThrough,
}

/// All binding state of one extraction run.
#[derive(Debug, Clone, Default)]
pub struct Bindings {
    /// Dataframe variable (or `.alias()` name) → table.
    pub aliases: AliasTable,
    table_lists: HashMap<String, Vec<String>>,
    column_lists: HashMap<String, Vec<Expr>>,
    /// Variables known to hold several tables (registries, subscripts).
    frame_tables: HashMap<String, Vec<String>>,
    registries: HashSet<String>,
    loaders: HashSet<String>,
    hint: Option<String>,
}

impl Bindings {
    pub fn new(config: &ExtractorConfig) -> Self {
        Self {
            registries: config.registry_names.iter().cloned().collect(),
            loaders: config.table_loaders.iter().cloned().collect(),
            ..Self::default()
        }
    }

    /// Most recently inferred single table. Never authoritative.
    pub fn hint(&self) -> Option<&str> {
        self.hint.as_deref()
    }

    pub fn set_hint(&mut self, table: impl Into<String>) {
        self.hint = Some(table.into());
    }

    pub fn table_list(&self, var: &str) -> Option<&[String]> {
        self.table_lists.get(var).map(Vec::as_slice)
    }

    pub fn column_list(&self, var: &str) -> Option<&[Expr]> {
        self.column_lists.get(var).map(Vec::as_slice)
    }

    pub fn is_registry(&self, name: &str) -> bool {
        self.registries.contains(name)
    }

    /// Record the binding implied by `var = value`, if any. The first
    /// matching shape wins.
    pub fn bind_assignment(
        &mut self,
        var: &str,
        value: &Expr,
        config: &ExtractorConfig,
    ) -> Option<BindingShape> {
        let shape = self.match_shape(var, value, config);
        if let Some(shape) = shape {
            tracing::debug!(
                var,
                ?shape,
                table = self.aliases.get(var).unwrap_or(""),
                "binding recorded"
            );
        }
        shape
    }

    fn match_shape(
        &mut self,
        var: &str,
        value: &Expr,
        config: &ExtractorConfig,
    ) -> Option<BindingShape> {
        match value {
            Expr::List(items) | Expr::Tuple(items) => {
                let tables: Vec<String> = items
                    .iter()
                    .filter_map(Expr::as_str)
                    .map(str::to_string)
                    .collect();
                self.table_lists.insert(var.to_string(), tables);
                self.column_lists.insert(var.to_string(), items.clone());
                return Some(BindingShape::LiteralList);
            }
            Expr::ListComp { .. } => {
                let expanded = expander::expand_comprehension(value, self)?;
                tracing::debug!(var, count = expanded.len(), "comprehension captured");
                self.column_lists.insert(var.to_string(), expanded);
                return Some(BindingShape::Comprehension);
            }
            Expr::Subscript { .. } => {
                let table = self.registry_key(value)?;
                self.bind_frame(var, vec![table]);
                return Some(BindingShape::RegistrySubscript);
            }
            _ => {}
        }

        let Expr::Call { func, args, .. } = value else {
            return None;
        };
        let name = callee_name(func)?;

        if matches!(func.as_ref(), Expr::Name(_))
            && config.registry_builders.iter().any(|b| b == name)
        {
            let tables = args
                .get(2)
                .and_then(Expr::as_name)
                .and_then(|list| self.table_lists.get(list))
                .cloned()
                .unwrap_or_default();
            self.registries.insert(var.to_string());
            if tables.len() > 1 {
                tracing::debug!(var, ?tables, "registry created with multiple tables");
            }
            self.bind_frame(var, tables);
            return Some(BindingShape::RegistryBuilder);
        }

        if let Some(table) = self.loaded_table(value) {
            self.aliases.insert(var, table);
            self.set_hint(table);
            return Some(BindingShape::TableLoad);
        }

        let receiver = value.method_receiver()?;

        if name == "alias"
            && let Some(alias) = value.first_str_arg()
        {
            // column aliases (`F.col("x").alias("y")`) never bind
            if let Some(table) = self.frame_table(receiver) {
                self.aliases.insert(alias, table.clone());
                self.aliases.insert(var, table.clone());
                self.set_hint(table);
                return Some(BindingShape::Alias);
            }
            let base = receiver.as_name()?;
            self.aliases.insert(alias, base);
            self.aliases.insert(var, base);
            return Some(BindingShape::Alias);
        }

        if PASS_THROUGH_METHODS.contains(&name)
            && let Some(table) = self.frame_table(receiver)
        {
            self.aliases.insert(var, table.clone());
            self.set_hint(table);
            return Some(BindingShape::PassThrough);
        }

        None
    }

    fn bind_frame(&mut self, var: &str, tables: Vec<String>) {
        if let Some(first) = tables.first() {
            self.set_hint(first.clone());
            if tables.len() == 1 {
                self.aliases.insert(var, first.clone());
            }
        }
        self.frame_tables.insert(var.to_string(), tables);
    }

    /// Table key of `registry["T"]` or `registry[table_list]` (first entry).
    pub fn registry_key(&self, expr: &Expr) -> Option<String> {
        let Expr::Subscript { value, index } = expr else {
            return None;
        };
        let registry = value.as_name()?;
        if !self.is_registry(registry) {
            return None;
        }
        match index.as_ref() {
            Expr::Str(table) => Some(table.clone()),
            Expr::Name(list) => self.table_lists.get(list)?.first().cloned(),
            _ => None,
        }
    }

    /// Literal table name of a table-load call (`spark.table("T")`).
    pub fn loaded_table<'e>(&self, expr: &'e Expr) -> Option<&'e str> {
        let name = expr.call_name()?;
        if !self.loaders.contains(name) {
            return None;
        }
        expr.first_str_arg()
    }

    /// Table behind a dataframe expression: a bound variable, a registry
    /// subscript, a table load, or a pass-through method chain over any of
    /// these.
    pub fn frame_table(&self, expr: &Expr) -> Option<String> {
        match expr {
            Expr::Name(var) => self.aliases.get(var).map(str::to_string),
            Expr::Subscript { .. } => self.registry_key(expr),
            Expr::Call { .. } => {
                if let Some(table) = self.loaded_table(expr) {
                    return Some(table.to_string());
                }
                let name = expr.call_name()?;
                if !PASS_THROUGH_METHODS.contains(&name) {
                    return None;
                }
                self.frame_table(expr.method_receiver()?)
            }
            _ => None,
        }
    }

    /// Refresh the hint from the root variable of a method call chain.
    pub fn refresh_hint(&mut self, call: &Expr) {
        let Some(root) = root_variable(call) else {
            return;
        };
        let from_frame = self
            .frame_tables
            .get(root)
            .and_then(|tables| tables.first())
            .cloned();
        let from_alias = self.aliases.get(root).map(str::to_string);
        if let Some(table) = from_alias.or(from_frame) {
            self.hint = Some(table);
        }
    }
}

/// Root variable of a method chain or attribute access
/// (`df` for `df.filter(...).withColumn(...)`).
pub fn root_variable(expr: &Expr) -> Option<&str> {
    let mut node = expr;
    loop {
        match node {
            Expr::Call { func, .. } => match func.as_ref() {
                Expr::Attribute { value, .. } => node = value,
                _ => return None,
            },
            Expr::Attribute { value, .. } => node = value,
            Expr::Name(id) => return Some(id),
            _ => return None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::parse_expression;

    fn bind(bindings: &mut Bindings, var: &str, src: &str) -> Option<BindingShape> {
        let value = parse_expression(src).unwrap();
        bindings.bind_assignment(var, &value, &ExtractorConfig::default())
    }

    #[test]
    fn test_alias_table_keeps_first_insertion_order() {
        let mut table = AliasTable::new();
        table.insert("b", "B");
        table.insert("a", "A");
        table.insert("b", "B2");
        let entries: Vec<_> = table.iter().collect();
        assert_eq!(entries, vec![("b", "B2"), ("a", "A")]);
        assert_eq!(table.resolve("zzz"), "zzz");
    }

    #[test]
    fn test_table_load_binds_and_sets_hint() {
        let mut b = Bindings::new(&ExtractorConfig::default());
        assert_eq!(
            bind(&mut b, "cust", "spark.read.table('silver.customers')"),
            Some(BindingShape::TableLoad)
        );
        assert_eq!(b.aliases.get("cust"), Some("silver.customers"));
        assert_eq!(b.hint(), Some("silver.customers"));

        assert_eq!(bind(&mut b, "orders", "table('orders')"), Some(BindingShape::TableLoad));
        assert_eq!(b.aliases.get("orders"), Some("orders"));
    }

    #[test]
    fn test_non_literal_table_load_is_ignored() {
        let mut b = Bindings::new(&ExtractorConfig::default());
        assert_eq!(bind(&mut b, "x", "spark.table(name)"), None);
        assert!(b.aliases.is_empty());
    }

    #[test]
    fn test_registry_subscript() {
        let mut b = Bindings::new(&ExtractorConfig::default());
        bind(&mut b, "tables", "['provider_address', 'provider_name']");
        assert_eq!(
            bind(&mut b, "dm_df", "create_dataframe_from_table(spark, schema, tables)"),
            Some(BindingShape::RegistryBuilder)
        );
        assert_eq!(b.hint(), Some("provider_address"));

        assert_eq!(
            bind(&mut b, "addr", "dm_df['provider_address']"),
            Some(BindingShape::RegistrySubscript)
        );
        assert_eq!(b.aliases.get("addr"), Some("provider_address"));

        assert_eq!(
            bind(&mut b, "first", "dm_df[tables]"),
            Some(BindingShape::RegistrySubscript)
        );
        assert_eq!(b.aliases.get("first"), Some("provider_address"));

        // not a registry
        assert_eq!(bind(&mut b, "row", "record['provider_name']"), None);
    }

    #[test]
    fn test_pass_through_and_filtered_subscript() {
        let mut b = Bindings::new(&ExtractorConfig::default());
        bind(&mut b, "base", "spark.table('claims')");
        assert_eq!(
            bind(&mut b, "open_claims", "base.filter(col('status') == 'OPEN').select('id')"),
            Some(BindingShape::PassThrough)
        );
        assert_eq!(b.aliases.get("open_claims"), Some("claims"));

        assert_eq!(
            bind(&mut b, "active", "dm_df['provider_stfstatu'].filter(col('a').isin(['1']))"),
            Some(BindingShape::PassThrough)
        );
        assert_eq!(b.aliases.get("active"), Some("provider_stfstatu"));

        // unbound receiver leaves no binding
        assert_eq!(bind(&mut b, "other", "unknown_df.filter(x)"), None);
    }

    #[test]
    fn test_alias_binds_alias_name() {
        let mut b = Bindings::new(&ExtractorConfig::default());
        bind(&mut b, "members", "spark.table('edw.member')");
        assert_eq!(
            bind(&mut b, "m", "members.alias('mbr')"),
            Some(BindingShape::Alias)
        );
        assert_eq!(b.aliases.get("mbr"), Some("edw.member"));
        assert_eq!(b.aliases.get("m"), Some("edw.member"));
    }

    #[test]
    fn test_column_alias_does_not_bind_or_move_hint() {
        let mut b = Bindings::new(&ExtractorConfig::default());
        bind(&mut b, "df", "spark.table('claims')");
        assert_eq!(bind(&mut b, "amt", "F.col('amount').alias('amt')"), None);
        assert!(!b.aliases.contains("amt"));
        assert!(!b.aliases.contains("F"));
        assert_eq!(b.hint(), Some("claims"));
    }

    #[test]
    fn test_alias_of_unbound_frame_keeps_hint() {
        let mut b = Bindings::new(&ExtractorConfig::default());
        bind(&mut b, "df", "spark.table('claims')");
        assert_eq!(
            bind(&mut b, "o", "other_df.alias('od')"),
            Some(BindingShape::Alias)
        );
        assert_eq!(b.aliases.get("od"), Some("other_df"));
        assert_eq!(b.aliases.get("o"), Some("other_df"));
        assert_eq!(b.hint(), Some("claims"));
    }

    #[test]
    fn test_alias_and_filter_directly_on_table_load() {
        let mut b = Bindings::new(&ExtractorConfig::default());
        assert_eq!(
            bind(&mut b, "p", "spark.table('silver.provider').alias('pr')"),
            Some(BindingShape::Alias)
        );
        assert_eq!(b.aliases.get("pr"), Some("silver.provider"));
        assert_eq!(
            bind(&mut b, "recent", "spark.read.table('claims').filter(col('yr') > 2020)"),
            Some(BindingShape::PassThrough)
        );
        assert_eq!(b.aliases.get("recent"), Some("claims"));
    }

    #[test]
    fn test_literal_lists_capture_tables_and_columns() {
        let mut b = Bindings::new(&ExtractorConfig::default());
        assert_eq!(
            bind(&mut b, "cols", "[col('a'), 'b', F.upper(col('c'))]"),
            Some(BindingShape::LiteralList)
        );
        assert_eq!(b.table_list("cols"), Some(&["b".to_string()][..]));
        assert_eq!(b.column_list("cols").map(<[Expr]>::len), Some(3));
    }

    #[test]
    fn test_comprehension_capture() {
        let mut b = Bindings::new(&ExtractorConfig::default());
        bind(&mut b, "names", "('a', 'b')");
        assert_eq!(
            bind(&mut b, "cols", "[col(n) for n in names]"),
            Some(BindingShape::Comprehension)
        );
        let captured: Vec<String> = b
            .column_list("cols")
            .unwrap()
            .iter()
            .map(Expr::to_canonical)
            .collect();
        assert_eq!(captured, vec!["col('a')", "col('b')"]);

        // iterable not statically known: nothing captured
        assert_eq!(bind(&mut b, "dyn", "[col(n) for n in df.columns]"), None);
        assert!(b.column_list("dyn").is_none());
    }

    #[test]
    fn test_refresh_hint_from_chain_root() {
        let mut b = Bindings::new(&ExtractorConfig::default());
        bind(&mut b, "a", "spark.table('A')");
        bind(&mut b, "c", "spark.table('C')");
        let call = parse_expression("a.filter(x).withColumn('y', lit(1))").unwrap();
        b.refresh_hint(&call);
        assert_eq!(b.hint(), Some("A"));
    }

    #[test]
    fn test_root_variable() {
        let e = parse_expression("df.a.b.filter(x).select(y)").unwrap();
        assert_eq!(root_variable(&e), Some("df"));
        let e = parse_expression("col('x').alias('y')").unwrap();
        assert_eq!(root_variable(&e), None);
    }
}
