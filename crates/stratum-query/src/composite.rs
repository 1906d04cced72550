//! Composite CTE query engine.
//!
//! [`CompositeQuery`] assembles one final statement out of a main query plus
//! any number of named common table expressions, including recursive ones.
//! Registered builders stay independently mutable until rendering; assembly
//! is pure text concatenation in registration order, and every plain CTE's
//! bound parameters are merged with the main query's for execution.

use std::fmt;
use std::sync::Arc;

use indexmap::map::Entry;
use indexmap::IndexMap;
use tracing::debug;

use crate::builder::{JoinKind, SelectBuilder};
use crate::connection::{QueryConnection, ResultSet};
use crate::error::{QueryError, QueryResult};
use crate::join::{join_onto_cte, ColumnRef};
use crate::params::{ParameterTypes, Parameters};

/// How a recursive CTE combines its anchor and step arms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UnionMode {
    /// `UNION ALL`: keep duplicate rows between iterations (the default).
    #[default]
    All,
    /// `UNION`: deduplicate between iterations.
    Distinct,
}

impl UnionMode {
    fn keyword(self) -> &'static str {
        match self {
            UnionMode::All => "UNION ALL",
            UnionMode::Distinct => "UNION",
        }
    }
}

/// A plain CTE: one builder plus an optional explicit column list.
#[derive(Debug, Clone)]
pub struct CteDefinition {
    builder: SelectBuilder,
    columns: Option<Vec<String>>,
}

impl CteDefinition {
    fn new(builder: SelectBuilder) -> Self {
        Self {
            builder,
            columns: None,
        }
    }

    pub fn builder(&self) -> &SelectBuilder {
        &self.builder
    }
}

/// A recursive CTE: anchor and step builders registered as one unit.
///
/// The pair is never split; anchor-only and step-only access go through the
/// accessors here or the engine's lookup methods.
#[derive(Debug, Clone)]
pub struct RecursiveCte {
    anchor: SelectBuilder,
    step: SelectBuilder,
    columns: Option<Vec<String>>,
    union_mode: UnionMode,
}

impl RecursiveCte {
    fn new(anchor: SelectBuilder, step: SelectBuilder, union_mode: UnionMode) -> Self {
        Self {
            anchor,
            step,
            columns: None,
            union_mode,
        }
    }

    /// The base arm, evaluated once.
    pub fn anchor(&self) -> &SelectBuilder {
        &self.anchor
    }

    pub fn anchor_mut(&mut self) -> &mut SelectBuilder {
        &mut self.anchor
    }

    /// The iterated arm, referencing the CTE's own name.
    pub fn step(&self) -> &SelectBuilder {
        &self.step
    }

    pub fn step_mut(&mut self) -> &mut SelectBuilder {
        &mut self.step
    }

    pub fn union_mode(&self) -> UnionMode {
        self.union_mode
    }
}

/// Which builder receives a lookup join.
#[derive(Debug, Clone, Copy)]
pub enum LookupTarget<'a> {
    /// The engine's main query.
    Main,
    /// A registered plain CTE.
    Cte(&'a str),
}

/// One in-progress composite statement: a main query plus named CTEs.
///
/// Registries are insertion-ordered; re-registering an alias silently
/// replaces the previous entry and keeps its original position. Plain and
/// recursive aliases live in separate namespaces and are not cross-checked;
/// a name present in both produces SQL the backend will reject.
#[derive(Clone)]
pub struct CompositeQuery {
    connection: Arc<dyn QueryConnection>,
    main: SelectBuilder,
    ctes: IndexMap<String, CteDefinition>,
    recursive_ctes: IndexMap<String, RecursiveCte>,
}

impl CompositeQuery {
    /// Create an engine bound to `connection`, with an empty main query and
    /// empty registries.
    pub fn new(connection: Arc<dyn QueryConnection>) -> Self {
        let main = connection.create_builder();
        Self {
            connection,
            main,
            ctes: IndexMap::new(),
            recursive_ctes: IndexMap::new(),
        }
    }

    /// The outer statement the CTEs are attached to.
    pub fn main(&self) -> &SelectBuilder {
        &self.main
    }

    pub fn main_mut(&mut self) -> &mut SelectBuilder {
        &mut self.main
    }

    // =========================================================================
    // Plain CTE registry
    // =========================================================================

    /// Register `builder` under `alias`, replacing any existing entry.
    ///
    /// Panics if `alias` is empty.
    pub fn add_cte(&mut self, alias: impl Into<String>, builder: SelectBuilder) -> &mut Self {
        self.insert_cte(alias.into(), CteDefinition::new(builder));
        self
    }

    /// Register a CTE with an explicit column list, rendered as
    /// `alias(col, ...) AS (...)`.
    pub fn add_cte_with_columns<I, S>(
        &mut self,
        alias: impl Into<String>,
        columns: I,
        builder: SelectBuilder,
    ) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut definition = CteDefinition::new(builder);
        definition.columns = Some(columns.into_iter().map(Into::into).collect());
        self.insert_cte(alias.into(), definition);
        self
    }

    /// Allocate a fresh builder on the connection, register it under
    /// `alias`, and return it for the caller to populate.
    pub fn create_cte(&mut self, alias: impl Into<String>) -> &mut SelectBuilder {
        let definition = CteDefinition::new(self.connection.create_builder());
        &mut self.insert_cte(alias.into(), definition).builder
    }

    pub fn has_cte(&self, alias: &str) -> bool {
        self.ctes.contains_key(alias)
    }

    /// The builder registered under `alias`.
    pub fn cte(&self, alias: &str) -> QueryResult<&SelectBuilder> {
        self.ctes
            .get(alias)
            .map(|definition| &definition.builder)
            .ok_or_else(|| unknown_alias(alias))
    }

    pub fn cte_mut(&mut self, alias: &str) -> QueryResult<&mut SelectBuilder> {
        self.ctes
            .get_mut(alias)
            .map(|definition| &mut definition.builder)
            .ok_or_else(|| unknown_alias(alias))
    }

    fn insert_cte(&mut self, alias: String, definition: CteDefinition) -> &mut CteDefinition {
        assert!(!alias.is_empty(), "CTE alias must not be empty");
        match self.ctes.entry(alias) {
            Entry::Occupied(mut entry) => {
                entry.insert(definition);
                entry.into_mut()
            }
            Entry::Vacant(entry) => entry.insert(definition),
        }
    }

    // =========================================================================
    // Recursive CTE registry
    // =========================================================================

    /// Register an anchor/step pair under `alias`, replacing any existing
    /// entry. The arms combine with `UNION ALL`.
    ///
    /// Panics if `alias` is empty.
    pub fn add_recursive_cte(
        &mut self,
        alias: impl Into<String>,
        anchor: SelectBuilder,
        step: SelectBuilder,
    ) -> &mut Self {
        self.insert_recursive_cte(alias.into(), RecursiveCte::new(anchor, step, UnionMode::All));
        self
    }

    /// Register a recursive CTE whose arms combine with `UNION`, so rows
    /// already produced are not revisited.
    pub fn add_recursive_cte_union(
        &mut self,
        alias: impl Into<String>,
        anchor: SelectBuilder,
        step: SelectBuilder,
    ) -> &mut Self {
        self.insert_recursive_cte(
            alias.into(),
            RecursiveCte::new(anchor, step, UnionMode::Distinct),
        );
        self
    }

    /// Register a recursive CTE with an explicit column list.
    pub fn add_recursive_cte_with_columns<I, S>(
        &mut self,
        alias: impl Into<String>,
        columns: I,
        anchor: SelectBuilder,
        step: SelectBuilder,
    ) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut cte = RecursiveCte::new(anchor, step, UnionMode::All);
        cte.columns = Some(columns.into_iter().map(Into::into).collect());
        self.insert_recursive_cte(alias.into(), cte);
        self
    }

    /// Allocate fresh anchor and step builders on the connection, register
    /// the pair under `alias`, and return it for the caller to populate.
    pub fn create_recursive_cte(&mut self, alias: impl Into<String>) -> &mut RecursiveCte {
        let cte = RecursiveCte::new(
            self.connection.create_builder(),
            self.connection.create_builder(),
            UnionMode::All,
        );
        self.insert_recursive_cte(alias.into(), cte)
    }

    pub fn has_recursive_cte(&self, alias: &str) -> bool {
        self.recursive_ctes.contains_key(alias)
    }

    /// The whole anchor/step pair registered under `alias`.
    pub fn recursive_cte(&self, alias: &str) -> QueryResult<&RecursiveCte> {
        self.recursive_ctes
            .get(alias)
            .ok_or_else(|| unknown_alias(alias))
    }

    pub fn recursive_cte_mut(&mut self, alias: &str) -> QueryResult<&mut RecursiveCte> {
        self.recursive_ctes
            .get_mut(alias)
            .ok_or_else(|| unknown_alias(alias))
    }

    /// The anchor half only.
    pub fn recursive_cte_anchor(&self, alias: &str) -> QueryResult<&SelectBuilder> {
        self.recursive_cte(alias).map(RecursiveCte::anchor)
    }

    /// The step half only.
    pub fn recursive_cte_step(&self, alias: &str) -> QueryResult<&SelectBuilder> {
        self.recursive_cte(alias).map(RecursiveCte::step)
    }

    fn insert_recursive_cte(&mut self, alias: String, cte: RecursiveCte) -> &mut RecursiveCte {
        assert!(!alias.is_empty(), "CTE alias must not be empty");
        match self.recursive_ctes.entry(alias) {
            Entry::Occupied(mut entry) => {
                entry.insert(cte);
                entry.into_mut()
            }
            Entry::Vacant(entry) => entry.insert(cte),
        }
    }

    // =========================================================================
    // Assembly and execution
    // =========================================================================

    /// Render the assembled statement.
    ///
    /// With empty registries this is exactly the main query's SQL. Otherwise
    /// every CTE renders in registration order, plain before recursive, under
    /// a `WITH` prefix that carries `RECURSIVE` whenever at least one
    /// recursive CTE is registered.
    pub fn to_sql(&self) -> String {
        if self.ctes.is_empty() && self.recursive_ctes.is_empty() {
            return self.main.to_sql();
        }

        let mut fragments = Vec::with_capacity(self.ctes.len() + self.recursive_ctes.len());
        for (alias, definition) in &self.ctes {
            fragments.push(format!(
                "{} AS ({})",
                render_alias(alias, definition.columns.as_deref()),
                definition.builder.to_sql()
            ));
        }
        for (alias, cte) in &self.recursive_ctes {
            fragments.push(format!(
                "{} AS ({} {} {})",
                render_alias(alias, cte.columns.as_deref()),
                cte.anchor.to_sql(),
                cte.union_mode.keyword(),
                cte.step.to_sql()
            ));
        }

        let keyword = if self.recursive_ctes.is_empty() {
            "WITH"
        } else {
            "WITH RECURSIVE"
        };

        format!("{} {} {}", keyword, fragments.join(", "), self.main.to_sql())
    }

    /// Merge bound parameters from every plain CTE and the main query.
    ///
    /// Later registrations overwrite earlier ones on name collision and the
    /// main query always wins. Recursive CTE parameters are not collected;
    /// parameters referenced inside a recursive arm must be bound on the
    /// main query to reach the backend.
    pub fn merged_parameters(&self) -> (Parameters, ParameterTypes) {
        let mut params = Parameters::new();
        let mut types = ParameterTypes::new();
        for definition in self.ctes.values() {
            params.extend(definition.builder.parameters().clone());
            types.extend(definition.builder.parameter_types().clone());
        }
        params.extend(self.main.parameters().clone());
        types.extend(self.main.parameter_types().clone());
        (params, types)
    }

    /// Assemble the statement and run it on the connection.
    ///
    /// Backend rejections surface unmodified; nothing is validated here.
    pub fn execute(&self) -> QueryResult<ResultSet> {
        let sql = self.to_sql();
        let (params, types) = self.merged_parameters();
        debug!(
            ctes = self.ctes.len(),
            recursive = self.recursive_ctes.len(),
            params = params.len(),
            "executing composite query"
        );
        self.connection.execute_query(&sql, &params, &types)
    }

    // =========================================================================
    // Derivation
    // =========================================================================

    /// Return a derived engine with `transform` applied to a copy of the
    /// main query.
    ///
    /// The derived engine shares the connection handle but owns independent
    /// copies of the main builder and of every registered CTE builder, so
    /// mutating either engine afterwards never affects the other.
    pub fn map<F>(&self, transform: F) -> Self
    where
        F: FnOnce(SelectBuilder) -> SelectBuilder,
    {
        let mut derived = self.clone();
        let main = std::mem::take(&mut derived.main);
        derived.main = transform(main);
        derived
    }

    /// Re-label the current main query as a plain CTE on a new engine.
    ///
    /// The returned engine's single CTE under `alias` is a copy of this
    /// engine's main query; its own main builder is fresh and empty. This
    /// engine is left untouched.
    pub fn move_main_to_cte(&self, alias: impl Into<String>) -> Self {
        let mut derived = Self::new(Arc::clone(&self.connection));
        derived.add_cte(alias, self.main.clone());
        derived
    }

    // =========================================================================
    // Lookup joins
    // =========================================================================

    /// Register `sub_query` as a pre-filtered lookup CTE under `alias` and
    /// LEFT JOIN the main query onto it.
    ///
    /// `join_column` must carry the qualifier of the row source being
    /// joined; panics when it is unqualified. Returns the join column
    /// rebound to `alias`, ready for an IS NULL / IS NOT NULL predicate that
    /// splits no-match rows from match rows.
    pub fn join_matching_lookup_records(
        &mut self,
        alias: &str,
        sub_query: SelectBuilder,
        join_column: &ColumnRef,
    ) -> QueryResult<ColumnRef> {
        self.join_matching_lookup_records_on(alias, sub_query, join_column, LookupTarget::Main)
    }

    /// Same as [`CompositeQuery::join_matching_lookup_records`], but the
    /// join is applied to an explicitly chosen builder instead of the main
    /// query.
    pub fn join_matching_lookup_records_on(
        &mut self,
        alias: &str,
        sub_query: SelectBuilder,
        join_column: &ColumnRef,
        target: LookupTarget<'_>,
    ) -> QueryResult<ColumnRef> {
        let Some(from_alias) = join_column.table().map(str::to_string) else {
            panic!(
                "lookup join column {:?} must carry a table qualifier",
                join_column.name()
            );
        };

        if let LookupTarget::Cte(target_alias) = target {
            if !self.has_cte(target_alias) {
                return Err(unknown_alias(target_alias));
            }
        }

        self.add_cte(alias, sub_query);

        let descriptor = join_onto_cte(alias, &from_alias, join_column.name(), None);
        let builder = match target {
            LookupTarget::Main => &mut self.main,
            LookupTarget::Cte(target_alias) => self.cte_mut(target_alias)?,
        };
        builder.add_join(JoinKind::Left, &descriptor);

        Ok(join_column.with_table(alias))
    }
}

impl fmt::Debug for CompositeQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompositeQuery")
            .field("main", &self.main)
            .field("ctes", &self.ctes)
            .field("recursive_ctes", &self.recursive_ctes)
            .finish_non_exhaustive()
    }
}

fn unknown_alias(alias: &str) -> QueryError {
    QueryError::UnknownCte {
        alias: alias.to_string(),
    }
}

fn render_alias(alias: &str, columns: Option<&[String]>) -> String {
    match columns {
        Some(columns) => format!("{}({})", alias, columns.join(", ")),
        None => alias.to_string(),
    }
}
