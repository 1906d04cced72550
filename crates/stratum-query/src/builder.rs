//! Single-statement SELECT builder.
//!
//! [`SelectBuilder`] holds the mutable shape of one statement (select list,
//! sources, joins, predicates) and renders it to SQL text on demand.
//! Rendering is deterministic and side-effect free, so the same builder can
//! be rendered any number of times. `Clone` is the deep-copy contract: a
//! cloned builder shares no state with the original.

use serde_json::Value;

use crate::join::JoinDescriptor;
use crate::params::{ParamType, ParameterTypes, Parameters};

/// How a join combines rows with its target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinKind {
    Inner,
    Left,
}

impl JoinKind {
    fn keyword(self) -> &'static str {
        match self {
            JoinKind::Inner => "JOIN",
            JoinKind::Left => "LEFT JOIN",
        }
    }
}

/// One join clause, attached to the FROM entry it hangs off.
#[derive(Debug, Clone)]
struct JoinClause {
    kind: JoinKind,
    from_alias: String,
    target: String,
    alias: String,
    condition: String,
}

impl JoinClause {
    fn to_sql(&self) -> String {
        if self.alias.is_empty() || self.alias == self.target {
            format!("{} {} ON {}", self.kind.keyword(), self.target, self.condition)
        } else {
            format!(
                "{} {} {} ON {}",
                self.kind.keyword(),
                self.target,
                self.alias,
                self.condition
            )
        }
    }
}

/// One FROM reference with an optional alias.
#[derive(Debug, Clone)]
struct TableRef {
    table: String,
    alias: Option<String>,
}

impl TableRef {
    fn effective_alias(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.table)
    }
}

/// Mutable representation of one in-progress SELECT statement.
#[derive(Debug, Clone, Default)]
pub struct SelectBuilder {
    select: Vec<String>,
    from: Vec<TableRef>,
    joins: Vec<JoinClause>,
    conditions: Vec<String>,
    group_by: Vec<String>,
    order_by: Vec<String>,
    limit: Option<u64>,
    unions: Vec<SelectBuilder>,
    params: Parameters,
    param_types: ParameterTypes,
}

impl SelectBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the select list.
    pub fn select<I, S>(&mut self, columns: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.select = columns.into_iter().map(Into::into).collect();
        self
    }

    /// Append one select expression.
    pub fn add_select(&mut self, expr: impl Into<String>) -> &mut Self {
        self.select.push(expr.into());
        self
    }

    /// Add a source table under its own name.
    pub fn from(&mut self, table: impl Into<String>) -> &mut Self {
        self.from.push(TableRef {
            table: table.into(),
            alias: None,
        });
        self
    }

    /// Add a source table under an alias.
    pub fn from_as(&mut self, table: impl Into<String>, alias: impl Into<String>) -> &mut Self {
        self.from.push(TableRef {
            table: table.into(),
            alias: Some(alias.into()),
        });
        self
    }

    /// Add an inner join hanging off `from_alias`.
    pub fn join(
        &mut self,
        from_alias: impl Into<String>,
        target: impl Into<String>,
        alias: impl Into<String>,
        condition: impl Into<String>,
    ) -> &mut Self {
        self.push_join(JoinKind::Inner, from_alias, target, alias, condition)
    }

    /// Add a left outer join hanging off `from_alias`.
    pub fn left_join(
        &mut self,
        from_alias: impl Into<String>,
        target: impl Into<String>,
        alias: impl Into<String>,
        condition: impl Into<String>,
    ) -> &mut Self {
        self.push_join(JoinKind::Left, from_alias, target, alias, condition)
    }

    /// Apply a prepared join descriptor.
    pub fn add_join(&mut self, kind: JoinKind, join: &JoinDescriptor) -> &mut Self {
        self.push_join(
            kind,
            join.from_alias.clone(),
            join.target.clone(),
            join.alias.clone(),
            join.condition.clone(),
        )
    }

    fn push_join(
        &mut self,
        kind: JoinKind,
        from_alias: impl Into<String>,
        target: impl Into<String>,
        alias: impl Into<String>,
        condition: impl Into<String>,
    ) -> &mut Self {
        self.joins.push(JoinClause {
            kind,
            from_alias: from_alias.into(),
            target: target.into(),
            alias: alias.into(),
            condition: condition.into(),
        });
        self
    }

    /// AND another condition onto the WHERE clause.
    pub fn and_where(&mut self, condition: impl Into<String>) -> &mut Self {
        self.conditions.push(condition.into());
        self
    }

    /// Append a GROUP BY expression.
    pub fn group_by(&mut self, expr: impl Into<String>) -> &mut Self {
        self.group_by.push(expr.into());
        self
    }

    /// Append an ORDER BY expression.
    pub fn order_by(&mut self, expr: impl Into<String>) -> &mut Self {
        self.order_by.push(expr.into());
        self
    }

    /// Cap the number of returned rows.
    pub fn limit(&mut self, limit: u64) -> &mut Self {
        self.limit = Some(limit);
        self
    }

    /// Append a `UNION ALL` arm.
    ///
    /// The arm's bound parameters are merged into this builder, so
    /// [`SelectBuilder::parameters`] stays the single source of truth for
    /// the whole compound statement.
    pub fn union_all(&mut self, mut other: SelectBuilder) -> &mut Self {
        self.params.extend(other.params.drain());
        self.param_types.extend(other.param_types.drain());
        self.unions.push(other);
        self
    }

    /// Bind a named parameter with its declared type.
    ///
    /// The statement text refers to it as `:name`.
    pub fn set_parameter(
        &mut self,
        name: impl Into<String>,
        value: impl Into<Value>,
        ty: ParamType,
    ) -> &mut Self {
        let name = name.into();
        self.params.insert(name.clone(), value.into());
        self.param_types.insert(name, ty);
        self
    }

    /// All parameters bound on this builder.
    pub fn parameters(&self) -> &Parameters {
        &self.params
    }

    /// Declared types for the bound parameters.
    pub fn parameter_types(&self) -> &ParameterTypes {
        &self.param_types
    }

    /// True when nothing has been set on this builder.
    pub fn is_empty(&self) -> bool {
        self.select.is_empty()
            && self.from.is_empty()
            && self.joins.is_empty()
            && self.conditions.is_empty()
            && self.group_by.is_empty()
            && self.order_by.is_empty()
            && self.limit.is_none()
            && self.unions.is_empty()
    }

    /// Render the statement.
    ///
    /// An empty select list renders as `SELECT *`. Joins render after the
    /// FROM entry they hang off; joins referencing no FROM entry (e.g. a
    /// join onto another join's alias) render at the end of the FROM clause.
    pub fn to_sql(&self) -> String {
        let mut sql = String::from("SELECT ");
        if self.select.is_empty() {
            sql.push('*');
        } else {
            sql.push_str(&self.select.join(", "));
        }

        if !self.from.is_empty() {
            sql.push_str(" FROM ");
            for (i, table) in self.from.iter().enumerate() {
                if i > 0 {
                    sql.push_str(", ");
                }
                sql.push_str(&table.table);
                if let Some(alias) = &table.alias {
                    sql.push(' ');
                    sql.push_str(alias);
                }
                for join in self.joins_for(table.effective_alias()) {
                    sql.push(' ');
                    sql.push_str(&join.to_sql());
                }
            }
            for join in self.dangling_joins() {
                sql.push(' ');
                sql.push_str(&join.to_sql());
            }
        }

        if !self.conditions.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&self.conditions.join(" AND "));
        }

        if !self.group_by.is_empty() {
            sql.push_str(" GROUP BY ");
            sql.push_str(&self.group_by.join(", "));
        }

        for arm in &self.unions {
            sql.push_str(" UNION ALL ");
            sql.push_str(&arm.to_sql());
        }

        if !self.order_by.is_empty() {
            sql.push_str(" ORDER BY ");
            sql.push_str(&self.order_by.join(", "));
        }

        if let Some(limit) = self.limit {
            sql.push_str(&format!(" LIMIT {}", limit));
        }

        sql
    }

    fn joins_for<'a>(&'a self, from_alias: &'a str) -> impl Iterator<Item = &'a JoinClause> {
        self.joins.iter().filter(move |j| j.from_alias == from_alias)
    }

    fn dangling_joins(&self) -> impl Iterator<Item = &JoinClause> {
        self.joins
            .iter()
            .filter(|j| !self.from.iter().any(|t| t.effective_alias() == j.from_alias))
    }
}
