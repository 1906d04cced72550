//! Join-correlation helpers.
//!
//! These types build the boolean fragments that correlate a query against a
//! registered CTE: a [`ColumnRef`] renders a qualified selector, a
//! [`Comparison`] renders an equality between two of them, and
//! [`join_onto_cte`] packages both into a [`JoinDescriptor`] ready for a
//! builder's join mutation.

/// A column reference with an optional qualifying table or alias.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnRef {
    table: Option<String>,
    name: String,
}

impl ColumnRef {
    /// An unqualified column.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            table: None,
            name: name.into(),
        }
    }

    /// A column qualified by a table or alias.
    pub fn qualified(table: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            table: Some(table.into()),
            name: name.into(),
        }
    }

    /// The qualifying table or alias, if any.
    pub fn table(&self) -> Option<&str> {
        self.table.as_deref()
    }

    /// The column name without its qualifier.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The same column rebound to a different qualifying alias.
    pub fn with_table(&self, table: impl Into<String>) -> Self {
        Self {
            table: Some(table.into()),
            name: self.name.clone(),
        }
    }

    /// Render the qualified selector.
    pub fn to_sql(&self) -> String {
        match &self.table {
            Some(table) => format!("{}.{}", table, self.name),
            None => self.name.clone(),
        }
    }

    /// Render an `IS NULL` predicate on this column.
    pub fn is_null(&self) -> String {
        format!("{} IS NULL", self.to_sql())
    }

    /// Render an `IS NOT NULL` predicate on this column.
    pub fn is_not_null(&self) -> String {
        format!("{} IS NOT NULL", self.to_sql())
    }
}

/// An equality comparison between two column references.
#[derive(Debug, Clone)]
pub struct Comparison {
    left: ColumnRef,
    right: ColumnRef,
}

impl Comparison {
    /// Equate two columns.
    pub fn eq(left: ColumnRef, right: ColumnRef) -> Self {
        Self { left, right }
    }

    /// Render the boolean fragment.
    pub fn to_sql(&self) -> String {
        format!("{} = {}", self.left.to_sql(), self.right.to_sql())
    }
}

/// A prepared join against a named target.
///
/// Consumed immediately by a builder's join mutation; not retained.
#[derive(Debug, Clone)]
pub struct JoinDescriptor {
    /// Alias of the FROM entry the join hangs off
    pub from_alias: String,
    /// Joined table or CTE name
    pub target: String,
    /// Alias the target is joined under
    pub alias: String,
    /// Boolean SQL fragment for the ON clause
    pub condition: String,
}

/// Build a join descriptor correlating `from_alias.column` with a CTE.
///
/// The right-hand column defaults to `column` when `right_column` is not
/// given.
pub fn join_onto_cte(
    cte_alias: &str,
    from_alias: &str,
    column: &str,
    right_column: Option<&str>,
) -> JoinDescriptor {
    let right = right_column.unwrap_or(column);
    let condition = Comparison::eq(
        ColumnRef::qualified(from_alias, column),
        ColumnRef::qualified(cte_alias, right),
    )
    .to_sql();

    JoinDescriptor {
        from_alias: from_alias.to_string(),
        target: cte_alias.to_string(),
        alias: cte_alias.to_string(),
        condition,
    }
}
