//! Integration tests for composite CTE queries
//!
//! Exercises assembly, parameter merging, and execution against a real
//! SQLite connection.

use std::sync::Arc;

use serde_json::json;
use stratum_query::{ColumnRef, CompositeQuery, ParamType, SelectBuilder};
use stratum_sqlite::SqlitePool;

/// Setup helper: in-memory pool with a small items table
fn setup_items_pool() -> SqlitePool {
    let pool = SqlitePool::memory().unwrap();
    pool.with_connection(|conn| {
        conn.execute_batch(
            r#"
            CREATE TABLE items (id INTEGER PRIMARY KEY);
            INSERT INTO items (id) VALUES (1), (2), (3);
            "#,
        )?;
        Ok(())
    })
    .unwrap();
    pool
}

fn composite(pool: &SqlitePool) -> CompositeQuery {
    CompositeQuery::new(Arc::new(pool.clone()))
}

/// Builder for an inline literal row set: SELECT 1 AS n UNION ALL SELECT 2 ...
fn literal_rows(column: &str, values: &[i64]) -> SelectBuilder {
    let mut builder = SelectBuilder::new();
    builder.select([format!("{} AS {}", values[0], column)]);
    for value in &values[1..] {
        let mut arm = SelectBuilder::new();
        arm.select([value.to_string()]);
        builder.union_all(arm);
    }
    builder
}

#[test]
fn test_plain_cte_over_literal_rows() {
    let pool = SqlitePool::memory().unwrap();
    let mut query = composite(&pool);

    query.add_cte("generator", literal_rows("n", &[1, 2, 3]));
    query
        .main_mut()
        .select(["n"])
        .from("generator")
        .order_by("n");

    let result = query.execute().unwrap();

    assert_eq!(result.columns, vec!["n"]);
    assert_eq!(
        result.rows,
        vec![vec![json!(1)], vec![json!(2)], vec![json!(3)]]
    );
}

#[test]
fn test_no_cte_executes_main_verbatim() {
    let pool = setup_items_pool();
    let mut query = composite(&pool);
    query.main_mut().select(["id"]).from("items").order_by("id");

    assert_eq!(query.to_sql(), "SELECT id FROM items ORDER BY id");

    let result = query.execute().unwrap();
    assert_eq!(result.len(), 3);
}

#[test]
fn test_recursive_cte_counts_to_five() {
    let pool = SqlitePool::memory().unwrap();
    let mut query = composite(&pool);

    let mut anchor = SelectBuilder::new();
    anchor.select(["1"]);
    let mut step = SelectBuilder::new();
    step.select(["n + 1"]).from("numbers").and_where("n < 5");
    query.add_recursive_cte_with_columns("numbers", ["n"], anchor, step);
    query.main_mut().select(["n"]).from("numbers").order_by("n");

    let result = query.execute().unwrap();

    let values: Vec<i64> = result
        .rows
        .iter()
        .filter_map(|row| row[0].as_i64())
        .collect();
    assert_eq!(values, vec![1, 2, 3, 4, 5]);
}

#[test]
fn test_lookup_join_splits_match_from_no_match() {
    let pool = setup_items_pool();

    // Lookup set {1, 2}: rows with a match in it.
    let mut matched_query = composite(&pool);
    matched_query
        .main_mut()
        .select(["items.id"])
        .from("items")
        .order_by("items.id");

    let mut lookup = SelectBuilder::new();
    lookup
        .select(["id"])
        .from("items")
        .and_where("id <= :max")
        .set_parameter("max", 2, ParamType::Integer);

    let matched_column = matched_query
        .join_matching_lookup_records("matched", lookup.clone(), &ColumnRef::qualified("items", "id"))
        .unwrap();
    matched_query.main_mut().and_where(matched_column.is_not_null());

    let matched = matched_query.execute().unwrap();
    let ids: Vec<i64> = matched.rows.iter().filter_map(|row| row[0].as_i64()).collect();
    assert_eq!(ids, vec![1, 2]);

    // Same lookup set, filtered on no-match.
    let mut unmatched_query = composite(&pool);
    unmatched_query
        .main_mut()
        .select(["items.id"])
        .from("items")
        .order_by("items.id");

    let unmatched_column = unmatched_query
        .join_matching_lookup_records("matched", lookup, &ColumnRef::qualified("items", "id"))
        .unwrap();
    unmatched_query.main_mut().and_where(unmatched_column.is_null());

    let unmatched = unmatched_query.execute().unwrap();
    let ids: Vec<i64> = unmatched
        .rows
        .iter()
        .filter_map(|row| row[0].as_i64())
        .collect();
    assert_eq!(ids, vec![3]);
}

#[test]
fn test_plain_and_recursive_combine() {
    let pool = SqlitePool::memory().unwrap();
    let mut query = composite(&pool);

    query.add_cte("thresholds", literal_rows("cutoff", &[3]));

    let mut anchor = SelectBuilder::new();
    anchor.select(["1"]);
    let mut step = SelectBuilder::new();
    step.select(["n + 1"]).from("numbers").and_where("n < 5");
    query.add_recursive_cte_with_columns("numbers", ["n"], anchor, step);

    query
        .main_mut()
        .select(["n"])
        .from("numbers")
        .from("thresholds")
        .and_where("n <= cutoff")
        .order_by("n");

    let sql = query.to_sql();
    assert!(sql.starts_with("WITH RECURSIVE thresholds AS ("));
    assert_eq!(sql.matches("RECURSIVE").count(), 1);

    let result = query.execute().unwrap();
    let values: Vec<i64> = result
        .rows
        .iter()
        .filter_map(|row| row[0].as_i64())
        .collect();
    assert_eq!(values, vec![1, 2, 3]);
}

#[test]
fn test_cte_and_main_parameters_reach_backend() {
    let pool = setup_items_pool();
    let mut query = composite(&pool);

    let mut lookup = SelectBuilder::new();
    lookup
        .select(["id"])
        .from("items")
        .and_where("id >= :low")
        .set_parameter("low", 2, ParamType::Integer);
    query.add_cte("filtered", lookup);

    query
        .main_mut()
        .select(["id"])
        .from("filtered")
        .and_where("id <= :high")
        .set_parameter("high", 2, ParamType::Integer)
        .order_by("id");

    let result = query.execute().unwrap();
    assert_eq!(result.rows, vec![vec![json!(2)]]);
}

// Parameters bound on a recursive arm never reach the backend; SQLite then
// evaluates the unbound :depth as NULL and the recursion stops after the
// anchor row. Binding the same name on the main query is the way through.
#[test]
fn test_recursive_arm_parameters_stay_behind() {
    let pool = SqlitePool::memory().unwrap();
    let mut query = composite(&pool);

    let mut anchor = SelectBuilder::new();
    anchor.select(["1"]);
    let mut step = SelectBuilder::new();
    step.select(["n + 1"])
        .from("numbers")
        .and_where("n < :depth")
        .set_parameter("depth", 5, ParamType::Integer);
    query.add_recursive_cte_with_columns("numbers", ["n"], anchor, step);
    query.main_mut().select(["n"]).from("numbers").order_by("n");

    let result = query.execute().unwrap();
    assert_eq!(result.rows, vec![vec![json!(1)]]);

    // Re-binding on the main query reaches the backend and the series runs.
    let mut bounded = query.map(|mut main| {
        main.set_parameter("depth", 5, ParamType::Integer);
        main
    });
    let result = bounded.execute().unwrap();
    assert_eq!(result.len(), 5);

    // The derived engine is independent of the original.
    bounded.main_mut().and_where("n > 1");
    assert_eq!(query.execute().unwrap().len(), 1);
}

#[test]
fn test_move_main_to_cte_round_trip() {
    let pool = setup_items_pool();
    let mut query = composite(&pool);
    query.main_mut().select(["id"]).from("items").and_where("id > 1");

    let mut wrapped = query.move_main_to_cte("inner_rows");
    wrapped
        .main_mut()
        .select(["COUNT(*) AS cnt"])
        .from("inner_rows");

    assert_eq!(
        wrapped.to_sql(),
        "WITH inner_rows AS (SELECT id FROM items WHERE id > 1) \
         SELECT COUNT(*) AS cnt FROM inner_rows"
    );
    assert_eq!(wrapped.execute().unwrap().rows, vec![vec![json!(2)]]);

    // The original engine still runs its own statement.
    assert_eq!(query.execute().unwrap().len(), 2);
}

#[test]
fn test_backend_rejects_unknown_table() {
    let pool = SqlitePool::memory().unwrap();
    let mut query = composite(&pool);
    query.main_mut().select(["*"]).from("nowhere");

    assert!(matches!(
        query.execute(),
        Err(stratum_query::QueryError::Backend(_))
    ));
}
