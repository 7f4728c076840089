//! DISTINCT rewriting and aggregate execution.

use std::collections::HashSet;

use quarry_core::ast::{self, FromItem, QueryExpr, SelectItem, SelectQuery};
use quarry_core::catalog::{ColumnSchema, MemoryProvider, MemorySource, SourceSchema};
use quarry_core::engine::Engine;
use quarry_core::scalars::datatype::DataType;
use quarry_core::scalars::row::Row;
use quarry_core::scalars::value::ScalarValue;

fn people_engine() -> Engine {
    let schema = SourceSchema::new(vec![
        ColumnSchema::new("name", DataType::Utf8, false),
        ColumnSchema::new("age", DataType::Int64, true),
    ]);
    let rows = vec![
        Row::new(vec![ScalarValue::Utf8("ada".into()), ScalarValue::Int64(30)]),
        Row::new(vec![ScalarValue::Utf8("bob".into()), ScalarValue::Int64(20)]),
        Row::new(vec![ScalarValue::Utf8("ada".into()), ScalarValue::Int64(40)]),
        Row::new(vec![ScalarValue::Utf8("bob".into()), ScalarValue::Null]),
    ];
    let mut provider = MemoryProvider::new();
    provider.insert("people", MemorySource::new(schema, rows));
    Engine::try_new(provider).unwrap()
}

fn from_people() -> Option<FromItem> {
    Some(FromItem::Source {
        name: "people".to_string(),
        alias: None,
    })
}

fn row_set(rows: Vec<Row>) -> HashSet<Vec<ScalarValue>> {
    rows.into_iter().map(|r| r.values).collect()
}

#[test]
fn distinct_equals_group_by_on_projected_columns() {
    let engine = people_engine();

    let distinct = QueryExpr::select(SelectQuery {
        distinct: true,
        projections: vec![SelectItem::expr(ast::col("name"))],
        from: from_people(),
        ..Default::default()
    });

    let grouped = QueryExpr::select(SelectQuery {
        projections: vec![SelectItem::expr(ast::col("name"))],
        from: from_people(),
        group_by: vec![ast::col("name")],
        ..Default::default()
    });

    let distinct_rows = engine.session().execute(&distinct).unwrap().collect().unwrap();
    let grouped_rows = engine.session().execute(&grouped).unwrap().collect().unwrap();

    assert_eq!(2, distinct_rows.len());
    assert_eq!(row_set(grouped_rows), row_set(distinct_rows));
}

#[test]
fn distinct_over_group_by_is_noop() {
    let engine = people_engine();

    let query = QueryExpr::select(SelectQuery {
        distinct: true,
        projections: vec![SelectItem::expr(ast::col("name"))],
        from: from_people(),
        group_by: vec![ast::col("name")],
        ..Default::default()
    });

    let rows = engine.session().execute(&query).unwrap().collect().unwrap();
    assert_eq!(2, rows.len());
}

#[test]
fn grouped_aggregates() {
    let engine = people_engine();

    // select name, count(age), sum(age) from people group by name
    let query = QueryExpr::select(SelectQuery {
        projections: vec![
            SelectItem::expr(ast::col("name")),
            SelectItem::expr(ast::call("count", vec![ast::col("age")])),
            SelectItem::expr(ast::call("sum", vec![ast::col("age")])),
        ],
        from: from_people(),
        group_by: vec![ast::col("name")],
        ..Default::default()
    });

    let rows = engine.session().execute(&query).unwrap().collect().unwrap();
    let expected: HashSet<_> = [
        vec![
            ScalarValue::Utf8("ada".into()),
            ScalarValue::Int64(2),
            ScalarValue::Int64(70),
        ],
        vec![
            ScalarValue::Utf8("bob".into()),
            ScalarValue::Int64(1),
            ScalarValue::Int64(20),
        ],
    ]
    .into_iter()
    .collect();
    assert_eq!(expected, row_set(rows));
}

#[test]
fn global_aggregate_emits_one_row_on_empty_input() {
    let mut provider = MemoryProvider::new();
    provider.insert(
        "empty",
        MemorySource::new(
            SourceSchema::new(vec![ColumnSchema::new("v", DataType::Int64, true)]),
            Vec::new(),
        ),
    );
    let engine = Engine::try_new(provider).unwrap();

    let query = QueryExpr::select(SelectQuery {
        projections: vec![SelectItem::expr(ast::call("count", vec![ast::AstExpr::Wildcard]))],
        from: Some(FromItem::Source {
            name: "empty".to_string(),
            alias: None,
        }),
        ..Default::default()
    });

    let rows = engine.session().execute(&query).unwrap().collect().unwrap();
    assert_eq!(vec![Row::new(vec![ScalarValue::Int64(0)])], rows);
}

#[test]
fn having_filters_groups() {
    let engine = people_engine();

    // select name from people group by name having count(*) > 1
    let query = QueryExpr::select(SelectQuery {
        projections: vec![SelectItem::expr(ast::col("name"))],
        from: from_people(),
        group_by: vec![ast::col("name")],
        having: Some(ast::binary(
            ast::BinaryOperator::Gt,
            ast::call("count", vec![ast::AstExpr::Wildcard]),
            ast::lit(1_i64),
        )),
        ..Default::default()
    });

    let rows = engine.session().execute(&query).unwrap().collect().unwrap();
    assert_eq!(2, rows.len());
}

#[test]
fn ungrouped_column_in_aggregated_select_errors() {
    let engine = people_engine();

    let query = QueryExpr::select(SelectQuery {
        projections: vec![
            SelectItem::expr(ast::col("age")),
            SelectItem::expr(ast::call("count", vec![ast::AstExpr::Wildcard])),
        ],
        from: from_people(),
        group_by: vec![ast::col("name")],
        ..Default::default()
    });

    let err = engine.session().compile(&query).unwrap_err();
    assert!(err.to_string().contains("GROUP BY"), "got: {err}");
}
