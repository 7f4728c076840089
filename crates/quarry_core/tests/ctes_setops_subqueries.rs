//! CTE materialization, set operations, and scalar subqueries.

use std::collections::HashSet;

use quarry_core::ast::{
    self,
    Cte,
    FromItem,
    JoinHint,
    JoinItem,
    JoinKind,
    QueryBody,
    QueryExpr,
    SelectItem,
    SelectQuery,
    Setop,
    SetopKind,
};
use quarry_core::catalog::{ColumnSchema, MemoryProvider, MemorySource, SourceSchema};
use quarry_core::engine::Engine;
use quarry_core::scalars::datatype::DataType;
use quarry_core::scalars::row::Row;
use quarry_core::scalars::value::ScalarValue;

fn engine() -> Engine {
    let schema = SourceSchema::new(vec![
        ColumnSchema::new("id", DataType::Int32, false),
        ColumnSchema::new("name", DataType::Utf8, false),
    ]);
    let rows = vec![
        Row::new(vec![ScalarValue::Int32(1), ScalarValue::Utf8("ada".into())]),
        Row::new(vec![ScalarValue::Int32(2), ScalarValue::Utf8("bob".into())]),
        Row::new(vec![ScalarValue::Int32(3), ScalarValue::Utf8("cid".into())]),
    ];
    let mut provider = MemoryProvider::new();
    provider.insert("t", MemorySource::new(schema, rows));
    Engine::try_new(provider).unwrap()
}

fn select_ids() -> SelectQuery {
    SelectQuery {
        projections: vec![SelectItem::expr(ast::col("id"))],
        from: Some(FromItem::Source {
            name: "t".to_string(),
            alias: None,
        }),
        ..Default::default()
    }
}

fn row_set(rows: Vec<Row>) -> HashSet<Vec<ScalarValue>> {
    rows.into_iter().map(|r| r.values).collect()
}

#[test]
fn cte_joined_with_itself() {
    // with c as (select id, name from t)
    // select x.name, y.name from c x inner join c y on x.id = y.id
    let cte_body = QueryExpr::select(SelectQuery {
        projections: vec![
            SelectItem::expr(ast::col("id")),
            SelectItem::expr(ast::col("name")),
        ],
        from: Some(FromItem::Source {
            name: "t".to_string(),
            alias: None,
        }),
        ..Default::default()
    });

    let query = QueryExpr {
        ctes: vec![Cte {
            name: "c".to_string(),
            query: cte_body,
        }],
        body: QueryBody::Select(Box::new(SelectQuery {
            projections: vec![
                SelectItem::expr(ast::qualified("x", "name")),
                SelectItem::expr(ast::qualified("y", "name")),
            ],
            from: Some(FromItem::Join(Box::new(JoinItem {
                left: FromItem::Source {
                    name: "c".to_string(),
                    alias: Some("x".to_string()),
                },
                right: FromItem::Source {
                    name: "c".to_string(),
                    alias: Some("y".to_string()),
                },
                kind: JoinKind::Inner,
                condition: Some(ast::binary(
                    ast::BinaryOperator::Eq,
                    ast::qualified("x", "id"),
                    ast::qualified("y", "id"),
                )),
                hint: JoinHint::Auto,
            }))),
            ..Default::default()
        })),
    };

    let rows = engine().session().execute(&query).unwrap().collect().unwrap();
    assert_eq!(3, rows.len());
    for row in rows {
        assert_eq!(row.values[0], row.values[1]);
    }
}

#[test]
fn union_distinct_deduplicates() {
    let query = QueryExpr {
        ctes: Vec::new(),
        body: QueryBody::Setop(Box::new(Setop {
            kind: SetopKind::Union,
            all: false,
            left: QueryBody::Select(Box::new(select_ids())),
            right: QueryBody::Select(Box::new(select_ids())),
        })),
    };

    let rows = engine().session().execute(&query).unwrap().collect().unwrap();
    assert_eq!(3, rows.len());
}

#[test]
fn union_all_keeps_duplicates() {
    let query = QueryExpr {
        ctes: Vec::new(),
        body: QueryBody::Setop(Box::new(Setop {
            kind: SetopKind::Union,
            all: true,
            left: QueryBody::Select(Box::new(select_ids())),
            right: QueryBody::Select(Box::new(select_ids())),
        })),
    };

    let rows = engine().session().execute(&query).unwrap().collect().unwrap();
    assert_eq!(6, rows.len());
}

#[test]
fn union_reconciles_branch_types() {
    // Left branch projects Int32 ids, right branch an Int64 literal; output
    // becomes Int64 for all rows.
    let right = SelectQuery {
        projections: vec![SelectItem::expr(ast::lit(99_i64))],
        from: None,
        ..Default::default()
    };

    let query = QueryExpr {
        ctes: Vec::new(),
        body: QueryBody::Setop(Box::new(Setop {
            kind: SetopKind::Union,
            all: true,
            left: QueryBody::Select(Box::new(select_ids())),
            right: QueryBody::Select(Box::new(right)),
        })),
    };

    let rows = engine().session().execute(&query).unwrap().collect().unwrap();
    let expected: HashSet<_> = [1_i64, 2, 3, 99]
        .into_iter()
        .map(|v| vec![ScalarValue::Int64(v)])
        .collect();
    assert_eq!(expected, row_set(rows));
}

#[test]
fn uncorrelated_scalar_subquery_in_filter() {
    // select name from t where id = (select max(id) from t)
    let subquery = QueryExpr::select(SelectQuery {
        projections: vec![SelectItem::expr(ast::call("max", vec![ast::col("id")]))],
        from: Some(FromItem::Source {
            name: "t".to_string(),
            alias: None,
        }),
        ..Default::default()
    });

    let query = QueryExpr::select(SelectQuery {
        projections: vec![SelectItem::expr(ast::col("name"))],
        from: Some(FromItem::Source {
            name: "t".to_string(),
            alias: None,
        }),
        filter: Some(ast::binary(
            ast::BinaryOperator::Eq,
            ast::col("id"),
            ast::AstExpr::Subquery(Box::new(subquery)),
        )),
        ..Default::default()
    });

    let rows = engine().session().execute(&query).unwrap().collect().unwrap();
    assert_eq!(vec![Row::new(vec![ScalarValue::Utf8("cid".into())])], rows);
}

#[test]
fn correlated_subquery_is_rejected() {
    // select name from t x where 1 = (select id from t where id = x.id)
    let subquery = QueryExpr::select(SelectQuery {
        projections: vec![SelectItem::expr(ast::col("id"))],
        from: Some(FromItem::Source {
            name: "t".to_string(),
            alias: None,
        }),
        filter: Some(ast::binary(
            ast::BinaryOperator::Eq,
            ast::col("id"),
            ast::qualified("x", "id"),
        )),
        ..Default::default()
    });

    let query = QueryExpr::select(SelectQuery {
        projections: vec![SelectItem::expr(ast::col("name"))],
        from: Some(FromItem::Source {
            name: "t".to_string(),
            alias: Some("x".to_string()),
        }),
        filter: Some(ast::binary(
            ast::BinaryOperator::Eq,
            ast::lit(1_i32),
            ast::AstExpr::Subquery(Box::new(subquery)),
        )),
        ..Default::default()
    });

    let err = engine().session().compile(&query).unwrap_err();
    assert!(err.to_string().contains("Not implemented"), "got: {err}");
}

#[test]
fn order_by_with_limit() {
    let query = QueryExpr::select(SelectQuery {
        projections: vec![SelectItem::expr(ast::col("name"))],
        from: Some(FromItem::Source {
            name: "t".to_string(),
            alias: None,
        }),
        order_by: vec![ast::OrderByItem {
            expr: ast::col("id"),
            desc: true,
        }],
        limit: Some(2),
        ..Default::default()
    });

    let rows = engine().session().execute(&query).unwrap().collect().unwrap();
    assert_eq!(
        vec![
            Row::new(vec![ScalarValue::Utf8("cid".into())]),
            Row::new(vec![ScalarValue::Utf8("bob".into())]),
        ],
        rows
    );
}

#[test]
fn cross_width_join_keys_coerce() {
    // u8 keys on one side, i64 on the other; widening makes 3u8 == 3i64.
    let mut provider = MemoryProvider::new();
    provider.insert(
        "small",
        MemorySource::new(
            SourceSchema::new(vec![ColumnSchema::new("k", DataType::UInt8, false)]),
            vec![
                Row::new(vec![ScalarValue::UInt8(3)]),
                Row::new(vec![ScalarValue::UInt8(7)]),
            ],
        ),
    );
    provider.insert(
        "wide",
        MemorySource::new(
            SourceSchema::new(vec![ColumnSchema::new("k", DataType::Int64, false)]),
            vec![Row::new(vec![ScalarValue::Int64(3)])],
        ),
    );
    let engine = Engine::try_new(provider).unwrap();

    let query = QueryExpr::select(SelectQuery {
        projections: vec![SelectItem::expr(ast::qualified("small", "k"))],
        from: Some(FromItem::Join(Box::new(JoinItem {
            left: FromItem::Source {
                name: "small".to_string(),
                alias: None,
            },
            right: FromItem::Source {
                name: "wide".to_string(),
                alias: None,
            },
            kind: JoinKind::Inner,
            condition: Some(ast::binary(
                ast::BinaryOperator::Eq,
                ast::qualified("small", "k"),
                ast::qualified("wide", "k"),
            )),
            hint: JoinHint::Auto,
        }))),
        ..Default::default()
    });

    let rows = engine.session().execute(&query).unwrap().collect().unwrap();
    assert_eq!(vec![Row::new(vec![ScalarValue::UInt8(3)])], rows);
}
