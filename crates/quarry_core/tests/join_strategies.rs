//! Join execution semantics across the three physical strategies.

use std::collections::HashSet;

use quarry_core::ast::{
    self,
    BinaryOperator,
    FromItem,
    JoinHint,
    JoinItem,
    JoinKind,
    QueryExpr,
    SelectItem,
    SelectQuery,
};
use quarry_core::catalog::{ColumnSchema, MemoryProvider, MemorySource, SourceSchema};
use quarry_core::engine::Engine;
use quarry_core::scalars::datatype::DataType;
use quarry_core::scalars::row::Row;
use quarry_core::scalars::value::ScalarValue;

fn int_source(rows: &[i32]) -> MemorySource {
    MemorySource::new(
        SourceSchema::new(vec![ColumnSchema::new("id", DataType::Int32, true)]),
        rows.iter()
            .map(|v| Row::new(vec![ScalarValue::Int32(*v)]))
            .collect(),
    )
}

fn engine_with_ab(a: MemorySource, b: MemorySource) -> Engine {
    let mut provider = MemoryProvider::new();
    provider.insert("a", a);
    provider.insert("b", b);
    Engine::try_new(provider).unwrap()
}

fn join_query(kind: JoinKind, hint: JoinHint, condition: ast::AstExpr) -> QueryExpr {
    QueryExpr::select(SelectQuery {
        projections: vec![
            SelectItem::expr(ast::qualified("a", "id")),
            SelectItem::expr(ast::qualified("b", "id")),
        ],
        from: Some(FromItem::Join(Box::new(JoinItem {
            left: FromItem::Source {
                name: "a".to_string(),
                alias: None,
            },
            right: FromItem::Source {
                name: "b".to_string(),
                alias: None,
            },
            kind,
            condition: Some(condition),
            hint,
        }))),
        ..Default::default()
    })
}

fn row_set(rows: Vec<Row>) -> HashSet<Vec<ScalarValue>> {
    rows.into_iter().map(|r| r.values).collect()
}

/// a.id = b.id + 1
fn offset_condition() -> ast::AstExpr {
    ast::binary(
        BinaryOperator::Eq,
        ast::qualified("a", "id"),
        ast::binary(
            BinaryOperator::Plus,
            ast::qualified("b", "id"),
            ast::lit(1_i32),
        ),
    )
}

#[test]
fn strategy_independence_on_expression_key() {
    let expected: HashSet<_> = [(1, 0), (2, 1), (3, 2)]
        .into_iter()
        .map(|(a, b)| vec![ScalarValue::Int32(a), ScalarValue::Int32(b)])
        .collect();

    for hint in [JoinHint::Hash, JoinHint::Merge, JoinHint::Loop, JoinHint::Auto] {
        let engine = engine_with_ab(int_source(&[1, 2, 3]), int_source(&[0, 1, 2]));
        let query = join_query(JoinKind::Inner, hint, offset_condition());
        let rows = engine.session().execute(&query).unwrap().collect().unwrap();
        assert_eq!(
            expected,
            row_set(rows),
            "strategy hint {hint:?} produced a different row set"
        );
    }
}

#[test]
fn null_keys_never_equi_match() {
    let schema = SourceSchema::new(vec![ColumnSchema::new("city", DataType::Utf8, true)]);
    let null_row = || Row::new(vec![ScalarValue::Null]);

    for hint in [JoinHint::Hash, JoinHint::Merge, JoinHint::Loop] {
        let mut provider = MemoryProvider::new();
        provider.insert("a", MemorySource::new(schema.clone(), vec![null_row()]));
        provider.insert("b", MemorySource::new(schema.clone(), vec![null_row()]));
        let engine = Engine::try_new(provider).unwrap();

        let query = QueryExpr::select(SelectQuery {
            projections: vec![SelectItem::expr(ast::qualified("a", "city"))],
            from: Some(FromItem::Join(Box::new(JoinItem {
                left: FromItem::Source {
                    name: "a".to_string(),
                    alias: None,
                },
                right: FromItem::Source {
                    name: "b".to_string(),
                    alias: None,
                },
                kind: JoinKind::Inner,
                condition: Some(ast::binary(
                    BinaryOperator::Eq,
                    ast::qualified("a", "city"),
                    ast::qualified("b", "city"),
                )),
                hint,
            }))),
            ..Default::default()
        });

        let rows = engine.session().execute(&query).unwrap().collect().unwrap();
        assert!(
            rows.is_empty(),
            "null keys matched under {hint:?}: {rows:?}"
        );
    }
}

#[test]
fn left_outer_preserves_every_left_row_exactly_once() {
    for hint in [JoinHint::Hash, JoinHint::Merge, JoinHint::Loop] {
        let engine = engine_with_ab(int_source(&[1, 2, 3]), int_source(&[2]));
        let query = join_query(
            JoinKind::Left,
            hint,
            ast::binary(
                BinaryOperator::Eq,
                ast::qualified("a", "id"),
                ast::qualified("b", "id"),
            ),
        );
        let rows = engine.session().execute(&query).unwrap().collect().unwrap();

        let expected: HashSet<_> = [
            vec![ScalarValue::Int32(1), ScalarValue::Null],
            vec![ScalarValue::Int32(2), ScalarValue::Int32(2)],
            vec![ScalarValue::Int32(3), ScalarValue::Null],
        ]
        .into_iter()
        .collect();

        assert_eq!(3, rows.len(), "left rows duplicated or lost under {hint:?}");
        assert_eq!(expected, row_set(rows));
    }
}

#[test]
fn right_outer_mirrors_left_outer() {
    for hint in [JoinHint::Hash, JoinHint::Merge, JoinHint::Loop] {
        let engine = engine_with_ab(int_source(&[2]), int_source(&[1, 2]));
        let query = join_query(
            JoinKind::Right,
            hint,
            ast::binary(
                BinaryOperator::Eq,
                ast::qualified("a", "id"),
                ast::qualified("b", "id"),
            ),
        );
        let rows = engine.session().execute(&query).unwrap().collect().unwrap();

        let expected: HashSet<_> = [
            vec![ScalarValue::Null, ScalarValue::Int32(1)],
            vec![ScalarValue::Int32(2), ScalarValue::Int32(2)],
        ]
        .into_iter()
        .collect();

        assert_eq!(expected, row_set(rows));
    }
}

#[test]
fn key_match_with_failed_residual_still_pads_preserved_row() {
    // a.id = b.id AND a.id > 10: every key match fails the residual, so
    // every left row emits exactly once with null right slots.
    let residual_condition = ast::binary(
        BinaryOperator::And,
        ast::binary(
            BinaryOperator::Eq,
            ast::qualified("a", "id"),
            ast::qualified("b", "id"),
        ),
        ast::binary(
            BinaryOperator::Gt,
            ast::qualified("a", "id"),
            ast::lit(10_i32),
        ),
    );

    for hint in [JoinHint::Hash, JoinHint::Merge, JoinHint::Loop] {
        let engine = engine_with_ab(int_source(&[1, 2]), int_source(&[1, 2]));
        let query = join_query(JoinKind::Left, hint, residual_condition.clone());
        let rows = engine.session().execute(&query).unwrap().collect().unwrap();

        let expected: HashSet<_> = [
            vec![ScalarValue::Int32(1), ScalarValue::Null],
            vec![ScalarValue::Int32(2), ScalarValue::Null],
        ]
        .into_iter()
        .collect();

        assert_eq!(2, rows.len());
        assert_eq!(expected, row_set(rows));
    }
}

#[test]
fn inequality_only_condition_works_without_equi_keys() {
    // a.id > b.id has no equality conjunct: forces sort-merge or nested
    // loop, never hash.
    let condition = ast::binary(
        BinaryOperator::Gt,
        ast::qualified("a", "id"),
        ast::qualified("b", "id"),
    );

    let expected: HashSet<_> = [(2, 1), (3, 1), (3, 2)]
        .into_iter()
        .map(|(a, b)| vec![ScalarValue::Int32(a), ScalarValue::Int32(b)])
        .collect();

    for hint in [JoinHint::Auto, JoinHint::Merge, JoinHint::Loop] {
        let engine = engine_with_ab(int_source(&[1, 2, 3]), int_source(&[1, 2, 3]));
        let query = join_query(JoinKind::Inner, hint, condition.clone());
        let rows = engine.session().execute(&query).unwrap().collect().unwrap();
        assert_eq!(expected, row_set(rows), "hint {hint:?}");
    }
}

#[test]
fn string_column_compared_against_typed_key_parses_leniently() {
    // Side 'a' carries string-encoded dates of unknown prior type; 'b' is
    // typed. Unparsable strings are non-matches, not errors.
    let mut provider = MemoryProvider::new();
    provider.insert(
        "a",
        MemorySource::new(
            SourceSchema::new(vec![ColumnSchema::new("day", DataType::Utf8, true)]),
            vec![
                Row::new(vec![ScalarValue::Utf8("1992-10-11".to_string())]),
                Row::new(vec![ScalarValue::Utf8("not a date".to_string())]),
            ],
        ),
    );
    provider.insert(
        "b",
        MemorySource::new(
            SourceSchema::new(vec![ColumnSchema::new("day", DataType::Date32, true)]),
            vec![Row::new(vec![ScalarValue::Date32(8319)])],
        ),
    );
    let engine = Engine::try_new(provider).unwrap();

    let query = QueryExpr::select(SelectQuery {
        projections: vec![SelectItem::expr(ast::qualified("b", "day"))],
        from: Some(FromItem::Join(Box::new(JoinItem {
            left: FromItem::Source {
                name: "a".to_string(),
                alias: None,
            },
            right: FromItem::Source {
                name: "b".to_string(),
                alias: None,
            },
            kind: JoinKind::Inner,
            condition: Some(ast::binary(
                BinaryOperator::Eq,
                ast::qualified("a", "day"),
                ast::qualified("b", "day"),
            )),
            hint: JoinHint::Auto,
        }))),
        ..Default::default()
    });

    let rows = engine.session().execute(&query).unwrap().collect().unwrap();
    assert_eq!(vec![Row::new(vec![ScalarValue::Date32(8319)])], rows);
}

#[test]
fn absent_source_rows_normalize_to_empty() {
    let schema = SourceSchema::new(vec![ColumnSchema::new("id", DataType::Int32, true)]);
    let mut provider = MemoryProvider::new();
    provider.insert("a", int_source(&[1]));
    provider.insert("b", MemorySource::absent(schema));
    let engine = Engine::try_new(provider).unwrap();

    let query = join_query(
        JoinKind::Left,
        JoinHint::Auto,
        ast::binary(
            BinaryOperator::Eq,
            ast::qualified("a", "id"),
            ast::qualified("b", "id"),
        ),
    );
    let rows = engine.session().execute(&query).unwrap().collect().unwrap();
    assert_eq!(
        vec![Row::new(vec![ScalarValue::Int32(1), ScalarValue::Null])],
        rows
    );
}

#[test]
fn cancellation_aborts_between_phases() {
    let engine = engine_with_ab(int_source(&[1, 2, 3]), int_source(&[1, 2, 3]));
    let query = join_query(
        JoinKind::Inner,
        JoinHint::Hash,
        ast::binary(
            BinaryOperator::Eq,
            ast::qualified("a", "id"),
            ast::qualified("b", "id"),
        ),
    );

    let compiled = engine.session().compile(&query).unwrap();
    compiled.handle().cancel();
    let err = match compiled.execute() {
        Err(err) => err,
        Ok(result) => result.collect().expect_err("expected cancellation"),
    };
    assert!(err.to_string().contains("canceled"), "got: {err}");
}
