//! Non-deterministic functions and expression caching semantics.

use quarry_core::ast::{self, FromItem, QueryExpr, SelectItem, SelectQuery};
use quarry_core::catalog::{ColumnSchema, MemoryProvider, MemorySource, SourceSchema};
use quarry_core::engine::Engine;
use quarry_core::scalars::datatype::DataType;
use quarry_core::scalars::row::Row;
use quarry_core::scalars::value::ScalarValue;

fn words_engine(rows: usize) -> Engine {
    let schema = SourceSchema::new(vec![ColumnSchema::new("word", DataType::Utf8, false)]);
    let rows = (0..rows)
        .map(|i| Row::new(vec![ScalarValue::Utf8(format!("word{i}"))]))
        .collect();
    let mut provider = MemoryProvider::new();
    provider.insert("words", MemorySource::new(schema, rows));
    Engine::try_new(provider).unwrap()
}

fn from_words() -> Option<FromItem> {
    Some(FromItem::Source {
        name: "words".to_string(),
        alias: None,
    })
}

#[test]
fn deterministic_call_repeated_yields_identical_values_per_row() {
    let engine = words_engine(8);

    // select upper(word), upper(word) from words
    let query = QueryExpr::select(SelectQuery {
        projections: vec![
            SelectItem::expr(ast::call("upper", vec![ast::col("word")])),
            SelectItem::expr(ast::call("upper", vec![ast::col("word")])),
        ],
        from: from_words(),
        ..Default::default()
    });

    let rows = engine.session().execute(&query).unwrap().collect().unwrap();
    assert_eq!(8, rows.len());
    for row in rows {
        assert_eq!(row.values[0], row.values[1]);
    }
}

#[test]
fn volatile_call_repeated_may_differ_per_row() {
    let engine = words_engine(32);

    // select random(), random() from words. The two columns must not be
    // collapsed into one cached evaluation; over 32 rows of 63-bit values,
    // identical columns throughout would mean caching.
    let query = QueryExpr::select(SelectQuery {
        projections: vec![
            SelectItem::expr(ast::call("random", vec![])),
            SelectItem::expr(ast::call("random", vec![])),
        ],
        from: from_words(),
        ..Default::default()
    });

    let rows = engine.session().execute(&query).unwrap().collect().unwrap();
    assert_eq!(32, rows.len());
    let any_differs = rows.iter().any(|row| row.values[0] != row.values[1]);
    assert!(
        any_differs,
        "volatile function results identical across all rows; results were cached"
    );
}

#[test]
fn volatile_argument_does_not_poison_unrelated_expressions() {
    let engine = words_engine(4);

    // A volatile call beside a deterministic pair: the deterministic pair
    // still agrees per row.
    let query = QueryExpr::select(SelectQuery {
        projections: vec![
            SelectItem::expr(ast::call("length", vec![ast::col("word")])),
            SelectItem::expr(ast::call("length", vec![ast::col("word")])),
            SelectItem::expr(ast::call("random", vec![])),
        ],
        from: from_words(),
        ..Default::default()
    });

    let rows = engine.session().execute(&query).unwrap().collect().unwrap();
    for row in rows {
        assert_eq!(row.values[0], row.values[1]);
    }
}
