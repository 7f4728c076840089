//! Phase marker emission and ordering per logical query unit.

use quarry_core::ast::{
    self,
    Cte,
    FromItem,
    QueryBody,
    QueryExpr,
    SelectItem,
    SelectQuery,
    Setop,
    SetopKind,
};
use quarry_core::catalog::{ColumnSchema, MemoryProvider, MemorySource, SourceSchema};
use quarry_core::engine::Engine;
use quarry_core::observe::{QueryPhase, RecordingObserver, phases_well_ordered};
use quarry_core::scalars::datatype::DataType;
use quarry_core::scalars::row::Row;
use quarry_core::scalars::value::ScalarValue;

fn engine() -> Engine {
    let schema = SourceSchema::new(vec![ColumnSchema::new("id", DataType::Int32, false)]);
    let rows = vec![Row::new(vec![ScalarValue::Int32(1)])];
    let mut provider = MemoryProvider::new();
    provider.insert("t", MemorySource::new(schema, rows));
    Engine::try_new(provider).unwrap()
}

fn select_all_from_t() -> SelectQuery {
    SelectQuery {
        projections: vec![SelectItem::expr(ast::col("id"))],
        from: Some(FromItem::Source {
            name: "t".to_string(),
            alias: None,
        }),
        ..Default::default()
    }
}

#[test]
fn simple_select_marker_ordering() {
    let engine = engine();
    let mut observer = RecordingObserver::new();

    let query = QueryExpr::select(SelectQuery {
        filter: Some(ast::binary(
            ast::BinaryOperator::Gt,
            ast::col("id"),
            ast::lit(0_i32),
        )),
        group_by: vec![ast::col("id")],
        ..select_all_from_t()
    });

    engine
        .session()
        .compile_with_observer(&query, &mut observer)
        .unwrap();

    let units = observer.unit_ids();
    assert_eq!(1, units.len());
    let phases = observer.unit_phases(units[0]);
    assert_eq!(
        vec![
            QueryPhase::Begin,
            QueryPhase::From,
            QueryPhase::Where,
            QueryPhase::GroupBy,
            QueryPhase::Select,
            QueryPhase::End,
        ],
        phases
    );
    assert!(phases_well_ordered(&phases));
}

#[test]
fn each_cte_gets_its_own_unit() {
    let engine = engine();
    let mut observer = RecordingObserver::new();

    // with c as (select id from t) select id from c
    let query = QueryExpr {
        ctes: vec![Cte {
            name: "c".to_string(),
            query: QueryExpr::select(select_all_from_t()),
        }],
        body: QueryBody::Select(Box::new(SelectQuery {
            projections: vec![SelectItem::expr(ast::col("id"))],
            from: Some(FromItem::Source {
                name: "c".to_string(),
                alias: None,
            }),
            ..Default::default()
        })),
    };

    engine
        .session()
        .compile_with_observer(&query, &mut observer)
        .unwrap();

    let units = observer.unit_ids();
    assert_eq!(2, units.len(), "CTE body and outer query are separate units");
    for unit in units {
        let phases = observer.unit_phases(unit);
        assert!(phases_well_ordered(&phases), "unit {unit}: {phases:?}");
    }
}

#[test]
fn each_setop_branch_gets_its_own_unit() {
    let engine = engine();
    let mut observer = RecordingObserver::new();

    let query = QueryExpr {
        ctes: Vec::new(),
        body: QueryBody::Setop(Box::new(Setop {
            kind: SetopKind::Union,
            all: false,
            left: QueryBody::Select(Box::new(select_all_from_t())),
            right: QueryBody::Select(Box::new(select_all_from_t())),
        })),
    };

    engine
        .session()
        .compile_with_observer(&query, &mut observer)
        .unwrap();

    let units = observer.unit_ids();
    assert_eq!(2, units.len(), "each set-op branch is its own unit");
    for unit in units {
        let phases = observer.unit_phases(unit);
        assert!(phases_well_ordered(&phases), "unit {unit}: {phases:?}");
        // Branches without filters or grouping still begin, bind FROM,
        // bind the select list, and end.
        assert!(phases.contains(&QueryPhase::From));
        assert!(phases.contains(&QueryPhase::Select));
    }
}

#[test]
fn marker_stream_is_stable_across_compiles() {
    let engine = engine();
    let query = QueryExpr::select(select_all_from_t());

    let mut first = RecordingObserver::new();
    engine
        .session()
        .compile_with_observer(&query, &mut first)
        .unwrap();

    let mut second = RecordingObserver::new();
    engine
        .session()
        .compile_with_observer(&query, &mut second)
        .unwrap();

    assert_eq!(first.events, second.events);
}
