use quarry_error::{QuarryError, Result};

use super::OptimizerRule;
use crate::expr::Expression;
use crate::expr::column_expr::ColumnExpr;
use crate::logical::logical_aggregate::LogicalAggregate;
use crate::logical::operator::{LogicalOperator, Node};

/// Rewrites DISTINCT into GROUP BY over all projected expressions.
///
/// `SELECT DISTINCT a, b` becomes a grouped aggregate keyed by the projected
/// columns, by position, with no aggregate expressions. When an aggregation
/// already exists below the DISTINCT, the marker is dropped as a no-op
/// without adding keys.
#[derive(Debug)]
pub struct DistinctToGroupBy;

impl OptimizerRule for DistinctToGroupBy {
    fn name(&self) -> &'static str {
        "distinct_to_group_by"
    }

    fn optimize(&self, plan: LogicalOperator) -> Result<LogicalOperator> {
        plan.walk_mut(&mut |op| match op {
            LogicalOperator::Distinct(mut node) => {
                let child = node.take_one_child_exact()?;
                if has_aggregate_below(&child) {
                    // GROUP BY already exists; DISTINCT is a no-op.
                    return Ok(child);
                }
                rewrite_to_group_by(child)
            }
            other => Ok(other),
        })
    }
}

/// Whether the operator chain below a DISTINCT already aggregates.
///
/// Only looks through the operators a select plan can place between the
/// DISTINCT marker and its aggregate: projections and filters.
fn has_aggregate_below(op: &LogicalOperator) -> bool {
    match op {
        LogicalOperator::Aggregate(_) => true,
        LogicalOperator::Project(n) => n.children.first().is_some_and(has_aggregate_below),
        LogicalOperator::Filter(n) => n.children.first().is_some_and(has_aggregate_below),
        _ => false,
    }
}

fn rewrite_to_group_by(child: LogicalOperator) -> Result<LogicalOperator> {
    let project = match &child {
        LogicalOperator::Project(project) => project,
        other => {
            return Err(QuarryError::new(format!(
                "Cannot rewrite DISTINCT over a {} operator",
                other.name()
            )));
        }
    };

    // Group by every projected expression, by position. The aggregate reuses
    // the projection's table ref so operators above see unchanged columns.
    let table_ref = project.node.projection_table;
    let group_exprs = project
        .node
        .projections
        .iter()
        .enumerate()
        .map(|(column, expr)| {
            Ok(Expression::Column(ColumnExpr {
                table_ref,
                column,
                datatype: expr.datatype()?,
                nullable: expr.nullable(),
            }))
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(LogicalOperator::Aggregate(Node::new(
        LogicalAggregate {
            aggregates: Vec::new(),
            aggregates_table: None,
            group_exprs,
            group_table: Some(table_ref),
        },
        vec![child],
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::column;
    use crate::logical::binder::table_list::TableRef;
    use crate::logical::logical_distinct::LogicalDistinct;
    use crate::logical::logical_project::LogicalProject;
    use crate::logical::logical_single_row::LogicalSingleRow;
    use crate::scalars::datatype::DataType;

    fn project_node() -> LogicalOperator {
        LogicalOperator::Project(Node::new(
            LogicalProject {
                projections: vec![column((0, 0), DataType::Utf8).into()],
                projection_table: TableRef(1),
            },
            vec![LogicalOperator::SingleRow(Node::new(
                LogicalSingleRow,
                Vec::new(),
            ))],
        ))
    }

    #[test]
    fn distinct_becomes_group_by_projected_columns() {
        let plan = LogicalOperator::Distinct(Node::new(LogicalDistinct, vec![project_node()]));
        let got = DistinctToGroupBy.optimize(plan).unwrap();

        match got {
            LogicalOperator::Aggregate(node) => {
                assert!(node.node.aggregates.is_empty());
                assert_eq!(1, node.node.group_exprs.len());
                assert_eq!(Some(TableRef(1)), node.node.group_table);
                // Keys reference the projection output by position.
                match &node.node.group_exprs[0] {
                    Expression::Column(col) => {
                        assert_eq!(TableRef(1), col.table_ref);
                        assert_eq!(0, col.column);
                    }
                    other => panic!("unexpected group expr: {other}"),
                }
            }
            other => panic!("unexpected operator: {}", other.name()),
        }
    }

    #[test]
    fn distinct_over_existing_aggregate_dropped() {
        let aggregate = LogicalOperator::Aggregate(Node::new(
            LogicalAggregate {
                aggregates: Vec::new(),
                aggregates_table: None,
                group_exprs: vec![column((0, 0), DataType::Utf8).into()],
                group_table: Some(TableRef(2)),
            },
            vec![LogicalOperator::SingleRow(Node::new(
                LogicalSingleRow,
                Vec::new(),
            ))],
        ));
        let project = LogicalOperator::Project(Node::new(
            LogicalProject {
                projections: vec![column((2, 0), DataType::Utf8).into()],
                projection_table: TableRef(3),
            },
            vec![aggregate],
        ));
        let plan = LogicalOperator::Distinct(Node::new(LogicalDistinct, vec![project]));

        let got = DistinctToGroupBy.optimize(plan).unwrap();
        // Distinct dropped without adding keys; projection remains the root.
        match got {
            LogicalOperator::Project(node) => {
                assert!(matches!(node.children[0], LogicalOperator::Aggregate(_)));
            }
            other => panic!("unexpected operator: {}", other.name()),
        }
    }
}
