use std::collections::HashSet;

use quarry_error::{QuarryError, Result};

use super::condition_extract::{ExtractedConditions, JoinConditionExtractor};
use crate::ast::JoinKind;
use crate::logical::binder::bind_context::BindContext;
use crate::logical::binder::bind_from::{BoundFrom, BoundJoin};
use crate::logical::binder::bind_query::BoundQuery;
use crate::logical::binder::bind_select::BoundSelect;
use crate::logical::logical_aggregate::LogicalAggregate;
use crate::logical::logical_distinct::LogicalDistinct;
use crate::logical::logical_filter::LogicalFilter;
use crate::logical::logical_join::{
    JoinType,
    LogicalArbitraryJoin,
    LogicalComparisonJoin,
    LogicalCrossJoin,
};
use crate::logical::logical_limit::LogicalLimit;
use crate::logical::logical_materialization::LogicalMaterializationScan;
use crate::logical::logical_order::LogicalOrder;
use crate::logical::logical_project::LogicalProject;
use crate::logical::logical_scan::LogicalScan;
use crate::logical::logical_setop::LogicalSetop;
use crate::logical::logical_single_row::LogicalSingleRow;
use crate::logical::operator::{LogicalOperator, Node};
use crate::logical::statistics::StatisticsValue;

/// Assembles bound queries into logical operator trees.
#[derive(Debug)]
pub struct QueryPlanner;

impl QueryPlanner {
    /// Plan the root query plus every bound materialization and subquery in
    /// the context.
    pub fn plan_root(
        &self,
        ctx: &mut BindContext,
        bound: BoundQuery,
    ) -> Result<LogicalOperator> {
        let root = self.plan_query(bound)?;

        for idx in 0..ctx.materializations.len() {
            let bound = ctx.materializations[idx].bound.take().ok_or_else(|| {
                QuarryError::new("Materialization bound twice or never bound")
            })?;
            let plan = self.plan_query(bound)?;
            ctx.materializations[idx].plan = Some(plan);
        }

        for idx in 0..ctx.subqueries.len() {
            let bound = ctx.subqueries[idx]
                .bound
                .take()
                .ok_or_else(|| QuarryError::new("Subquery bound twice or never bound"))?;
            let plan = self.plan_query(*bound)?;
            ctx.subqueries[idx].plan = Some(plan);
        }

        Ok(root)
    }

    pub fn plan_query(&self, bound: BoundQuery) -> Result<LogicalOperator> {
        match bound {
            BoundQuery::Select(select) => self.plan_select(select),
            BoundQuery::Setop(setop) => {
                let left = self.plan_query(*setop.left)?;
                let right = self.plan_query(*setop.right)?;
                Ok(LogicalOperator::Setop(Node::new(
                    LogicalSetop {
                        kind: setop.kind,
                        all: setop.all,
                        setop_table: setop.setop_table,
                        output_types: setop.output_types,
                    },
                    vec![left, right],
                )))
            }
        }
    }

    fn plan_select(&self, select: BoundSelect) -> Result<LogicalOperator> {
        // FROM
        let mut plan = self.plan_from(select.from)?;

        // WHERE
        if let Some(filter) = select.filter {
            plan = LogicalOperator::Filter(Node::new(LogicalFilter { filter }, vec![plan]));
        }

        // GROUP BY / aggregates
        if select.group_table.is_some() || select.aggregates_table.is_some() {
            plan = LogicalOperator::Aggregate(Node::new(
                LogicalAggregate {
                    aggregates: select.aggregates,
                    aggregates_table: select.aggregates_table,
                    group_exprs: select.group_exprs,
                    group_table: select.group_table,
                },
                vec![plan],
            ));
        }

        // HAVING
        if let Some(having) = select.having {
            plan = LogicalOperator::Filter(Node::new(LogicalFilter { filter: having }, vec![plan]));
        }

        // ORDER BY sits below the projection: its expressions reference the
        // pre-projection tables (or the aggregate output), never projection
        // aliases.
        if !select.order_by.is_empty() {
            plan = LogicalOperator::Order(Node::new(
                LogicalOrder {
                    exprs: select.order_by,
                },
                vec![plan],
            ));
        }

        // Projections
        plan = LogicalOperator::Project(Node::new(
            LogicalProject {
                projections: select.projections,
                projection_table: select.projection_table,
            },
            vec![plan],
        ));

        // DISTINCT. Rewritten to a grouped, order-preserving aggregate by
        // the optimizer.
        if select.distinct {
            plan = LogicalOperator::Distinct(Node::new(LogicalDistinct, vec![plan]));
        }

        // LIMIT
        if let Some(limit) = select.limit {
            plan = LogicalOperator::Limit(Node::new(LogicalLimit { limit }, vec![plan]));
        }

        Ok(plan)
    }

    fn plan_from(&self, from: BoundFrom) -> Result<LogicalOperator> {
        match from {
            BoundFrom::Empty => Ok(LogicalOperator::SingleRow(Node::new(
                LogicalSingleRow,
                Vec::new(),
            ))),
            BoundFrom::Source(source) => {
                let mut node = Node::new(
                    LogicalScan {
                        table_ref: source.table_ref,
                        name: source.name,
                        column_types: source.column_types,
                        source: source.source,
                    },
                    Vec::new(),
                );
                if let Some(rows) = source.estimated_rows {
                    node.estimated_cardinality = StatisticsValue::Exact(rows);
                }
                Ok(LogicalOperator::Scan(node))
            }
            BoundFrom::CteScan(scan) => Ok(LogicalOperator::MaterializationScan(Node::new(
                LogicalMaterializationScan {
                    mat_ref: scan.mat_ref,
                    table_ref: scan.table_ref,
                },
                Vec::new(),
            ))),
            BoundFrom::Join(join) => self.plan_join(*join),
        }
    }

    fn plan_join(&self, join: BoundJoin) -> Result<LogicalOperator> {
        let left = self.plan_from(join.left)?;
        let right = self.plan_from(join.right)?;

        let join_type = match join.kind {
            JoinKind::Inner => JoinType::Inner,
            JoinKind::Left => JoinType::Left,
            JoinKind::Right => JoinType::Right,
            JoinKind::Cross => {
                return Ok(LogicalOperator::CrossJoin(Node::new(
                    LogicalCrossJoin,
                    vec![left, right],
                )));
            }
        };

        let condition = join
            .condition
            .ok_or_else(|| QuarryError::new("Join missing bound condition"))?;

        let left_refs: HashSet<_> = join.left_refs.iter().copied().collect();
        let right_refs: HashSet<_> = join.right_refs.iter().copied().collect();

        let extracted =
            JoinConditionExtractor::new(&left_refs, &right_refs).extract(condition)?;

        if extracted.equi.is_empty() {
            // No equality conjuncts at all. Keep the whole condition on an
            // arbitrary join; strategy selection falls back to sort-merge or
            // nested-loop.
            let condition = extracted
                .reconstruct()?
                .ok_or_else(|| QuarryError::new("Join condition reduced to nothing"))?;
            return Ok(LogicalOperator::ArbitraryJoin(Node::new(
                LogicalArbitraryJoin {
                    join_type,
                    condition,
                    hint: join.hint,
                },
                vec![left, right],
            )));
        }

        let residual = ExtractedConditions::residual_predicate(extracted.residual)?;
        Ok(LogicalOperator::ComparisonJoin(Node::new(
            LogicalComparisonJoin {
                join_type,
                conditions: extracted.equi,
                residual,
                hint: join.hint,
            },
            vec![left, right],
        )))
    }
}
