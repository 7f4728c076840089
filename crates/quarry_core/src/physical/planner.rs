//! Lowers an optimized logical plan into physical operators, selecting a
//! join strategy per join node.

use std::fmt;

use quarry_error::{QuarryError, Result};

use super::PhysicalPlan;
use super::evaluator::{ExpressionEvaluator, PhysicalExpr};
use super::operators::filter::FilterExec;
use super::operators::hash_aggregate::{HashAggregateExec, PhysicalAggregate};
use super::operators::hash_join::{BuildSide, HashJoinExec};
use super::operators::limit::LimitExec;
use super::operators::merge_join::MergeJoinExec;
use super::operators::nested_loop_join::NestedLoopJoinExec;
use super::operators::project::ProjectExec;
use super::operators::scan::{MaterializationScanExec, ScanExec, SingleRowExec};
use super::operators::sort::SortExec;
use super::operators::union::UnionExec;
use super::operators::PhysicalOperator;
use crate::ast::JoinHint;
use crate::expr::Expression;
use crate::expr::comparison_expr::ComparisonOperator;
use crate::expr::conjunction_expr::{ConjunctionExpr, ConjunctionOperator};
use crate::functions::registry::NondeterministicFunctions;
use crate::logical::binder::table_list::{TableList, TableRef};
use crate::logical::logical_join::JoinType;
use crate::logical::operator::{LogicalOperator, Node};
use crate::logical::planner::condition_extract::ExtractedConditions;
use crate::logical::statistics::StatisticsValue;
use crate::optimizer::common_subexpr::CseAnalysis;

/// The physical join strategy chosen for a join node. Computed once at
/// compile time, immutable thereafter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinStrategy {
    Hash { build_side: BuildSide },
    SortMerge,
    NestedLoop,
}

impl fmt::Display for JoinStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Hash { build_side } => write!(f, "hash (build = {build_side})"),
            Self::SortMerge => write!(f, "sort-merge"),
            Self::NestedLoop => write!(f, "nested-loop"),
        }
    }
}

/// Maps table refs to offsets in a flat input row.
#[derive(Debug, Clone, Default)]
pub struct Layout {
    entries: Vec<(TableRef, usize)>,
}

impl Layout {
    pub fn from_refs(tables: &TableList, refs: &[TableRef]) -> Result<Layout> {
        let mut entries = Vec::with_capacity(refs.len());
        for table_ref in refs {
            let width = tables.get(*table_ref)?.num_columns();
            entries.push((*table_ref, width));
        }
        Ok(Layout { entries })
    }

    pub fn concat(left: &Layout, right: &Layout) -> Layout {
        let mut entries = left.entries.clone();
        entries.extend_from_slice(&right.entries);
        Layout { entries }
    }

    pub fn width(&self) -> usize {
        self.entries.iter().map(|(_, width)| width).sum()
    }

    pub fn offset(&self, table_ref: TableRef, column: usize) -> Result<usize> {
        let mut offset = 0;
        for (entry_ref, width) in &self.entries {
            if *entry_ref == table_ref {
                if column >= *width {
                    return Err(QuarryError::new(format!(
                        "Column {column} out of range for table {table_ref}"
                    )));
                }
                return Ok(offset + column);
            }
            offset += width;
        }
        Err(QuarryError::new(format!(
            "Table {table_ref} not in operator input"
        ))
        .with_field("layout", format!("{:?}", self.entries)))
    }
}

/// Converts bound expressions to physical expressions over a layout,
/// wrapping repeated pure subtrees in cache slots.
#[derive(Debug)]
struct PhysicalExprPlanner<'a> {
    layout: &'a Layout,
    cse: Option<&'a CseAnalysis>,
}

impl PhysicalExprPlanner<'_> {
    fn plan(&self, expr: &Expression) -> Result<PhysicalExpr> {
        if let Some(slot) = self.cse.and_then(|cse| cse.slot_for(expr)) {
            return Ok(PhysicalExpr::Cached {
                slot,
                input: Box::new(self.plan_inner(expr)?),
            });
        }
        self.plan_inner(expr)
    }

    fn plan_inner(&self, expr: &Expression) -> Result<PhysicalExpr> {
        Ok(match expr {
            Expression::Literal(e) => PhysicalExpr::Literal(e.literal.clone()),
            Expression::Column(e) => {
                PhysicalExpr::Column(self.layout.offset(e.table_ref, e.column)?)
            }
            Expression::Arith(e) => PhysicalExpr::Arith {
                op: e.op,
                datatype: e.datatype.clone(),
                left: Box::new(self.plan(&e.left)?),
                right: Box::new(self.plan(&e.right)?),
            },
            Expression::Comparison(e) => PhysicalExpr::Comparison {
                op: e.op,
                left: Box::new(self.plan(&e.left)?),
                right: Box::new(self.plan(&e.right)?),
            },
            Expression::Conjunction(e) => PhysicalExpr::Conjunction {
                op: e.op,
                inputs: e
                    .expressions
                    .iter()
                    .map(|input| self.plan(input))
                    .collect::<Result<Vec<_>>>()?,
            },
            Expression::Cast(e) => PhysicalExpr::Cast {
                to: e.to.clone(),
                behavior: e.behavior,
                input: Box::new(self.plan(&e.expr)?),
            },
            Expression::Case(e) => PhysicalExpr::Case {
                cases: e
                    .cases
                    .iter()
                    .map(|c| Ok((self.plan(&c.when)?, self.plan(&c.then)?)))
                    .collect::<Result<Vec<_>>>()?,
                else_expr: Box::new(self.plan(&e.else_expr)?),
            },
            Expression::ScalarFunction(e) => PhysicalExpr::ScalarFunction {
                function: e.function.clone(),
                inputs: e
                    .inputs
                    .iter()
                    .map(|input| self.plan(input))
                    .collect::<Result<Vec<_>>>()?,
            },
            Expression::Index(e) => PhysicalExpr::Index {
                input: Box::new(self.plan(&e.expr)?),
                index: Box::new(self.plan(&e.index)?),
            },
            Expression::Subquery(e) => PhysicalExpr::Subquery {
                index: e.subquery_ref.0 as usize,
            },
            Expression::Aggregate(_) => {
                return Err(QuarryError::new(
                    "Aggregate expression reached physical planning unextracted",
                ));
            }
        })
    }
}

#[derive(Debug)]
pub struct PhysicalPlanner<'a> {
    tables: &'a TableList,
    nondeterministic: &'a NondeterministicFunctions,
}

impl<'a> PhysicalPlanner<'a> {
    pub fn new(tables: &'a TableList, nondeterministic: &'a NondeterministicFunctions) -> Self {
        PhysicalPlanner {
            tables,
            nondeterministic,
        }
    }

    /// Plan the root plus the already-planned materialization and subquery
    /// bodies taken from the bind context.
    pub fn plan(
        &self,
        root: LogicalOperator,
        mat_plans: Vec<LogicalOperator>,
        sub_plans: Vec<LogicalOperator>,
    ) -> Result<PhysicalPlan> {
        let output_refs = root.get_output_table_refs();
        let mut output_names = Vec::new();
        let mut output_types = Vec::new();
        for table_ref in &output_refs {
            let table = self.tables.get(*table_ref)?;
            output_names.extend(table.column_names.iter().cloned());
            output_types.extend(table.column_types.iter().cloned());
        }

        let (root, _) = self.plan_operator(root)?;

        let mut materializations = Vec::new();
        for plan in mat_plans {
            let (operator, _) = self.plan_operator(plan)?;
            materializations.push(operator);
        }

        let mut subqueries = Vec::new();
        for plan in sub_plans {
            let (operator, _) = self.plan_operator(plan)?;
            subqueries.push(operator);
        }

        Ok(PhysicalPlan {
            root,
            materializations,
            subqueries,
            output_names,
            output_types,
        })
    }

    fn plan_operator(&self, op: LogicalOperator) -> Result<(PhysicalOperator, Layout)> {
        match op {
            LogicalOperator::SingleRow(_) => {
                Ok((PhysicalOperator::SingleRow(SingleRowExec), Layout::default()))
            }
            LogicalOperator::Scan(node) => {
                let layout = Layout::from_refs(self.tables, &[node.node.table_ref])?;
                let exec = ScanExec {
                    name: node.node.name,
                    source: node.node.source,
                    width: layout.width(),
                };
                Ok((PhysicalOperator::Scan(exec), layout))
            }
            LogicalOperator::MaterializationScan(node) => {
                let layout = Layout::from_refs(self.tables, &[node.node.table_ref])?;
                let exec = MaterializationScanExec {
                    index: node.node.mat_ref.0 as usize,
                };
                Ok((PhysicalOperator::MaterializationScan(exec), layout))
            }
            LogicalOperator::Filter(mut node) => {
                let child = node.take_one_child_exact()?;
                let (input, layout) = self.plan_operator(child)?;
                let predicate =
                    self.evaluator_for(std::slice::from_ref(&node.node.filter), &layout)?;
                Ok((
                    PhysicalOperator::Filter(FilterExec {
                        input: Box::new(input),
                        predicate,
                    }),
                    layout,
                ))
            }
            LogicalOperator::Project(mut node) => {
                let child = node.take_one_child_exact()?;
                let (input, child_layout) = self.plan_operator(child)?;
                let evaluator = self.evaluator_for(&node.node.projections, &child_layout)?;
                let layout = Layout::from_refs(self.tables, &[node.node.projection_table])?;
                Ok((
                    PhysicalOperator::Project(ProjectExec {
                        input: Box::new(input),
                        evaluator,
                    }),
                    layout,
                ))
            }
            LogicalOperator::Aggregate(mut node) => {
                let child = node.take_one_child_exact()?;
                let (input, child_layout) = self.plan_operator(child)?;

                let group_eval = if node.node.group_exprs.is_empty() {
                    None
                } else {
                    Some(self.evaluator_for(&node.node.group_exprs, &child_layout)?)
                };

                let mut aggregates = Vec::with_capacity(node.node.aggregates.len());
                for expr in &node.node.aggregates {
                    let agg = match expr {
                        Expression::Aggregate(agg) => agg,
                        other => {
                            return Err(QuarryError::new(format!(
                                "Expected aggregate expression, got {other}"
                            )));
                        }
                    };
                    let inputs = self.evaluator_for(&agg.inputs, &child_layout)?;
                    aggregates.push(PhysicalAggregate {
                        function: agg.agg.clone(),
                        inputs,
                    });
                }

                let refs: Vec<_> = node
                    .node
                    .group_table
                    .into_iter()
                    .chain(node.node.aggregates_table)
                    .collect();
                let layout = Layout::from_refs(self.tables, &refs)?;

                Ok((
                    PhysicalOperator::HashAggregate(HashAggregateExec {
                        input: Box::new(input),
                        group_eval,
                        aggregates,
                    }),
                    layout,
                ))
            }
            LogicalOperator::Distinct(_) => Err(QuarryError::new(
                "Distinct operator reached physical planning; rewrite pass did not run",
            )),
            LogicalOperator::Order(mut node) => {
                let child = node.take_one_child_exact()?;
                let (input, layout) = self.plan_operator(child)?;
                let exprs: Vec<_> = node.node.exprs.iter().map(|o| o.expr.clone()).collect();
                let key_eval = self.evaluator_for(&exprs, &layout)?;
                let desc = node.node.exprs.iter().map(|o| o.desc).collect();
                Ok((
                    PhysicalOperator::Sort(SortExec {
                        input: Box::new(input),
                        key_eval,
                        desc,
                    }),
                    layout,
                ))
            }
            LogicalOperator::Limit(mut node) => {
                let child = node.take_one_child_exact()?;
                let (input, layout) = self.plan_operator(child)?;
                Ok((
                    PhysicalOperator::Limit(LimitExec {
                        input: Box::new(input),
                        limit: node.node.limit,
                    }),
                    layout,
                ))
            }
            LogicalOperator::Setop(mut node) => {
                let [left, right] = node.take_two_children_exact()?;
                let (left, _) = self.plan_operator(left)?;
                let (right, _) = self.plan_operator(right)?;
                let layout = Layout::from_refs(self.tables, &[node.node.setop_table])?;
                Ok((
                    PhysicalOperator::Union(UnionExec {
                        left: Box::new(left),
                        right: Box::new(right),
                        all: node.node.all,
                        output_types: node.node.output_types,
                    }),
                    layout,
                ))
            }
            LogicalOperator::CrossJoin(mut node) => {
                let [left, right] = node.take_two_children_exact()?;
                let (left, left_layout) = self.plan_operator(left)?;
                let (right, right_layout) = self.plan_operator(right)?;
                let layout = Layout::concat(&left_layout, &right_layout);
                Ok((
                    PhysicalOperator::NestedLoopJoin(NestedLoopJoinExec {
                        left: Box::new(left),
                        right: Box::new(right),
                        join_type: JoinType::Inner,
                        condition: None,
                        left_width: left_layout.width(),
                        right_width: right_layout.width(),
                    }),
                    layout,
                ))
            }
            LogicalOperator::ComparisonJoin(node) => self.plan_comparison_join(node),
            LogicalOperator::ArbitraryJoin(node) => self.plan_arbitrary_join(node),
        }
    }

    fn plan_comparison_join(
        &self,
        mut node: Node<crate::logical::logical_join::LogicalComparisonJoin>,
    ) -> Result<(PhysicalOperator, Layout)> {
        let left_estimate = node.children[0].estimated_cardinality();
        let right_estimate = node.children[1].estimated_cardinality();

        let [left, right] = node.take_two_children_exact()?;
        let (left, left_layout) = self.plan_operator(left)?;
        let (right, right_layout) = self.plan_operator(right)?;
        let combined = Layout::concat(&left_layout, &right_layout);

        let join = node.node;
        let strategy = select_strategy(
            join.hint,
            true,
            join.join_type,
            left_estimate,
            right_estimate,
        );

        let residual = join
            .residual
            .as_ref()
            .map(|r| self.evaluator_for(std::slice::from_ref(r), &combined))
            .transpose()?;

        let left_key_exprs: Vec<_> = join.conditions.iter().map(|c| (*c.left).clone()).collect();
        let right_key_exprs: Vec<_> =
            join.conditions.iter().map(|c| (*c.right).clone()).collect();

        let operator = match strategy {
            JoinStrategy::Hash { build_side } => {
                let left_keys = self.evaluator_for(&left_key_exprs, &left_layout)?;
                let right_keys = self.evaluator_for(&right_key_exprs, &right_layout)?;
                PhysicalOperator::HashJoin(HashJoinExec {
                    left: Box::new(left),
                    right: Box::new(right),
                    join_type: join.join_type,
                    build_side,
                    left_keys,
                    right_keys,
                    residual,
                    left_width: left_layout.width(),
                    right_width: right_layout.width(),
                })
            }
            JoinStrategy::SortMerge => {
                let left_keys = self.evaluator_for(&left_key_exprs, &left_layout)?;
                let right_keys = self.evaluator_for(&right_key_exprs, &right_layout)?;
                PhysicalOperator::MergeJoin(MergeJoinExec {
                    left: Box::new(left),
                    right: Box::new(right),
                    join_type: join.join_type,
                    left_keys,
                    right_keys,
                    keys_are_equi: true,
                    residual,
                    left_width: left_layout.width(),
                    right_width: right_layout.width(),
                })
            }
            JoinStrategy::NestedLoop => {
                // Reconstruct the full condition; decompose and reconstruct
                // are logically equivalent for all rows.
                let extracted = ExtractedConditions {
                    equi: join.conditions,
                    residual: join.residual.into_iter().collect(),
                };
                let condition = extracted.reconstruct()?;
                let condition = condition
                    .map(|c| self.evaluator_for(std::slice::from_ref(&c), &combined))
                    .transpose()?;
                PhysicalOperator::NestedLoopJoin(NestedLoopJoinExec {
                    left: Box::new(left),
                    right: Box::new(right),
                    join_type: join.join_type,
                    condition,
                    left_width: left_layout.width(),
                    right_width: right_layout.width(),
                })
            }
        };

        Ok((operator, combined))
    }

    fn plan_arbitrary_join(
        &self,
        mut node: Node<crate::logical::logical_join::LogicalArbitraryJoin>,
    ) -> Result<(PhysicalOperator, Layout)> {
        let [left, right] = node.take_two_children_exact()?;

        let left_refs: std::collections::HashSet<_> =
            left.get_output_table_refs().into_iter().collect();
        let right_refs: std::collections::HashSet<_> =
            right.get_output_table_refs().into_iter().collect();

        let (left, left_layout) = self.plan_operator(left)?;
        let (right, right_layout) = self.plan_operator(right)?;
        let combined = Layout::concat(&left_layout, &right_layout);

        let join = node.node;
        let condition_eval =
            self.evaluator_for(std::slice::from_ref(&join.condition), &combined)?;

        // Sort-merge without equi keys needs a derivable sort key: the
        // residual's dominant inequality operand pair. Heuristic: the first
        // top-level inequality conjunct whose sides split cleanly across the
        // join.
        if matches!(join.hint, JoinHint::Merge) {
            if let Some((left_key, right_key)) =
                dominant_inequality(&join.condition, &left_refs, &right_refs)
            {
                let left_keys = self.evaluator_for(std::slice::from_ref(&left_key), &left_layout)?;
                let right_keys =
                    self.evaluator_for(std::slice::from_ref(&right_key), &right_layout)?;
                let operator = PhysicalOperator::MergeJoin(MergeJoinExec {
                    left: Box::new(left),
                    right: Box::new(right),
                    join_type: join.join_type,
                    left_keys,
                    right_keys,
                    keys_are_equi: false,
                    residual: Some(condition_eval),
                    left_width: left_layout.width(),
                    right_width: right_layout.width(),
                });
                return Ok((operator, combined));
            }
        }

        // Nested loop: the only strategy needing no key at all.
        let operator = PhysicalOperator::NestedLoopJoin(NestedLoopJoinExec {
            left: Box::new(left),
            right: Box::new(right),
            join_type: join.join_type,
            condition: Some(condition_eval),
            left_width: left_layout.width(),
            right_width: right_layout.width(),
        });
        Ok((operator, combined))
    }

    fn evaluator_for(
        &self,
        exprs: &[Expression],
        layout: &Layout,
    ) -> Result<ExpressionEvaluator> {
        let cse = CseAnalysis::analyze(exprs.iter(), self.nondeterministic);
        let planner = PhysicalExprPlanner {
            layout,
            cse: Some(&cse),
        };
        let physical = exprs
            .iter()
            .map(|expr| planner.plan(expr))
            .collect::<Result<Vec<_>>>()?;
        Ok(ExpressionEvaluator::new(physical, cse.slot_count()))
    }
}

/// Select the join strategy honoring the hint.
///
/// Non-empty equi keys and hashing permitted select hash; otherwise
/// sort-merge when ordering is permitted and a key is derivable; nested loop
/// is the fallback needing no key.
fn select_strategy(
    hint: JoinHint,
    has_equi_keys: bool,
    join_type: JoinType,
    left_estimate: StatisticsValue<usize>,
    right_estimate: StatisticsValue<usize>,
) -> JoinStrategy {
    match hint {
        JoinHint::Loop => JoinStrategy::NestedLoop,
        JoinHint::Merge => JoinStrategy::SortMerge,
        JoinHint::Hash | JoinHint::Auto => {
            if !has_equi_keys {
                return JoinStrategy::NestedLoop;
            }
            // The preserved side probes so unmatched rows stream out once;
            // the build side is forced for outer joins.
            let build_side = match join_type {
                JoinType::Left => BuildSide::Right,
                JoinType::Right => BuildSide::Left,
                JoinType::Inner => match (left_estimate.value(), right_estimate.value()) {
                    (Some(l), Some(r)) if l < r => BuildSide::Left,
                    _ => BuildSide::Right,
                },
            };
            JoinStrategy::Hash { build_side }
        }
    }
}

/// Find the dominant inequality operand pair in a condition with no equi
/// keys: the first top-level non-equality comparison conjunct whose sides
/// split cleanly across the join, normalized to (left-side, right-side).
fn dominant_inequality(
    condition: &Expression,
    left_refs: &std::collections::HashSet<TableRef>,
    right_refs: &std::collections::HashSet<TableRef>,
) -> Option<(Expression, Expression)> {
    let conjuncts: Vec<&Expression> = match condition {
        Expression::Conjunction(ConjunctionExpr {
            op: ConjunctionOperator::And,
            expressions,
        }) => expressions.iter().collect(),
        other => vec![other],
    };

    for conjunct in conjuncts {
        let cmp = match conjunct {
            Expression::Comparison(cmp) => cmp,
            _ => continue,
        };
        if matches!(cmp.op, ComparisonOperator::Eq | ComparisonOperator::NotEq) {
            continue;
        }

        let lrefs = cmp.left.get_table_refs();
        let rrefs = cmp.right.get_table_refs();
        if lrefs.is_empty() || rrefs.is_empty() {
            continue;
        }
        if lrefs.is_subset(left_refs) && rrefs.is_subset(right_refs) {
            return Some(((*cmp.left).clone(), (*cmp.right).clone()));
        }
        if lrefs.is_subset(right_refs) && rrefs.is_subset(left_refs) {
            return Some(((*cmp.right).clone(), (*cmp.left).clone()));
        }
    }
    None
}
