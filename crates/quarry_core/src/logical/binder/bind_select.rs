use quarry_error::{QuarryError, Result};

use super::bind_context::{BindContext, BindScopeRef};
use super::bind_from::{BoundFrom, FromBinder};
use super::expr_binder::ExpressionBinder;
use super::table_list::TableRef;
use crate::ast::{AstExpr, SelectItem, SelectQuery};
use crate::catalog::SourceProvider;
use crate::expr::Expression;
use crate::expr::column_expr::ColumnExpr;
use crate::functions::registry::FunctionRegistry;
use crate::logical::logical_order::OrderByExpr;
use crate::observe::{QueryPhase, UnitId};
use crate::scalars::datatype::DataType;

/// A fully bound SELECT unit.
#[derive(Debug)]
pub struct BoundSelect {
    pub unit: UnitId,
    pub from: BoundFrom,
    pub filter: Option<Expression>,
    pub group_exprs: Vec<Expression>,
    pub group_table: Option<TableRef>,
    /// Extracted aggregate expressions, deduplicated structurally.
    pub aggregates: Vec<Expression>,
    pub aggregates_table: Option<TableRef>,
    pub having: Option<Expression>,
    pub projections: Vec<Expression>,
    pub projection_table: TableRef,
    pub output_names: Vec<String>,
    pub distinct: bool,
    pub order_by: Vec<OrderByExpr>,
    pub limit: Option<u64>,
}

#[derive(Debug)]
pub struct SelectBinder<'b> {
    pub scope: BindScopeRef,
    pub registry: &'b FunctionRegistry,
    pub provider: &'b dyn SourceProvider,
}

impl<'b> SelectBinder<'b> {
    pub fn new(
        scope: BindScopeRef,
        registry: &'b FunctionRegistry,
        provider: &'b dyn SourceProvider,
    ) -> Self {
        SelectBinder {
            scope,
            registry,
            provider,
        }
    }

    pub fn bind(
        &self,
        ctx: &mut BindContext,
        select: &SelectQuery,
        unit: UnitId,
    ) -> Result<BoundSelect> {
        // FROM
        let from = FromBinder::new(self.scope, self.registry, self.provider)
            .bind(ctx, select.from.as_ref())?;
        ctx.mark_phase(unit, QueryPhase::From);

        // WHERE. Aggregates are rejected here by the expression binder.
        let filter = select
            .filter
            .as_ref()
            .map(|f| {
                let binder = ExpressionBinder::new(self.scope, self.registry, self.provider);
                let bound = binder.bind(ctx, f)?;
                let datatype = bound.datatype()?;
                if !matches!(datatype, DataType::Boolean | DataType::Null) {
                    return Err(QuarryError::new(format!(
                        "WHERE predicate must be a boolean, got {datatype}"
                    )));
                }
                Ok(bound)
            })
            .transpose()?;
        if filter.is_some() {
            ctx.mark_phase(unit, QueryPhase::Where);
        }

        // GROUP BY expressions.
        let group_exprs = select
            .group_by
            .iter()
            .map(|expr| {
                ExpressionBinder::new(self.scope, self.registry, self.provider).bind(ctx, expr)
            })
            .collect::<Result<Vec<_>>>()?;

        // Select list, with wildcard expansion.
        let (mut projections, output_names) = self.bind_select_list(ctx, &select.projections)?;

        // HAVING.
        let mut having = select
            .having
            .as_ref()
            .map(|h| {
                ExpressionBinder::new(self.scope, self.registry, self.provider)
                    .with_aggregates()
                    .bind(ctx, h)
            })
            .transpose()?;

        // ORDER BY.
        let mut order_by = select
            .order_by
            .iter()
            .map(|item| {
                let expr = ExpressionBinder::new(self.scope, self.registry, self.provider)
                    .with_aggregates()
                    .bind(ctx, &item.expr)?;
                Ok(OrderByExpr {
                    expr,
                    desc: item.desc,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        // Aggregate extraction and rewrite.
        let has_aggregation = !group_exprs.is_empty()
            || projections.iter().any(|p| p.contains_aggregate())
            || having.as_ref().is_some_and(|h| h.contains_aggregate())
            || order_by.iter().any(|o| o.expr.contains_aggregate());

        let (group_table, aggregates, aggregates_table) = if has_aggregation {
            let mut aggregates = Vec::new();
            for expr in projections
                .iter()
                .chain(having.iter())
                .chain(order_by.iter().map(|o| &o.expr))
            {
                collect_aggregates(expr, &mut aggregates);
            }

            let group_table = if group_exprs.is_empty() {
                None
            } else {
                let types = group_exprs
                    .iter()
                    .map(|e| e.datatype())
                    .collect::<Result<Vec<_>>>()?;
                let nullable: Vec<_> = group_exprs.iter().map(|e| e.nullable()).collect();
                let names = (0..group_exprs.len()).map(|i| format!("group{i}")).collect();
                Some(ctx.push_ephemeral_table(names, types, nullable))
            };

            let aggregates_table = if aggregates.is_empty() {
                None
            } else {
                let types = aggregates
                    .iter()
                    .map(|e| e.datatype())
                    .collect::<Result<Vec<_>>>()?;
                let nullable: Vec<_> = aggregates.iter().map(|e| e.nullable()).collect();
                let names = (0..aggregates.len()).map(|i| format!("agg{i}")).collect();
                Some(ctx.push_ephemeral_table(names, types, nullable))
            };

            let rewriter = AggregateRewriter {
                ctx,
                group_exprs: &group_exprs,
                group_table,
                aggregates: &aggregates,
                aggregates_table,
            };
            for expr in projections.iter_mut() {
                rewriter.rewrite(expr)?;
                rewriter.validate(expr)?;
            }
            if let Some(having) = having.as_mut() {
                rewriter.rewrite(having)?;
                rewriter.validate(having)?;
            }
            for order in order_by.iter_mut() {
                rewriter.rewrite(&mut order.expr)?;
                rewriter.validate(&order.expr)?;
            }

            (group_table, aggregates, aggregates_table)
        } else {
            if having.is_some() {
                return Err(QuarryError::new(
                    "HAVING requires GROUP BY or an aggregated select list",
                ));
            }
            (None, Vec::new(), None)
        };

        if has_aggregation {
            ctx.mark_phase(unit, QueryPhase::GroupBy);
        }
        ctx.mark_phase(unit, QueryPhase::Select);

        // Output table for the projection.
        let types = projections
            .iter()
            .map(|p| p.datatype())
            .collect::<Result<Vec<_>>>()?;
        let nullable: Vec<_> = projections.iter().map(|p| p.nullable()).collect();
        let projection_table =
            ctx.push_ephemeral_table(output_names.clone(), types, nullable);

        Ok(BoundSelect {
            unit,
            from,
            filter,
            group_exprs,
            group_table,
            aggregates,
            aggregates_table,
            having,
            projections,
            projection_table,
            output_names,
            distinct: select.distinct,
            order_by,
            limit: select.limit,
        })
    }

    fn bind_select_list(
        &self,
        ctx: &mut BindContext,
        items: &[SelectItem],
    ) -> Result<(Vec<Expression>, Vec<String>)> {
        if items.is_empty() {
            return Err(QuarryError::new("Select list cannot be empty"));
        }

        let mut projections = Vec::new();
        let mut names = Vec::new();

        for item in items {
            match item {
                SelectItem::Wildcard => {
                    for table_ref in ctx.tables_in_scope(self.scope)? {
                        let table = ctx.get_table(table_ref)?;
                        for (column, name) in table.column_names.iter().enumerate() {
                            projections.push(Expression::Column(ColumnExpr {
                                table_ref,
                                column,
                                datatype: table.column_types[column].clone(),
                                nullable: table.column_nullable[column],
                            }));
                            names.push(name.clone());
                        }
                    }
                }
                SelectItem::Expr { expr, alias } => {
                    let bound = ExpressionBinder::new(self.scope, self.registry, self.provider)
                        .with_aggregates()
                        .bind(ctx, expr)?;
                    let name = match (alias, expr) {
                        (Some(alias), _) => alias.clone(),
                        (None, AstExpr::Column { name, .. }) => name.clone(),
                        (None, _) => format!("col{}", projections.len()),
                    };
                    projections.push(bound);
                    names.push(name);
                }
            }
        }

        Ok((projections, names))
    }
}

/// Rewrites expressions in an aggregated query to reference the aggregate
/// operator's output tables.
struct AggregateRewriter<'c, 'a> {
    ctx: &'c BindContext<'a>,
    group_exprs: &'c [Expression],
    group_table: Option<TableRef>,
    aggregates: &'c [Expression],
    aggregates_table: Option<TableRef>,
}

impl AggregateRewriter<'_, '_> {
    fn rewrite(&self, expr: &mut Expression) -> Result<()> {
        // Group expressions match structurally anywhere in the tree.
        if let (Some(group_table), Some(idx)) = (
            self.group_table,
            self.group_exprs.iter().position(|g| g == expr),
        ) {
            let table = self.ctx.get_table(group_table)?;
            *expr = Expression::Column(ColumnExpr {
                table_ref: group_table,
                column: idx,
                datatype: table.column_types[idx].clone(),
                nullable: table.column_nullable[idx],
            });
            return Ok(());
        }

        if matches!(expr, Expression::Aggregate(_)) {
            let aggregates_table = self
                .aggregates_table
                .ok_or_else(|| QuarryError::new("Aggregate without aggregates table"))?;
            let idx = self
                .aggregates
                .iter()
                .position(|a| a == expr)
                .ok_or_else(|| QuarryError::new("Aggregate not collected during binding"))?;
            let table = self.ctx.get_table(aggregates_table)?;
            *expr = Expression::Column(ColumnExpr {
                table_ref: aggregates_table,
                column: idx,
                datatype: table.column_types[idx].clone(),
                nullable: table.column_nullable[idx],
            });
            return Ok(());
        }

        expr.for_each_child_mut(&mut |child| self.rewrite(child))
    }

    /// After rewriting, anything still referencing a base table is neither
    /// grouped nor aggregated.
    fn validate(&self, expr: &Expression) -> Result<()> {
        let allowed: Vec<_> = self
            .group_table
            .into_iter()
            .chain(self.aggregates_table)
            .collect();

        let mut offender = None;
        collect_offender(expr, &allowed, &mut offender);
        match offender {
            Some(column) => Err(QuarryError::new(format!(
                "Column {column} must appear in the GROUP BY clause or be used in an aggregate"
            ))),
            None => Ok(()),
        }
    }
}

fn collect_offender(expr: &Expression, allowed: &[TableRef], offender: &mut Option<String>) {
    if offender.is_some() {
        return;
    }
    if let Expression::Column(col) = expr {
        if !allowed.contains(&col.table_ref) {
            *offender = Some(col.to_string());
            return;
        }
    }
    let _ = expr.for_each_child(&mut |child| {
        collect_offender(child, allowed, offender);
        Ok(())
    });
}

/// Collect aggregate subexpressions, deduplicating structurally identical
/// ones so `sum(x) + sum(x)` computes one accumulator.
fn collect_aggregates(expr: &Expression, out: &mut Vec<Expression>) {
    if matches!(expr, Expression::Aggregate(_)) {
        if !out.contains(expr) {
            out.push(expr.clone());
        }
        // Don't descend: the aggregate's inputs evaluate per input row, not
        // per group.
        return;
    }
    let _ = expr.for_each_child(&mut |child| {
        collect_aggregates(child, out);
        Ok(())
    });
}
