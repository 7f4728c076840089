use quarry_error::{QuarryError, Result};

use super::bind_context::{BindContext, BindScopeRef};
use super::bind_from::BoundFrom;
use super::bind_select::{BoundSelect, SelectBinder};
use super::table_list::TableRef;
use crate::ast::{QueryBody, QueryExpr, SetopKind};
use crate::catalog::SourceProvider;
use crate::expr::Expression;
use crate::functions::implicit::implicit_cast_score;
use crate::functions::registry::FunctionRegistry;
use crate::logical::logical_setop::SetOpKind;
use crate::observe::QueryPhase;
use crate::scalars::datatype::DataType;

#[derive(Debug)]
pub enum BoundQuery {
    Select(BoundSelect),
    Setop(BoundSetop),
}

#[derive(Debug)]
pub struct BoundSetop {
    pub left: Box<BoundQuery>,
    pub right: Box<BoundQuery>,
    pub kind: SetOpKind,
    pub all: bool,
    pub setop_table: TableRef,
    pub output_types: Vec<DataType>,
}

impl BoundQuery {
    pub fn output_table_ref(&self) -> TableRef {
        match self {
            Self::Select(select) => select.projection_table,
            Self::Setop(setop) => setop.setop_table,
        }
    }

    /// Whether any expression in this bound query calls a volatile function.
    pub fn any_expr_volatile(&self) -> Result<bool> {
        fn from_volatile(from: &BoundFrom) -> bool {
            match from {
                BoundFrom::Empty | BoundFrom::Source(_) | BoundFrom::CteScan(_) => false,
                BoundFrom::Join(join) => {
                    join.condition.as_ref().is_some_and(Expression::is_volatile)
                        || from_volatile(&join.left)
                        || from_volatile(&join.right)
                }
            }
        }

        match self {
            Self::Select(select) => {
                let exprs = select
                    .projections
                    .iter()
                    .chain(select.filter.iter())
                    .chain(select.having.iter())
                    .chain(select.group_exprs.iter())
                    .chain(select.aggregates.iter())
                    .chain(select.order_by.iter().map(|o| &o.expr));
                Ok(exprs.into_iter().any(Expression::is_volatile)
                    || from_volatile(&select.from))
            }
            Self::Setop(setop) => {
                Ok(setop.left.any_expr_volatile()? || setop.right.any_expr_volatile()?)
            }
        }
    }

    #[cfg(test)]
    pub(crate) fn empty_for_test() -> Self {
        use crate::observe::UnitId;
        BoundQuery::Select(BoundSelect {
            unit: UnitId(u32::MAX),
            from: BoundFrom::Empty,
            filter: None,
            group_exprs: Vec::new(),
            group_table: None,
            aggregates: Vec::new(),
            aggregates_table: None,
            having: None,
            projections: Vec::new(),
            projection_table: TableRef(u32::MAX),
            output_names: Vec::new(),
            distinct: false,
            order_by: Vec::new(),
            limit: None,
        })
    }
}

#[derive(Debug)]
pub struct QueryBinder<'b> {
    pub scope: BindScopeRef,
    pub registry: &'b FunctionRegistry,
    pub provider: &'b dyn SourceProvider,
}

impl<'b> QueryBinder<'b> {
    pub fn new(
        scope: BindScopeRef,
        registry: &'b FunctionRegistry,
        provider: &'b dyn SourceProvider,
    ) -> Self {
        QueryBinder {
            scope,
            registry,
            provider,
        }
    }

    pub fn bind(&self, ctx: &mut BindContext, query: &QueryExpr) -> Result<BoundQuery> {
        // Each CTE body binds once, in its own scope, as its own query unit.
        // Later CTEs in the same WITH list can reference earlier ones.
        for cte in &query.ctes {
            let cte_scope = ctx.new_child_scope(self.scope);
            let binder = QueryBinder::new(cte_scope, self.registry, self.provider);
            let bound = binder.bind(ctx, &cte.query)?;

            let output_ref = bound.output_table_ref();
            let table = ctx.get_table(output_ref)?;
            let column_names = table.column_names.clone();
            let column_types = table.column_types.clone();
            let column_nullable = table.column_nullable.clone();

            ctx.add_cte(
                self.scope,
                cte.name.clone(),
                column_names,
                column_types,
                column_nullable,
                bound,
            )?;
        }

        self.bind_body(ctx, &query.body)
    }

    fn bind_body(&self, ctx: &mut BindContext, body: &QueryBody) -> Result<BoundQuery> {
        match body {
            QueryBody::Select(select) => {
                let unit = ctx.new_unit();
                ctx.mark_phase(unit, QueryPhase::Begin);
                let bound =
                    SelectBinder::new(self.scope, self.registry, self.provider)
                        .bind(ctx, select, unit)?;
                ctx.mark_phase(unit, QueryPhase::End);
                Ok(BoundQuery::Select(bound))
            }
            QueryBody::Setop(setop) => {
                // Each branch binds in its own scope as its own unit.
                let left_scope = ctx.new_child_scope(self.scope);
                let left = QueryBinder::new(left_scope, self.registry, self.provider)
                    .bind_body(ctx, &setop.left)?;

                let right_scope = ctx.new_child_scope(self.scope);
                let right = QueryBinder::new(right_scope, self.registry, self.provider)
                    .bind_body(ctx, &setop.right)?;

                let left_table = ctx.get_table(left.output_table_ref())?;
                let right_table = ctx.get_table(right.output_table_ref())?;

                if left_table.num_columns() != right_table.num_columns() {
                    return Err(QuarryError::new(format!(
                        "Set operation branches have different column counts: {} and {}",
                        left_table.num_columns(),
                        right_table.num_columns()
                    )));
                }

                // Determine output types by comparing both sides, preferring
                // the higher-scored cast direction.
                let left_types = left_table.column_types.clone();
                let right_types = right_table.column_types.clone();
                let output_names = left_table.column_names.clone();

                let mut output_types = Vec::with_capacity(left_types.len());
                for (left_type, right_type) in left_types.into_iter().zip(right_types) {
                    if left_type == right_type {
                        output_types.push(left_type);
                        continue;
                    }

                    let left_score =
                        implicit_cast_score(right_type.datatype_id(), left_type.datatype_id());
                    let right_score =
                        implicit_cast_score(left_type.datatype_id(), right_type.datatype_id());

                    match (left_score, right_score) {
                        (None, None) => {
                            return Err(QuarryError::new(format!(
                                "Cannot find suitable cast type for {left_type} and {right_type}"
                            )));
                        }
                        (Some(ls), Some(rs)) if ls >= rs => output_types.push(left_type),
                        (Some(_), None) => output_types.push(left_type),
                        _ => output_types.push(right_type),
                    }
                }

                let nullable = vec![true; output_types.len()];
                let setop_table =
                    ctx.push_ephemeral_table(output_names, output_types.clone(), nullable);

                let kind = match setop.kind {
                    SetopKind::Union => SetOpKind::Union,
                };

                Ok(BoundQuery::Setop(BoundSetop {
                    left: Box::new(left),
                    right: Box::new(right),
                    kind,
                    all: setop.all,
                    setop_table,
                    output_types,
                }))
            }
        }
    }
}
