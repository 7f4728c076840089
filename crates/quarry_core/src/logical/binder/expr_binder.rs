use quarry_error::{QuarryError, Result};

use super::bind_context::{BindContext, BindScopeRef, find_similar};
use super::bind_query::QueryBinder;
use crate::ast::{AstExpr, BinaryOperator, QueryExpr};
use crate::catalog::SourceProvider;
use crate::expr::aggregate_expr::AggregateExpr;
use crate::expr::arith_expr::{ArithExpr, ArithOperator};
use crate::expr::case_expr::{CaseExpr, WhenThen};
use crate::expr::cast_expr::CastExpr;
use crate::expr::column_expr::ColumnExpr;
use crate::expr::comparison_expr::{ComparisonExpr, ComparisonOperator};
use crate::expr::conjunction_expr::{ConjunctionExpr, ConjunctionOperator};
use crate::expr::index_expr::IndexExpr;
use crate::expr::literal_expr::LiteralExpr;
use crate::expr::scalar_function_expr::ScalarFunctionExpr;
use crate::expr::subquery_expr::SubqueryExpr;
use crate::expr::Expression;
use crate::functions::registry::FunctionRegistry;
use crate::scalars::datatype::DataType;

/// Binds untyped front-end expressions into typed expressions.
#[derive(Debug)]
pub struct ExpressionBinder<'b> {
    pub scope: BindScopeRef,
    pub registry: &'b FunctionRegistry,
    pub provider: &'b dyn SourceProvider,
    /// Whether aggregate calls are legal in this position.
    pub allow_aggregates: bool,
}

impl<'b> ExpressionBinder<'b> {
    pub fn new(
        scope: BindScopeRef,
        registry: &'b FunctionRegistry,
        provider: &'b dyn SourceProvider,
    ) -> Self {
        ExpressionBinder {
            scope,
            registry,
            provider,
            allow_aggregates: false,
        }
    }

    pub fn with_aggregates(mut self) -> Self {
        self.allow_aggregates = true;
        self
    }

    pub fn bind(&self, ctx: &mut BindContext, ast: &AstExpr) -> Result<Expression> {
        match ast {
            AstExpr::Literal(value) => Ok(Expression::Literal(LiteralExpr {
                literal: value.clone(),
            })),
            AstExpr::Column { alias, name } => self.bind_column(ctx, alias.as_deref(), name),
            AstExpr::Binary { op, left, right } => self.bind_binary(ctx, *op, left, right),
            AstExpr::Call { name, args } => self.bind_call(ctx, name, args),
            AstExpr::Case { cases, else_expr } => self.bind_case(ctx, cases, else_expr.as_deref()),
            AstExpr::Cast { expr, datatype } => {
                let expr = self.bind(ctx, expr)?;
                Ok(CastExpr::try_new(expr, datatype.clone())?.into())
            }
            AstExpr::Index { expr, index } => {
                let expr = self.bind(ctx, expr)?;
                let index = self.bind(ctx, index)?;
                Ok(Expression::Index(IndexExpr::try_new(expr, index)?))
            }
            AstExpr::Subquery(query) => self.bind_subquery(ctx, query),
            AstExpr::Wildcard => Err(QuarryError::new(
                "'*' is only valid as a select item or inside count(*)",
            )),
        }
    }

    fn bind_column(
        &self,
        ctx: &mut BindContext,
        alias: Option<&str>,
        name: &str,
    ) -> Result<Expression> {
        match alias {
            Some(alias) => {
                let table_ref = match ctx.resolve_alias(self.scope, alias)? {
                    Some(table_ref) => table_ref,
                    None => {
                        if ctx.alias_visible_in_ancestors(self.scope, alias)? {
                            quarry_error::not_implemented!(
                                "correlated subquery reference to '{alias}'"
                            );
                        }
                        let names = ctx.names_in_scope(self.scope)?;
                        let mut err =
                            QuarryError::new(format!("Unknown table alias '{alias}'"));
                        if let Some(similar) = find_similar(alias, &names) {
                            err = err.with_field("did you mean", similar);
                        }
                        return Err(err);
                    }
                };

                let table = ctx.get_table(table_ref)?;
                let column = table
                    .column_names
                    .iter()
                    .position(|c| c.eq_ignore_ascii_case(name));
                match column {
                    Some(column) => Ok(Expression::Column(ColumnExpr {
                        table_ref,
                        column,
                        datatype: table.column_types[column].clone(),
                        nullable: table.column_nullable[column],
                    })),
                    None => {
                        let mut err = QuarryError::new(format!(
                            "Unknown column '{name}' on '{alias}'"
                        ));
                        if let Some(similar) = find_similar(name, &table.column_names) {
                            err = err.with_field("did you mean", similar);
                        }
                        Err(err)
                    }
                }
            }
            None => {
                let mut matches = Vec::new();
                for table_ref in ctx.tables_in_scope(self.scope)? {
                    let table = ctx.get_table(table_ref)?;
                    if let Some(column) = table
                        .column_names
                        .iter()
                        .position(|c| c.eq_ignore_ascii_case(name))
                    {
                        matches.push(ColumnExpr {
                            table_ref,
                            column,
                            datatype: table.column_types[column].clone(),
                            nullable: table.column_nullable[column],
                        });
                    }
                }

                match matches.len() {
                    1 => Ok(Expression::Column(matches.pop().unwrap())),
                    0 => {
                        if ctx.alias_visible_in_ancestors(self.scope, name)? {
                            quarry_error::not_implemented!(
                                "correlated subquery reference to '{name}'"
                            );
                        }
                        let names = ctx.names_in_scope(self.scope)?;
                        let mut err = QuarryError::new(format!("Unknown column '{name}'"));
                        if let Some(similar) = find_similar(name, &names) {
                            err = err.with_field("did you mean", similar);
                        }
                        Err(err)
                    }
                    _ => Err(QuarryError::new(format!(
                        "Ambiguous column '{name}', use a qualified name"
                    ))),
                }
            }
        }
    }

    fn bind_binary(
        &self,
        ctx: &mut BindContext,
        op: BinaryOperator,
        left: &AstExpr,
        right: &AstExpr,
    ) -> Result<Expression> {
        let left = self.bind(ctx, left)?;
        let right = self.bind(ctx, right)?;

        let expr = match op {
            BinaryOperator::And => {
                ConjunctionExpr::try_new(ConjunctionOperator::And, vec![left, right])?.into()
            }
            BinaryOperator::Or => {
                ConjunctionExpr::try_new(ConjunctionOperator::Or, vec![left, right])?.into()
            }
            BinaryOperator::Eq => comparison(ComparisonOperator::Eq, left, right)?,
            BinaryOperator::NotEq => comparison(ComparisonOperator::NotEq, left, right)?,
            BinaryOperator::Lt => comparison(ComparisonOperator::Lt, left, right)?,
            BinaryOperator::LtEq => comparison(ComparisonOperator::LtEq, left, right)?,
            BinaryOperator::Gt => comparison(ComparisonOperator::Gt, left, right)?,
            BinaryOperator::GtEq => comparison(ComparisonOperator::GtEq, left, right)?,
            BinaryOperator::Plus => arith(ArithOperator::Add, left, right)?,
            BinaryOperator::Minus => arith(ArithOperator::Sub, left, right)?,
            BinaryOperator::Multiply => arith(ArithOperator::Mul, left, right)?,
            BinaryOperator::Divide => arith(ArithOperator::Div, left, right)?,
            BinaryOperator::Modulo => arith(ArithOperator::Rem, left, right)?,
        };
        Ok(expr)
    }

    fn bind_call(&self, ctx: &mut BindContext, name: &str, args: &[AstExpr]) -> Result<Expression> {
        if self.registry.is_aggregate(name) {
            if !self.allow_aggregates {
                return Err(QuarryError::new(format!(
                    "Aggregate '{name}' is not allowed here"
                )));
            }

            // count(*) binds with no inputs.
            let inputs = if matches!(args, [AstExpr::Wildcard]) {
                Vec::new()
            } else {
                args.iter()
                    .map(|arg| self.bind(ctx, arg))
                    .collect::<Result<Vec<_>>>()?
            };

            if inputs.iter().any(|input| input.contains_aggregate()) {
                return Err(QuarryError::new("Aggregates cannot be nested"));
            }

            let input_types = inputs
                .iter()
                .map(|input| input.datatype())
                .collect::<Result<Vec<_>>>()?;
            let (agg, casts) = self.registry.resolve_aggregate(name, &input_types)?;
            let inputs = apply_casts(inputs, casts)?;

            return Ok(Expression::Aggregate(AggregateExpr { agg, inputs }));
        }

        let inputs = args
            .iter()
            .map(|arg| self.bind(ctx, arg))
            .collect::<Result<Vec<_>>>()?;
        let input_types = inputs
            .iter()
            .map(|input| input.datatype())
            .collect::<Result<Vec<_>>>()?;
        let (function, casts) = self.registry.resolve_scalar(name, &input_types)?;
        let inputs = apply_casts(inputs, casts)?;

        Ok(Expression::ScalarFunction(ScalarFunctionExpr {
            function,
            inputs,
        }))
    }

    fn bind_case(
        &self,
        ctx: &mut BindContext,
        cases: &[(AstExpr, AstExpr)],
        else_expr: Option<&AstExpr>,
    ) -> Result<Expression> {
        let mut bound_cases = Vec::with_capacity(cases.len());
        for (when, then) in cases {
            let when = self.bind(ctx, when)?;
            let when_type = when.datatype()?;
            if !matches!(when_type, DataType::Boolean | DataType::Null) {
                return Err(QuarryError::new(format!(
                    "WHEN condition must be a boolean, got {when_type}"
                )));
            }
            let then = self.bind(ctx, then)?;
            bound_cases.push(WhenThen { when, then });
        }

        let else_expr = else_expr
            .map(|expr| self.bind(ctx, expr).map(Box::new))
            .transpose()?;

        Ok(Expression::Case(CaseExpr::try_new(bound_cases, else_expr)?))
    }

    fn bind_subquery(&self, ctx: &mut BindContext, query: &QueryExpr) -> Result<Expression> {
        let child_scope = ctx.new_child_scope(self.scope);
        let binder = QueryBinder::new(child_scope, self.registry, self.provider);
        let bound = binder.bind(ctx, query)?;

        let table_ref = bound.output_table_ref();
        let table = ctx.get_table(table_ref)?;
        if table.num_columns() != 1 {
            return Err(QuarryError::new(format!(
                "Scalar subquery must return exactly one column, returns {}",
                table.num_columns()
            )));
        }
        let return_type = table.column_types[0].clone();
        let volatile = bound.any_expr_volatile()?;

        let subquery_ref = ctx.add_subquery(return_type.clone(), bound);
        Ok(Expression::Subquery(SubqueryExpr {
            subquery_ref,
            return_type,
            volatile,
        }))
    }
}

fn comparison(
    op: ComparisonOperator,
    left: Expression,
    right: Expression,
) -> Result<Expression> {
    Ok(ComparisonExpr::try_new(op, left, right)?.into())
}

fn arith(op: ArithOperator, left: Expression, right: Expression) -> Result<Expression> {
    Ok(ArithExpr::try_new(op, left, right)?.into())
}

fn apply_casts(inputs: Vec<Expression>, casts: Vec<Option<DataType>>) -> Result<Vec<Expression>> {
    inputs
        .into_iter()
        .zip(casts)
        .map(|(input, cast_to)| match cast_to {
            Some(to) => Ok(CastExpr::try_new(input, to)?.into()),
            None => Ok(input),
        })
        .collect()
}
