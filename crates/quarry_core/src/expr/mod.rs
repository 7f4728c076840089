pub mod aggregate_expr;
pub mod arith_expr;
pub mod case_expr;
pub mod cast_expr;
pub mod column_expr;
pub mod comparison_expr;
pub mod conjunction_expr;
pub mod index_expr;
pub mod literal_expr;
pub mod scalar_function_expr;
pub mod subquery_expr;

use std::collections::HashSet;
use std::fmt;

use quarry_error::Result;

use self::aggregate_expr::AggregateExpr;
use self::arith_expr::{ArithExpr, ArithOperator};
use self::case_expr::CaseExpr;
use self::cast_expr::CastExpr;
use self::column_expr::ColumnExpr;
use self::comparison_expr::{ComparisonExpr, ComparisonOperator};
use self::conjunction_expr::{ConjunctionExpr, ConjunctionOperator};
use self::index_expr::IndexExpr;
use self::literal_expr::LiteralExpr;
use self::scalar_function_expr::ScalarFunctionExpr;
use self::subquery_expr::SubqueryExpr;
use crate::functions::FunctionVolatility;
use crate::logical::binder::table_list::TableRef;
use crate::scalars::datatype::DataType;
use crate::scalars::value::ScalarValue;

/// A bound expression.
///
/// Every variant carries or derives its resolved datatype; once binding
/// completes, `datatype` is total over the tree. Structural equality and
/// hashing identify repeated subtrees for common subexpression analysis.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Expression {
    Aggregate(AggregateExpr),
    Arith(ArithExpr),
    Case(CaseExpr),
    Cast(CastExpr),
    Column(ColumnExpr),
    Comparison(ComparisonExpr),
    Conjunction(ConjunctionExpr),
    Index(IndexExpr),
    Literal(LiteralExpr),
    ScalarFunction(ScalarFunctionExpr),
    Subquery(SubqueryExpr),
}

impl Expression {
    pub fn datatype(&self) -> Result<DataType> {
        Ok(match self {
            Self::Aggregate(e) => e.agg.return_type.clone(),
            Self::Arith(e) => e.datatype.clone(),
            Self::Case(e) => e.datatype.clone(),
            Self::Cast(e) => e.to.clone(),
            Self::Column(e) => e.datatype.clone(),
            Self::Comparison(_) => DataType::Boolean,
            Self::Conjunction(_) => DataType::Boolean,
            Self::Index(e) => e.datatype.clone(),
            Self::Literal(e) => e.literal.datatype(),
            Self::ScalarFunction(e) => e.function.return_type.clone(),
            Self::Subquery(e) => e.return_type.clone(),
        })
    }

    /// Whether the expression may evaluate to null.
    ///
    /// Conservative: false only when provably non-null.
    pub fn nullable(&self) -> bool {
        match self {
            Self::Aggregate(e) => e.agg.name != "count",
            Self::Arith(e) => e.left.nullable() || e.right.nullable(),
            Self::Case(e) => {
                e.cases.iter().any(|c| c.then.nullable()) || e.else_expr.nullable()
            }
            Self::Cast(e) => {
                matches!(e.behavior, crate::functions::cast::CastFailBehavior::Null)
                    || e.expr.nullable()
            }
            Self::Column(e) => e.nullable,
            Self::Comparison(e) => e.left.nullable() || e.right.nullable(),
            Self::Conjunction(e) => e.expressions.iter().any(|e| e.nullable()),
            Self::Index(_) => true,
            Self::Literal(e) => e.literal.is_null(),
            Self::ScalarFunction(_) => true,
            Self::Subquery(_) => true,
        }
    }

    pub fn for_each_child<'a, F>(&'a self, func: &mut F) -> Result<()>
    where
        F: FnMut(&'a Expression) -> Result<()>,
    {
        match self {
            Self::Aggregate(e) => {
                for input in &e.inputs {
                    func(input)?;
                }
            }
            Self::Arith(e) => {
                func(&e.left)?;
                func(&e.right)?;
            }
            Self::Case(e) => {
                for case in &e.cases {
                    func(&case.when)?;
                    func(&case.then)?;
                }
                func(&e.else_expr)?;
            }
            Self::Cast(e) => func(&e.expr)?,
            Self::Column(_) | Self::Literal(_) | Self::Subquery(_) => (),
            Self::Comparison(e) => {
                func(&e.left)?;
                func(&e.right)?;
            }
            Self::Conjunction(e) => {
                for expr in &e.expressions {
                    func(expr)?;
                }
            }
            Self::Index(e) => {
                func(&e.expr)?;
                func(&e.index)?;
            }
            Self::ScalarFunction(e) => {
                for input in &e.inputs {
                    func(input)?;
                }
            }
        }
        Ok(())
    }

    pub fn for_each_child_mut<F>(&mut self, func: &mut F) -> Result<()>
    where
        F: FnMut(&mut Expression) -> Result<()>,
    {
        match self {
            Self::Aggregate(e) => {
                for input in &mut e.inputs {
                    func(input)?;
                }
            }
            Self::Arith(e) => {
                func(&mut e.left)?;
                func(&mut e.right)?;
            }
            Self::Case(e) => {
                for case in &mut e.cases {
                    func(&mut case.when)?;
                    func(&mut case.then)?;
                }
                func(&mut e.else_expr)?;
            }
            Self::Cast(e) => func(&mut e.expr)?,
            Self::Column(_) | Self::Literal(_) | Self::Subquery(_) => (),
            Self::Comparison(e) => {
                func(&mut e.left)?;
                func(&mut e.right)?;
            }
            Self::Conjunction(e) => {
                for expr in &mut e.expressions {
                    func(expr)?;
                }
            }
            Self::Index(e) => {
                func(&mut e.expr)?;
                func(&mut e.index)?;
            }
            Self::ScalarFunction(e) => {
                for input in &mut e.inputs {
                    func(input)?;
                }
            }
        }
        Ok(())
    }

    /// Replace self using the given function.
    pub fn replace_with<F>(&mut self, f: F) -> Result<()>
    where
        F: FnOnce(Expression) -> Result<Expression>,
    {
        let placeholder = Expression::Literal(LiteralExpr {
            literal: ScalarValue::Null,
        });
        let current = std::mem::replace(self, placeholder);
        *self = f(current)?;
        Ok(())
    }

    /// Collect the table refs of every column reference in this subtree.
    pub fn collect_table_refs(&self, refs: &mut HashSet<TableRef>) {
        if let Expression::Column(col) = self {
            refs.insert(col.table_ref);
        }
        let _ = self.for_each_child(&mut |child| {
            child.collect_table_refs(refs);
            Ok(())
        });
    }

    pub fn get_table_refs(&self) -> HashSet<TableRef> {
        let mut refs = HashSet::new();
        self.collect_table_refs(&mut refs);
        refs
    }

    /// True if any node in this subtree, at any depth, calls a function
    /// declared volatile.
    ///
    /// Registry-published non-determinism is layered on top of this by the
    /// common subexpression analysis.
    pub fn is_volatile(&self) -> bool {
        match self {
            Expression::ScalarFunction(f)
                if f.function.volatility() == FunctionVolatility::Volatile =>
            {
                return true;
            }
            Expression::Subquery(sub) if sub.volatile => return true,
            _ => (),
        }
        let mut volatile = false;
        let _ = self.for_each_child(&mut |child| {
            volatile = volatile || child.is_volatile();
            Ok(())
        });
        volatile
    }

    pub fn contains_aggregate(&self) -> bool {
        if matches!(self, Expression::Aggregate(_)) {
            return true;
        }
        let mut contains = false;
        let _ = self.for_each_child(&mut |child| {
            contains = contains || child.contains_aggregate();
            Ok(())
        });
        contains
    }

    /// True if this expression can be evaluated at compile time.
    pub fn is_const_foldable(&self) -> bool {
        match self {
            Self::Column(_) | Self::Aggregate(_) | Self::Subquery(_) => false,
            Self::ScalarFunction(f) => {
                f.function.volatility() == FunctionVolatility::Consistent
                    && f.inputs.iter().all(|e| e.is_const_foldable())
            }
            _ => {
                let mut foldable = true;
                let _ = self.for_each_child(&mut |child| {
                    foldable = foldable && child.is_const_foldable();
                    Ok(())
                });
                foldable
            }
        }
    }
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Aggregate(e) => e.fmt(f),
            Self::Arith(e) => e.fmt(f),
            Self::Case(e) => e.fmt(f),
            Self::Cast(e) => e.fmt(f),
            Self::Column(e) => e.fmt(f),
            Self::Comparison(e) => e.fmt(f),
            Self::Conjunction(e) => e.fmt(f),
            Self::Index(e) => e.fmt(f),
            Self::Literal(e) => e.fmt(f),
            Self::ScalarFunction(e) => e.fmt(f),
            Self::Subquery(e) => e.fmt(f),
        }
    }
}

impl From<LiteralExpr> for Expression {
    fn from(expr: LiteralExpr) -> Self {
        Expression::Literal(expr)
    }
}

impl From<ColumnExpr> for Expression {
    fn from(expr: ColumnExpr) -> Self {
        Expression::Column(expr)
    }
}

impl From<CastExpr> for Expression {
    fn from(expr: CastExpr) -> Self {
        Expression::Cast(expr)
    }
}

impl From<ComparisonExpr> for Expression {
    fn from(expr: ComparisonExpr) -> Self {
        Expression::Comparison(expr)
    }
}

impl From<ConjunctionExpr> for Expression {
    fn from(expr: ConjunctionExpr) -> Self {
        Expression::Conjunction(expr)
    }
}

impl From<ArithExpr> for Expression {
    fn from(expr: ArithExpr) -> Self {
        Expression::Arith(expr)
    }
}

// Expression builder helpers, mostly used by tests and rewrite rules.

pub fn lit(value: impl Into<ScalarValue>) -> LiteralExpr {
    LiteralExpr {
        literal: value.into(),
    }
}

pub fn column(table_col: (u32, usize), datatype: DataType) -> ColumnExpr {
    ColumnExpr {
        table_ref: TableRef(table_col.0),
        column: table_col.1,
        datatype,
        nullable: true,
    }
}

pub fn cast(expr: impl Into<Expression>, to: DataType) -> Result<CastExpr> {
    CastExpr::try_new(expr.into(), to)
}

pub fn add(left: impl Into<Expression>, right: impl Into<Expression>) -> Result<ArithExpr> {
    ArithExpr::try_new(ArithOperator::Add, left.into(), right.into())
}

pub fn sub(left: impl Into<Expression>, right: impl Into<Expression>) -> Result<ArithExpr> {
    ArithExpr::try_new(ArithOperator::Sub, left.into(), right.into())
}

pub fn mul(left: impl Into<Expression>, right: impl Into<Expression>) -> Result<ArithExpr> {
    ArithExpr::try_new(ArithOperator::Mul, left.into(), right.into())
}

pub fn eq(left: impl Into<Expression>, right: impl Into<Expression>) -> Result<ComparisonExpr> {
    ComparisonExpr::try_new(ComparisonOperator::Eq, left.into(), right.into())
}

pub fn gt(left: impl Into<Expression>, right: impl Into<Expression>) -> Result<ComparisonExpr> {
    ComparisonExpr::try_new(ComparisonOperator::Gt, left.into(), right.into())
}

pub fn lt(left: impl Into<Expression>, right: impl Into<Expression>) -> Result<ComparisonExpr> {
    ComparisonExpr::try_new(ComparisonOperator::Lt, left.into(), right.into())
}

pub fn and(exprs: impl IntoIterator<Item = Expression>) -> Result<ConjunctionExpr> {
    ConjunctionExpr::try_new(ConjunctionOperator::And, exprs.into_iter().collect())
}

pub fn or(exprs: impl IntoIterator<Item = Expression>) -> Result<ConjunctionExpr> {
    ConjunctionExpr::try_new(ConjunctionOperator::Or, exprs.into_iter().collect())
}
