//! Row-at-a-time expression evaluation.

use chrono::{DateTime, Months};
use quarry_error::{QuarryError, Result};

use super::ExecContext;
use crate::expr::Expression;
use crate::expr::arith_expr::ArithOperator;
use crate::expr::comparison_expr::ComparisonOperator;
use crate::expr::conjunction_expr::ConjunctionOperator;
use crate::functions::PlannedScalarFunction;
use crate::functions::cast::{CastFailBehavior, cast_value};
use crate::scalars::compare::{compare_values, date32_to_micros};
use crate::scalars::datatype::{DataType, DecimalTypeMeta};
use crate::scalars::interval::Interval;
use crate::scalars::row::Row;
use crate::scalars::value::ScalarValue;

/// A physical expression over a flat input row.
///
/// Column references are plain indexes; repeated pure subtrees are wrapped
/// in `Cached` reading a shared per-row slot.
#[derive(Debug, Clone)]
pub enum PhysicalExpr {
    Literal(ScalarValue),
    Column(usize),
    Arith {
        op: ArithOperator,
        datatype: DataType,
        left: Box<PhysicalExpr>,
        right: Box<PhysicalExpr>,
    },
    Comparison {
        op: ComparisonOperator,
        left: Box<PhysicalExpr>,
        right: Box<PhysicalExpr>,
    },
    Conjunction {
        op: ConjunctionOperator,
        inputs: Vec<PhysicalExpr>,
    },
    Cast {
        to: DataType,
        behavior: CastFailBehavior,
        input: Box<PhysicalExpr>,
    },
    Case {
        cases: Vec<(PhysicalExpr, PhysicalExpr)>,
        else_expr: Box<PhysicalExpr>,
    },
    ScalarFunction {
        function: PlannedScalarFunction,
        inputs: Vec<PhysicalExpr>,
    },
    Index {
        input: Box<PhysicalExpr>,
        index: Box<PhysicalExpr>,
    },
    Subquery {
        index: usize,
    },
    /// Evaluate the inner expression once per row; later occurrences with
    /// the same slot read the cached value.
    Cached {
        slot: usize,
        input: Box<PhysicalExpr>,
    },
}

/// Immutable evaluation blueprint for one row-evaluation scope.
#[derive(Debug, Clone)]
pub struct ExpressionEvaluator {
    exprs: Vec<PhysicalExpr>,
    slot_count: usize,
}

/// Per-stream mutable state: the common-subexpression cache, cleared at the
/// start of every row.
#[derive(Debug)]
pub struct EvalState {
    cache: Vec<Option<ScalarValue>>,
}

impl ExpressionEvaluator {
    pub fn new(exprs: Vec<PhysicalExpr>, slot_count: usize) -> Self {
        ExpressionEvaluator { exprs, slot_count }
    }

    pub fn num_exprs(&self) -> usize {
        self.exprs.len()
    }

    pub fn state(&self) -> EvalState {
        EvalState {
            cache: vec![None; self.slot_count],
        }
    }

    /// Evaluate every expression against the row, producing an output row.
    pub fn eval_row(
        &self,
        state: &mut EvalState,
        ctx: Option<&ExecContext>,
        row: &Row,
    ) -> Result<Row> {
        state.reset();
        let mut values = Vec::with_capacity(self.exprs.len());
        for expr in &self.exprs {
            values.push(eval(expr, state, ctx, row)?);
        }
        Ok(Row::new(values))
    }

    /// Evaluate a single-expression evaluator.
    pub fn eval_single(
        &self,
        state: &mut EvalState,
        ctx: Option<&ExecContext>,
        row: &Row,
    ) -> Result<ScalarValue> {
        state.reset();
        eval(&self.exprs[0], state, ctx, row)
    }

    /// Evaluate a predicate: true only for a non-null true. A null result is
    /// a non-match, not a fault.
    pub fn eval_predicate(
        &self,
        state: &mut EvalState,
        ctx: Option<&ExecContext>,
        row: &Row,
    ) -> Result<bool> {
        match self.eval_single(state, ctx, row)? {
            ScalarValue::Boolean(b) => Ok(b),
            ScalarValue::Null => Ok(false),
            other => Err(QuarryError::new(format!(
                "Predicate produced a non-boolean: {other}"
            ))),
        }
    }
}

impl EvalState {
    fn reset(&mut self) {
        for slot in &mut self.cache {
            *slot = None;
        }
    }
}

fn eval(
    expr: &PhysicalExpr,
    state: &mut EvalState,
    ctx: Option<&ExecContext>,
    row: &Row,
) -> Result<ScalarValue> {
    match expr {
        PhysicalExpr::Literal(value) => Ok(value.clone()),
        PhysicalExpr::Column(idx) => row
            .values
            .get(*idx)
            .cloned()
            .ok_or_else(|| QuarryError::new(format!("Row missing column {idx}"))),
        PhysicalExpr::Arith {
            op,
            datatype,
            left,
            right,
        } => {
            let left = eval(left, state, ctx, row)?;
            let right = eval(right, state, ctx, row)?;
            eval_arith(*op, datatype, &left, &right)
        }
        PhysicalExpr::Comparison { op, left, right } => {
            let left = eval(left, state, ctx, row)?;
            let right = eval(right, state, ctx, row)?;
            eval_comparison(*op, &left, &right)
        }
        PhysicalExpr::Conjunction { op, inputs } => {
            eval_conjunction(*op, inputs, state, ctx, row)
        }
        PhysicalExpr::Cast {
            to,
            behavior,
            input,
        } => {
            let value = eval(input, state, ctx, row)?;
            cast_value(&value, to, *behavior)
        }
        PhysicalExpr::Case { cases, else_expr } => {
            for (when, then) in cases {
                if matches!(eval(when, state, ctx, row)?, ScalarValue::Boolean(true)) {
                    return eval(then, state, ctx, row);
                }
            }
            eval(else_expr, state, ctx, row)
        }
        PhysicalExpr::ScalarFunction { function, inputs } => {
            let mut args = Vec::with_capacity(inputs.len());
            for input in inputs {
                args.push(eval(input, state, ctx, row)?);
            }
            // User function failures propagate unmodified and abort the
            // query.
            function.invoke(&args)
        }
        PhysicalExpr::Index { input, index } => {
            let value = eval(input, state, ctx, row)?;
            let index = eval(index, state, ctx, row)?;
            eval_index(&value, &index)
        }
        PhysicalExpr::Subquery { index } => {
            let ctx = ctx.ok_or_else(|| {
                QuarryError::new("Subquery cannot be evaluated without execution context")
            })?;
            ctx.subquery_value(*index)
        }
        PhysicalExpr::Cached { slot, input } => {
            if let Some(value) = &state.cache[*slot] {
                return Ok(value.clone());
            }
            let value = eval(input, state, ctx, row)?;
            state.cache[*slot] = Some(value.clone());
            Ok(value)
        }
    }
}

/// Evaluate a constant expression at compile time.
///
/// Surfaces out-of-range literal casts as compile-time errors during
/// constant folding.
pub fn const_eval(expr: &Expression) -> Result<ScalarValue> {
    let physical = plan_const_expr(expr)?;
    let evaluator = ExpressionEvaluator::new(vec![physical], 0);
    let mut state = evaluator.state();
    evaluator.eval_single(&mut state, None, &Row::default())
}

fn plan_const_expr(expr: &Expression) -> Result<PhysicalExpr> {
    Ok(match expr {
        Expression::Literal(e) => PhysicalExpr::Literal(e.literal.clone()),
        Expression::Arith(e) => PhysicalExpr::Arith {
            op: e.op,
            datatype: e.datatype.clone(),
            left: Box::new(plan_const_expr(&e.left)?),
            right: Box::new(plan_const_expr(&e.right)?),
        },
        Expression::Comparison(e) => PhysicalExpr::Comparison {
            op: e.op,
            left: Box::new(plan_const_expr(&e.left)?),
            right: Box::new(plan_const_expr(&e.right)?),
        },
        Expression::Conjunction(e) => PhysicalExpr::Conjunction {
            op: e.op,
            inputs: e
                .expressions
                .iter()
                .map(plan_const_expr)
                .collect::<Result<Vec<_>>>()?,
        },
        Expression::Cast(e) => PhysicalExpr::Cast {
            to: e.to.clone(),
            behavior: e.behavior,
            input: Box::new(plan_const_expr(&e.expr)?),
        },
        Expression::Case(e) => PhysicalExpr::Case {
            cases: e
                .cases
                .iter()
                .map(|c| Ok((plan_const_expr(&c.when)?, plan_const_expr(&c.then)?)))
                .collect::<Result<Vec<_>>>()?,
            else_expr: Box::new(plan_const_expr(&e.else_expr)?),
        },
        Expression::ScalarFunction(e) => PhysicalExpr::ScalarFunction {
            function: e.function.clone(),
            inputs: e
                .inputs
                .iter()
                .map(plan_const_expr)
                .collect::<Result<Vec<_>>>()?,
        },
        Expression::Index(e) => PhysicalExpr::Index {
            input: Box::new(plan_const_expr(&e.expr)?),
            index: Box::new(plan_const_expr(&e.index)?),
        },
        other => {
            return Err(QuarryError::new(format!(
                "Expression is not constant: {other}"
            )));
        }
    })
}

/// Numeric and temporal binary arithmetic with null propagation.
pub fn eval_arith(
    op: ArithOperator,
    datatype: &DataType,
    left: &ScalarValue,
    right: &ScalarValue,
) -> Result<ScalarValue> {
    if left.is_null() || right.is_null() {
        return Ok(ScalarValue::Null);
    }

    if let Some(value) = eval_temporal_arith(op, left, right)? {
        return Ok(value);
    }

    let (lv, ls) = left
        .as_decimal_parts()
        .ok_or_else(|| QuarryError::new(format!("Not a numeric value: {left}")))?;
    let (rv, rs) = right
        .as_decimal_parts()
        .ok_or_else(|| QuarryError::new(format!("Not a numeric value: {right}")))?;

    let target_scale = match datatype {
        DataType::Decimal64(m) | DataType::Decimal128(m) => m.scale,
        _ => 0,
    };

    let (value, scale) = match op {
        ArithOperator::Add => {
            let (lv, rv, s) = align_scales(lv, ls, rv, rs)?;
            (checked("addition", lv.checked_add(rv))?, s)
        }
        ArithOperator::Sub => {
            let (lv, rv, s) = align_scales(lv, ls, rv, rs)?;
            (checked("subtraction", lv.checked_sub(rv))?, s)
        }
        ArithOperator::Mul => (
            checked("multiplication", lv.checked_mul(rv))?,
            checked("multiplication", ls.checked_add(rs))?,
        ),
        ArithOperator::Div => {
            if rv == 0 {
                return Err(QuarryError::new("Division by zero"));
            }
            // Scale the dividend so the quotient lands on the target scale.
            let shift = (target_scale as i32) + (rs as i32) - (ls as i32);
            let lv = shift_scale(lv, shift)?;
            (lv / rv, target_scale)
        }
        ArithOperator::Rem => {
            if rv == 0 {
                return Err(QuarryError::new("Division by zero"));
            }
            let (lv, rv, s) = align_scales(lv, ls, rv, rs)?;
            (lv % rv, s)
        }
    };

    // Funnel through a wide decimal and cast into the expression's resolved
    // type; narrowing out of range errors rather than wrapping.
    let wide = ScalarValue::Decimal128 {
        value,
        meta: DecimalTypeMeta::new(38, scale),
    };
    cast_value(&wide, datatype, CastFailBehavior::Error)
}

fn checked<T>(what: &str, value: Option<T>) -> Result<T> {
    value.ok_or_else(|| QuarryError::new(format!("Numeric overflow in {what}")))
}

fn align_scales(lv: i128, ls: i8, rv: i128, rs: i8) -> Result<(i128, i128, i8)> {
    match ls.cmp(&rs) {
        std::cmp::Ordering::Equal => Ok((lv, rv, ls)),
        std::cmp::Ordering::Less => Ok((shift_scale(lv, (rs - ls) as i32)?, rv, rs)),
        std::cmp::Ordering::Greater => Ok((lv, shift_scale(rv, (ls - rs) as i32)?, ls)),
    }
}

fn shift_scale(value: i128, by: i32) -> Result<i128> {
    if by == 0 {
        return Ok(value);
    }
    if by > 0 {
        let pow = 10_i128
            .checked_pow(by as u32)
            .ok_or_else(|| QuarryError::new("Decimal scale overflow"))?;
        return value
            .checked_mul(pow)
            .ok_or_else(|| QuarryError::new("Numeric overflow in scaling"));
    }
    let pow = 10_i128
        .checked_pow(by.unsigned_abs())
        .ok_or_else(|| QuarryError::new("Decimal scale overflow"))?;
    Ok(value / pow)
}

fn eval_temporal_arith(
    op: ArithOperator,
    left: &ScalarValue,
    right: &ScalarValue,
) -> Result<Option<ScalarValue>> {
    use ScalarValue as V;

    let (micros, interval, negate) = match (left, right) {
        (V::TimestampTz(m), V::Interval(i)) => (*m, *i, matches!(op, ArithOperator::Sub)),
        (V::Date32(d), V::Interval(i)) => {
            (date32_to_micros(*d), *i, matches!(op, ArithOperator::Sub))
        }
        (V::Interval(i), V::TimestampTz(m)) => (*m, *i, false),
        (V::Interval(i), V::Date32(d)) => (date32_to_micros(*d), *i, false),
        (V::Interval(a), V::Interval(b)) => {
            let value = match op {
                ArithOperator::Add => {
                    Interval::new(a.months + b.months, a.days + b.days, a.nanos + b.nanos)
                }
                ArithOperator::Sub => {
                    Interval::new(a.months - b.months, a.days - b.days, a.nanos - b.nanos)
                }
                _ => return Ok(None),
            };
            return Ok(Some(V::Interval(value)));
        }
        _ => return Ok(None),
    };

    let interval = if negate {
        Interval::new(-interval.months, -interval.days, -interval.nanos)
    } else {
        interval
    };

    let dt = DateTime::from_timestamp_micros(micros)
        .ok_or_else(|| QuarryError::new("Timestamp out of range"))?;
    let dt = if interval.months >= 0 {
        dt.checked_add_months(Months::new(interval.months as u32))
    } else {
        dt.checked_sub_months(Months::new(interval.months.unsigned_abs()))
    }
    .ok_or_else(|| QuarryError::new("Timestamp out of range"))?;

    let micros = dt.timestamp_micros()
        + interval.days as i64 * 86_400_000_000
        + interval.nanos / 1_000;
    Ok(Some(V::TimestampTz(micros)))
}

/// Three-valued comparison: any null operand yields null.
pub fn eval_comparison(
    op: ComparisonOperator,
    left: &ScalarValue,
    right: &ScalarValue,
) -> Result<ScalarValue> {
    if left.is_null() || right.is_null() {
        return Ok(ScalarValue::Null);
    }

    let ord = compare_values(left, right)?;
    let result = match op {
        ComparisonOperator::Eq => ord.is_eq(),
        ComparisonOperator::NotEq => ord.is_ne(),
        ComparisonOperator::Lt => ord.is_lt(),
        ComparisonOperator::LtEq => ord.is_le(),
        ComparisonOperator::Gt => ord.is_gt(),
        ComparisonOperator::GtEq => ord.is_ge(),
    };
    Ok(ScalarValue::Boolean(result))
}

fn eval_conjunction(
    op: ConjunctionOperator,
    inputs: &[PhysicalExpr],
    state: &mut EvalState,
    ctx: Option<&ExecContext>,
    row: &Row,
) -> Result<ScalarValue> {
    let mut saw_null = false;
    for input in inputs {
        match eval(input, state, ctx, row)? {
            ScalarValue::Boolean(b) => match (op, b) {
                // Short circuits.
                (ConjunctionOperator::And, false) => return Ok(ScalarValue::Boolean(false)),
                (ConjunctionOperator::Or, true) => return Ok(ScalarValue::Boolean(true)),
                _ => (),
            },
            ScalarValue::Null => saw_null = true,
            other => {
                return Err(QuarryError::new(format!(
                    "Conjunction input produced a non-boolean: {other}"
                )));
            }
        }
    }

    if saw_null {
        return Ok(ScalarValue::Null);
    }
    Ok(ScalarValue::Boolean(matches!(op, ConjunctionOperator::And)))
}

fn eval_index(value: &ScalarValue, index: &ScalarValue) -> Result<ScalarValue> {
    if value.is_null() || index.is_null() {
        return Ok(ScalarValue::Null);
    }
    let list = match value {
        ScalarValue::List(vals) => vals,
        other => {
            return Err(QuarryError::new(format!(
                "Cannot index value of type {}",
                other.datatype()
            )));
        }
    };
    let idx = index
        .as_i128()
        .ok_or_else(|| QuarryError::new("Index must be an integer"))?;
    if idx < 0 {
        return Ok(ScalarValue::Null);
    }
    Ok(list.get(idx as usize).cloned().unwrap_or(ScalarValue::Null))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn arith_mixed_widths() {
        let got = eval_arith(
            ArithOperator::Add,
            &DataType::Int64,
            &ScalarValue::Int32(4),
            &ScalarValue::Int64(5),
        )
        .unwrap();
        assert_eq!(ScalarValue::Int64(9), got);
    }

    #[test]
    fn arith_null_propagates() {
        let got = eval_arith(
            ArithOperator::Add,
            &DataType::Int64,
            &ScalarValue::Null,
            &ScalarValue::Int64(5),
        )
        .unwrap();
        assert_eq!(ScalarValue::Null, got);
    }

    #[test]
    fn arith_decimal_scales() {
        let meta = DecimalTypeMeta::new(18, 2);
        // 1.50 + 2 = 3.50
        let got = eval_arith(
            ArithOperator::Add,
            &DataType::Decimal64(meta),
            &ScalarValue::Decimal64 { value: 150, meta },
            &ScalarValue::Int32(2),
        )
        .unwrap();
        assert_eq!(ScalarValue::Decimal64 { value: 350, meta }, got);
    }

    #[test]
    fn arith_division_by_zero() {
        let res = eval_arith(
            ArithOperator::Div,
            &DataType::Int64,
            &ScalarValue::Int64(1),
            &ScalarValue::Int64(0),
        );
        assert!(res.is_err());
    }

    #[test]
    fn timestamp_plus_interval_days() {
        let got = eval_arith(
            ArithOperator::Add,
            &DataType::TimestampTz,
            &ScalarValue::TimestampTz(0),
            &ScalarValue::Interval(Interval::new(0, 2, 0)),
        )
        .unwrap();
        assert_eq!(ScalarValue::TimestampTz(2 * 86_400_000_000), got);
    }

    #[test]
    fn comparison_null_is_null() {
        let got = eval_comparison(
            ComparisonOperator::Eq,
            &ScalarValue::Null,
            &ScalarValue::Null,
        )
        .unwrap();
        assert_eq!(ScalarValue::Null, got);
    }

    #[test]
    fn cached_slot_evaluated_once() {
        // Two occurrences of the same slot: second read must come from
        // cache. Observable via a counter-free proxy: literal is fine, just
        // check values match.
        let inner = PhysicalExpr::Arith {
            op: ArithOperator::Add,
            datatype: DataType::Int64,
            left: Box::new(PhysicalExpr::Column(0)),
            right: Box::new(PhysicalExpr::Literal(ScalarValue::Int64(1))),
        };
        let evaluator = ExpressionEvaluator::new(
            vec![
                PhysicalExpr::Cached {
                    slot: 0,
                    input: Box::new(inner.clone()),
                },
                PhysicalExpr::Cached {
                    slot: 0,
                    input: Box::new(inner),
                },
            ],
            1,
        );
        let mut state = evaluator.state();
        let row = Row::new(vec![ScalarValue::Int64(41)]);
        let out = evaluator.eval_row(&mut state, None, &row).unwrap();
        assert_eq!(
            vec![ScalarValue::Int64(42), ScalarValue::Int64(42)],
            out.values
        );
    }

    #[test]
    fn index_out_of_bounds_is_null() {
        let list = ScalarValue::List(vec![ScalarValue::Int32(1)]);
        let got = eval_index(&list, &ScalarValue::Int64(4)).unwrap();
        assert_eq!(ScalarValue::Null, got);
    }
}
