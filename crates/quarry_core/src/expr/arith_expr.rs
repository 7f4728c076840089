use std::fmt;

use quarry_error::{QuarryError, Result};

use super::Expression;
use super::cast_expr::CastExpr;
use crate::functions::implicit::common_type;
use crate::scalars::datatype::DataType;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArithOperator {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
}

impl fmt::Display for ArithOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Add => write!(f, "+"),
            Self::Sub => write!(f, "-"),
            Self::Mul => write!(f, "*"),
            Self::Div => write!(f, "/"),
            Self::Rem => write!(f, "%"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ArithExpr {
    pub op: ArithOperator,
    pub left: Box<Expression>,
    pub right: Box<Expression>,
    pub datatype: DataType,
}

impl ArithExpr {
    /// Create an arithmetic expression, coercing numeric operands to their
    /// common type.
    ///
    /// Date/timestamp plus interval is supported for Add/Sub without
    /// coercion of the interval side.
    pub fn try_new(op: ArithOperator, left: Expression, right: Expression) -> Result<Self> {
        let left_type = left.datatype()?;
        let right_type = right.datatype()?;

        // Temporal arithmetic keeps both sides as-is.
        if let Some(datatype) = temporal_result(op, &left_type, &right_type) {
            return Ok(ArithExpr {
                op,
                left: Box::new(left),
                right: Box::new(right),
                datatype,
            });
        }

        let common = common_type(&left_type, &right_type)
            .filter(|t| t.is_numeric() || t.is_null())
            .ok_or_else(|| {
                QuarryError::new(format!(
                    "Cannot apply '{op}' to types {left_type} and {right_type}"
                ))
            })?;

        let left = coerce_numeric(left, &left_type, &common)?;
        let right = coerce_numeric(right, &right_type, &common)?;

        Ok(ArithExpr {
            op,
            left: Box::new(left),
            right: Box::new(right),
            datatype: common,
        })
    }
}

fn temporal_result(op: ArithOperator, left: &DataType, right: &DataType) -> Option<DataType> {
    if !matches!(op, ArithOperator::Add | ArithOperator::Sub) {
        return None;
    }
    match (left, right) {
        (DataType::Date32, DataType::Interval) | (DataType::TimestampTz, DataType::Interval) => {
            Some(DataType::TimestampTz)
        }
        // Interval on the left only makes sense for addition.
        (DataType::Interval, DataType::Date32) | (DataType::Interval, DataType::TimestampTz)
            if matches!(op, ArithOperator::Add) =>
        {
            Some(DataType::TimestampTz)
        }
        (DataType::Interval, DataType::Interval) => Some(DataType::Interval),
        _ => None,
    }
}

fn coerce_numeric(expr: Expression, have: &DataType, common: &DataType) -> Result<Expression> {
    if have == common {
        return Ok(expr);
    }
    Ok(CastExpr::try_new(expr, common.clone())?.into())
}

impl fmt::Display for ArithExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.left, self.op, self.right)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::{column, lit};

    #[test]
    fn widens_to_common_type() {
        let arith = ArithExpr::try_new(
            ArithOperator::Add,
            column((0, 0), DataType::Int32).into(),
            lit(1_i64).into(),
        )
        .unwrap();
        assert_eq!(DataType::Int64, arith.datatype);
    }

    #[test]
    fn rejects_non_numeric() {
        let res = ArithExpr::try_new(
            ArithOperator::Mul,
            lit("abc").into(),
            lit(true).into(),
        );
        assert!(res.is_err());
    }

    #[test]
    fn timestamp_plus_interval() {
        let arith = ArithExpr::try_new(
            ArithOperator::Add,
            column((0, 0), DataType::TimestampTz).into(),
            column((0, 1), DataType::Interval).into(),
        )
        .unwrap();
        assert_eq!(DataType::TimestampTz, arith.datatype);
    }
}
