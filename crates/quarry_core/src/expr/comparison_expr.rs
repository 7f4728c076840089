use std::fmt;

use quarry_error::{QuarryError, Result};

use super::Expression;
use super::cast_expr::CastExpr;
use crate::functions::cast::CastFailBehavior;
use crate::functions::implicit::common_type;
use crate::scalars::datatype::DataType;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ComparisonOperator {
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
}

impl ComparisonOperator {
    /// Flip the operator for when the sides of the comparison are swapped.
    ///
    /// E.g. 'a >= b' becomes 'b <= a'.
    pub const fn flip(self) -> Self {
        match self {
            Self::Eq => Self::Eq,
            Self::NotEq => Self::NotEq,
            Self::Lt => Self::Gt,
            Self::LtEq => Self::GtEq,
            Self::Gt => Self::Lt,
            Self::GtEq => Self::LtEq,
        }
    }

    pub const fn is_equality(self) -> bool {
        matches!(self, Self::Eq)
    }
}

impl fmt::Display for ComparisonOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Eq => write!(f, "="),
            Self::NotEq => write!(f, "<>"),
            Self::Lt => write!(f, "<"),
            Self::LtEq => write!(f, "<="),
            Self::Gt => write!(f, ">"),
            Self::GtEq => write!(f, ">="),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ComparisonExpr {
    pub op: ComparisonOperator,
    pub left: Box<Expression>,
    pub right: Box<Expression>,
}

impl ComparisonExpr {
    /// Create a comparison, coercing both sides to their common type.
    ///
    /// A string side compared against a typed side gets a lenient cast: a
    /// string that fails to parse becomes null at evaluation, making the row
    /// a non-match instead of a fault.
    pub fn try_new(op: ComparisonOperator, left: Expression, right: Expression) -> Result<Self> {
        let left_type = left.datatype()?;
        let right_type = right.datatype()?;

        let common = common_type(&left_type, &right_type).ok_or_else(|| {
            QuarryError::new(format!(
                "Cannot compare values of types {left_type} and {right_type}"
            ))
        })?;

        let left = coerce_side(left, &left_type, &common)?;
        let right = coerce_side(right, &right_type, &common)?;

        Ok(ComparisonExpr {
            op,
            left: Box::new(left),
            right: Box::new(right),
        })
    }

    /// Flips the sides of the comparison, including flipping the operator.
    pub fn flip_sides(&mut self) {
        self.op = self.op.flip();
        std::mem::swap(&mut self.left, &mut self.right);
    }
}

fn coerce_side(expr: Expression, have: &DataType, common: &DataType) -> Result<Expression> {
    if have == common {
        return Ok(expr);
    }
    let behavior = if matches!(have, DataType::Utf8) && !matches!(common, DataType::Utf8) {
        CastFailBehavior::Null
    } else {
        CastFailBehavior::Error
    };
    Ok(CastExpr::try_new_with_behavior(expr, common.clone(), behavior)?.into())
}

impl fmt::Display for ComparisonExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.left, self.op, self.right)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::{column, lit};

    #[test]
    fn coerces_to_common_type() {
        let cmp = ComparisonExpr::try_new(
            ComparisonOperator::Eq,
            column((0, 0), DataType::Int64).into(),
            lit(3_i32).into(),
        )
        .unwrap();
        // Literal side gets cast up to the column's type.
        assert_eq!(DataType::Int64, cmp.right.datatype().unwrap());
        assert!(matches!(cmp.right.as_ref(), Expression::Cast(_)));
    }

    #[test]
    fn string_side_gets_lenient_cast() {
        let cmp = ComparisonExpr::try_new(
            ComparisonOperator::Eq,
            column((0, 0), DataType::Date32).into(),
            lit("1992-10-11").into(),
        )
        .unwrap();
        match cmp.right.as_ref() {
            Expression::Cast(cast) => {
                assert_eq!(DataType::Date32, cast.to);
                assert_eq!(CastFailBehavior::Null, cast.behavior);
            }
            other => panic!("unexpected expr: {other}"),
        }
    }

    #[test]
    fn flip_sides_flips_operator() {
        let mut cmp = ComparisonExpr::try_new(
            ComparisonOperator::GtEq,
            lit(1_i32).into(),
            lit(2_i32).into(),
        )
        .unwrap();
        cmp.flip_sides();
        assert_eq!(ComparisonOperator::LtEq, cmp.op);
    }
}
