use std::fmt;

use quarry_error::{QuarryError, Result};

use super::Expression;
use crate::functions::cast::CastFailBehavior;
use crate::functions::implicit::implicit_cast_score;
use crate::scalars::datatype::DataType;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CastExpr {
    pub to: DataType,
    pub expr: Box<Expression>,
    pub behavior: CastFailBehavior,
}

impl CastExpr {
    /// Create a cast that errors on failure.
    pub fn try_new(expr: Expression, to: DataType) -> Result<Self> {
        Self::try_new_with_behavior(expr, to, CastFailBehavior::Error)
    }

    pub fn try_new_with_behavior(
        expr: Expression,
        to: DataType,
        behavior: CastFailBehavior,
    ) -> Result<Self> {
        let from = expr.datatype()?;
        if !can_cast(&from, &to) {
            return Err(QuarryError::new(format!("Cannot cast from {from} to {to}")));
        }
        Ok(CastExpr {
            to,
            expr: Box::new(expr),
            behavior,
        })
    }
}

/// Whether an explicit cast between the types exists.
///
/// Broader than the implicit table: explicit casts may narrow (range-checked
/// at evaluation) and may format anything to a string.
fn can_cast(from: &DataType, to: &DataType) -> bool {
    if from == to || from.is_null() {
        return true;
    }
    if matches!(to, DataType::Utf8) || matches!(from, DataType::Utf8) {
        return !matches!(from, DataType::List(_)) && !matches!(to, DataType::List(_));
    }
    if from.is_numeric() && to.is_numeric() {
        return true;
    }
    if implicit_cast_score(from.datatype_id(), to.datatype_id()).is_some() {
        return true;
    }
    // Timestamp to date truncates; explicit only.
    matches!((from, to), (DataType::TimestampTz, DataType::Date32))
}

impl fmt::Display for CastExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CAST({} TO {})", self.expr, self.to)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::lit;

    #[test]
    fn explicit_narrowing_allowed() {
        let cast = CastExpr::try_new(lit(300_i64).into(), DataType::Int8);
        // Construction succeeds; the range error surfaces at evaluation (or
        // during constant folding).
        assert!(cast.is_ok());
    }

    #[test]
    fn invalid_cast_rejected() {
        let res = CastExpr::try_new(lit(true).into(), DataType::Interval);
        assert!(res.is_err());
    }
}
