use std::fmt;

use quarry_error::{QuarryError, Result};

use super::Expression;
use crate::scalars::datatype::DataType;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConjunctionOperator {
    And,
    Or,
}

impl fmt::Display for ConjunctionOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::And => write!(f, "AND"),
            Self::Or => write!(f, "OR"),
        }
    }
}

/// Variadic AND/OR.
///
/// Construction flattens directly nested conjunctions of the same operator,
/// so `(a AND b) AND c` becomes one node with three children. Decomposition
/// over top-level AND conjuncts relies on this.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ConjunctionExpr {
    pub op: ConjunctionOperator,
    pub expressions: Vec<Expression>,
}

impl ConjunctionExpr {
    pub fn try_new(op: ConjunctionOperator, expressions: Vec<Expression>) -> Result<Self> {
        if expressions.is_empty() {
            return Err(QuarryError::new("Conjunction requires at least one input"));
        }

        let mut flattened = Vec::with_capacity(expressions.len());
        for expr in expressions {
            let datatype = expr.datatype()?;
            if !matches!(datatype, DataType::Boolean | DataType::Null) {
                return Err(QuarryError::new(format!(
                    "Conjunction input must be a boolean, got {datatype}"
                )));
            }
            match expr {
                Expression::Conjunction(inner) if inner.op == op => {
                    flattened.extend(inner.expressions);
                }
                other => flattened.push(other),
            }
        }

        Ok(ConjunctionExpr {
            op,
            expressions: flattened,
        })
    }
}

impl fmt::Display for ConjunctionExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (idx, expr) in self.expressions.iter().enumerate() {
            if idx > 0 {
                write!(f, " {} ", self.op)?;
            }
            write!(f, "({expr})")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::{eq, lit};

    #[test]
    fn flattens_nested_same_op() {
        let a = eq(lit(1_i32), lit(1_i32)).unwrap().into();
        let b = eq(lit(2_i32), lit(2_i32)).unwrap().into();
        let c = eq(lit(3_i32), lit(3_i32)).unwrap().into();

        let inner: Expression = ConjunctionExpr::try_new(ConjunctionOperator::And, vec![a, b])
            .unwrap()
            .into();
        let outer =
            ConjunctionExpr::try_new(ConjunctionOperator::And, vec![inner, c]).unwrap();

        assert_eq!(3, outer.expressions.len());
    }

    #[test]
    fn or_not_flattened_into_and() {
        let a = eq(lit(1_i32), lit(1_i32)).unwrap().into();
        let b = eq(lit(2_i32), lit(2_i32)).unwrap().into();

        let inner: Expression = ConjunctionExpr::try_new(ConjunctionOperator::Or, vec![a, b])
            .unwrap()
            .into();
        let c = eq(lit(3_i32), lit(3_i32)).unwrap().into();
        let outer =
            ConjunctionExpr::try_new(ConjunctionOperator::And, vec![inner, c]).unwrap();

        assert_eq!(2, outer.expressions.len());
    }

    #[test]
    fn rejects_non_boolean() {
        let res = ConjunctionExpr::try_new(ConjunctionOperator::And, vec![lit(3_i32).into()]);
        assert!(res.is_err());
    }
}
