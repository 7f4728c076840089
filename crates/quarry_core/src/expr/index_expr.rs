use std::fmt;

use quarry_error::{QuarryError, Result};

use super::Expression;
use crate::scalars::datatype::DataType;

/// List subscript, `expr[index]`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct IndexExpr {
    pub expr: Box<Expression>,
    pub index: Box<Expression>,
    pub datatype: DataType,
}

impl IndexExpr {
    /// Create an index expression.
    ///
    /// Indexing a non-indexable type is a bind error, including nested cases
    /// where an inner index produces a non-list.
    pub fn try_new(expr: Expression, index: Expression) -> Result<Self> {
        let expr_type = expr.datatype()?;
        let elem = match &expr_type {
            DataType::List(elem) => elem.as_ref().clone(),
            other => {
                let mut err = QuarryError::new(format!("Cannot index value of type {other}"));
                if matches!(expr, Expression::Index(_)) {
                    err = err.with_field("context", "nested index on a non-list element");
                }
                return Err(err);
            }
        };

        let index_type = index.datatype()?;
        if !index_type.is_integer() && !index_type.is_null() {
            return Err(QuarryError::new(format!(
                "Index must be an integer, got {index_type}"
            )));
        }

        Ok(IndexExpr {
            expr: Box::new(expr),
            index: Box::new(index),
            datatype: elem,
        })
    }
}

impl fmt::Display for IndexExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[{}]", self.expr, self.index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::{column, lit};

    #[test]
    fn index_into_list() {
        let list_type = DataType::List(Box::new(DataType::Int32));
        let idx = IndexExpr::try_new(column((0, 0), list_type).into(), lit(0_i64).into()).unwrap();
        assert_eq!(DataType::Int32, idx.datatype);
    }

    #[test]
    fn index_non_indexable_errors() {
        let res = IndexExpr::try_new(column((0, 0), DataType::Int32).into(), lit(0_i64).into());
        assert!(res.is_err());
    }

    #[test]
    fn nested_index_absence_errors() {
        // Inner index yields Int32; the outer index has nothing to index.
        let list_type = DataType::List(Box::new(DataType::Int32));
        let inner =
            IndexExpr::try_new(column((0, 0), list_type).into(), lit(0_i64).into()).unwrap();
        let res = IndexExpr::try_new(Expression::Index(inner), lit(1_i64).into());
        assert!(res.is_err());
    }
}
