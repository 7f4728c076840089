use std::fmt;

use quarry_error::{QuarryError, Result};

use super::Expression;
use super::cast_expr::CastExpr;
use super::literal_expr::LiteralExpr;
use crate::functions::implicit::common_type;
use crate::scalars::datatype::DataType;
use crate::scalars::value::ScalarValue;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct WhenThen {
    pub when: Expression,
    pub then: Expression,
}

impl fmt::Display for WhenThen {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "WHEN {} THEN {}", self.when, self.then)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CaseExpr {
    pub cases: Vec<WhenThen>,
    pub else_expr: Box<Expression>,
    pub datatype: DataType,
}

impl CaseExpr {
    pub fn try_new(mut cases: Vec<WhenThen>, else_expr: Option<Box<Expression>>) -> Result<Self> {
        if cases.is_empty() {
            return Err(QuarryError::new("CASE requires at least one WHEN branch"));
        }

        // Find the common output type across all branches, widening as
        // needed.
        let mut datatype = DataType::Null;
        for case in &cases {
            let case_datatype = case.then.datatype()?;
            datatype = common_type(&datatype, &case_datatype).ok_or_else(|| {
                QuarryError::new(format!(
                    "Case expression produces incompatible types: {datatype} and {case_datatype}"
                ))
            })?;
        }
        if let Some(else_expr) = &else_expr {
            let else_type = else_expr.datatype()?;
            datatype = common_type(&datatype, &else_type).ok_or_else(|| {
                QuarryError::new(format!(
                    "Case expression produces incompatible types: {datatype} and {else_type}"
                ))
            })?;
        }

        // Now cast every branch that isn't already the output type.
        for case in &mut cases {
            let case_datatype = case.then.datatype()?;
            if case_datatype != datatype {
                case.then.replace_with(|then| {
                    Ok(CastExpr::try_new(then, datatype.clone())?.into())
                })?;
            }
        }

        let else_expr = match else_expr {
            Some(expr) => {
                if expr.datatype()? != datatype {
                    Box::new(CastExpr::try_new(*expr, datatype.clone())?.into())
                } else {
                    expr
                }
            }
            // No "else" given; a null of the output type.
            None => Box::new(Expression::Literal(LiteralExpr {
                literal: ScalarValue::Null,
            })),
        };

        Ok(CaseExpr {
            cases,
            else_expr,
            datatype,
        })
    }
}

impl fmt::Display for CaseExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CASE ")?;
        for case in &self.cases {
            write!(f, "{case} ")?;
        }
        write!(f, "ELSE {}", self.else_expr)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::{eq, lit};

    #[test]
    fn branches_widen_to_common_type() {
        let cases = vec![
            WhenThen {
                when: eq(lit(1_i32), lit(1_i32)).unwrap().into(),
                then: lit(4_i32).into(),
            },
            WhenThen {
                when: eq(lit(2_i32), lit(2_i32)).unwrap().into(),
                then: lit(5_i64).into(),
            },
        ];
        let case = CaseExpr::try_new(cases, None).unwrap();
        assert_eq!(DataType::Int64, case.datatype);
    }

    #[test]
    fn incompatible_branches_error() {
        let cases = vec![
            WhenThen {
                when: eq(lit(1_i32), lit(1_i32)).unwrap().into(),
                then: lit(true).into(),
            },
            WhenThen {
                when: eq(lit(2_i32), lit(2_i32)).unwrap().into(),
                then: lit(5_i64).into(),
            },
        ];
        assert!(CaseExpr::try_new(cases, None).is_err());
    }
}
