use quarry_error::Result;

use super::ExpressionRewriteRule;
use crate::expr::Expression;
use crate::expr::literal_expr::LiteralExpr;
use crate::physical::evaluator::const_eval;

/// Pre-compute constant expressions.
///
/// Also the point where a literal outside its cast target's range becomes a
/// compile-time error rather than a runtime one.
#[derive(Debug)]
pub struct ConstFold;

impl ExpressionRewriteRule for ConstFold {
    fn rewrite(mut expression: Expression) -> Result<Expression> {
        maybe_fold(&mut expression)?;
        Ok(expression)
    }
}

fn maybe_fold(expr: &mut Expression) -> Result<()> {
    if matches!(expr, Expression::Literal(_)) {
        return Ok(());
    }

    if expr.is_const_foldable() {
        let literal = const_eval(expr)?;
        *expr = Expression::Literal(LiteralExpr { literal });
        return Ok(());
    }

    // Return early for CASE to avoid evaluating a THEN branch that's never
    // reached.
    if matches!(expr, Expression::Case(_)) {
        return Ok(());
    }

    expr.for_each_child_mut(&mut maybe_fold)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::{add, and, cast, column, lit};
    use crate::scalars::datatype::DataType;
    use crate::scalars::value::ScalarValue;

    #[test]
    fn no_fold_literal() {
        let expr: Expression = lit("a").into();
        let expected = expr.clone();
        let got = ConstFold::rewrite(expr).unwrap();
        assert_eq!(expected, got);
    }

    #[test]
    fn fold_add_numbers() {
        let expr: Expression = add(lit(4_i32), lit(5_i32)).unwrap().into();
        let got = ConstFold::rewrite(expr).unwrap();
        assert_eq!(Expression::from(lit(9_i32)), got);
    }

    #[test]
    fn fold_and_true_false() {
        let expr: Expression = and([lit(true).into(), lit(false).into()]).unwrap().into();
        let got = ConstFold::rewrite(expr).unwrap();
        assert_eq!(Expression::from(lit(false)), got);
    }

    #[test]
    fn fold_string_to_date_cast() {
        let expr: Expression = cast(lit("1992-10-11"), DataType::Date32).unwrap().into();
        let got = ConstFold::rewrite(expr).unwrap();
        assert_eq!(
            Expression::Literal(crate::expr::literal_expr::LiteralExpr {
                literal: ScalarValue::Date32(8319)
            }),
            got
        );
    }

    #[test]
    fn partial_fold_with_col_ref() {
        let expr: Expression = add(
            column((0, 1), DataType::Int32),
            add(lit(4_i32), lit(5_i32)).unwrap(),
        )
        .unwrap()
        .into();

        // 4 + 5 => 9
        let expected: Expression = add(column((0, 1), DataType::Int32), lit(9_i32))
            .unwrap()
            .into();

        let got = ConstFold::rewrite(expr).unwrap();
        assert_eq!(expected, got);
    }

    #[test]
    fn out_of_range_literal_is_compile_error() {
        let expr: Expression = cast(lit(300_i64), DataType::Int8).unwrap().into();
        assert!(ConstFold::rewrite(expr).is_err());
    }
}
