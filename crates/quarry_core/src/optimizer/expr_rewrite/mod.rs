pub mod const_fold;

use quarry_error::Result;

use self::const_fold::ConstFold;
use super::OptimizerRule;
use crate::expr::Expression;
use crate::logical::operator::LogicalOperator;

/// Rule for rewriting expressions in a plan.
pub trait ExpressionRewriteRule {
    fn rewrite(expression: Expression) -> Result<Expression>;
}

/// Applies expression rewrite rules to every expression in the plan.
#[derive(Debug)]
pub struct ExpressionRewriter;

impl OptimizerRule for ExpressionRewriter {
    fn name(&self) -> &'static str {
        "expression_rewrite"
    }

    fn optimize(&self, plan: LogicalOperator) -> Result<LogicalOperator> {
        plan.walk_mut(&mut |mut op| {
            op.for_each_expr_mut(&mut |expr| {
                expr.replace_with(|e| ConstFold::rewrite(e))?;
                Ok(())
            })?;
            Ok(op)
        })
    }
}
