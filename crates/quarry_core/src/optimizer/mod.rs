pub mod common_subexpr;
pub mod distinct_to_group_by;
pub mod expr_rewrite;

use quarry_error::Result;

use self::distinct_to_group_by::DistinctToGroupBy;
use self::expr_rewrite::ExpressionRewriter;
use crate::logical::binder::bind_context::BindContext;
use crate::logical::operator::LogicalOperator;

/// A logical plan rewrite pass.
pub trait OptimizerRule {
    fn name(&self) -> &'static str;

    fn optimize(&self, plan: LogicalOperator) -> Result<LogicalOperator>;
}

/// Drives rewrite passes over a freshly built plan.
///
/// Passes mutate the owned tree in place; no whole-tree cloning happens
/// between passes.
#[derive(Debug, Default)]
pub struct Optimizer;

impl Optimizer {
    /// Optimize one plan tree.
    pub fn optimize(&self, mut plan: LogicalOperator) -> Result<LogicalOperator> {
        let rules: [&dyn OptimizerRule; 2] = [&ExpressionRewriter, &DistinctToGroupBy];
        for rule in rules {
            tracing::trace!(rule = rule.name(), "running optimizer rule");
            plan = rule.optimize(plan)?;
        }
        Ok(plan)
    }

    /// Optimize the plans of bound materializations and subqueries held in
    /// the context.
    pub fn optimize_context(&self, ctx: &mut BindContext) -> Result<()> {
        for idx in 0..ctx.materializations.len() {
            if let Some(plan) = ctx.materializations[idx].plan.take() {
                ctx.materializations[idx].plan = Some(self.optimize(plan)?);
            }
        }
        for idx in 0..ctx.subqueries.len() {
            if let Some(plan) = ctx.subqueries[idx].plan.take() {
                ctx.subqueries[idx].plan = Some(self.optimize(plan)?);
            }
        }
        Ok(())
    }
}
