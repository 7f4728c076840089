use quarry_error::Result;

use super::{PhysicalOperator, RowStream};
use crate::explain::{EntryBuilder, ExplainConfig, ExplainEntry, Explainable};
use crate::physical::ExecContext;
use crate::physical::evaluator::{EvalState, ExpressionEvaluator};
use crate::scalars::row::Row;

#[derive(Debug)]
pub struct ProjectExec {
    pub input: Box<PhysicalOperator>,
    pub evaluator: ExpressionEvaluator,
}

impl ProjectExec {
    pub fn open(&self, ctx: &ExecContext) -> Result<Box<dyn RowStream>> {
        Ok(Box::new(ProjectStream {
            input: self.input.open(ctx)?,
            evaluator: self.evaluator.clone(),
            state: self.evaluator.state(),
            ctx: ctx.clone(),
        }))
    }
}

impl Explainable for ProjectExec {
    fn explain_entry(&self, conf: ExplainConfig) -> ExplainEntry {
        EntryBuilder::new("Project", conf)
            .with_value("expressions", self.evaluator.num_exprs())
            .build()
    }
}

struct ProjectStream {
    input: Box<dyn RowStream>,
    evaluator: ExpressionEvaluator,
    state: EvalState,
    ctx: ExecContext,
}

impl RowStream for ProjectStream {
    fn next_row(&mut self) -> Result<Option<Row>> {
        match self.input.next_row()? {
            Some(row) => Ok(Some(self.evaluator.eval_row(
                &mut self.state,
                Some(&self.ctx),
                &row,
            )?)),
            None => Ok(None),
        }
    }
}
