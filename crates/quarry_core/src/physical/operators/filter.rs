use quarry_error::Result;

use super::{PhysicalOperator, RowStream};
use crate::explain::{EntryBuilder, ExplainConfig, ExplainEntry, Explainable};
use crate::physical::ExecContext;
use crate::physical::evaluator::{EvalState, ExpressionEvaluator};
use crate::scalars::row::Row;

#[derive(Debug)]
pub struct FilterExec {
    pub input: Box<PhysicalOperator>,
    pub predicate: ExpressionEvaluator,
}

impl FilterExec {
    pub fn open(&self, ctx: &ExecContext) -> Result<Box<dyn RowStream>> {
        Ok(Box::new(FilterStream {
            input: self.input.open(ctx)?,
            predicate: self.predicate.clone(),
            state: self.predicate.state(),
            ctx: ctx.clone(),
        }))
    }
}

impl Explainable for FilterExec {
    fn explain_entry(&self, conf: ExplainConfig) -> ExplainEntry {
        EntryBuilder::new("Filter", conf).build()
    }
}

struct FilterStream {
    input: Box<dyn RowStream>,
    predicate: ExpressionEvaluator,
    state: EvalState,
    ctx: ExecContext,
}

impl RowStream for FilterStream {
    fn next_row(&mut self) -> Result<Option<Row>> {
        while let Some(row) = self.input.next_row()? {
            if self
                .predicate
                .eval_predicate(&mut self.state, Some(&self.ctx), &row)?
            {
                return Ok(Some(row));
            }
        }
        Ok(None)
    }
}
