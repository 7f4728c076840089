use indexmap::IndexMap;
use quarry_error::Result;

use super::{PhysicalOperator, RowStream};
use crate::explain::{EntryBuilder, ExplainConfig, ExplainEntry, Explainable};
use crate::functions::{AggregateState, PlannedAggregateFunction};
use crate::physical::ExecContext;
use crate::physical::evaluator::{EvalState, ExpressionEvaluator};
use crate::scalars::row::Row;
use crate::scalars::value::ScalarValue;

/// One aggregate: the resolved function plus the evaluator for its argument
/// expressions over the input row.
#[derive(Debug)]
pub struct PhysicalAggregate {
    pub function: PlannedAggregateFunction,
    pub inputs: ExpressionEvaluator,
}

/// Grouped aggregation.
///
/// Groups hash on their key values; unlike join equi-keys, null group keys
/// group together per SQL GROUP BY semantics. Output preserves first-seen
/// group order. With no group expressions a single global group emits
/// exactly one row, even over empty input.
#[derive(Debug)]
pub struct HashAggregateExec {
    pub input: Box<PhysicalOperator>,
    pub group_eval: Option<ExpressionEvaluator>,
    pub aggregates: Vec<PhysicalAggregate>,
}

impl HashAggregateExec {
    pub fn open(&self, ctx: &ExecContext) -> Result<Box<dyn RowStream>> {
        let rows = self.aggregate(ctx)?;
        Ok(Box::new(AggregateOutputStream { rows, next: 0 }))
    }

    fn aggregate(&self, ctx: &ExecContext) -> Result<Vec<Row>> {
        let mut input = self.input.open(ctx)?;

        let mut group_state = self.group_eval.as_ref().map(|e| e.state());
        let mut agg_states: Vec<EvalState> =
            self.aggregates.iter().map(|a| a.inputs.state()).collect();

        let mut groups: IndexMap<Vec<ScalarValue>, Vec<Box<dyn AggregateState>>> =
            IndexMap::new();

        // Global aggregation has its single group up front so empty input
        // still produces one output row.
        if self.group_eval.is_none() {
            groups.insert(Vec::new(), self.new_group());
        }

        let mut count = 0_usize;
        while let Some(row) = input.next_row()? {
            ctx.check_canceled_every(count)?;
            count += 1;

            let key = match (&self.group_eval, &mut group_state) {
                (Some(eval), Some(state)) => {
                    eval.eval_row(state, Some(ctx), &row)?.values
                }
                _ => Vec::new(),
            };

            let states = groups.entry(key).or_insert_with(|| self.new_group());
            for (agg, (state, eval_state)) in self
                .aggregates
                .iter()
                .zip(states.iter_mut().zip(agg_states.iter_mut()))
            {
                let args = agg.inputs.eval_row(eval_state, Some(ctx), &row)?;
                state.update(&args.values)?;
            }
        }

        ctx.handle.check_canceled()?;

        let mut out = Vec::with_capacity(groups.len());
        for (key, mut states) in groups {
            let mut values = key;
            for state in states.iter_mut() {
                values.push(state.finalize()?);
            }
            out.push(Row::new(values));
        }
        Ok(out)
    }

    fn new_group(&self) -> Vec<Box<dyn AggregateState>> {
        self.aggregates
            .iter()
            .map(|a| a.function.new_state())
            .collect()
    }
}

impl Explainable for HashAggregateExec {
    fn explain_entry(&self, conf: ExplainConfig) -> ExplainEntry {
        EntryBuilder::new("HashAggregate", conf)
            .with_values("aggregates", self.aggregates.iter().map(|a| a.function.name))
            .build()
    }
}

#[derive(Debug)]
struct AggregateOutputStream {
    rows: Vec<Row>,
    next: usize,
}

impl RowStream for AggregateOutputStream {
    fn next_row(&mut self) -> Result<Option<Row>> {
        let row = self.rows.get(self.next).cloned();
        self.next += 1;
        Ok(row)
    }
}
