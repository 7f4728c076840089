use std::cmp::Ordering;

use quarry_error::Result;

use super::{PhysicalOperator, RowStream, collect_rows};
use crate::explain::{EntryBuilder, ExplainConfig, ExplainEntry, Explainable};
use crate::physical::ExecContext;
use crate::physical::evaluator::ExpressionEvaluator;
use crate::scalars::compare::sort_cmp;
use crate::scalars::row::Row;

/// Full materializing sort. Nulls sort last regardless of direction.
#[derive(Debug)]
pub struct SortExec {
    pub input: Box<PhysicalOperator>,
    pub key_eval: ExpressionEvaluator,
    pub desc: Vec<bool>,
}

impl SortExec {
    pub fn open(&self, ctx: &ExecContext) -> Result<Box<dyn RowStream>> {
        let mut input = self.input.open(ctx)?;
        let rows = collect_rows(input.as_mut(), ctx)?;

        ctx.handle.check_canceled()?;

        let mut state = self.key_eval.state();
        let mut keyed = Vec::with_capacity(rows.len());
        for row in rows {
            let key = self.key_eval.eval_row(&mut state, Some(ctx), &row)?.values;
            keyed.push((key, row));
        }

        keyed.sort_by(|(a, _), (b, _)| {
            for ((l, r), desc) in a.iter().zip(b.iter()).zip(self.desc.iter()) {
                let ord = sort_cmp(l, r);
                // Keep nulls last even when descending.
                let ord = if *desc && !l.is_null() && !r.is_null() {
                    ord.reverse()
                } else {
                    ord
                };
                if ord != Ordering::Equal {
                    return ord;
                }
            }
            Ordering::Equal
        });

        ctx.handle.check_canceled()?;

        Ok(Box::new(SortedStream {
            rows: keyed.into_iter().map(|(_, row)| row).collect(),
            next: 0,
        }))
    }
}

impl Explainable for SortExec {
    fn explain_entry(&self, conf: ExplainConfig) -> ExplainEntry {
        EntryBuilder::new("Sort", conf)
            .with_value("keys", self.key_eval.num_exprs())
            .build()
    }
}

#[derive(Debug)]
struct SortedStream {
    rows: Vec<Row>,
    next: usize,
}

impl RowStream for SortedStream {
    fn next_row(&mut self) -> Result<Option<Row>> {
        let row = self.rows.get(self.next).cloned();
        self.next += 1;
        Ok(row)
    }
}
