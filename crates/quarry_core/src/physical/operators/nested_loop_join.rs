use quarry_error::Result;

use super::{PhysicalOperator, RowStream, collect_rows};
use crate::explain::{EntryBuilder, ExplainConfig, ExplainEntry, Explainable};
use crate::logical::logical_join::JoinType;
use crate::physical::ExecContext;
use crate::physical::evaluator::{EvalState, ExpressionEvaluator};
use crate::scalars::row::Row;

/// Nested-loop join: full O(|left| * |right|) pair evaluation.
///
/// The only strategy needing no key; used as the fallback, and for cross
/// joins (no condition). The left side streams with pay-as-you-go memory;
/// the right side materializes once.
#[derive(Debug)]
pub struct NestedLoopJoinExec {
    pub left: Box<PhysicalOperator>,
    pub right: Box<PhysicalOperator>,
    pub join_type: JoinType,
    /// Full join condition over the combined row. None for cross joins.
    pub condition: Option<ExpressionEvaluator>,
    pub left_width: usize,
    pub right_width: usize,
}

impl NestedLoopJoinExec {
    pub fn open(&self, ctx: &ExecContext) -> Result<Box<dyn RowStream>> {
        let mut right_stream = self.right.open(ctx)?;
        let right_rows = collect_rows(right_stream.as_mut(), ctx)?;
        ctx.handle.check_canceled()?;

        let right_matched = vec![false; right_rows.len()];
        Ok(Box::new(NestedLoopJoinStream {
            left: self.left.open(ctx)?,
            right_rows,
            right_matched,
            join_type: self.join_type,
            condition: self.condition.clone(),
            condition_state: self.condition.as_ref().map(|c| c.state()),
            left_width: self.left_width,
            right_width: self.right_width,
            current_left: None,
            right_idx: 0,
            current_matched: false,
            draining_right: false,
            drain_idx: 0,
            ctx: ctx.clone(),
        }))
    }
}

impl Explainable for NestedLoopJoinExec {
    fn explain_entry(&self, conf: ExplainConfig) -> ExplainEntry {
        EntryBuilder::new("NestedLoopJoin", conf)
            .with_value("join_type", self.join_type)
            .build()
    }
}

struct NestedLoopJoinStream {
    left: Box<dyn RowStream>,
    right_rows: Vec<Row>,
    /// Match flags for right rows, drained for RIGHT OUTER padding.
    right_matched: Vec<bool>,
    join_type: JoinType,
    condition: Option<ExpressionEvaluator>,
    condition_state: Option<EvalState>,
    left_width: usize,
    right_width: usize,
    current_left: Option<Row>,
    right_idx: usize,
    current_matched: bool,
    draining_right: bool,
    drain_idx: usize,
    ctx: ExecContext,
}

impl RowStream for NestedLoopJoinStream {
    fn next_row(&mut self) -> Result<Option<Row>> {
        loop {
            if self.draining_right {
                // Emit unmatched right rows once each, null left slots.
                while self.drain_idx < self.right_rows.len() {
                    let idx = self.drain_idx;
                    self.drain_idx += 1;
                    if !self.right_matched[idx] {
                        let nulls = Row::nulls(self.left_width);
                        return Ok(Some(Row::concat(&nulls, &self.right_rows[idx])));
                    }
                }
                return Ok(None);
            }

            let left_row = match &self.current_left {
                Some(row) => row.clone(),
                None => match self.left.next_row()? {
                    Some(row) => {
                        self.ctx.handle.check_canceled()?;
                        self.current_left = Some(row.clone());
                        self.right_idx = 0;
                        self.current_matched = false;
                        row
                    }
                    None => {
                        if self.join_type.preserves_right() {
                            self.draining_right = true;
                            continue;
                        }
                        return Ok(None);
                    }
                },
            };

            while self.right_idx < self.right_rows.len() {
                let idx = self.right_idx;
                self.right_idx += 1;

                let combined = Row::concat(&left_row, &self.right_rows[idx]);
                let pass = match (&self.condition, &mut self.condition_state) {
                    (Some(condition), Some(state)) => {
                        condition.eval_predicate(state, Some(&self.ctx), &combined)?
                    }
                    _ => true,
                };
                if pass {
                    self.current_matched = true;
                    self.right_matched[idx] = true;
                    return Ok(Some(combined));
                }
            }

            // Left row exhausted the right side.
            let matched = self.current_matched;
            self.current_left = None;
            if !matched && self.join_type.preserves_left() {
                let nulls = Row::nulls(self.right_width);
                return Ok(Some(Row::concat(&left_row, &nulls)));
            }
        }
    }
}
