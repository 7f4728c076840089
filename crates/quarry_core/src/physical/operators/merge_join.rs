use std::cmp::Ordering;

use quarry_error::Result;

use super::{PhysicalOperator, RowStream, collect_rows};
use crate::explain::{EntryBuilder, ExplainConfig, ExplainEntry, Explainable};
use crate::logical::logical_join::JoinType;
use crate::physical::ExecContext;
use crate::physical::evaluator::{EvalState, ExpressionEvaluator};
use crate::scalars::compare::sort_cmp_keys;
use crate::scalars::row::Row;
use crate::scalars::value::ScalarValue;

/// Sort-merge join.
///
/// Both sides materialize and sort eagerly by the key projection, then a
/// paired-pointer sweep groups equal keys, cross-producing within each group
/// and applying the residual per pair. Outer-unmatched handling mirrors hash
/// join: preserved rows emit exactly once with null opposite slots.
///
/// With `keys_are_equi` unset, the keys come from the residual's dominant
/// inequality operand: sorting still bounds nothing semantically, so the
/// sweep degrades to an ordered full scan evaluating the whole condition per
/// pair. Correct, at quadratic cost.
#[derive(Debug)]
pub struct MergeJoinExec {
    pub left: Box<PhysicalOperator>,
    pub right: Box<PhysicalOperator>,
    pub join_type: JoinType,
    pub left_keys: ExpressionEvaluator,
    pub right_keys: ExpressionEvaluator,
    pub keys_are_equi: bool,
    pub residual: Option<ExpressionEvaluator>,
    pub left_width: usize,
    pub right_width: usize,
}

struct Keyed {
    key: Vec<ScalarValue>,
    row: Row,
    matched: bool,
}

impl MergeJoinExec {
    pub fn open(&self, ctx: &ExecContext) -> Result<Box<dyn RowStream>> {
        // Materialize and sort both sides.
        let mut left = self.keyed_sorted(ctx, &self.left, &self.left_keys)?;
        ctx.handle.check_canceled()?;
        let mut right = self.keyed_sorted(ctx, &self.right, &self.right_keys)?;
        ctx.handle.check_canceled()?;

        let mut residual_state = self.residual.as_ref().map(|r| r.state());
        let mut output = Vec::new();

        if self.keys_are_equi {
            self.merge_sweep(ctx, &mut left, &mut right, &mut residual_state, &mut output)?;
        } else {
            self.ordered_scan(ctx, &mut left, &mut right, &mut residual_state, &mut output)?;
        }

        // Unmatched preserved rows emit once, padded.
        if self.join_type.preserves_left() {
            for entry in left.iter().filter(|e| !e.matched) {
                output.push(Row::concat(&entry.row, &Row::nulls(self.right_width)));
            }
        }
        if self.join_type.preserves_right() {
            for entry in right.iter().filter(|e| !e.matched) {
                output.push(Row::concat(&Row::nulls(self.left_width), &entry.row));
            }
        }

        Ok(Box::new(MergeJoinStream {
            rows: output,
            next: 0,
        }))
    }

    fn keyed_sorted(
        &self,
        ctx: &ExecContext,
        input: &PhysicalOperator,
        keys: &ExpressionEvaluator,
    ) -> Result<Vec<Keyed>> {
        let mut stream = input.open(ctx)?;
        let rows = collect_rows(stream.as_mut(), ctx)?;

        let mut state = keys.state();
        let mut keyed = Vec::with_capacity(rows.len());
        for row in rows {
            let key = keys.eval_row(&mut state, Some(ctx), &row)?.values;
            keyed.push(Keyed {
                key,
                row,
                matched: false,
            });
        }
        keyed.sort_by(|a, b| sort_cmp_keys(&a.key, &b.key));
        Ok(keyed)
    }

    fn eval_residual(
        &self,
        ctx: &ExecContext,
        state: &mut Option<EvalState>,
        combined: &Row,
    ) -> Result<bool> {
        match (&self.residual, state) {
            (Some(residual), Some(state)) => residual.eval_predicate(state, Some(ctx), combined),
            _ => Ok(true),
        }
    }

    fn merge_sweep(
        &self,
        ctx: &ExecContext,
        left: &mut [Keyed],
        right: &mut [Keyed],
        residual_state: &mut Option<EvalState>,
        output: &mut Vec<Row>,
    ) -> Result<()> {
        let mut i = 0;
        let mut j = 0;

        while i < left.len() && j < right.len() {
            ctx.handle.check_canceled()?;

            // Null key components never equi-match; nulls sort last, so the
            // rest of that side only pads.
            if has_null_key(&left[i]) {
                i += 1;
                continue;
            }
            if has_null_key(&right[j]) {
                j += 1;
                continue;
            }

            match sort_cmp_keys(&left[i].key, &right[j].key) {
                Ordering::Less => i += 1,
                Ordering::Greater => j += 1,
                Ordering::Equal => {
                    // Group equal keys on both sides, cross-produce within
                    // the group.
                    let i_end = group_end(left, i);
                    let j_end = group_end(right, j);

                    for l in i..i_end {
                        for r in j..j_end {
                            let combined = Row::concat(&left[l].row, &right[r].row);
                            if self.eval_residual(ctx, residual_state, &combined)? {
                                left[l].matched = true;
                                right[r].matched = true;
                                output.push(combined);
                            }
                        }
                    }

                    i = i_end;
                    j = j_end;
                }
            }
        }
        Ok(())
    }

    /// Full pairwise evaluation in sorted order, for derived non-equi keys.
    fn ordered_scan(
        &self,
        ctx: &ExecContext,
        left: &mut [Keyed],
        right: &mut [Keyed],
        residual_state: &mut Option<EvalState>,
        output: &mut Vec<Row>,
    ) -> Result<()> {
        for l in left.iter_mut() {
            ctx.handle.check_canceled()?;
            for r in right.iter_mut() {
                let combined = Row::concat(&l.row, &r.row);
                if self.eval_residual(ctx, residual_state, &combined)? {
                    l.matched = true;
                    r.matched = true;
                    output.push(combined);
                }
            }
        }
        Ok(())
    }
}

fn has_null_key(entry: &Keyed) -> bool {
    entry.key.iter().any(ScalarValue::is_null)
}

fn group_end(entries: &[Keyed], start: usize) -> usize {
    let mut end = start + 1;
    while end < entries.len()
        && sort_cmp_keys(&entries[start].key, &entries[end].key) == Ordering::Equal
    {
        end += 1;
    }
    end
}

impl Explainable for MergeJoinExec {
    fn explain_entry(&self, conf: ExplainConfig) -> ExplainEntry {
        EntryBuilder::new("MergeJoin", conf)
            .with_value("join_type", self.join_type)
            .with_value("keys", self.left_keys.num_exprs())
            .with_value("equi", self.keys_are_equi)
            .build()
    }
}

#[derive(Debug)]
struct MergeJoinStream {
    rows: Vec<Row>,
    next: usize,
}

impl RowStream for MergeJoinStream {
    fn next_row(&mut self) -> Result<Option<Row>> {
        let row = self.rows.get(self.next).cloned();
        self.next += 1;
        Ok(row)
    }
}
