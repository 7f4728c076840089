use std::collections::VecDeque;
use std::fmt;

use ahash::RandomState;
use hashbrown::HashMap;
use quarry_error::Result;

use super::{PhysicalOperator, RowStream, collect_rows};
use crate::explain::{EntryBuilder, ExplainConfig, ExplainEntry, Explainable};
use crate::logical::logical_join::JoinType;
use crate::physical::ExecContext;
use crate::physical::evaluator::{EvalState, ExpressionEvaluator};
use crate::scalars::row::Row;
use crate::scalars::value::ScalarValue;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildSide {
    Left,
    Right,
}

impl fmt::Display for BuildSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Left => write!(f, "left"),
            Self::Right => write!(f, "right"),
        }
    }
}

/// Hash join.
///
/// The build side materializes fully into a multi-map before probing (the
/// dominant memory cost, traded for average O(1) lookup); the probe side
/// streams. Strategy selection always probes with the preserved side of an
/// outer join, so unmatched preserved rows emit during the probe sweep and
/// build-side rows never need a match flag.
///
/// Rows whose key tuple contains any null component never equi-match, per
/// SQL null semantics, and surface only through outer-join padding.
#[derive(Debug)]
pub struct HashJoinExec {
    pub left: Box<PhysicalOperator>,
    pub right: Box<PhysicalOperator>,
    pub join_type: JoinType,
    pub build_side: BuildSide,
    pub left_keys: ExpressionEvaluator,
    pub right_keys: ExpressionEvaluator,
    /// Residual predicate over the combined (left ++ right) row, evaluated
    /// per candidate pair before emitting.
    pub residual: Option<ExpressionEvaluator>,
    pub left_width: usize,
    pub right_width: usize,
}

impl HashJoinExec {
    pub fn open(&self, ctx: &ExecContext) -> Result<Box<dyn RowStream>> {
        let (build_op, build_keys, probe_op, probe_keys) = match self.build_side {
            BuildSide::Left => (&self.left, &self.left_keys, &self.right, &self.right_keys),
            BuildSide::Right => (&self.right, &self.right_keys, &self.left, &self.left_keys),
        };

        // Build phase: materialize and key the build side.
        let mut build_stream = build_op.open(ctx)?;
        let build_rows = collect_rows(build_stream.as_mut(), ctx)?;
        ctx.handle.check_canceled()?;

        let mut table: HashMap<Vec<ScalarValue>, Vec<usize>, RandomState> =
            HashMap::default();
        let mut key_state = build_keys.state();
        for (idx, row) in build_rows.iter().enumerate() {
            let key = build_keys.eval_row(&mut key_state, Some(ctx), row)?.values;
            // Null key components cannot equi-match any row; skip them. The
            // build side is never the preserved side, so they're dropped
            // entirely.
            if key.iter().any(ScalarValue::is_null) {
                continue;
            }
            table.entry(key).or_default().push(idx);
        }

        ctx.handle.check_canceled()?;

        let probe_preserved = match self.build_side {
            BuildSide::Left => self.join_type.preserves_right(),
            BuildSide::Right => self.join_type.preserves_left(),
        };

        Ok(Box::new(HashJoinStream {
            table,
            build_rows,
            probe: probe_op.open(ctx)?,
            probe_keys: probe_keys.clone(),
            probe_key_state: probe_keys.state(),
            residual: self.residual.clone(),
            residual_state: self.residual.as_ref().map(|r| r.state()),
            build_side: self.build_side,
            probe_preserved,
            build_width: match self.build_side {
                BuildSide::Left => self.left_width,
                BuildSide::Right => self.right_width,
            },
            pending: VecDeque::new(),
            ctx: ctx.clone(),
            probed: 0,
        }))
    }
}

impl Explainable for HashJoinExec {
    fn explain_entry(&self, conf: ExplainConfig) -> ExplainEntry {
        EntryBuilder::new("HashJoin", conf)
            .with_value("join_type", self.join_type)
            .with_value("build_side", self.build_side)
            .with_value("keys", self.left_keys.num_exprs())
            .build()
    }
}

struct HashJoinStream {
    table: HashMap<Vec<ScalarValue>, Vec<usize>, RandomState>,
    build_rows: Vec<Row>,
    probe: Box<dyn RowStream>,
    probe_keys: ExpressionEvaluator,
    probe_key_state: EvalState,
    residual: Option<ExpressionEvaluator>,
    residual_state: Option<EvalState>,
    build_side: BuildSide,
    probe_preserved: bool,
    build_width: usize,
    /// Output rows produced by the current probe row; a single probe may
    /// match many build rows.
    pending: VecDeque<Row>,
    ctx: ExecContext,
    probed: usize,
}

impl HashJoinStream {
    /// Combined output row in (left ++ right) order regardless of which side
    /// built.
    fn combined(&self, build_row: &Row, probe_row: &Row) -> Row {
        match self.build_side {
            BuildSide::Left => Row::concat(build_row, probe_row),
            BuildSide::Right => Row::concat(probe_row, build_row),
        }
    }

    fn padded(&self, probe_row: &Row) -> Row {
        let nulls = Row::nulls(self.build_width);
        self.combined(&nulls, probe_row)
    }

    fn probe_one(&mut self, probe_row: Row) -> Result<()> {
        let key = self
            .probe_keys
            .eval_row(&mut self.probe_key_state, Some(&self.ctx), &probe_row)?
            .values;

        // A null key component never matches. Key match alone isn't enough
        // either: a preserved row whose every key match fails the residual
        // still emits exactly once, padded.
        let mut emitted = false;
        if !key.iter().any(ScalarValue::is_null) {
            if let Some(candidates) = self.table.get(&key) {
                for build_idx in candidates {
                    let combined = self.combined(&self.build_rows[*build_idx], &probe_row);
                    let pass = match (&self.residual, &mut self.residual_state) {
                        (Some(residual), Some(state)) => {
                            residual.eval_predicate(state, Some(&self.ctx), &combined)?
                        }
                        _ => true,
                    };
                    if pass {
                        self.pending.push_back(combined);
                        emitted = true;
                    }
                }
            }
        }

        if !emitted && self.probe_preserved {
            self.pending.push_back(self.padded(&probe_row));
        }
        Ok(())
    }
}

impl RowStream for HashJoinStream {
    fn next_row(&mut self) -> Result<Option<Row>> {
        loop {
            if let Some(row) = self.pending.pop_front() {
                return Ok(Some(row));
            }

            match self.probe.next_row()? {
                None => return Ok(None),
                Some(probe_row) => {
                    self.ctx.check_canceled_every(self.probed)?;
                    self.probed += 1;
                    self.probe_one(probe_row)?;
                }
            }
        }
    }
}
