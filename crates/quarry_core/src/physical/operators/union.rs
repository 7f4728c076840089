use std::collections::HashSet;

use quarry_error::Result;

use super::{PhysicalOperator, RowStream};
use crate::explain::{EntryBuilder, ExplainConfig, ExplainEntry, Explainable};
use crate::functions::cast::{CastFailBehavior, cast_value};
use crate::physical::ExecContext;
use crate::scalars::datatype::DataType;
use crate::scalars::row::Row;
use crate::scalars::value::ScalarValue;

/// UNION / UNION ALL over two inputs.
///
/// Branch rows are cast to the reconciled output types decided at bind time.
/// The distinct form deduplicates on full rows, preserving first-seen order.
#[derive(Debug)]
pub struct UnionExec {
    pub left: Box<PhysicalOperator>,
    pub right: Box<PhysicalOperator>,
    pub all: bool,
    pub output_types: Vec<DataType>,
}

impl UnionExec {
    pub fn open(&self, ctx: &ExecContext) -> Result<Box<dyn RowStream>> {
        Ok(Box::new(UnionStream {
            left: Some(self.left.open(ctx)?),
            right: Some(self.right.open(ctx)?),
            all: self.all,
            output_types: self.output_types.clone(),
            seen: HashSet::new(),
        }))
    }
}

impl Explainable for UnionExec {
    fn explain_entry(&self, conf: ExplainConfig) -> ExplainEntry {
        EntryBuilder::new("Union", conf)
            .with_value("all", self.all)
            .build()
    }
}

struct UnionStream {
    left: Option<Box<dyn RowStream>>,
    right: Option<Box<dyn RowStream>>,
    all: bool,
    output_types: Vec<DataType>,
    seen: HashSet<Vec<ScalarValue>>,
}

impl UnionStream {
    fn next_input_row(&mut self) -> Result<Option<Row>> {
        if let Some(left) = &mut self.left {
            if let Some(row) = left.next_row()? {
                return Ok(Some(row));
            }
            self.left = None;
        }
        if let Some(right) = &mut self.right {
            if let Some(row) = right.next_row()? {
                return Ok(Some(row));
            }
            self.right = None;
        }
        Ok(None)
    }
}

impl RowStream for UnionStream {
    fn next_row(&mut self) -> Result<Option<Row>> {
        while let Some(row) = self.next_input_row()? {
            let mut values = Vec::with_capacity(row.width());
            for (value, datatype) in row.values.iter().zip(self.output_types.iter()) {
                values.push(cast_value(value, datatype, CastFailBehavior::Error)?);
            }

            if !self.all && !self.seen.insert(values.clone()) {
                continue;
            }
            return Ok(Some(Row::new(values)));
        }
        Ok(None)
    }
}
