use quarry_error::Result;

use super::{PhysicalOperator, RowStream};
use crate::explain::{EntryBuilder, ExplainConfig, ExplainEntry, Explainable};
use crate::physical::ExecContext;
use crate::scalars::row::Row;

#[derive(Debug)]
pub struct LimitExec {
    pub input: Box<PhysicalOperator>,
    pub limit: u64,
}

impl LimitExec {
    pub fn open(&self, ctx: &ExecContext) -> Result<Box<dyn RowStream>> {
        Ok(Box::new(LimitStream {
            input: self.input.open(ctx)?,
            remaining: self.limit,
        }))
    }
}

impl Explainable for LimitExec {
    fn explain_entry(&self, conf: ExplainConfig) -> ExplainEntry {
        EntryBuilder::new("Limit", conf)
            .with_value("limit", self.limit)
            .build()
    }
}

struct LimitStream {
    input: Box<dyn RowStream>,
    remaining: u64,
}

impl RowStream for LimitStream {
    fn next_row(&mut self) -> Result<Option<Row>> {
        if self.remaining == 0 {
            return Ok(None);
        }
        match self.input.next_row()? {
            Some(row) => {
                self.remaining -= 1;
                Ok(Some(row))
            }
            None => Ok(None),
        }
    }
}
