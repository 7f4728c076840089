use std::sync::Arc;

use quarry_error::{QuarryError, Result};

use super::RowStream;
use crate::catalog::{RowSource, SourceRows};
use crate::explain::{EntryBuilder, ExplainConfig, ExplainEntry, Explainable};
use crate::physical::ExecContext;
use crate::scalars::row::Row;

/// Produces exactly one empty row.
#[derive(Debug)]
pub struct SingleRowExec;

impl SingleRowExec {
    pub fn open(&self, _ctx: &ExecContext) -> Result<Box<dyn RowStream>> {
        Ok(Box::new(SingleRowStream { emitted: false }))
    }
}

impl Explainable for SingleRowExec {
    fn explain_entry(&self, conf: ExplainConfig) -> ExplainEntry {
        EntryBuilder::new("SingleRow", conf).build()
    }
}

#[derive(Debug)]
struct SingleRowStream {
    emitted: bool,
}

impl RowStream for SingleRowStream {
    fn next_row(&mut self) -> Result<Option<Row>> {
        if self.emitted {
            return Ok(None);
        }
        self.emitted = true;
        Ok(Some(Row::default()))
    }
}

/// Scan of an external row source.
#[derive(Debug)]
pub struct ScanExec {
    pub name: String,
    pub source: Arc<dyn RowSource>,
    pub width: usize,
}

impl ScanExec {
    pub fn open(&self, ctx: &ExecContext) -> Result<Box<dyn RowStream>> {
        // A source may report its row collection as absent; that's
        // normalized to an empty stream, never a fault.
        let rows = self.source.scan()?;
        Ok(Box::new(ScanStream {
            name: self.name.clone(),
            width: self.width,
            rows,
            ctx: ctx.clone(),
            count: 0,
        }))
    }
}

impl Explainable for ScanExec {
    fn explain_entry(&self, conf: ExplainConfig) -> ExplainEntry {
        EntryBuilder::new("Scan", conf)
            .with_value("source", &self.name)
            .build()
    }
}

struct ScanStream {
    name: String,
    width: usize,
    rows: Option<SourceRows>,
    ctx: ExecContext,
    count: usize,
}

impl RowStream for ScanStream {
    fn next_row(&mut self) -> Result<Option<Row>> {
        let rows = match &mut self.rows {
            Some(rows) => rows,
            None => return Ok(None),
        };

        self.ctx.check_canceled_every(self.count)?;
        self.count += 1;

        match rows.next() {
            None => Ok(None),
            Some(Err(err)) => Err(err),
            Some(Ok(row)) => {
                if row.width() != self.width {
                    return Err(QuarryError::new(format!(
                        "Source '{}' produced a row of width {}, expected {}",
                        self.name,
                        row.width(),
                        self.width
                    )));
                }
                Ok(Some(row))
            }
        }
    }
}

/// Scan over a materialized plan (a CTE body executed once per query).
#[derive(Debug)]
pub struct MaterializationScanExec {
    pub index: usize,
}

impl MaterializationScanExec {
    pub fn open(&self, ctx: &ExecContext) -> Result<Box<dyn RowStream>> {
        let rows = ctx.materialized_rows(self.index)?;
        Ok(Box::new(MaterializationScanStream { rows, next: 0 }))
    }
}

impl Explainable for MaterializationScanExec {
    fn explain_entry(&self, conf: ExplainConfig) -> ExplainEntry {
        EntryBuilder::new("MaterializationScan", conf)
            .with_value("materialization", self.index)
            .build()
    }
}

#[derive(Debug)]
struct MaterializationScanStream {
    rows: Arc<Vec<Row>>,
    next: usize,
}

impl RowStream for MaterializationScanStream {
    fn next_row(&mut self) -> Result<Option<Row>> {
        let row = self.rows.get(self.next).cloned();
        self.next += 1;
        Ok(row)
    }
}
