use crate::explain::{EntryBuilder, ExplainConfig, ExplainEntry, Explainable};

/// Produces exactly one empty row. The base of a SELECT with no FROM.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogicalSingleRow;

impl Explainable for LogicalSingleRow {
    fn explain_entry(&self, conf: ExplainConfig) -> ExplainEntry {
        EntryBuilder::new("SingleRow", conf).build()
    }
}
