use crate::explain::{EntryBuilder, ExplainConfig, ExplainEntry, Explainable};

/// DISTINCT marker over its child's output.
///
/// Never survives optimization: the distinct-to-group-by rewrite replaces it
/// with an aggregate over all projected columns, or drops it when an
/// aggregation already exists below.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogicalDistinct;

impl Explainable for LogicalDistinct {
    fn explain_entry(&self, conf: ExplainConfig) -> ExplainEntry {
        EntryBuilder::new("Distinct", conf).build()
    }
}
