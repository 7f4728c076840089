use std::fmt;

use crate::explain::{EntryBuilder, ExplainConfig, ExplainEntry, Explainable};
use crate::logical::binder::table_list::TableRef;

/// Reference to a bound materialization (a CTE body planned once and scanned
/// by any number of references).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MaterializationRef(pub u32);

impl fmt::Display for MaterializationRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "mat_{}", self.0)
    }
}

/// Scan over a materialized plan. Each reference gets its own table ref with
/// the materialization's column types.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogicalMaterializationScan {
    pub mat_ref: MaterializationRef,
    pub table_ref: TableRef,
}

impl Explainable for LogicalMaterializationScan {
    fn explain_entry(&self, conf: ExplainConfig) -> ExplainEntry {
        EntryBuilder::new("MaterializationScan", conf)
            .with_value("materialization_ref", self.mat_ref)
            .with_value("table_ref", self.table_ref)
            .build()
    }
}
