use std::sync::Arc;

use crate::catalog::RowSource;
use crate::explain::{EntryBuilder, ExplainConfig, ExplainEntry, Explainable};
use crate::logical::binder::table_list::TableRef;
use crate::scalars::datatype::DataType;

/// Scan of an external row source resolved during binding.
#[derive(Debug, Clone)]
pub struct LogicalScan {
    pub table_ref: TableRef,
    pub name: String,
    pub column_types: Vec<DataType>,
    pub source: Arc<dyn RowSource>,
}

impl PartialEq for LogicalScan {
    fn eq(&self, other: &Self) -> bool {
        self.table_ref == other.table_ref
            && self.name == other.name
            && self.column_types == other.column_types
            && Arc::ptr_eq(&self.source, &other.source)
    }
}

impl Explainable for LogicalScan {
    fn explain_entry(&self, conf: ExplainConfig) -> ExplainEntry {
        EntryBuilder::new("Scan", conf)
            .with_value("source", &self.name)
            .with_value("table_ref", self.table_ref)
            .build()
    }
}
