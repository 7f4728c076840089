use std::fmt;

use crate::explain::{EntryBuilder, ExplainConfig, ExplainEntry, Explainable};
use crate::logical::binder::table_list::TableRef;
use crate::scalars::datatype::DataType;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetOpKind {
    Union,
}

impl fmt::Display for SetOpKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Union => write!(f, "UNION"),
        }
    }
}

/// Set operation over two children.
///
/// Branch output types were reconciled during binding via the implicit cast
/// table; rows from either side are cast to `output_types` at execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogicalSetop {
    pub kind: SetOpKind,
    pub all: bool,
    pub setop_table: TableRef,
    pub output_types: Vec<DataType>,
}

impl Explainable for LogicalSetop {
    fn explain_entry(&self, conf: ExplainConfig) -> ExplainEntry {
        EntryBuilder::new("SetOp", conf)
            .with_value("kind", self.kind)
            .with_value("all", self.all)
            .build()
    }
}
