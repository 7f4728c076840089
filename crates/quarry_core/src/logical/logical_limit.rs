use crate::explain::{EntryBuilder, ExplainConfig, ExplainEntry, Explainable};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogicalLimit {
    pub limit: u64,
}

impl Explainable for LogicalLimit {
    fn explain_entry(&self, conf: ExplainConfig) -> ExplainEntry {
        EntryBuilder::new("Limit", conf)
            .with_value("limit", self.limit)
            .build()
    }
}
