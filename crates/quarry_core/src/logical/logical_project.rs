use crate::explain::{EntryBuilder, ExplainConfig, ExplainEntry, Explainable};
use crate::expr::Expression;
use crate::logical::binder::table_list::TableRef;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogicalProject {
    pub projections: Vec<Expression>,
    pub projection_table: TableRef,
}

impl Explainable for LogicalProject {
    fn explain_entry(&self, conf: ExplainConfig) -> ExplainEntry {
        EntryBuilder::new("Project", conf)
            .with_values("projections", &self.projections)
            .with_value("table_ref", self.projection_table)
            .build()
    }
}
