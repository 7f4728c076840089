use crate::explain::{EntryBuilder, ExplainConfig, ExplainEntry, Explainable};
use crate::expr::Expression;
use crate::logical::binder::table_list::TableRef;

/// Grouped aggregation.
///
/// Output is the group values followed by the aggregate values; the two
/// table refs address those column ranges. A plain GROUP BY with no
/// aggregates (the DISTINCT rewrite) has only the group side.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogicalAggregate {
    /// Aggregate expressions, all `Expression::Aggregate` variants.
    pub aggregates: Vec<Expression>,
    pub aggregates_table: Option<TableRef>,
    pub group_exprs: Vec<Expression>,
    pub group_table: Option<TableRef>,
}

impl Explainable for LogicalAggregate {
    fn explain_entry(&self, conf: ExplainConfig) -> ExplainEntry {
        EntryBuilder::new("Aggregate", conf)
            .with_values("aggregates", &self.aggregates)
            .with_values("group_expressions", &self.group_exprs)
            .build()
    }
}
